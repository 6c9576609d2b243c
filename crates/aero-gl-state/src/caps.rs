//! Device capabilities, driver workarounds and state manager configuration.

/// Number of generic vertex attributes, and of native vertex-buffer slots.
pub const MAX_VERTEX_ATTRIBS: usize = 16;

/// Native constant-buffer slots per stage.
pub const MAX_CONSTANT_BUFFER_SLOTS: usize = 14;

/// Constant-buffer slot of the default uniform block.
pub const DEFAULT_UNIFORM_BLOCK_SLOT: u32 = 0;
/// Constant-buffer slot of the driver constant block ([`crate::shader_constants`]).
pub const DRIVER_UNIFORM_SLOT: u32 = 1;
/// User uniform blocks start after the reserved slots.
pub const RESERVED_CONSTANT_BUFFER_SLOTS: u32 = 2;

/// Largest viewport or scissor the native driver accepts on any feature level.
pub const MAX_VIEWPORT_BOUND: i32 = 32767;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureLevel {
    Level9_3,
    Level10_0,
    Level10_1,
    Level11_0,
    Level11_1,
}

impl FeatureLevel {
    /// Legacy feature levels need the viewport-adjust constants and the divisor slot-0 swap.
    pub const fn is_legacy(self) -> bool {
        matches!(self, FeatureLevel::Level9_3)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceCaps {
    pub feature_level: FeatureLevel,
    pub max_vertex_attributes: u32,
    pub max_vertex_texture_image_units: u32,
    pub max_texture_image_units: u32,
    pub max_compute_texture_image_units: u32,
    pub max_image_units: u32,
    pub max_draw_buffers: u32,
    pub max_viewport_width: i32,
    pub max_viewport_height: i32,
    pub max_constant_buffer_slots: u32,
}

impl DeviceCaps {
    pub const fn for_feature_level(feature_level: FeatureLevel) -> Self {
        let (vertex_textures, draw_buffers, viewport) = match feature_level {
            FeatureLevel::Level9_3 => (0, 4, 4096),
            FeatureLevel::Level10_0 | FeatureLevel::Level10_1 => (16, 8, 8192),
            FeatureLevel::Level11_0 | FeatureLevel::Level11_1 => (16, 8, 16384),
        };
        let compute = match feature_level {
            FeatureLevel::Level11_0 | FeatureLevel::Level11_1 => 16,
            _ => 0,
        };
        Self {
            feature_level,
            max_vertex_attributes: MAX_VERTEX_ATTRIBS as u32,
            max_vertex_texture_image_units: vertex_textures,
            max_texture_image_units: 16,
            max_compute_texture_image_units: compute,
            max_image_units: if compute > 0 { 8 } else { 0 },
            max_draw_buffers: draw_buffers,
            max_viewport_width: viewport,
            max_viewport_height: viewport,
            max_constant_buffer_slots: MAX_CONSTANT_BUFFER_SLOTS as u32,
        }
    }

    pub const fn max_shader_texture_units(&self, stage: crate::stage::ShaderStage) -> u32 {
        match stage {
            crate::stage::ShaderStage::Vertex => self.max_vertex_texture_image_units,
            crate::stage::ShaderStage::Fragment => self.max_texture_image_units,
            crate::stage::ShaderStage::Compute => self.max_compute_texture_image_units,
        }
    }
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self::for_feature_level(FeatureLevel::Level11_0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Workarounds {
    /// Skip render targets whose draw buffer is inactive instead of binding them.
    pub mrt_perf_workaround: bool,
    /// Draw points as instanced quads when the program writes point size.
    pub use_instanced_point_sprite_emulation: bool,
    /// Default framebuffer is presented through a Y-inverted fast path.
    pub present_path_fast_enabled: bool,
}

impl Workarounds {
    pub const fn for_feature_level(feature_level: FeatureLevel) -> Self {
        Self {
            mrt_perf_workaround: true,
            use_instanced_point_sprite_emulation: feature_level.is_legacy(),
            present_path_fast_enabled: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateManagerConfig {
    pub caps: DeviceCaps,
    pub workarounds: Workarounds,
    /// ES3-level contexts route the pixel driver constants to the geometry stage as well.
    pub es3_capable: bool,
}

impl Default for StateManagerConfig {
    fn default() -> Self {
        Self::for_feature_level(FeatureLevel::Level11_0)
    }
}

impl StateManagerConfig {
    pub const fn for_feature_level(feature_level: FeatureLevel) -> Self {
        Self {
            caps: DeviceCaps::for_feature_level(feature_level),
            workarounds: Workarounds::for_feature_level(feature_level),
            es3_capable: !feature_level.is_legacy(),
        }
    }

    /// Applies the `AERO_GL_STATE_*` environment overrides on top of `self`.
    ///
    /// - `AERO_GL_STATE_DISABLE_POINT_SPRITE_EMULATION`
    /// - `AERO_GL_STATE_MRT_PERF_WORKAROUND`
    /// - `AERO_GL_STATE_DISABLE_PRESENT_PATH_FAST`
    pub fn with_env_overrides(mut self) -> Self {
        if env_var_truthy("AERO_GL_STATE_DISABLE_POINT_SPRITE_EMULATION") {
            self.workarounds.use_instanced_point_sprite_emulation = false;
        }
        if env_var_truthy("AERO_GL_STATE_MRT_PERF_WORKAROUND") {
            self.workarounds.mrt_perf_workaround = true;
        }
        if env_var_truthy("AERO_GL_STATE_DISABLE_PRESENT_PATH_FAST") {
            self.workarounds.present_path_fast_enabled = false;
        }
        self
    }
}

fn env_var_truthy(name: &str) -> bool {
    let Ok(raw) = std::env::var(name) else {
        return false;
    };
    parse_truthy(&raw)
}

fn parse_truthy(raw: &str) -> bool {
    let v = raw.trim();
    v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
}
