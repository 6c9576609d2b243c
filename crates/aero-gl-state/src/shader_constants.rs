//! Driver constant blocks.
//!
//! Each stage gets a constant buffer at [`crate::caps::DRIVER_UNIFORM_SLOT`] holding values the
//! translated shaders need but the application never sets: the viewport transform, depth range,
//! compute work-group counts and per-sampler metadata for integer texture emulation.
//!
//! The buffer layout is a fixed `#[repr(C)]` struct followed by one [`SamplerMetadata`] entry per
//! sampler. Uploads always use write-discard, so every upload rewrites the fixed struct and the
//! metadata of every active sampler.

use bytemuck::{Pod, Zeroable};

use crate::caps::DeviceCaps;
use crate::error::{Result, StateError};
use crate::gl::{Rectangle, TextureState};
use crate::native::{DeviceContext, Viewport};
use crate::serial::BufferId;
use crate::stage::ShaderStage;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexConstants {
    pub depth_range: [f32; 4],
    pub view_adjust: [f32; 4],
    pub view_coords: [f32; 4],
    pub view_scale: [f32; 2],
    pub multiview_write_to_viewport_index: f32,
    pub padding: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PixelConstants {
    pub depth_range: [f32; 4],
    pub view_coords: [f32; 4],
    pub depth_front: [f32; 4],
    pub view_scale: [f32; 2],
    pub multiview_write_to_viewport_index: f32,
    pub padding: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ComputeConstants {
    pub num_work_groups: [u32; 3],
    pub padding: u32,
}

/// One 16-byte register per sampler.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SamplerMetadata {
    pub base_level: i32,
    /// Channel width of integer formats; zero for 32-bit integer formats.
    pub internal_format_bits: i32,
    /// `wrap_s | wrap_t << 2 | wrap_r << 4`, two bits each.
    pub wrap_modes: i32,
    pub padding: i32,
}

const _: () = assert!(std::mem::size_of::<VertexConstants>() % 16 == 0);
const _: () = assert!(std::mem::size_of::<PixelConstants>() % 16 == 0);
const _: () = assert!(std::mem::size_of::<ComputeConstants>() == 16);
const _: () = assert!(std::mem::size_of::<SamplerMetadata>() == 16);

pub fn pack_wrap_modes(texture: &TextureState) -> i32 {
    texture.wrap_s.shader_bits()
        | (texture.wrap_t.shader_bits() << 2)
        | (texture.wrap_r.shader_bits() << 4)
}

#[derive(Debug, Default)]
struct StageConstants {
    sampler_metadata: Vec<SamplerMetadata>,
    /// Sampler count covered by the last upload.
    num_active_samplers: u32,
    dirty: bool,
}

struct StageLayout {
    fixed_size: usize,
    fixed_bytes: fn(&ShaderConstants) -> &[u8],
}

static STAGE_LAYOUTS: [StageLayout; ShaderStage::COUNT] = [
    StageLayout {
        fixed_size: std::mem::size_of::<VertexConstants>(),
        fixed_bytes: |c| bytemuck::bytes_of(&c.vertex),
    },
    StageLayout {
        fixed_size: std::mem::size_of::<PixelConstants>(),
        fixed_bytes: |c| bytemuck::bytes_of(&c.pixel),
    },
    StageLayout {
        fixed_size: std::mem::size_of::<ComputeConstants>(),
        fixed_bytes: |c| bytemuck::bytes_of(&c.compute),
    },
];

#[derive(Debug, Default)]
pub struct ShaderConstants {
    vertex: VertexConstants,
    pixel: PixelConstants,
    compute: ComputeConstants,
    stages: [StageConstants; ShaderStage::COUNT],
}

impl ShaderConstants {
    pub fn new(caps: &DeviceCaps) -> Self {
        let mut constants = Self::default();
        for stage in ShaderStage::ALL {
            let slots = caps.max_shader_texture_units(stage) as usize;
            let entry = &mut constants.stages[stage.index()];
            entry.sampler_metadata = vec![SamplerMetadata::default(); slots];
            entry.dirty = true;
        }
        constants
    }

    pub fn vertex(&self) -> &VertexConstants {
        &self.vertex
    }

    pub fn pixel(&self) -> &PixelConstants {
        &self.pixel
    }

    pub fn compute(&self) -> &ComputeConstants {
        &self.compute
    }

    pub fn sampler_metadata(&self, stage: ShaderStage) -> &[SamplerMetadata] {
        &self.stages[stage.index()].sampler_metadata
    }

    pub fn is_dirty(&self, stage: ShaderStage) -> bool {
        self.stages[stage.index()].dirty
    }

    /// Fixed struct plus metadata for every sampler the stage can address.
    pub fn required_buffer_size(&self, stage: ShaderStage) -> usize {
        STAGE_LAYOUTS[stage.index()].fixed_size
            + self.stages[stage.index()].sampler_metadata.len() * std::mem::size_of::<SamplerMetadata>()
    }

    /// Forces a full re-upload of every stage on the next [`Self::update_buffer`].
    pub fn mark_dirty(&mut self) {
        for stage in &mut self.stages {
            stage.dirty = true;
            stage.num_active_samplers = 0;
        }
    }

    pub fn on_viewport_change(
        &mut self,
        gl_viewport: &Rectangle,
        viewport: &Viewport,
        is_legacy_feature_level: bool,
        present_path_fast: bool,
    ) {
        self.stages[ShaderStage::Vertex.index()].dirty = true;
        self.stages[ShaderStage::Fragment.index()].dirty = true;

        // Legacy feature levels emulate large and negative viewports in the vertex shader.
        if is_legacy_feature_level {
            let width = gl_viewport.width as f32;
            let height = gl_viewport.height as f32;
            self.vertex.view_adjust = [
                ((width - viewport.width) + 2.0 * (gl_viewport.x as f32 - viewport.top_left_x))
                    / viewport.width,
                ((height - viewport.height) + 2.0 * (gl_viewport.y as f32 - viewport.top_left_y))
                    / viewport.height,
                width / viewport.width,
                height / viewport.height,
            ];
        }

        let half_width = gl_viewport.width as f32 * 0.5;
        let half_height = gl_viewport.height as f32 * 0.5;
        self.pixel.view_coords = [
            half_width,
            half_height,
            gl_viewport.x as f32 + half_width,
            gl_viewport.y as f32 + half_height,
        ];
        // Point-sprite emulation expands quads in the vertex shader.
        self.vertex.view_coords = self.pixel.view_coords;

        let z_near = viewport.min_depth;
        let z_far = viewport.max_depth;
        self.pixel.depth_front[0] = (z_far - z_near) * 0.5;
        self.pixel.depth_front[1] = (z_near + z_far) * 0.5;

        let depth_range = [z_near, z_far, z_far - z_near, 0.0];
        self.vertex.depth_range = depth_range;
        self.pixel.depth_range = depth_range;

        let view_scale = [1.0, if present_path_fast { 1.0 } else { -1.0 }];
        self.pixel.view_scale = view_scale;
        self.vertex.view_scale = view_scale;
    }

    pub fn set_multiview_write_to_viewport_index(&mut self, index: f32) {
        self.stages[ShaderStage::Vertex.index()].dirty = true;
        self.stages[ShaderStage::Fragment.index()].dirty = true;
        self.vertex.multiview_write_to_viewport_index = index;
        self.pixel.multiview_write_to_viewport_index = index;
    }

    pub fn on_dispatch(&mut self, x: u32, y: u32, z: u32) {
        let groups = [x, y, z];
        if self.compute.num_work_groups != groups {
            self.compute.num_work_groups = groups;
            self.stages[ShaderStage::Compute.index()].dirty = true;
        }
    }

    /// Refreshes the metadata of `sampler_index` from the texture bound to it.
    pub fn on_sampler_change(&mut self, stage: ShaderStage, sampler_index: usize, texture: &TextureState) {
        let entry = &mut self.stages[stage.index()];
        debug_assert!(
            sampler_index < entry.sampler_metadata.len(),
            "{stage} sampler {sampler_index} out of range"
        );
        let Some(metadata) = entry.sampler_metadata.get_mut(sampler_index) else {
            return;
        };
        if update_sampler_metadata(metadata, texture) {
            entry.dirty = true;
        }
    }

    /// Uploads the stage's constants if anything changed or more samplers became active.
    ///
    /// Returns whether an upload happened.
    pub fn update_buffer(
        &mut self,
        device: &mut dyn DeviceContext,
        stage: ShaderStage,
        used_sampler_range: u32,
        buffer: BufferId,
    ) -> Result<bool> {
        let entry = &mut self.stages[stage.index()];
        let dirty = entry.dirty || entry.num_active_samplers < used_sampler_range;
        entry.num_active_samplers = used_sampler_range;
        if !dirty {
            return Ok(false);
        }

        let layout = &STAGE_LAYOUTS[stage.index()];
        let active = (used_sampler_range as usize).min(self.stages[stage.index()].sampler_metadata.len());
        let metadata = bytemuck::cast_slice::<SamplerMetadata, u8>(
            &self.stages[stage.index()].sampler_metadata[..active],
        );
        let mut data = Vec::with_capacity(layout.fixed_size + metadata.len());
        data.extend_from_slice((layout.fixed_bytes)(self));
        data.extend_from_slice(metadata);

        device
            .write_discard(buffer, &data)
            .map_err(StateError::map("driver constant buffer"))?;
        self.stages[stage.index()].dirty = false;
        Ok(true)
    }
}

/// Returns whether `metadata` changed.
fn update_sampler_metadata(metadata: &mut SamplerMetadata, texture: &TextureState) -> bool {
    let mut dirty = false;
    let base_level = texture.effective_base_level as i32;
    if metadata.base_level != base_level {
        metadata.base_level = base_level;
        dirty = true;
    }

    // Format bits and wrap modes only matter to integer textures; leave them untouched otherwise.
    let Some(bits) = texture.base_level_format.integer_bits() else {
        return dirty;
    };
    let internal_format_bits = if bits == 32 { 0 } else { bits };
    if metadata.internal_format_bits != internal_format_bits {
        metadata.internal_format_bits = internal_format_bits;
        dirty = true;
    }
    let wrap_modes = pack_wrap_modes(texture);
    if metadata.wrap_modes != wrap_modes {
        metadata.wrap_modes = wrap_modes;
        dirty = true;
    }
    dirty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{SizedFormat, TextureType, WrapMode};
    use crate::native::{BufferDesc, BufferUsage, NativeCall, RecordingContext};

    fn int_texture(base_level: u32) -> TextureState {
        TextureState {
            effective_base_level: base_level,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::Repeat,
            wrap_r: WrapMode::MirroredRepeat,
            ..TextureState::new(TextureType::Texture2D, SizedFormat::Rgba16Ui)
        }
    }

    fn driver_buffer(ctx: &mut RecordingContext, constants: &ShaderConstants, stage: ShaderStage) -> BufferId {
        ctx.create_buffer(
            &BufferDesc {
                size: constants.required_buffer_size(stage) as u32,
                usage: BufferUsage::Constant,
                dynamic: true,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn wrap_modes_pack_two_bits_per_axis() {
        assert_eq!(pack_wrap_modes(&int_texture(0)), 0x35);
    }

    #[test]
    fn non_integer_textures_only_track_base_level() {
        let mut metadata = SamplerMetadata::default();
        let mut texture = TextureState::new(TextureType::Texture2D, SizedFormat::Rgba8);
        texture.effective_base_level = 2;
        assert!(update_sampler_metadata(&mut metadata, &texture));
        assert_eq!(metadata, SamplerMetadata { base_level: 2, ..Default::default() });
        assert!(!update_sampler_metadata(&mut metadata, &texture));
    }

    #[test]
    fn integer_textures_record_bits_and_wrap() {
        let mut metadata = SamplerMetadata::default();
        assert!(update_sampler_metadata(&mut metadata, &int_texture(0)));
        assert_eq!(metadata.internal_format_bits, 16);
        assert_eq!(metadata.wrap_modes, 0x35);

        let mut wide = int_texture(0);
        wide.base_level_format = SizedFormat::R32I;
        assert!(update_sampler_metadata(&mut metadata, &wide));
        assert_eq!(metadata.internal_format_bits, 0);
    }

    #[test]
    fn update_is_skipped_until_something_changes() {
        let caps = DeviceCaps::default();
        let mut constants = ShaderConstants::new(&caps);
        let mut ctx = RecordingContext::new();
        let buffer = driver_buffer(&mut ctx, &constants, ShaderStage::Fragment);
        ctx.take_calls();

        assert!(constants.update_buffer(&mut ctx, ShaderStage::Fragment, 0, buffer).unwrap());
        assert!(!constants.update_buffer(&mut ctx, ShaderStage::Fragment, 0, buffer).unwrap());
        assert_eq!(ctx.count("WriteDiscard"), 1);

        // Fewer active samplers than last time does not force an upload.
        assert!(constants.update_buffer(&mut ctx, ShaderStage::Fragment, 2, buffer).unwrap());
        assert!(!constants.update_buffer(&mut ctx, ShaderStage::Fragment, 1, buffer).unwrap());
        assert!(constants.update_buffer(&mut ctx, ShaderStage::Fragment, 2, buffer).unwrap());
    }

    #[test]
    fn growing_sampler_count_uploads_the_whole_range() {
        let caps = DeviceCaps::default();
        let mut constants = ShaderConstants::new(&caps);
        let mut ctx = RecordingContext::new();
        let buffer = driver_buffer(&mut ctx, &constants, ShaderStage::Fragment);
        for i in 0..5 {
            constants.on_sampler_change(ShaderStage::Fragment, i, &int_texture(i as u32));
        }
        constants.update_buffer(&mut ctx, ShaderStage::Fragment, 3, buffer).unwrap();
        ctx.take_calls();

        assert!(constants.update_buffer(&mut ctx, ShaderStage::Fragment, 5, buffer).unwrap());
        let calls = ctx.take_calls();
        let [NativeCall::WriteDiscard { data, .. }] = calls.as_slice() else {
            panic!("expected one write-discard, got {calls:?}");
        };
        let fixed = std::mem::size_of::<PixelConstants>();
        assert_eq!(data.len(), fixed + 5 * 16);
        let uploaded: &[SamplerMetadata] = bytemuck::cast_slice(&data[fixed..]);
        let levels: Vec<i32> = uploaded.iter().map(|m| m.base_level).collect();
        assert_eq!(levels, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn viewport_adjust_only_on_legacy_levels() {
        let caps = DeviceCaps::default();
        let mut constants = ShaderConstants::new(&caps);
        let gl_viewport = Rectangle::new(-10, 0, 100, 50);
        let viewport = Viewport {
            top_left_x: 0.0,
            top_left_y: 0.0,
            width: 90.0,
            height: 50.0,
            min_depth: 0.25,
            max_depth: 0.75,
        };
        constants.on_viewport_change(&gl_viewport, &viewport, false, false);
        assert_eq!(constants.vertex().view_adjust, [0.0; 4]);
        assert_eq!(constants.pixel().view_coords, [50.0, 25.0, 40.0, 25.0]);
        assert_eq!(constants.pixel().depth_front[..2], [0.25, 0.5]);
        assert_eq!(constants.vertex().view_scale, [1.0, -1.0]);

        constants.on_viewport_change(&gl_viewport, &viewport, true, true);
        assert_eq!(constants.vertex().view_adjust[2], 100.0 / 90.0);
        assert_eq!(constants.pixel().view_scale, [1.0, 1.0]);
    }

    #[test]
    fn map_failure_keeps_stage_dirty() {
        let caps = DeviceCaps::default();
        let mut constants = ShaderConstants::new(&caps);
        let mut ctx = RecordingContext::new();
        let buffer = driver_buffer(&mut ctx, &constants, ShaderStage::Vertex);
        ctx.fail_next_write(crate::native::DeviceError::DeviceLost);
        assert!(constants.update_buffer(&mut ctx, ShaderStage::Vertex, 0, buffer).is_err());
        assert!(constants.is_dirty(ShaderStage::Vertex));
    }
}
