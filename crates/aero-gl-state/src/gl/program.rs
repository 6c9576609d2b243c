use std::sync::Arc;

use crate::caps::MAX_VERTEX_ATTRIBS;
use crate::gl::TextureType;
use crate::serial::{BufferId, ResourceSerial};
use crate::stage::ShaderStage;

/// Contents of a stage's default uniform block.
///
/// `version` changes whenever `data` does; the state manager re-uploads when it differs from the
/// last version it wrote to `buffer`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformStorage {
    pub buffer: BufferId,
    pub data: Arc<[u8]>,
    pub version: u64,
}

/// Sampler bound to a texture unit, as seen by one stage of the linked program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerBinding {
    pub texture_unit: u32,
    pub texture_type: TextureType,
}

/// Reflection data of a linked program, produced by the shader compiler.
#[derive(Clone, Debug)]
pub struct ProgramInfo {
    pub serial: ResourceSerial,
    /// Active samplers per stage; entries past `used_sampler_range` are unused.
    pub samplers: [Vec<SamplerBinding>; ShaderStage::COUNT],
    /// Bit `i` set when attribute location `i` is read by the vertex shader.
    pub active_attrib_locations: u32,
    /// Native input semantic for each attribute location.
    pub attrib_location_to_semantic: [u32; MAX_VERTEX_ATTRIBS],
    /// Bit `i` set when the fragment shader writes draw buffer `i`.
    pub active_output_mask: u32,
    pub uses_point_size: bool,
    /// Per stage, the uniform binding point of each user uniform block register.
    pub uniform_block_bindings: [Vec<Option<u32>>; ShaderStage::COUNT],
    /// Compute image register to image unit.
    pub image_units: Vec<u32>,
    /// Compute read-only image register to image unit.
    pub readonly_image_units: Vec<u32>,
    /// Multiview view count; 1 without multiview.
    pub num_views: u32,
    pub uniforms: [Option<UniformStorage>; ShaderStage::COUNT],
}

impl ProgramInfo {
    pub fn new(serial: ResourceSerial) -> Self {
        Self {
            serial,
            samplers: Default::default(),
            active_attrib_locations: 0,
            attrib_location_to_semantic: std::array::from_fn(|i| i as u32),
            active_output_mask: 0b1,
            uses_point_size: false,
            uniform_block_bindings: Default::default(),
            image_units: Vec::new(),
            readonly_image_units: Vec::new(),
            num_views: 1,
            uniforms: Default::default(),
        }
    }

    pub fn used_sampler_range(&self, stage: ShaderStage) -> u32 {
        self.samplers[stage.index()].len() as u32
    }

    pub fn sampler(&self, stage: ShaderStage, index: u32) -> Option<SamplerBinding> {
        self.samplers[stage.index()].get(index as usize).copied()
    }

    pub fn is_attrib_location_active(&self, location: usize) -> bool {
        location < MAX_VERTEX_ATTRIBS && self.active_attrib_locations & (1 << location) != 0
    }

    /// Points are expanded to quads through instancing instead of a geometry shader.
    pub fn uses_instanced_point_sprite_emulation(&self, emulation_enabled: bool) -> bool {
        emulation_enabled && self.uses_point_size
    }

    pub fn uses_multiview(&self) -> bool {
        self.num_views > 1
    }

    pub fn uniform_storage(&self, stage: ShaderStage) -> Option<&UniformStorage> {
        self.uniforms[stage.index()].as_ref()
    }
}
