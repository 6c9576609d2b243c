use std::sync::Arc;

use crate::caps::{DeviceCaps, MAX_VERTEX_ATTRIBS};
use crate::gl::{
    BlendState, ColorF, DepthStencilState, DrawElementsType, Extents, Offset, PrimitiveMode,
    ProgramInfo, RasterizerState, Rectangle, SamplerState, SizedFormat, SwizzleState, TextureType,
    VertexFormat, WrapMode,
};
use crate::native::{ShaderResourceView, StreamOutputTarget, TargetView, UnorderedAccessView};
use crate::query::{QueryId, QueryType};
use crate::serial::{BufferId, ResourceSerial};
use crate::vertex::TranslatedAttribute;

/// Sub-resource of a texture: one mip level, optionally one layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageIndex {
    pub texture_type: TextureType,
    pub mip_index: u32,
    /// `None` addresses every layer of the level.
    pub layer_index: Option<u32>,
}

impl ImageIndex {
    pub const fn make_2d(mip_index: u32) -> Self {
        Self {
            texture_type: TextureType::Texture2D,
            mip_index,
            layer_index: None,
        }
    }

    pub const fn make_layer(texture_type: TextureType, mip_index: u32, layer: u32) -> Self {
        Self {
            texture_type,
            mip_index,
            layer_index: Some(layer),
        }
    }
}

/// What a framebuffer attachment is backed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentSource {
    Texture(ImageIndex),
    Renderbuffer,
    /// Window-system back buffer.
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorAttachment {
    pub view: TargetView,
    pub source: AttachmentSource,
    pub size: Extents,
    pub format: SizedFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthStencilAttachment {
    pub view: TargetView,
    pub source: AttachmentSource,
    pub has_depth: bool,
    pub stencil_bits: u32,
}

/// The draw framebuffer as the state manager needs it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramebufferState {
    /// `None` for the default framebuffer.
    pub serial: Option<ResourceSerial>,
    pub color_attachments: Vec<Option<ColorAttachment>>,
    pub depth_stencil: Option<DepthStencilAttachment>,
    /// Bit `i` set when draw buffer `i` is not `NONE`.
    pub draw_buffer_mask: u32,
    pub samples: u32,
    /// Per-view viewport offsets of a side-by-side multiview framebuffer.
    pub view_offsets: Vec<Offset>,
    /// Size of a default framebuffer; zero while the surface has no backing.
    pub default_size: Extents,
}

impl FramebufferState {
    pub fn is_default(&self) -> bool {
        self.serial.is_none()
    }

    pub fn has_depth(&self) -> bool {
        self.depth_stencil.is_some_and(|ds| ds.has_depth)
    }

    pub fn has_stencil(&self) -> bool {
        self.depth_stencil.is_some_and(|ds| ds.stencil_bits > 0)
    }

    pub fn stencil_bits(&self) -> u32 {
        self.depth_stencil.map_or(0, |ds| ds.stencil_bits)
    }

    pub fn first_color_attachment(&self) -> Option<&ColorAttachment> {
        self.color_attachments.iter().flatten().next()
    }

    pub fn is_multiview(&self) -> bool {
        self.view_offsets.len() > 1
    }

    pub fn is_draw_buffer_active(&self, index: usize) -> bool {
        index < 32 && self.draw_buffer_mask & (1 << index) != 0
    }
}

/// Value of a generic attribute whose array is disabled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CurrentValue {
    Float([f32; 4]),
    Int([i32; 4]),
    UInt([u32; 4]),
}

impl Default for CurrentValue {
    fn default() -> Self {
        CurrentValue::Float([0.0, 0.0, 0.0, 1.0])
    }
}

impl CurrentValue {
    pub const fn format(&self) -> VertexFormat {
        match self {
            CurrentValue::Float(_) => VertexFormat::FLOAT4,
            CurrentValue::Int(_) => VertexFormat::INT4,
            CurrentValue::UInt(_) => VertexFormat::UINT4,
        }
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let words: [u32; 4] = match *self {
            CurrentValue::Float(v) => v.map(f32::to_bits),
            CurrentValue::Int(v) => v.map(|x| x as u32),
            CurrentValue::UInt(v) => v,
        };
        bytemuck::cast(words)
    }
}

/// Buffer bound to `ELEMENT_ARRAY_BUFFER`, with its CPU shadow copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementArrayBuffer {
    pub buffer: BufferId,
    pub data: Arc<[u8]>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VertexArrayState {
    pub serial: ResourceSerial,
    /// Attributes already translated by the vertex array, one per location.
    pub attributes: [TranslatedAttribute; MAX_VERTEX_ATTRIBS],
    pub element_array_buffer: Option<ElementArrayBuffer>,
}

impl VertexArrayState {
    pub fn new(serial: ResourceSerial) -> Self {
        Self {
            serial,
            attributes: [TranslatedAttribute::default(); MAX_VERTEX_ATTRIBS],
            element_array_buffer: None,
        }
    }
}

/// Texture state read by the sampler metadata upload and swizzle generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureState {
    pub texture_type: TextureType,
    pub effective_base_level: u32,
    pub base_level_format: SizedFormat,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
    pub swizzle: SwizzleState,
}

impl TextureState {
    pub const fn new(texture_type: TextureType, base_level_format: SizedFormat) -> Self {
        Self {
            texture_type,
            effective_base_level: 0,
            base_level_format,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            wrap_r: WrapMode::Repeat,
            swizzle: SwizzleState::IDENTITY,
        }
    }

    /// Sampling needs a swizzled copy of the storage.
    pub fn swizzle_required(&self) -> bool {
        !self.swizzle.is_identity()
    }
}

/// Complete texture bound to a texture unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureBinding {
    pub srv: ShaderResourceView,
    pub texture: TextureState,
    /// The texture object's own sampler parameters.
    pub sampler: SamplerState,
}

/// Stand-in textures sampled when a unit holds no complete texture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncompleteTextures {
    textures: [Option<TextureBinding>; TextureType::COUNT],
}

impl IncompleteTextures {
    pub fn set(&mut self, texture_type: TextureType, binding: TextureBinding) {
        self.textures[texture_type.index()] = Some(binding);
    }

    pub fn get(&self, texture_type: TextureType) -> Option<&TextureBinding> {
        self.textures[texture_type.index()].as_ref()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformBufferBinding {
    pub buffer: BufferId,
    pub offset: u64,
    /// Zero binds the whole buffer.
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformFeedbackState {
    pub serial: ResourceSerial,
    /// Changes whenever the target buffers or offsets change.
    pub version: u64,
    pub active: bool,
    pub paused: bool,
    pub targets: Vec<StreamOutputTarget>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageUnitBinding {
    pub srv: Option<ShaderResourceView>,
    pub uav: Option<UnorderedAccessView>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleCoverage {
    pub value: f32,
    pub invert: bool,
}

/// Everything the higher-level context exposes to the state manager.
///
/// The context owns and mutates this; the state manager only reads it during
/// [`crate::StateManager::sync_state`] and the flush entry points.
#[derive(Clone, Debug)]
pub struct GlState {
    pub blend: BlendState,
    pub blend_color: ColorF,
    pub depth_stencil: DepthStencilState,
    pub stencil_ref: i32,
    pub stencil_back_ref: i32,
    pub rasterizer: RasterizerState,
    pub scissor_test: bool,
    pub scissor: Rectangle,
    pub viewport: Rectangle,
    pub near_z: f32,
    pub far_z: f32,
    pub sample_coverage: Option<SampleCoverage>,
    pub sample_mask: Option<u32>,
    pub draw_framebuffer: FramebufferState,
    pub vertex_array: VertexArrayState,
    pub current_values: [CurrentValue; MAX_VERTEX_ATTRIBS],
    /// Bit `i` set when `current_values[i]` changed since the last sync.
    pub dirty_current_values: u32,
    pub program: Option<Arc<ProgramInfo>>,
    pub texture_units: Vec<Option<TextureBinding>>,
    /// Sampler objects overriding the texture's own sampler parameters.
    pub sampler_objects: Vec<Option<SamplerState>>,
    pub incomplete_textures: IncompleteTextures,
    pub uniform_buffers: Vec<Option<UniformBufferBinding>>,
    pub transform_feedback: Option<TransformFeedbackState>,
    pub image_units: Vec<ImageUnitBinding>,
    pub active_queries: [Option<QueryId>; QueryType::COUNT],
}

impl GlState {
    pub fn new(caps: &DeviceCaps, vertex_array: ResourceSerial) -> Self {
        let texture_units = (caps.max_texture_image_units
            + caps.max_vertex_texture_image_units
            + caps.max_compute_texture_image_units) as usize;
        Self {
            blend: BlendState::default(),
            blend_color: ColorF::default(),
            depth_stencil: DepthStencilState::default(),
            stencil_ref: 0,
            stencil_back_ref: 0,
            rasterizer: RasterizerState::default(),
            scissor_test: false,
            scissor: Rectangle::default(),
            viewport: Rectangle::default(),
            near_z: 0.0,
            far_z: 1.0,
            sample_coverage: None,
            sample_mask: None,
            draw_framebuffer: FramebufferState::default(),
            vertex_array: VertexArrayState::new(vertex_array),
            current_values: [CurrentValue::default(); MAX_VERTEX_ATTRIBS],
            dirty_current_values: 0,
            program: None,
            texture_units: vec![None; texture_units],
            sampler_objects: vec![None; texture_units],
            incomplete_textures: IncompleteTextures::default(),
            uniform_buffers: vec![None; 72],
            transform_feedback: None,
            image_units: vec![ImageUnitBinding::default(); caps.max_image_units as usize],
            active_queries: [None; QueryType::COUNT],
        }
    }

    pub fn program(&self) -> Option<&ProgramInfo> {
        self.program.as_deref()
    }

    pub fn is_transform_feedback_active_unpaused(&self) -> bool {
        self.transform_feedback
            .as_ref()
            .is_some_and(|tf| tf.active && !tf.paused)
    }

    /// Complete texture on `unit`, if any.
    pub fn texture(&self, unit: u32) -> Option<&TextureBinding> {
        self.texture_units.get(unit as usize).and_then(Option::as_ref)
    }

    pub fn sampler_object(&self, unit: u32) -> Option<&SamplerState> {
        self.sampler_objects.get(unit as usize).and_then(Option::as_ref)
    }

    pub fn uniform_buffer(&self, binding: u32) -> Option<&UniformBufferBinding> {
        self.uniform_buffers.get(binding as usize).and_then(Option::as_ref)
    }
}

/// Where the indices of an indexed draw come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexSource {
    /// Byte offset into the bound element array buffer.
    ElementArray { offset: u32 },
    /// Client memory.
    Client(Arc<[u8]>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedDraw {
    pub index_type: DrawElementsType,
    pub count: u32,
    pub source: IndexSource,
    pub primitive_restart: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub mode: PrimitiveMode,
    pub first_vertex: i32,
    pub vertex_count: u32,
    pub instances: u32,
    pub indices: Option<IndexedDraw>,
}

impl DrawCall {
    pub fn arrays(mode: PrimitiveMode, first_vertex: i32, vertex_count: u32) -> Self {
        Self {
            mode,
            first_vertex,
            vertex_count,
            instances: 1,
            indices: None,
        }
    }

    pub fn elements(mode: PrimitiveMode, indices: IndexedDraw) -> Self {
        Self {
            mode,
            first_vertex: 0,
            vertex_count: indices.count,
            instances: 1,
            indices: Some(indices),
        }
    }
}
