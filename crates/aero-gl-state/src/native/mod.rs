//! Object-based native driver interface.
//!
//! [`DeviceContext`] models a single immediate-mode device context in the D3D11 style: every
//! piece of pipeline state is either an immutable state object (created through
//! [`crate::cache::RenderStateCache`]) or an explicit binding. The state manager is the only
//! component that talks to the context during draw preparation.

pub mod recording;

use thiserror::Error;

use crate::serial::{BufferId, InputLayoutId, ResourceSerial, ShaderId, StateObjectId, ViewId};
use crate::stage::{PipelineStage, ShaderStage};

pub use recording::{NativeCall, RecordingContext};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("out of device memory")]
    OutOfMemory,
    #[error("device lost")]
    DeviceLost,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    Undefined,
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub const fn byte_size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Native scissor rectangle, expressed as edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Subresource range a shader-resource view exposes.
///
/// `mip_levels == u32::MAX` means "every level from `most_detailed_mip` down".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SrvDimension {
    Buffer,
    Texture2D {
        most_detailed_mip: u32,
        mip_levels: u32,
    },
    Texture2DMs,
    Texture2DArray {
        most_detailed_mip: u32,
        mip_levels: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture2DMsArray {
        first_array_slice: u32,
        array_size: u32,
    },
    TextureCube {
        most_detailed_mip: u32,
        mip_levels: u32,
    },
    Texture3D {
        most_detailed_mip: u32,
        mip_levels: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UavDimension {
    Buffer,
    Texture2D {
        mip_slice: u32,
    },
    Texture2DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture3D {
        mip_slice: u32,
        first_w_slice: u32,
        w_size: u32,
    },
}

/// A shader-resource view as handed to the state manager by the texture layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderResourceView {
    pub id: ViewId,
    pub resource: ResourceSerial,
    pub dimension: SrvDimension,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnorderedAccessView {
    pub id: ViewId,
    pub resource: ResourceSerial,
    pub dimension: UavDimension,
}

/// Render-target or depth-stencil view together with the resource it writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetView {
    pub id: ViewId,
    pub resource: ResourceSerial,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VertexBufferBinding {
    pub buffer: Option<BufferId>,
    pub stride: u32,
    pub offset: u32,
}

/// Sub-range of a constant buffer in 16-byte constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantRange {
    pub first_constant: u32,
    pub num_constants: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamOutputTarget {
    pub buffer: BufferId,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    Constant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: u32,
    pub usage: BufferUsage,
    /// CPU-writable with write-discard maps.
    pub dynamic: bool,
}

/// Immediate device context.
///
/// Binding calls cannot fail. Resource creation and maps report [`DeviceError`], which the state
/// manager propagates without retrying.
pub trait DeviceContext {
    fn set_render_targets(&mut self, render_targets: &[Option<ViewId>], depth_stencil: Option<ViewId>);
    fn set_blend_state(&mut self, state: Option<StateObjectId>, blend_factor: [f32; 4], sample_mask: u32);
    fn set_depth_stencil_state(&mut self, state: Option<StateObjectId>, stencil_ref: u32);
    fn set_rasterizer_state(&mut self, state: Option<StateObjectId>);
    fn set_viewports(&mut self, viewports: &[Viewport]);
    fn set_scissor_rects(&mut self, rects: &[ScissorRect]);

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<ViewId>]);
    fn set_unordered_access_views(&mut self, start_slot: u32, views: &[Option<ViewId>]);
    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<StateObjectId>]);
    fn set_constant_buffer(
        &mut self,
        stage: PipelineStage,
        slot: u32,
        buffer: Option<BufferId>,
        range: Option<ConstantRange>,
    );
    fn set_shader(&mut self, stage: PipelineStage, shader: Option<ShaderId>);

    fn set_input_layout(&mut self, layout: Option<InputLayoutId>);
    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[VertexBufferBinding]);
    fn set_index_buffer(&mut self, buffer: Option<BufferId>, format: IndexFormat, offset: u32);
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);
    fn set_stream_output_targets(&mut self, targets: &[StreamOutputTarget]);

    fn update_subresource(&mut self, buffer: BufferId, data: &[u8]);
    /// Maps `buffer` with discard semantics, copies `data` to offset 0 and unmaps.
    fn write_discard(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), DeviceError>;
    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferId, DeviceError>;
}
