//! A [`DeviceContext`] that records every call instead of driving hardware.
//!
//! Used by the test suites to assert exactly which native calls a flush issued, and by tools that
//! want to inspect the translated command stream.

use hashbrown::HashMap;

use super::{
    BufferDesc, ConstantRange, DeviceContext, DeviceError, IndexFormat, PrimitiveTopology,
    ScissorRect, StreamOutputTarget, VertexBufferBinding, Viewport,
};
use crate::serial::{BufferId, InputLayoutId, SerialFactory, ShaderId, StateObjectId, ViewId};
use crate::stage::{PipelineStage, ShaderStage};

/// Serial base for buffers created by a [`RecordingContext`].
pub const RECORDING_SERIAL_BASE: u64 = 1 << 48;

#[derive(Clone, Debug, PartialEq)]
pub enum NativeCall {
    SetRenderTargets {
        render_targets: Vec<Option<ViewId>>,
        depth_stencil: Option<ViewId>,
    },
    SetBlendState {
        state: Option<StateObjectId>,
        blend_factor: [f32; 4],
        sample_mask: u32,
    },
    SetDepthStencilState {
        state: Option<StateObjectId>,
        stencil_ref: u32,
    },
    SetRasterizerState(Option<StateObjectId>),
    SetViewports(Vec<Viewport>),
    SetScissorRects(Vec<ScissorRect>),
    SetShaderResources {
        stage: ShaderStage,
        start_slot: u32,
        views: Vec<Option<ViewId>>,
    },
    SetUnorderedAccessViews {
        start_slot: u32,
        views: Vec<Option<ViewId>>,
    },
    SetSamplers {
        stage: ShaderStage,
        start_slot: u32,
        samplers: Vec<Option<StateObjectId>>,
    },
    SetConstantBuffer {
        stage: PipelineStage,
        slot: u32,
        buffer: Option<BufferId>,
        range: Option<ConstantRange>,
    },
    SetShader {
        stage: PipelineStage,
        shader: Option<ShaderId>,
    },
    SetInputLayout(Option<InputLayoutId>),
    SetVertexBuffers {
        start_slot: u32,
        buffers: Vec<VertexBufferBinding>,
    },
    SetIndexBuffer {
        buffer: Option<BufferId>,
        format: IndexFormat,
        offset: u32,
    },
    SetPrimitiveTopology(PrimitiveTopology),
    SetStreamOutputTargets(Vec<StreamOutputTarget>),
    UpdateSubresource {
        buffer: BufferId,
        data: Vec<u8>,
    },
    WriteDiscard {
        buffer: BufferId,
        data: Vec<u8>,
    },
    CreateBuffer {
        buffer: BufferId,
        desc: BufferDesc,
    },
}

impl NativeCall {
    /// Short name used in logs and test failure messages.
    pub fn name(&self) -> &'static str {
        match self {
            NativeCall::SetRenderTargets { .. } => "SetRenderTargets",
            NativeCall::SetBlendState { .. } => "SetBlendState",
            NativeCall::SetDepthStencilState { .. } => "SetDepthStencilState",
            NativeCall::SetRasterizerState(_) => "SetRasterizerState",
            NativeCall::SetViewports(_) => "SetViewports",
            NativeCall::SetScissorRects(_) => "SetScissorRects",
            NativeCall::SetShaderResources { .. } => "SetShaderResources",
            NativeCall::SetUnorderedAccessViews { .. } => "SetUnorderedAccessViews",
            NativeCall::SetSamplers { .. } => "SetSamplers",
            NativeCall::SetConstantBuffer { .. } => "SetConstantBuffer",
            NativeCall::SetShader { .. } => "SetShader",
            NativeCall::SetInputLayout(_) => "SetInputLayout",
            NativeCall::SetVertexBuffers { .. } => "SetVertexBuffers",
            NativeCall::SetIndexBuffer { .. } => "SetIndexBuffer",
            NativeCall::SetPrimitiveTopology(_) => "SetPrimitiveTopology",
            NativeCall::SetStreamOutputTargets(_) => "SetStreamOutputTargets",
            NativeCall::UpdateSubresource { .. } => "UpdateSubresource",
            NativeCall::WriteDiscard { .. } => "WriteDiscard",
            NativeCall::CreateBuffer { .. } => "CreateBuffer",
        }
    }
}

#[derive(Debug)]
pub struct RecordingContext {
    calls: Vec<NativeCall>,
    serials: SerialFactory,
    buffers: HashMap<BufferId, Vec<u8>>,
    fail_next_create: Option<DeviceError>,
    fail_next_write: Option<DeviceError>,
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            serials: SerialFactory::starting_at(RECORDING_SERIAL_BASE),
            buffers: HashMap::new(),
            fail_next_create: None,
            fail_next_write: None,
        }
    }

    pub fn calls(&self) -> &[NativeCall] {
        &self.calls
    }

    /// Drains the recorded calls, leaving buffer contents intact.
    pub fn take_calls(&mut self) -> Vec<NativeCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.iter().map(NativeCall::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|call| call.name() == name).count()
    }

    /// Current contents of a buffer created through this context.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn fail_next_create(&mut self, err: DeviceError) {
        self.fail_next_create = Some(err);
    }

    pub fn fail_next_write(&mut self, err: DeviceError) {
        self.fail_next_write = Some(err);
    }

    fn write_bytes(&mut self, buffer: BufferId, data: &[u8]) {
        let contents = self.buffers.entry(buffer).or_default();
        if contents.len() < data.len() {
            contents.resize(data.len(), 0);
        }
        contents[..data.len()].copy_from_slice(data);
    }
}

impl DeviceContext for RecordingContext {
    fn set_render_targets(&mut self, render_targets: &[Option<ViewId>], depth_stencil: Option<ViewId>) {
        self.calls.push(NativeCall::SetRenderTargets {
            render_targets: render_targets.to_vec(),
            depth_stencil,
        });
    }

    fn set_blend_state(&mut self, state: Option<StateObjectId>, blend_factor: [f32; 4], sample_mask: u32) {
        self.calls.push(NativeCall::SetBlendState {
            state,
            blend_factor,
            sample_mask,
        });
    }

    fn set_depth_stencil_state(&mut self, state: Option<StateObjectId>, stencil_ref: u32) {
        self.calls
            .push(NativeCall::SetDepthStencilState { state, stencil_ref });
    }

    fn set_rasterizer_state(&mut self, state: Option<StateObjectId>) {
        self.calls.push(NativeCall::SetRasterizerState(state));
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.calls.push(NativeCall::SetViewports(viewports.to_vec()));
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        self.calls.push(NativeCall::SetScissorRects(rects.to_vec()));
    }

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<ViewId>]) {
        self.calls.push(NativeCall::SetShaderResources {
            stage,
            start_slot,
            views: views.to_vec(),
        });
    }

    fn set_unordered_access_views(&mut self, start_slot: u32, views: &[Option<ViewId>]) {
        self.calls.push(NativeCall::SetUnorderedAccessViews {
            start_slot,
            views: views.to_vec(),
        });
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<StateObjectId>]) {
        self.calls.push(NativeCall::SetSamplers {
            stage,
            start_slot,
            samplers: samplers.to_vec(),
        });
    }

    fn set_constant_buffer(
        &mut self,
        stage: PipelineStage,
        slot: u32,
        buffer: Option<BufferId>,
        range: Option<ConstantRange>,
    ) {
        self.calls.push(NativeCall::SetConstantBuffer {
            stage,
            slot,
            buffer,
            range,
        });
    }

    fn set_shader(&mut self, stage: PipelineStage, shader: Option<ShaderId>) {
        self.calls.push(NativeCall::SetShader { stage, shader });
    }

    fn set_input_layout(&mut self, layout: Option<InputLayoutId>) {
        self.calls.push(NativeCall::SetInputLayout(layout));
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[VertexBufferBinding]) {
        self.calls.push(NativeCall::SetVertexBuffers {
            start_slot,
            buffers: buffers.to_vec(),
        });
    }

    fn set_index_buffer(&mut self, buffer: Option<BufferId>, format: IndexFormat, offset: u32) {
        self.calls.push(NativeCall::SetIndexBuffer {
            buffer,
            format,
            offset,
        });
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.calls.push(NativeCall::SetPrimitiveTopology(topology));
    }

    fn set_stream_output_targets(&mut self, targets: &[StreamOutputTarget]) {
        self.calls
            .push(NativeCall::SetStreamOutputTargets(targets.to_vec()));
    }

    fn update_subresource(&mut self, buffer: BufferId, data: &[u8]) {
        self.write_bytes(buffer, data);
        self.calls.push(NativeCall::UpdateSubresource {
            buffer,
            data: data.to_vec(),
        });
    }

    fn write_discard(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), DeviceError> {
        if let Some(err) = self.fail_next_write.take() {
            return Err(err);
        }
        // Discard: the previous contents are gone.
        self.buffers.insert(buffer, data.to_vec());
        self.calls.push(NativeCall::WriteDiscard {
            buffer,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferId, DeviceError> {
        if let Some(err) = self.fail_next_create.take() {
            return Err(err);
        }
        if initial_data.is_some_and(|data| data.len() > desc.size as usize) {
            return Err(DeviceError::InvalidArgument(format!(
                "initial data larger than buffer size {}",
                desc.size
            )));
        }
        let buffer = BufferId(self.serials.generate());
        let mut contents = vec![0u8; desc.size as usize];
        if let Some(data) = initial_data {
            contents[..data.len()].copy_from_slice(data);
        }
        self.buffers.insert(buffer, contents);
        self.calls.push(NativeCall::CreateBuffer {
            buffer,
            desc: *desc,
        });
        Ok(buffer)
    }
}
