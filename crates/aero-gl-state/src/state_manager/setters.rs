//! Native-level setters for blits, clears and other internal passes.
//!
//! These bypass the higher-level state. Each one updates the applied snapshot and marks the
//! categories it disturbs, so the next draw restores the application's state.

use std::ops::Range;

use crate::caps::{DEFAULT_UNIFORM_BLOCK_SLOT, DRIVER_UNIFORM_SLOT};
use crate::dirty_bits::DirtyBits;
use crate::error::{Result, StateError};
use crate::gl::{GlState, Rectangle};
use crate::native::{
    DeviceContext, IndexFormat, PrimitiveTopology, ScissorRect, ShaderResourceView, TargetView,
};
use crate::query::{QueryControl, QueryId, QueryType};
use crate::serial::{BufferId, InputLayoutId, ResourceSerial, ShaderId, StateObjectId};
use crate::stage::{PipelineStage, ShaderStage};

use super::output::{rectangle_scissor, simple_viewport};
use super::StateManager;

impl StateManager {
    pub fn set_shader_resource(
        &mut self,
        device: &mut dyn DeviceContext,
        stage: ShaderStage,
        slot: usize,
        view: Option<ShaderResourceView>,
    ) {
        self.set_shader_resource_internal(device, stage, slot, view);
        self.invalidate(DirtyBits::TEXTURES_AND_SAMPLERS);
    }

    pub fn set_render_target(
        &mut self,
        device: &mut dyn DeviceContext,
        render_target: Option<TargetView>,
        depth_stencil: Option<TargetView>,
    ) {
        self.set_render_targets(device, render_target.as_slice(), depth_stencil);
    }

    /// Binds `render_targets` directly, unbinding any view that reads one of them first.
    pub fn set_render_targets(
        &mut self,
        device: &mut dyn DeviceContext,
        render_targets: &[TargetView],
        depth_stencil: Option<TargetView>,
    ) {
        let targets: Vec<&TargetView> = render_targets.iter().chain(depth_stencil.as_ref()).collect();
        let mut unbound = 0usize;
        for target in &targets {
            unbound += self.unset_conflicting_views(device, target.resource);
        }
        if unbound > 0 {
            self.stats.add_conflicting_views_unbound(unbound as u64);
            self.invalidate(DirtyBits::TEXTURES_AND_SAMPLERS);
        }
        self.render_target_writes = targets.iter().map(|target| (target.resource, None)).collect();

        let ids: Vec<_> = render_targets.iter().map(|target| Some(target.id)).collect();
        let depth_stencil = depth_stencil.map(|target| target.id);
        device.set_render_targets(&ids, depth_stencil);
        self.applied.render_targets = Some((ids, depth_stencil));
        self.invalidate(DirtyBits::RENDER_TARGET);
    }

    fn unset_conflicting_views(&mut self, device: &mut dyn DeviceContext, resource: ResourceSerial) -> usize {
        let mut unbound = 0;
        for stage in ShaderStage::GRAPHICS {
            let slots = crate::conflict::conflicting_srv_slots(&self.srv_caches[stage.index()], resource, None);
            for slot in slots {
                self.set_shader_resource_internal(device, stage, slot, None);
                unbound += 1;
            }
        }
        unbound
    }

    pub fn set_primitive_topology(&mut self, device: &mut dyn DeviceContext, topology: PrimitiveTopology) {
        if self.set_primitive_topology_internal(device, topology) {
            self.invalidate(DirtyBits::PRIMITIVE_TOPOLOGY);
        }
    }

    pub fn set_draw_shaders(
        &mut self,
        device: &mut dyn DeviceContext,
        vertex: Option<ShaderId>,
        geometry: Option<ShaderId>,
        pixel: Option<ShaderId>,
    ) {
        self.set_vertex_shader(device, vertex);
        self.set_geometry_shader(device, geometry);
        self.set_pixel_shader(device, pixel);
    }

    pub fn set_vertex_shader(&mut self, device: &mut dyn DeviceContext, shader: Option<ShaderId>) {
        if self.set_shader_internal(device, PipelineStage::Vertex, shader) {
            self.invalidate(DirtyBits::SHADERS);
        }
    }

    pub fn set_geometry_shader(&mut self, device: &mut dyn DeviceContext, shader: Option<ShaderId>) {
        if self.set_shader_internal(device, PipelineStage::Geometry, shader) {
            self.invalidate(DirtyBits::SHADERS);
        }
    }

    pub fn set_pixel_shader(&mut self, device: &mut dyn DeviceContext, shader: Option<ShaderId>) {
        if self.set_shader_internal(device, PipelineStage::Pixel, shader) {
            self.invalidate(DirtyBits::SHADERS);
        }
    }

    /// Compute shaders are re-checked on every dispatch.
    pub fn set_compute_shader(&mut self, device: &mut dyn DeviceContext, shader: Option<ShaderId>) {
        self.set_shader_internal(device, PipelineStage::Compute, shader);
    }

    pub fn set_vertex_constant_buffer(&mut self, device: &mut dyn DeviceContext, slot: u32, buffer: Option<BufferId>) {
        if self.set_constant_buffer_internal(device, PipelineStage::Vertex, slot, buffer, 0, 0) {
            self.invalidate_constant_buffer(slot);
        }
    }

    pub fn set_pixel_constant_buffer(&mut self, device: &mut dyn DeviceContext, slot: u32, buffer: Option<BufferId>) {
        if self.set_constant_buffer_internal(device, PipelineStage::Pixel, slot, buffer, 0, 0) {
            self.invalidate_constant_buffer(slot);
        }
    }

    fn invalidate_constant_buffer(&mut self, slot: u32) {
        match slot {
            DRIVER_UNIFORM_SLOT => self.invalidate_driver_uniforms(),
            DEFAULT_UNIFORM_BLOCK_SLOT => self.invalidate_program_uniforms(),
            _ => self.invalidate_program_uniform_buffers(),
        }
    }

    pub fn set_depth_stencil_state(
        &mut self,
        device: &mut dyn DeviceContext,
        state: Option<StateObjectId>,
        stencil_ref: u32,
    ) {
        let applied = (state, stencil_ref);
        if self.applied.depth_stencil != Some(applied) {
            device.set_depth_stencil_state(state, stencil_ref);
            self.applied.depth_stencil = Some(applied);
        }
        self.invalidate(DirtyBits::DEPTH_STENCIL_STATE);
    }

    /// Binds `state` with a null blend factor and an all-samples mask.
    pub fn set_simple_blend_state(&mut self, device: &mut dyn DeviceContext, state: Option<StateObjectId>) {
        let applied = (state, [0.0; 4], u32::MAX);
        if self.applied.blend != Some(applied) {
            device.set_blend_state(state, applied.1, applied.2);
            self.applied.blend = Some(applied);
        }
        self.invalidate(DirtyBits::BLEND_STATE);
    }

    pub fn set_rasterizer_state(&mut self, device: &mut dyn DeviceContext, state: Option<StateObjectId>) {
        if self.applied.rasterizer != Some(state) {
            device.set_rasterizer_state(state);
            self.applied.rasterizer = Some(state);
        }
        self.invalidate(DirtyBits::RASTERIZER_STATE);
    }

    /// One viewport covering `width` x `height` from the origin with the full depth range.
    pub fn set_simple_viewport(&mut self, device: &mut dyn DeviceContext, width: i32, height: i32) {
        let viewports = vec![simple_viewport(width, height)];
        if self.applied.viewports.as_ref() != Some(&viewports) {
            device.set_viewports(&viewports);
            self.applied.viewports = Some(viewports);
        }
        self.invalidate(DirtyBits::VIEWPORT_STATE);
    }

    pub fn set_simple_scissor_rect(&mut self, device: &mut dyn DeviceContext, rect: &Rectangle) {
        self.set_scissor_rect_d3d(device, rectangle_scissor(rect));
    }

    pub fn set_scissor_rect_d3d(&mut self, device: &mut dyn DeviceContext, rect: ScissorRect) {
        let rects = vec![rect];
        if self.applied.scissor_rects.as_ref() != Some(&rects) {
            device.set_scissor_rects(&rects);
            self.applied.scissor_rects = Some(rects);
        }
        self.invalidate(DirtyBits::SCISSOR_STATE);
    }

    /// Binds a single fragment view and sampler at slot 0, as blit shaders expect.
    pub fn set_simple_pixel_texture_and_sampler(
        &mut self,
        device: &mut dyn DeviceContext,
        view: ShaderResourceView,
        sampler: StateObjectId,
    ) {
        self.set_shader_resource_internal(device, ShaderStage::Fragment, 0, Some(view));
        device.set_samplers(ShaderStage::Fragment, 0, &[Some(sampler)]);
        // The next texture sync must rebind slot 0 regardless of what it last applied.
        if let Some(applied) = self.applied_samplers[ShaderStage::Fragment.index()].first_mut() {
            *applied = None;
        }
        self.invalidate(DirtyBits::TEXTURES_AND_SAMPLERS);
    }

    pub fn set_input_layout(&mut self, device: &mut dyn DeviceContext, layout: Option<InputLayoutId>) {
        if self.set_input_layout_internal(device, layout) {
            self.invalidate(DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT);
        }
    }

    /// Binds `buffer` at slot 0. The next draw re-derives every vertex buffer slot.
    pub fn set_single_vertex_buffer(
        &mut self,
        device: &mut dyn DeviceContext,
        buffer: Option<BufferId>,
        stride: u32,
        offset: u32,
    ) {
        if self.vertex_buffers.queue_change(0, buffer, stride, offset) {
            self.vertex_buffers.apply_changes(device);
            self.invalidate(DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT);
        }
    }

    pub fn set_index_buffer(
        &mut self,
        device: &mut dyn DeviceContext,
        buffer: Option<BufferId>,
        format: IndexFormat,
        offset: u32,
    ) {
        if self.set_index_buffer_internal(device, buffer, format, offset) {
            self.index_buffer_dirty = true;
        }
    }

    /// Unbinds the stage's views in `slots` with a single native call.
    pub fn clear_srvs(&mut self, device: &mut dyn DeviceContext, stage: ShaderStage, slots: Range<usize>) {
        self.clear_srv_range(device, stage, slots.start, slots.end);
    }

    pub fn clear_uavs(&mut self, device: &mut dyn DeviceContext, slots: Range<usize>) {
        self.clear_uav_range(device, slots.start, slots.end);
    }

    /// Records that `query` was started on this context.
    pub fn on_begin_query(&mut self, query: QueryId) {
        self.current_queries.insert(query.serial, query);
    }

    pub fn on_delete_query(&mut self, serial: ResourceSerial) {
        self.current_queries.remove(&serial);
    }

    /// The context became current: pauses the queries started before and resumes the ones
    /// active in `state`.
    pub fn on_make_current(&mut self, state: &GlState, control: &mut dyn QueryControl) -> Result<()> {
        let mut previous: Vec<QueryId> = self.current_queries.values().copied().collect();
        previous.sort_by_key(|query| query.serial);
        for query in previous {
            control.pause(query).map_err(|source| StateError::Query {
                action: "pause",
                query_type: query.query_type,
                source,
            })?;
        }
        // Only forgotten once every pause went through.
        self.current_queries.clear();

        for query_type in QueryType::ALL {
            let Some(query) = state.active_queries[query_type.index()] else {
                continue;
            };
            control.resume(query).map_err(|source| StateError::Query {
                action: "resume",
                query_type,
                source,
            })?;
            self.current_queries.insert(query.serial, query);
        }
        Ok(())
    }
}
