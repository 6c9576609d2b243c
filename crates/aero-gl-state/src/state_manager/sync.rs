use crate::dirty_bits::DirtyBits;
use crate::gl::{AttachmentSource, FramebufferState, GlDirtyBits, GlState, Offset};

use super::StateManager;

const BLEND_BITS: GlDirtyBits = GlDirtyBits::BLEND_ENABLED
    .union(GlDirtyBits::BLEND_FUNCS)
    .union(GlDirtyBits::BLEND_EQUATIONS)
    .union(GlDirtyBits::COLOR_MASK)
    .union(GlDirtyBits::SAMPLE_ALPHA_TO_COVERAGE_ENABLED)
    .union(GlDirtyBits::DITHER_ENABLED);

const DEPTH_STENCIL_BITS: GlDirtyBits = GlDirtyBits::DEPTH_TEST_ENABLED
    .union(GlDirtyBits::DEPTH_FUNC)
    .union(GlDirtyBits::DEPTH_MASK)
    .union(GlDirtyBits::STENCIL_TEST_ENABLED)
    .union(GlDirtyBits::STENCIL_FUNCS_FRONT)
    .union(GlDirtyBits::STENCIL_FUNCS_BACK)
    .union(GlDirtyBits::STENCIL_OPS_FRONT)
    .union(GlDirtyBits::STENCIL_OPS_BACK)
    .union(GlDirtyBits::STENCIL_WRITEMASK_FRONT)
    .union(GlDirtyBits::STENCIL_WRITEMASK_BACK);

const CULL_BITS: GlDirtyBits = GlDirtyBits::CULL_FACE_ENABLED
    .union(GlDirtyBits::CULL_FACE)
    .union(GlDirtyBits::FRONT_FACE);

impl StateManager {
    /// Translates higher-level change notifications into internal dirty bits.
    ///
    /// Each reported value is compared against the one last synced, so a value toggled back and
    /// forth between two draws invalidates nothing.
    pub fn sync_state(&mut self, state: &GlState, dirty: GlDirtyBits) {
        if dirty.is_empty() {
            return;
        }
        tracing::trace!(?dirty, "sync_state");

        if dirty.intersects(BLEND_BITS) && state.blend != self.gl.blend {
            self.invalidate_blend();
        }
        if dirty.contains(GlDirtyBits::BLEND_COLOR) && state.blend_color != self.gl.blend_color {
            self.invalidate_blend();
        }
        if dirty.intersects(GlDirtyBits::SAMPLE_COVERAGE | GlDirtyBits::SAMPLE_MASK)
            && (state.sample_coverage != self.gl.sample_coverage
                || state.sample_mask != self.gl.sample_mask)
        {
            self.invalidate_blend();
        }

        if dirty.intersects(DEPTH_STENCIL_BITS)
            && (state.depth_stencil != self.gl.depth_stencil
                || state.stencil_ref != self.gl.stencil_ref
                || state.stencil_back_ref != self.gl.stencil_back_ref)
        {
            self.invalidate_depth_stencil();
        }

        let raster = &state.rasterizer;
        let synced = &self.gl.rasterizer;
        if dirty.intersects(CULL_BITS)
            && (raster.cull_face != synced.cull_face
                || raster.cull_mode != synced.cull_mode
                || raster.front_face != synced.front_face)
        {
            // Culling both faces turns the topology into a no-op.
            self.invalidate(DirtyBits::RASTERIZER_STATE | DirtyBits::PRIMITIVE_TOPOLOGY);
        }
        let raster = &state.rasterizer;
        let synced = &self.gl.rasterizer;
        if dirty.intersects(GlDirtyBits::POLYGON_OFFSET_FILL_ENABLED | GlDirtyBits::POLYGON_OFFSET)
            && (raster.polygon_offset_fill != synced.polygon_offset_fill
                || raster.polygon_offset_factor != synced.polygon_offset_factor
                || raster.polygon_offset_units != synced.polygon_offset_units)
        {
            self.invalidate_rasterizer();
        }
        if dirty.contains(GlDirtyBits::RASTERIZER_DISCARD_ENABLED)
            && state.rasterizer.rasterizer_discard != self.gl.rasterizer.rasterizer_discard
        {
            self.invalidate_rasterizer_discard();
        }

        if dirty.contains(GlDirtyBits::SCISSOR_TEST_ENABLED) && state.scissor_test != self.gl.scissor_test {
            self.invalidate_scissor_enabled();
        }
        if dirty.contains(GlDirtyBits::SCISSOR) && state.scissor != self.gl.scissor {
            self.invalidate_scissor();
        }
        if dirty.contains(GlDirtyBits::DEPTH_RANGE)
            && (state.near_z != self.gl.near_z || state.far_z != self.gl.far_z)
        {
            self.invalidate_viewport();
        }
        if dirty.contains(GlDirtyBits::VIEWPORT) && state.viewport != self.gl.viewport {
            self.invalidate_viewport();
        }

        if dirty.contains(GlDirtyBits::DRAW_FRAMEBUFFER_BINDING) {
            self.invalidate_render_target();
            self.handle_multiview_change(&state.draw_framebuffer);
        }
        if dirty.contains(GlDirtyBits::VERTEX_ARRAY_BINDING) {
            self.invalidate_vertex_array();
        }
        if dirty.contains(GlDirtyBits::UNIFORM_BUFFER_BINDINGS) {
            self.invalidate_program_uniform_buffers();
        }
        if dirty.intersects(GlDirtyBits::TEXTURE_BINDINGS | GlDirtyBits::SAMPLER_BINDINGS) {
            self.invalidate_textures();
        }
        if dirty.contains(GlDirtyBits::TRANSFORM_FEEDBACK_BINDING) {
            self.invalidate_transform_feedback();
        }
        if dirty.contains(GlDirtyBits::PROGRAM_EXECUTABLE) {
            self.invalidate_program();
        }
        if dirty.contains(GlDirtyBits::CURRENT_VALUES) {
            let mut attribs = state.dirty_current_values;
            while attribs != 0 {
                let attrib = attribs.trailing_zeros() as usize;
                attribs &= attribs - 1;
                self.invalidate_current_value(attrib);
            }
        }
        // Image bindings are read by the compute path on every dispatch.
    }

    /// Picks up the new viewport offsets and the multiview shader constant.
    fn handle_multiview_change(&mut self, framebuffer: &FramebufferState) {
        let offsets = if framebuffer.view_offsets.is_empty() {
            vec![Offset::default()]
        } else {
            framebuffer.view_offsets.clone()
        };
        if offsets != self.view_offsets {
            self.view_offsets = offsets;
            self.invalidate(DirtyBits::VIEWPORT_STATE | DirtyBits::SCISSOR_STATE);
        }

        // Side-by-side views write the viewport index from the vertex shader.
        let write_index = if framebuffer.is_multiview() { 1.0 } else { 0.0 };
        if write_index != self.multiview_write_index {
            self.multiview_write_index = write_index;
            self.shader_constants
                .set_multiview_write_to_viewport_index(write_index);
            self.invalidate_driver_uniforms();
        }
    }

    /// Re-derives everything that depends on the attachments of the draw framebuffer.
    pub(super) fn process_framebuffer_invalidation(&mut self, state: &GlState) {
        if !self.render_target_is_dirty {
            return;
        }
        self.render_target_is_dirty = false;
        self.invalidate(DirtyBits::RENDER_TARGET);

        let framebuffer = &state.draw_framebuffer;

        // Packed depth-stencil formats carry both aspects; mask off the one the application did
        // not ask for.
        let disable_depth = !framebuffer.has_depth() && framebuffer.has_stencil();
        let disable_stencil = framebuffer.has_depth() && !framebuffer.has_stencil();
        let stencil_size = framebuffer.stencil_bits();
        if disable_depth != self.disable_depth
            || disable_stencil != self.disable_stencil
            || stencil_size != self.stencil_size
        {
            self.disable_depth = disable_depth;
            self.disable_stencil = disable_stencil;
            self.stencil_size = stencil_size;
            self.invalidate_depth_stencil();
        }

        let multisample = framebuffer.samples != 0;
        if multisample != self.multisample {
            self.multisample = multisample;
            self.invalidate_rasterizer();
        }

        self.check_present_path(framebuffer);

        if self.config.caps.feature_level.is_legacy() {
            let bounds = framebuffer.first_color_attachment().map(|attachment| attachment.size);
            if bounds != self.viewport_bounds {
                self.viewport_bounds = bounds;
                self.invalidate_viewport();
            }
        }
    }

    /// Rendering straight into the back buffer skips the final flip, so the Y axis is inverted
    /// here instead.
    fn check_present_path(&mut self, framebuffer: &FramebufferState) {
        if !self.config.workarounds.present_path_fast_enabled {
            return;
        }
        let back_buffer = framebuffer
            .first_color_attachment()
            .filter(|attachment| attachment.source == AttachmentSource::Default);
        let active = back_buffer.is_some();
        let height = back_buffer.map_or(0, |attachment| attachment.size.height);
        if active != self.present_path_fast || (active && height != self.present_path_height) {
            tracing::debug!(active, height, "present path changed");
            self.present_path_fast = active;
            self.present_path_height = height;
            self.invalidate(
                DirtyBits::SCISSOR_STATE | DirtyBits::RASTERIZER_STATE | DirtyBits::VIEWPORT_STATE,
            );
        }
    }
}
