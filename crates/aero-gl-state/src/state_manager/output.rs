//! Output-merger and rasterizer state: render targets, viewports, scissor rects and the
//! blend, depth-stencil and rasterizer objects.

use crate::cache::{BlendStateKey, RasterizerStateKey};
use crate::caps::MAX_VIEWPORT_BOUND;
use crate::dirty_bits::DirtyBits;
use crate::error::{Result, StateError, StateObjectKind};
use crate::gl::{AttachmentSource, GlState, PrimitiveMode, Rectangle};
use crate::native::{DeviceContext, ScissorRect, Viewport};
use crate::serial::ResourceSerial;
use crate::stage::ShaderStage;

use super::{Backend, Pending, StateManager};

/// Coverage mask the blend state is applied with.
pub(super) fn sample_mask(state: &GlState) -> u32 {
    let samples = state.draw_framebuffer.samples;
    let mut mask = u32::MAX;
    if let Some(coverage) = state.sample_coverage {
        mask = if samples > 0 {
            let covered = (coverage.value.clamp(0.0, 1.0) * samples as f32).round() as u32;
            if covered >= 32 {
                u32::MAX
            } else {
                (1u32 << covered) - 1
            }
        } else if coverage.value != 0.0 {
            u32::MAX
        } else {
            0
        };
        if coverage.invert {
            mask = !mask;
        }
    }
    mask & state.sample_mask.unwrap_or(u32::MAX)
}

impl StateManager {
    pub(super) fn sync_render_targets(
        &mut self,
        device: &mut dyn DeviceContext,
        state: &GlState,
        pending: &mut Pending,
    ) -> Result<()> {
        let framebuffer = &state.draw_framebuffer;
        if framebuffer.is_default() {
            let size = framebuffer
                .first_color_attachment()
                .map_or(framebuffer.default_size, |attachment| attachment.size);
            if size.width == 0 || size.height == 0 {
                // The surface has no backing yet.
                return Ok(());
            }
        }

        let active_outputs = state.program().map_or(u32::MAX, |program| program.active_output_mask);
        let skip_inactive = self.config.workarounds.mrt_perf_workaround;
        let max_targets = self.config.caps.max_draw_buffers as usize;

        let mut render_targets = Vec::with_capacity(framebuffer.color_attachments.len());
        let mut writes = Vec::new();
        let mut unbound = 0usize;
        for (index, attachment) in framebuffer.color_attachments.iter().enumerate().take(max_targets) {
            let output_active = index < 32 && active_outputs & (1 << index) != 0;
            if skip_inactive
                && (attachment.is_none() || !framebuffer.is_draw_buffer_active(index) || !output_active)
            {
                continue;
            }
            let Some(attachment) = attachment else {
                render_targets.push(None);
                continue;
            };
            unbound += self.unset_conflicting_attachment(device, attachment.view.resource, &attachment.source);
            if let Some(write) = attachment_write(attachment.view.resource, &attachment.source) {
                writes.push(write);
            }
            render_targets.push(Some(attachment.view.id));
        }
        while render_targets.last() == Some(&None) {
            render_targets.pop();
        }

        let depth_stencil = framebuffer.depth_stencil.map(|attachment| {
            unbound += self.unset_conflicting_attachment(device, attachment.view.resource, &attachment.source);
            if let Some(write) = attachment_write(attachment.view.resource, &attachment.source) {
                writes.push(write);
            }
            attachment.view.id
        });

        if unbound > 0 {
            self.stats.add_conflicting_views_unbound(unbound as u64);
            pending.defer(DirtyBits::TEXTURES_AND_SAMPLERS);
        }

        let binding = (render_targets, depth_stencil);
        if self.applied.render_targets.as_ref() != Some(&binding) {
            tracing::trace!(count = binding.0.len(), depth_stencil = binding.1.is_some(), "render targets");
            device.set_render_targets(&binding.0, binding.1);
            self.applied.render_targets = Some(binding);
        }

        if writes != self.render_target_writes {
            // Views withheld for the previous targets may be sampleable again.
            if self.withheld_views {
                pending.defer(DirtyBits::TEXTURES_AND_SAMPLERS);
            }
            self.render_target_writes = writes;
        }
        Ok(())
    }

    /// Unbinds vertex and fragment views of a resource about to be written. Returns how many
    /// slots were unbound.
    pub(super) fn unset_conflicting_attachment(
        &mut self,
        device: &mut dyn DeviceContext,
        resource: ResourceSerial,
        source: &AttachmentSource,
    ) -> usize {
        let index = match source {
            AttachmentSource::Texture(index) => Some(*index),
            AttachmentSource::Default => None,
            // Renderbuffers are never sampled.
            AttachmentSource::Renderbuffer => return 0,
        };
        let mut unbound = 0;
        for stage in ShaderStage::GRAPHICS {
            let slots = crate::conflict::conflicting_srv_slots(
                &self.srv_caches[stage.index()],
                resource,
                index.as_ref(),
            );
            for slot in slots {
                tracing::trace!(%stage, slot, %resource, "unbinding view of a render target");
                self.set_shader_resource_internal(device, stage, slot, None);
                unbound += 1;
            }
        }
        unbound
    }

    pub(super) fn sync_viewport(
        &mut self,
        device: &mut dyn DeviceContext,
        state: &GlState,
        pending: &mut Pending,
    ) -> Result<()> {
        let caps = &self.config.caps;
        let legacy = caps.feature_level.is_legacy();
        let gl_viewport = state.viewport;
        let framebuffer = &state.draw_framebuffer;

        let (min_x, max_x, min_y, max_y) = match (legacy, self.viewport_bounds) {
            (true, Some(bounds)) => (0, bounds.width, 0, bounds.height),
            _ => {
                let max_x = (2 * caps.max_viewport_width - 1).min(MAX_VIEWPORT_BOUND);
                let max_y = (2 * caps.max_viewport_height - 1).min(MAX_VIEWPORT_BOUND);
                (-(max_x + 1), max_x, -(max_y + 1), max_y)
            }
        };

        let mut width = gl_viewport.width;
        let mut height = gl_viewport.height;
        let no_attachments = framebuffer.color_attachments.iter().all(Option::is_none)
            && framebuffer.depth_stencil.is_none();
        if !framebuffer.is_default() && no_attachments {
            let default_size = framebuffer.default_size;
            if default_size.width > 0 && default_size.height > 0 {
                width = width.min(default_size.width);
                height = height.min(default_size.height);
            }
        }

        let near = state.near_z.clamp(0.0, 1.0);
        let far = state.far_z.clamp(0.0, 1.0);

        let mut viewports = Vec::with_capacity(self.view_offsets.len());
        let mut adjust = Viewport::default();
        for offset in &self.view_offsets {
            let x = (gl_viewport.x + offset.x).clamp(min_x, max_x);
            let y = (gl_viewport.y + offset.y).clamp(min_y, max_y);
            let w = width.clamp(0, (max_x - x).max(0));
            let h = height.clamp(0, (max_y - y).max(0));
            adjust = Viewport {
                top_left_x: x as f32,
                top_left_y: y as f32,
                width: w as f32,
                height: h as f32,
                min_depth: near,
                max_depth: far,
            };
            let mut viewport = adjust;
            if self.present_path_fast {
                viewport.top_left_y = (self.present_path_height - y - h) as f32;
            }
            viewports.push(viewport);
        }

        if self.applied.viewports.as_ref() != Some(&viewports) {
            tracing::trace!(?viewports, "viewports");
            device.set_viewports(&viewports);
            self.applied.viewports = Some(viewports);
        }
        self.gl.viewport = gl_viewport;
        self.gl.near_z = state.near_z;
        self.gl.far_z = state.far_z;

        let constants = (gl_viewport, adjust, self.present_path_fast);
        if self.applied.viewport_constants != Some(constants) {
            self.shader_constants
                .on_viewport_change(&gl_viewport, &adjust, legacy, self.present_path_fast);
            self.applied.viewport_constants = Some(constants);
            pending.defer(DirtyBits::DRIVER_UNIFORMS);
        }
        Ok(())
    }

    pub(super) fn sync_scissor(&mut self, device: &mut dyn DeviceContext, state: &GlState) -> Result<()> {
        let scissor = state.scissor;
        if state.scissor_test {
            let y = if self.present_path_fast {
                self.present_path_height - scissor.height - scissor.y
            } else {
                scissor.y
            };
            let rects: Vec<ScissorRect> = self
                .view_offsets
                .iter()
                .map(|offset| scissor_rect(scissor.x + offset.x, y + offset.y, scissor.width, scissor.height))
                .collect();
            if self.applied.scissor_rects.as_ref() != Some(&rects) {
                device.set_scissor_rects(&rects);
                self.applied.scissor_rects = Some(rects);
            }
        }
        self.gl.scissor = scissor;
        self.gl.scissor_test = state.scissor_test;
        Ok(())
    }

    pub(super) fn sync_rasterizer(&mut self, backend: &mut Backend<'_>, state: &GlState) -> Result<()> {
        let mut raster = state.rasterizer;
        raster.point_draw_mode = self.current_mode == Some(PrimitiveMode::Points);
        raster.multi_sample = self.multisample;
        if self.present_path_fast {
            raster.front_face = raster.front_face.flipped();
        }

        let key = RasterizerStateKey::new(&raster, self.gl.scissor_test);
        let id = backend
            .states
            .rasterizer_state(&key)
            .map_err(StateError::state_object(StateObjectKind::Rasterizer))?;
        if self.applied.rasterizer != Some(Some(id)) {
            backend.device.set_rasterizer_state(Some(id));
            self.applied.rasterizer = Some(Some(id));
        }
        self.gl.rasterizer = state.rasterizer;
        Ok(())
    }

    pub(super) fn sync_blend(&mut self, backend: &mut Backend<'_>, state: &GlState) -> Result<()> {
        let blend = &state.blend;
        let key = BlendStateKey::new(&state.draw_framebuffer, blend);
        let id = backend
            .states
            .blend_state(&key)
            .map_err(StateError::state_object(StateObjectKind::Blend))?;

        // The native blend factor is one color; constant-alpha factors read it per channel.
        let color = state.blend_color;
        let factor = if blend.uses_constant_alpha() && !blend.uses_constant_color() {
            [color.alpha; 4]
        } else {
            color.to_array()
        };
        let mask = sample_mask(state);

        let applied = (Some(id), factor, mask);
        if self.applied.blend != Some(applied) {
            backend.device.set_blend_state(Some(id), factor, mask);
            self.applied.blend = Some(applied);
        }
        self.gl.blend = *blend;
        self.gl.blend_color = color;
        self.gl.sample_coverage = state.sample_coverage;
        self.gl.sample_mask = state.sample_mask;
        Ok(())
    }

    pub(super) fn sync_depth_stencil(&mut self, backend: &mut Backend<'_>, state: &GlState) -> Result<()> {
        let mut depth_stencil = state.depth_stencil;
        if self.disable_depth {
            depth_stencil.depth_test = false;
            depth_stencil.depth_mask = false;
        }
        if self.disable_stencil {
            depth_stencil.stencil_test = false;
        }
        if !depth_stencil.stencil_test || self.stencil_size == 0 {
            depth_stencil.front.writemask = 0;
            depth_stencil.back.writemask = 0;
        }

        let id = backend
            .states
            .depth_stencil_state(&depth_stencil)
            .map_err(StateError::state_object(StateObjectKind::DepthStencil))?;
        let stencil_ref = state.stencil_ref.clamp(0, 0xFF) as u32;
        let applied = (Some(id), stencil_ref);
        if self.applied.depth_stencil != Some(applied) {
            backend.device.set_depth_stencil_state(Some(id), stencil_ref);
            self.applied.depth_stencil = Some(applied);
        }
        self.gl.depth_stencil = state.depth_stencil;
        self.gl.stencil_ref = state.stencil_ref;
        self.gl.stencil_back_ref = state.stencil_back_ref;
        Ok(())
    }
}

fn attachment_write(
    resource: ResourceSerial,
    source: &AttachmentSource,
) -> Option<(ResourceSerial, Option<crate::gl::ImageIndex>)> {
    match source {
        AttachmentSource::Texture(index) => Some((resource, Some(*index))),
        AttachmentSource::Default => Some((resource, None)),
        AttachmentSource::Renderbuffer => None,
    }
}

fn scissor_rect(x: i32, y: i32, width: i32, height: i32) -> ScissorRect {
    ScissorRect {
        left: x.max(0),
        top: y.max(0),
        right: x + width.max(0),
        bottom: y + height.max(0),
    }
}

/// Viewport in the form the fixed-size blit paths use.
pub(super) fn simple_viewport(width: i32, height: i32) -> Viewport {
    Viewport {
        top_left_x: 0.0,
        top_left_y: 0.0,
        width: width as f32,
        height: height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub(super) fn rectangle_scissor(rect: &Rectangle) -> ScissorRect {
    scissor_rect(rect.x, rect.y, rect.width, rect.height)
}
