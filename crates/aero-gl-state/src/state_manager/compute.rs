use crate::conflict::conflicting_srv_slots;
use crate::error::{Result, StateError};
use crate::gl::{GlState, ProgramInfo};
use crate::native::DeviceContext;
use crate::stage::{PipelineStage, ShaderStage};

use super::{linked_program, Backend, StateManager};

impl StateManager {
    /// Brings the compute pipeline in line with `state` for a dispatch of `groups` work groups.
    ///
    /// Compute state is not tracked by dirty bits. Every dispatch walks it, and the applied
    /// snapshots keep unchanged bindings from being re-issued.
    pub fn update_state_for_compute(
        &mut self,
        backend: &mut Backend<'_>,
        state: &GlState,
        groups: [u32; 3],
    ) -> Result<()> {
        let program = linked_program(state)?;
        let [x, y, z] = groups;
        self.shader_constants.on_dispatch(x, y, z);

        self.generate_swizzles_for_stage(backend, state, ShaderStage::Compute)?;
        self.sync_stage_textures(backend, state, ShaderStage::Compute)?;
        self.sync_compute_images(backend.device, state, program);
        self.sync_default_uniforms(backend.device, state, ShaderStage::Compute)?;
        self.sync_driver_uniforms(backend.device, state, ShaderStage::Compute)?;
        self.sync_uniform_buffers(backend.device, state, ShaderStage::Compute);

        let shader = backend
            .executables
            .compute_executable(program)
            .map_err(StateError::Executable)?;
        self.set_shader_internal(backend.device, PipelineStage::Compute, shader);

        self.stats.inc_compute_flushes();
        tracing::trace!(x, y, z, "compute state applied");
        Ok(())
    }

    /// Read-only images bind as views after the textures; writable images bind as unordered
    /// access views.
    fn sync_compute_images(&mut self, device: &mut dyn DeviceContext, state: &GlState, program: &ProgramInfo) {
        let caps = &self.config.caps;
        let first_image_slot = caps.max_compute_texture_image_units as usize;
        let image_slots = caps.max_image_units as usize;

        let readonly = program.readonly_image_units.len().min(image_slots);
        for (index, unit) in program.readonly_image_units.iter().take(readonly).enumerate() {
            let view = state
                .image_units
                .get(*unit as usize)
                .and_then(|binding| binding.srv);
            self.set_shader_resource_internal(device, ShaderStage::Compute, first_image_slot + index, view);
        }
        self.clear_srv_range(
            device,
            ShaderStage::Compute,
            first_image_slot + readonly,
            first_image_slot + image_slots,
        );

        let writable = program.image_units.len().min(image_slots);
        let mut unbound = 0u64;
        for (slot, unit) in program.image_units.iter().take(writable).enumerate() {
            let view = state
                .image_units
                .get(*unit as usize)
                .and_then(|binding| binding.uav);
            if let Some(view) = view {
                // A resource cannot be read through a view and written through another.
                let conflicts =
                    conflicting_srv_slots(&self.srv_caches[ShaderStage::Compute.index()], view.resource, None);
                for conflict in conflicts {
                    self.set_shader_resource_internal(device, ShaderStage::Compute, conflict, None);
                    unbound += 1;
                }
            }
            self.set_unordered_access_view_internal(device, slot, view);
        }
        if unbound > 0 {
            self.stats.add_conflicting_views_unbound(unbound);
        }
        self.clear_uav_range(device, writable, image_slots);
    }
}
