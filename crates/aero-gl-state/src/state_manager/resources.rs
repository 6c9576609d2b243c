//! Shader-visible resources: texture views, samplers, unordered-access views and constant
//! buffers.

use crate::caps::{
    DEFAULT_UNIFORM_BLOCK_SLOT, DRIVER_UNIFORM_SLOT, MAX_CONSTANT_BUFFER_SLOTS,
    RESERVED_CONSTANT_BUFFER_SLOTS,
};
use crate::conflict::image_index_conflicts_with_srv;
use crate::error::{Result, StateError, StateObjectKind};
use crate::gl::{GlState, SamplerState};
use crate::native::{
    BufferDesc, BufferUsage, ConstantRange, DeviceContext, ShaderResourceView, UnorderedAccessView,
};
use crate::serial::BufferId;
use crate::stage::{PipelineStage, ShaderStage};

use super::{linked_program, Backend, ConstantBufferBinding, StateManager};

/// Bytes per shader constant register.
const CONSTANT_SIZE: u64 = 16;

/// Window of a uniform block inside its buffer, in constants. `None` binds the whole buffer.
pub(crate) fn constant_buffer_range(offset: u64, size: u64) -> Option<ConstantRange> {
    let first_constant = offset / CONSTANT_SIZE;
    if first_constant == 0 || size == 0 {
        return None;
    }
    // Ranged binds take multiples of 16 constants.
    let num_constants = size.div_ceil(CONSTANT_SIZE).next_multiple_of(16);
    Some(ConstantRange {
        first_constant: u32::try_from(first_constant).unwrap_or(u32::MAX),
        num_constants: u32::try_from(num_constants).unwrap_or(u32::MAX),
    })
}

impl StateManager {
    /// Binds `view` at `slot` unless it is already there.
    pub(super) fn set_shader_resource_internal(
        &mut self,
        device: &mut dyn DeviceContext,
        stage: ShaderStage,
        slot: usize,
        view: Option<ShaderResourceView>,
    ) {
        let cache = &mut self.srv_caches[stage.index()];
        debug_assert!(slot < cache.len(), "{stage} view slot {slot} out of range");
        if slot >= cache.len() || cache.get(slot) == view.as_ref() {
            return;
        }
        device.set_shader_resources(stage, slot as u32, &[view.map(|view| view.id)]);
        cache.update(slot, view);
    }

    pub(super) fn set_unordered_access_view_internal(
        &mut self,
        device: &mut dyn DeviceContext,
        slot: usize,
        view: Option<UnorderedAccessView>,
    ) {
        debug_assert!(slot < self.uav_cache.len(), "image slot {slot} out of range");
        if slot >= self.uav_cache.len() || self.uav_cache.get(slot) == view.as_ref() {
            return;
        }
        device.set_unordered_access_views(slot as u32, &[view.map(|view| view.id)]);
        self.uav_cache.update(slot, view);
    }

    /// Unbinds `start..end` of the stage's views with one native call. Only slots below the
    /// cache's high-water mark are touched, and nothing is issued when they are all empty.
    pub(super) fn clear_srv_range(
        &mut self,
        device: &mut dyn DeviceContext,
        stage: ShaderStage,
        start: usize,
        end: usize,
    ) {
        let cache = &mut self.srv_caches[stage.index()];
        let end = end.min(cache.highest_used());
        if !(start..end).any(|slot| cache.get(slot).is_some()) {
            return;
        }
        device.set_shader_resources(stage, start as u32, &vec![None; end - start]);
        for slot in start..end {
            cache.update(slot, None);
        }
    }

    pub(super) fn clear_uav_range(&mut self, device: &mut dyn DeviceContext, start: usize, end: usize) {
        let end = end.min(self.uav_cache.highest_used());
        if !(start..end).any(|slot| self.uav_cache.get(slot).is_some()) {
            return;
        }
        device.set_unordered_access_views(start as u32, &vec![None; end - start]);
        for slot in start..end {
            self.uav_cache.update(slot, None);
        }
    }

    fn set_sampler_internal(
        &mut self,
        backend: &mut Backend<'_>,
        stage: ShaderStage,
        index: usize,
        sampler: &SamplerState,
    ) -> Result<()> {
        let id = backend
            .states
            .sampler_state(sampler)
            .map_err(StateError::state_object(StateObjectKind::Sampler))?;
        let Some(applied) = self.applied_samplers[stage.index()].get_mut(index) else {
            return Ok(());
        };
        if *applied != Some(id) {
            backend.device.set_samplers(stage, index as u32, &[Some(id)]);
            *applied = Some(id);
        }
        Ok(())
    }

    /// The view reads a resource the bound render targets write.
    fn is_render_target_input(&self, view: &ShaderResourceView) -> bool {
        self.render_target_writes.iter().any(|(resource, index)| {
            *resource == view.resource
                && index
                    .as_ref()
                    .map_or(true, |index| image_index_conflicts_with_srv(index, &view.dimension))
        })
    }

    /// Binds the textures and samplers the program samples from in `stage`.
    /// Regenerates the swizzled copy of every texture `stage` samples with a non-identity swizzle.
    pub(super) fn generate_swizzles_for_stage(
        &mut self,
        backend: &mut Backend<'_>,
        state: &GlState,
        stage: ShaderStage,
    ) -> Result<()> {
        let program = linked_program(state)?;
        for index in 0..program.used_sampler_range(stage) {
            let Some(binding) = program.sampler(stage, index) else {
                continue;
            };
            let Some(texture) = state.texture(binding.texture_unit) else {
                continue;
            };
            if !texture.texture.swizzle_required() {
                continue;
            }
            backend
                .swizzles
                .generate_swizzle(backend.device, texture)
                .map_err(|source| StateError::Swizzle {
                    unit: binding.texture_unit,
                    source,
                })?;
            tracing::trace!(%stage, unit = binding.texture_unit, "swizzle generated");
        }
        Ok(())
    }

    pub(super) fn sync_stage_textures(
        &mut self,
        backend: &mut Backend<'_>,
        state: &GlState,
        stage: ShaderStage,
    ) -> Result<()> {
        let program = linked_program(state)?;
        let capacity = self.config.caps.max_shader_texture_units(stage);
        let range = program.used_sampler_range(stage).min(capacity);
        if stage == ShaderStage::Vertex {
            // The fragment pass follows; both decide whether any view is held back.
            self.withheld_views = false;
        }

        for index in 0..range {
            let slot = index as usize;
            let Some(binding) = program.sampler(stage, index) else {
                self.set_shader_resource_internal(backend.device, stage, slot, None);
                continue;
            };
            let bound = match state.texture(binding.texture_unit) {
                Some(texture) => Some((
                    texture,
                    state
                        .sampler_object(binding.texture_unit)
                        .copied()
                        .unwrap_or(texture.sampler),
                )),
                None => state
                    .incomplete_textures
                    .get(binding.texture_type)
                    .map(|texture| (texture, texture.sampler)),
            };
            let Some((texture, sampler)) = bound else {
                self.set_shader_resource_internal(backend.device, stage, slot, None);
                continue;
            };

            self.set_sampler_internal(backend, stage, slot, &sampler)?;
            self.shader_constants
                .on_sampler_change(stage, slot, &texture.texture);

            let view = if stage != ShaderStage::Compute && self.is_render_target_input(&texture.srv) {
                tracing::trace!(%stage, slot, "withholding view of a bound render target");
                self.withheld_views = true;
                None
            } else {
                Some(texture.srv)
            };
            self.set_shader_resource_internal(backend.device, stage, slot, view);
        }

        self.clear_srv_range(backend.device, stage, range as usize, capacity as usize);
        Ok(())
    }

    /// Returns whether the slot changed.
    pub(super) fn set_constant_buffer_internal(
        &mut self,
        device: &mut dyn DeviceContext,
        stage: PipelineStage,
        slot: u32,
        buffer: Option<BufferId>,
        offset: u64,
        size: u64,
    ) -> bool {
        let index = slot as usize;
        debug_assert!(index < MAX_CONSTANT_BUFFER_SLOTS, "{stage} constant buffer slot {slot} out of range");
        let Some(applied) = self.constant_buffers[stage.index()].get_mut(index) else {
            return false;
        };
        let binding = ConstantBufferBinding { buffer, offset, size };
        if *applied == Some(binding) {
            return false;
        }
        let range = if buffer.is_some() {
            constant_buffer_range(offset, size)
        } else {
            None
        };
        device.set_constant_buffer(stage, slot, buffer, range);
        *applied = Some(binding);
        true
    }

    /// Uploads changed default-block uniforms and binds their buffer.
    pub(super) fn sync_default_uniforms(
        &mut self,
        device: &mut dyn DeviceContext,
        state: &GlState,
        stage: ShaderStage,
    ) -> Result<()> {
        let program = linked_program(state)?;
        let Some(storage) = program.uniform_storage(stage) else {
            return Ok(());
        };
        let identity = Some((storage.buffer, storage.version));
        if self.uploaded_uniforms[stage.index()] != identity {
            if !storage.data.is_empty() {
                device.update_subresource(storage.buffer, &storage.data);
            }
            self.uploaded_uniforms[stage.index()] = identity;
        }
        self.set_constant_buffer_internal(
            device,
            stage.as_pipeline_stage(),
            DEFAULT_UNIFORM_BLOCK_SLOT,
            Some(storage.buffer),
            0,
            0,
        );
        Ok(())
    }

    fn ensure_driver_buffer(&mut self, device: &mut dyn DeviceContext, stage: ShaderStage) -> Result<BufferId> {
        if let Some(buffer) = self.driver_buffers[stage.index()] {
            return Ok(buffer);
        }
        let size = self.shader_constants.required_buffer_size(stage);
        let desc = BufferDesc {
            size: u32::try_from(size).unwrap_or(u32::MAX),
            usage: BufferUsage::Constant,
            dynamic: true,
        };
        let buffer = device
            .create_buffer(&desc, None)
            .map_err(StateError::allocation("driver constant buffer"))?;
        self.stats.inc_buffers_created();
        tracing::debug!(%stage, size, ?buffer, "created driver constant buffer");
        self.driver_buffers[stage.index()] = Some(buffer);
        Ok(buffer)
    }

    /// Uploads the driver constants of `stage` if they changed.
    pub(super) fn sync_driver_uniforms(
        &mut self,
        device: &mut dyn DeviceContext,
        state: &GlState,
        stage: ShaderStage,
    ) -> Result<()> {
        let program = linked_program(state)?;
        let buffer = self.ensure_driver_buffer(device, stage)?;
        self.set_constant_buffer_internal(
            device,
            stage.as_pipeline_stage(),
            DRIVER_UNIFORM_SLOT,
            Some(buffer),
            0,
            0,
        );
        if self
            .shader_constants
            .update_buffer(device, stage, program.used_sampler_range(stage), buffer)?
        {
            self.stats.inc_driver_constant_uploads();
        }
        if stage == ShaderStage::Fragment && self.config.es3_capable {
            // The geometry stage reads the pixel constants for point sprites and multiview.
            self.set_constant_buffer_internal(device, PipelineStage::Geometry, 0, Some(buffer), 0, 0);
        }
        Ok(())
    }

    /// Binds the buffers backing the program's uniform blocks.
    pub(super) fn sync_uniform_buffers(
        &mut self,
        device: &mut dyn DeviceContext,
        state: &GlState,
        stage: ShaderStage,
    ) {
        let Some(program) = state.program() else {
            return;
        };
        for (block, binding) in program.uniform_block_bindings[stage.index()].iter().enumerate() {
            let Some(binding) = binding else {
                continue;
            };
            let Some(uniform_buffer) = state.uniform_buffer(*binding) else {
                continue;
            };
            let slot = RESERVED_CONSTANT_BUFFER_SLOTS + block as u32;
            if slot as usize >= MAX_CONSTANT_BUFFER_SLOTS {
                tracing::warn!(%stage, block, "uniform block beyond the constant buffer slots");
                continue;
            }
            self.set_constant_buffer_internal(
                device,
                stage.as_pipeline_stage(),
                slot,
                Some(uniform_buffer.buffer),
                uniform_buffer.offset,
                uniform_buffer.size,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_buffer_binds_need_no_range() {
        assert_eq!(constant_buffer_range(0, 256), None);
        assert_eq!(constant_buffer_range(256, 0), None);
    }

    #[test]
    fn ranges_round_up_to_sixteen_constants() {
        assert_eq!(
            constant_buffer_range(256, 100),
            Some(ConstantRange {
                first_constant: 16,
                num_constants: 16,
            })
        );
        assert_eq!(
            constant_buffer_range(512, 300),
            Some(ConstantRange {
                first_constant: 32,
                num_constants: 32,
            })
        );
    }
}
