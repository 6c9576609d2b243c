//! Input assembly and shader selection: shaders, current values, transform feedback, vertex
//! buffers with the input layout, the primitive topology and the index buffer.

use std::sync::Arc;

use crate::caps::MAX_VERTEX_ATTRIBS;
use crate::dirty_bits::DirtyBits;
use crate::error::{Result, StateError, StateObjectKind};
use crate::gl::{DrawCall, DrawElementsType, GlState, IndexSource, IndexedDraw, PrimitiveMode, ProgramInfo};
use crate::index::TranslatedIndexData;
use crate::native::{DeviceContext, IndexFormat, PrimitiveTopology};
use crate::serial::{BufferId, InputLayoutId, ShaderId};
use crate::stage::PipelineStage;
use crate::topology::{translate_primitive_topology, TopologyInputs, UNREACHABLE_DRAW_COUNT};
use crate::vertex::{
    ensure_slot_zero_not_instanced, sort_attributes_by_layout, InputLayoutKey, SortedAttribute,
    POINT_SPRITE_INDICES, POINT_SPRITE_VERTEX_STRIDE,
};

use super::{linked_program, Backend, IndexKey, Pending, StateManager};

impl StateManager {
    fn uses_point_sprite_quad(&self, program: &ProgramInfo) -> bool {
        program.uses_instanced_point_sprite_emulation(
            self.config.workarounds.use_instanced_point_sprite_emulation,
        )
    }

    /// Program attributes in native semantic order, with disabled arrays reading their current
    /// value.
    fn sorted_attributes(&self, state: &GlState, program: &ProgramInfo) -> Vec<Option<SortedAttribute>> {
        let mut attributes =
            sort_attributes_by_layout(program, &state.vertex_array.attributes, &self.current_value_attribs);
        for entry in attributes.iter_mut().flatten() {
            if !entry.attribute.active {
                entry.attribute.format = state.current_values[entry.location].format();
            }
        }
        if self.config.caps.feature_level.is_legacy() {
            ensure_slot_zero_not_instanced(&mut attributes);
        }
        attributes
    }

    fn input_layout_key(&self, program: &ProgramInfo, attributes: &[Option<SortedAttribute>]) -> InputLayoutKey {
        InputLayoutKey::new(
            attributes,
            self.uses_point_sprite_quad(program),
            self.current_mode == Some(PrimitiveMode::Points),
        )
    }

    /// Returns whether the stage's shader changed.
    pub(super) fn set_shader_internal(
        &mut self,
        device: &mut dyn DeviceContext,
        stage: PipelineStage,
        shader: Option<ShaderId>,
    ) -> bool {
        let applied = &mut self.applied.shaders[stage.index()];
        if *applied == Some(shader) {
            return false;
        }
        device.set_shader(stage, shader);
        *applied = Some(shader);
        true
    }

    pub(super) fn sync_shaders(&mut self, backend: &mut Backend<'_>, state: &GlState) -> Result<()> {
        let program = linked_program(state)?;
        let mode = self.current_mode.unwrap_or(PrimitiveMode::Triangles);
        let attributes = self.sorted_attributes(state, program);
        let key = self.input_layout_key(program, &attributes);
        let executables = backend
            .executables
            .draw_executables(program, mode, &key)
            .map_err(StateError::Executable)?;

        let pixel = if state.rasterizer.rasterizer_discard {
            None
        } else {
            executables.pixel
        };
        let geometry = if state.is_transform_feedback_active_unpaused() {
            executables.stream_output
        } else {
            executables.geometry
        };
        self.set_shader_internal(backend.device, PipelineStage::Vertex, executables.vertex);
        self.set_shader_internal(backend.device, PipelineStage::Geometry, geometry);
        self.set_shader_internal(backend.device, PipelineStage::Pixel, pixel);
        Ok(())
    }

    /// Stores the current values of active attributes whose array is disabled.
    pub(super) fn sync_current_values(
        &mut self,
        backend: &mut Backend<'_>,
        state: &GlState,
        pending: &mut Pending,
    ) -> Result<()> {
        let program = linked_program(state)?;
        let mut dirty = self.dirty_current_values & program.active_attrib_locations;
        while dirty != 0 {
            let attrib = dirty.trailing_zeros() as usize;
            dirty &= dirty - 1;
            if attrib >= MAX_VERTEX_ATTRIBS {
                break;
            }
            if state.vertex_array.attributes[attrib].active {
                self.dirty_current_values &= !(1 << attrib);
                continue;
            }
            backend
                .vertex_data
                .store_current_value(
                    backend.device,
                    &state.current_values[attrib],
                    &mut self.current_value_attribs[attrib],
                    attrib,
                )
                .map_err(|source| StateError::CurrentValue { attrib, source })?;
            self.dirty_current_values &= !(1 << attrib);
        }
        pending.defer(DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT);
        Ok(())
    }

    pub(super) fn sync_transform_feedback(&mut self, device: &mut dyn DeviceContext, state: &GlState) {
        let active = state
            .transform_feedback
            .as_ref()
            .filter(|_| state.is_transform_feedback_active_unpaused());
        let Some(transform_feedback) = active else {
            if self.applied.transform_feedback.take().is_some() {
                device.set_stream_output_targets(&[]);
            }
            return;
        };
        let identity = (transform_feedback.serial, transform_feedback.version);
        if self.applied.transform_feedback == Some(identity) {
            return;
        }
        device.set_stream_output_targets(&transform_feedback.targets);
        self.applied.transform_feedback = Some(identity);
    }

    /// Returns whether the layout changed.
    pub(super) fn set_input_layout_internal(
        &mut self,
        device: &mut dyn DeviceContext,
        layout: Option<InputLayoutId>,
    ) -> bool {
        if self.applied.input_layout == Some(layout) {
            return false;
        }
        device.set_input_layout(layout);
        self.applied.input_layout = Some(layout);
        true
    }

    pub(super) fn sync_vertex_buffers(&mut self, backend: &mut Backend<'_>, state: &GlState) -> Result<()> {
        let program = linked_program(state)?;
        let quad = self.uses_point_sprite_quad(program);
        let points = self.current_mode == Some(PrimitiveMode::Points);
        let attributes = self.sorted_attributes(state, program);
        let key = self.input_layout_key(program, &attributes);

        let layout = backend
            .states
            .input_layout(&key)
            .map_err(StateError::state_object(StateObjectKind::InputLayout))?;
        if self.set_input_layout_internal(backend.device, Some(layout)) {
            self.stats.inc_input_layout_changes();
        }

        let reserved = usize::from(quad);
        for index in 0..MAX_VERTEX_ATTRIBS - reserved {
            let (buffer, stride, offset) = match attributes.get(index).copied().flatten() {
                Some(entry) => (
                    entry.attribute.vertex_buffer,
                    entry.attribute.stride,
                    entry
                        .attribute
                        .compute_offset(entry.location, self.first_vertex)?,
                ),
                None => (None, 0, 0),
            };
            self.vertex_buffers
                .queue_change(reserved + index, buffer, stride, offset);
        }

        if quad {
            let existing = [self.point_sprites.vertex_buffer(), self.point_sprites.index_buffer()]
                .iter()
                .filter(|buffer| buffer.is_some())
                .count();
            let (vertices, _) = self.point_sprites.ensure(backend.device)?;
            for _ in existing..2 {
                self.stats.inc_buffers_created();
            }
            // Outside of point draws the shader ignores the quad; a zero stride keeps it in place.
            let stride = if points { POINT_SPRITE_VERTEX_STRIDE } else { 0 };
            self.vertex_buffers.queue_change(0, Some(vertices), stride, 0);
        }
        self.instanced_point_sprites = quad && points;

        self.vertex_buffers.apply_changes(backend.device);
        Ok(())
    }

    /// Re-offsets per-instance attributes for one emulated instance of a point-sprite draw.
    ///
    /// Point sprites already use instancing for the quad, so an application-level instanced draw
    /// is split into one native draw per instance, each preceded by this call.
    pub fn update_vertex_offsets_for_point_sprites(
        &mut self,
        device: &mut dyn DeviceContext,
        state: &GlState,
        first_vertex: i32,
        emulated_instance_id: u32,
    ) -> Result<()> {
        let program = linked_program(state)?;
        let reserved = usize::from(self.uses_point_sprite_quad(program));
        let attributes = self.sorted_attributes(state, program);
        for (index, entry) in attributes.iter().enumerate().take(MAX_VERTEX_ATTRIBS - reserved) {
            let Some(entry) = entry else {
                continue;
            };
            let attribute = &entry.attribute;
            if attribute.divisor == 0 {
                continue;
            }
            let overflow = || StateError::VertexOffsetOverflow {
                attrib: entry.location,
                first_vertex,
            };
            let offset = attribute
                .compute_offset(entry.location, first_vertex)?
                .checked_add(
                    attribute
                        .stride
                        .checked_mul(emulated_instance_id / attribute.divisor)
                        .ok_or_else(overflow)?,
                )
                .ok_or_else(overflow)?;
            if self.vertex_buffers.queue_change(
                reserved + index,
                attribute.vertex_buffer,
                attribute.stride,
                offset,
            ) {
                // The next draw restores the base offsets.
                self.invalidate(DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT);
            }
        }
        self.vertex_buffers.apply_changes(device);
        Ok(())
    }

    /// Returns whether the topology changed.
    pub(super) fn set_primitive_topology_internal(
        &mut self,
        device: &mut dyn DeviceContext,
        topology: PrimitiveTopology,
    ) -> bool {
        if self.applied.topology == Some(topology) {
            return false;
        }
        device.set_primitive_topology(topology);
        self.applied.topology = Some(topology);
        true
    }

    pub(super) fn sync_primitive_topology(&mut self, device: &mut dyn DeviceContext, state: &GlState) {
        let (Some(program), Some(mode)) = (state.program(), self.current_mode) else {
            return;
        };
        let translation = translate_primitive_topology(&TopologyInputs {
            mode,
            uses_point_size: program.uses_point_size,
            instanced_point_sprite_emulation: self.config.workarounds.use_instanced_point_sprite_emulation,
            transform_feedback_active: state.is_transform_feedback_active_unpaused(),
            culls_everything: state.rasterizer.culls_everything(),
        });
        self.minimum_draw_count = translation.minimum_draw_count;

        if translation.is_undefined_point_size() {
            tracing::warn!(
                program = %program.serial,
                "point draw without a written point size; the draw is skipped"
            );
            self.stats.inc_undefined_point_size_warnings();
            return;
        }
        if translation.minimum_draw_count == UNREACHABLE_DRAW_COUNT {
            self.stats.inc_culled_everything_topologies();
        }
        if let Some(topology) = translation.topology {
            self.set_primitive_topology_internal(device, topology);
        }
    }

    /// Returns whether the binding changed.
    pub(super) fn set_index_buffer_internal(
        &mut self,
        device: &mut dyn DeviceContext,
        buffer: Option<BufferId>,
        format: IndexFormat,
        offset: u32,
    ) -> bool {
        let binding = (buffer, format, offset);
        if self.applied.index_buffer == Some(binding) {
            return false;
        }
        device.set_index_buffer(buffer, format, offset);
        self.applied.index_buffer = Some(binding);
        true
    }

    /// Prepares and binds index data after the flush.
    ///
    /// Non-indexed fans and loops get synthesized indices so the index data manager can rewrite
    /// them into lists and closed strips.
    pub(super) fn sync_index_data(
        &mut self,
        backend: &mut Backend<'_>,
        state: &GlState,
        draw: &DrawCall,
    ) -> Result<Option<TranslatedIndexData>> {
        if self.instanced_point_sprites {
            let Some(indices) = self.point_sprites.index_buffer() else {
                return Err(StateError::InvalidIndexData("point sprite index buffer missing"));
            };
            self.set_index_buffer_internal(backend.device, Some(indices), IndexFormat::Uint16, 0);
            return Ok(Some(TranslatedIndexData {
                buffer: indices,
                format: IndexFormat::Uint16,
                start_offset: 0,
                index_count: POINT_SPRITE_INDICES.len() as u32,
            }));
        }

        let indexed = match &draw.indices {
            Some(indexed) => indexed.clone(),
            None if matches!(draw.mode, PrimitiveMode::TriangleFan | PrimitiveMode::LineLoop) => {
                sequential_indices(draw.vertex_count)
            }
            None => return Ok(None),
        };

        let key = IndexKey {
            mode: draw.mode,
            draw: indexed,
            element_array: state.vertex_array.element_array_buffer.clone(),
        };
        let cached = match &self.last_index {
            Some((last, translated)) if !self.index_buffer_dirty && *last == key => Some(*translated),
            _ => None,
        };
        let translated = match cached {
            Some(translated) => translated,
            None => {
                let translated = backend.index_data.prepare_index_data(
                    backend.device,
                    key.mode,
                    &key.draw,
                    key.element_array.as_ref(),
                )?;
                self.index_buffer_dirty = false;
                self.last_index = Some((key, translated));
                translated
            }
        };
        self.set_index_buffer_internal(
            backend.device,
            Some(translated.buffer),
            translated.format,
            translated.start_offset,
        );
        Ok(Some(translated))
    }
}

/// `0..count` as 32-bit client indices. Vertex buffer offsets already account for the first
/// vertex.
fn sequential_indices(count: u32) -> IndexedDraw {
    let bytes: Vec<u8> = (0..count).flat_map(u32::to_le_bytes).collect();
    IndexedDraw {
        index_type: DrawElementsType::UnsignedInt,
        count,
        source: IndexSource::Client(Arc::from(bytes)),
        primitive_restart: false,
    }
}
