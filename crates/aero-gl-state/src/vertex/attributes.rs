use crate::caps::MAX_VERTEX_ATTRIBS;
use crate::error::{Result, StateError};
use crate::gl::{ProgramInfo, VertexFormat};
use crate::serial::BufferId;

/// A vertex attribute after the vertex array layer resolved where its data lives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TranslatedAttribute {
    /// The generic attribute array is enabled. Disabled attributes read their current value.
    pub active: bool,
    pub format: VertexFormat,
    pub vertex_buffer: Option<BufferId>,
    pub stride: u32,
    pub divisor: u32,
    pub base_offset: u32,
    /// Data is read straight from the application's buffer, so the first vertex shifts the offset.
    /// Streamed data already starts at the first vertex.
    pub uses_first_vertex_offset: bool,
}

impl Default for TranslatedAttribute {
    fn default() -> Self {
        Self {
            active: false,
            format: VertexFormat::FLOAT4,
            vertex_buffer: None,
            stride: 0,
            divisor: 0,
            base_offset: 0,
            uses_first_vertex_offset: false,
        }
    }
}

impl TranslatedAttribute {
    /// Byte offset of the first vertex fetched for a draw starting at `first_vertex`.
    pub fn compute_offset(&self, attrib: usize, first_vertex: i32) -> Result<u32> {
        if !self.uses_first_vertex_offset {
            return Ok(self.base_offset);
        }
        u32::try_from(first_vertex)
            .ok()
            .and_then(|first| self.stride.checked_mul(first))
            .and_then(|skip| self.base_offset.checked_add(skip))
            .ok_or(StateError::VertexOffsetOverflow {
                attrib,
                first_vertex,
            })
    }
}

/// An attribute placed at its native input semantic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SortedAttribute {
    pub semantic: u32,
    pub location: usize,
    pub attribute: TranslatedAttribute,
}

/// Orders the program's active attributes by native semantic.
///
/// Attributes whose array is disabled are replaced by the matching current-value attribute. Holes
/// left by unused semantics stay `None`.
pub fn sort_attributes_by_layout(
    program: &ProgramInfo,
    vertex_array_attribs: &[TranslatedAttribute; MAX_VERTEX_ATTRIBS],
    current_value_attribs: &[TranslatedAttribute; MAX_VERTEX_ATTRIBS],
) -> Vec<Option<SortedAttribute>> {
    let mut sorted: Vec<Option<SortedAttribute>> = Vec::new();
    for location in 0..MAX_VERTEX_ATTRIBS {
        if !program.is_attrib_location_active(location) {
            continue;
        }
        let semantic = program.attrib_location_to_semantic[location];
        let slot = semantic as usize;
        debug_assert!(slot < MAX_VERTEX_ATTRIBS, "semantic {semantic} out of range");
        if slot >= MAX_VERTEX_ATTRIBS {
            continue;
        }
        if sorted.len() <= slot {
            sorted.resize(slot + 1, None);
        }
        let array_attrib = &vertex_array_attribs[location];
        let attribute = if array_attrib.active {
            *array_attrib
        } else {
            current_value_attribs[location]
        };
        sorted[slot] = Some(SortedAttribute {
            semantic,
            location,
            attribute,
        });
    }
    sorted
}

/// Index of the first attribute that advances per vertex.
pub fn find_first_non_instanced(attributes: &[Option<SortedAttribute>]) -> Option<usize> {
    attributes
        .iter()
        .position(|entry| entry.is_some_and(|entry| entry.attribute.divisor == 0))
}

/// Legacy feature levels reject a per-instance element in input slot 0. Swap in the first
/// per-vertex attribute when there is one; otherwise leave the order alone.
pub fn ensure_slot_zero_not_instanced(attributes: &mut [Option<SortedAttribute>]) {
    let Some(Some(first)) = attributes.first() else {
        return;
    };
    if first.attribute.divisor == 0 {
        return;
    }
    if let Some(index) = find_first_non_instanced(attributes) {
        attributes.swap(0, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::SerialFactory;

    fn attrib(divisor: u32) -> TranslatedAttribute {
        TranslatedAttribute {
            active: true,
            stride: 16,
            divisor,
            ..Default::default()
        }
    }

    fn program(active: u32, semantics: &[(usize, u32)]) -> ProgramInfo {
        let mut program = ProgramInfo::new(SerialFactory::new().generate());
        program.active_attrib_locations = active;
        for &(location, semantic) in semantics {
            program.attrib_location_to_semantic[location] = semantic;
        }
        program
    }

    #[test]
    fn offsets_follow_first_vertex_only_for_direct_storage() {
        let mut a = attrib(0);
        a.base_offset = 8;
        assert_eq!(a.compute_offset(0, 10).unwrap(), 8);
        a.uses_first_vertex_offset = true;
        assert_eq!(a.compute_offset(0, 10).unwrap(), 168);
        assert!(matches!(
            a.compute_offset(3, -1),
            Err(StateError::VertexOffsetOverflow { attrib: 3, .. })
        ));
        a.stride = u32::MAX;
        assert!(a.compute_offset(0, 2).is_err());
    }

    #[test]
    fn disabled_arrays_use_current_values() {
        let program = program(0b101, &[(0, 1), (2, 0)]);
        let mut arrays = [TranslatedAttribute::default(); MAX_VERTEX_ATTRIBS];
        arrays[0] = attrib(0);
        let mut current = [TranslatedAttribute::default(); MAX_VERTEX_ATTRIBS];
        current[2].stride = 0;
        current[2].base_offset = 32;

        let sorted = sort_attributes_by_layout(&program, &arrays, &current);
        assert_eq!(sorted.len(), 2);
        let slot0 = sorted[0].unwrap();
        assert_eq!((slot0.location, slot0.semantic), (2, 0));
        assert_eq!(slot0.attribute.base_offset, 32);
        assert!(!slot0.attribute.active);
        assert_eq!(sorted[1].unwrap().attribute, arrays[0]);
    }

    #[test]
    fn instanced_slot_zero_is_swapped_with_first_per_vertex() {
        let program = program(0b111, &[]);
        let mut arrays = [TranslatedAttribute::default(); MAX_VERTEX_ATTRIBS];
        arrays[0] = attrib(1);
        arrays[1] = attrib(2);
        arrays[2] = attrib(0);
        let current = [TranslatedAttribute::default(); MAX_VERTEX_ATTRIBS];

        let mut sorted = sort_attributes_by_layout(&program, &arrays, &current);
        ensure_slot_zero_not_instanced(&mut sorted);
        let order: Vec<_> = sorted.iter().map(|e| e.unwrap().semantic).collect();
        assert_eq!(order, [2, 1, 0]);
    }

    #[test]
    fn all_instanced_is_left_alone() {
        let program = program(0b11, &[]);
        let mut arrays = [TranslatedAttribute::default(); MAX_VERTEX_ATTRIBS];
        arrays[0] = attrib(1);
        arrays[1] = attrib(1);
        let current = [TranslatedAttribute::default(); MAX_VERTEX_ATTRIBS];
        let mut sorted = sort_attributes_by_layout(&program, &arrays, &current);
        ensure_slot_zero_not_instanced(&mut sorted);
        assert_eq!(sorted[0].unwrap().semantic, 0);
    }
}
