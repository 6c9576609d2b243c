use crate::gl::VertexFormat;
use crate::vertex::SortedAttribute;

/// One element of a native input layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic: u32,
    pub format: VertexFormat,
    pub input_slot: u32,
    /// Zero advances per vertex.
    pub instance_step_rate: u32,
}

/// Canonical description of the vertex input shape, used to look up input layouts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InputLayoutKey {
    pub elements: Vec<InputElement>,
    /// Slot 0 carries the point-sprite quad; attribute slots start at 1.
    pub point_sprite_quad: bool,
    /// Points are being drawn as quads, so every attribute steps per instance.
    pub instanced_point_sprites: bool,
}

impl InputLayoutKey {
    /// Builds the key from attributes already ordered by [`super::sort_attributes_by_layout`].
    pub fn new(attributes: &[Option<SortedAttribute>], point_sprite_quad: bool, points_mode: bool) -> Self {
        let reserved_slots = u32::from(point_sprite_quad);
        let instanced_point_sprites = point_sprite_quad && points_mode;
        let elements = attributes
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let entry = entry.as_ref()?;
                let divisor = entry.attribute.divisor;
                // Each emulated point is one instance of the quad.
                let instance_step_rate = if instanced_point_sprites && divisor == 0 {
                    1
                } else {
                    divisor
                };
                Some(InputElement {
                    semantic: entry.semantic,
                    format: entry.attribute.format,
                    input_slot: reserved_slots + index as u32,
                    instance_step_rate,
                })
            })
            .collect();
        Self {
            elements,
            point_sprite_quad,
            instanced_point_sprites,
        }
    }

    /// Vertex formats per semantic, used to pick the matching vertex shader variant.
    pub fn signature(&self) -> Vec<(u32, VertexFormat)> {
        self.elements
            .iter()
            .map(|element| (element.semantic, element.format))
            .collect()
    }
}
