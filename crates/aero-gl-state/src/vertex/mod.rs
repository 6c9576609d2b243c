//! Vertex input assembly: attribute ordering, input-layout keys, vertex-buffer bindings,
//! current-value storage and the point-sprite quad.

mod attributes;
mod buffers;
mod current_value;
mod input_layout;
mod point_sprite;

pub use attributes::{
    ensure_slot_zero_not_instanced, find_first_non_instanced, sort_attributes_by_layout,
    SortedAttribute, TranslatedAttribute,
};
pub use buffers::VertexBufferState;
pub use current_value::CurrentValueBuffers;
pub use input_layout::{InputElement, InputLayoutKey};
pub use point_sprite::{
    PointSpriteBuffers, PointSpriteVertex, POINT_SPRITE_INDICES, POINT_SPRITE_VERTEX_STRIDE,
    POINT_SPRITE_VERTICES,
};

use crate::gl::CurrentValue;
use crate::native::{DeviceContext, DeviceError};

/// Places vertex data the application did not put in a buffer where the input assembler can read
/// it.
pub trait VertexDataManager {
    /// Stores the current value of generic attribute `index` and points `attrib` at it.
    fn store_current_value(
        &mut self,
        device: &mut dyn DeviceContext,
        value: &CurrentValue,
        attrib: &mut TranslatedAttribute,
        index: usize,
    ) -> Result<(), DeviceError>;
}
