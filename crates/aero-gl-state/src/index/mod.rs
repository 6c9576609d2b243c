//! Index data preparation.
//!
//! The state manager asks an [`IndexDataManager`] for index data matching the native topology it
//! is about to apply, then binds the result unless it matches the last applied index buffer.

mod rewrite;
mod streaming;

pub use rewrite::{close_line_loop, decode_indices, expand_triangle_fan, restart_index, widen_u8_indices};
pub use streaming::StreamingIndexDataManager;

use crate::error::Result;
use crate::gl::{ElementArrayBuffer, IndexedDraw, PrimitiveMode};
use crate::native::{DeviceContext, IndexFormat};
use crate::serial::BufferId;

/// Index data ready to bind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TranslatedIndexData {
    pub buffer: BufferId,
    pub format: IndexFormat,
    /// Byte offset of the first index in `buffer`.
    pub start_offset: u32,
    /// Indices to draw after any rewriting.
    pub index_count: u32,
}

pub trait IndexDataManager {
    fn prepare_index_data(
        &mut self,
        device: &mut dyn DeviceContext,
        mode: PrimitiveMode,
        draw: &IndexedDraw,
        element_array: Option<&ElementArrayBuffer>,
    ) -> Result<TranslatedIndexData>;
}
