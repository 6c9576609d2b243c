use std::ops::Range;

use crate::caps::MAX_VERTEX_ATTRIBS;
use crate::native::{DeviceContext, VertexBufferBinding};
use crate::serial::BufferId;

/// Applied vertex-buffer bindings and the slot range changed since the last native call.
///
/// Changes are queued per slot and flushed with one `set_vertex_buffers` call covering the dirty
/// range.
#[derive(Debug)]
pub struct VertexBufferState {
    buffers: [Option<BufferId>; MAX_VERTEX_ATTRIBS],
    strides: [u32; MAX_VERTEX_ATTRIBS],
    offsets: [u32; MAX_VERTEX_ATTRIBS],
    dirty: Option<Range<usize>>,
}

impl Default for VertexBufferState {
    fn default() -> Self {
        Self::new()
    }
}

impl VertexBufferState {
    pub fn new() -> Self {
        // Unmatchable stride/offset so the first queued change always lands.
        Self {
            buffers: [None; MAX_VERTEX_ATTRIBS],
            strides: [u32::MAX; MAX_VERTEX_ATTRIBS],
            offsets: [u32::MAX; MAX_VERTEX_ATTRIBS],
            dirty: None,
        }
    }

    /// Forgets the applied bindings; the next queued change of every slot lands.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn binding(&self, slot: usize) -> VertexBufferBinding {
        VertexBufferBinding {
            buffer: self.buffers[slot],
            stride: self.strides[slot],
            offset: self.offsets[slot],
        }
    }

    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// Records a binding. Returns whether it differs from the applied one.
    pub fn queue_change(&mut self, slot: usize, buffer: Option<BufferId>, stride: u32, offset: u32) -> bool {
        debug_assert!(slot < MAX_VERTEX_ATTRIBS, "vertex buffer slot {slot} out of range");
        if slot >= MAX_VERTEX_ATTRIBS {
            return false;
        }
        if self.buffers[slot] == buffer && self.strides[slot] == stride && self.offsets[slot] == offset {
            return false;
        }
        self.buffers[slot] = buffer;
        self.strides[slot] = stride;
        self.offsets[slot] = offset;
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(slot)..range.end.max(slot + 1),
            None => slot..slot + 1,
        });
        true
    }

    /// Issues one native call for the dirty range. Returns whether a call was made.
    pub fn apply_changes(&mut self, device: &mut dyn DeviceContext) -> bool {
        let Some(range) = self.dirty.take() else {
            return false;
        };
        let bindings: Vec<VertexBufferBinding> = range.clone().map(|slot| self.binding(slot)).collect();
        device.set_vertex_buffers(range.start as u32, &bindings);
        true
    }
}
