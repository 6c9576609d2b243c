//! Per-slot record of the resource views currently bound to a shader stage.

use crate::native::{ShaderResourceView, UnorderedAccessView};
use crate::serial::{ResourceSerial, ViewId};

/// A view that can sit in a [`ViewCache`] slot.
pub trait BoundView: Copy + PartialEq {
    fn view_id(&self) -> ViewId;
    fn resource(&self) -> ResourceSerial;
}

impl BoundView for ShaderResourceView {
    fn view_id(&self) -> ViewId {
        self.id
    }

    fn resource(&self) -> ResourceSerial {
        self.resource
    }
}

impl BoundView for UnorderedAccessView {
    fn view_id(&self) -> ViewId {
        self.id
    }

    fn resource(&self) -> ResourceSerial {
        self.resource
    }
}

/// Slot table of bound views.
///
/// An empty slot is `None`, so a record never carries a view without its resource or the other way
/// round. `highest_used` is the exclusive upper bound of occupied slots and lets bulk unbinds stop
/// early.
#[derive(Debug, Clone)]
pub struct ViewCache<V> {
    views: Vec<Option<V>>,
    highest_used: usize,
}

impl<V: BoundView> Default for ViewCache<V> {
    fn default() -> Self {
        Self {
            views: Vec::new(),
            highest_used: 0,
        }
    }
}

impl<V: BoundView> ViewCache<V> {
    pub fn with_capacity(slots: usize) -> Self {
        let mut cache = Self::default();
        cache.initialize(slots);
        cache
    }

    /// Sizes the table once the device limits are known. Existing bindings are dropped.
    pub fn initialize(&mut self, slots: usize) {
        self.views = vec![None; slots];
        self.highest_used = 0;
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn highest_used(&self) -> usize {
        self.highest_used
    }

    pub fn get(&self, slot: usize) -> Option<&V> {
        debug_assert!(slot < self.views.len(), "view slot {slot} out of range");
        self.views.get(slot).and_then(Option::as_ref)
    }

    pub fn view_id(&self, slot: usize) -> Option<ViewId> {
        self.get(slot).map(BoundView::view_id)
    }

    pub fn update(&mut self, slot: usize, view: Option<V>) {
        debug_assert!(slot < self.views.len(), "view slot {slot} out of range");
        let Some(entry) = self.views.get_mut(slot) else {
            return;
        };
        *entry = view;

        if view.is_some() {
            self.highest_used = self.highest_used.max(slot + 1);
        } else if slot + 1 == self.highest_used {
            while self.highest_used > 0 && self.views[self.highest_used - 1].is_none() {
                self.highest_used -= 1;
            }
        }
    }

    /// Unbinds every slot.
    pub fn clear(&mut self) {
        self.views.fill(None);
        self.highest_used = 0;
    }

    /// Occupied slots below `highest_used`, in slot order.
    pub fn bound(&self) -> impl Iterator<Item = (usize, &V)> + '_ {
        self.views[..self.highest_used]
            .iter()
            .enumerate()
            .filter_map(|(slot, view)| view.as_ref().map(|v| (slot, v)))
    }
}
