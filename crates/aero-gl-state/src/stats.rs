use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the state manager.
///
/// Updated on the rendering thread with relaxed atomics; a snapshot can be read from elsewhere
/// through a shared reference.
#[derive(Debug, Default)]
pub struct StateStats {
    flushes: AtomicU64,
    compute_flushes: AtomicU64,
    dirty_bits_synced: AtomicU64,
    undefined_point_size_warnings: AtomicU64,
    culled_everything_topologies: AtomicU64,
    conflicting_views_unbound: AtomicU64,
    driver_constant_uploads: AtomicU64,
    input_layout_changes: AtomicU64,
    buffers_created: AtomicU64,
}

impl StateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_flushes(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_compute_flushes(&self) {
        self.compute_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_dirty_bits_synced(&self, count: u64) {
        self.dirty_bits_synced.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_undefined_point_size_warnings(&self) {
        self.undefined_point_size_warnings
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_culled_everything_topologies(&self) {
        self.culled_everything_topologies
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_conflicting_views_unbound(&self, count: u64) {
        self.conflicting_views_unbound
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_driver_constant_uploads(&self) {
        self.driver_constant_uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_input_layout_changes(&self) {
        self.input_layout_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_buffers_created(&self) {
        self.buffers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StateStatsSnapshot {
        StateStatsSnapshot {
            flushes: self.flushes.load(Ordering::Relaxed),
            compute_flushes: self.compute_flushes.load(Ordering::Relaxed),
            dirty_bits_synced: self.dirty_bits_synced.load(Ordering::Relaxed),
            undefined_point_size_warnings: self
                .undefined_point_size_warnings
                .load(Ordering::Relaxed),
            culled_everything_topologies: self
                .culled_everything_topologies
                .load(Ordering::Relaxed),
            conflicting_views_unbound: self.conflicting_views_unbound.load(Ordering::Relaxed),
            driver_constant_uploads: self.driver_constant_uploads.load(Ordering::Relaxed),
            input_layout_changes: self.input_layout_changes.load(Ordering::Relaxed),
            buffers_created: self.buffers_created.load(Ordering::Relaxed),
        }
    }

    /// Returns a JSON object as a string.
    pub fn to_json(&self) -> String {
        self.snapshot().to_json()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateStatsSnapshot {
    pub flushes: u64,
    pub compute_flushes: u64,
    pub dirty_bits_synced: u64,
    pub undefined_point_size_warnings: u64,
    pub culled_everything_topologies: u64,
    pub conflicting_views_unbound: u64,
    pub driver_constant_uploads: u64,
    pub input_layout_changes: u64,
    pub buffers_created: u64,
}

impl StateStatsSnapshot {
    pub fn to_json(self) -> String {
        format!(
            "{{\"flushes\":{},\"compute_flushes\":{},\"dirty_bits_synced\":{},\"undefined_point_size_warnings\":{},\"culled_everything_topologies\":{},\"conflicting_views_unbound\":{},\"driver_constant_uploads\":{},\"input_layout_changes\":{},\"buffers_created\":{}}}",
            self.flushes,
            self.compute_flushes,
            self.dirty_bits_synced,
            self.undefined_point_size_warnings,
            self.culled_everything_topologies,
            self.conflicting_views_unbound,
            self.driver_constant_uploads,
            self.input_layout_changes,
            self.buffers_created,
        )
    }
}
