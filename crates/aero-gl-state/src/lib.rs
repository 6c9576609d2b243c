//! `aero-gl-state` translates GL-style mutable pipeline state into D3D11-style immutable state
//! objects and bindings.
//!
//! The higher-level context owns a [`gl::GlState`] and reports changes to a [`StateManager`]
//! through [`gl::GlDirtyBits`]. Before each draw or dispatch the manager syncs whatever is dirty
//! and issues the minimal set of calls on a [`native::DeviceContext`]:
//! - Redundant binds are filtered against last-applied snapshots.
//! - Render targets and shader inputs never alias the same resource.
//! - Point sprites, triangle fans, line loops and 8-bit indices are emulated where the native
//!   API lacks them.
//!
//! [`native::RecordingContext`] and [`cache::HashingStateCache`] are in-memory implementations of
//! the device boundary, used by the tests and by tooling that inspects the native call stream.

mod conflict;
mod error;
mod stage;
mod state_manager;

pub mod cache;
pub mod caps;
pub mod dirty_bits;
pub mod gl;
pub mod index;
pub mod native;
pub mod query;
pub mod serial;
pub mod shader_constants;
pub mod stats;
pub mod topology;
pub mod vertex;
pub mod view_cache;

pub use conflict::{conflicting_srv_slots, image_index_conflicts_with_srv};
pub use dirty_bits::{DirtyBit, DirtyBits};
pub use error::{Result, StateError, StateObjectKind};
pub use stage::{PipelineStage, ShaderStage};
pub use state_manager::{
    Backend, DrawExecutables, ExecutableProvider, PreparedDraw, StateManager, SwizzleGenerator,
};
