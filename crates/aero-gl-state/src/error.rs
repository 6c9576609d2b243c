use thiserror::Error;

use crate::native::DeviceError;
use crate::query::QueryType;

/// Which kind of immutable state object a [`crate::cache::RenderStateCache`] failed to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateObjectKind {
    Blend,
    DepthStencil,
    Rasterizer,
    Sampler,
    InputLayout,
}

impl std::fmt::Display for StateObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StateObjectKind::Blend => "blend",
            StateObjectKind::DepthStencil => "depth-stencil",
            StateObjectKind::Rasterizer => "rasterizer",
            StateObjectKind::Sampler => "sampler",
            StateObjectKind::InputLayout => "input layout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to allocate {what}: {source}")]
    Allocation {
        what: &'static str,
        #[source]
        source: DeviceError,
    },

    #[error("failed to map {what} for write-discard: {source}")]
    Map {
        what: &'static str,
        #[source]
        source: DeviceError,
    },

    #[error("failed to create {kind} state object: {source}")]
    StateObject {
        kind: StateObjectKind,
        #[source]
        source: DeviceError,
    },

    #[error("integer overflow computing the offset of vertex attribute {attrib} (first vertex {first_vertex})")]
    VertexOffsetOverflow { attrib: usize, first_vertex: i32 },

    #[error("failed to store current value for vertex attribute {attrib}: {source}")]
    CurrentValue {
        attrib: usize,
        #[source]
        source: DeviceError,
    },

    #[error("failed to prepare index data: {0}")]
    IndexData(#[source] DeviceError),

    #[error("index data is malformed: {0}")]
    InvalidIndexData(&'static str),

    #[error("draw or dispatch submitted without a linked program")]
    MissingProgram,

    #[error("failed to generate swizzled storage for texture unit {unit}: {source}")]
    Swizzle {
        unit: u32,
        #[source]
        source: DeviceError,
    },

    #[error("failed to fetch shader executables: {0}")]
    Executable(#[source] DeviceError),

    #[error("failed to {action} {query_type} query: {source}")]
    Query {
        action: &'static str,
        query_type: QueryType,
        #[source]
        source: DeviceError,
    },
}

impl StateError {
    pub(crate) fn allocation(what: &'static str) -> impl FnOnce(DeviceError) -> Self {
        move |source| StateError::Allocation { what, source }
    }

    pub(crate) fn map(what: &'static str) -> impl FnOnce(DeviceError) -> Self {
        move |source| StateError::Map { what, source }
    }

    pub(crate) fn state_object(kind: StateObjectKind) -> impl FnOnce(DeviceError) -> Self {
        move |source| StateError::StateObject { kind, source }
    }
}

pub type Result<T> = std::result::Result<T, StateError>;
