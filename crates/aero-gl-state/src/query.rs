//! Query bookkeeping across context switches.
//!
//! Native queries are tied to the device context. When a different higher-level context becomes
//! current, the queries it does not own must be paused and its own active queries resumed.

use std::fmt;

use crate::serial::ResourceSerial;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryType {
    AnySamples,
    AnySamplesConservative,
    TimeElapsed,
    TransformFeedbackPrimitivesWritten,
}

impl QueryType {
    pub const COUNT: usize = 4;
    /// Query types that can be active on a context, in resume order.
    pub const ALL: [QueryType; Self::COUNT] = [
        Self::AnySamples,
        Self::AnySamplesConservative,
        Self::TimeElapsed,
        Self::TransformFeedbackPrimitivesWritten,
    ];

    pub const fn index(self) -> usize {
        match self {
            QueryType::AnySamples => 0,
            QueryType::AnySamplesConservative => 1,
            QueryType::TimeElapsed => 2,
            QueryType::TransformFeedbackPrimitivesWritten => 3,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryType::AnySamples => "any_samples",
            QueryType::AnySamplesConservative => "any_samples_conservative",
            QueryType::TimeElapsed => "time_elapsed",
            QueryType::TransformFeedbackPrimitivesWritten => "transform_feedback_primitives_written",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryId {
    pub serial: ResourceSerial,
    pub query_type: QueryType,
}

/// Pauses and resumes native queries on behalf of the state manager.
pub trait QueryControl {
    fn pause(&mut self, query: QueryId) -> Result<(), crate::native::DeviceError>;
    fn resume(&mut self, query: QueryId) -> Result<(), crate::native::DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_indices() {
        for (i, ty) in QueryType::ALL.into_iter().enumerate() {
            assert_eq!(ty.index(), i, "{ty}");
        }
    }
}
