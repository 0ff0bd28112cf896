//! Error types for the demo CLI

use core_types::RefCountError;
use thiserror::Error;

/// Demo-specific errors
#[derive(Debug, Error)]
pub enum DemoError {
    /// A scenario hit a contract violation it did not expect
    #[error("contract violation: {0}")]
    Violation(#[from] RefCountError),

    /// A scenario left a different number of live instances than it documents
    #[error("scenario `{scenario}` left {actual} live instance(s), expected {expected}")]
    UnexpectedLiveInstances {
        /// Scenario name
        scenario: &'static str,
        /// Instances the scenario deliberately leaks
        expected: u64,
        /// Instances still alive after the scenario returned
        actual: u64,
    },

    /// Report serialization failed
    #[error("report error: {0}")]
    Report(#[from] serde_json::Error),

    /// Writing output failed
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for demo operations
pub type DemoResult<T> = Result<T, DemoError>;
