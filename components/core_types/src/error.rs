//! Contract-violation error types.
//!
//! Every condition in this module is a programming error on the caller's
//! side. The memory manager reports them through its trap path; the
//! non-trapping probes hand them back as values so callers can observe the
//! violation without terminating.

use serde::Serialize;
use thiserror::Error;

/// The category of a reference-counting contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationKind {
    /// `release` called while the strong count was already zero
    OverRelease,
    /// Unowned reference read after its target's payload was destroyed
    UnownedAccessAfterFree,
    /// Unowned optional reference read while set to a destroyed target
    UnownedOptionalAccessAfterFree,
}

/// A reference-counting contract violation.
///
/// The `type_name` carried by each variant is the payload type of the
/// instance involved, for diagnostics only.
///
/// # Examples
///
/// ```
/// use core_types::{RefCountError, ViolationKind};
///
/// let err = RefCountError::UnownedAccessAfterFree { type_name: "Customer" };
/// assert_eq!(err.kind(), ViolationKind::UnownedAccessAfterFree);
/// assert!(err.to_string().contains("already deallocated"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefCountError {
    /// Strong count was already zero when a release was issued
    #[error("over-release: strong count of `{type_name}` is already zero")]
    OverRelease {
        /// Payload type of the instance
        type_name: &'static str,
    },

    /// Unowned read of a destroyed payload
    #[error("attempted to read an unowned reference but the `{type_name}` instance was already deallocated")]
    UnownedAccessAfterFree {
        /// Payload type of the instance
        type_name: &'static str,
    },

    /// Unowned optional read of a destroyed payload
    #[error("attempted to read an unowned optional reference but the `{type_name}` instance was already deallocated")]
    UnownedOptionalAccessAfterFree {
        /// Payload type of the instance
        type_name: &'static str,
    },
}

impl RefCountError {
    /// Returns the flat category of this violation.
    pub fn kind(&self) -> ViolationKind {
        match self {
            RefCountError::OverRelease { .. } => ViolationKind::OverRelease,
            RefCountError::UnownedAccessAfterFree { .. } => ViolationKind::UnownedAccessAfterFree,
            RefCountError::UnownedOptionalAccessAfterFree { .. } => {
                ViolationKind::UnownedOptionalAccessAfterFree
            }
        }
    }

    /// Returns the payload type name of the instance involved.
    pub fn type_name(&self) -> &'static str {
        match self {
            RefCountError::OverRelease { type_name }
            | RefCountError::UnownedAccessAfterFree { type_name }
            | RefCountError::UnownedOptionalAccessAfterFree { type_name } => type_name,
        }
    }
}

/// Result alias for operations that can detect a contract violation.
pub type Result<T> = std::result::Result<T, RefCountError>;
