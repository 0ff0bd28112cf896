//! Shared value types for the reference-counting memory manager.
//!
//! This crate holds the types that cross component boundaries: contract
//! violation errors, the process-wide configuration, lifecycle statistics
//! and header snapshots.
//!
//! # Overview
//!
//! - [`RefCountError`] - Contract violations (over-release, stale unowned reads)
//! - [`ViolationKind`] - Flat category of a violation
//! - [`ManagerConfig`] / [`TrapPolicy`] - Runtime configuration
//! - [`HeapStats`] - Lifecycle counters
//! - [`HeaderSnapshot`] - Copy of one instance's header counters
//!
//! # Examples
//!
//! ```
//! use core_types::{config, ManagerConfig, TrapPolicy};
//!
//! let config = ManagerConfig::default();
//! assert_eq!(config.trap_policy, TrapPolicy::Panic);
//! assert_eq!(config::current().trap_policy, TrapPolicy::Panic);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
mod error;
mod snapshot;
mod stats;

pub use config::{ManagerConfig, TrapPolicy};
pub use error::{RefCountError, Result, ViolationKind};
pub use snapshot::HeaderSnapshot;
pub use stats::HeapStats;
