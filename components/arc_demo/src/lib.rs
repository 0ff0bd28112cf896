//! ARC walkthrough demo library
//!
//! Runs the classic reference-counting scenarios (shared ownership, a
//! strong cycle, weak and unowned back edges, closure capture lists)
//! against the memory manager and records what each one prints.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod scenarios;
pub mod transcript;

pub use cli::Cli;
pub use error::{DemoError, DemoResult};
pub use scenarios::{run, run_all, Scenario, ScenarioReport};
pub use transcript::Transcript;
