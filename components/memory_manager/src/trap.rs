//! Fatal contract-violation reporting.
//!
//! Every non-recoverable condition detected by the memory manager ends in
//! [`trap`]. The violation is logged and counted, then the configured
//! [`TrapPolicy`] decides how the process stops: an unwinding panic (the
//! default, observable by tests) or an immediate abort.

use core_types::{config, RefCountError, TrapPolicy};

use crate::stats;

/// Reports `error` and never returns.
#[cold]
#[inline(never)]
pub fn trap(error: RefCountError) -> ! {
    stats::record(|s| s.traps += 1);
    log::error!("reference counting contract violated: {}", error);

    match config::current().trap_policy {
        TrapPolicy::Panic => panic!("{}", error),
        TrapPolicy::Abort => std::process::abort(),
    }
}

/// Unwraps a checked result, trapping on a violation.
pub fn unwrap_or_trap<T>(result: core_types::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => trap(error),
    }
}
