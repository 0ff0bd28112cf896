//! Process-wide memory manager configuration.
//!
//! The configuration is installed once (usually at startup) and read on the
//! trap and statistics paths. Reads take a shared lock and copy the value
//! out, so no lock is held while a trap unwinds.

use parking_lot::RwLock;
use serde::Serialize;

/// What the trap path does after reporting a contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrapPolicy {
    /// Unwinding panic carrying the violation's message
    Panic,
    /// Immediate `std::process::abort()`
    Abort,
}

impl TrapPolicy {
    /// Parses `panic` or `abort` (case-insensitive).
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "panic" => Some(TrapPolicy::Panic),
            "abort" => Some(TrapPolicy::Abort),
            _ => None,
        }
    }
}

/// Configuration for the reference-counting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagerConfig {
    /// Behaviour on contract violations
    pub trap_policy: TrapPolicy,
    /// Whether allocation/finalization counters are recorded
    pub track_stats: bool,
}

/// Environment variable selecting the trap policy
pub const TRAP_POLICY_ENV: &str = "RCM_TRAP_POLICY";
/// Environment variable toggling statistics (`0` or `1`)
pub const TRACK_STATS_ENV: &str = "RCM_TRACK_STATS";

impl ManagerConfig {
    /// Panic on violations, statistics enabled.
    pub const DEFAULT: ManagerConfig = ManagerConfig {
        trap_policy: TrapPolicy::Panic,
        track_stats: true,
    };

    /// Builds a configuration from `RCM_TRAP_POLICY` and `RCM_TRACK_STATS`.
    ///
    /// Unset or unparsable variables fall back to [`ManagerConfig::DEFAULT`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::DEFAULT;
        if let Some(policy) = lookup(TRAP_POLICY_ENV).as_deref().and_then(TrapPolicy::parse) {
            config.trap_policy = policy;
        }
        match lookup(TRACK_STATS_ENV).as_deref().map(str::trim) {
            Some("0") | Some("false") => config.track_stats = false,
            Some("1") | Some("true") => config.track_stats = true,
            _ => {}
        }
        config
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

static CONFIG: RwLock<ManagerConfig> = parking_lot::const_rwlock(ManagerConfig::DEFAULT);

/// Installs `config` process-wide, returning the previous configuration.
pub fn install(config: ManagerConfig) -> ManagerConfig {
    std::mem::replace(&mut *CONFIG.write(), config)
}

/// Returns a copy of the active configuration.
pub fn current() -> ManagerConfig {
    *CONFIG.read()
}
