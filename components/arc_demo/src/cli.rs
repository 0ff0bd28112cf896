//! Command-line arguments

use clap::Parser;
use core_types::TrapPolicy;

use crate::scenarios::Scenario;

/// Reference-counting walkthrough: runs ARC scenarios on the memory manager
#[derive(Parser, Debug)]
#[command(name = "arc-demo")]
#[command(version = "0.1.0")]
#[command(about = "Runs strong, weak and unowned reference scenarios", long_about = None)]
pub struct Cli {
    /// Scenario to run
    #[arg(value_enum, default_value_t = Scenario::All)]
    pub scenario: Scenario,

    /// Print a JSON report (lines and heap counters) instead of plain text
    #[arg(short, long)]
    pub json: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    /// What to do on a contract violation: panic or abort
    /// (defaults to RCM_TRAP_POLICY, then panic)
    #[arg(long, value_parser = parse_trap_policy)]
    pub trap_policy: Option<TrapPolicy>,

    /// Disable heap statistics
    #[arg(long)]
    pub no_stats: bool,
}

fn parse_trap_policy(text: &str) -> Result<TrapPolicy, String> {
    TrapPolicy::parse(text)
        .ok_or_else(|| format!("unknown trap policy `{text}` (expected panic or abort)"))
}
