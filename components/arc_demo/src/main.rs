//! ARC walkthrough CLI
//!
//! Entry point for the demo. Parses CLI arguments, installs the memory
//! manager configuration and runs the selected scenarios.

use arc_demo::{run, Cli, DemoError};
use clap::Parser as ClapParser;
use core_types::{config, ManagerConfig};
use std::io::Write;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut manager_config = ManagerConfig::from_env();
    if let Some(policy) = cli.trap_policy {
        manager_config.trap_policy = policy;
    }
    if cli.no_stats {
        manager_config.track_stats = false;
    }
    config::install(manager_config);
    log::debug!("manager config: {:?}", manager_config);

    if let Err(e) = execute(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn execute(cli: &Cli) -> Result<(), DemoError> {
    let reports = run(cli.scenario)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if cli.json {
        serde_json::to_writer_pretty(&mut out, &reports)?;
        writeln!(out)?;
        return Ok(());
    }

    for report in &reports {
        for line in &report.lines {
            writeln!(out, "{}", line)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
