//! Application entry point and dispatch.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::generate;

use crate::config::AppConfig;
use crate::report::{render_json, render_text};
use crate::workload::run_workload;

/// Run the application.
pub fn run(config: &AppConfig) -> Result<()> {
    // Handle shell completion
    if let Some(shell) = config.completion {
        let mut cmd = AppConfig::command();
        generate(shell, &mut cmd, "pooltree", &mut std::io::stdout());
        return Ok(());
    }

    let pool_config = config.pool_config()?;
    tracing::debug!(?pool_config, "Resolved pool configuration");

    let mut reports = Vec::new();
    for workload in config.workload.workloads() {
        reports.push(run_workload(workload, pool_config, config.iterations)?);
    }

    if config.json {
        println!("{}", render_json(&reports).context("serializing report")?);
    } else if !config.quiet {
        print!("{}", render_text(&reports, config.verbose));
    }
    Ok(())
}
