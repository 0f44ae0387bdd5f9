//! Config command - Print the effective configuration.

use anyhow::{Context, Result};
use clap::Args;

use vigil_core::MonitorConfig;

use crate::OutputFormat;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    /// Only validate; print nothing on success
    #[arg(long)]
    pub check: bool,
}

fn render(config: &MonitorConfig, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => {
            toml::to_string_pretty(config).context("Failed to render configuration as TOML")
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            format.render_json(&serde_json::to_value(config)?)
        }
    }
}

/// Execute the config command.
pub fn execute(args: ConfigArgs, config: &MonitorConfig, format: OutputFormat) -> Result<()> {
    config.validate().context("Configuration is invalid")?;
    if args.check {
        return Ok(());
    }
    println!("{}", render(config, format)?);
    Ok(())
}
