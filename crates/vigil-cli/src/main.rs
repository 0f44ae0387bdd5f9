//! Vigil CLI - Command-line interface for the Vigil telemetry core.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use vigil_core::MonitorConfig;

mod commands;

/// Vigil Web Vitals Telemetry
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Output format options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl OutputFormat {
    /// Render a JSON value in this format. Human falls back to pretty JSON.
    pub fn render_json(self, value: &serde_json::Value) -> Result<String> {
        let text = match self {
            OutputFormat::JsonCompact => serde_json::to_string(value)?,
            OutputFormat::Human | OutputFormat::Json => serde_json::to_string_pretty(value)?,
        };
        Ok(text)
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Replay a recorded host trace through a monitor
    Replay(commands::replay::ReplayArgs),
    /// Rate a metric value against the configured thresholds
    Classify(commands::classify::ClassifyArgs),
    /// Print the effective configuration
    Config(commands::config::ConfigArgs),
}

/// Load the configuration file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(MonitorConfig::default()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vigil={0},vigil_core={0},vigil_host={0},vigil_observe={0}",
            log_level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Replay(args) => commands::replay::execute(args, config, cli.format, cli.quiet),
        Commands::Classify(args) => commands::classify::execute(args, &config, cli.format),
        Commands::Config(args) => commands::config::execute(args, &config, cli.format),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "vigil", "classify", "lcp", "1800", "-f", "json-compact", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::JsonCompact);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Classify(_)));
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/vigil.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load config"));
    }
}
