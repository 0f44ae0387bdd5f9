//! Classify command - Rate a metric value.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use vigil_core::{MetricName, MonitorConfig, Rating, Threshold};
use vigil_observe::normalize;

use crate::OutputFormat;

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// Metric name (lcp, fid, cls, fcp, ttfb, inp)
    #[arg(required = true)]
    pub metric: MetricName,

    /// Raw metric value (milliseconds, or a score for CLS)
    #[arg(required = true, allow_negative_numbers = true)]
    pub value: f64,
}

/// Classification result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Classification {
    metric: MetricName,
    value: f64,
    reported_value: i64,
    rating: Rating,
    threshold: Threshold,
}

fn classify_value(args: &ClassifyArgs, config: &MonitorConfig) -> Result<Classification> {
    if !args.value.is_finite() {
        bail!("Value must be a finite number, got {}", args.value);
    }
    Ok(Classification {
        metric: args.metric,
        value: args.value,
        reported_value: normalize(args.metric, args.value),
        rating: config.thresholds.rate(args.metric, args.value),
        threshold: *config.thresholds.get(args.metric),
    })
}

/// Execute the classify command.
pub fn execute(args: ClassifyArgs, config: &MonitorConfig, format: OutputFormat) -> Result<()> {
    let result = classify_value(&args, config)?;

    match format {
        OutputFormat::Human => {
            let suffix = result.metric.unit().suffix();
            println!(
                "{} {}{}: {}",
                result.metric.label(),
                result.value,
                suffix,
                result.rating.as_str()
            );
            println!(
                "  good <= {}{}, needs-improvement <= {}{}",
                result.threshold.good, suffix, result.threshold.needs_improvement, suffix
            );
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            println!("{}", format.render_json(&serde_json::to_value(&result)?)?);
        }
    }

    Ok(())
}
