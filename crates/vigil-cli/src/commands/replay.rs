//! Replay command - Run a recorded host trace through a monitor.
//!
//! A trace is a JSON document describing one page session: the host's
//! identity and capabilities, entries already buffered on the timeline
//! before the monitor started, and an ordered list of steps.
//!
//! ```json
//! {
//!   "userAgent": "Mozilla/5.0",
//!   "url": "https://example.com/",
//!   "capabilities": ["performance-observer", "entries-by-type", "error-events"],
//!   "timeline": [{"entryType": "navigation", "requestStart": 20, "responseStart": 200}],
//!   "steps": [
//!     {"kind": "entries", "entries": [{"entryType": "layout-shift", "value": 0.05}]},
//!     {"kind": "exception", "message": "boom"},
//!     {"kind": "rejection", "reason": "timeout"},
//!     {"kind": "log", "message": "render failed", "component": "Header"}
//!   ]
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use serde_json::json;

use vigil::Vigil;
use vigil_core::{MonitorConfig, PerformanceEntry};
use vigil_host::{HeapUsage, HostCapabilities, SimulatedHost};
use vigil_observe::{
    AnalyticsSink, CollectingSubscriber, EventSubscriber, RecordingSink, SinkCall,
    TelemetrySnapshot,
};

use crate::OutputFormat;

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Path to the recorded trace (JSON)
    #[arg(required = true)]
    pub trace: PathBuf,

    /// Override the configured sample rate (clamped into [0, 1])
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Enable heap usage snapshots
    #[arg(long)]
    pub memory: bool,

    /// Show diagnostic events emitted during the replay
    #[arg(long)]
    pub show_events: bool,
}

/// A recorded page session.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trace {
    /// Host user agent.
    pub user_agent: Option<String>,
    /// Document location.
    pub url: Option<String>,
    /// Frozen wall clock (epoch milliseconds).
    pub timestamp: Option<i64>,
    /// Host capabilities; every capability when absent.
    pub capabilities: Option<HostCapabilities>,
    /// Heap usage reported by the host.
    pub heap: Option<HeapUsage>,
    /// Entries buffered before the monitor starts.
    pub timeline: Vec<PerformanceEntry>,
    /// What happens after the monitor starts, in order.
    pub steps: Vec<TraceStep>,
}

/// One step of a recorded session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TraceStep {
    /// The host delivers performance entries.
    Entries {
        /// Entries in delivery order.
        entries: Vec<PerformanceEntry>,
    },
    /// Application code throws and nobody catches it.
    Exception {
        /// Exception message.
        message: String,
        /// Stack trace.
        #[serde(default)]
        stack: Option<String>,
    },
    /// A promise rejects and nobody handles it.
    Rejection {
        /// Rejection reason.
        reason: String,
    },
    /// Application code logs an error explicitly.
    Log {
        /// Error message.
        message: String,
        /// Stack trace.
        #[serde(default)]
        stack: Option<String>,
        /// Component the error was raised in.
        #[serde(default)]
        component: Option<String>,
    },
    /// Application code clears the error history.
    ClearErrors,
    /// The host's heap usage changes.
    Heap {
        /// New heap usage, or none to withdraw it.
        #[serde(default)]
        heap: Option<HeapUsage>,
    },
}

/// What a replay produced.
#[derive(Debug)]
pub struct ReplayOutcome {
    /// Monitor state after the last step.
    pub snapshot: TelemetrySnapshot,
    /// Every call the sink received.
    pub sink_calls: Vec<SinkCall>,
    /// Diagnostic event kinds, in emission order.
    pub events: Vec<&'static str>,
}

impl Trace {
    /// Parse a trace from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Trace is not valid JSON for the trace format")
    }

    fn host(&self) -> SimulatedHost {
        let mut host =
            SimulatedHost::with_capabilities(self.capabilities.unwrap_or_else(HostCapabilities::all));
        if let Some(user_agent) = &self.user_agent {
            host = host.with_user_agent(user_agent.clone());
        }
        if let Some(url) = &self.url {
            host = host.with_location(url.clone());
        }
        if let Some(timestamp) = self.timestamp {
            host = host.with_fixed_time(timestamp);
        }
        if let Some(heap) = self.heap {
            host = host.with_heap_usage(heap);
        }
        for entry in &self.timeline {
            host.record(entry.clone());
        }
        host
    }
}

/// Run a trace through a freshly built monitor.
pub fn replay(trace: &Trace, config: MonitorConfig) -> Result<ReplayOutcome> {
    let host = trace.host();
    let sink = Arc::new(RecordingSink::new());
    let events = Arc::new(CollectingSubscriber::new(10_000));

    let monitor = Vigil::builder()
        .with_config(config)
        .with_sink(Arc::clone(&sink) as Arc<dyn AnalyticsSink>)
        .with_event_subscriber(Arc::clone(&events) as Arc<dyn EventSubscriber>)
        .build(host.shared())
        .context("Failed to build monitor")?;

    tracing::info!(
        state = %monitor.state(),
        steps = trace.steps.len(),
        "Replaying trace"
    );

    for (index, step) in trace.steps.iter().enumerate() {
        tracing::debug!(index, step = ?step, "Replay step");
        match step {
            TraceStep::Entries { entries } => {
                host.deliver(entries.clone());
            }
            TraceStep::Exception { message, stack } => {
                host.throw(message.clone(), stack.clone());
            }
            TraceStep::Rejection { reason } => {
                host.reject(reason.clone());
            }
            TraceStep::Log {
                message,
                stack,
                component,
            } => {
                let mut report = monitor.error_report(message.clone());
                if let Some(stack) = stack {
                    report = report.with_stack(stack.clone());
                }
                if let Some(component) = component {
                    report = report.with_component(component.clone());
                }
                monitor.log_error(report);
            }
            TraceStep::ClearErrors => monitor.clear_errors(),
            TraceStep::Heap { heap } => host.set_heap_usage(*heap),
        }
    }

    let snapshot = monitor.snapshot();
    monitor.dispose();

    Ok(ReplayOutcome {
        snapshot,
        sink_calls: sink.calls(),
        events: events.kinds(),
    })
}

/// Execute the replay command.
pub fn execute(
    args: ReplayArgs,
    mut config: MonitorConfig,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(&args.trace)
        .with_context(|| format!("Failed to read trace {}", args.trace.display()))?;
    let trace = Trace::from_json(&text)?;

    if let Some(rate) = args.sample_rate {
        config.sampling = config.sampling.with_sample_rate(rate);
    }
    if args.memory {
        config.sampling = config.sampling.with_memory_monitoring(true);
    }

    let outcome = replay(&trace, config)?;

    match format {
        OutputFormat::Human => {
            print!("{}", outcome.snapshot.to_text());
            if !quiet {
                println!("\nForwarded: {}", outcome.sink_calls.len());
                for call in &outcome.sink_calls {
                    println!("  {} {} {}", call.command, call.event, call.payload);
                }
            }
            if args.show_events {
                println!("\nEvents: {}", outcome.events.len());
                for kind in &outcome.events {
                    println!("  {}", kind);
                }
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let mut value = json!({
                "snapshot": outcome.snapshot.to_json(),
                "sinkCalls": outcome.sink_calls,
            });
            if args.show_events {
                value["events"] = json!(outcome.events);
            }
            println!("{}", format.render_json(&value)?);
        }
    }

    Ok(())
}
