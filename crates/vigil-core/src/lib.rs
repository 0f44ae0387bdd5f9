//! Vigil Core - shared vocabulary for the Web Vitals telemetry core
//!
//! This crate holds the types every other Vigil crate speaks:
//!
//! - [`MetricName`], [`Rating`], [`Threshold`] and [`Thresholds`]: the Web
//!   Vitals metrics and how their values are rated
//! - [`PerformanceEntry`]: one variant per performance entry category the
//!   host runtime can deliver
//! - [`MonitorConfig`] and [`SamplingConfig`]: immutable configuration
//!
//! # Rating a value
//!
//! ```
//! use vigil_core::{classify, Rating, Threshold};
//!
//! let lcp = Threshold::new(2500.0, 4000.0);
//! assert_eq!(classify(2500.0, &lcp), Rating::Good);
//! assert_eq!(classify(4000.0, &lcp), Rating::NeedsImprovement);
//! assert_eq!(classify(4001.0, &lcp), Rating::Poor);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Application                │
//! ├─────────────────────────────────────────┤
//! │            vigil (Monitor)              │
//! ├─────────────────────────────────────────┤
//! │  vigil-observe  │  vigil-host           │
//! ├─────────────────────────────────────────┤
//! │              vigil-core                 │
//! └─────────────────────────────────────────┘
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod metric;

// Re-export main types at crate root
pub use config::{MonitorConfig, SamplingConfig};
pub use entry::{
    EntryType, EventTimingEntry, FirstInputEntry, LargestContentfulPaintEntry,
    LayoutShiftEntry, LongTaskEntry, NavigationBreakdown, NavigationTiming, PaintEntry,
    PerformanceEntry, ResourceEntry, FIRST_CONTENTFUL_PAINT,
};
pub use error::{ConfigError, ConfigResult, ParseError, ParseResult, Result, VigilError};
pub use metric::{classify, MetricName, MetricUnit, Rating, Threshold, Thresholds};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```ignore
/// use vigil_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{MonitorConfig, SamplingConfig};
    pub use crate::entry::{EntryType, PerformanceEntry};
    pub use crate::error::{ConfigError, VigilError};
    pub use crate::metric::{classify, MetricName, Rating, Threshold, Thresholds};
}
