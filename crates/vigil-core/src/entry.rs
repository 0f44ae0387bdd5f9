//! Performance entries delivered by the host runtime.
//!
//! Each entry category the host can emit is one variant of
//! [`PerformanceEntry`]. All times are milliseconds relative to the start of
//! navigation, the way the host timeline reports them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Name of the paint entry that carries First Contentful Paint.
pub const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// Category of a performance entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryType {
    /// `paint`
    #[serde(rename = "paint")]
    Paint,
    /// `largest-contentful-paint`
    #[serde(rename = "largest-contentful-paint")]
    LargestContentfulPaint,
    /// `first-input`
    #[serde(rename = "first-input")]
    FirstInput,
    /// `layout-shift`
    #[serde(rename = "layout-shift")]
    LayoutShift,
    /// `navigation`
    #[serde(rename = "navigation")]
    Navigation,
    /// `longtask`
    #[serde(rename = "longtask")]
    LongTask,
    /// `resource`
    #[serde(rename = "resource")]
    Resource,
    /// `event`
    #[serde(rename = "event")]
    Event,
}

impl EntryType {
    /// Every entry category.
    pub const ALL: [EntryType; 8] = [
        EntryType::Paint,
        EntryType::LargestContentfulPaint,
        EntryType::FirstInput,
        EntryType::LayoutShift,
        EntryType::Navigation,
        EntryType::LongTask,
        EntryType::Resource,
        EntryType::Event,
    ];

    /// The host's name for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Paint => "paint",
            EntryType::LargestContentfulPaint => "largest-contentful-paint",
            EntryType::FirstInput => "first-input",
            EntryType::LayoutShift => "layout-shift",
            EntryType::Navigation => "navigation",
            EntryType::LongTask => "longtask",
            EntryType::Resource => "resource",
            EntryType::Event => "event",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| ParseError::UnknownEntryType(s.to_string()))
    }
}

/// A performance entry, tagged by its category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entryType")]
pub enum PerformanceEntry {
    /// Paint timing (`first-paint`, `first-contentful-paint`).
    #[serde(rename = "paint")]
    Paint(PaintEntry),
    /// Largest contentful paint candidate.
    #[serde(rename = "largest-contentful-paint")]
    LargestContentfulPaint(LargestContentfulPaintEntry),
    /// First input timing.
    #[serde(rename = "first-input")]
    FirstInput(FirstInputEntry),
    /// Layout shift.
    #[serde(rename = "layout-shift")]
    LayoutShift(LayoutShiftEntry),
    /// Navigation timing for the document.
    #[serde(rename = "navigation")]
    Navigation(NavigationTiming),
    /// Main-thread task longer than the host's long-task budget.
    #[serde(rename = "longtask")]
    LongTask(LongTaskEntry),
    /// Resource fetch timing.
    #[serde(rename = "resource")]
    Resource(ResourceEntry),
    /// Event timing for a user interaction.
    #[serde(rename = "event")]
    Event(EventTimingEntry),
}

impl PerformanceEntry {
    /// Category of this entry.
    pub fn entry_type(&self) -> EntryType {
        match self {
            PerformanceEntry::Paint(_) => EntryType::Paint,
            PerformanceEntry::LargestContentfulPaint(_) => EntryType::LargestContentfulPaint,
            PerformanceEntry::FirstInput(_) => EntryType::FirstInput,
            PerformanceEntry::LayoutShift(_) => EntryType::LayoutShift,
            PerformanceEntry::Navigation(_) => EntryType::Navigation,
            PerformanceEntry::LongTask(_) => EntryType::LongTask,
            PerformanceEntry::Resource(_) => EntryType::Resource,
            PerformanceEntry::Event(_) => EntryType::Event,
        }
    }

    /// Start offset of this entry.
    pub fn start_time(&self) -> f64 {
        match self {
            PerformanceEntry::Paint(e) => e.start_time,
            PerformanceEntry::LargestContentfulPaint(e) => e.start_time,
            PerformanceEntry::FirstInput(e) => e.start_time,
            PerformanceEntry::LayoutShift(e) => e.start_time,
            PerformanceEntry::Navigation(e) => e.start_time,
            PerformanceEntry::LongTask(e) => e.start_time,
            PerformanceEntry::Resource(e) => e.start_time,
            PerformanceEntry::Event(e) => e.start_time,
        }
    }
}

/// Paint timing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintEntry {
    /// `first-paint` or `first-contentful-paint`.
    pub name: String,
    /// When the paint happened.
    pub start_time: f64,
}

impl PaintEntry {
    /// Create a paint entry.
    pub fn new(name: impl Into<String>, start_time: f64) -> Self {
        Self {
            name: name.into(),
            start_time,
        }
    }

    /// Whether this is the first contentful paint.
    pub fn is_first_contentful_paint(&self) -> bool {
        self.name == FIRST_CONTENTFUL_PAINT
    }
}

/// Largest contentful paint candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LargestContentfulPaintEntry {
    /// When the candidate was reported.
    pub start_time: f64,
    /// When the element finished rendering, if exposed.
    pub render_time: Option<f64>,
    /// When the element's resource finished loading, if exposed.
    pub load_time: Option<f64>,
    /// Element area in pixels.
    pub size: Option<u64>,
    /// Resource URL for image candidates.
    pub url: Option<String>,
}

impl LargestContentfulPaintEntry {
    /// Render time, falling back to load time, falling back to zero.
    ///
    /// A zero offset is treated as "not exposed", matching how hosts report
    /// cross-origin images without timing headers.
    pub fn paint_time(&self) -> f64 {
        [self.render_time, self.load_time]
            .into_iter()
            .flatten()
            .find(|t| *t != 0.0)
            .unwrap_or(0.0)
    }
}

/// First input timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirstInputEntry {
    /// Event name (`pointerdown`, `keydown`, ...).
    pub name: String,
    /// When the input happened.
    pub start_time: f64,
    /// When the host began processing the input.
    pub processing_start: f64,
    /// When processing finished.
    pub processing_end: f64,
    /// Total duration until the next paint.
    pub duration: f64,
}

impl FirstInputEntry {
    /// Delay between the input and the start of its processing.
    pub fn input_delay(&self) -> f64 {
        self.processing_start - self.start_time
    }
}

/// Layout shift entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutShiftEntry {
    /// When the shift happened.
    pub start_time: f64,
    /// Shift score.
    pub value: f64,
    /// Whether the shift followed recent user input.
    pub had_recent_input: bool,
}

impl LayoutShiftEntry {
    /// Create a layout shift entry.
    pub fn new(value: f64, had_recent_input: bool) -> Self {
        Self {
            start_time: 0.0,
            value,
            had_recent_input,
        }
    }
}

/// Navigation timing for the current document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationTiming {
    pub start_time: f64,
    pub fetch_start: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub dom_interactive: f64,
    pub dom_content_loaded_event_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub dom_complete: f64,
    pub load_event_start: f64,
    pub load_event_end: f64,
}

impl NavigationTiming {
    /// Time to first byte: `responseStart - requestStart`.
    pub fn time_to_first_byte(&self) -> f64 {
        self.response_start - self.request_start
    }

    /// Phase durations of the navigation.
    pub fn breakdown(&self) -> NavigationBreakdown {
        NavigationBreakdown {
            dns_lookup: self.domain_lookup_end - self.domain_lookup_start,
            tcp_connect: self.connect_end - self.connect_start,
            ttfb: self.time_to_first_byte(),
            download: self.response_end - self.response_start,
            dom_interactive: self.dom_interactive - self.fetch_start,
            dom_content_loaded: self.dom_content_loaded_event_end
                - self.dom_content_loaded_event_start,
            dom_complete: self.dom_complete - self.fetch_start,
            load_complete: self.load_event_end - self.fetch_start,
        }
    }
}

/// Phase durations derived from [`NavigationTiming`], in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationBreakdown {
    /// DNS lookup.
    pub dns_lookup: f64,
    /// TCP connect.
    pub tcp_connect: f64,
    /// Request sent to first response byte.
    pub ttfb: f64,
    /// Response body download.
    pub download: f64,
    /// Fetch start to DOM interactive.
    pub dom_interactive: f64,
    /// DOMContentLoaded handler duration.
    pub dom_content_loaded: f64,
    /// Fetch start to DOM complete.
    pub dom_complete: f64,
    /// Fetch start to end of the load event.
    pub load_complete: f64,
}

impl NavigationBreakdown {
    /// Phases as `(label, milliseconds)` pairs for display.
    pub fn phases(&self) -> [(&'static str, f64); 8] {
        [
            ("DNS Lookup", self.dns_lookup),
            ("TCP Connect", self.tcp_connect),
            ("TTFB", self.ttfb),
            ("Download", self.download),
            ("DOM Interactive", self.dom_interactive),
            ("DOM Content Loaded", self.dom_content_loaded),
            ("DOM Complete", self.dom_complete),
            ("Load Complete", self.load_complete),
        ]
    }
}

/// Long task entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LongTaskEntry {
    /// Attribution name (`self`, `same-origin`, ...).
    pub name: String,
    /// When the task started.
    pub start_time: f64,
    /// How long the task ran.
    pub duration: f64,
}

/// Resource timing entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceEntry {
    /// Resource URL.
    pub name: String,
    /// What initiated the fetch (`img`, `script`, ...).
    pub initiator_type: String,
    /// When the fetch started.
    pub start_time: f64,
    /// Total fetch duration.
    pub duration: f64,
}

/// Event timing entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventTimingEntry {
    /// Event name.
    pub name: String,
    /// When the event happened.
    pub start_time: f64,
    /// Input to next paint.
    pub duration: f64,
    /// Interaction the event belongs to; absent or zero for non-interactions.
    pub interaction_id: Option<u64>,
}

impl EventTimingEntry {
    /// Whether this event is part of a user interaction.
    pub fn is_interaction(&self) -> bool {
        self.interaction_id.is_some_and(|id| id != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_names() {
        assert_eq!(EntryType::LongTask.as_str(), "longtask");
        assert_eq!(
            "largest-contentful-paint".parse::<EntryType>().unwrap(),
            EntryType::LargestContentfulPaint
        );
        assert!("measure".parse::<EntryType>().is_err());
    }

    #[test]
    fn test_lcp_paint_time_fallbacks() {
        let render = LargestContentfulPaintEntry {
            render_time: Some(1200.0),
            load_time: Some(900.0),
            ..Default::default()
        };
        assert_eq!(render.paint_time(), 1200.0);

        let load_only = LargestContentfulPaintEntry {
            render_time: Some(0.0),
            load_time: Some(900.0),
            ..Default::default()
        };
        assert_eq!(load_only.paint_time(), 900.0);

        let neither = LargestContentfulPaintEntry::default();
        assert_eq!(neither.paint_time(), 0.0);
    }

    #[test]
    fn test_first_input_delay() {
        let entry = FirstInputEntry {
            start_time: 100.0,
            processing_start: 130.0,
            ..Default::default()
        };
        assert_eq!(entry.input_delay(), 30.0);
    }

    #[test]
    fn test_navigation_breakdown() {
        let nav = NavigationTiming {
            fetch_start: 10.0,
            domain_lookup_start: 12.0,
            domain_lookup_end: 20.0,
            connect_start: 20.0,
            connect_end: 45.0,
            request_start: 50.0,
            response_start: 170.0,
            response_end: 200.0,
            dom_interactive: 410.0,
            dom_complete: 810.0,
            load_event_end: 910.0,
            ..Default::default()
        };
        assert_eq!(nav.time_to_first_byte(), 120.0);

        let breakdown = nav.breakdown();
        assert_eq!(breakdown.dns_lookup, 8.0);
        assert_eq!(breakdown.tcp_connect, 25.0);
        assert_eq!(breakdown.download, 30.0);
        assert_eq!(breakdown.dom_interactive, 400.0);
        assert_eq!(breakdown.load_complete, 900.0);
    }

    #[test]
    fn test_entry_deserialize_tagged() {
        let json = r#"[
            {"entryType": "layout-shift", "value": 0.05, "hadRecentInput": false},
            {"entryType": "first-input", "startTime": 100, "processingStart": 130},
            {"entryType": "paint", "name": "first-contentful-paint", "startTime": 812.5},
            {"entryType": "event", "name": "click", "duration": 96, "interactionId": 7}
        ]"#;
        let entries: Vec<PerformanceEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].entry_type(), EntryType::LayoutShift);
        assert_eq!(entries[2].start_time(), 812.5);
        match &entries[3] {
            PerformanceEntry::Event(e) => assert!(e.is_interaction()),
            other => panic!("Wrong entry type: {:?}", other),
        }
    }

    #[test]
    fn test_event_interaction_id() {
        let mut entry = EventTimingEntry::default();
        assert!(!entry.is_interaction());
        entry.interaction_id = Some(0);
        assert!(!entry.is_interaction());
        entry.interaction_id = Some(3);
        assert!(entry.is_interaction());
    }
}
