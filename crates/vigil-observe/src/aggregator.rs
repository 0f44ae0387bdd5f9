//! Turns performance entry batches into Web Vitals.
//!
//! Each entry category has one extraction rule. Every successful update
//! overwrites the stored value for its metric and is offered to the
//! [`Reporter`]. Rules for different metrics touch disjoint state, so
//! batches of different categories may arrive in any order.

use std::sync::Arc;

use tracing::trace;

use vigil_core::{
    EntryType, LayoutShiftEntry, MetricName, MonitorConfig, NavigationTiming, PaintEntry,
    PerformanceEntry,
};

use crate::events::{EventDispatcher, TelemetryEvent};
use crate::metrics::WebVitals;
use crate::reporting::Reporter;

/// Entry categories that feed metrics through live observation.
pub const OBSERVED_ENTRY_TYPES: [EntryType; 5] = [
    EntryType::Paint,
    EntryType::LargestContentfulPaint,
    EntryType::FirstInput,
    EntryType::LayoutShift,
    EntryType::Event,
];

/// Aggregates entry batches into the metric map.
pub struct MetricAggregator {
    vitals: WebVitals,
    cls_total: f64,
    long_task_threshold_ms: f64,
    slow_resource_threshold_ms: f64,
    reporter: Arc<Reporter>,
    events: Arc<EventDispatcher>,
}

impl MetricAggregator {
    /// Create an aggregator with an empty metric map.
    pub fn new(
        config: &MonitorConfig,
        reporter: Arc<Reporter>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            vitals: WebVitals::new(),
            cls_total: 0.0,
            long_task_threshold_ms: config.long_task_threshold_ms,
            slow_resource_threshold_ms: config.slow_resource_threshold_ms,
            reporter,
            events,
        }
    }

    /// Copy of the current metric map.
    pub fn metrics(&self) -> WebVitals {
        self.vitals
    }

    /// Process one batch delivered for `entry_type`.
    ///
    /// Entries of other categories in the batch are ignored. Returns the
    /// number of metric updates made.
    pub fn ingest(&mut self, entry_type: EntryType, entries: &[PerformanceEntry]) -> usize {
        trace!(entry_type = %entry_type, count = entries.len(), "Ingesting batch");

        match entry_type {
            EntryType::Paint => self.ingest_paint(entries),
            EntryType::LargestContentfulPaint => self.ingest_lcp(entries),
            EntryType::FirstInput => self.ingest_first_input(entries),
            EntryType::LayoutShift => self.ingest_layout_shift(entries),
            EntryType::Navigation => self.ingest_navigation(entries),
            EntryType::Event => self.ingest_event_timing(entries),
            EntryType::LongTask => {
                self.flag_long_tasks(entries);
                0
            }
            EntryType::Resource => {
                self.flag_slow_resources(entries);
                0
            }
        }
    }

    fn record(&mut self, name: MetricName, value: f64) -> bool {
        if !value.is_finite() {
            trace!(metric = name.as_str(), "Discarding non-finite value");
            return false;
        }
        self.vitals.set(name, value);
        self.events.emit(TelemetryEvent::MetricRecorded { name, value });
        self.reporter.report(name, value);
        true
    }

    fn ingest_paint(&mut self, entries: &[PerformanceEntry]) -> usize {
        let fcp = paints(entries).find(|p| p.is_first_contentful_paint());
        match fcp {
            Some(entry) => usize::from(self.record(MetricName::Fcp, entry.start_time)),
            None => 0,
        }
    }

    fn ingest_lcp(&mut self, entries: &[PerformanceEntry]) -> usize {
        let last = entries
            .iter()
            .filter_map(|e| match e {
                PerformanceEntry::LargestContentfulPaint(lcp) => Some(lcp),
                _ => None,
            })
            .last();
        match last {
            Some(entry) => usize::from(self.record(MetricName::Lcp, entry.paint_time())),
            None => 0,
        }
    }

    fn ingest_first_input(&mut self, entries: &[PerformanceEntry]) -> usize {
        let delays: Vec<f64> = entries
            .iter()
            .filter_map(|e| match e {
                PerformanceEntry::FirstInput(input) => Some(input.input_delay()),
                _ => None,
            })
            .collect();

        let mut updates = 0;
        for delay in delays {
            if delay >= 0.0 {
                updates += usize::from(self.record(MetricName::Fid, delay));
            }
        }
        updates
    }

    fn ingest_layout_shift(&mut self, entries: &[PerformanceEntry]) -> usize {
        let shifts: Vec<f64> = entries
            .iter()
            .filter_map(|e| match e {
                PerformanceEntry::LayoutShift(shift) => unexpected_shift(shift),
                _ => None,
            })
            .collect();

        let mut updates = 0;
        for value in shifts {
            if !value.is_finite() || value < 0.0 {
                continue;
            }
            self.cls_total += value;
            let total = self.cls_total;
            updates += usize::from(self.record(MetricName::Cls, total));
        }
        updates
    }

    fn ingest_navigation(&mut self, entries: &[PerformanceEntry]) -> usize {
        let timing = entries.iter().find_map(|e| match e {
            PerformanceEntry::Navigation(nav) => Some(nav),
            _ => None,
        });
        let Some(ttfb) = timing.map(NavigationTiming::time_to_first_byte) else {
            return 0;
        };
        if ttfb < 0.0 {
            return 0;
        }
        usize::from(self.record(MetricName::Ttfb, ttfb))
    }

    fn ingest_event_timing(&mut self, entries: &[PerformanceEntry]) -> usize {
        let longest = entries
            .iter()
            .filter_map(|e| match e {
                PerformanceEntry::Event(event) if event.is_interaction() => Some(event),
                _ => None,
            })
            .map(|event| event.duration)
            .filter(|d| d.is_finite())
            .fold(None, |max: Option<f64>, d| Some(max.map_or(d, |m| m.max(d))));

        match (longest, self.vitals.inp) {
            (Some(d), Some(current)) if d <= current => 0,
            (Some(d), _) => usize::from(self.record(MetricName::Inp, d)),
            (None, _) => 0,
        }
    }

    fn flag_long_tasks(&self, entries: &[PerformanceEntry]) {
        let long_tasks = entries.iter().filter_map(|e| match e {
            PerformanceEntry::LongTask(task) => Some(task),
            _ => None,
        });
        for task in long_tasks.filter(|t| t.duration > self.long_task_threshold_ms) {
            self.events.emit(TelemetryEvent::LongTaskDetected {
                duration: task.duration,
                start_time: task.start_time,
            });
        }
    }

    fn flag_slow_resources(&self, entries: &[PerformanceEntry]) {
        let resources = entries.iter().filter_map(|e| match e {
            PerformanceEntry::Resource(resource) => Some(resource),
            _ => None,
        });
        for resource in resources.filter(|r| r.duration > self.slow_resource_threshold_ms) {
            self.events.emit(TelemetryEvent::SlowResourceDetected {
                name: resource.name.clone(),
                duration: resource.duration,
            });
        }
    }
}

impl std::fmt::Debug for MetricAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricAggregator")
            .field("vitals", &self.vitals)
            .field("cls_total", &self.cls_total)
            .finish()
    }
}

fn paints(entries: &[PerformanceEntry]) -> impl Iterator<Item = &PaintEntry> {
    entries.iter().filter_map(|e| match e {
        PerformanceEntry::Paint(paint) => Some(paint),
        _ => None,
    })
}

fn unexpected_shift(shift: &LayoutShiftEntry) -> Option<f64> {
    (!shift.had_recent_input).then_some(shift.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use vigil_core::{
        EventTimingEntry, FirstInputEntry, LargestContentfulPaintEntry, LongTaskEntry,
        ResourceEntry, SamplingConfig,
    };

    use crate::events::{CollectingSubscriber, EventSubscriber};
    use crate::reporting::{AnalyticsSink, RecordingSink};

    struct Fixture {
        aggregator: MetricAggregator,
        sink: Arc<RecordingSink>,
        events: Arc<CollectingSubscriber>,
    }

    fn fixture() -> Fixture {
        let config = MonitorConfig::new()
            .with_sampling(SamplingConfig::new().with_sample_rate(1.0));
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Arc::new(EventDispatcher::new());
        let events = Arc::new(CollectingSubscriber::new(1000));
        dispatcher.subscribe(Arc::clone(&events) as Arc<dyn EventSubscriber>);

        let reporter = Arc::new(
            Reporter::new(&config)
                .with_sink(Arc::clone(&sink) as Arc<dyn AnalyticsSink>)
                .with_events(Arc::clone(&dispatcher)),
        );
        Fixture {
            aggregator: MetricAggregator::new(&config, reporter, dispatcher),
            sink,
            events,
        }
    }

    fn shift(value: f64, had_recent_input: bool) -> PerformanceEntry {
        PerformanceEntry::LayoutShift(LayoutShiftEntry::new(value, had_recent_input))
    }

    fn first_input(start_time: f64, processing_start: f64) -> PerformanceEntry {
        PerformanceEntry::FirstInput(FirstInputEntry {
            name: "pointerdown".into(),
            start_time,
            processing_start,
            ..Default::default()
        })
    }

    fn lcp(render_time: Option<f64>, load_time: Option<f64>) -> PerformanceEntry {
        PerformanceEntry::LargestContentfulPaint(LargestContentfulPaintEntry {
            render_time,
            load_time,
            ..Default::default()
        })
    }

    fn interaction(duration: f64, interaction_id: Option<u64>) -> PerformanceEntry {
        PerformanceEntry::Event(EventTimingEntry {
            name: "click".into(),
            duration,
            interaction_id,
            ..Default::default()
        })
    }

    #[test]
    fn test_cls_accumulates_unexpected_shifts() {
        let mut f = fixture();
        f.aggregator.ingest(
            EntryType::LayoutShift,
            &[shift(0.05, false), shift(0.1, false), shift(0.02, false)],
        );

        let cls = f.aggregator.metrics().cls.unwrap();
        assert!((cls - 0.17).abs() < 1e-9);
        assert_eq!(f.sink.calls_for("cls").len(), 3);
    }

    #[test]
    fn test_cls_ignores_input_driven_shifts_across_batches() {
        let mut f = fixture();
        f.aggregator.ingest(EntryType::LayoutShift, &[shift(0.05, false), shift(0.4, true)]);
        f.aggregator.ingest(EntryType::LayoutShift, &[shift(0.1, false)]);

        let cls = f.aggregator.metrics().cls.unwrap();
        assert!((cls - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_fid_extraction() {
        let mut f = fixture();
        assert_eq!(f.aggregator.ingest(EntryType::FirstInput, &[first_input(100.0, 130.0)]), 1);
        assert_eq!(f.aggregator.metrics().fid, Some(30.0));
    }

    #[test]
    fn test_negative_fid_is_skipped() {
        let mut f = fixture();
        assert_eq!(f.aggregator.ingest(EntryType::FirstInput, &[first_input(130.0, 100.0)]), 0);
        assert_eq!(f.aggregator.metrics().fid, None);
        assert!(f.sink.is_empty());
    }

    #[test]
    fn test_fcp_uses_first_contentful_paint() {
        let mut f = fixture();
        let batch = [
            PerformanceEntry::Paint(PaintEntry::new("first-paint", 80.0)),
            PerformanceEntry::Paint(PaintEntry::new("first-contentful-paint", 120.0)),
            PerformanceEntry::Paint(PaintEntry::new("first-contentful-paint", 999.0)),
        ];
        f.aggregator.ingest(EntryType::Paint, &batch);
        assert_eq!(f.aggregator.metrics().fcp, Some(120.0));

        let mut f = fixture();
        f.aggregator.ingest(
            EntryType::Paint,
            &[PerformanceEntry::Paint(PaintEntry::new("first-paint", 80.0))],
        );
        assert_eq!(f.aggregator.metrics().fcp, None);
    }

    #[test]
    fn test_lcp_takes_last_entry_and_updates_live() {
        let mut f = fixture();
        f.aggregator.ingest(
            EntryType::LargestContentfulPaint,
            &[lcp(Some(900.0), None), lcp(Some(1400.0), Some(1300.0))],
        );
        assert_eq!(f.aggregator.metrics().lcp, Some(1400.0));

        f.aggregator.ingest(EntryType::LargestContentfulPaint, &[lcp(None, Some(2100.0))]);
        assert_eq!(f.aggregator.metrics().lcp, Some(2100.0));

        f.aggregator.ingest(EntryType::LargestContentfulPaint, &[lcp(None, None)]);
        assert_eq!(f.aggregator.metrics().lcp, Some(0.0));
    }

    #[test]
    fn test_ttfb_from_navigation() {
        let mut f = fixture();
        let nav = PerformanceEntry::Navigation(NavigationTiming {
            request_start: 20.0,
            response_start: 180.0,
            ..Default::default()
        });
        f.aggregator.ingest(EntryType::Navigation, &[nav]);
        assert_eq!(f.aggregator.metrics().ttfb, Some(160.0));
    }

    #[test]
    fn test_inp_keeps_longest_interaction() {
        let mut f = fixture();
        f.aggregator.ingest(
            EntryType::Event,
            &[interaction(120.0, Some(7)), interaction(900.0, None)],
        );
        assert_eq!(f.aggregator.metrics().inp, Some(120.0));

        assert_eq!(f.aggregator.ingest(EntryType::Event, &[interaction(80.0, Some(8))]), 0);
        assert_eq!(f.aggregator.metrics().inp, Some(120.0));

        f.aggregator.ingest(EntryType::Event, &[interaction(240.0, Some(9))]);
        assert_eq!(f.aggregator.metrics().inp, Some(240.0));
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let mut f = fixture();
        f.aggregator.ingest(EntryType::LayoutShift, &[shift(f64::NAN, false)]);
        f.aggregator.ingest(
            EntryType::LargestContentfulPaint,
            &[lcp(Some(f64::INFINITY), None)],
        );
        assert!(f.aggregator.metrics().is_empty());
        assert!(f.sink.is_empty());
    }

    #[test]
    fn test_long_tasks_and_slow_resources_raise_events() {
        let mut f = fixture();
        let tasks = [
            PerformanceEntry::LongTask(LongTaskEntry {
                name: "self".into(),
                start_time: 10.0,
                duration: 49.0,
            }),
            PerformanceEntry::LongTask(LongTaskEntry {
                name: "self".into(),
                start_time: 90.0,
                duration: 120.0,
            }),
        ];
        let resources = [PerformanceEntry::Resource(ResourceEntry {
            name: "https://cdn.example.com/hero.jpg".into(),
            initiator_type: "img".into(),
            start_time: 5.0,
            duration: 1500.0,
        })];

        assert_eq!(f.aggregator.ingest(EntryType::LongTask, &tasks), 0);
        assert_eq!(f.aggregator.ingest(EntryType::Resource, &resources), 0);

        assert_eq!(
            f.events.kinds(),
            vec!["long_task_detected", "slow_resource_detected"]
        );
        assert!(f.aggregator.metrics().is_empty());
    }

    #[test]
    fn test_mismatched_entries_are_ignored() {
        let mut f = fixture();
        assert_eq!(f.aggregator.ingest(EntryType::Paint, &[shift(0.3, false)]), 0);
        assert!(f.aggregator.metrics().is_empty());
    }

    proptest! {
        #[test]
        fn cls_never_decreases(values in proptest::collection::vec((0.0f64..1.0, any::<bool>()), 0..40)) {
            let mut f = fixture();
            let mut previous = 0.0;
            for (value, had_input) in values {
                f.aggregator.ingest(EntryType::LayoutShift, &[shift(value, had_input)]);
                let current = f.aggregator.metrics().cls.unwrap_or(0.0);
                prop_assert!(current >= previous);
                previous = current;
            }
        }

        #[test]
        fn category_order_does_not_matter(fid in 0.0f64..500.0, cls in 0.0f64..1.0) {
            let mut a = fixture();
            a.aggregator.ingest(EntryType::FirstInput, &[first_input(0.0, fid)]);
            a.aggregator.ingest(EntryType::LayoutShift, &[shift(cls, false)]);

            let mut b = fixture();
            b.aggregator.ingest(EntryType::LayoutShift, &[shift(cls, false)]);
            b.aggregator.ingest(EntryType::FirstInput, &[first_input(0.0, fid)]);

            prop_assert_eq!(a.aggregator.metrics(), b.aggregator.metrics());
        }
    }
}
