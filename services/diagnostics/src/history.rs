use chrono::{DateTime, Duration, Utc};
use shared::types::{DeviceEvent, EventKind, TelemetrySample};

/// Read-only view of the history a pass fetched once at its start.
///
/// Both slices are ordered by timestamp and end at or before `as_of`.
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    pub device_id: &'a str,
    pub samples: &'a [TelemetrySample],
    pub events: &'a [DeviceEvent],
    pub as_of: DateTime<Utc>,
}

impl<'a> HistoryView<'a> {
    pub fn new(
        device_id: &'a str,
        samples: &'a [TelemetrySample],
        events: &'a [DeviceEvent],
        as_of: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id,
            samples,
            events,
            as_of,
        }
    }

    /// Samples in `(as_of − span, as_of]`.
    pub fn samples_within(&self, span: Duration) -> &'a [TelemetrySample] {
        let start = self.as_of - span;
        let lo = self.samples.partition_point(|s| s.ts <= start);
        let hi = self.samples.partition_point(|s| s.ts <= self.as_of);
        &self.samples[lo..hi.max(lo)]
    }

    /// Events in `(as_of − span, as_of]`.
    pub fn events_within(&self, span: Duration) -> &'a [DeviceEvent] {
        let start = self.as_of - span;
        let lo = self.events.partition_point(|e| e.ts <= start);
        let hi = self.events.partition_point(|e| e.ts <= self.as_of);
        &self.events[lo..hi.max(lo)]
    }

    pub fn events_of_kind(&self, span: Duration, kind: EventKind) -> impl Iterator<Item = &'a DeviceEvent> {
        self.events_within(span).iter().filter(move |e| e.kind == kind)
    }

    pub fn latest_sample(&self) -> Option<&'a TelemetrySample> {
        let hi = self.samples.partition_point(|s| s.ts <= self.as_of);
        self.samples[..hi].last()
    }
}
