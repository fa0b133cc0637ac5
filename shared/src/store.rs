//! Read access to the telemetry/event store.
//!
//! The store is append-only and owned by the ingestion side; the engine only
//! issues time-range reads. `InMemoryStore` is a complete implementation used
//! by tests and by embedders that keep history in process.

use crate::types::{DeviceEvent, DeviceId, TelemetrySample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Query failed: {0}")]
    Query(String),
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Range ending at `as_of` inclusive.
    pub fn until(start: DateTime<Utc>, as_of: DateTime<Utc>) -> Self {
        Self {
            start,
            end: as_of + chrono::Duration::nanoseconds(1),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Samples for `device_id` in `range`, ordered by timestamp.
    async fn samples(&self, device_id: &str, range: TimeRange) -> Result<Vec<TelemetrySample>, StoreError>;

    /// Events for `device_id` in `range`, ordered by timestamp.
    async fn events(&self, device_id: &str, range: TimeRange) -> Result<Vec<DeviceEvent>, StoreError>;

    /// Devices the scheduler should visit.
    async fn active_devices(&self) -> Result<Vec<DeviceId>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryStore {
    samples: DashMap<DeviceId, RwLock<Vec<TelemetrySample>>>,
    events: DashMap<DeviceId, RwLock<Vec<DeviceEvent>>>,
    inactive: RwLock<BTreeSet<DeviceId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample, keeping per-device timestamp order.
    pub fn push_sample(&self, sample: TelemetrySample) {
        let entry = self
            .samples
            .entry(sample.device_id.clone())
            .or_insert_with(|| RwLock::new(Vec::new()));
        let mut rows = entry.write();
        let idx = rows.partition_point(|s| s.ts <= sample.ts);
        rows.insert(idx, sample);
    }

    pub fn push_event(&self, event: DeviceEvent) {
        let entry = self
            .events
            .entry(event.device_id.clone())
            .or_insert_with(|| RwLock::new(Vec::new()));
        let mut rows = entry.write();
        let idx = rows.partition_point(|e| e.ts <= event.ts);
        rows.insert(idx, event);
    }

    pub fn extend_samples(&self, samples: impl IntoIterator<Item = TelemetrySample>) {
        for sample in samples {
            self.push_sample(sample);
        }
    }

    pub fn extend_events(&self, events: impl IntoIterator<Item = DeviceEvent>) {
        for event in events {
            self.push_event(event);
        }
    }

    pub fn set_active(&self, device_id: &str, active: bool) {
        let mut inactive = self.inactive.write();
        if active {
            inactive.remove(device_id);
        } else {
            inactive.insert(device_id.to_string());
        }
    }

    pub fn sample_count(&self, device_id: &str) -> usize {
        self.samples.get(device_id).map(|rows| rows.read().len()).unwrap_or(0)
    }
}

#[async_trait]
impl TelemetryStore for InMemoryStore {
    async fn samples(&self, device_id: &str, range: TimeRange) -> Result<Vec<TelemetrySample>, StoreError> {
        Ok(self
            .samples
            .get(device_id)
            .map(|rows| {
                rows.read()
                    .iter()
                    .filter(|s| range.contains(s.ts))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn events(&self, device_id: &str, range: TimeRange) -> Result<Vec<DeviceEvent>, StoreError> {
        Ok(self
            .events
            .get(device_id)
            .map(|rows| {
                rows.read()
                    .iter()
                    .filter(|e| range.contains(e.ts))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn active_devices(&self) -> Result<Vec<DeviceId>, StoreError> {
        let inactive = self.inactive.read();
        let mut devices: BTreeSet<DeviceId> = self.samples.iter().map(|e| e.key().clone()).collect();
        devices.extend(self.events.iter().map(|e| e.key().clone()));
        Ok(devices.into_iter().filter(|d| !inactive.contains(d)).collect())
    }
}
