use aggregator_service::BestAngle;
use alerts_service::{Alert, AlertChanges, Recommendation};
use chrono::{DateTime, Duration, Utc};
use cleaning_service::CleaningLog;
use dashmap::DashMap;
use decision_service::NetGainDecision;
use diagnostics_service::DiagnosticsReport;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared::types::DeviceId;
use std::collections::VecDeque;
use std::sync::Arc;

/// Immutable result of one completed device pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub device_id: DeviceId,
    pub generated_at: DateTime<Utc>,
    pub report: DiagnosticsReport,
    /// None until the device has reported any telemetry.
    pub decision: Option<NetGainDecision>,
    pub best_angles: Vec<BestAngle>,
    pub motor_cost_wh: f64,
    pub settings_defaulted: bool,
    pub alert_changes: AlertChanges,
    pub active_alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    pub narrative: Option<String>,
    /// Non-fatal conditions of this pass: defaulted settings, neutral scores.
    pub degraded: Vec<String>,
    pub cleaning_computed: Vec<CleaningLog>,
    pub samples_read: usize,
    pub samples_absorbed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotView {
    pub snapshot: DiagnosticsSnapshot,
    /// Older than the configured number of ticks.
    pub stale: bool,
}

/// Latest snapshot per device plus a bounded history.
pub struct SnapshotStore {
    current: DashMap<DeviceId, Arc<DiagnosticsSnapshot>>,
    history: DashMap<DeviceId, Mutex<VecDeque<Arc<DiagnosticsSnapshot>>>>,
    capacity: usize,
}

impl SnapshotStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            current: DashMap::new(),
            history: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn publish(&self, snapshot: DiagnosticsSnapshot) -> Arc<DiagnosticsSnapshot> {
        let snapshot = Arc::new(snapshot);
        {
            let entry = self
                .history
                .entry(snapshot.device_id.clone())
                .or_insert_with(|| Mutex::new(VecDeque::new()));
            let mut history = entry.lock();
            history.push_back(Arc::clone(&snapshot));
            while history.len() > self.capacity {
                history.pop_front();
            }
        }
        self.current.insert(snapshot.device_id.clone(), Arc::clone(&snapshot));
        snapshot
    }

    pub fn current(&self, device_id: &str) -> Option<Arc<DiagnosticsSnapshot>> {
        self.current.get(device_id).map(|s| Arc::clone(s.value()))
    }

    pub fn view(&self, device_id: &str, now: DateTime<Utc>, stale_after: Duration) -> Option<SnapshotView> {
        self.current(device_id).map(|snapshot| SnapshotView {
            stale: now - snapshot.generated_at > stale_after,
            snapshot: (*snapshot).clone(),
        })
    }

    /// Oldest first.
    pub fn history(&self, device_id: &str) -> Vec<Arc<DiagnosticsSnapshot>> {
        self.history
            .get(device_id)
            .map(|h| h.lock().iter().cloned().collect())
            .unwrap_or_default()
    }
}
