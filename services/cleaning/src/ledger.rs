//! Cleaning events and their measured effect on energy yield.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use shared::config::CleaningConfig;
use shared::error::{EngineError, EngineResult};
use shared::logger::log_cleaning_computed;
use shared::stats::mean;
use shared::types::{DeviceId, TelemetrySample};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningType {
    Manual,
    AutoWiper,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CleaningState {
    Pending,
    Computed {
        energy_after_wh: f64,
        improvement_wh: f64,
        improvement_percent: f64,
        computed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningLog {
    pub id: Uuid,
    pub device_id: DeviceId,
    pub cleaning_type: CleaningType,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Energy over the baseline window before the cleaning.
    pub energy_before_wh: f64,
    pub state: CleaningState,
}

impl CleaningLog {
    pub fn is_computed(&self) -> bool {
        matches!(self.state, CleaningState::Computed { .. })
    }
}

pub struct CleaningLedger {
    logs: DashMap<Uuid, CleaningLog>,
    config: CleaningConfig,
}

impl CleaningLedger {
    pub fn new(config: CleaningConfig) -> Self {
        Self {
            logs: DashMap::new(),
            config,
        }
    }

    /// Record a cleaning at `recorded_at`, capturing the baseline energy from
    /// the samples in `[recorded_at − baseline, recorded_at)`.
    pub fn record(
        &self,
        device_id: &str,
        cleaning_type: CleaningType,
        note: Option<String>,
        recorded_at: DateTime<Utc>,
        samples: &[TelemetrySample],
    ) -> CleaningLog {
        let baseline = self.config.baseline();
        let energy_before_wh = window_energy_wh(samples, recorded_at - baseline, recorded_at, baseline);

        let log = CleaningLog {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            cleaning_type,
            note,
            recorded_at,
            energy_before_wh,
            state: CleaningState::Pending,
        };
        tracing::info!(
            device_id = %device_id,
            log_id = %log.id,
            energy_before_wh = energy_before_wh,
            "Cleaning recorded"
        );
        self.logs.insert(log.id, log.clone());
        log
    }

    /// Compute every pending log of `device_id` whose measurement window has
    /// closed by `as_of`. Returns the logs this call transitioned.
    pub fn process_due(&self, device_id: &str, samples: &[TelemetrySample], as_of: DateTime<Utc>) -> Vec<CleaningLog> {
        let due_after = self.config.due_after();
        let due: Vec<(Uuid, DateTime<Utc>)> = self
            .logs
            .iter()
            .filter(|entry| {
                let log = entry.value();
                log.device_id == device_id && !log.is_computed() && log.recorded_at + due_after <= as_of
            })
            .map(|entry| (entry.value().id, entry.value().recorded_at))
            .collect();

        let measure = self.config.measure();
        let mut computed = Vec::new();
        for (id, recorded_at) in due {
            let energy_after_wh = window_energy_wh(samples, recorded_at, recorded_at + measure, measure);
            match self.complete(id, energy_after_wh, as_of) {
                Ok(log) => computed.push(log),
                Err(EngineError::DuplicateCleaningComputation { log_id }) => {
                    tracing::debug!(log_id = %log_id, "Cleaning already computed; ignoring");
                }
                Err(e) => {
                    tracing::warn!(log_id = %id, error = %e, "Cleaning log vanished before computation");
                }
            }
        }
        computed
    }

    /// Transition one log from Pending to Computed.
    ///
    /// The check and the write happen under the entry lock, so a log is
    /// computed at most once no matter how many passes race on it.
    pub fn complete(&self, id: Uuid, energy_after_wh: f64, computed_at: DateTime<Utc>) -> EngineResult<CleaningLog> {
        let mut entry = self.logs.get_mut(&id).ok_or(EngineError::CleaningLogNotFound(id))?;
        let log = entry.value_mut();
        if log.is_computed() {
            return Err(EngineError::DuplicateCleaningComputation { log_id: id });
        }

        let before = log.energy_before_wh;
        let improvement_wh = if self.config.baseline_minutes == self.config.measure_minutes {
            energy_after_wh - before
        } else {
            let baseline_h = self.config.baseline_minutes as f64 / 60.0;
            let measure_h = self.config.measure_minutes as f64 / 60.0;
            energy_after_wh / measure_h - before / baseline_h
        };
        let improvement_percent = if before > 0.0 {
            (energy_after_wh - before) / before * 100.0
        } else {
            0.0
        };

        log.state = CleaningState::Computed {
            energy_after_wh,
            improvement_wh,
            improvement_percent,
            computed_at,
        };
        log_cleaning_computed(
            &log.device_id,
            &id.to_string(),
            before,
            energy_after_wh,
            improvement_percent,
        );
        Ok(log.clone())
    }

    pub fn get(&self, id: Uuid) -> EngineResult<CleaningLog> {
        self.logs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::CleaningLogNotFound(id))
    }

    /// All logs of a device, oldest first.
    pub fn results(&self, device_id: &str) -> Vec<CleaningLog> {
        let mut logs: Vec<CleaningLog> = self
            .logs
            .iter()
            .filter(|entry| entry.value().device_id == device_id)
            .map(|entry| entry.value().clone())
            .collect();
        logs.sort_by_key(|log| log.recorded_at);
        logs
    }

    pub fn pending_count(&self, device_id: &str) -> usize {
        self.logs
            .iter()
            .filter(|entry| entry.value().device_id == device_id && !entry.value().is_computed())
            .count()
    }
}

/// Mean power over `[start, end)` times the window length. 0 without samples.
fn window_energy_wh(samples: &[TelemetrySample], start: DateTime<Utc>, end: DateTime<Utc>, span: Duration) -> f64 {
    let lo = samples.partition_point(|s| s.ts < start);
    let hi = samples.partition_point(|s| s.ts < end);
    let powers: Vec<f64> = samples[lo..hi.max(lo)].iter().map(|s| s.power_w).collect();
    mean(&powers).unwrap_or(0.0) * span.num_seconds() as f64 / 3600.0
}
