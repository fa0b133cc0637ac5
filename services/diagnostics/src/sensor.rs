use crate::history::HistoryView;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use shared::config::SensorConfig;
use shared::stats::{clamp01, mean, pstdev};
use shared::types::{EventKind, FaultFinding, FaultKind, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorHealth {
    /// 0..=100, higher is healthier.
    pub score: f64,
    pub fault_rate: f64,
    pub signal_instability: f64,
    pub missing_rate: f64,
    pub zero_current_ratio: f64,
    pub offset_drift_v: f64,
    pub samples: usize,
    pub sufficient: bool,
}

pub fn assess(history: &HistoryView<'_>, config: &SensorConfig) -> SensorHealth {
    let recent = history.samples_within(config.window());
    let n = recent.len();
    if n < config.min_samples.max(1) {
        return SensorHealth {
            score: config.neutral_score,
            fault_rate: 0.0,
            signal_instability: 0.0,
            missing_rate: 0.0,
            zero_current_ratio: 0.0,
            offset_drift_v: 0.0,
            samples: n,
            sufficient: false,
        };
    }
    let count = n as f64;

    let fault_rate = recent.iter().filter(|s| !s.fault_flags.is_empty()).count() as f64 / count;

    let rssi: Vec<f64> = recent.iter().map(|s| s.rssi_dbm as f64).collect();
    let signal_instability = clamp01(pstdev(&rssi) / config.rssi_std_ceiling_db);

    let span_secs = (recent[n - 1].ts - recent[0].ts).num_seconds().max(0);
    let expected = (span_secs / config.expected_interval_secs.max(1)) as f64 + 1.0;
    let missing_rate = clamp01(1.0 - count / expected);

    let zero_current_ratio = recent
        .iter()
        .filter(|s| s.voltage_v > config.zero_current_min_voltage_v && s.current_a < config.zero_current_max_current_a)
        .count() as f64
        / count;

    let offsets: Vec<f64> = recent.iter().map(|s| s.sensor_offset_v).collect();
    let baseline: Vec<f64> = history
        .samples_within(config.baseline())
        .iter()
        .map(|s| s.sensor_offset_v)
        .collect();
    let offset_drift_v = match (mean(&offsets), mean(&baseline)) {
        (Some(recent_mean), Some(baseline_mean)) => (recent_mean - baseline_mean).abs(),
        _ => 0.0,
    };
    let drift_penalty = clamp01(offset_drift_v / config.offset_drift_ceiling_v);

    let score = 100.0
        - config.fault_weight * fault_rate
        - config.signal_weight * signal_instability
        - config.missing_weight * missing_rate
        - config.zero_current_weight * zero_current_ratio
        - config.offset_weight * drift_penalty;

    SensorHealth {
        score: score.clamp(0.0, 100.0),
        fault_rate,
        signal_instability,
        missing_rate,
        zero_current_ratio,
        offset_drift_v,
        samples: n,
        sufficient: true,
    }
}

/// Clusters of sensor-fault events inside the sensor window.
pub fn wiring_findings(history: &HistoryView<'_>, config: &SensorConfig) -> Vec<FaultFinding> {
    let faults: Vec<_> = history.events_of_kind(config.window(), EventKind::SensorFault).collect();
    let size = config.fault_cluster_size.max(1);
    let span = Duration::minutes(config.fault_cluster_minutes);

    let mut findings = Vec::new();
    let mut i = 0;
    while i + size <= faults.len() {
        let first = faults[i];
        let last = faults[i + size - 1];
        if last.ts - first.ts <= span {
            // Extend the cluster over every fault still inside the span
            let mut end = i + size;
            while end < faults.len() && faults[end].ts - first.ts <= span {
                end += 1;
            }
            findings.push(FaultFinding {
                kind: FaultKind::SensorWiringInstability,
                severity: Severity::Warn,
                ts: faults[end - 1].ts,
                detail: format!(
                    "{} sensor faults within {} minutes",
                    end - i,
                    config.fault_cluster_minutes
                ),
                correlated_move: None,
            });
            i = end;
        } else {
            i += 1;
        }
    }
    findings
}
