use crate::history::HistoryView;
use serde::{Deserialize, Serialize};
use shared::config::ClockConfig;
use shared::types::{EventKind, FaultFinding, FaultKind, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockReliability {
    /// 0..=100; 100 when no clock loss was reported.
    pub score: f64,
    pub events: usize,
    pub per_day: f64,
    pub sufficient: bool,
}

pub fn assess(history: &HistoryView<'_>, config: &ClockConfig) -> (ClockReliability, Vec<FaultFinding>) {
    let lost: Vec<_> = history.events_of_kind(config.window(), EventKind::ClockLost).collect();
    let days = (config.window_hours as f64 / 24.0).max(f64::EPSILON);
    let per_day = lost.len() as f64 / days;
    let excess = (per_day - config.tolerated_per_day).max(0.0);
    let score = (100.0 - config.penalty_per_event * excess).clamp(0.0, 100.0);

    let findings = match lost.last() {
        Some(last) if per_day > config.tolerated_per_day => vec![FaultFinding {
            kind: FaultKind::ClockUnstable,
            severity: Severity::Warn,
            ts: last.ts,
            detail: format!("{:.1} clock losses per day", per_day),
            correlated_move: None,
        }],
        _ => Vec::new(),
    };

    (
        ClockReliability {
            score,
            events: lost.len(),
            per_day,
            sufficient: true,
        },
        findings,
    )
}
