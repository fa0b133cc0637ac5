//! Move-induced power-rail instability.

use crate::history::HistoryView;
use serde::{Deserialize, Serialize};
use shared::config::RailConfig;
use shared::stats::clamp01;
use shared::types::{DeviceEvent, EventKind, FaultFinding, FaultKind, Severity, TelemetrySample};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailRisk {
    /// 0..=1
    pub risk: f64,
    pub moves_considered: usize,
    pub hits: usize,
    pub baseline_dip_rate: f64,
    pub reset_count: usize,
    pub low_supply_count: usize,
    pub sufficient: bool,
}

pub fn assess(history: &HistoryView<'_>, config: &RailConfig) -> (RailRisk, Vec<FaultFinding>) {
    let window = config.window();
    let samples = history.samples_within(window);
    let events = history.events_within(window);

    let reset_count = events.iter().filter(|e| e.kind == EventKind::Reset).count();
    let low_supply_count = events.iter().filter(|e| e.kind == EventKind::LowSupply).count();

    let moves: Vec<&DeviceEvent> = events.iter().filter(|e| e.kind == EventKind::Move).collect();
    if moves.is_empty() {
        return (
            RailRisk {
                risk: 0.0,
                moves_considered: 0,
                hits: 0,
                baseline_dip_rate: 0.0,
                reset_count,
                low_supply_count,
                sufficient: false,
            },
            Vec::new(),
        );
    }

    // Sample positions that start a move look-ahead; excluded from the baseline.
    let move_positions: BTreeSet<usize> = moves
        .iter()
        .map(|m| samples.partition_point(|s| s.ts < m.ts))
        .collect();

    let recent = &moves[moves.len().saturating_sub(config.recent_moves.max(1))..];
    let mut findings = Vec::new();
    for mv in recent {
        let start = samples.partition_point(|s| s.ts < mv.ts);
        let dip = lookahead(samples, start, config.lag_samples)
            .iter()
            .map(|s| s.aux_voltage_v)
            .filter(|v| *v < config.dip_voltage_v)
            .reduce(f64::min);
        let supply_event = events.iter().find(|e| {
            matches!(e.kind, EventKind::Reset | EventKind::LowSupply) && {
                let lag = (e.ts - mv.ts).num_seconds();
                (0..=config.event_lag_secs).contains(&lag)
            }
        });

        let detail = match (dip, supply_event) {
            (Some(volts), _) => Some(format!(
                "aux rail dipped to {:.2} V within {} samples of move",
                volts, config.lag_samples
            )),
            (None, Some(ev)) => Some(format!(
                "{} {} s after move",
                ev.kind,
                (ev.ts - mv.ts).num_seconds()
            )),
            (None, None) => None,
        };
        if let Some(detail) = detail {
            findings.push(FaultFinding {
                kind: FaultKind::PowerRailDrop,
                severity: Severity::Critical,
                ts: mv.ts,
                detail,
                correlated_move: Some(mv.ts),
            });
        }
    }

    let baseline_positions: Vec<usize> = (0..samples.len()).filter(|i| !move_positions.contains(i)).collect();
    let baseline_dip_rate = if baseline_positions.is_empty() {
        0.0
    } else {
        baseline_positions
            .iter()
            .filter(|&&i| {
                lookahead(samples, i, config.lag_samples)
                    .iter()
                    .any(|s| s.aux_voltage_v < config.dip_voltage_v)
            })
            .count() as f64
            / baseline_positions.len() as f64
    };

    let hit_rate = findings.len() as f64 / recent.len() as f64;
    let risk = if baseline_dip_rate >= 1.0 {
        0.0
    } else {
        clamp01((hit_rate - baseline_dip_rate) / (1.0 - baseline_dip_rate) / config.saturation_rate)
    };

    tracing::debug!(
        device_id = %history.device_id,
        risk = risk,
        hits = findings.len(),
        moves = recent.len(),
        baseline = baseline_dip_rate,
        "Power rail assessment"
    );

    (
        RailRisk {
            risk,
            moves_considered: recent.len(),
            hits: findings.len(),
            baseline_dip_rate,
            reset_count,
            low_supply_count,
            sufficient: true,
        },
        findings,
    )
}

fn lookahead(samples: &[TelemetrySample], start: usize, lag: usize) -> &[TelemetrySample] {
    let start = start.min(samples.len());
    let end = (start + lag).min(samples.len());
    &samples[start..end]
}
