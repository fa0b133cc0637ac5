use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::config::MovementConfig;
use shared::stats::mean;
use shared::types::{DeviceEvent, DeviceId, EventKind, Slot, SlotClock, TelemetrySample};

/// One executed move with the power observed around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRecord {
    pub device_id: DeviceId,
    pub ts: DateTime<Utc>,
    pub slot: Slot,
    pub from_angle: Option<f64>,
    pub to_angle: Option<f64>,
    pub duration_secs: Option<f64>,
    pub energy_cost_wh: Option<f64>,
    /// Latest sample at or before the move, within the sample window.
    pub before_power_w: Option<f64>,
    /// Earliest sample after the move, within the sample window.
    pub after_power_w: Option<f64>,
}

impl MovementRecord {
    /// after − before, when both sides were observed.
    pub fn power_gain_w(&self) -> Option<f64> {
        match (self.before_power_w, self.after_power_w) {
            (Some(before), Some(after)) => Some(after - before),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementEfficiency {
    pub window_hours: f64,
    pub moves: usize,
    pub measured_moves: usize,
    pub unmeasured_moves: usize,
    pub moves_per_hour: f64,
    /// Mean after − before power over measured moves (W).
    pub energy_gain_per_move_w: f64,
    /// Share of measured moves that did not raise power, in [0, 100].
    pub wasted_moves_percent: f64,
    pub sufficient: bool,
}

/// Pair every move event with the telemetry around it.
///
/// `samples` must be ordered by timestamp.
pub fn movement_records(
    events: &[DeviceEvent],
    samples: &[TelemetrySample],
    config: &MovementConfig,
    clock: &SlotClock,
) -> Vec<MovementRecord> {
    let window = config.sample_window();

    events
        .iter()
        .filter(|e| e.kind == EventKind::Move)
        .map(|event| {
            let payload = event.move_payload().unwrap_or_default();
            let split = samples.partition_point(|s| s.ts <= event.ts);
            let before = samples[..split]
                .last()
                .filter(|s| event.ts - s.ts <= window)
                .map(|s| s.power_w);
            let after = samples
                .get(split)
                .filter(|s| s.ts - event.ts <= window)
                .map(|s| s.power_w);

            let energy_cost_wh = payload.energy_cost_wh.or_else(|| {
                match (payload.motor_estimated_power_w, payload.duration_sec) {
                    (Some(power), Some(secs)) => Some(power * secs / 3600.0),
                    _ => None,
                }
            });

            MovementRecord {
                device_id: event.device_id.clone(),
                ts: event.ts,
                slot: clock.slot_of(event.ts),
                from_angle: payload.from_angle,
                to_angle: payload.to_angle,
                duration_secs: payload.duration_sec,
                energy_cost_wh,
                before_power_w: before,
                after_power_w: after,
            }
        })
        .collect()
}

/// Movement efficiency over the trailing `window` ending at `as_of`.
///
/// Moves without a sample on both sides count towards `moves` and
/// `moves_per_hour` but not towards the gain or the wasted share.
pub fn movement_efficiency(records: &[MovementRecord], as_of: DateTime<Utc>, window: Duration) -> MovementEfficiency {
    let start = as_of - window;
    let in_window: Vec<&MovementRecord> = records.iter().filter(|r| r.ts > start && r.ts <= as_of).collect();
    let gains: Vec<f64> = in_window.iter().filter_map(|r| r.power_gain_w()).collect();

    let window_hours = window.num_seconds() as f64 / 3600.0;
    let wasted = gains.iter().filter(|g| **g <= 0.0).count();
    let measured = gains.len();

    MovementEfficiency {
        window_hours,
        moves: in_window.len(),
        measured_moves: measured,
        unmeasured_moves: in_window.len() - measured,
        moves_per_hour: if window_hours > 0.0 {
            in_window.len() as f64 / window_hours
        } else {
            0.0
        },
        energy_gain_per_move_w: mean(&gains).unwrap_or(0.0),
        wasted_moves_percent: if measured > 0 {
            wasted as f64 / measured as f64 * 100.0
        } else {
            0.0
        },
        sufficient: measured > 0,
    }
}

/// Motor energy per move: `motor_power_w × mean(duration of the last n moves) / 3600`.
pub fn estimate_motor_cost_wh(
    records: &[MovementRecord],
    motor_power_w: f64,
    default_duration_secs: f64,
    sample: usize,
) -> f64 {
    let durations: Vec<f64> = records
        .iter()
        .rev()
        .filter_map(|r| r.duration_secs)
        .filter(|d| *d > 0.0)
        .take(sample.max(1))
        .collect();
    let duration = mean(&durations).unwrap_or(default_duration_secs);
    motor_power_w * duration / 3600.0
}

/// Move events in `(as_of − 1 h, as_of]`.
pub fn recent_move_count(events: &[DeviceEvent], as_of: DateTime<Utc>) -> u32 {
    let start = as_of - Duration::hours(1);
    events
        .iter()
        .filter(|e| e.kind == EventKind::Move && e.ts > start && e.ts <= as_of)
        .count() as u32
}
