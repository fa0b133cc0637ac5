//! Builders for telemetry fixtures.
//!
//! Used by the unit and integration tests of every service crate.

use crate::types::{DeviceEvent, DeviceMode, EventKind, FaultFlags, SlotClock, TelemetrySample};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

/// Midnight UTC of a fixed day, so slot arithmetic in tests is stable.
pub fn day_start() -> DateTime<Utc> {
    // 2024-06-01T00:00:00Z
    Utc.timestamp_opt(1_717_200_000, 0).single().unwrap_or_default()
}

/// `day_start()` plus `minutes`.
pub fn at(minutes: i64) -> DateTime<Utc> {
    day_start() + Duration::minutes(minutes)
}

#[derive(Debug, Clone)]
pub struct SampleBuilder {
    sample: TelemetrySample,
}

impl SampleBuilder {
    pub fn new(device_id: &str, ts: DateTime<Utc>) -> Self {
        let clock = SlotClock::default();
        Self {
            sample: TelemetrySample {
                device_id: device_id.to_string(),
                ts,
                seq: ts.timestamp() as u64,
                voltage_v: 12.0,
                current_a: 0.0,
                power_w: 0.0,
                angle_deg: 30.0,
                mode: DeviceMode::Auto,
                slot: clock.slot_of(ts),
                energy_today_wh: 0.0,
                move_count_today: 0,
                aux_voltage_v: 5.0,
                sensor_offset_v: 2.5,
                rssi_dbm: -52,
                fault_flags: FaultFlags::empty(),
            },
        }
    }

    pub fn clock(mut self, clock: SlotClock) -> Self {
        self.sample.slot = clock.slot_of(self.sample.ts);
        self
    }

    /// Sets power and derives current from the panel voltage.
    pub fn power(mut self, power_w: f64) -> Self {
        self.sample.power_w = power_w;
        self.sample.current_a = if self.sample.voltage_v > 0.0 {
            power_w / self.sample.voltage_v
        } else {
            0.0
        };
        self
    }

    pub fn electrical(mut self, voltage_v: f64, current_a: f64) -> Self {
        self.sample.voltage_v = voltage_v;
        self.sample.current_a = current_a;
        self.sample.power_w = TelemetrySample::power_of(voltage_v, current_a);
        self
    }

    pub fn angle(mut self, angle_deg: f64) -> Self {
        self.sample.angle_deg = angle_deg;
        self
    }

    pub fn slot(mut self, slot: u16) -> Self {
        self.sample.slot = slot;
        self
    }

    pub fn energy_today(mut self, wh: f64) -> Self {
        self.sample.energy_today_wh = wh;
        self
    }

    pub fn moves_today(mut self, count: u32) -> Self {
        self.sample.move_count_today = count;
        self
    }

    pub fn aux_voltage(mut self, volts: f64) -> Self {
        self.sample.aux_voltage_v = volts;
        self
    }

    pub fn offset(mut self, volts: f64) -> Self {
        self.sample.sensor_offset_v = volts;
        self
    }

    pub fn rssi(mut self, dbm: i32) -> Self {
        self.sample.rssi_dbm = dbm;
        self
    }

    pub fn faults(mut self, flags: FaultFlags) -> Self {
        self.sample.fault_flags = flags;
        self
    }

    pub fn build(self) -> TelemetrySample {
        self.sample
    }
}

pub fn sample(device_id: &str, ts: DateTime<Utc>, angle_deg: f64, power_w: f64) -> TelemetrySample {
    SampleBuilder::new(device_id, ts).angle(angle_deg).power(power_w).build()
}

pub fn event(device_id: &str, ts: DateTime<Utc>, kind: EventKind) -> DeviceEvent {
    DeviceEvent {
        device_id: device_id.to_string(),
        ts,
        kind,
        payload: serde_json::Value::Null,
    }
}

pub fn move_event(device_id: &str, ts: DateTime<Utc>, from_angle: f64, to_angle: f64, duration_sec: f64) -> DeviceEvent {
    DeviceEvent {
        device_id: device_id.to_string(),
        ts,
        kind: EventKind::Move,
        payload: json!({
            "from_angle": from_angle,
            "to_angle": to_angle,
            "move_duration_sec": duration_sec,
            "triggered_by": "sun_tracking",
        }),
    }
}

/// One sample per minute from `start_minute` for `count` minutes at constant angle/power.
pub fn minute_series(device_id: &str, start_minute: i64, count: i64, angle_deg: f64, power_w: f64) -> Vec<TelemetrySample> {
    (0..count)
        .map(|i| sample(device_id, at(start_minute + i), angle_deg, power_w))
        .collect()
}
