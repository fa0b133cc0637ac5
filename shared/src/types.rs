use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Type aliases for the telemetry domain
pub type DeviceId = String;
pub type Slot = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    #[default]
    Auto,
    Manual,
}

/// Device fault bitset as reported by the controller firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaultFlags(pub u32);

impl FaultFlags {
    pub const CURRENT_SENSOR: FaultFlags = FaultFlags(1 << 0);
    pub const VOLTAGE_SENSOR: FaultFlags = FaultFlags(1 << 1);
    pub const CLOCK: FaultFlags = FaultFlags(1 << 2);
    pub const MOTOR: FaultFlags = FaultFlags(1 << 3);
    pub const SUPPLY: FaultFlags = FaultFlags(1 << 4);

    pub fn empty() -> Self {
        FaultFlags(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: FaultFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: FaultFlags) -> Self {
        FaultFlags(self.0 | other.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: DeviceId,
    pub ts: DateTime<Utc>,
    pub seq: u64,
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_w: f64,
    pub angle_deg: f64,
    pub mode: DeviceMode,
    pub slot: Slot,
    pub energy_today_wh: f64,
    pub move_count_today: u32,
    pub aux_voltage_v: f64,
    pub sensor_offset_v: f64,
    pub rssi_dbm: i32,
    pub fault_flags: FaultFlags,
}

impl TelemetrySample {
    pub fn power_of(voltage_v: f64, current_a: f64) -> f64 {
        voltage_v * current_a
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Move,
    Reset,
    LowSupply,
    SensorFault,
    ClockLost,
    Cleaning,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Move => "move",
            EventKind::Reset => "reset",
            EventKind::LowSupply => "low_supply",
            EventKind::SensorFault => "sensor_fault",
            EventKind::ClockLost => "clock_lost",
            EventKind::Cleaning => "cleaning",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "move" => Ok(EventKind::Move),
            "reset" => Ok(EventKind::Reset),
            "low_supply" | "brownout" => Ok(EventKind::LowSupply),
            "sensor_fault" => Ok(EventKind::SensorFault),
            "clock_lost" | "rtc_lost" => Ok(EventKind::ClockLost),
            "cleaning" => Ok(EventKind::Cleaning),
            other => Err(UnknownEventKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device_id: DeviceId,
    pub ts: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl DeviceEvent {
    /// Typed view of a move payload. Missing or malformed fields read as `None`.
    pub fn move_payload(&self) -> Option<MovePayload> {
        if self.kind != EventKind::Move {
            return None;
        }
        Some(serde_json::from_value(self.payload.clone()).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovePayload {
    pub from_angle: Option<f64>,
    pub to_angle: Option<f64>,
    #[serde(alias = "move_duration_sec")]
    pub duration_sec: Option<f64>,
    pub motor_estimated_power_w: Option<f64>,
    pub energy_cost_wh: Option<f64>,
    pub triggered_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warn => f.write_str("warn"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

/// Fixed-width time-of-day partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotClock {
    slot_minutes: u32,
}

impl SlotClock {
    /// Widths that do not divide the day are rounded down to the nearest divisor
    /// so the last slot is never shorter than the others.
    pub fn new(slot_minutes: u32) -> Self {
        let mut width = slot_minutes.clamp(1, 1440);
        while 1440 % width != 0 {
            width -= 1;
        }
        Self { slot_minutes: width }
    }

    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    pub fn slots_per_day(&self) -> u16 {
        (1440 / self.slot_minutes) as u16
    }

    pub fn slot_of(&self, ts: DateTime<Utc>) -> Slot {
        let minutes = ts.hour() * 60 + ts.minute();
        (minutes / self.slot_minutes) as Slot
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(self.slot_minutes as i64)
    }

    pub fn slot_duration_hours(&self) -> f64 {
        self.slot_minutes as f64 / 60.0
    }

    pub fn slot_start(&self, slot: Slot) -> Option<NaiveTime> {
        if slot >= self.slots_per_day() {
            return None;
        }
        let minutes = slot as u32 * self.slot_minutes;
        NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
    }
}

impl Default for SlotClock {
    fn default() -> Self {
        Self::new(crate::defaults::SLOT_MINUTES)
    }
}

/// Discretized panel angle: `round(angle / width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AngleBucket(pub i32);

impl AngleBucket {
    pub fn of(angle_deg: f64, width_deg: f64) -> Self {
        AngleBucket((angle_deg / width_deg).round() as i32)
    }

    pub fn center_deg(&self, width_deg: f64) -> f64 {
        self.0 as f64 * width_deg
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub device_id: DeviceId,
    pub date: chrono::NaiveDate,
    pub energy_wh: f64,
    pub move_count: u32,
    pub energy_per_move_wh: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    PowerRailDrop,
    ClockUnstable,
    SensorWiringInstability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultFinding {
    pub kind: FaultKind,
    pub severity: Severity,
    pub ts: DateTime<Utc>,
    pub detail: String,
    pub correlated_move: Option<DateTime<Utc>>,
}
