//! Engine-wide default constants.
//!
//! Every heuristic threshold used by the diagnostics engine has a named default
//! here. `EngineConfig::default()` is assembled from these values and any of
//! them can be overridden through configuration.

// ============================================================================
// Slots and angle buckets
// ============================================================================

/// Width of a time-of-day slot (minutes). 15 min = 96 slots per day.
pub const SLOT_MINUTES: u32 = 15;

/// Width of an angle bucket (degrees). 1.0 rounds to the nearest degree.
pub const ANGLE_BUCKET_DEG: f64 = 1.0;

/// Samples a bucket needs before its best-angle confidence saturates.
pub const MIN_SLOT_SAMPLES: u64 = 20;

// ============================================================================
// Device settings defaults (applied when the settings collaborator has none)
// ============================================================================

pub const MIN_NET_GAIN_WH: f64 = 0.0;
pub const MAX_MOVES_PER_HOUR: u32 = 12;
pub const MOTOR_POWER_W: f64 = 50.0;
pub const HOLD_POWER_W: f64 = 2.0;

/// Move duration assumed when no move history exists (seconds).
///
/// 3.6 s at 50 W = 0.05 Wh per move.
pub const MOVE_DURATION_SECS: f64 = 3.6;

/// Number of recent moves averaged to estimate the move duration.
pub const MOVE_DURATION_SAMPLE: usize = 10;

// ============================================================================
// Movement efficiency
// ============================================================================

pub const MOVEMENT_WINDOW_HOURS: i64 = 6;

/// How far before/after a move a telemetry sample may be to count (minutes).
pub const MOVE_SAMPLE_WINDOW_MINUTES: i64 = 10;

// ============================================================================
// Dust / shading
// ============================================================================

pub const DUST_WINDOW_HOURS: i64 = 48;
pub const DUST_MIN_SAMPLES: usize = 6;

/// Observed/best power ratio below which a sample counts as depressed.
pub const DUST_DEPRESSION_RATIO: f64 = 0.85;

/// A depression that recovers within this many samples is shading.
pub const DUST_RECOVERY_SAMPLES: usize = 3;

/// Distinct slots a sustained depression must span to count as dust.
pub const DUST_MIN_SLOTS: usize = 2;

pub const DUST_GAIN: f64 = 1.2;
pub const SHADING_GAIN: f64 = 1.0;
pub const DUST_SMOOTHING_ALPHA: f64 = 0.3;

/// Slots whose best power is below this (W) are ignored (night, dawn).
pub const DUST_MIN_BEST_POWER_W: f64 = 1.0;

// ============================================================================
// Sensor health
// ============================================================================

pub const SENSOR_WINDOW_HOURS: i64 = 24;
pub const SENSOR_BASELINE_DAYS: i64 = 7;
pub const SENSOR_MIN_SAMPLES: usize = 10;
pub const SENSOR_NEUTRAL_SCORE: f64 = 50.0;
pub const SENSOR_EXPECTED_INTERVAL_SECS: i64 = 60;
pub const SENSOR_FAULT_WEIGHT: f64 = 30.0;
pub const SENSOR_SIGNAL_WEIGHT: f64 = 20.0;
pub const SENSOR_MISSING_WEIGHT: f64 = 20.0;
pub const SENSOR_ZERO_CURRENT_WEIGHT: f64 = 15.0;
pub const SENSOR_OFFSET_WEIGHT: f64 = 15.0;

/// RSSI standard deviation at which signal instability saturates (dB).
pub const SENSOR_RSSI_STD_CEILING_DB: f64 = 10.0;

/// Offset drift at which the drift penalty saturates (V).
pub const SENSOR_OFFSET_DRIFT_CEILING_V: f64 = 0.6;

pub const SENSOR_ZERO_CURRENT_MIN_VOLTAGE_V: f64 = 2.0;
pub const SENSOR_ZERO_CURRENT_MAX_CURRENT_A: f64 = 0.05;

/// Sensor-fault events within this window form a wiring-instability cluster (minutes).
pub const SENSOR_FAULT_CLUSTER_MINUTES: i64 = 60;
pub const SENSOR_FAULT_CLUSTER_SIZE: usize = 2;

// ============================================================================
// Power rail
// ============================================================================

pub const RAIL_WINDOW_HOURS: i64 = 24;
pub const RAIL_RECENT_MOVES: usize = 5;
pub const RAIL_LAG_SAMPLES: usize = 2;
pub const RAIL_EVENT_LAG_SECS: i64 = 10;
pub const RAIL_DIP_VOLTAGE_V: f64 = 4.7;

/// Excess hit rate at which risk saturates to 1.0 (3 of 5 moves).
pub const RAIL_SATURATION_RATE: f64 = 0.6;

// ============================================================================
// Clock
// ============================================================================

pub const CLOCK_WINDOW_HOURS: i64 = 24;
pub const CLOCK_TOLERATED_PER_DAY: f64 = 3.0;
pub const CLOCK_PENALTY_PER_EVENT: f64 = 10.0;

// ============================================================================
// Efficiency score
// ============================================================================

pub const EFFICIENCY_NEUTRAL_SCORE: f64 = 50.0;
pub const EFFICIENCY_POWER_RATIO_WEIGHT: f64 = 40.0;
pub const EFFICIENCY_WASTED_WEIGHT: f64 = 0.5;
pub const EFFICIENCY_WASTED_CAP: f64 = 30.0;
pub const EFFICIENCY_SENSOR_WEIGHT: f64 = 0.3;

// ============================================================================
// Forecast
// ============================================================================

pub const FORECAST_HORIZON_MINUTES: i64 = 60;
pub const FORECAST_TREND_WINDOW_MINUTES: i64 = 120;
pub const FORECAST_TREND_WEIGHT: f64 = 0.1;
pub const FORECAST_FULL_CONFIDENCE_SAMPLES: usize = 60;
pub const FORECAST_DAILY_CAP_DAYS: usize = 4;

// ============================================================================
// Cleaning
// ============================================================================

pub const CLEANING_DELAY_MINUTES: i64 = 120;
pub const CLEANING_BASELINE_MINUTES: i64 = 120;
pub const CLEANING_MEASURE_MINUTES: i64 = 120;

// ============================================================================
// Alerts and recommendations
// ============================================================================

pub const ALERT_DUST_WARN: f64 = 0.6;
pub const ALERT_SHADING_WARN: f64 = 0.6;
pub const ALERT_RAIL_CRITICAL: f64 = 0.4;
pub const ALERT_SENSOR_WARN: f64 = 70.0;
pub const ALERT_CLOCK_WARN: f64 = 70.0;
pub const ALERT_EFFICIENCY_INFO: f64 = 60.0;
pub const ALERT_COOLDOWN_MINUTES: i64 = 360;

/// Clock score below which a battery replacement is recommended.
pub const RECOMMEND_CLOCK_BELOW: f64 = 80.0;

/// Forecast confidence below which telemetry continuity is questioned.
pub const RECOMMEND_FORECAST_CONFIDENCE_BELOW: f64 = 0.5;

// ============================================================================
// Scheduler
// ============================================================================

/// Interval between diagnostics ticks (seconds). 900 = 15 minutes.
pub const TICK_INTERVAL_SECS: u64 = 900;

/// Time budget for one device pass (milliseconds).
pub const PASS_BUDGET_MS: u64 = 30_000;

/// Time budget for the narrative capability inside a pass (milliseconds).
pub const NARRATIVE_TIMEOUT_MS: u64 = 10_000;

/// History read at the start of every pass (days).
pub const HISTORY_LOOKBACK_DAYS: i64 = 7;

/// A snapshot older than this many ticks is flagged stale.
pub const STALE_AFTER_TICKS: u32 = 2;

/// Snapshots retained per device.
pub const SNAPSHOT_HISTORY: usize = 96;
