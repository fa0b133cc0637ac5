//! Engine configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional file,
//! then `HELIOTRACK__<SECTION>__<KEY>` environment variables.

use crate::defaults::*;
use crate::types::SlotClock;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const ENV_PREFIX: &str = "HELIOTRACK";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub slots: SlotConfig,
    pub aggregator: AggregatorConfig,
    pub defaults: SettingsDefaults,
    pub movement: MovementConfig,
    pub dust: DustConfig,
    pub sensor: SensorConfig,
    pub rail: RailConfig,
    pub clock: ClockConfig,
    pub efficiency: EfficiencyConfig,
    pub forecast: ForecastConfig,
    pub cleaning: CleaningConfig,
    pub alerts: AlertConfig,
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: EngineConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregator.angle_bucket_deg <= 0.0 {
            return Err(ConfigError::Invalid("aggregator.angle_bucket_deg must be positive".into()));
        }
        if self.aggregator.min_samples == 0 {
            return Err(ConfigError::Invalid("aggregator.min_samples must be at least 1".into()));
        }
        if self.slots.slot_minutes == 0 || self.slots.slot_minutes > 1440 {
            return Err(ConfigError::Invalid("slots.slot_minutes must be within 1..=1440".into()));
        }
        let windows = [
            ("movement.window_hours", self.movement.window_hours),
            ("dust.window_hours", self.dust.window_hours),
            ("sensor.window_hours", self.sensor.window_hours),
            ("rail.window_hours", self.rail.window_hours),
            ("clock.window_hours", self.clock.window_hours),
            ("cleaning.baseline_minutes", self.cleaning.baseline_minutes),
            ("cleaning.measure_minutes", self.cleaning.measure_minutes),
        ];
        for (name, value) in windows {
            if value <= 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        if self.cleaning.delay_minutes < self.cleaning.measure_minutes {
            return Err(ConfigError::Invalid(
                "cleaning.delay_minutes must cover cleaning.measure_minutes".into(),
            ));
        }
        if self.rail.saturation_rate <= 0.0 || self.rail.saturation_rate > 1.0 {
            return Err(ConfigError::Invalid("rail.saturation_rate must be within (0, 1]".into()));
        }
        if self.scheduler.tick_interval_secs == 0 || self.scheduler.pass_budget_ms == 0 {
            return Err(ConfigError::Invalid("scheduler intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn slot_clock(&self) -> SlotClock {
        SlotClock::new(self.slots.slot_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    pub slot_minutes: u32,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self { slot_minutes: SLOT_MINUTES }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub angle_bucket_deg: f64,
    pub min_samples: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            angle_bucket_deg: ANGLE_BUCKET_DEG,
            min_samples: MIN_SLOT_SAMPLES,
        }
    }
}

/// Fallbacks for absent per-device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDefaults {
    pub min_net_gain_wh: f64,
    pub max_moves_per_hour: u32,
    pub motor_power_w: f64,
    pub hold_power_w: f64,
    pub move_duration_secs: f64,
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        Self {
            min_net_gain_wh: MIN_NET_GAIN_WH,
            max_moves_per_hour: MAX_MOVES_PER_HOUR,
            motor_power_w: MOTOR_POWER_W,
            hold_power_w: HOLD_POWER_W,
            move_duration_secs: MOVE_DURATION_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub window_hours: i64,
    pub sample_window_minutes: i64,
    pub duration_sample: usize,
}

impl MovementConfig {
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }

    pub fn sample_window(&self) -> Duration {
        Duration::minutes(self.sample_window_minutes)
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            window_hours: MOVEMENT_WINDOW_HOURS,
            sample_window_minutes: MOVE_SAMPLE_WINDOW_MINUTES,
            duration_sample: MOVE_DURATION_SAMPLE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DustConfig {
    pub window_hours: i64,
    pub min_samples: usize,
    pub depression_ratio: f64,
    pub recovery_samples: usize,
    pub min_slots: usize,
    pub dust_gain: f64,
    pub shading_gain: f64,
    pub smoothing_alpha: f64,
    pub min_best_power_w: f64,
}

impl DustConfig {
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }
}

impl Default for DustConfig {
    fn default() -> Self {
        Self {
            window_hours: DUST_WINDOW_HOURS,
            min_samples: DUST_MIN_SAMPLES,
            depression_ratio: DUST_DEPRESSION_RATIO,
            recovery_samples: DUST_RECOVERY_SAMPLES,
            min_slots: DUST_MIN_SLOTS,
            dust_gain: DUST_GAIN,
            shading_gain: SHADING_GAIN,
            smoothing_alpha: DUST_SMOOTHING_ALPHA,
            min_best_power_w: DUST_MIN_BEST_POWER_W,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub window_hours: i64,
    pub baseline_days: i64,
    pub min_samples: usize,
    pub neutral_score: f64,
    pub expected_interval_secs: i64,
    pub fault_weight: f64,
    pub signal_weight: f64,
    pub missing_weight: f64,
    pub zero_current_weight: f64,
    pub offset_weight: f64,
    pub rssi_std_ceiling_db: f64,
    pub offset_drift_ceiling_v: f64,
    pub zero_current_min_voltage_v: f64,
    pub zero_current_max_current_a: f64,
    pub fault_cluster_minutes: i64,
    pub fault_cluster_size: usize,
}

impl SensorConfig {
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }

    pub fn baseline(&self) -> Duration {
        Duration::days(self.baseline_days)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            window_hours: SENSOR_WINDOW_HOURS,
            baseline_days: SENSOR_BASELINE_DAYS,
            min_samples: SENSOR_MIN_SAMPLES,
            neutral_score: SENSOR_NEUTRAL_SCORE,
            expected_interval_secs: SENSOR_EXPECTED_INTERVAL_SECS,
            fault_weight: SENSOR_FAULT_WEIGHT,
            signal_weight: SENSOR_SIGNAL_WEIGHT,
            missing_weight: SENSOR_MISSING_WEIGHT,
            zero_current_weight: SENSOR_ZERO_CURRENT_WEIGHT,
            offset_weight: SENSOR_OFFSET_WEIGHT,
            rssi_std_ceiling_db: SENSOR_RSSI_STD_CEILING_DB,
            offset_drift_ceiling_v: SENSOR_OFFSET_DRIFT_CEILING_V,
            zero_current_min_voltage_v: SENSOR_ZERO_CURRENT_MIN_VOLTAGE_V,
            zero_current_max_current_a: SENSOR_ZERO_CURRENT_MAX_CURRENT_A,
            fault_cluster_minutes: SENSOR_FAULT_CLUSTER_MINUTES,
            fault_cluster_size: SENSOR_FAULT_CLUSTER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RailConfig {
    pub window_hours: i64,
    pub recent_moves: usize,
    pub lag_samples: usize,
    pub event_lag_secs: i64,
    pub dip_voltage_v: f64,
    pub saturation_rate: f64,
}

impl RailConfig {
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            window_hours: RAIL_WINDOW_HOURS,
            recent_moves: RAIL_RECENT_MOVES,
            lag_samples: RAIL_LAG_SAMPLES,
            event_lag_secs: RAIL_EVENT_LAG_SECS,
            dip_voltage_v: RAIL_DIP_VOLTAGE_V,
            saturation_rate: RAIL_SATURATION_RATE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub window_hours: i64,
    pub tolerated_per_day: f64,
    pub penalty_per_event: f64,
}

impl ClockConfig {
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            window_hours: CLOCK_WINDOW_HOURS,
            tolerated_per_day: CLOCK_TOLERATED_PER_DAY,
            penalty_per_event: CLOCK_PENALTY_PER_EVENT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    pub neutral_score: f64,
    pub power_ratio_weight: f64,
    pub wasted_weight: f64,
    pub wasted_cap: f64,
    pub sensor_weight: f64,
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            neutral_score: EFFICIENCY_NEUTRAL_SCORE,
            power_ratio_weight: EFFICIENCY_POWER_RATIO_WEIGHT,
            wasted_weight: EFFICIENCY_WASTED_WEIGHT,
            wasted_cap: EFFICIENCY_WASTED_CAP,
            sensor_weight: EFFICIENCY_SENSOR_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub horizon_minutes: i64,
    pub trend_window_minutes: i64,
    pub trend_weight: f64,
    pub full_confidence_samples: usize,
    pub daily_cap_days: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_minutes: FORECAST_HORIZON_MINUTES,
            trend_window_minutes: FORECAST_TREND_WINDOW_MINUTES,
            trend_weight: FORECAST_TREND_WEIGHT,
            full_confidence_samples: FORECAST_FULL_CONFIDENCE_SAMPLES,
            daily_cap_days: FORECAST_DAILY_CAP_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub delay_minutes: i64,
    pub baseline_minutes: i64,
    pub measure_minutes: i64,
}

impl CleaningConfig {
    pub fn delay(&self) -> Duration {
        Duration::minutes(self.delay_minutes)
    }

    pub fn baseline(&self) -> Duration {
        Duration::minutes(self.baseline_minutes)
    }

    pub fn measure(&self) -> Duration {
        Duration::minutes(self.measure_minutes)
    }

    /// Time after recording at which a log may be computed: the configured
    /// delay, but never before the measurement window has closed.
    pub fn due_after(&self) -> Duration {
        Duration::minutes(self.delay_minutes.max(self.measure_minutes))
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            delay_minutes: CLEANING_DELAY_MINUTES,
            baseline_minutes: CLEANING_BASELINE_MINUTES,
            measure_minutes: CLEANING_MEASURE_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub dust_warn: f64,
    pub shading_warn: f64,
    pub rail_critical: f64,
    pub sensor_warn: f64,
    pub clock_warn: f64,
    pub efficiency_info: f64,
    pub cooldown_minutes: i64,
    pub recommend_clock_below: f64,
    pub recommend_forecast_confidence_below: f64,
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            dust_warn: ALERT_DUST_WARN,
            shading_warn: ALERT_SHADING_WARN,
            rail_critical: ALERT_RAIL_CRITICAL,
            sensor_warn: ALERT_SENSOR_WARN,
            clock_warn: ALERT_CLOCK_WARN,
            efficiency_info: ALERT_EFFICIENCY_INFO,
            cooldown_minutes: ALERT_COOLDOWN_MINUTES,
            recommend_clock_below: RECOMMEND_CLOCK_BELOW,
            recommend_forecast_confidence_below: RECOMMEND_FORECAST_CONFIDENCE_BELOW,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
    pub pass_budget_ms: u64,
    pub narrative_timeout_ms: u64,
    pub history_lookback_days: i64,
    pub stale_after_ticks: u32,
    pub snapshot_history: usize,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs)
    }

    pub fn pass_budget(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pass_budget_ms)
    }

    pub fn narrative_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.narrative_timeout_ms)
    }

    pub fn lookback(&self) -> Duration {
        Duration::days(self.history_lookback_days)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::seconds((self.tick_interval_secs * self.stale_after_ticks as u64) as i64)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: TICK_INTERVAL_SECS,
            pass_budget_ms: PASS_BUDGET_MS,
            narrative_timeout_ms: NARRATIVE_TIMEOUT_MS,
            history_lookback_days: HISTORY_LOOKBACK_DAYS,
            stale_after_ticks: STALE_AFTER_TICKS,
            snapshot_history: SNAPSHOT_HISTORY,
        }
    }
}
