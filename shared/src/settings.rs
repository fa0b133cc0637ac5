use crate::config::SettingsDefaults;
use crate::types::{DeviceId, DeviceMode};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Per-device operator settings. Absent fields fall back to `SettingsDefaults`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub mode: DeviceMode,
    pub min_net_gain_wh: Option<f64>,
    pub max_moves_per_hour: Option<u32>,
    /// Explicit motor energy per move. When absent it is estimated from move history.
    pub motor_cost_wh: Option<f64>,
    pub motor_power_w: Option<f64>,
    pub hold_power_w: Option<f64>,
}

/// Settings with every default applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSettings {
    pub mode: DeviceMode,
    pub min_net_gain_wh: f64,
    pub max_moves_per_hour: u32,
    pub motor_cost_wh: Option<f64>,
    pub motor_power_w: f64,
    pub hold_power_w: f64,
    /// True when the collaborator had no record and only defaults were used.
    pub defaulted: bool,
}

impl ResolvedSettings {
    pub fn resolve(settings: Option<DeviceSettings>, defaults: &SettingsDefaults) -> Self {
        let defaulted = settings.is_none();
        let s = settings.unwrap_or_default();
        Self {
            mode: s.mode,
            min_net_gain_wh: s.min_net_gain_wh.unwrap_or(defaults.min_net_gain_wh),
            max_moves_per_hour: s.max_moves_per_hour.unwrap_or(defaults.max_moves_per_hour),
            motor_cost_wh: s.motor_cost_wh,
            motor_power_w: s.motor_power_w.unwrap_or(defaults.motor_power_w),
            hold_power_w: s.hold_power_w.unwrap_or(defaults.hold_power_w),
            defaulted,
        }
    }
}

/// Read-only settings collaborator.
pub trait SettingsProvider: Send + Sync {
    fn settings(&self, device_id: &str) -> Option<DeviceSettings>;
}

#[derive(Default)]
pub struct StaticSettings {
    by_device: DashMap<DeviceId, DeviceSettings>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, device_id: &str, settings: DeviceSettings) {
        self.by_device.insert(device_id.to_string(), settings);
    }

    pub fn remove(&self, device_id: &str) {
        self.by_device.remove(device_id);
    }
}

impl SettingsProvider for StaticSettings {
    fn settings(&self, device_id: &str) -> Option<DeviceSettings> {
        self.by_device.get(device_id).map(|s| s.clone())
    }
}
