use chrono::{DateTime, Utc};
use dashmap::DashMap;
use diagnostics_service::DiagnosticsReport;
use serde::{Deserialize, Serialize};
use shared::config::AlertConfig;
use shared::error::{EngineError, EngineResult};
use shared::logger::log_alert_transition;
use shared::types::{DeviceId, Severity};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Dust,
    Shading,
    PowerRail,
    SensorHealth,
    ClockReliability,
    Efficiency,
}

impl AlertCategory {
    pub const ALL: [AlertCategory; 6] = [
        AlertCategory::Dust,
        AlertCategory::Shading,
        AlertCategory::PowerRail,
        AlertCategory::SensorHealth,
        AlertCategory::ClockReliability,
        AlertCategory::Efficiency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Dust => "dust",
            AlertCategory::Shading => "shading",
            AlertCategory::PowerRail => "power_rail",
            AlertCategory::SensorHealth => "sensor_health",
            AlertCategory::ClockReliability => "clock_reliability",
            AlertCategory::Efficiency => "efficiency",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            AlertCategory::Dust => "Panel soiling suspected",
            AlertCategory::Shading => "Recurring shading detected",
            AlertCategory::PowerRail => "Power rail drops during moves",
            AlertCategory::SensorHealth => "Sensor health degraded",
            AlertCategory::ClockReliability => "Clock losing time",
            AlertCategory::Efficiency => "Low tracking efficiency",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    Manual,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub device_id: DeviceId,
    pub category: AlertCategory,
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cleared: bool,
    pub cleared_at: Option<DateTime<Utc>>,
    pub clear_reason: Option<ClearReason>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertChanges {
    pub raised: Vec<Alert>,
    pub refreshed: Vec<Alert>,
    pub resolved: Vec<Alert>,
}

impl AlertChanges {
    pub fn is_empty(&self) -> bool {
        self.raised.is_empty() && self.refreshed.is_empty() && self.resolved.is_empty()
    }
}

/// Outcome of checking one category against the report.
enum Check {
    Breached { severity: Severity, detail: String },
    Clear,
    /// The score had too little data; leave existing alerts as they are.
    Unknown,
}

fn check(category: AlertCategory, report: &DiagnosticsReport, config: &AlertConfig) -> Check {
    let (sufficient, breached, severity, detail) = match category {
        AlertCategory::Dust => (
            report.dust.sufficient,
            report.dust.dust_probability > config.dust_warn,
            Severity::Warn,
            format!("dust probability {:.2}", report.dust.dust_probability),
        ),
        AlertCategory::Shading => (
            report.dust.sufficient,
            report.dust.shading_probability > config.shading_warn,
            Severity::Warn,
            format!("shading probability {:.2}", report.dust.shading_probability),
        ),
        AlertCategory::PowerRail => (
            report.rail.sufficient,
            report.rail.risk > config.rail_critical,
            Severity::Critical,
            format!(
                "rail risk {:.2} ({} of {} recent moves)",
                report.rail.risk, report.rail.hits, report.rail.moves_considered
            ),
        ),
        AlertCategory::SensorHealth => (
            report.sensor.sufficient,
            report.sensor.score < config.sensor_warn,
            Severity::Warn,
            format!("sensor health {:.0}/100", report.sensor.score),
        ),
        AlertCategory::ClockReliability => (
            report.clock.sufficient,
            report.clock.score < config.clock_warn,
            Severity::Warn,
            format!(
                "clock score {:.0}/100, {:.1} losses per day",
                report.clock.score, report.clock.per_day
            ),
        ),
        AlertCategory::Efficiency => (
            report.efficiency.sufficient,
            report.efficiency.score < config.efficiency_info,
            Severity::Info,
            format!("efficiency score {:.0}/100", report.efficiency.score),
        ),
    };

    match (sufficient, breached) {
        (false, _) => Check::Unknown,
        (true, true) => Check::Breached { severity, detail },
        (true, false) => Check::Clear,
    }
}

/// Per-device alert history with raise/refresh/resolve transitions.
#[derive(Default)]
pub struct AlertBook {
    by_device: DashMap<DeviceId, Vec<Alert>>,
}

impl AlertBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the device's alerts in line with `report`.
    ///
    /// A breached category refreshes its open alert or raises a new one,
    /// unless an alert of that category was created within the cooldown.
    /// A category back within bounds resolves its open alerts.
    pub fn synchronize(
        &self,
        device_id: &str,
        report: &DiagnosticsReport,
        config: &AlertConfig,
        now: DateTime<Utc>,
    ) -> AlertChanges {
        let mut alerts = self.by_device.entry(device_id.to_string()).or_default();
        reconcile(&mut alerts, device_id, report, config, now, true)
    }

    /// Alerts that would be active after `synchronize`, without changing the book.
    pub fn preview(
        &self,
        device_id: &str,
        report: &DiagnosticsReport,
        config: &AlertConfig,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut alerts = self.all(device_id);
        reconcile(&mut alerts, device_id, report, config, now, false);
        alerts.into_iter().filter(|a| !a.cleared).collect()
    }

    /// Operator acknowledgement.
    pub fn clear(&self, alert_id: Uuid, now: DateTime<Utc>) -> EngineResult<Alert> {
        for mut entry in self.by_device.iter_mut() {
            if let Some(alert) = entry.value_mut().iter_mut().find(|a| a.id == alert_id) {
                if !alert.cleared {
                    alert.cleared = true;
                    alert.cleared_at = Some(now);
                    alert.clear_reason = Some(ClearReason::Manual);
                    alert.updated_at = now;
                    tracing::info!(
                        device_id = %alert.device_id,
                        alert_id = %alert_id,
                        category = %alert.category,
                        "Alert cleared by operator"
                    );
                }
                return Ok(alert.clone());
            }
        }
        Err(EngineError::AlertNotFound(alert_id))
    }

    pub fn active(&self, device_id: &str) -> Vec<Alert> {
        self.by_device
            .get(device_id)
            .map(|alerts| alerts.iter().filter(|a| !a.cleared).cloned().collect())
            .unwrap_or_default()
    }

    /// Full history, oldest first.
    pub fn all(&self, device_id: &str) -> Vec<Alert> {
        self.by_device
            .get(device_id)
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

fn reconcile(
    alerts: &mut Vec<Alert>,
    device_id: &str,
    report: &DiagnosticsReport,
    config: &AlertConfig,
    now: DateTime<Utc>,
    announce: bool,
) -> AlertChanges {
    let mut changes = AlertChanges::default();

    for category in AlertCategory::ALL {
        match check(category, report, config) {
            Check::Unknown => {}
            Check::Breached { severity, detail } => {
                if let Some(open) = alerts.iter_mut().find(|a| a.category == category && !a.cleared) {
                    open.severity = severity;
                    open.detail = detail;
                    open.updated_at = now;
                    changes.refreshed.push(open.clone());
                    continue;
                }

                let cooling = alerts
                    .iter()
                    .filter(|a| a.category == category)
                    .any(|a| now - a.created_at < config.cooldown());
                if cooling {
                    if announce {
                        tracing::debug!(
                            device_id = %device_id,
                            category = %category,
                            "Alert suppressed by cooldown"
                        );
                    }
                    continue;
                }

                let alert = Alert {
                    id: Uuid::new_v4(),
                    device_id: device_id.to_string(),
                    category,
                    severity,
                    title: category.title().to_string(),
                    detail,
                    created_at: now,
                    updated_at: now,
                    cleared: false,
                    cleared_at: None,
                    clear_reason: None,
                };
                if announce {
                    log_alert_transition(device_id, category.as_str(), &severity.to_string(), true);
                }
                changes.raised.push(alert.clone());
                alerts.push(alert);
            }
            Check::Clear => {
                for open in alerts.iter_mut().filter(|a| a.category == category && !a.cleared) {
                    open.cleared = true;
                    open.cleared_at = Some(now);
                    open.clear_reason = Some(ClearReason::Resolved);
                    open.updated_at = now;
                    if announce {
                        log_alert_transition(device_id, category.as_str(), &open.severity.to_string(), false);
                    }
                    changes.resolved.push(open.clone());
                }
            }
        }
    }

    changes
}
