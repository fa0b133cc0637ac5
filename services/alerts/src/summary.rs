use crate::book::Alert;
use crate::recommend::Recommendation;
use chrono::{DateTime, Utc};
use diagnostics_service::DiagnosticsReport;
use serde::{Deserialize, Serialize};
use shared::types::{DeviceId, FaultFinding};

/// Compact, serializable digest of one pass, handed to the narrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    pub device_id: DeviceId,
    pub generated_at: DateTime<Utc>,
    pub energy_today_wh: f64,
    pub moves_today: u32,
    pub dust_probability: f64,
    pub shading_probability: f64,
    pub rail_risk: f64,
    pub sensor_health: f64,
    pub clock_score: f64,
    pub efficiency_score: f64,
    pub wasted_moves_percent: f64,
    pub forecast_next_hour_wh: f64,
    pub forecast_confidence: f64,
    pub findings: Vec<FaultFinding>,
    pub active_alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
}

impl DiagnosticsSummary {
    pub fn build(
        report: &DiagnosticsReport,
        active_alerts: Vec<Alert>,
        recommendations: Vec<Recommendation>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: report.device_id.clone(),
            generated_at,
            energy_today_wh: report.today.as_ref().map(|d| d.energy_wh).unwrap_or(0.0),
            moves_today: report.today.as_ref().map(|d| d.move_count).unwrap_or(0),
            dust_probability: report.dust.dust_probability,
            shading_probability: report.dust.shading_probability,
            rail_risk: report.rail.risk,
            sensor_health: report.sensor.score,
            clock_score: report.clock.score,
            efficiency_score: report.efficiency.score,
            wasted_moves_percent: report.movement.wasted_moves_percent,
            forecast_next_hour_wh: report.forecast.expected_wh,
            forecast_confidence: report.forecast.confidence,
            findings: report.findings.clone(),
            active_alerts,
            recommendations,
        }
    }
}
