use crate::clock::{self, ClockReliability};
use crate::dust::{self, DustAssessment};
use crate::efficiency::{self, EfficiencyScore};
use crate::forecast::{self, Forecast};
use crate::history::HistoryView;
use crate::rail::{self, RailRisk};
use crate::sensor::{self, SensorHealth};
use aggregator_service::SlotAngleTable;
use chrono::{DateTime, Utc};
use movement_service::{daily_summaries, movement_efficiency, movement_records, MovementEfficiency, MovementRecord};
use serde::{Deserialize, Serialize};
use shared::config::EngineConfig;
use shared::error::EngineError;
use shared::types::{DailySummary, DeviceId, FaultFinding};

/// Every diagnostic for one device at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub device_id: DeviceId,
    pub as_of: DateTime<Utc>,
    pub dust: DustAssessment,
    pub sensor: SensorHealth,
    pub rail: RailRisk,
    pub clock: ClockReliability,
    pub efficiency: EfficiencyScore,
    pub movement: MovementEfficiency,
    pub forecast: Forecast,
    pub today: Option<DailySummary>,
    pub daily: Vec<DailySummary>,
    /// Ordered by timestamp.
    pub findings: Vec<FaultFinding>,
}

impl DiagnosticsReport {
    /// Scores that fell back to their neutral value. Not failures; callers
    /// surface them next to the report.
    pub fn insufficient(&self, config: &EngineConfig) -> Vec<EngineError> {
        let checks = [
            ("dust", self.dust.sufficient, self.dust.samples, config.dust.min_samples),
            ("sensor_health", self.sensor.sufficient, self.sensor.samples, config.sensor.min_samples),
            ("power_rail", self.rail.sufficient, self.rail.moves_considered, 1),
            ("movement", self.movement.sufficient, self.movement.measured_moves, 1),
            ("efficiency", self.efficiency.sufficient, 0, 1),
            ("forecast", self.forecast.sufficient, self.forecast.samples, 1),
        ];
        checks
            .into_iter()
            .filter(|(_, sufficient, _, _)| !sufficient)
            .map(|(score, _, have, need)| EngineError::InsufficientData { score, have, need })
            .collect()
    }
}

/// Compute all diagnostics from one history view and the device's table.
///
/// Pure: the same history, table and configuration give the same report.
pub fn diagnose(history: &HistoryView<'_>, table: &SlotAngleTable, config: &EngineConfig) -> DiagnosticsReport {
    let records: Vec<MovementRecord> =
        movement_records(history.events, history.samples, &config.movement, &config.slot_clock());
    let movement = movement_efficiency(&records, history.as_of, config.movement.window());

    let dust = dust::assess(history, table, &config.dust);
    let sensor = sensor::assess(history, &config.sensor);
    let (rail, rail_findings) = rail::assess(history, &config.rail);
    let (clock, clock_findings) = clock::assess(history, &config.clock);
    let efficiency = efficiency::score(
        history,
        table,
        movement.wasted_moves_percent,
        sensor.score,
        &config.efficiency,
    );

    let daily = daily_summaries(history.samples);
    let forecast = forecast::forecast(history, &daily, &config.forecast);
    let today = daily
        .iter()
        .rev()
        .find(|d| d.date == history.as_of.date_naive())
        .cloned();

    let mut findings = rail_findings;
    findings.extend(clock_findings);
    findings.extend(sensor::wiring_findings(history, &config.sensor));
    findings.sort_by_key(|f| f.ts);

    DiagnosticsReport {
        device_id: history.device_id.to_string(),
        as_of: history.as_of,
        dust,
        sensor,
        rail,
        clock,
        efficiency,
        movement,
        forecast,
        today,
        daily,
        findings,
    }
}
