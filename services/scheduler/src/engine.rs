//! Per-device diagnostics passes and the periodic scheduler loop.
//!
//! A pass reads the device history once, computes everything against that
//! slice, and only then commits: cleaning transitions, alert changes, the new
//! slot/angle table and the snapshot are applied together after the
//! time-bounded part succeeded. A pass that times out publishes nothing.

use crate::leases::DeviceLeases;
use crate::snapshot::{DiagnosticsSnapshot, SnapshotStore, SnapshotView};
use aggregator_service::{BestAngle, HeatmapCell, SlotAngleTable};
use alerts_service::{narrate, recommend, Alert, AlertBook, DiagnosticsSummary, Narrator, Recommendation};
use chrono::{DateTime, Utc};
use cleaning_service::{CleaningLedger, CleaningLog, CleaningType};
use dashmap::DashMap;
use decision_service::{evaluate, DecisionInput, DecisionSettings, NetGainDecision};
use diagnostics_service::{diagnose, DiagnosticsReport, EfficiencyScore, HistoryView};
use futures::future::join_all;
use movement_service::{estimate_motor_cost_wh, movement_records, recent_move_count, MovementEfficiency};
use serde::{Deserialize, Serialize};
use shared::config::EngineConfig;
use shared::error::{EngineError, EngineResult};
use shared::logger::{log_pass_outcome, log_settings_defaulted};
use shared::settings::{ResolvedSettings, SettingsProvider};
use shared::store::{TelemetryStore, TimeRange};
use shared::types::{DeviceEvent, DeviceId, TelemetrySample};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed,
    /// Another pass held the device lease.
    Skipped,
    TimedOut,
    Failed(String),
}

impl PassOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassOutcome::Completed => "completed",
            PassOutcome::Skipped => "skipped",
            PassOutcome::TimedOut => "timed_out",
            PassOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub as_of: DateTime<Utc>,
    pub outcomes: Vec<(DeviceId, PassOutcome)>,
}

impl TickReport {
    pub fn count(&self, outcome: &PassOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| o == outcome).count()
    }

    pub fn outcome(&self, device_id: &str) -> Option<&PassOutcome> {
        self.outcomes.iter().find(|(d, _)| d == device_id).map(|(_, o)| o)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyView {
    pub movement: MovementEfficiency,
    pub score: EfficiencyScore,
}

/// Everything the time-bounded part of a pass produces.
struct PassOutput {
    table: SlotAngleTable,
    samples: Vec<TelemetrySample>,
    samples_absorbed: usize,
    report: DiagnosticsReport,
    decision: Option<NetGainDecision>,
    motor_cost_wh: f64,
    settings_defaulted: bool,
    recommendations: Vec<Recommendation>,
    narrative: Option<String>,
    degraded: Vec<String>,
}

pub struct DiagnosticsEngine<S, P> {
    store: Arc<S>,
    settings: Arc<P>,
    config: EngineConfig,
    narrator: Option<Arc<dyn Narrator>>,
    tables: DashMap<DeviceId, Arc<SlotAngleTable>>,
    alerts: AlertBook,
    cleaning: CleaningLedger,
    snapshots: SnapshotStore,
    leases: DeviceLeases,
}

impl<S, P> DiagnosticsEngine<S, P>
where
    S: TelemetryStore,
    P: SettingsProvider,
{
    pub fn new(store: Arc<S>, settings: Arc<P>, config: EngineConfig) -> Self {
        Self {
            store,
            settings,
            cleaning: CleaningLedger::new(config.cleaning.clone()),
            snapshots: SnapshotStore::new(config.scheduler.snapshot_history),
            config,
            narrator: None,
            tables: DashMap::new(),
            alerts: AlertBook::new(),
            leases: DeviceLeases::new(),
        }
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn leases(&self) -> &DeviceLeases {
        &self.leases
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Run one diagnostics pass for `device_id` as of `as_of`.
    pub async fn run_device_pass(&self, device_id: &str, as_of: DateTime<Utc>) -> EngineResult<Arc<DiagnosticsSnapshot>> {
        let _lease = self
            .leases
            .try_acquire(device_id)
            .ok_or_else(|| EngineError::ConcurrentPassConflict {
                device_id: device_id.to_string(),
            })?;

        tracing::debug!(device_id = %device_id, as_of = %as_of, "Diagnostics pass started");
        let budget = self.config.scheduler.pass_budget();
        let output = match tokio::time::timeout(budget, self.compute(device_id, as_of)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EngineError::ComputationTimeout {
                    device_id: device_id.to_string(),
                    budget_ms: self.config.scheduler.pass_budget_ms,
                })
            }
        };

        Ok(self.commit(device_id, as_of, output))
    }

    async fn compute(&self, device_id: &str, as_of: DateTime<Utc>) -> EngineResult<PassOutput> {
        let settings = ResolvedSettings::resolve(self.settings.settings(device_id), &self.config.defaults);
        if settings.defaulted {
            log_settings_defaulted(device_id);
        }

        let range = TimeRange::until(as_of - self.config.scheduler.lookback(), as_of);
        let samples = self.store.samples(device_id, range).await?;
        let events = self.store.events(device_id, range).await?;

        let mut table = match self.tables.get(device_id) {
            Some(published) => (**published).clone(),
            None => SlotAngleTable::new(device_id, &self.config.aggregator).with_retention(self.config.scheduler.lookback()),
        };
        let samples_absorbed = table.ingest_all(&samples);

        let history = HistoryView::new(device_id, &samples, &events, as_of);
        let report = diagnose(&history, &table, &self.config);

        let motor_cost_wh = self.motor_cost_wh(&settings, &samples, &events);
        let decision = history.latest_sample().map(|latest| {
            let input = DecisionInput {
                slot: latest.slot,
                current_angle_deg: latest.angle_deg,
                current_power_w: latest.power_w,
                recent_move_count: recent_move_count(&events, as_of),
            };
            evaluate(
                &table,
                &input,
                &DecisionSettings::from_resolved(&settings, motor_cost_wh),
                self.config.slot_clock().slot_duration_hours(),
            )
        });

        let mut degraded = Vec::new();
        if settings.defaulted {
            degraded.push(
                EngineError::StaleSettings {
                    device_id: device_id.to_string(),
                }
                .to_string(),
            );
        }
        degraded.extend(report.insufficient(&self.config).iter().map(ToString::to_string));

        let recommendations = recommend(&report, &self.config.alerts);
        let narrative = match self.narrator.as_deref() {
            Some(narrator) => {
                let expected_alerts = self.alerts.preview(device_id, &report, &self.config.alerts, as_of);
                let summary = DiagnosticsSummary::build(&report, expected_alerts, recommendations.clone(), as_of);
                narrate(Some(narrator), &summary, self.config.scheduler.narrative_timeout()).await
            }
            None => None,
        };

        Ok(PassOutput {
            table,
            samples,
            samples_absorbed,
            report,
            decision,
            motor_cost_wh,
            settings_defaulted: settings.defaulted,
            recommendations,
            narrative,
            degraded,
        })
    }

    /// Apply a computed pass. Synchronous, so it cannot be interrupted by the budget.
    fn commit(&self, device_id: &str, as_of: DateTime<Utc>, output: PassOutput) -> Arc<DiagnosticsSnapshot> {
        let cleaning_computed = self.cleaning.process_due(device_id, &output.samples, as_of);
        let alert_changes = self
            .alerts
            .synchronize(device_id, &output.report, &self.config.alerts, as_of);

        let best_angles = output.table.best_angle_table();
        self.tables.insert(device_id.to_string(), Arc::new(output.table));

        let snapshot = DiagnosticsSnapshot {
            device_id: device_id.to_string(),
            generated_at: as_of,
            report: output.report,
            decision: output.decision,
            best_angles,
            motor_cost_wh: output.motor_cost_wh,
            settings_defaulted: output.settings_defaulted,
            alert_changes,
            active_alerts: self.alerts.active(device_id),
            recommendations: output.recommendations,
            narrative: output.narrative,
            degraded: output.degraded,
            cleaning_computed,
            samples_read: output.samples.len(),
            samples_absorbed: output.samples_absorbed,
        };
        tracing::debug!(
            device_id = %device_id,
            samples_read = snapshot.samples_read,
            samples_absorbed = snapshot.samples_absorbed,
            raised = snapshot.alert_changes.raised.len(),
            resolved = snapshot.alert_changes.resolved.len(),
            "Diagnostics pass committed"
        );
        self.snapshots.publish(snapshot)
    }

    fn motor_cost_wh(&self, settings: &ResolvedSettings, samples: &[TelemetrySample], events: &[DeviceEvent]) -> f64 {
        if let Some(explicit) = settings.motor_cost_wh {
            return explicit;
        }
        let records = movement_records(events, samples, &self.config.movement, &self.config.slot_clock());
        estimate_motor_cost_wh(
            &records,
            settings.motor_power_w,
            self.config.defaults.move_duration_secs,
            self.config.movement.duration_sample,
        )
    }

    /// Run a pass for every active device, concurrently.
    pub async fn run_tick(&self, as_of: DateTime<Utc>) -> EngineResult<TickReport> {
        let devices = self.store.active_devices().await?;

        let passes = devices.iter().map(|device_id| async move {
            let started = Instant::now();
            let outcome = match self.run_device_pass(device_id, as_of).await {
                Ok(_) => PassOutcome::Completed,
                Err(EngineError::ConcurrentPassConflict { .. }) => PassOutcome::Skipped,
                Err(EngineError::ComputationTimeout { .. }) => PassOutcome::TimedOut,
                Err(e) => PassOutcome::Failed(e.to_string()),
            };
            let label = match &outcome {
                PassOutcome::Failed(reason) => format!("failed: {}", reason),
                other => other.as_str().to_string(),
            };
            log_pass_outcome(device_id, &label, started.elapsed().as_millis());
            (device_id.clone(), outcome)
        });
        let outcomes = join_all(passes).await;

        let report = TickReport { as_of, outcomes };
        tracing::info!(
            as_of = %as_of,
            devices = report.outcomes.len(),
            completed = report.count(&PassOutcome::Completed),
            skipped = report.count(&PassOutcome::Skipped),
            timed_out = report.count(&PassOutcome::TimedOut),
            "Diagnostics tick finished"
        );
        Ok(report)
    }

    /// Tick every `scheduler.tick_interval` until `shutdown` is cancelled.
    /// A tick in progress runs to completion.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.scheduler.tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Diagnostics scheduler stopped");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_tick(Utc::now()).await {
                        tracing::error!(error = %e, transient = e.is_transient(), "Diagnostics tick failed");
                    }
                }
            }
        }
    }

    // ========================================================================
    // Presentation
    // ========================================================================

    pub fn best_angle_table(&self, device_id: &str) -> Vec<BestAngle> {
        self.tables
            .get(device_id)
            .map(|t| t.best_angle_table())
            .unwrap_or_default()
    }

    pub fn heatmap(&self, device_id: &str) -> Vec<HeatmapCell> {
        self.tables.get(device_id).map(|t| t.heatmap()).unwrap_or_default()
    }

    pub fn current_decision(&self, device_id: &str) -> Option<NetGainDecision> {
        self.snapshots.current(device_id).and_then(|s| s.decision.clone())
    }

    pub fn efficiency(&self, device_id: &str) -> Option<EfficiencyView> {
        self.snapshots.current(device_id).map(|s| EfficiencyView {
            movement: s.report.movement.clone(),
            score: s.report.efficiency.clone(),
        })
    }

    pub fn current_snapshot(&self, device_id: &str, now: DateTime<Utc>) -> Option<SnapshotView> {
        self.snapshots
            .view(device_id, now, self.config.scheduler.stale_after())
    }

    pub fn snapshot_history(&self, device_id: &str) -> Vec<Arc<DiagnosticsSnapshot>> {
        self.snapshots.history(device_id)
    }

    pub fn alerts(&self, device_id: &str) -> Vec<Alert> {
        self.alerts.all(device_id)
    }

    pub fn active_alerts(&self, device_id: &str) -> Vec<Alert> {
        self.alerts.active(device_id)
    }

    pub fn clear_alert(&self, alert_id: Uuid, now: DateTime<Utc>) -> EngineResult<Alert> {
        self.alerts.clear(alert_id, now)
    }

    /// Record a cleaning; its baseline is read from the store immediately.
    pub async fn record_cleaning(
        &self,
        device_id: &str,
        cleaning_type: CleaningType,
        note: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> EngineResult<CleaningLog> {
        let range = TimeRange::new(recorded_at - self.config.cleaning.baseline(), recorded_at);
        let samples = self.store.samples(device_id, range).await?;
        Ok(self
            .cleaning
            .record(device_id, cleaning_type, note, recorded_at, &samples))
    }

    pub fn cleaning_results(&self, device_id: &str) -> Vec<CleaningLog> {
        self.cleaning.results(device_id)
    }
}
