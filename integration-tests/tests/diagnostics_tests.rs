//! Diagnostics-to-alert tests for HelioTrack
//!
//! Tests cover: soiling vs shading, power rail risk, alert lifecycle, recommendations

use alerts_service::{AlertCategory, ClearReason, HEALTHY_TEXT};
use diagnostics_service::SoilingClass;
use scheduler_service::DiagnosticsEngine;
use shared::config::EngineConfig;
use shared::settings::StaticSettings;
use shared::store::InMemoryStore;
use shared::testing::{at, move_event, SampleBuilder};
use shared::types::{Severity, TelemetrySample};
use std::sync::Arc;

const DAY: i64 = 1440;

fn engine(store: Arc<InMemoryStore>) -> DiagnosticsEngine<InMemoryStore, StaticSettings> {
    DiagnosticsEngine::new(store, Arc::new(StaticSettings::new()), EngineConfig::default())
}

/// Day 0 learns 100 W at 30° for an hour from 10:00.
fn clean_day() -> Vec<TelemetrySample> {
    (600..660)
        .map(|m| SampleBuilder::new("dev-1", at(m)).angle(30.0).power(100.0).build())
        .collect()
}

// =============================================================================
// Soiling vs shading
// =============================================================================

#[tokio::test]
async fn test_sustained_loss_across_slots_raises_dust_alert() {
    let store = Arc::new(InMemoryStore::new());
    store.extend_samples(clean_day());
    let engine = engine(Arc::clone(&store));
    engine.run_device_pass("dev-1", at(660)).await.unwrap();

    // Next day the same hour yields a fifth of the learned power
    store.extend_samples((600..660).map(|m| SampleBuilder::new("dev-1", at(DAY + m)).angle(45.0).power(20.0).build()));
    let snapshot = engine.run_device_pass("dev-1", at(DAY + 660)).await.unwrap();

    let dust = &snapshot.report.dust;
    assert_eq!(dust.classification, SoilingClass::Dust);
    assert!(dust.dust_probability > 0.6);
    assert_eq!(dust.shading_probability, 0.0);

    let categories: Vec<AlertCategory> = snapshot.active_alerts.iter().map(|a| a.category).collect();
    assert!(categories.contains(&AlertCategory::Dust));
    assert!(!categories.contains(&AlertCategory::Shading));
    assert!(snapshot
        .recommendations
        .iter()
        .any(|r| r.category == Some(AlertCategory::Dust)));
}

#[tokio::test]
async fn test_brief_recovering_dips_are_shading() {
    let store = Arc::new(InMemoryStore::new());
    store.extend_samples(clean_day());
    store.extend_samples((0..60).map(|i| {
        let power = if i % 6 == 2 || i % 6 == 3 { 50.0 } else { 100.0 };
        SampleBuilder::new("dev-1", at(DAY + 600 + i)).angle(30.0).power(power).build()
    }));
    let engine = engine(store);

    let snapshot = engine.run_device_pass("dev-1", at(DAY + 660)).await.unwrap();
    let dust = &snapshot.report.dust;
    assert_eq!(dust.classification, SoilingClass::Shading);
    assert_eq!(dust.dust_probability, 0.0);
    assert!(dust.shading_probability > 0.0);
    assert_eq!(dust.shading_episodes, 10);
    assert!(!snapshot.active_alerts.iter().any(|a| a.category == AlertCategory::Dust));
}

// =============================================================================
// Power rail
// =============================================================================

fn rail_store(dip_minutes: &[i64]) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.extend_samples((590..=700).map(|m| {
        let aux = if dip_minutes.contains(&m) { 4.5 } else { 5.0 };
        SampleBuilder::new("dev-1", at(m)).power(30.0).aux_voltage(aux).build()
    }));
    store.extend_events((0..5).map(|i| move_event("dev-1", at(600 + i * 20), 30.0, 32.0, 2.0)));
    store
}

#[tokio::test]
async fn test_rail_drops_after_moves_rank_first() {
    let engine = engine(rail_store(&[600, 621, 640]));
    let snapshot = engine.run_device_pass("dev-1", at(700)).await.unwrap();

    assert!(snapshot.report.rail.risk > 0.4);
    let rail_alert = snapshot
        .active_alerts
        .iter()
        .find(|a| a.category == AlertCategory::PowerRail)
        .unwrap();
    assert_eq!(rail_alert.severity, Severity::Critical);

    let top = &snapshot.recommendations[0];
    assert_eq!(top.severity, Severity::Critical);
    assert_eq!(top.category, Some(AlertCategory::PowerRail));
    assert!(snapshot.report.findings.windows(2).all(|w| w[0].ts <= w[1].ts));
}

#[tokio::test]
async fn test_rail_alert_survives_repeat_pass_and_clears_manually() {
    let engine = engine(rail_store(&[600, 621, 640]));
    engine.run_device_pass("dev-1", at(700)).await.unwrap();
    let second = engine.run_device_pass("dev-1", at(715)).await.unwrap();

    let rail: Vec<_> = engine
        .alerts("dev-1")
        .into_iter()
        .filter(|a| a.category == AlertCategory::PowerRail)
        .collect();
    assert_eq!(rail.len(), 1);
    assert_eq!(rail[0].updated_at, at(715));
    assert!(!second
        .alert_changes
        .raised
        .iter()
        .any(|a| a.category == AlertCategory::PowerRail));

    let cleared = engine.clear_alert(rail[0].id, at(720)).unwrap();
    assert!(cleared.cleared);
    assert_eq!(cleared.clear_reason, Some(ClearReason::Manual));
    assert!(!engine.active_alerts("dev-1").iter().any(|a| a.category == AlertCategory::PowerRail));
}

#[tokio::test]
async fn test_uncorrelated_dips_stay_healthy() {
    let engine = engine(rail_store(&[595, 610, 630, 650, 670, 690]));
    let snapshot = engine.run_device_pass("dev-1", at(700)).await.unwrap();

    assert_eq!(snapshot.report.rail.risk, 0.0);
    assert!(!snapshot.active_alerts.iter().any(|a| a.category == AlertCategory::PowerRail));
}

// =============================================================================
// Insufficient data
// =============================================================================

#[tokio::test]
async fn test_sparse_device_stays_quiet() {
    let store = Arc::new(InMemoryStore::new());
    store.extend_samples((0..3).map(|m| SampleBuilder::new("dev-1", at(600 + m)).power(10.0).build()));
    let engine = engine(store);

    let snapshot = engine.run_device_pass("dev-1", at(603)).await.unwrap();
    assert!(!snapshot.report.dust.sufficient);
    assert!(!snapshot.report.rail.sufficient);
    assert!(!snapshot.report.sensor.sufficient);

    let quiet = [AlertCategory::Dust, AlertCategory::Shading, AlertCategory::PowerRail, AlertCategory::SensorHealth];
    assert!(!snapshot.active_alerts.iter().any(|a| quiet.contains(&a.category)));
    assert!(!snapshot.recommendations.is_empty());
    assert!(!snapshot
        .recommendations
        .iter()
        .any(|r| r.category.map_or(false, |c| quiet.contains(&c))));
}

#[tokio::test]
async fn test_device_without_telemetry_recommends_normal_operation() {
    let engine = engine(Arc::new(InMemoryStore::new()));
    let snapshot = engine.run_device_pass("dev-1", at(603)).await.unwrap();
    assert!(snapshot.active_alerts.is_empty());
    assert_eq!(snapshot.recommendations.len(), 1);
    assert_eq!(snapshot.recommendations[0].text, HEALTHY_TEXT);
}
