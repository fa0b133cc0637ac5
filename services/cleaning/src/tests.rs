use crate::ledger::{CleaningLedger, CleaningState, CleaningType};
use shared::config::CleaningConfig;
use shared::error::EngineError;
use shared::testing::{at, minute_series};
use shared::types::TelemetrySample;
use std::sync::Arc;
use std::thread;

/// 60 W for the two hours before minute 600, 75 W for the two hours after.
fn cleaning_history() -> Vec<TelemetrySample> {
    let mut samples = minute_series("dev-1", 480, 120, 30.0, 60.0);
    samples.extend(minute_series("dev-1", 600, 120, 30.0, 75.0));
    samples
}

fn ledger() -> CleaningLedger {
    CleaningLedger::new(CleaningConfig::default())
}

// ============================================================================
// Recording Tests
// ============================================================================

#[test]
fn test_record_captures_baseline_energy() {
    let ledger = ledger();
    let log = ledger.record("dev-1", CleaningType::Manual, Some("rain".into()), at(600), &cleaning_history());
    assert!((log.energy_before_wh - 120.0).abs() < 1e-9);
    assert_eq!(log.state, CleaningState::Pending);
    assert_eq!(ledger.pending_count("dev-1"), 1);
}

#[test]
fn test_record_without_history_has_zero_baseline() {
    let ledger = ledger();
    let log = ledger.record("dev-1", CleaningType::AutoWiper, None, at(600), &[]);
    assert_eq!(log.energy_before_wh, 0.0);
}

// ============================================================================
// Computation Tests
// ============================================================================

#[test]
fn test_log_is_not_due_before_delay() {
    let ledger = ledger();
    let samples = cleaning_history();
    ledger.record("dev-1", CleaningType::Manual, None, at(600), &samples);
    assert!(ledger.process_due("dev-1", &samples, at(719)).is_empty());
    assert_eq!(ledger.pending_count("dev-1"), 1);
}

#[test]
fn test_due_log_computes_improvement() {
    let ledger = ledger();
    let samples = cleaning_history();
    let log = ledger.record("dev-1", CleaningType::Manual, None, at(600), &samples);

    let done = ledger.process_due("dev-1", &samples, at(720));
    assert_eq!(done.len(), 1);
    match &ledger.get(log.id).unwrap().state {
        CleaningState::Computed {
            energy_after_wh,
            improvement_wh,
            improvement_percent,
            ..
        } => {
            assert!((energy_after_wh - 150.0).abs() < 1e-9);
            assert!((improvement_wh - 30.0).abs() < 1e-9);
            assert!((improvement_percent - 25.0).abs() < 1e-9);
        }
        other => panic!("unexpected state {:?}", other),
    }
}

#[test]
fn test_short_delay_waits_for_measurement_window() {
    let config = CleaningConfig {
        delay_minutes: 30,
        ..CleaningConfig::default()
    };
    let ledger = CleaningLedger::new(config);
    let mut samples = minute_series("dev-1", 480, 150, 30.0, 60.0);
    samples.extend(minute_series("dev-1", 630, 90, 30.0, 90.0));
    let log = ledger.record("dev-1", CleaningType::Manual, None, at(600), &samples);

    assert!(ledger.process_due("dev-1", &samples, at(630)).is_empty());
    assert!(ledger.process_due("dev-1", &samples, at(719)).is_empty());
    assert_eq!(ledger.process_due("dev-1", &samples, at(720)).len(), 1);
    match ledger.get(log.id).unwrap().state {
        CleaningState::Computed { energy_after_wh, improvement_wh, .. } => {
            // 30 min at 60 W then 90 min at 90 W, over the two-hour window
            assert!((energy_after_wh - 165.0).abs() < 1e-9);
            assert!((improvement_wh - 45.0).abs() < 1e-9);
        }
        CleaningState::Pending => panic!("log should be computed"),
    }
}

#[test]
fn test_zero_baseline_gives_zero_percent() {
    let ledger = ledger();
    let samples = minute_series("dev-1", 600, 120, 30.0, 75.0);
    let log = ledger.record("dev-1", CleaningType::Manual, None, at(600), &samples);
    ledger.process_due("dev-1", &samples, at(720));
    match ledger.get(log.id).unwrap().state {
        CleaningState::Computed { improvement_percent, .. } => assert_eq!(improvement_percent, 0.0),
        CleaningState::Pending => panic!("log should be computed"),
    }
}

#[test]
fn test_unequal_windows_compare_per_hour() {
    let config = CleaningConfig {
        baseline_minutes: 60,
        ..CleaningConfig::default()
    };
    let ledger = CleaningLedger::new(config);
    let samples = cleaning_history();
    let log = ledger.record("dev-1", CleaningType::Manual, None, at(600), &samples);
    assert!((log.energy_before_wh - 60.0).abs() < 1e-9);

    ledger.process_due("dev-1", &samples, at(720));
    match ledger.get(log.id).unwrap().state {
        CleaningState::Computed { improvement_wh, .. } => assert!((improvement_wh - 15.0).abs() < 1e-9),
        CleaningState::Pending => panic!("log should be computed"),
    }
}

#[test]
fn test_second_computation_is_rejected() {
    let ledger = ledger();
    let samples = cleaning_history();
    let log = ledger.record("dev-1", CleaningType::Manual, None, at(600), &samples);

    ledger.complete(log.id, 150.0, at(720)).unwrap();
    let err = ledger.complete(log.id, 999.0, at(735)).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateCleaningComputation { .. }));
    match ledger.get(log.id).unwrap().state {
        CleaningState::Computed { energy_after_wh, .. } => assert_eq!(energy_after_wh, 150.0),
        CleaningState::Pending => panic!("log should be computed"),
    }

    // A later tick sees nothing left to do
    assert!(ledger.process_due("dev-1", &samples, at(735)).is_empty());
}

#[test]
fn test_concurrent_processing_computes_once() {
    let ledger = Arc::new(ledger());
    let samples = Arc::new(cleaning_history());
    for i in 0..8 {
        ledger.record("dev-1", CleaningType::Manual, None, at(600 + i), &samples);
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let samples = Arc::clone(&samples);
            thread::spawn(move || ledger.process_due("dev-1", &samples, at(800)).len())
        })
        .collect();
    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(total, 8);
    assert_eq!(ledger.pending_count("dev-1"), 0);
}

#[test]
fn test_unknown_log_is_not_found() {
    let ledger = ledger();
    let id = uuid::Uuid::new_v4();
    assert!(matches!(ledger.get(id), Err(EngineError::CleaningLogNotFound(_))));
    assert!(matches!(
        ledger.complete(id, 1.0, at(0)),
        Err(EngineError::CleaningLogNotFound(_))
    ));
}

#[test]
fn test_results_are_per_device_and_ordered() {
    let ledger = ledger();
    ledger.record("dev-1", CleaningType::Manual, None, at(700), &[]);
    ledger.record("dev-2", CleaningType::Manual, None, at(650), &[]);
    ledger.record("dev-1", CleaningType::AutoWiper, None, at(600), &[]);

    let results = ledger.results("dev-1");
    assert_eq!(results.len(), 2);
    assert!(results[0].recorded_at < results[1].recorded_at);
    assert_eq!(results[0].cleaning_type, CleaningType::AutoWiper);
}
