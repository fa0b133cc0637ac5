use crate::model::{evaluate, Decision, DecisionInput, DecisionReason, DecisionSettings};
use aggregator_service::SlotAngleTable;
use chrono::Duration;
use shared::config::AggregatorConfig;
use shared::testing::{at, SampleBuilder};

/// Slot 14 (03:30-03:45) with `n` samples per (angle, power) pair.
fn table_with(buckets: &[(f64, f64, i64)]) -> SlotAngleTable {
    let mut table = SlotAngleTable::new("dev-1", &AggregatorConfig::default());
    let mut offset = 0;
    for &(angle, power, n) in buckets {
        for _ in 0..n {
            let ts = at(210) + Duration::seconds(offset);
            table.ingest(&SampleBuilder::new("dev-1", ts).angle(angle).power(power).build());
            offset += 1;
        }
    }
    table
}

fn input(angle: f64, recent_moves: u32) -> DecisionInput {
    DecisionInput {
        slot: 14,
        current_angle_deg: angle,
        current_power_w: 0.0,
        recent_move_count: recent_moves,
    }
}

fn settings(min_net_gain_wh: f64, motor_cost_wh: f64) -> DecisionSettings {
    DecisionSettings {
        min_net_gain_wh,
        max_moves_per_hour: 12,
        motor_cost_wh,
    }
}

// ============================================================================
// Net Gain Tests
// ============================================================================

#[test]
fn test_gain_over_cost_recommends_move() {
    let table = table_with(&[(30.0, 42.0, 50), (45.0, 48.0, 60)]);
    let d = evaluate(&table, &input(30.0, 0), &settings(0.3, 0.05), 0.25);

    assert_eq!(d.decision, Decision::Move);
    assert_eq!(d.reason, DecisionReason::NetGainSufficient);
    assert!((d.expected_gain_wh - 1.5).abs() < 1e-9);
    assert!((d.net_gain_wh - 1.45).abs() < 1e-9);
    assert!((d.recommended_angle_deg - 45.0).abs() < 1e-9);
    assert!(!d.low_confidence);
}

#[test]
fn test_net_gain_equal_to_minimum_moves() {
    let table = table_with(&[(30.0, 44.0, 30), (45.0, 48.0, 30)]);
    let d = evaluate(&table, &input(30.0, 0), &settings(0.5, 0.5), 0.25);
    assert!((d.net_gain_wh - 0.5).abs() < 1e-12);
    assert_eq!(d.decision, Decision::Move);
}

#[test]
fn test_gain_below_minimum_holds() {
    let table = table_with(&[(30.0, 47.0, 30), (45.0, 48.0, 30)]);
    let d = evaluate(&table, &input(30.0, 0), &settings(0.3, 0.05), 0.25);
    assert_eq!(d.decision, Decision::Hold);
    assert_eq!(d.reason, DecisionReason::InsufficientGain);
}

#[test]
fn test_motor_cost_can_cancel_gain() {
    let table = table_with(&[(30.0, 42.0, 30), (45.0, 48.0, 30)]);
    let d = evaluate(&table, &input(30.0, 0), &settings(0.0, 2.0), 0.25);
    assert!(d.net_gain_wh < 0.0);
    assert_eq!(d.decision, Decision::Hold);
}

#[test]
fn test_unknown_current_bucket_uses_latest_power() {
    let table = table_with(&[(45.0, 48.0, 30)]);
    let mut inp = input(20.0, 0);
    inp.current_power_w = 40.0;
    let d = evaluate(&table, &inp, &settings(0.3, 0.05), 0.25);
    assert!((d.expected_gain_wh - 2.0).abs() < 1e-9);
    assert_eq!(d.decision, Decision::Move);
}

// ============================================================================
// Hold Reason Tests
// ============================================================================

#[test]
fn test_no_statistics_holds() {
    let table = SlotAngleTable::new("dev-1", &AggregatorConfig::default());
    let d = evaluate(&table, &input(30.0, 0), &settings(0.0, 0.05), 0.25);
    assert_eq!(d.decision, Decision::Hold);
    assert_eq!(d.reason, DecisionReason::NoStatistics);
    assert!(d.low_confidence);
}

#[test]
fn test_low_confidence_holds_even_with_large_gain() {
    let table = table_with(&[(30.0, 10.0, 30), (45.0, 90.0, 5)]);
    let d = evaluate(&table, &input(30.0, 0), &settings(0.0, 0.05), 0.25);
    assert_eq!(d.decision, Decision::Hold);
    assert_eq!(d.reason, DecisionReason::LowConfidence);
    assert!(d.low_confidence);
    assert!(d.net_gain_wh > 0.0);
}

#[test]
fn test_already_at_best_holds() {
    let table = table_with(&[(30.0, 42.0, 30), (45.0, 48.0, 30)]);
    let d = evaluate(&table, &input(45.2, 0), &settings(0.0, 0.0), 0.25);
    assert_eq!(d.reason, DecisionReason::AlreadyAtBest);
    assert_eq!(d.expected_gain_wh, 0.0);
}

#[test]
fn test_already_at_best_holds_even_when_free_to_move() {
    let table = table_with(&[(30.0, 42.0, 30), (45.0, 48.0, 30)]);
    let d = evaluate(&table, &input(45.0, 0), &settings(0.0, 0.0), 0.25);
    assert_eq!(d.decision, Decision::Hold);
    assert_eq!(d.reason, DecisionReason::AlreadyAtBest);
    assert!(d.net_gain_wh >= 0.0);
    assert!(!d.low_confidence);
    assert_eq!(d.recommended_angle_deg, d.current_angle_deg);
}

#[test]
fn test_move_budget_exhausted_holds() {
    let table = table_with(&[(30.0, 42.0, 30), (45.0, 48.0, 30)]);
    let d = evaluate(&table, &input(30.0, 12), &settings(0.3, 0.05), 0.25);
    assert_eq!(d.decision, Decision::Hold);
    assert_eq!(d.reason, DecisionReason::MoveBudgetExhausted);

    let d = evaluate(&table, &input(30.0, 11), &settings(0.3, 0.05), 0.25);
    assert_eq!(d.decision, Decision::Move);
}

// ============================================================================
// Property Tests
// ============================================================================

#[test]
fn test_move_implies_threshold_and_budget() {
    let table = table_with(&[(20.0, 30.0, 25), (30.0, 42.0, 25), (45.0, 48.0, 25)]);
    for angle in [10.0, 20.0, 30.0, 45.0] {
        for min in [0.0, 0.5, 1.0, 2.0, 5.0] {
            for cost in [0.0, 0.05, 0.5, 1.5] {
                for recent in [0, 6, 12, 20] {
                    let s = settings(min, cost);
                    let d = evaluate(&table, &input(angle, recent), &s, 0.25);
                    let gain_ok = d.net_gain_wh >= min;
                    let budget_ok = recent < s.max_moves_per_hour;
                    if d.is_move() {
                        assert!(gain_ok);
                        assert!(budget_ok);
                        assert!(!d.low_confidence);
                    } else {
                        assert!(
                            !gain_ok || !budget_ok || d.low_confidence || d.reason == DecisionReason::AlreadyAtBest,
                            "hold without cause: {:?}",
                            d
                        );
                    }
                    assert!(d.expected_gain_wh >= 0.0);
                }
            }
        }
    }
}

#[test]
fn test_decision_serializes_upper_case() {
    let table = table_with(&[(30.0, 42.0, 30), (45.0, 48.0, 30)]);
    let d = evaluate(&table, &input(30.0, 0), &settings(0.3, 0.05), 0.25);
    let json = serde_json::to_value(&d).unwrap();
    assert_eq!(json["decision"], "MOVE");
    assert_eq!(json["reason"], "net_gain_sufficient");
}
