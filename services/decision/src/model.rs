//! Net-gain MOVE/HOLD decision for one device in one slot.

use aggregator_service::SlotAngleTable;
use serde::{Deserialize, Serialize};
use shared::logger::log_decision;
use shared::settings::ResolvedSettings;
use shared::types::Slot;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Move,
    Hold,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Move => f.write_str("MOVE"),
            Decision::Hold => f.write_str("HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    NetGainSufficient,
    /// The best bucket has too few samples to trust.
    LowConfidence,
    NoStatistics,
    AlreadyAtBest,
    InsufficientGain,
    MoveBudgetExhausted,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::NetGainSufficient => "net_gain_sufficient",
            DecisionReason::LowConfidence => "low_confidence",
            DecisionReason::NoStatistics => "no_statistics",
            DecisionReason::AlreadyAtBest => "already_at_best",
            DecisionReason::InsufficientGain => "insufficient_gain",
            DecisionReason::MoveBudgetExhausted => "move_budget_exhausted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionInput {
    pub slot: Slot,
    pub current_angle_deg: f64,
    /// Latest observed power, used when the current bucket has no statistics.
    pub current_power_w: f64,
    /// Moves in the trailing hour.
    pub recent_move_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionSettings {
    pub min_net_gain_wh: f64,
    pub max_moves_per_hour: u32,
    pub motor_cost_wh: f64,
}

impl DecisionSettings {
    /// `motor_cost_wh` is the resolved cost: explicit setting or history estimate.
    pub fn from_resolved(settings: &ResolvedSettings, motor_cost_wh: f64) -> Self {
        Self {
            min_net_gain_wh: settings.min_net_gain_wh,
            max_moves_per_hour: settings.max_moves_per_hour,
            motor_cost_wh,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetGainDecision {
    pub decision: Decision,
    pub reason: DecisionReason,
    pub slot: Slot,
    pub current_angle_deg: f64,
    pub recommended_angle_deg: f64,
    pub expected_gain_wh: f64,
    pub motor_cost_wh: f64,
    pub net_gain_wh: f64,
    pub recent_move_count: u32,
    pub confidence: f64,
    pub low_confidence: bool,
}

impl NetGainDecision {
    pub fn is_move(&self) -> bool {
        self.decision == Decision::Move
    }
}

/// Decide whether moving to the best known angle for `input.slot` pays for the
/// motor energy. MOVE requires `net_gain >= min_net_gain` and a remaining
/// hourly move budget; every other outcome is HOLD with its reason.
pub fn evaluate(
    table: &SlotAngleTable,
    input: &DecisionInput,
    settings: &DecisionSettings,
    slot_duration_hours: f64,
) -> NetGainDecision {
    let motor_cost_wh = settings.motor_cost_wh.max(0.0);

    let best = match table.best_angle(input.slot) {
        Some(best) => best,
        None => {
            let decision = NetGainDecision {
                decision: Decision::Hold,
                reason: DecisionReason::NoStatistics,
                slot: input.slot,
                current_angle_deg: input.current_angle_deg,
                recommended_angle_deg: input.current_angle_deg,
                expected_gain_wh: 0.0,
                motor_cost_wh,
                net_gain_wh: -motor_cost_wh,
                recent_move_count: input.recent_move_count,
                confidence: 0.0,
                low_confidence: true,
            };
            log(table.device_id(), &decision, settings);
            return decision;
        }
    };

    let current_power = table
        .mean_power(input.slot, input.current_angle_deg)
        .unwrap_or(input.current_power_w);
    let expected_gain_wh = (best.mean_power_w - current_power).max(0.0) * slot_duration_hours;
    let net_gain_wh = expected_gain_wh - motor_cost_wh;
    let at_best = table.bucket_of(input.current_angle_deg) == best.bucket;

    let reason = if best.low_confidence {
        DecisionReason::LowConfidence
    } else if at_best {
        DecisionReason::AlreadyAtBest
    } else if net_gain_wh < settings.min_net_gain_wh {
        DecisionReason::InsufficientGain
    } else if input.recent_move_count >= settings.max_moves_per_hour {
        DecisionReason::MoveBudgetExhausted
    } else {
        DecisionReason::NetGainSufficient
    };

    let decision = NetGainDecision {
        decision: if reason == DecisionReason::NetGainSufficient {
            Decision::Move
        } else {
            Decision::Hold
        },
        reason,
        slot: input.slot,
        current_angle_deg: input.current_angle_deg,
        // Staying put is the recommendation when the current bucket is already best.
        recommended_angle_deg: if at_best { input.current_angle_deg } else { best.angle_deg },
        expected_gain_wh,
        motor_cost_wh,
        net_gain_wh,
        recent_move_count: input.recent_move_count,
        confidence: best.confidence,
        low_confidence: best.low_confidence,
    };
    log(table.device_id(), &decision, settings);
    decision
}

fn log(device_id: &str, decision: &NetGainDecision, settings: &DecisionSettings) {
    log_decision(
        device_id,
        &decision.decision.to_string(),
        decision.reason.as_str(),
        decision.net_gain_wh,
        settings.min_net_gain_wh,
    );
}
