use crate::history::HistoryView;
use aggregator_service::SlotAngleTable;
use serde::{Deserialize, Serialize};
use shared::config::EfficiencyConfig;
use shared::stats::clamp01;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyScore {
    /// 0..=100
    pub score: f64,
    /// Latest power over the slot's best mean; 1.0 when the slot has no statistics.
    pub power_ratio: f64,
    pub wasted_moves_percent: f64,
    pub sensor_health: f64,
    pub sufficient: bool,
}

pub fn score(
    history: &HistoryView<'_>,
    table: &SlotAngleTable,
    wasted_moves_percent: f64,
    sensor_health: f64,
    config: &EfficiencyConfig,
) -> EfficiencyScore {
    let latest = match history.latest_sample() {
        Some(latest) => latest,
        None => {
            return EfficiencyScore {
                score: config.neutral_score,
                power_ratio: 1.0,
                wasted_moves_percent,
                sensor_health,
                sufficient: false,
            }
        }
    };

    let power_ratio = table
        .best_power(latest.slot)
        .filter(|best| *best > 0.0)
        .map(|best| clamp01(latest.power_w / best))
        .unwrap_or(1.0);

    let score = 100.0
        - config.power_ratio_weight * (1.0 - power_ratio)
        - (config.wasted_weight * wasted_moves_percent).min(config.wasted_cap)
        - config.sensor_weight * (100.0 - sensor_health);

    EfficiencyScore {
        score: score.clamp(0.0, 100.0),
        power_ratio,
        wasted_moves_percent,
        sensor_health,
        sufficient: true,
    }
}
