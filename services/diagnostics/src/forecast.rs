//! Next-hour energy estimate.

use crate::history::HistoryView;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use shared::config::ForecastConfig;
use shared::stats::{clamp01, mean};
use shared::types::DailySummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub horizon_minutes: i64,
    pub expected_wh: f64,
    pub mean_power_w: f64,
    pub trend_wh: f64,
    /// Mean of recent daily totals, when any complete day is known.
    pub cap_wh: Option<f64>,
    pub confidence: f64,
    pub samples: usize,
    pub sufficient: bool,
}

pub fn forecast(history: &HistoryView<'_>, daily: &[DailySummary], config: &ForecastConfig) -> Forecast {
    let horizon = Duration::minutes(config.horizon_minutes);
    let recent = history.samples_within(horizon);
    if recent.is_empty() {
        return Forecast {
            horizon_minutes: config.horizon_minutes,
            expected_wh: 0.0,
            mean_power_w: 0.0,
            trend_wh: 0.0,
            cap_wh: None,
            confidence: 0.0,
            samples: 0,
            sufficient: false,
        };
    }

    let powers: Vec<f64> = recent.iter().map(|s| s.power_w).collect();
    let mean_power_w = mean(&powers).unwrap_or(0.0);

    // Energy counter growth over the trend window, within one day.
    let trend_samples = history.samples_within(Duration::minutes(config.trend_window_minutes));
    let trend_wh = match (trend_samples.first(), trend_samples.last()) {
        (Some(first), Some(last)) if first.ts.date_naive() == last.ts.date_naive() => {
            (last.energy_today_wh - first.energy_today_wh).max(0.0)
        }
        _ => 0.0,
    };

    let today = history.as_of.date_naive();
    let previous_days: Vec<f64> = daily
        .iter()
        .filter(|d| d.date < today)
        .rev()
        .take(config.daily_cap_days)
        .map(|d| d.energy_wh)
        .collect();
    let cap_wh = mean(&previous_days);

    let horizon_hours = config.horizon_minutes as f64 / 60.0;
    let mut expected_wh = (mean_power_w * horizon_hours + config.trend_weight * trend_wh).max(0.0);
    if let Some(cap) = cap_wh {
        expected_wh = expected_wh.min(cap.max(0.0));
    }

    Forecast {
        horizon_minutes: config.horizon_minutes,
        expected_wh,
        mean_power_w,
        trend_wh,
        cap_wh,
        confidence: clamp01(recent.len() as f64 / config.full_confidence_samples.max(1) as f64),
        samples: recent.len(),
        sufficient: true,
    }
}
