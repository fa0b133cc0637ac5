//! Dust vs. shading attribution from power depressions.
//!
//! Each sample is compared with the best mean power the aggregator has seen
//! for its slot. Depressed runs that recover quickly are shading; runs that
//! persist across slots are soiling. Soiling depth is read from the
//! exponentially smoothed ratio, shading depth from the raw dips.

use crate::history::HistoryView;
use aggregator_service::SlotAngleTable;
use serde::{Deserialize, Serialize};
use shared::config::DustConfig;
use shared::stats::{clamp01, mean};
use shared::types::Slot;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilingClass {
    Clear,
    Dust,
    Shading,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DustAssessment {
    pub dust_probability: f64,
    pub shading_probability: f64,
    pub mean_ratio: f64,
    pub smoothed_ratio: f64,
    pub dust_episodes: usize,
    pub shading_episodes: usize,
    pub samples: usize,
    pub classification: SoilingClass,
    pub sufficient: bool,
}

impl DustAssessment {
    pub fn neutral(samples: usize) -> Self {
        Self {
            dust_probability: 0.0,
            shading_probability: 0.0,
            mean_ratio: 1.0,
            smoothed_ratio: 1.0,
            dust_episodes: 0,
            shading_episodes: 0,
            samples,
            classification: SoilingClass::Unknown,
            sufficient: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Dust,
    Shading,
}

/// One ratio sample: slot, raw ratio, smoothed ratio at that point.
type Point = (Slot, f64, f64);

#[derive(Default)]
struct Tally {
    dust_ratios: Vec<f64>,
    shading_ratios: Vec<f64>,
    dust_episodes: usize,
    shading_episodes: usize,
}

impl Tally {
    fn add(&mut self, kind: RunKind, run: &[Point]) {
        match kind {
            RunKind::Dust => {
                self.dust_ratios.extend(run.iter().map(|(_, _, smoothed)| *smoothed));
                self.dust_episodes += 1;
            }
            RunKind::Shading => {
                self.shading_ratios.extend(run.iter().map(|(_, raw, _)| *raw));
                self.shading_episodes += 1;
            }
        }
    }
}

pub fn assess(history: &HistoryView<'_>, table: &SlotAngleTable, config: &DustConfig) -> DustAssessment {
    let ratios: Vec<(Slot, f64)> = history
        .samples_within(config.window())
        .iter()
        .filter_map(|s| {
            let best = table.best_power(s.slot)?;
            if best < config.min_best_power_w {
                return None;
            }
            Some((s.slot, s.power_w.max(0.0) / best))
        })
        .collect();

    if ratios.len() < config.min_samples.max(1) {
        return DustAssessment::neutral(ratios.len());
    }

    let alpha = config.smoothing_alpha.clamp(0.0, 1.0);
    let mut smoothed_ratio = ratios[0].1;
    let points: Vec<Point> = ratios
        .iter()
        .enumerate()
        .map(|(i, &(slot, ratio))| {
            if i > 0 {
                smoothed_ratio = alpha * ratio + (1.0 - alpha) * smoothed_ratio;
            }
            (slot, ratio, smoothed_ratio)
        })
        .collect();

    let mut tally = Tally::default();
    let mut run: Vec<Point> = Vec::new();
    for &point in &points {
        if point.1 < config.depression_ratio {
            run.push(point);
            continue;
        }
        if !run.is_empty() {
            tally.add(classify_run(&run, true, config), &run);
            run.clear();
        }
    }
    // A short run still open at the end may yet recover; leave it unclassified.
    if run.len() > config.recovery_samples {
        tally.add(classify_run(&run, false, config), &run);
    }

    let classified = (tally.dust_ratios.len() + tally.shading_ratios.len()) as f64;
    let (dust_probability, shading_probability) = if classified > 0.0 {
        let dust = mean(&tally.dust_ratios)
            .map(|m| clamp01(config.dust_gain * (1.0 - m)) * tally.dust_ratios.len() as f64 / classified)
            .unwrap_or(0.0);
        let shading = mean(&tally.shading_ratios)
            .map(|m| clamp01(config.shading_gain * (1.0 - m)) * tally.shading_ratios.len() as f64 / classified)
            .unwrap_or(0.0);
        (dust, shading)
    } else {
        (0.0, 0.0)
    };

    let values: Vec<f64> = ratios.iter().map(|(_, r)| *r).collect();

    let classification = if dust_probability == 0.0 && shading_probability == 0.0 {
        SoilingClass::Clear
    } else if dust_probability >= shading_probability {
        SoilingClass::Dust
    } else {
        SoilingClass::Shading
    };

    tracing::debug!(
        device_id = %history.device_id,
        dust = dust_probability,
        shading = shading_probability,
        dust_episodes = tally.dust_episodes,
        shading_episodes = tally.shading_episodes,
        "Dust assessment"
    );

    DustAssessment {
        dust_probability,
        shading_probability,
        mean_ratio: mean(&values).unwrap_or(1.0),
        smoothed_ratio,
        dust_episodes: tally.dust_episodes,
        shading_episodes: tally.shading_episodes,
        samples: values.len(),
        classification,
        sufficient: true,
    }
}

fn classify_run(run: &[Point], recovered: bool, config: &DustConfig) -> RunKind {
    if recovered && run.len() <= config.recovery_samples {
        return RunKind::Shading;
    }
    let slots: BTreeSet<Slot> = run.iter().map(|(slot, _, _)| *slot).collect();
    if slots.len() >= config.min_slots {
        RunKind::Dust
    } else {
        RunKind::Shading
    }
}
