//! Small numeric helpers shared by the aggregator and the diagnostics.

use serde::{Deserialize, Serialize};

/// Running mean/variance using Welford's update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStat {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / self.count as f64).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// std / mean; 1.0 when the mean is not positive.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean <= 0.0 {
            return 1.0;
        }
        self.std_dev() / self.mean
    }
}

impl FromIterator<f64> for RunningStat {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stat = RunningStat::new();
        for v in iter {
            stat.push(v);
        }
        stat
    }
}

pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation; 0.0 for fewer than two values.
pub fn pstdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().copied().collect::<RunningStat>().std_dev()
}
