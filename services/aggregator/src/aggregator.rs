use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::config::AggregatorConfig;
use shared::defaults::HISTORY_LOOKBACK_DAYS;
use shared::stats::RunningStat;
use shared::types::{AngleBucket, DeviceId, Slot, TelemetrySample};
use std::collections::{BTreeMap, BTreeSet};

/// Aggregated power statistics for one (slot, angle bucket) cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAngleStat {
    pub slot: Slot,
    pub bucket: AngleBucket,
    pub angle_deg: f64,
    pub sample_count: u64,
    pub mean_power_w: f64,
    pub std_power_w: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestAngle {
    pub slot: Slot,
    pub bucket: AngleBucket,
    pub angle_deg: f64,
    pub mean_power_w: f64,
    pub sample_count: u64,
    pub confidence: f64,
    /// The best bucket has fewer samples than the aggregator minimum.
    pub low_confidence: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub slot: Slot,
    pub angle_deg: f64,
    pub mean_power_w: f64,
}

/// Per-device slot/angle power statistics.
///
/// The table is a plain value: a diagnostics pass clones the published table,
/// ingests new samples into the clone and publishes the result. Readers only
/// ever see complete tables.
#[derive(Debug, Clone)]
pub struct SlotAngleTable {
    device_id: DeviceId,
    bucket_width_deg: f64,
    min_samples: u64,
    cells: BTreeMap<(Slot, AngleBucket), RunningStat>,
    watermark: Option<DateTime<Utc>>,
    /// Absorbed timestamps no older than `watermark - retention`.
    seen: BTreeSet<DateTime<Utc>>,
    retention: Duration,
    absorbed: u64,
}

impl SlotAngleTable {
    pub fn new(device_id: &str, config: &AggregatorConfig) -> Self {
        Self {
            device_id: device_id.to_string(),
            bucket_width_deg: config.angle_bucket_deg,
            min_samples: config.min_samples.max(1),
            cells: BTreeMap::new(),
            watermark: None,
            seen: BTreeSet::new(),
            retention: Duration::days(HISTORY_LOOKBACK_DAYS),
            absorbed: 0,
        }
    }

    /// How far behind the watermark a late sample is still accepted. Should
    /// match the history lookback, since nothing older is ever re-read.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Latest sample timestamp absorbed so far.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    pub fn absorbed(&self) -> u64 {
        self.absorbed
    }

    pub fn min_samples(&self) -> u64 {
        self.min_samples
    }

    pub fn bucket_width_deg(&self) -> f64 {
        self.bucket_width_deg
    }

    pub fn bucket_of(&self, angle_deg: f64) -> AngleBucket {
        AngleBucket::of(angle_deg, self.bucket_width_deg)
    }

    /// Absorb one sample. A timestamp already absorbed is a replay and is
    /// ignored, which keeps re-ingesting an overlapping history idempotent.
    /// Late samples are absorbed as long as they fall within the retention
    /// horizon behind the watermark.
    pub fn ingest(&mut self, sample: &TelemetrySample) -> bool {
        if sample.device_id != self.device_id {
            tracing::warn!(
                table = %self.device_id,
                sample_device = %sample.device_id,
                "Ignoring sample for another device"
            );
            return false;
        }
        if let Some(mark) = self.watermark {
            if sample.ts < mark - self.retention {
                return false;
            }
        }
        if !self.seen.insert(sample.ts) {
            return false;
        }

        let bucket = self.bucket_of(sample.angle_deg);
        self.cells
            .entry((sample.slot, bucket))
            .or_insert_with(RunningStat::new)
            .push(sample.power_w);
        if self.watermark.map_or(true, |mark| sample.ts > mark) {
            self.watermark = Some(sample.ts);
            self.prune_seen();
        }
        self.absorbed += 1;
        true
    }

    fn prune_seen(&mut self) {
        let Some(mark) = self.watermark else { return };
        let horizon = mark - self.retention;
        while self.seen.first().map_or(false, |ts| *ts < horizon) {
            self.seen.pop_first();
        }
    }

    /// Absorb a batch; returns how many samples were new.
    pub fn ingest_all<'a>(&mut self, samples: impl IntoIterator<Item = &'a TelemetrySample>) -> usize {
        samples.into_iter().filter(|s| self.ingest(s)).count()
    }

    /// Confidence in [0, 1]: saturates once `min_samples` is reached and
    /// shrinks with the relative spread of the readings.
    pub fn confidence_of(&self, stat: &RunningStat) -> f64 {
        let count_factor = (stat.count() as f64 / self.min_samples as f64).min(1.0);
        let variance_factor = 1.0 / (1.0 + stat.coefficient_of_variation());
        (count_factor * variance_factor).clamp(0.0, 1.0)
    }

    pub fn stat(&self, slot: Slot, bucket: AngleBucket) -> Option<SlotAngleStat> {
        self.cells.get(&(slot, bucket)).map(|stat| self.describe(slot, bucket, stat))
    }

    pub fn mean_power(&self, slot: Slot, angle_deg: f64) -> Option<f64> {
        self.cells
            .get(&(slot, self.bucket_of(angle_deg)))
            .map(|stat| stat.mean())
    }

    /// Highest mean power observed in `slot`, across all buckets.
    pub fn best_power(&self, slot: Slot) -> Option<f64> {
        self.best_angle(slot).map(|best| best.mean_power_w)
    }

    /// Bucket with the maximum mean power for `slot`. Ties go to the lower bucket.
    pub fn best_angle(&self, slot: Slot) -> Option<BestAngle> {
        let mut best: Option<(AngleBucket, &RunningStat)> = None;
        for ((_, bucket), stat) in self.cells.range((slot, AngleBucket(i32::MIN))..=(slot, AngleBucket(i32::MAX))) {
            match best {
                Some((_, current)) if stat.mean() <= current.mean() => {}
                _ => best = Some((*bucket, stat)),
            }
        }

        best.map(|(bucket, stat)| BestAngle {
            slot,
            bucket,
            angle_deg: bucket.center_deg(self.bucket_width_deg),
            mean_power_w: stat.mean(),
            sample_count: stat.count(),
            confidence: self.confidence_of(stat),
            low_confidence: stat.count() < self.min_samples,
        })
    }

    /// One entry per observed slot, ordered by slot.
    pub fn best_angle_table(&self) -> Vec<BestAngle> {
        let mut slots: Vec<Slot> = self.cells.keys().map(|(slot, _)| *slot).collect();
        slots.dedup();
        slots.into_iter().filter_map(|slot| self.best_angle(slot)).collect()
    }

    pub fn heatmap(&self) -> Vec<HeatmapCell> {
        self.cells
            .iter()
            .map(|((slot, bucket), stat)| HeatmapCell {
                slot: *slot,
                angle_deg: bucket.center_deg(self.bucket_width_deg),
                mean_power_w: stat.mean(),
            })
            .collect()
    }

    pub fn stats(&self) -> Vec<SlotAngleStat> {
        self.cells
            .iter()
            .map(|((slot, bucket), stat)| self.describe(*slot, *bucket, stat))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn describe(&self, slot: Slot, bucket: AngleBucket, stat: &RunningStat) -> SlotAngleStat {
        SlotAngleStat {
            slot,
            bucket,
            angle_deg: bucket.center_deg(self.bucket_width_deg),
            sample_count: stat.count(),
            mean_power_w: stat.mean(),
            std_power_w: stat.std_dev(),
            confidence: self.confidence_of(stat),
        }
    }
}
