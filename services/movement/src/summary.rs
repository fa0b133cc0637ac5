use chrono::NaiveDate;
use shared::types::{DailySummary, TelemetrySample};
use std::collections::BTreeMap;

/// One summary per UTC day, from the last sample of that day.
///
/// The controller resets its daily counters at midnight, so the last reading
/// of a day carries the day's totals.
pub fn daily_summaries(samples: &[TelemetrySample]) -> Vec<DailySummary> {
    let mut last_of_day: BTreeMap<NaiveDate, &TelemetrySample> = BTreeMap::new();
    for sample in samples {
        let date = sample.ts.date_naive();
        match last_of_day.get(&date) {
            Some(existing) if existing.ts > sample.ts => {}
            _ => {
                last_of_day.insert(date, sample);
            }
        }
    }

    last_of_day
        .into_iter()
        .map(|(date, s)| DailySummary {
            device_id: s.device_id.clone(),
            date,
            energy_wh: s.energy_today_wh,
            move_count: s.move_count_today,
            energy_per_move_wh: if s.move_count_today > 0 {
                Some(s.energy_today_wh / s.move_count_today as f64)
            } else {
                None
            },
        })
        .collect()
}
