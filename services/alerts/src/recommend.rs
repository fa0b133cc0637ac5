use crate::book::AlertCategory;
use diagnostics_service::DiagnosticsReport;
use serde::{Deserialize, Serialize};
use shared::config::AlertConfig;
use shared::types::Severity;

pub const HEALTHY_TEXT: &str = "System healthy. Maintain normal operation.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub severity: Severity,
    /// None for the healthy fallback and for rules without an alert category.
    pub category: Option<AlertCategory>,
    /// Lower ranks first among equal severities.
    pub priority: u8,
    pub text: String,
}

struct Rule {
    priority: u8,
    severity: Severity,
    category: Option<AlertCategory>,
    text: &'static str,
    applies: fn(&DiagnosticsReport, &AlertConfig) -> bool,
}

const RULES: &[Rule] = &[
    Rule {
        priority: 1,
        severity: Severity::Critical,
        category: Some(AlertCategory::PowerRail),
        text: "Add a bulk capacitor on the 5 V rail and verify the motor supply wiring.",
        applies: |r, c| r.rail.sufficient && r.rail.risk > c.rail_critical,
    },
    Rule {
        priority: 2,
        severity: Severity::Warn,
        category: Some(AlertCategory::Dust),
        text: "Clean the panel surface.",
        applies: |r, c| r.dust.sufficient && r.dust.dust_probability > c.dust_warn,
    },
    Rule {
        priority: 3,
        severity: Severity::Warn,
        category: Some(AlertCategory::SensorHealth),
        text: "Check the current-sensor wiring and recalibrate the sensor offset.",
        applies: |r, c| r.sensor.sufficient && r.sensor.score < c.sensor_warn,
    },
    Rule {
        priority: 4,
        severity: Severity::Warn,
        category: Some(AlertCategory::Shading),
        text: "Check for recurring shading obstacles near the panel.",
        applies: |r, c| r.dust.sufficient && r.dust.shading_probability > c.shading_warn,
    },
    Rule {
        priority: 5,
        severity: Severity::Warn,
        category: Some(AlertCategory::ClockReliability),
        text: "Replace the RTC backup battery.",
        applies: |r, c| r.clock.sufficient && r.clock.score < c.recommend_clock_below,
    },
    Rule {
        priority: 6,
        severity: Severity::Info,
        category: Some(AlertCategory::Efficiency),
        text: "Limit moves to high-yield slots.",
        applies: |r, c| r.efficiency.sufficient && r.efficiency.score < c.efficiency_info,
    },
    Rule {
        priority: 7,
        severity: Severity::Info,
        category: None,
        text: "Check telemetry link continuity.",
        applies: |r, c| r.forecast.sufficient && r.forecast.confidence < c.recommend_forecast_confidence_below,
    },
];

/// Ranked maintenance recommendations: severity first, then rule priority.
/// Never empty.
pub fn recommend(report: &DiagnosticsReport, config: &AlertConfig) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = RULES
        .iter()
        .filter(|rule| (rule.applies)(report, config))
        .map(|rule| Recommendation {
            severity: rule.severity,
            category: rule.category,
            priority: rule.priority,
            text: rule.text.to_string(),
        })
        .collect();

    if out.is_empty() {
        out.push(Recommendation {
            severity: Severity::Info,
            category: None,
            priority: u8::MAX,
            text: HEALTHY_TEXT.to_string(),
        });
    }

    out.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.priority.cmp(&b.priority)));
    out
}
