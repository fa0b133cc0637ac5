//! Logging utilities

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize the logger. `RUST_LOG` wins; otherwise `info`.
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second init in the same process (tests) is not an error.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).json().try_init();
}

/// Log a move/hold recommendation
pub fn log_decision(device_id: &str, decision: &str, reason: &str, net_gain_wh: f64, min_net_gain_wh: f64) {
    debug!(
        device_id = %device_id,
        decision = %decision,
        reason = %reason,
        net_gain_wh = net_gain_wh,
        min_net_gain_wh = min_net_gain_wh,
        "Net-gain decision"
    );
}

/// Log an alert being raised or resolved
pub fn log_alert_transition(device_id: &str, category: &str, severity: &str, raised: bool) {
    if raised {
        info!(device_id = %device_id, category = %category, severity = %severity, "Alert raised");
    } else {
        info!(device_id = %device_id, category = %category, "Alert resolved");
    }
}

/// Log a completed cleaning measurement
pub fn log_cleaning_computed(device_id: &str, log_id: &str, before_wh: f64, after_wh: f64, improvement_percent: f64) {
    info!(
        device_id = %device_id,
        log_id = %log_id,
        energy_before_wh = before_wh,
        energy_after_wh = after_wh,
        improvement_percent = improvement_percent,
        "Cleaning improvement computed"
    );
}

/// Log that defaults replaced missing device settings
pub fn log_settings_defaulted(device_id: &str) {
    debug!(device_id = %device_id, "No device settings; defaults applied");
}

/// Log a narrative capability failure. The pass continues without text.
pub fn log_narrative_failure(device_id: &str, reason: &str) {
    warn!(device_id = %device_id, reason = %reason, "Narrative unavailable");
}

/// Log the outcome of one device pass
pub fn log_pass_outcome(device_id: &str, outcome: &str, elapsed_ms: u128) {
    match outcome {
        "completed" => info!(device_id = %device_id, elapsed_ms = elapsed_ms as u64, "Diagnostics pass completed"),
        "skipped" => info!(device_id = %device_id, "Diagnostics pass skipped; another pass holds the lease"),
        "timed_out" => warn!(device_id = %device_id, elapsed_ms = elapsed_ms as u64, "Diagnostics pass timed out"),
        _ => error!(device_id = %device_id, outcome = %outcome, "Diagnostics pass failed"),
    }
}
