use anyhow::{Context, Result};
use shared::config::EngineConfig;
use shared::logger::init_logger;
use std::path::Path;

/// Initialise logging and load the engine configuration.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    init_logger();
    let config = EngineConfig::load(path).with_context(|| match path {
        Some(p) => format!("loading engine configuration from {}", p.display()),
        None => "loading engine configuration from the environment".to_string(),
    })?;
    tracing::info!(
        slot_minutes = config.slots.slot_minutes,
        tick_interval_secs = config.scheduler.tick_interval_secs,
        pass_budget_ms = config.scheduler.pass_budget_ms,
        "Engine configuration loaded"
    );
    Ok(config)
}
