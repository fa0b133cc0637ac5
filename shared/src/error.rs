use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient data for {score}: {have} samples, need {need}")]
    InsufficientData {
        score: &'static str,
        have: usize,
        need: usize,
    },
    #[error("No settings for device {device_id}; defaults applied")]
    StaleSettings { device_id: String },
    #[error("Diagnostics pass for {device_id} exceeded its {budget_ms} ms budget")]
    ComputationTimeout { device_id: String, budget_ms: u64 },
    #[error("Cleaning log {log_id} already computed")]
    DuplicateCleaningComputation { log_id: Uuid },
    #[error("Diagnostics pass already running for {device_id}")]
    ConcurrentPassConflict { device_id: String },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Alert not found: {0}")]
    AlertNotFound(Uuid),
    #[error("Cleaning log not found: {0}")]
    CleaningLogNotFound(Uuid),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Errors the next scheduler tick resolves on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::ComputationTimeout { .. }
                | EngineError::ConcurrentPassConflict { .. }
                | EngineError::Store(StoreError::Unavailable(_))
        )
    }
}

impl From<crate::config::ConfigError> for EngineError {
    fn from(err: crate::config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
