//! Optional natural-language explanation of a diagnostics summary.

use crate::summary::DiagnosticsSummary;
use async_trait::async_trait;
use shared::logger::log_narrative_failure;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("Narrative service unavailable: {0}")]
    Unavailable(String),
    #[error("Narrative generation failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Narrator: Send + Sync {
    async fn explain(&self, summary: &DiagnosticsSummary) -> Result<String, NarrativeError>;
}

/// Narrator that never has anything to say.
pub struct NullNarrator;

#[async_trait]
impl Narrator for NullNarrator {
    async fn explain(&self, _summary: &DiagnosticsSummary) -> Result<String, NarrativeError> {
        Err(NarrativeError::Unavailable("no narrator configured".into()))
    }
}

/// Ask the narrator for text within `timeout`.
///
/// Absence, failure, timeout and blank text all yield `None`; the caller's
/// pass never fails because of the narrator.
pub async fn narrate(
    narrator: Option<&dyn Narrator>,
    summary: &DiagnosticsSummary,
    timeout: Duration,
) -> Option<String> {
    let narrator = narrator?;
    match tokio::time::timeout(timeout, narrator.explain(summary)).await {
        Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
        Ok(Ok(_)) => {
            log_narrative_failure(&summary.device_id, "empty narrative");
            None
        }
        Ok(Err(e)) => {
            log_narrative_failure(&summary.device_id, &e.to_string());
            None
        }
        Err(_) => {
            log_narrative_failure(&summary.device_id, "timed out");
            None
        }
    }
}
