//! Error taxonomy for pipeline runs.
//!
//! Classification follows the propagation policy: nothing below the
//! top-level orchestrator raises past its own stage. Per-message and
//! per-counterparty failures become [`StageError`] entries on the run's
//! error list; the caller inspects that list to assess partial success.
//! A run with 8 of 10 counterparties analyzed is a success with warnings,
//! not a failure.

use thiserror::Error;

/// A non-fatal failure captured during a pipeline run.
#[derive(Debug, Error)]
pub enum StageError {
    /// One raw message failed to parse; it was dropped, the batch continued.
    #[error("Failed to normalize message {message_id}: {reason}")]
    Ingestion { message_id: String, reason: String },

    /// The mail source search itself failed; the run continues with no
    /// messages and reaches the terminal stage with empty outputs.
    #[error("Mail search failed: {reason}")]
    Search { reason: String },

    /// An oracle call failed (timeout, transport, or malformed response)
    /// during conversation analysis. The counterparty gets a default context.
    #[error("Conversation analysis failed for {counterparty}: {reason}")]
    Analysis { counterparty: String, reason: String },

    /// An oracle call failed during strategy generation. No strategy is
    /// produced for this counterparty.
    #[error("Strategy generation failed for {counterparty}: {reason}")]
    Strategy { counterparty: String, reason: String },

    /// The retrospective oracle call failed; a stub report is produced.
    #[error("Retrospective generation failed: {reason}")]
    Retrospective { reason: String },
}

impl StageError {
    /// True when the failure was an oracle call (as opposed to ingestion).
    pub fn is_oracle(&self) -> bool {
        matches!(
            self,
            StageError::Analysis { .. }
                | StageError::Strategy { .. }
                | StageError::Retrospective { .. }
        )
    }

    /// Short classification label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Ingestion { .. } => "ingestion",
            StageError::Search { .. } => "search",
            StageError::Analysis { .. } => "analysis",
            StageError::Strategy { .. } => "strategy",
            StageError::Retrospective { .. } => "retrospective",
        }
    }
}
