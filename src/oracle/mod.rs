//! Analysis oracle seam.
//!
//! The pipeline talks to its language model through [`AnalysisOracle`]
//! so stages can be tested against a scripted oracle. [`openai`] is the
//! production implementation.

pub mod openai;

use async_trait::async_trait;

pub use openai::OpenAiOracle;

/// Why an oracle call failed.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle call timed out after {0}s")]
    Timeout(u64),
    #[error("oracle transport error: {0}")]
    Transport(String),
    #[error("oracle API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("oracle returned an empty response")]
    EmptyResponse,
}

/// One-shot qualitative analysis: system instructions plus a user prompt
/// in, free-form text out.
#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    async fn analyze(
        &self,
        system_instructions: &str,
        user_prompt: &str,
    ) -> Result<String, OracleError>;
}
