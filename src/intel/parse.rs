//! Defensive parsing of oracle responses.
//!
//! Models wrap JSON in markdown fences, preamble prose, or trailing
//! commentary. [`extract_json`] digs the first JSON object out of
//! whatever came back; [`parse_oracle_json`] turns the result into a
//! typed value or an explicit fallback.

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Result of trying to interpret an oracle response as structured data.
#[derive(Debug)]
pub enum OracleOutcome<T> {
    Parsed(T),
    /// The response could not be used; the caller substitutes defaults
    /// and records the reason.
    Fallback { reason: String },
}

/// Find the first complete JSON object embedded in a response.
///
/// Strips markdown code fences first, then scans for a balanced brace
/// pair, tracking string literals and escapes so braces inside strings
/// do not terminate the scan.
pub fn extract_json(response: &str) -> Option<&str> {
    let mut text = response.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }
    let text = text.trim();

    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse an oracle response into `T`, falling back instead of failing.
pub fn parse_oracle_json<T: DeserializeOwned>(response: &str) -> OracleOutcome<T> {
    let Some(json) = extract_json(response) else {
        return OracleOutcome::Fallback {
            reason: "no JSON object in oracle response".to_string(),
        };
    };
    match serde_json::from_str(json) {
        Ok(value) => OracleOutcome::Parsed(value),
        Err(e) => OracleOutcome::Fallback {
            reason: format!("malformed oracle JSON: {e}"),
        },
    }
}

/// Qualitative read on one conversation, as the oracle reports it.
///
/// Every field defaults so a partial response still parses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationAnalysis {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub firm: String,
    #[serde(default)]
    pub relationship_stage: crate::types::RelationshipStage,
    #[serde(default)]
    pub sentiment_trend: crate::types::SentimentTrend,
    #[serde(default)]
    pub key_interests: Vec<String>,
    #[serde(default)]
    pub objections_raised: Vec<String>,
    #[serde(default)]
    pub questions_asked: Vec<String>,
    #[serde(default)]
    pub materials_shared: Vec<String>,
    #[serde(default)]
    pub next_action_suggested: String,
    #[serde(default)]
    pub conversation_summary: String,
}

/// Oracle side of a generated outreach strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyResponse {
    #[serde(default)]
    pub email_draft: String,
    #[serde(default)]
    pub secondary_message: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default = "default_expected_response_rate")]
    pub expected_response_rate: f64,
    #[serde(default)]
    pub channel_sequence: Vec<String>,
    #[serde(default)]
    pub optimal_timing: String,
    #[serde(default = "default_personalization_score")]
    pub personalization_score: f64,
}

fn default_expected_response_rate() -> f64 {
    0.3
}

fn default_personalization_score() -> f64 {
    8.0
}

// ============================================================================
// Tests
// ============================================================================
