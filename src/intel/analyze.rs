//! Per-counterparty conversation analysis.
//!
//! Mechanical stats are computed locally and never depend on the
//! oracle. The qualitative read comes from one oracle call; if that
//! call fails or returns junk, the context ships with the mechanical
//! half filled and the failure carried alongside.

use crate::oracle::AnalysisOracle;
use crate::sanitize::Sanitizer;
use crate::timing::response_latency_samples;
use crate::types::{ConversationGroup, CounterpartyContext};

use super::parse::{parse_oracle_json, ConversationAnalysis, OracleOutcome};
use super::prompts;

/// Analysis output: the context is always present, the failure reason
/// only when the qualitative half fell back to defaults.
#[derive(Debug)]
pub struct ConversationAnalysisResult {
    pub context: CounterpartyContext,
    pub failure: Option<String>,
}

/// Analyze one conversation.
pub async fn analyze_conversation(
    oracle: &dyn AnalysisOracle,
    group: &ConversationGroup,
    sanitizer: &mut Sanitizer,
    business_context: &str,
) -> ConversationAnalysisResult {
    let mut context = mechanical_context(group);

    let transcript = prompts::render_conversation(group, sanitizer);
    let prompt = prompts::analysis_prompt(&transcript, business_context);
    let failure = match oracle.analyze(prompts::ANALYSIS_SYSTEM, &prompt).await {
        Ok(response) => match parse_oracle_json::<ConversationAnalysis>(&response) {
            OracleOutcome::Parsed(analysis) => {
                apply_analysis(&mut context, analysis);
                None
            }
            OracleOutcome::Fallback { reason } => Some(reason),
        },
        Err(e) => Some(e.to_string()),
    };

    if let Some(reason) = &failure {
        log::warn!(
            "qualitative analysis fell back for {}: {}",
            group.counterparty,
            reason
        );
    }
    ConversationAnalysisResult { context, failure }
}

/// The half of the context derived purely from message metadata.
fn mechanical_context(group: &ConversationGroup) -> CounterpartyContext {
    let sent = group.sent_count();
    let received = group.received_count();
    let latencies = response_latency_samples(&group.messages);
    CounterpartyContext {
        identity: group.counterparty.clone(),
        messages_sent: sent,
        replies_received: received,
        reply_rate: if sent > 0 {
            received as f64 / sent as f64
        } else {
            0.0
        },
        avg_response_hours: if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        },
        last_contact: group.last_contact(),
        ..CounterpartyContext::default()
    }
}

fn apply_analysis(context: &mut CounterpartyContext, analysis: ConversationAnalysis) {
    context.name = analysis.name;
    context.organization = analysis.firm;
    context.relationship_stage = analysis.relationship_stage;
    context.sentiment_trend = analysis.sentiment_trend;
    context.key_interests = analysis.key_interests;
    context.objections_raised = analysis.objections_raised;
    context.questions_asked = analysis.questions_asked;
    context.materials_shared = analysis.materials_shared;
    context.next_action = analysis.next_action_suggested;
    context.summary = analysis.conversation_summary;
}

// ============================================================================
// Tests
// ============================================================================
