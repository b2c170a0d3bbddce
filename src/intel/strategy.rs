//! Outreach strategy generation.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::oracle::AnalysisOracle;
use crate::types::{CampaignStrategy, CounterpartyContext, RelationshipStage, StrategyType, TimingProfile};

use super::parse::{parse_oracle_json, OracleOutcome, StrategyResponse};
use super::prompts;

/// Pick the outreach approach from relationship state.
///
/// Order matters: a cold or declined stage overrides the engagement
/// heuristics below it, and a deferred thread that never got a reply is
/// re-engaged rather than followed up.
pub fn strategy_type_for(
    stage: RelationshipStage,
    sent: usize,
    received: usize,
) -> StrategyType {
    match stage {
        RelationshipStage::Cold | RelationshipStage::Unknown => StrategyType::ColdOutreach,
        RelationshipStage::Declined => StrategyType::ReEngagement,
        _ if received == 0 && sent > 0 => StrategyType::ReEngagement,
        RelationshipStage::Warm | RelationshipStage::Engaged | RelationshipStage::Interested => {
            StrategyType::MilestoneUpdate
        }
        RelationshipStage::Deferred | RelationshipStage::Closed => StrategyType::FollowUp,
    }
}

/// Days to wait for each oracle timing keyword.
pub fn timing_offset_days(keyword: &str) -> f64 {
    match keyword {
        "immediate" => 0.0,
        "within_6h" => 0.25,
        "within_24h" => 1.0,
        "within_week" => 7.0,
        _ => 1.0,
    }
}

/// Compute the send time: now plus the timing offset, shifted to the
/// counterparty's preferred response hour, then clamped so a recently
/// active thread is never left cold for more than a week.
pub fn recommended_send_time(
    now: DateTime<Utc>,
    last_contact: Option<DateTime<Utc>>,
    timing_keyword: &str,
    profile: &TimingProfile,
) -> DateTime<Utc> {
    let offset_days = timing_offset_days(timing_keyword);
    let mut send_at = now + Duration::seconds((offset_days * 86_400.0) as i64);

    if offset_days >= 1.0 {
        send_at = send_at
            .with_hour(profile.preferred_hour.min(23))
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .unwrap_or(send_at);
    }

    if let Some(last) = last_contact {
        let ceiling = last + Duration::days(7);
        if last > now - Duration::days(7) && send_at > ceiling {
            send_at = ceiling;
        }
    }
    if send_at < now {
        send_at = now;
    }
    send_at
}

/// Generate the next outreach strategy for one counterparty.
pub async fn generate_strategy(
    oracle: &dyn AnalysisOracle,
    context: &CounterpartyContext,
    profile: &TimingProfile,
    business_context: &str,
    now: DateTime<Utc>,
) -> Result<CampaignStrategy, String> {
    let strategy_type = strategy_type_for(
        context.relationship_stage,
        context.messages_sent,
        context.replies_received,
    );
    let prompt = prompts::strategy_prompt(
        context,
        profile,
        strategy_type.as_str(),
        business_context,
    );

    let response = oracle
        .analyze(prompts::STRATEGY_SYSTEM, &prompt)
        .await
        .map_err(|e| e.to_string())?;
    let parsed: StrategyResponse = match parse_oracle_json(&response) {
        OracleOutcome::Parsed(p) => p,
        OracleOutcome::Fallback { reason } => return Err(reason),
    };

    let last_contact = context.last_contact.map(|t| t.with_timezone(&Utc));
    let send_at = recommended_send_time(now, last_contact, &parsed.optimal_timing, profile);

    let channel_sequence = if parsed.channel_sequence.is_empty() {
        vec!["email".to_string()]
    } else {
        parsed.channel_sequence
    };

    Ok(CampaignStrategy {
        counterparty: context.identity.clone(),
        strategy_type,
        send_at,
        draft: parsed.email_draft,
        secondary_message: parsed.secondary_message,
        reasoning: parsed.reasoning,
        confidence: (parsed.personalization_score / 10.0).clamp(0.0, 1.0),
        expected_response_rate: parsed.expected_response_rate.clamp(0.0, 1.0),
        channel_sequence,
    })
}

// ============================================================================
// Tests
// ============================================================================
