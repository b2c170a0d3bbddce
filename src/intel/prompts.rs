//! Prompt construction for the analysis oracle.
//!
//! Conversations are rendered into an annotated transcript (direction,
//! local timing context, elapsed gaps, attachment metadata) with all
//! content passed through the sanitizer first.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

use crate::sanitize::Sanitizer;
use crate::timing::weekday_name;
use crate::types::{
    ConversationGroup, CounterpartyContext, CounterpartyMap, EffectivenessMetrics, TimingProfile,
};

pub const ANALYSIS_SYSTEM: &str = "You are an expert fundraising advisor analyzing \
investor communications. Assess the relationship stage, sentiment, and substance of \
the conversation. Identifying details have been replaced with placeholders; treat \
each placeholder as a stable participant identity. Respond ONLY with a JSON object.";

pub const STRATEGY_SYSTEM: &str = "You are an expert fundraising strategist. Draft \
the next outreach message for this investor relationship, grounded in the \
conversation history provided. Respond ONLY with a JSON object.";

pub const REPORT_SYSTEM: &str = "You are an expert fundraising advisor writing a \
candid retrospective for a founder. Write in clear markdown prose, specific and \
practical, no filler.";

/// Render one conversation as an annotated, sanitized transcript.
pub fn render_conversation(group: &ConversationGroup, sanitizer: &mut Sanitizer) -> String {
    let mut out = String::new();
    let mut previous_ts: Option<DateTime<FixedOffset>> = None;
    for (i, msg) in group.messages.iter().enumerate() {
        let direction = if msg.is_outbound { "YOU" } else { "INVESTOR" };
        let ts = msg.timestamp;
        out.push_str(&format!("=== MESSAGE #{} ===\n", i + 1));
        out.push_str(&format!(
            "[{} {:02}:{:02} ({})] {}\n",
            ts.format("%Y-%m-%d"),
            ts.hour(),
            ts.minute(),
            capitalize(weekday_name(ts.weekday())),
            direction
        ));
        out.push_str(&format!(
            "Sent {} on a {}\n",
            time_of_day(ts.hour()),
            weekday_name(ts.weekday())
        ));
        if let Some(prev) = previous_ts {
            let hours = (ts - prev).num_seconds().max(0) as f64 / 3600.0;
            out.push_str(&format!("Elapsed since previous: {}\n", format_elapsed(hours)));
        }
        previous_ts = Some(ts);

        out.push_str(&format!("From: {}\n", sanitizer.scrub(&msg.sender)));
        out.push_str(&format!("To: {}\n", sanitizer.scrub(&msg.recipient)));
        if let Some(cc) = &msg.cc {
            out.push_str(&format!("CC: {}\n", sanitizer.scrub(cc)));
        }
        out.push_str(&format!("Subject: {}\n", sanitizer.scrub(&msg.subject)));
        out.push_str(&format!("Content:\n{}\n", sanitizer.scrub(&msg.body)));
        out.push_str(&format!(
            "[attachments: {}, length: {} chars]\n\n",
            if msg.has_attachments { "yes" } else { "no" },
            msg.body_len
        ));
    }
    out
}

/// Human-readable elapsed gap.
pub fn format_elapsed(hours: f64) -> String {
    if hours < 1.0 {
        format!("{} minutes", (hours * 60.0).round() as i64)
    } else if hours < 24.0 {
        format!("{:.1} hours", hours)
    } else {
        format!("{:.1} days", hours / 24.0)
    }
}

fn time_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "in the morning",
        12..=16 => "in the afternoon",
        17..=21 => "in the evening",
        _ => "late at night",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Prompt for the per-conversation qualitative analysis.
pub fn analysis_prompt(transcript: &str, business_context: &str) -> String {
    format!(
        "Business context: {business_context}\n\n\
         Conversation with one investor, oldest message first:\n\n\
         {transcript}\n\
         Analyze this relationship. Respond with a JSON object with exactly these keys:\n\
         {{\n\
           \"name\": \"investor name if evident, else empty string\",\n\
           \"firm\": \"firm name if evident, else empty string\",\n\
           \"relationship_stage\": \"cold|warm|engaged|interested|deferred|declined\",\n\
           \"sentiment_trend\": \"positive|neutral|negative\",\n\
           \"key_interests\": [\"...\"],\n\
           \"objections_raised\": [\"...\"],\n\
           \"questions_asked\": [\"...\"],\n\
           \"materials_shared\": [\"...\"],\n\
           \"next_action_suggested\": \"one concrete next step\",\n\
           \"conversation_summary\": \"2-3 sentences\"\n\
         }}"
    )
}

/// Prompt for generating the next outreach message for one counterparty.
pub fn strategy_prompt(
    context: &CounterpartyContext,
    profile: &TimingProfile,
    strategy_type: &str,
    business_context: &str,
) -> String {
    format!(
        "Business context: {business_context}\n\n\
         Investor relationship snapshot:\n\
         - Stage: {}\n\
         - Sentiment: {}\n\
         - Messages sent: {}, replies received: {} (reply rate {:.0}%)\n\
         - Typical response time: {:.1} hours\n\
         - Usually responds around {}:00 on a {}\n\
         - Key interests: {}\n\
         - Objections raised: {}\n\
         - Open questions: {}\n\
         - Summary: {}\n\n\
         Recommended approach: {strategy_type}\n\n\
         Draft the next outreach. Respond with a JSON object with exactly these keys:\n\
         {{\n\
           \"email_draft\": \"complete message body\",\n\
           \"secondary_message\": \"optional short follow-up, or null\",\n\
           \"reasoning\": \"why this approach\",\n\
           \"expected_response_rate\": 0.0,\n\
           \"channel_sequence\": [\"email\"],\n\
           \"optimal_timing\": \"immediate|within_6h|within_24h|within_week\",\n\
           \"personalization_score\": 0.0\n\
         }}",
        context.relationship_stage,
        context.sentiment_trend.as_str(),
        context.messages_sent,
        context.replies_received,
        context.reply_rate * 100.0,
        profile.avg_response_hours,
        profile.preferred_hour,
        profile.preferred_day,
        join_or_none(&context.key_interests),
        join_or_none(&context.objections_raised),
        join_or_none(&context.questions_asked),
        context.summary,
    )
}

/// Retrospective prompt for a run that touched exactly one relationship.
pub fn single_report_prompt(
    context: &CounterpartyContext,
    profile: &TimingProfile,
    business_context: &str,
) -> String {
    format!(
        "Business context: {business_context}\n\n\
         Write a retrospective on ONE specific investor relationship.\n\n\
         - Identity: {}\n\
         - Stage: {}, sentiment: {}\n\
         - Messages sent: {}, replies received: {}\n\
         - Typical response time: {:.1} hours, usually around {}:00 on a {}\n\
         - Key interests: {}\n\
         - Objections raised: {}\n\
         - Summary: {}\n\n\
         Cover: where this relationship stands, what has worked, what has not, \
         the biggest risk to the deal, and the single most valuable next move. \
         Markdown, under 500 words.",
        context.identity,
        context.relationship_stage,
        context.sentiment_trend.as_str(),
        context.messages_sent,
        context.replies_received,
        profile.avg_response_hours,
        profile.preferred_hour,
        profile.preferred_day,
        join_or_none(&context.key_interests),
        join_or_none(&context.objections_raised),
        context.summary,
    )
}

/// Retrospective prompt across the whole portfolio.
pub fn portfolio_report_prompt(
    contexts: &CounterpartyMap<CounterpartyContext>,
    metrics: &EffectivenessMetrics,
    business_context: &str,
) -> String {
    let mut stage_counts: std::collections::BTreeMap<&str, usize> =
        std::collections::BTreeMap::new();
    for ctx in contexts.values() {
        *stage_counts.entry(ctx.relationship_stage.as_str()).or_default() += 1;
    }
    let stage_lines: Vec<String> = stage_counts
        .iter()
        .map(|(stage, count)| format!("- {stage}: {count}"))
        .collect();

    format!(
        "Business context: {business_context}\n\n\
         Write a retrospective across the investor portfolio.\n\n\
         Portfolio: {} conversations, {} active\n\
         Overall reply rate: {:.0}%\n\
         Positive sentiment: {:.0}%\n\
         {}\n\
         Relationships by stage:\n{}\n\n\
         Cover: overall momentum, which stages need attention, patterns in \
         objections, and the three highest-leverage next moves. Markdown, \
         under 800 words.",
        metrics.total_conversations,
        metrics.active_conversations,
        metrics.overall_reply_rate * 100.0,
        metrics.positive_sentiment_rate * 100.0,
        match metrics.avg_response_hours {
            Some(h) => format!("Average response time: {h:.1} hours"),
            None => "Average response time: unmeasured".to_string(),
        },
        stage_lines.join("\n"),
    )
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none noted".to_string()
    } else {
        items.join("; ")
    }
}

// ============================================================================
// Tests
// ============================================================================
