//! Core data model for the conversation intelligence pipeline.
//!
//! Everything here is plain data: normalized messages, per-counterparty
//! conversation groups, analysis contexts, timing profiles, and generated
//! campaign strategies. Records are created by one pipeline stage and never
//! mutated by later ones (state accumulates monotonically).

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Run parameters
// ============================================================================

/// Caller-supplied parameters for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParams {
    /// Mailbox to analyze (passed through to the mail source).
    pub mailbox: String,
    /// The operator's own address — used to classify outbound vs inbound.
    pub operator: String,
    /// Free-text business context included in every oracle prompt.
    #[serde(default)]
    pub business_context: String,
    /// Lookback window for the mail search, in days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Maximum message ids requested from the mail source search.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    /// Maximum messages actually fetched and normalized per run.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

fn default_lookback_days() -> i64 {
    30
}

fn default_search_limit() -> u32 {
    500
}

fn default_fetch_limit() -> usize {
    100
}

impl RunParams {
    pub fn new(mailbox: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            mailbox: mailbox.into(),
            operator: operator.into(),
            business_context: String::new(),
            lookback_days: default_lookback_days(),
            search_limit: default_search_limit(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

// ============================================================================
// Messages and conversations
// ============================================================================

/// One normalized email message. Immutable after normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub thread_id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    /// Always sortable — the normalizer guarantees a timezone-carrying value.
    pub timestamp: DateTime<FixedOffset>,
    pub subject: String,
    pub body: String,
    pub snippet: String,
    /// True iff the sender header matches the operator's mailbox.
    pub is_outbound: bool,
    /// Derived from subject prefix or an In-Reply-To reference.
    pub is_reply: bool,
    pub has_attachments: bool,
    /// Byte length of the extracted body.
    pub body_len: usize,
}

/// All messages exchanged with one counterparty, ascending by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationGroup {
    /// Lowercased counterparty address. Never the operator's own mailbox.
    pub counterparty: String,
    pub messages: Vec<MessageRecord>,
}

impl ConversationGroup {
    pub fn sent_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_outbound).count()
    }

    pub fn received_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_outbound).count()
    }

    pub fn last_contact(&self) -> Option<DateTime<FixedOffset>> {
        self.messages.last().map(|m| m.timestamp)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Funnel progress with one counterparty.
///
/// `#[serde(other)]` maps any unrecognized oracle output to `Unknown` rather
/// than failing the parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStage {
    Cold,
    Warm,
    Engaged,
    Interested,
    Declined,
    Deferred,
    Closed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RelationshipStage {
    /// Stages counted as "actively engaged" by the effectiveness rollup.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Warm | Self::Engaged | Self::Interested)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Warm => "warm",
            Self::Engaged => "engaged",
            Self::Interested => "interested",
            Self::Declined => "declined",
            Self::Deferred => "deferred",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RelationshipStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall sentiment direction across a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SentimentTrend {
    Positive,
    Negative,
    #[default]
    #[serde(other)]
    Neutral,
}

impl SentimentTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// Outreach strategy category, selected by the decision table in
/// [`crate::intel::strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    ColdOutreach,
    FollowUp,
    ReEngagement,
    MilestoneUpdate,
}

impl StrategyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColdOutreach => "cold_outreach",
            Self::FollowUp => "follow_up",
            Self::ReEngagement => "re_engagement",
            Self::MilestoneUpdate => "milestone_update",
        }
    }
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Per-counterparty results
// ============================================================================

/// Accumulating per-counterparty analysis record.
///
/// Created with mechanical counts when a conversation is first analyzed;
/// qualitative fields are filled from the oracle response and default to
/// empty values when the oracle fails or omits them. Re-populated
/// idempotently on re-runs (last write wins per field).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartyContext {
    /// Lowercased counterparty address.
    pub identity: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub relationship_stage: RelationshipStage,
    #[serde(default)]
    pub sentiment_trend: SentimentTrend,
    #[serde(default)]
    pub messages_sent: usize,
    #[serde(default)]
    pub replies_received: usize,
    /// received / sent; 0.0 when sent is 0.
    #[serde(default)]
    pub reply_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_response_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contact: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objections_raised: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions_asked: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials_shared: Vec<String>,
    #[serde(default)]
    pub next_action: String,
    #[serde(default)]
    pub summary: String,
}

/// Observed reply-timing behavior for one counterparty.
///
/// Derived entirely from the conversation group; recomputed fresh each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingProfile {
    /// Mode of observed reply hours (0-23).
    pub preferred_hour: u32,
    /// Mode of observed reply weekdays, lowercased English name.
    pub preferred_day: String,
    pub avg_response_hours: f64,
    pub total_replies: usize,
    /// Inbound messages / all messages, in [0.0, 1.0].
    pub response_rate: f64,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self {
            preferred_hour: 10,
            preferred_day: "tuesday".to_string(),
            avg_response_hours: 24.0,
            total_replies: 0,
            response_rate: 0.0,
        }
    }
}

// ============================================================================
// Generated outputs
// ============================================================================

/// One generated outreach artifact. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStrategy {
    pub counterparty: String,
    pub strategy_type: StrategyType,
    /// Absolute recommended send time.
    pub send_at: DateTime<Utc>,
    /// Primary outreach draft.
    pub draft: String,
    /// Optional secondary-channel message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_message: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    /// In [0.0, 1.0].
    pub confidence: f64,
    /// In [0.0, 1.0].
    pub expected_response_rate: f64,
    /// Ordered, non-empty; e.g. `["email"]` or `["email", "secondary_channel"]`.
    pub channel_sequence: Vec<String>,
}

/// Pipeline-wide effectiveness rollup. All zeros on empty input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessMetrics {
    /// Total received / total sent across all counterparties, zero-guarded.
    pub overall_reply_rate: f64,
    pub total_conversations: usize,
    /// Conversations in an actively engaged stage (warm/engaged/interested).
    pub active_conversations: usize,
    /// Fraction of counterparties with a positive sentiment trend.
    pub positive_sentiment_rate: f64,
    /// Mean of measured per-counterparty response latencies, where measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_response_hours: Option<f64>,
}

/// Counterparty identity → value maps shared between stages.
pub type CounterpartyMap<T> = HashMap<String, T>;

// ============================================================================
// Tests
// ============================================================================
