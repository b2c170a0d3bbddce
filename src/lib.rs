//! Conversation intelligence for fundraising outreach.
//!
//! One run pulls recent investor correspondence from a mailbox, groups
//! it into per-counterparty conversations, measures response timing,
//! asks an analysis oracle for a qualitative read on each relationship,
//! and produces outreach strategies plus a narrative retrospective.
//! Failures degrade rather than abort: every run finishes, carrying its
//! errors as data.
//!
//! Entry point is [`pipeline::Pipeline`], wired with a [`mail::MailSource`]
//! and an [`oracle::AnalysisOracle`].

pub mod effectiveness;
pub mod error;
pub mod group;
pub mod intel;
pub mod mail;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod sanitize;
pub mod timing;
pub mod types;

pub use error::StageError;
pub use pipeline::{Pipeline, RunState, Stage};
pub use types::{
    CampaignStrategy, ConversationGroup, CounterpartyContext, EffectivenessMetrics,
    MessageRecord, RelationshipStage, RunParams, SentimentTrend, StrategyType, TimingProfile,
};
