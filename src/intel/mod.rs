//! Qualitative intelligence layer.
//!
//! Everything that turns conversations into judgments: prompt rendering,
//! defensive parsing of oracle output, per-counterparty analysis,
//! outreach strategy generation, and the retrospective report.

pub mod analyze;
pub mod parse;
pub mod prompts;
pub mod report;
pub mod strategy;

pub use analyze::{analyze_conversation, ConversationAnalysisResult};
pub use parse::{parse_oracle_json, OracleOutcome};
pub use report::generate_retrospective;
pub use strategy::{generate_strategy, recommended_send_time, strategy_type_for};
