//! Pipeline orchestration.
//!
//! One run walks a fixed stage sequence over an owned [`RunState`].
//! Stage failures are captured as data in `state.errors`; a run always
//! reaches [`Stage::Done`] with whatever it managed to produce.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::effectiveness;
use crate::error::StageError;
use crate::group::group_by_counterparty;
use crate::intel::{analyze_conversation, generate_retrospective, generate_strategy};
use crate::mail::{MailSource, RawMessage};
use crate::normalize::normalize_message;
use crate::oracle::AnalysisOracle;
use crate::sanitize::Sanitizer;
use crate::timing::extract_timing;
use crate::types::{
    CampaignStrategy, ConversationGroup, CounterpartyContext, CounterpartyMap,
    EffectivenessMetrics, MessageRecord, RunParams, TimingProfile,
};

/// Search clause restricting the mailbox scan to fundraising traffic.
const FUNDRAISING_CLAUSE: &str = "(investor OR investment OR funding OR fundraising OR \
\"pitch deck\" OR \"term sheet\" OR \"due diligence\" OR valuation OR \"cap table\" OR \
\"seed round\" OR \"series a\")";

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Fetch,
    Group,
    AnalyzeConversations,
    ExtractTiming,
    AggregateEffectiveness,
    GenerateStrategies,
    GenerateRetrospective,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Fetch => "fetch",
            Self::Group => "group",
            Self::AnalyzeConversations => "analyze_conversations",
            Self::ExtractTiming => "extract_timing",
            Self::AggregateEffectiveness => "aggregate_effectiveness",
            Self::GenerateStrategies => "generate_strategies",
            Self::GenerateRetrospective => "generate_retrospective",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All state accumulated by one run.
#[derive(Debug)]
pub struct RunState {
    pub params: RunParams,
    pub raw_messages: Vec<RawMessage>,
    pub records: Vec<MessageRecord>,
    pub groups: CounterpartyMap<ConversationGroup>,
    pub contexts: CounterpartyMap<CounterpartyContext>,
    pub profiles: CounterpartyMap<TimingProfile>,
    pub metrics: EffectivenessMetrics,
    pub strategies: Vec<CampaignStrategy>,
    pub retrospective: String,
    pub stage: Stage,
    /// Stage errors in occurrence order; never fatal to the run.
    pub errors: Vec<String>,
    sanitizer: Sanitizer,
}

impl RunState {
    fn new(params: RunParams) -> Self {
        Self {
            params,
            raw_messages: Vec::new(),
            records: Vec::new(),
            groups: Default::default(),
            contexts: Default::default(),
            profiles: Default::default(),
            metrics: EffectivenessMetrics::default(),
            strategies: Vec::new(),
            retrospective: String::new(),
            stage: Stage::Init,
            errors: Vec::new(),
            sanitizer: Sanitizer::new(),
        }
    }

    fn record_error(&mut self, err: StageError) {
        log::warn!("{} stage: {err}", self.stage);
        self.errors.push(err.to_string());
    }
}

/// The conversation intelligence pipeline.
pub struct Pipeline {
    mail: Arc<dyn MailSource>,
    oracle: Arc<dyn AnalysisOracle>,
}

impl Pipeline {
    pub fn new(mail: Arc<dyn MailSource>, oracle: Arc<dyn AnalysisOracle>) -> Self {
        Self { mail, oracle }
    }

    /// Execute one full run. Always returns a state at [`Stage::Done`].
    pub async fn run(&self, params: RunParams) -> RunState {
        let mut state = RunState::new(params);
        log::info!(
            "starting run for {} ({} day lookback)",
            state.params.mailbox,
            state.params.lookback_days
        );

        state.stage = Stage::Fetch;
        if let Err(e) = self.fetch(&mut state).await {
            // the remaining stages run over empty data and still produce
            // a zero-portfolio retrospective
            state.record_error(e);
        }

        state.stage = Stage::Group;
        self.group(&mut state);

        state.stage = Stage::AnalyzeConversations;
        self.analyze(&mut state).await;

        state.stage = Stage::ExtractTiming;
        for (identity, group) in &state.groups {
            state.profiles.insert(identity.clone(), extract_timing(group));
        }

        state.stage = Stage::AggregateEffectiveness;
        state.metrics = effectiveness::aggregate(&state.contexts, &state.profiles);

        state.stage = Stage::GenerateStrategies;
        self.strategies(&mut state).await;

        state.stage = Stage::GenerateRetrospective;
        let (report, failure) = generate_retrospective(
            self.oracle.as_ref(),
            &state.contexts,
            &state.profiles,
            &state.metrics,
            &state.params.business_context,
        )
        .await;
        state.retrospective = report;
        if let Some(reason) = failure {
            state.record_error(StageError::Retrospective { reason });
        }

        state.stage = Stage::Done;
        log::info!(
            "run finished: {} conversations, {} strategies, {} errors",
            state.contexts.len(),
            state.strategies.len(),
            state.errors.len()
        );
        state
    }

    /// Search the mailbox and fetch message payloads. Per-message fetch
    /// failures are skipped; a failed search leaves the run with no
    /// messages and one error entry.
    async fn fetch(&self, state: &mut RunState) -> Result<(), StageError> {
        let params = &state.params;
        let cutoff = Utc::now() - Duration::days(params.lookback_days);
        let query = format!(
            "after:{} (from:{} OR to:{}) {}",
            cutoff.format("%Y/%m/%d"),
            params.operator,
            params.operator,
            FUNDRAISING_CLAUSE
        );
        log::debug!("mailbox query: {query}");

        let ids = self
            .mail
            .search(&params.mailbox, &query, params.search_limit)
            .await
            .map_err(|e| StageError::Search {
                reason: e.to_string(),
            })?;
        log::info!("search matched {} messages", ids.len());

        for id in ids.iter().take(params.fetch_limit) {
            match self.mail.fetch(&params.mailbox, id).await {
                Ok(raw) => state.raw_messages.push(raw),
                Err(e) => log::debug!("skipping message {id}: {e}"),
            }
        }
        Ok(())
    }

    fn group(&self, state: &mut RunState) {
        let mut records = Vec::with_capacity(state.raw_messages.len());
        for raw in &state.raw_messages {
            match normalize_message(raw, &state.params.operator) {
                Ok(record) => records.push(record),
                Err(e) => {
                    let err = StageError::Ingestion {
                        message_id: raw.id.clone(),
                        reason: e.to_string(),
                    };
                    log::warn!("{} stage: {err}", state.stage);
                    state.errors.push(err.to_string());
                }
            }
        }
        state.records = records;
        state.groups = group_by_counterparty(state.records.clone(), &state.params.operator);
        log::info!(
            "{} messages across {} conversations",
            state.records.len(),
            state.groups.len()
        );
    }

    /// Analyze each conversation; one failed counterparty never blocks
    /// the rest.
    async fn analyze(&self, state: &mut RunState) {
        let mut identities: Vec<String> = state.groups.keys().cloned().collect();
        identities.sort();

        for identity in identities {
            let group = state.groups[&identity].clone();
            let result = analyze_conversation(
                self.oracle.as_ref(),
                &group,
                &mut state.sanitizer,
                &state.params.business_context,
            )
            .await;
            if let Some(reason) = result.failure {
                state.errors.push(
                    StageError::Analysis {
                        counterparty: identity.clone(),
                        reason,
                    }
                    .to_string(),
                );
            }
            state.contexts.insert(identity, result.context);
        }
    }

    async fn strategies(&self, state: &mut RunState) {
        let mut identities: Vec<String> = state.contexts.keys().cloned().collect();
        identities.sort();
        let now = Utc::now();

        for identity in identities {
            let context = &state.contexts[&identity];
            let default_profile = TimingProfile::default();
            let profile = state.profiles.get(&identity).unwrap_or(&default_profile);
            match generate_strategy(
                self.oracle.as_ref(),
                context,
                profile,
                &state.params.business_context,
                now,
            )
            .await
            {
                Ok(strategy) => state.strategies.push(strategy),
                Err(reason) => state.errors.push(
                    StageError::Strategy {
                        counterparty: identity.clone(),
                        reason,
                    }
                    .to_string(),
                ),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{MailSourceError, RawBody, RawHeader, RawPayload};
    use crate::oracle::OracleError;
    use async_trait::async_trait;
    use base64::Engine;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockMailSource {
        messages: HashMap<String, RawMessage>,
        fail_search: bool,
    }

    impl MockMailSource {
        fn new(messages: Vec<RawMessage>) -> Self {
            Self {
                messages: messages.into_iter().map(|m| (m.id.clone(), m)).collect(),
                fail_search: false,
            }
        }
    }

    #[async_trait]
    impl MailSource for MockMailSource {
        async fn search(
            &self,
            _mailbox: &str,
            _query: &str,
            _limit: u32,
        ) -> Result<Vec<String>, MailSourceError> {
            if self.fail_search {
                return Err(MailSourceError::AuthExpired);
            }
            let mut ids: Vec<String> = self.messages.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        }

        async fn fetch(&self, _mailbox: &str, id: &str) -> Result<RawMessage, MailSourceError> {
            self.messages
                .get(id)
                .cloned()
                .ok_or_else(|| MailSourceError::NotFound(id.to_string()))
        }
    }

    struct MockOracle {
        prompts: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl MockOracle {
        fn new(fail: bool) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl AnalysisOracle for MockOracle {
        async fn analyze(&self, system: &str, user: &str) -> Result<String, OracleError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            if self.fail {
                return Err(OracleError::Transport("connection refused".to_string()));
            }
            if system.contains("strategist") {
                Ok(r#"{
                    "email_draft": "Quick update on our progress.",
                    "reasoning": "Keeps momentum.",
                    "expected_response_rate": 0.5,
                    "optimal_timing": "within_24h",
                    "personalization_score": 7.0
                }"#
                .to_string())
            } else if system.contains("retrospective") {
                Ok("Momentum is building across the portfolio.".to_string())
            } else {
                Ok(r#"{
                    "name": "Jane Ruiz",
                    "firm": "Nimbus Ventures",
                    "relationship_stage": "warm",
                    "sentiment_trend": "positive",
                    "conversation_summary": "Good early traction."
                }"#
                .to_string())
            }
        }
    }

    fn raw(id: &str, from: &str, to: &str, date: &str, body: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            thread_id: format!("t-{id}"),
            snippet: String::new(),
            label_ids: vec![],
            payload: Some(RawPayload {
                mime_type: "text/plain".to_string(),
                headers: vec![
                    RawHeader {
                        name: "From".to_string(),
                        value: from.to_string(),
                    },
                    RawHeader {
                        name: "To".to_string(),
                        value: to.to_string(),
                    },
                    RawHeader {
                        name: "Subject".to_string(),
                        value: "Seed round".to_string(),
                    },
                    RawHeader {
                        name: "Date".to_string(),
                        value: date.to_string(),
                    },
                ],
                body: Some(RawBody {
                    data: Some(
                        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(body),
                    ),
                }),
                ..Default::default()
            }),
        }
    }

    const OP: &str = "founder@acme.io";

    fn two_counterparty_messages() -> Vec<RawMessage> {
        vec![
            raw(
                "m1",
                OP,
                "jane@nimbus.vc",
                "Mon, 5 Jan 2026 09:00:00 +0000",
                "Sharing our deck.",
            ),
            raw(
                "m2",
                "jane@nimbus.vc",
                OP,
                "Mon, 5 Jan 2026 11:00:00 +0000",
                "Looks interesting, send metrics.",
            ),
            raw(
                "m3",
                OP,
                "raj@vertexcap.com",
                "Tue, 6 Jan 2026 10:00:00 +0000",
                "Would love to connect.",
            ),
        ]
    }

    fn pipeline(mail: MockMailSource, oracle: MockOracle) -> (Pipeline, Arc<MockOracle>) {
        let oracle = Arc::new(oracle);
        (
            Pipeline::new(Arc::new(mail), oracle.clone()),
            oracle,
        )
    }

    #[tokio::test]
    async fn test_happy_path_reaches_done_with_no_errors() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (pipeline, _) = pipeline(
            MockMailSource::new(two_counterparty_messages()),
            MockOracle::new(false),
        );
        let state = pipeline.run(RunParams::new("me", OP)).await;

        assert_eq!(state.stage, Stage::Done);
        assert!(state.errors.is_empty(), "errors: {:?}", state.errors);
        assert_eq!(state.records.len(), 3);
        assert_eq!(state.contexts.len(), 2);
        assert_eq!(state.profiles.len(), 2);
        assert_eq!(state.strategies.len(), 2);
        assert!(state.retrospective.starts_with("# Fundraising Retrospective"));
        assert_eq!(state.metrics.total_conversations, 2);

        let jane = &state.contexts["jane@nimbus.vc"];
        assert_eq!(jane.name, "Jane Ruiz");
        assert!((state.profiles["jane@nimbus.vc"].avg_response_hours - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_oracle_failures_degrade_not_abort() {
        let (pipeline, _) = pipeline(
            MockMailSource::new(two_counterparty_messages()),
            MockOracle::new(true),
        );
        let state = pipeline.run(RunParams::new("me", OP)).await;

        assert_eq!(state.stage, Stage::Done);
        // 2 analysis + 2 strategy + 1 retrospective
        assert_eq!(state.errors.len(), 5);
        assert_eq!(state.contexts.len(), 2);
        assert!(state.strategies.is_empty());
        assert!(state.retrospective.contains("**Report generation failed:**"));
        for ctx in state.contexts.values() {
            assert_eq!(ctx.relationship_stage, crate::types::RelationshipStage::Unknown);
            assert!(ctx.messages_sent + ctx.replies_received > 0);
        }
    }

    #[tokio::test]
    async fn test_search_failure_still_runs_remaining_stages() {
        let mut mail = MockMailSource::new(vec![]);
        mail.fail_search = true;
        let (pipeline, _) = pipeline(mail, MockOracle::new(false));
        let state = pipeline.run(RunParams::new("me", OP)).await;

        assert_eq!(state.stage, Stage::Done);
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].contains("Mail search failed"));
        assert!(state.contexts.is_empty());
        assert!(state.strategies.is_empty());
        assert_eq!(state.metrics, EffectivenessMetrics::default());
        // the zero-portfolio retrospective is still generated
        assert!(state.retrospective.starts_with("# Fundraising Retrospective"));
        assert!(state.retrospective.contains("Momentum is building"));
    }

    #[tokio::test]
    async fn test_single_counterparty_gets_focused_retrospective() {
        let messages = vec![
            raw(
                "m1",
                OP,
                "jane@nimbus.vc",
                "Mon, 5 Jan 2026 09:00:00 +0000",
                "Sharing our deck.",
            ),
            raw(
                "m2",
                "jane@nimbus.vc",
                OP,
                "Mon, 5 Jan 2026 11:00:00 +0000",
                "Thanks, reviewing now.",
            ),
        ];
        let (pipeline, oracle) =
            pipeline(MockMailSource::new(messages), MockOracle::new(false));
        let state = pipeline.run(RunParams::new("me", OP)).await;

        assert!(state.retrospective.starts_with("# Relationship Retrospective"));
        let prompts = oracle.prompts.lock().unwrap();
        let report_prompt = prompts
            .iter()
            .find(|(system, _)| system.contains("retrospective"))
            .map(|(_, user)| user.clone())
            .unwrap();
        assert!(report_prompt.contains("ONE specific investor relationship"));
    }

    #[tokio::test]
    async fn test_malformed_message_skipped_with_error() {
        let mut messages = two_counterparty_messages();
        messages.push(RawMessage {
            id: "broken".to_string(),
            ..Default::default()
        });
        let (pipeline, _) = pipeline(MockMailSource::new(messages), MockOracle::new(false));
        let state = pipeline.run(RunParams::new("me", OP)).await;

        assert_eq!(state.stage, Stage::Done);
        assert_eq!(state.records.len(), 3);
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].contains("broken"));
        assert_eq!(state.contexts.len(), 2);
    }

    #[tokio::test]
    async fn test_double_run_is_clean_both_times() {
        let (pipeline, _) = pipeline(
            MockMailSource::new(two_counterparty_messages()),
            MockOracle::new(false),
        );

        let first = pipeline.run(RunParams::new("me", OP)).await;
        let second = pipeline.run(RunParams::new("me", OP)).await;

        assert!(first.errors.is_empty(), "first run: {:?}", first.errors);
        assert!(second.errors.is_empty(), "second run: {:?}", second.errors);
        assert_eq!(first.contexts.len(), second.contexts.len());
        assert_eq!(first.strategies.len(), second.strategies.len());
        assert_eq!(first.metrics, second.metrics);
    }

    #[tokio::test]
    async fn test_fetch_limit_caps_messages() {
        let (pipeline, _) = pipeline(
            MockMailSource::new(two_counterparty_messages()),
            MockOracle::new(false),
        );
        let mut params = RunParams::new("me", OP);
        params.fetch_limit = 2;
        let state = pipeline.run(params).await;
        assert_eq!(state.raw_messages.len(), 2);
    }

    #[test]
    fn test_stage_serde_names() {
        assert_eq!(
            serde_json::to_string(&Stage::AnalyzeConversations).unwrap(),
            "\"analyze_conversations\""
        );
        assert_eq!(Stage::Done.as_str(), "done");
    }
}
