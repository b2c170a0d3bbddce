//! Narrative retrospective generation.

use crate::oracle::AnalysisOracle;
use crate::types::{CounterpartyContext, CounterpartyMap, EffectivenessMetrics, TimingProfile};

use super::prompts;

/// Generate the closing retrospective for a run.
///
/// A run that touched exactly one relationship gets a focused
/// single-relationship report; anything else gets the portfolio view.
/// Returns the markdown plus the failure reason when the oracle call
/// failed and the report is a stub.
pub async fn generate_retrospective(
    oracle: &dyn AnalysisOracle,
    contexts: &CounterpartyMap<CounterpartyContext>,
    profiles: &CounterpartyMap<TimingProfile>,
    metrics: &EffectivenessMetrics,
    business_context: &str,
) -> (String, Option<String>) {
    let single = if contexts.len() == 1 {
        contexts.iter().next()
    } else {
        None
    };

    let (title, prompt) = match single {
        Some((identity, context)) => {
            let default_profile = TimingProfile::default();
            let profile = profiles.get(identity).unwrap_or(&default_profile);
            (
                "# Relationship Retrospective",
                prompts::single_report_prompt(context, profile, business_context),
            )
        }
        None => (
            "# Fundraising Retrospective",
            prompts::portfolio_report_prompt(contexts, metrics, business_context),
        ),
    };

    match oracle.analyze(prompts::REPORT_SYSTEM, &prompt).await {
        Ok(body) => (format!("{title}\n\n{}", body.trim()), None),
        Err(e) => {
            log::warn!("retrospective generation failed: {e}");
            (
                format!("{title}\n\n**Report generation failed:** {e}"),
                Some(e.to_string()),
            )
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct RecordingOracle {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingOracle {
        fn new(fail: bool) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl AnalysisOracle for RecordingOracle {
        async fn analyze(&self, _system: &str, user: &str) -> Result<String, OracleError> {
            self.prompts.lock().unwrap().push(user.to_string());
            if self.fail {
                Err(OracleError::EmptyResponse)
            } else {
                Ok("Solid quarter of outreach.".to_string())
            }
        }
    }

    fn one_context() -> CounterpartyMap<CounterpartyContext> {
        let mut contexts = HashMap::new();
        contexts.insert(
            "jane@nimbus.vc".to_string(),
            CounterpartyContext {
                identity: "jane@nimbus.vc".to_string(),
                ..CounterpartyContext::default()
            },
        );
        contexts
    }

    #[tokio::test]
    async fn test_single_relationship_gets_focused_report() {
        let oracle = RecordingOracle::new(false);
        let (report, failure) = generate_retrospective(
            &oracle,
            &one_context(),
            &HashMap::new(),
            &EffectivenessMetrics::default(),
            "seed raise",
        )
        .await;

        assert!(failure.is_none());
        assert!(report.starts_with("# Relationship Retrospective"));
        assert!(report.contains("Solid quarter of outreach."));
        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts[0].contains("ONE specific investor relationship"));
    }

    #[tokio::test]
    async fn test_portfolio_report_for_many() {
        let mut contexts = one_context();
        contexts.insert(
            "raj@vertexcap.com".to_string(),
            CounterpartyContext {
                identity: "raj@vertexcap.com".to_string(),
                ..CounterpartyContext::default()
            },
        );
        let oracle = RecordingOracle::new(false);
        let (report, failure) = generate_retrospective(
            &oracle,
            &contexts,
            &HashMap::new(),
            &EffectivenessMetrics {
                total_conversations: 2,
                ..EffectivenessMetrics::default()
            },
            "seed raise",
        )
        .await;

        assert!(failure.is_none());
        assert!(report.starts_with("# Fundraising Retrospective"));
        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts[0].contains("investor portfolio"));
    }

    #[tokio::test]
    async fn test_empty_portfolio_takes_portfolio_branch() {
        let oracle = RecordingOracle::new(false);
        let (report, _) = generate_retrospective(
            &oracle,
            &HashMap::new(),
            &HashMap::new(),
            &EffectivenessMetrics::default(),
            "seed raise",
        )
        .await;
        assert!(report.starts_with("# Fundraising Retrospective"));
    }

    #[tokio::test]
    async fn test_failure_produces_stub() {
        let oracle = RecordingOracle::new(true);
        let (report, failure) = generate_retrospective(
            &oracle,
            &one_context(),
            &HashMap::new(),
            &EffectivenessMetrics::default(),
            "seed raise",
        )
        .await;

        assert!(report.contains("**Report generation failed:**"));
        assert!(failure.unwrap().contains("empty response"));
    }
}
