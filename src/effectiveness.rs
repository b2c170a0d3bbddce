//! Portfolio-level effectiveness aggregation.

use crate::types::{
    CounterpartyContext, CounterpartyMap, EffectivenessMetrics, SentimentTrend, TimingProfile,
};

/// Aggregate per-counterparty results into portfolio metrics.
///
/// Pure and division-guarded; an empty portfolio yields all zeroes.
pub fn aggregate(
    contexts: &CounterpartyMap<CounterpartyContext>,
    profiles: &CounterpartyMap<TimingProfile>,
) -> EffectivenessMetrics {
    let total = contexts.len();
    if total == 0 {
        return EffectivenessMetrics::default();
    }

    let total_sent: usize = contexts.values().map(|c| c.messages_sent).sum();
    let total_replies: usize = contexts.values().map(|c| c.replies_received).sum();
    let active = contexts
        .values()
        .filter(|c| c.relationship_stage.is_active())
        .count();
    let positive = contexts
        .values()
        .filter(|c| c.sentiment_trend == SentimentTrend::Positive)
        .count();

    let measured: Vec<f64> = profiles
        .values()
        .filter(|p| p.total_replies > 0)
        .map(|p| p.avg_response_hours)
        .collect();
    let avg_response_hours = if measured.is_empty() {
        None
    } else {
        Some(measured.iter().sum::<f64>() / measured.len() as f64)
    };

    EffectivenessMetrics {
        overall_reply_rate: if total_sent > 0 {
            total_replies as f64 / total_sent as f64
        } else {
            0.0
        },
        total_conversations: total,
        active_conversations: active,
        positive_sentiment_rate: positive as f64 / total as f64,
        avg_response_hours,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelationshipStage;
    use std::collections::HashMap;

    fn ctx(
        stage: RelationshipStage,
        sentiment: SentimentTrend,
        sent: usize,
        replies: usize,
    ) -> CounterpartyContext {
        CounterpartyContext {
            relationship_stage: stage,
            sentiment_trend: sentiment,
            messages_sent: sent,
            replies_received: replies,
            ..CounterpartyContext::default()
        }
    }

    #[test]
    fn test_empty_portfolio_is_all_zero() {
        let m = aggregate(&HashMap::new(), &HashMap::new());
        assert_eq!(m.total_conversations, 0);
        assert!((m.overall_reply_rate - 0.0).abs() < 1e-9);
        assert!(m.avg_response_hours.is_none());
    }

    #[test]
    fn test_portfolio_rates() {
        let mut contexts = HashMap::new();
        contexts.insert(
            "jane@nimbus.vc".to_string(),
            ctx(RelationshipStage::Warm, SentimentTrend::Positive, 4, 2),
        );
        contexts.insert(
            "raj@vertexcap.com".to_string(),
            ctx(RelationshipStage::Cold, SentimentTrend::Neutral, 2, 0),
        );

        let mut profiles = HashMap::new();
        profiles.insert(
            "jane@nimbus.vc".to_string(),
            TimingProfile {
                avg_response_hours: 3.0,
                total_replies: 2,
                ..TimingProfile::default()
            },
        );
        profiles.insert(
            "raj@vertexcap.com".to_string(),
            TimingProfile::default(),
        );

        let m = aggregate(&contexts, &profiles);
        assert_eq!(m.total_conversations, 2);
        assert_eq!(m.active_conversations, 1);
        assert!((m.overall_reply_rate - 2.0 / 6.0).abs() < 1e-9);
        assert!((m.positive_sentiment_rate - 0.5).abs() < 1e-9);
        // default-profile counterparty has no measured replies, excluded
        assert!((m.avg_response_hours.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_sent_guards_reply_rate() {
        let mut contexts = HashMap::new();
        contexts.insert(
            "jane@nimbus.vc".to_string(),
            ctx(RelationshipStage::Unknown, SentimentTrend::Neutral, 0, 0),
        );
        let m = aggregate(&contexts, &HashMap::new());
        assert!((m.overall_reply_rate - 0.0).abs() < 1e-9);
        assert_eq!(m.total_conversations, 1);
    }
}
