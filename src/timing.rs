//! Timing pattern extraction — when a counterparty actually responds.
//!
//! Pure computation over an already-sorted conversation. Latency samples
//! come from adjacent outbound → inbound pairs in timestamp order;
//! preferred hour and weekday are the mode over the inbound halves of
//! those pairs.

use std::collections::HashMap;

use chrono::{Datelike, Timelike, Weekday};

use crate::types::{ConversationGroup, MessageRecord, TimingProfile};

/// Adjacent outbound → inbound pairs in timestamp order. The single place
/// the pairing rule lives.
fn reply_pairs(
    messages: &[MessageRecord],
) -> impl Iterator<Item = (&MessageRecord, &MessageRecord)> {
    messages
        .windows(2)
        .filter(|pair| pair[0].is_outbound && !pair[1].is_outbound)
        .map(|pair| (&pair[0], &pair[1]))
}

fn latency_hours(outbound: &MessageRecord, inbound: &MessageRecord) -> f64 {
    let seconds = (inbound.timestamp - outbound.timestamp).num_seconds();
    seconds.max(0) as f64 / 3600.0
}

/// Response latencies in hours, one per adjacent outbound → inbound pair.
pub fn response_latency_samples(messages: &[MessageRecord]) -> Vec<f64> {
    reply_pairs(messages)
        .map(|(outbound, inbound)| latency_hours(outbound, inbound))
        .collect()
}

/// Extract a timing profile from one conversation.
///
/// With no measured reply pairs the profile keeps neutral defaults
/// (10:00, tuesday, 24h) so downstream scheduling still has something
/// to work with.
pub fn extract_timing(group: &ConversationGroup) -> TimingProfile {
    let messages = &group.messages;
    let total = messages.len();
    let inbound = messages.iter().filter(|m| !m.is_outbound).count();

    let mut profile = TimingProfile {
        total_replies: inbound,
        response_rate: if total > 0 {
            inbound as f64 / total as f64
        } else {
            0.0
        },
        ..TimingProfile::default()
    };

    let mut latencies = Vec::new();
    let mut reply_hours = Vec::new();
    let mut reply_days = Vec::new();
    for (outbound, inbound) in reply_pairs(messages) {
        latencies.push(latency_hours(outbound, inbound));
        reply_hours.push(inbound.timestamp.hour());
        reply_days.push(inbound.timestamp.weekday());
    }

    if !latencies.is_empty() {
        profile.avg_response_hours = latencies.iter().sum::<f64>() / latencies.len() as f64;
    }
    if let Some(hour) = mode(&reply_hours) {
        profile.preferred_hour = hour;
    }
    if let Some(day) = mode(&reply_days) {
        profile.preferred_day = weekday_name(day).to_string();
    }
    profile
}

/// Most frequent value; first-encountered wins a tie.
fn mode<T: Copy + Eq + std::hash::Hash>(values: &[T]) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    for v in values {
        *counts.entry(*v).or_default() += 1;
    }
    let mut best: Option<(T, usize)> = None;
    for v in values {
        let count = counts[v];
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((*v, count));
        }
    }
    best.map(|(v, _)| v)
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

// ============================================================================
// Tests
// ============================================================================
