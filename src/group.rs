//! Conversation grouping — flat message list → per-counterparty groups.
//!
//! Each message is attributed to the external party on the other end:
//! the recipient for outbound mail, the sender for inbound. Messages the
//! operator sent to themselves are dropped.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{ConversationGroup, MessageRecord};

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w.-]+\.\w+").unwrap())
}

/// The party on the other side of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Party {
    /// The message loops back to the operator (self-mail, note-to-self).
    Operator,
    /// Canonical lowercased counterparty address.
    Counterparty(String),
}

/// Pull the first bare address out of a From/To header field.
///
/// Handles both `Jane Ruiz <jane@nimbus.vc>` and bare `jane@nimbus.vc`.
/// Falls back to the whole trimmed field when no address-shaped token is
/// present; `None` for an empty field.
pub fn extract_address(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    match address_re().find(trimmed) {
        Some(m) => Some(m.as_str().to_lowercase()),
        None => Some(trimmed.to_lowercase()),
    }
}

/// Classify which external party a message belongs to.
pub fn classify_party(record: &MessageRecord, operator: &str) -> Party {
    let field = if record.is_outbound {
        &record.recipient
    } else {
        &record.sender
    };
    let operator_lower = operator.to_lowercase();
    match extract_address(field) {
        Some(addr) if addr != operator_lower => Party::Counterparty(addr),
        _ => Party::Operator,
    }
}

/// Group messages by counterparty, each group sorted ascending by timestamp.
///
/// The sort is stable so same-instant messages keep their fetch order.
pub fn group_by_counterparty(
    records: Vec<MessageRecord>,
    operator: &str,
) -> HashMap<String, ConversationGroup> {
    let mut groups: HashMap<String, ConversationGroup> = HashMap::new();
    for record in records {
        match classify_party(&record, operator) {
            Party::Operator => {
                log::debug!("dropping self-addressed message {}", record.id);
            }
            Party::Counterparty(addr) => {
                groups
                    .entry(addr.clone())
                    .or_insert_with(|| ConversationGroup {
                        counterparty: addr,
                        messages: Vec::new(),
                    })
                    .messages
                    .push(record);
            }
        }
    }
    for group in groups.values_mut() {
        group.messages.sort_by_key(|m| m.timestamp);
    }
    groups
}

// ============================================================================
// Tests
// ============================================================================
