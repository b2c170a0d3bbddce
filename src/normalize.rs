//! Message normalization — raw provider message → [`MessageRecord`].
//!
//! Walks a possibly-nested MIME payload for the body (preferring the
//! plain-text alternative), decodes URL-safe base64 transport encoding,
//! parses a possibly-malformed Date header with a fallback chain, and
//! derives the outbound/reply flags. Unparseable messages produce a skip
//! decision, never an abort.

use base64::Engine;
use chrono::{DateTime, FixedOffset, Utc};

use crate::mail::{RawMessage, RawPayload};
use crate::types::MessageRecord;

/// Why a raw message was skipped during normalization.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("message has no id")]
    MissingId,
    #[error("message has no headers")]
    MissingHeaders,
}

/// Normalize one raw message against the operator's mailbox address.
///
/// Returns `Err` only for records too malformed to use (no id, no headers);
/// the caller records the skip and continues the batch.
pub fn normalize_message(
    raw: &RawMessage,
    operator: &str,
) -> Result<MessageRecord, NormalizeError> {
    if raw.id.is_empty() {
        return Err(NormalizeError::MissingId);
    }
    let has_headers = raw
        .payload
        .as_ref()
        .map(|p| !p.headers.is_empty())
        .unwrap_or(false);
    if !has_headers {
        return Err(NormalizeError::MissingHeaders);
    }

    let sender = raw.header("From").unwrap_or_default().to_string();
    let recipient = raw.header("To").unwrap_or_default().to_string();
    let cc = raw
        .header("Cc")
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string());
    let subject = raw.header("Subject").unwrap_or_default().to_string();

    let timestamp = parse_date_header(raw.header("Date").unwrap_or_default());

    let body = extract_body(raw);
    let operator_lower = operator.to_lowercase();
    let is_outbound = sender.to_lowercase().contains(&operator_lower);
    let is_reply = subject.trim_start().to_lowercase().starts_with("re:")
        || raw.header("In-Reply-To").is_some();
    let has_attachments = raw
        .payload
        .as_ref()
        .map(payload_has_attachment)
        .unwrap_or(false);

    Ok(MessageRecord {
        id: raw.id.clone(),
        thread_id: raw.thread_id.clone(),
        sender,
        recipient,
        cc,
        timestamp,
        subject,
        body_len: body.len(),
        body,
        snippet: raw.snippet.clone(),
        is_outbound,
        is_reply,
        has_attachments,
    })
}

/// Parse a Date header, falling back to "now" when unparseable.
///
/// Providers emit RFC 2822 ("Mon, 2 Mar 2026 09:00:00 -0500"); some relays
/// rewrite it to RFC 3339. Anything else gets the current instant so the
/// record stays sortable.
pub fn parse_date_header(value: &str) -> DateTime<FixedOffset> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return dt;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt;
    }
    log::debug!("unparseable Date header {:?}, falling back to now", value);
    Utc::now().fixed_offset()
}

/// Extract the message body by walking the MIME tree.
///
/// Prefers `text/plain`, then `text/html`, then the provider snippet.
fn extract_body(raw: &RawMessage) -> String {
    let Some(payload) = raw.payload.as_ref() else {
        return raw.snippet.clone();
    };

    if let Some(text) = find_part_text(payload, "text/plain") {
        return collapse_blank_runs(&text);
    }
    if let Some(text) = find_part_text(payload, "text/html") {
        return collapse_blank_runs(&text);
    }
    raw.snippet.clone()
}

/// Depth-first search for body data of the target MIME type.
fn find_part_text(payload: &RawPayload, target_mime: &str) -> Option<String> {
    if payload.mime_type == target_mime {
        if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref()) {
            if let Some(text) = decode_url_safe_base64(data) {
                return Some(text);
            }
        }
    }
    for part in &payload.parts {
        if let Some(text) = find_part_text(part, target_mime) {
            return Some(text);
        }
    }
    None
}

/// Decode URL-safe base64 body data, tolerating present or absent padding.
fn decode_url_safe_base64(data: &str) -> Option<String> {
    let trimmed = data.trim_end_matches('=');
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .ok()?;
    String::from_utf8(bytes).ok()
}

/// Collapse runs of blank lines left behind by quoted-printable decoding.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

/// True when any part in the tree carries an attachment filename.
fn payload_has_attachment(payload: &RawPayload) -> bool {
    if !payload.filename.is_empty() {
        return true;
    }
    payload.parts.iter().any(payload_has_attachment)
}

// ============================================================================
// Tests
// ============================================================================
