//! Content sanitization for oracle prompts.
//!
//! Replaces email addresses with stable hashed placeholders and strips
//! phone numbers, URLs, and trailing signatures before any message text
//! leaves the process. Placeholders are stable within one run so the
//! oracle can track participants across a conversation.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w.-]+\.\w+").unwrap())
}

fn phone_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // US format, dashed or dotted or bare
            Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").unwrap(),
            // parenthesized area code
            Regex::new(r"\(\d{3}\)\s*\d{3}[-.]?\d{4}").unwrap(),
            // international
            Regex::new(r"\+\d{1,3}[\s.-]?\d{1,4}[\s.-]?\d{3,4}[\s.-]?\d{3,4}").unwrap(),
        ]
    })
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(https?://\S+|www\.\S+)").unwrap())
}

fn signature_res() -> &'static [Regex; 4] {
    static RES: OnceLock<[Regex; 4]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"(?s)\n--\s*\n.*$").unwrap(),
            Regex::new(r"(?si)\nBest regards,.*$").unwrap(),
            Regex::new(r"(?si)\nSincerely,.*$").unwrap(),
            Regex::new(r"(?si)\nThanks,.*$").unwrap(),
        ]
    })
}

/// Run-scoped sanitizer with a stable identity → placeholder map.
#[derive(Debug, Default)]
pub struct Sanitizer {
    placeholders: HashMap<String, String>,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scrub one piece of text: emails → hashed placeholders, phones,
    /// URLs, and signatures → fixed markers.
    pub fn scrub(&mut self, text: &str) -> String {
        let mut out = email_re()
            .replace_all(text, |caps: &regex::Captures<'_>| {
                self.placeholder_for(&caps[0]).to_string()
            })
            .into_owned();

        for re in phone_res() {
            out = re.replace_all(&out, "[PHONE_NUMBER]").into_owned();
        }
        out = url_re().replace_all(&out, "[URL_LINK]").into_owned();
        for re in signature_res() {
            out = re.replace_all(&out, "\n[EMAIL_SIGNATURE]").into_owned();
        }
        out
    }

    /// Stable placeholder for one address. Case variants of the same
    /// address share a placeholder.
    fn placeholder_for(&mut self, address: &str) -> &str {
        let key = address.to_lowercase();
        self.placeholders.entry(key.clone()).or_insert_with(|| {
            let digest = Sha256::digest(key.as_bytes());
            format!("[EMAIL_{}]", &hex::encode(digest)[..6])
        })
    }

    /// Number of distinct identities seen so far.
    pub fn identity_count(&self) -> usize {
        self.placeholders.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_placeholder_is_stable() {
        let mut s = Sanitizer::new();
        let a = s.scrub("reach me at jane@nimbus.vc");
        let b = s.scrub("jane@nimbus.vc again");
        let placeholder = a.trim_start_matches("reach me at ").to_string();
        assert!(placeholder.starts_with("[EMAIL_"));
        assert!(b.starts_with(&placeholder));
    }

    #[test]
    fn test_distinct_addresses_get_distinct_placeholders() {
        let mut s = Sanitizer::new();
        let out = s.scrub("jane@nimbus.vc and raj@vertexcap.com");
        let markers: Vec<&str> = out.matches("[EMAIL_").collect();
        assert_eq!(markers.len(), 2);
        assert_eq!(s.identity_count(), 2);
        let first = &out[out.find("[EMAIL_").unwrap()..out.find(']').unwrap() + 1];
        assert_eq!(out.matches(first).count(), 1);
    }

    #[test]
    fn test_case_variants_share_placeholder() {
        let mut s = Sanitizer::new();
        let a = s.scrub("Jane@Nimbus.VC");
        let b = s.scrub("jane@nimbus.vc");
        assert_eq!(a, b);
        assert_eq!(s.identity_count(), 1);
    }

    #[test]
    fn test_phone_numbers_masked() {
        let mut s = Sanitizer::new();
        assert_eq!(s.scrub("call 555-123-4567"), "call [PHONE_NUMBER]");
        assert_eq!(s.scrub("call (555) 123-4567"), "call [PHONE_NUMBER]");
        assert_eq!(s.scrub("call +1 555 123 4567"), "call [PHONE_NUMBER]");
    }

    #[test]
    fn test_urls_masked() {
        let mut s = Sanitizer::new();
        assert_eq!(
            s.scrub("deck at https://acme.io/deck.pdf here"),
            "deck at [URL_LINK] here"
        );
        assert_eq!(s.scrub("see www.acme.io today"), "see [URL_LINK] today");
    }

    #[test]
    fn test_signature_stripped() {
        let mut s = Sanitizer::new();
        let text = "Let's talk Tuesday.\nBest regards,\nJane Ruiz\nNimbus Ventures";
        let out = s.scrub(text);
        assert_eq!(out, "Let's talk Tuesday.\n[EMAIL_SIGNATURE]");
    }

    #[test]
    fn test_dashed_signature_delimiter() {
        let mut s = Sanitizer::new();
        let text = "See you then.\n-- \nJane Ruiz\n555-123-4567";
        let out = s.scrub(text);
        assert_eq!(out, "See you then.\n[EMAIL_SIGNATURE]");
    }

    #[test]
    fn test_plain_text_unchanged() {
        let mut s = Sanitizer::new();
        let text = "We closed the round at a fair valuation.";
        assert_eq!(s.scrub(text), text);
    }
}
