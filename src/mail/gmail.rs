//! Gmail API v1 mail source.
//!
//! Implements [`MailSource`] over the users.messages list/get endpoints.
//! The caller supplies a valid OAuth bearer token; acquiring and refreshing
//! it is outside this crate. Pagination follows `nextPageToken` until the
//! requested limit is reached.

use async_trait::async_trait;
use serde::Deserialize;

use super::{send_with_retry, MailSource, MailSourceError, RawMessage, RetryPolicy};

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

// ============================================================================
// List response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

// ============================================================================
// GmailSource
// ============================================================================

/// Gmail-backed [`MailSource`]. One instance per access token.
pub struct GmailSource {
    client: reqwest::Client,
    access_token: String,
    retry: RetryPolicy,
}

impl GmailSource {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
        }
    }

    fn mailbox_path(mailbox: &str) -> String {
        // "me" is Gmail's alias for the authenticated user; otherwise the
        // mailbox address is used directly (delegated access).
        if mailbox.is_empty() {
            "me".to_string()
        } else {
            mailbox.to_string()
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, MailSourceError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MailSourceError::AuthExpired);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailSourceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl MailSource for GmailSource {
    async fn search(
        &self,
        mailbox: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<String>, MailSourceError> {
        let url = format!(
            "{}/users/{}/messages",
            GMAIL_BASE,
            Self::mailbox_path(mailbox)
        );

        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let remaining = limit.saturating_sub(ids.len() as u32);
            if remaining == 0 {
                break;
            }

            let mut params: Vec<(&str, String)> = vec![
                ("q", query.to_string()),
                ("maxResults", remaining.min(500).to_string()),
            ];
            if let Some(ref token) = page_token {
                params.push(("pageToken", token.clone()));
            }

            let resp = send_with_retry(
                self.client
                    .get(&url)
                    .bearer_auth(&self.access_token)
                    .query(&params),
                &self.retry,
            )
            .await?;
            let resp = Self::check_status(resp).await?;

            let list: MessageListResponse = resp.json().await?;
            ids.extend(list.messages.into_iter().map(|m| m.id));

            page_token = list.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        ids.truncate(limit as usize);
        log::debug!("gmail search returned {} message ids", ids.len());
        Ok(ids)
    }

    async fn fetch(&self, mailbox: &str, id: &str) -> Result<RawMessage, MailSourceError> {
        let url = format!(
            "{}/users/{}/messages/{}",
            GMAIL_BASE,
            Self::mailbox_path(mailbox),
            id
        );

        let resp = send_with_retry(
            self.client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[("format", "full")]),
            &self.retry,
        )
        .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MailSourceError::NotFound(id.to_string()));
        }
        let resp = Self::check_status(resp).await?;

        let msg: RawMessage = resp.json().await?;
        Ok(msg)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_list_deserialization() {
        let json = r#"{
            "messages": [
                {"id": "msg1", "threadId": "thread1"},
                {"id": "msg2", "threadId": "thread2"}
            ],
            "nextPageToken": "token123"
        }"#;

        let resp: MessageListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.messages.len(), 2);
        assert_eq!(resp.messages[0].id, "msg1");
        assert_eq!(resp.next_page_token.as_deref(), Some("token123"));
    }

    #[test]
    fn test_message_list_empty() {
        let json = r#"{"resultSizeEstimate": 0}"#;
        let resp: MessageListResponse = serde_json::from_str(json).unwrap();
        assert!(resp.messages.is_empty());
        assert!(resp.next_page_token.is_none());
    }

    #[test]
    fn test_mailbox_path_defaults_to_me() {
        assert_eq!(GmailSource::mailbox_path(""), "me");
        assert_eq!(
            GmailSource::mailbox_path("funding@acme.io"),
            "funding@acme.io"
        );
    }
}
