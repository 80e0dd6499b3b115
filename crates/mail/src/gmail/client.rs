//! Gmail API HTTP client
//!
//! Provides the [`Mailbox`] operations against the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic; a single agent is
//! shared by all fetch workers so connections are pooled.

use anyhow::{Context, Result};
use log::debug;
use std::time::Duration;

use super::api::{GmailMessage, ListMessagesResponse, SendMessageRequest, SendMessageResponse};
use super::traits::Mailbox;
use crate::models::{Credential, MessageId, SentMessage, ThreadId};

/// Gmail API client
#[derive(Clone)]
pub struct GmailClient {
    agent: ureq::Agent,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1/users/me";

    /// Largest page Gmail will return from `messages.list`
    pub const MAX_PAGE_SIZE: usize = 500;

    /// Per-request deadline; a timeout surfaces as an ordinary request error
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new Gmail client
    pub fn new() -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .build()
            .into();
        Self { agent }
    }

    fn message_url(id: &MessageId) -> String {
        format!("{}/messages/{}", Self::BASE_URL, urlencoding::encode(id.as_str()))
    }

    fn bearer(credential: &Credential) -> String {
        format!("Bearer {}", credential.access_token)
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox for GmailClient {
    fn list_message_ids(
        &self,
        credential: &Credential,
        query: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<MessageId>> {
        let max_results = max_results.clamp(1, Self::MAX_PAGE_SIZE);

        let mut request = self
            .agent
            .get(&format!("{}/messages", Self::BASE_URL))
            .header("Authorization", &Self::bearer(credential))
            .query("maxResults", max_results.to_string());

        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            request = request.query("q", q);
        }

        let mut response = request
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        let ids: Vec<MessageId> = list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .collect();

        debug!("Listed {} message ids (query: {:?})", ids.len(), query);
        Ok(ids)
    }

    fn get_message_metadata(
        &self,
        credential: &Credential,
        id: &MessageId,
        headers: &[&str],
    ) -> Result<GmailMessage> {
        let mut request = self
            .agent
            .get(&Self::message_url(id))
            .header("Authorization", &Self::bearer(credential))
            .query("format", "metadata");

        for header in headers {
            request = request.query("metadataHeaders", *header);
        }

        let mut response = request
            .call()
            .with_context(|| format!("Failed to fetch metadata for message {}", id.as_str()))?;

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse metadata for message {}", id.as_str()))
    }

    fn get_message_full(&self, credential: &Credential, id: &MessageId) -> Result<GmailMessage> {
        let mut response = self
            .agent
            .get(&Self::message_url(id))
            .header("Authorization", &Self::bearer(credential))
            .query("format", "full")
            .call()
            .with_context(|| format!("Failed to fetch message {}", id.as_str()))?;

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse message {}", id.as_str()))
    }

    fn send(
        &self,
        credential: &Credential,
        raw: &str,
        thread_id: Option<&ThreadId>,
    ) -> Result<SentMessage> {
        let body = SendMessageRequest {
            raw,
            thread_id: thread_id.map(|t| t.as_str()),
        };

        let mut response = self
            .agent
            .post(&format!("{}/messages/send", Self::BASE_URL))
            .header("Authorization", &Self::bearer(credential))
            .send_json(&body)
            .context("Failed to send message")?;

        let sent: SendMessageResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse send response")?;

        Ok(SentMessage {
            id: MessageId::new(sent.id),
            thread_id: sent.thread_id.map(ThreadId::new),
        })
    }
}
