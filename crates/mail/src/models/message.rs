//! Message views returned to the web client

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Category;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Gmail conversation identifier linking a message and its replies
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// List-view projection of a Gmail message plus its derived category
///
/// Built once per list request and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: MessageId,
    pub thread_id: Option<ThreadId>,
    pub snippet: String,
    pub subject: String,
    /// Raw `From` header
    pub sender: String,
    /// Raw `Date` header
    #[serde(rename = "date")]
    pub date_header: String,
    /// Gmail's internal timestamp (milliseconds since epoch)
    #[serde(rename = "dateTimestamp")]
    pub date_timestamp_millis: Option<i64>,
    pub label_ids: BTreeSet<String>,
    #[serde(rename = "categoryId")]
    pub category: Category,
    pub detected_keywords: Vec<String>,
}

impl MessageSummary {
    /// Sort key used for list ordering; a missing timestamp sorts as 0
    pub fn timestamp_or_zero(&self) -> i64 {
        self.date_timestamp_millis.unwrap_or(0)
    }
}

/// A single message opened for reading, with its plain-text body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    pub id: MessageId,
    pub thread_id: Option<ThreadId>,
    pub snippet: String,
    pub subject: String,
    pub sender: String,
    #[serde(rename = "date")]
    pub date_header: String,
    #[serde(rename = "dateTimestamp")]
    pub date_timestamp_millis: Option<i64>,
    pub label_ids: BTreeSet<String>,
    /// Plain-text body (empty when the message has no text part)
    pub body: String,
}

/// Identifiers Gmail assigns to a message we sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: MessageId,
    pub thread_id: Option<ThreadId>,
}
