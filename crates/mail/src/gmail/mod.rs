//! Gmail boundary
//!
//! This module provides:
//! - The [`AuthProvider`] and [`Mailbox`] traits the core talks to
//! - Google OAuth2 token endpoint client ([`GoogleAuth`])
//! - Gmail REST client ([`GmailClient`])
//! - Normalization of Gmail responses into message views

mod auth;
mod client;
mod normalize;
mod traits;

pub use auth::GoogleAuth;
pub use client::GmailClient;
pub use normalize::{reply_context, to_detail, to_summary};
pub use traits::{AuthProvider, Mailbox, TokenGrant};

/// Gmail API wire types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// A message as returned by `messages.get` in `metadata` or `full` format
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: Option<String>,
        pub label_ids: Option<Vec<String>>,
        pub snippet: Option<String>,
        /// Milliseconds since epoch, as a decimal string
        pub internal_date: Option<String>,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing headers and body
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
        pub mime_type: Option<String>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Message body (base64url encoded)
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Body of `messages.send`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendMessageRequest<'a> {
        pub raw: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub thread_id: Option<&'a str>,
    }

    /// Response from `messages.send`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendMessageResponse {
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// Google userinfo (v2) response
    #[derive(Debug, Deserialize)]
    pub struct UserInfo {
        pub id: Option<String>,
        pub email: Option<String>,
        pub name: Option<String>,
    }
}
