//! Gmail API response normalization
//!
//! Converts Gmail API responses into the message views served to the client.

use base64::prelude::*;
use std::collections::BTreeSet;

use super::api::{GmailMessage, Header, MessagePart, MessagePayload};
use crate::categorize::categorize;
use crate::compose::ReplyContext;
use crate::models::{MessageDetail, MessageId, MessageSummary, ThreadId};

/// Build the list-view summary for a metadata-format message and categorize it
pub fn to_summary(msg: GmailMessage) -> MessageSummary {
    let common = CommonFields::from_message(msg);

    let (category, detected_keywords) = categorize(
        &common.subject,
        &common.sender,
        &common.snippet,
        &common.label_ids,
    );

    MessageSummary {
        id: common.id,
        thread_id: common.thread_id,
        snippet: common.snippet,
        subject: common.subject,
        sender: common.sender,
        date_header: common.date_header,
        date_timestamp_millis: common.date_timestamp_millis,
        label_ids: common.label_ids,
        category,
        detected_keywords,
    }
}

/// Build the reading view for a full-format message
pub fn to_detail(msg: GmailMessage) -> MessageDetail {
    let body = msg
        .payload
        .as_ref()
        .and_then(extract_plain_text_body)
        .unwrap_or_default();
    let common = CommonFields::from_message(msg);

    MessageDetail {
        id: common.id,
        thread_id: common.thread_id,
        snippet: common.snippet,
        subject: common.subject,
        sender: common.sender,
        date_header: common.date_header,
        date_timestamp_millis: common.date_timestamp_millis,
        label_ids: common.label_ids,
        body,
    }
}

/// Pull the threading headers a reply needs out of the original message
pub fn reply_context(msg: &GmailMessage) -> ReplyContext {
    let headers = header_list(msg.payload.as_ref());
    ReplyContext {
        sender: find_header(headers, "From").unwrap_or_default(),
        subject: find_header(headers, "Subject").unwrap_or_default(),
        message_id: find_header(headers, "Message-ID").filter(|v| !v.trim().is_empty()),
        references: find_header(headers, "References").filter(|v| !v.trim().is_empty()),
        thread_id: msg.thread_id.clone().map(ThreadId::new),
    }
}

/// Fields shared by the summary and detail views
struct CommonFields {
    id: MessageId,
    thread_id: Option<ThreadId>,
    snippet: String,
    subject: String,
    sender: String,
    date_header: String,
    date_timestamp_millis: Option<i64>,
    label_ids: BTreeSet<String>,
}

impl CommonFields {
    fn from_message(msg: GmailMessage) -> Self {
        let headers = header_list(msg.payload.as_ref());
        let subject = find_header(headers, "Subject").unwrap_or_default();
        let sender = find_header(headers, "From").unwrap_or_default();
        let date_header = find_header(headers, "Date").unwrap_or_default();

        Self {
            id: MessageId::new(msg.id),
            thread_id: msg.thread_id.map(ThreadId::new),
            snippet: msg
                .snippet
                .as_deref()
                .map(decode_html_entities)
                .unwrap_or_default(),
            subject,
            sender,
            date_header,
            date_timestamp_millis: msg
                .internal_date
                .as_deref()
                .and_then(|d| d.trim().parse().ok()),
            label_ids: msg.label_ids.unwrap_or_default().into_iter().collect(),
        }
    }
}

fn header_list(payload: Option<&MessagePayload>) -> &[Header] {
    payload
        .and_then(|p| p.headers.as_deref())
        .unwrap_or_default()
}

/// Find a header value by name (case-insensitive)
fn find_header(headers: &[Header], name: &str) -> Option<String> {
    headers.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

fn is_plain_text(mime_type: Option<&String>) -> bool {
    mime_type.is_some_and(|m| m.to_ascii_lowercase().starts_with("text/plain"))
}

/// Extract the plain-text body from a message payload
fn extract_plain_text_body(payload: &MessagePayload) -> Option<String> {
    // Single-part text/plain message
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && is_plain_text(payload.mime_type.as_ref())
    {
        return decode_base64_body(data);
    }

    // First text/plain part anywhere in the tree
    if let Some(parts) = &payload.parts
        && let Some(text) = find_plain_text_in_parts(parts)
    {
        return Some(text);
    }

    // Fall back to whatever the top-level body holds
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
    {
        return decode_base64_body(data);
    }

    None
}

/// Recursively search message parts for text/plain content
fn find_plain_text_in_parts(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        if is_plain_text(part.mime_type.as_ref())
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        if let Some(nested) = &part.parts
            && let Some(text) = find_plain_text_in_parts(nested)
        {
            return Some(text);
        }
    }

    None
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding varies, and some senders produce
/// standard alphabet data. Invalid UTF-8 is replaced rather than rejected.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    let data = data.trim();
    decoders
        .iter()
        .find_map(|decoder| decoder.decode(data).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode the HTML entities Gmail leaves in snippets
fn decode_html_entities(s: &str) -> String {
    let named = s
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    decode_numeric_entities(&named).replace("&amp;", "&")
}

/// Replace `&#NNN;` and `&#xHH;` references; leaves malformed ones untouched
fn decode_numeric_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("&#") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start + 2..];

        let decoded = candidate.find(';').and_then(|end| {
            let digits = &candidate[..end];
            let hex = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X'));
            let code = match hex {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => digits.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32).map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push_str("&#");
                rest = candidate;
            }
        }
    }

    out.push_str(rest);
    out
}
