//! Outgoing message construction
//!
//! Builds new messages and replies, including the `In-Reply-To` and
//! `References` headers that keep a reply in the original conversation, and
//! renders them into the base64url `raw` form Gmail's send endpoint accepts.

use base64::prelude::*;

use crate::error::ValidationError;
use crate::models::ThreadId;

/// Body lines are wrapped at this width after base64 encoding (RFC 2045)
const BODY_LINE_WIDTH: usize = 76;

/// Raw bytes per RFC 2047 encoded-word; 45 bytes encode to 60 base64
/// characters, which with the `=?UTF-8?B?` and `?=` delimiters stays
/// within the 75 character limit
const ENCODED_WORD_BYTES: usize = 45;

/// Headers of the original message a reply needs
pub const REPLY_HEADERS: [&str; 4] = ["From", "Subject", "Message-ID", "References"];

/// The parts of an original message a reply is built from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyContext {
    /// `From` header of the original; becomes the reply's recipient
    pub sender: String,
    pub subject: String,
    /// `Message-ID` header, if the original had one
    pub message_id: Option<String>,
    /// `References` header, if the original had one
    pub references: Option<String>,
    pub thread_id: Option<ThreadId>,
}

/// A validated message ready to be rendered and sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub thread_id: Option<ThreadId>,
}

/// Build a new message
pub fn compose(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<OutgoingMessage, ValidationError> {
    let to = to.trim();
    if to.is_empty() {
        return Err(ValidationError::MissingRecipient);
    }
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(ValidationError::MissingSubject);
    }
    let from = validate_sender(from)?;

    Ok(OutgoingMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: subject.to_string(),
        body: body.trim().to_string(),
        in_reply_to: None,
        references: None,
        thread_id: None,
    })
}

/// Build a reply to `original`, threaded onto its conversation
pub fn compose_reply(
    from: &str,
    original: &ReplyContext,
    body: &str,
) -> Result<OutgoingMessage, ValidationError> {
    let body = validate_reply_body(body)?;
    let from = validate_sender(from)?;

    let message_id = original
        .message_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    Ok(OutgoingMessage {
        from: from.to_string(),
        to: original.sender.clone(),
        subject: reply_subject(&original.subject),
        body: body.to_string(),
        in_reply_to: message_id.map(str::to_string),
        references: reference_chain(original.references.as_deref(), message_id),
        thread_id: original.thread_id.clone(),
    })
}

/// Trimmed reply body, rejecting blank input
///
/// Exposed separately so callers can reject an empty reply before fetching
/// the original message.
pub fn validate_reply_body(body: &str) -> Result<&str, ValidationError> {
    let body = body.trim();
    if body.is_empty() {
        Err(ValidationError::MissingBody)
    } else {
        Ok(body)
    }
}

/// Trimmed sender address, rejecting a session that has none
pub fn validate_sender(from: &str) -> Result<&str, ValidationError> {
    let from = from.trim();
    if from.is_empty() {
        Err(ValidationError::MissingSender)
    } else {
        Ok(from)
    }
}

/// Prefix `Re: ` unless the subject already carries it (case-insensitive)
pub fn reply_subject(subject: &str) -> String {
    let already_reply = subject
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"));

    if already_reply {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// `References` for a reply: the original's chain followed by its Message-ID
pub fn reference_chain(references: Option<&str>, message_id: Option<&str>) -> Option<String> {
    let chain = [references, message_id]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if chain.is_empty() { None } else { Some(chain) }
}

impl OutgoingMessage {
    /// Render as a single-part `text/plain` RFC 822 message
    pub fn to_rfc822(&self) -> String {
        let mut headers = vec![
            ("MIME-Version", "1.0".to_string()),
            ("Content-Type", "text/plain; charset=\"utf-8\"".to_string()),
            ("Content-Transfer-Encoding", "base64".to_string()),
            ("From", header_value(&self.from)),
            ("To", header_value(&self.to)),
            ("Subject", encode_subject(&self.subject)),
        ];
        if let Some(id) = &self.in_reply_to {
            headers.push(("In-Reply-To", header_value(id)));
        }
        if let Some(refs) = &self.references {
            headers.push(("References", header_value(refs)));
        }

        let mut out = String::new();
        for (name, value) in headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&encode_body(&self.body));
        out
    }

    /// The base64url form of [`Self::to_rfc822`], as Gmail's `raw` field
    pub fn to_raw(&self) -> String {
        BASE64_URL_SAFE.encode(self.to_rfc822())
    }
}

/// Strip CR/LF so a value cannot inject extra headers
fn header_value(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// RFC 2047 encoded-word for non-ASCII subjects
fn encode_subject(subject: &str) -> String {
    let subject = header_value(subject);
    if subject.is_ascii() {
        subject
    } else {
        utf8_chunks(&subject, ENCODED_WORD_BYTES)
            .map(|chunk| format!("=?UTF-8?B?{}?=", BASE64_STANDARD.encode(chunk)))
            .collect::<Vec<_>>()
            .join("\r\n ")
    }
}

/// Split `s` into pieces of at most `max_bytes`, never inside a character
fn utf8_chunks(s: &str, max_bytes: usize) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut end = rest.len().min(max_bytes);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        // A single character wider than the limit still has to go somewhere
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

fn encode_body(body: &str) -> String {
    let encoded = BASE64_STANDARD.encode(body);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BODY_LINE_WIDTH * 2 + 2);

    // base64 output is ASCII, so byte chunks are valid str boundaries
    for line in encoded.as_bytes().chunks(BODY_LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push_str("\r\n");
    }
    out
}
