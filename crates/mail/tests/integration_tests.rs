//! Integration tests for the mail crate
//!
//! These tests drive [`MailService`] end to end against in-process fakes of
//! Google's OAuth and Gmail endpoints: login, listing, reading, sending,
//! replying, refresh and logout.

use anyhow::{Result, bail};
use base64::prelude::*;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use unclutter_mail::gmail::api::{GmailMessage, Header, MessageBody, MessagePayload};
use unclutter_mail::{
    AuthError, AuthProvider, CallbackParams, Category, Credential, InMemorySessionStore,
    MailService, Mailbox, MessageId, OAuthCredentials, SentMessage, ServiceConfig, ServiceError,
    SessionStore, ThreadId, TokenGrant, ValidationError,
};

// === Fakes ===

struct FakeAuth {
    email: Option<String>,
    fail_exchange: bool,
    token_lifetime: Duration,
    refreshes: AtomicUsize,
}

impl FakeAuth {
    fn new() -> Self {
        Self {
            email: Some("me@example.com".to_string()),
            fail_exchange: false,
            token_lifetime: Duration::hours(1),
            refreshes: AtomicUsize::new(0),
        }
    }
}

impl AuthProvider for FakeAuth {
    fn authorization_url(&self, state: Option<&str>) -> String {
        format!("https://accounts.example/auth?state={}", state.unwrap_or(""))
    }

    fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        if self.fail_exchange {
            bail!("invalid_grant");
        }
        Ok(TokenGrant {
            access_token: format!("access-for-{}", code),
            refresh_token: Some("refresh-token".to_string()),
            expiry: Some(Utc::now() + self.token_lifetime),
        })
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        assert_eq!(refresh_token, "refresh-token");
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TokenGrant {
            access_token: format!("refreshed-{}", n),
            refresh_token: None,
            expiry: Some(Utc::now() + Duration::hours(1)),
        })
    }

    fn user_email(&self, _access_token: &str) -> Result<String> {
        match &self.email {
            Some(email) => Ok(email.clone()),
            None => bail!("userinfo unavailable"),
        }
    }
}

#[derive(Debug, Clone)]
struct SentRecord {
    access_token: String,
    raw: String,
    thread_id: Option<ThreadId>,
}

#[derive(Default)]
struct FakeMailbox {
    messages: HashMap<String, GmailMessage>,
    /// IDs returned by list even though fetching them fails
    broken_ids: Vec<String>,
    fail_list: bool,
    calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
    sent: Mutex<Vec<SentRecord>>,
}

impl FakeMailbox {
    fn with_messages(messages: Vec<GmailMessage>) -> Self {
        Self {
            messages: messages.into_iter().map(|m| (m.id.clone(), m)).collect(),
            ..Default::default()
        }
    }

    fn record(&self, credential: &Credential) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen
            .lock()
            .unwrap()
            .push(credential.access_token.clone());
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, id: &MessageId) -> Result<GmailMessage> {
        match self.messages.get(id.as_str()) {
            Some(msg) => Ok(msg.clone()),
            None => bail!("HTTP 404: message {} not found", id.as_str()),
        }
    }
}

impl Mailbox for FakeMailbox {
    fn list_message_ids(
        &self,
        credential: &Credential,
        _query: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<MessageId>> {
        self.record(credential);
        if self.fail_list {
            bail!("HTTP 503: backend error");
        }
        let mut ids: Vec<String> = self.messages.keys().cloned().collect();
        ids.extend(self.broken_ids.iter().cloned());
        ids.sort();
        Ok(ids.into_iter().take(max_results).map(MessageId::new).collect())
    }

    fn get_message_metadata(
        &self,
        credential: &Credential,
        id: &MessageId,
        headers: &[&str],
    ) -> Result<GmailMessage> {
        self.record(credential);
        let mut msg = self.lookup(id)?;
        if let Some(payload) = msg.payload.as_mut() {
            payload.body = None;
            payload.parts = None;
            if let Some(hs) = payload.headers.as_mut() {
                hs.retain(|h| headers.iter().any(|want| want.eq_ignore_ascii_case(&h.name)));
            }
        }
        Ok(msg)
    }

    fn get_message_full(&self, credential: &Credential, id: &MessageId) -> Result<GmailMessage> {
        self.record(credential);
        self.lookup(id)
    }

    fn send(
        &self,
        credential: &Credential,
        raw: &str,
        thread_id: Option<&ThreadId>,
    ) -> Result<SentMessage> {
        self.record(credential);
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentRecord {
            access_token: credential.access_token.clone(),
            raw: raw.to_string(),
            thread_id: thread_id.cloned(),
        });
        Ok(SentMessage {
            id: MessageId::new(format!("sent-{}", sent.len())),
            thread_id: Some(thread_id.cloned().unwrap_or_else(|| ThreadId::new("new-thread"))),
        })
    }
}

// === Helpers ===

fn gmail_message(
    id: &str,
    internal_date: Option<i64>,
    headers: &[(&str, &str)],
    labels: &[&str],
) -> GmailMessage {
    GmailMessage {
        id: id.to_string(),
        thread_id: Some(format!("thread-{}", id)),
        label_ids: Some(labels.iter().map(|l| l.to_string()).collect()),
        snippet: Some(format!("snippet {}", id)),
        internal_date: internal_date.map(|d| d.to_string()),
        payload: Some(MessagePayload {
            mime_type: Some("text/plain".to_string()),
            headers: Some(
                headers
                    .iter()
                    .map(|(name, value)| Header {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            ),
            body: Some(MessageBody {
                size: None,
                data: Some(BASE64_URL_SAFE_NO_PAD.encode(format!("Body of {}", id))),
            }),
            parts: None,
        }),
    }
}

fn sample_inbox() -> Vec<GmailMessage> {
    vec![
        gmail_message(
            "m1",
            Some(200),
            &[
                ("From", "Prof <prof@mcmaster.ca>"),
                ("Subject", "Midterm room change"),
                ("Date", "Mon, 1 Jan 2024 10:00:00 +0000"),
                ("Message-ID", "<a@x>"),
            ],
            &["INBOX"],
        ),
        gmail_message(
            "m3",
            Some(100),
            &[
                ("From", "Shop <deals@shop.example>"),
                ("Subject", "Weekend sale"),
                ("Date", "Sun, 31 Dec 2023 10:00:00 +0000"),
            ],
            &["INBOX", "CATEGORY_PROMOTIONS"],
        ),
        gmail_message(
            "m4",
            Some(300),
            &[
                ("From", "TA <ta@school.example>"),
                ("subject", "Re: Lab 3"),
                ("message-id", "<c@x>"),
                ("References", "<b@x>"),
            ],
            &["INBOX"],
        ),
    ]
}

fn config() -> ServiceConfig {
    ServiceConfig::new(OAuthCredentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
    })
    .with_frontend_url("http://localhost:5174/")
}

struct Harness {
    service: MailService,
    store: Arc<InMemorySessionStore>,
    auth: Arc<FakeAuth>,
    mailbox: Arc<FakeMailbox>,
}

fn harness_with(auth: FakeAuth, mailbox: FakeMailbox) -> Harness {
    let store = Arc::new(InMemorySessionStore::new());
    let auth = Arc::new(auth);
    let mailbox = Arc::new(mailbox);
    let service = MailService::new(
        &config(),
        store.clone() as Arc<dyn SessionStore>,
        auth.clone() as Arc<dyn AuthProvider>,
        mailbox.clone() as Arc<dyn Mailbox>,
    )
    .unwrap();

    Harness {
        service,
        store,
        auth,
        mailbox,
    }
}

fn harness() -> Harness {
    harness_with(FakeAuth::new(), FakeMailbox::with_messages(sample_inbox()))
}

fn login(h: &Harness) -> String {
    let id = h
        .service
        .complete_login(CallbackParams {
            code: Some("code-1".to_string()),
            error: None,
        })
        .unwrap();
    format!("Bearer {}", id.as_str())
}

fn decode_raw(raw: &str) -> String {
    String::from_utf8(BASE64_URL_SAFE.decode(raw).unwrap()).unwrap()
}

fn decode_body(rfc822: &str) -> String {
    let (_, body) = rfc822.split_once("\r\n\r\n").unwrap();
    let joined: String = body.lines().collect();
    String::from_utf8(BASE64_STANDARD.decode(joined).unwrap()).unwrap()
}

fn assert_not_authenticated<T: std::fmt::Debug>(result: Result<T, ServiceError>) {
    match result {
        Err(ServiceError::Auth(AuthError::NotAuthenticated)) => {}
        other => panic!("expected NotAuthenticated, got {:?}", other),
    }
}

// === Login ===

#[test]
fn test_login_creates_session_and_redirects_home() {
    let h = harness();
    let result = h.service.complete_login(CallbackParams {
        code: Some("code-1".to_string()),
        error: None,
    });
    let id = result.as_ref().unwrap().clone();

    let session = h.store.get(&id).unwrap().unwrap();
    assert_eq!(session.email, "me@example.com");
    assert_eq!(session.credential.access_token, "access-for-code-1");

    assert_eq!(
        h.service.callback_redirect(&result),
        format!("http://localhost:5174/home?token={}", id.as_str())
    );
}

#[test]
fn test_login_failures_redirect_with_error_codes() {
    let h = harness();

    let denied = h.service.complete_login(CallbackParams {
        code: None,
        error: Some("access_denied".to_string()),
    });
    assert!(matches!(denied, Err(ServiceError::Auth(AuthError::AccessDenied(_)))));
    assert_eq!(
        h.service.callback_redirect(&denied),
        "http://localhost:5174/login?error=access_denied"
    );

    let no_code = h.service.complete_login(CallbackParams::default());
    assert!(matches!(no_code, Err(ServiceError::Auth(AuthError::MissingCode))));
    assert_eq!(
        h.service.callback_redirect(&no_code),
        "http://localhost:5174/login?error=no_code"
    );

    assert!(h.store.is_empty().unwrap());
}

#[test]
fn test_login_code_exchange_failure() {
    let auth = FakeAuth {
        fail_exchange: true,
        ..FakeAuth::new()
    };
    let h = harness_with(auth, FakeMailbox::default());

    let result = h.service.complete_login(CallbackParams::from_query("code=abc"));
    assert!(matches!(
        result,
        Err(ServiceError::Auth(AuthError::CodeExchangeFailed(ref m))) if m.contains("invalid_grant")
    ));
    assert_eq!(
        h.service.callback_redirect(&result),
        "http://localhost:5174/login?error=token_exchange_failed"
    );
    assert!(h.store.is_empty().unwrap());
}

#[test]
fn test_login_survives_userinfo_failure() {
    let auth = FakeAuth {
        email: None,
        ..FakeAuth::new()
    };
    let h = harness_with(auth, FakeMailbox::with_messages(sample_inbox()));
    let token = login(&h);

    assert_eq!(h.service.current_user(Some(&token)).unwrap(), "");

    // Sending needs a sender address; nothing reaches Gmail
    let err = h
        .service
        .send(Some(&token), "you@example.com", "Hi", "Hello")
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ValidationError::MissingSender)));
    assert_eq!(h.mailbox.call_count(), 0);
}

#[test]
fn test_login_url_delegates_to_provider() {
    let h = harness();
    assert_eq!(
        h.service.login_url(Some("xyz")),
        "https://accounts.example/auth?state=xyz"
    );
}

// === Session lifecycle ===

#[test]
fn test_session_lifecycle() {
    let h = harness();
    let token = login(&h);

    assert_eq!(h.service.current_user(Some(&token)).unwrap(), "me@example.com");

    h.service.logout(Some(&token)).unwrap();
    assert!(h.store.is_empty().unwrap());

    // A logged-out token behaves exactly like an unknown one
    assert_not_authenticated(h.service.current_user(Some(&token)));
    assert_not_authenticated(h.service.list_messages(Some(&token), None, 10));
    assert_not_authenticated(h.service.current_user(Some("Bearer never-issued")));

    // Logout is idempotent
    h.service.logout(Some(&token)).unwrap();
    h.service.logout(None).unwrap();
}

#[test]
fn test_missing_or_malformed_authorization() {
    let h = harness();
    let token = login(&h);
    let bare = token.trim_start_matches("Bearer ").to_string();

    assert_not_authenticated(h.service.current_user(None));
    assert_not_authenticated(h.service.current_user(Some("")));
    assert_not_authenticated(h.service.current_user(Some("Bearer ")));
    assert_not_authenticated(h.service.current_user(Some(&bare)));
    assert_not_authenticated(h.service.get_message(None, "m1"));
    assert_eq!(h.mailbox.call_count(), 0);
}

#[test]
fn test_same_account_sessions_are_independent() {
    let h = harness();
    let first = login(&h);
    let second = login(&h);
    assert_ne!(first, second);

    h.service.logout(Some(&first)).unwrap();
    assert_not_authenticated(h.service.current_user(Some(&first)));
    assert_eq!(h.service.current_user(Some(&second)).unwrap(), "me@example.com");
}

// === Listing ===

#[test]
fn test_list_messages_sorted_and_categorized() {
    let h = harness();
    let token = login(&h);

    let listing = h.service.list_messages(Some(&token), None, 50).unwrap();
    let ids: Vec<&str> = listing.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m4", "m1", "m3"]);
    assert_eq!(listing.requested, 3);
    assert_eq!(listing.failed, 0);

    let by_id: HashMap<&str, _> = listing
        .messages
        .iter()
        .map(|m| (m.id.as_str(), m))
        .collect();
    assert_eq!(by_id["m1"].category, Category::University);
    assert_eq!(by_id["m1"].detected_keywords, vec!["Midterm"]);
    assert_eq!(by_id["m3"].category, Category::Promotions);
    assert_eq!(by_id["m3"].detected_keywords, vec!["Sale"]);
    assert_eq!(by_id["m4"].category, Category::Unsorted);
    assert!(by_id["m4"].detected_keywords.is_empty());
    assert_eq!(by_id["m4"].subject, "Re: Lab 3");
}

#[test]
fn test_list_messages_partial_failure() {
    let mut mailbox = FakeMailbox::with_messages(sample_inbox());
    mailbox.broken_ids = vec!["m2".to_string()];
    let h = harness_with(FakeAuth::new(), mailbox);
    let token = login(&h);

    let listing = h.service.list_messages(Some(&token), None, 50).unwrap();
    let ids: Vec<&str> = listing.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m4", "m1", "m3"]);
    assert_eq!(listing.requested, 4);
    assert_eq!(listing.failed, 1);
}

#[test]
fn test_list_messages_upstream_failure() {
    let mailbox = FakeMailbox {
        fail_list: true,
        ..FakeMailbox::default()
    };
    let h = harness_with(FakeAuth::new(), mailbox);
    let token = login(&h);

    match h.service.list_messages(Some(&token), Some("in:inbox"), 20) {
        Err(ServiceError::Upstream(e)) => {
            assert_eq!(e.operation, "list messages");
            assert!(e.message.contains("503"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[test]
fn test_list_messages_clamps_zero_max() {
    let h = harness();
    let token = login(&h);

    let listing = h.service.list_messages(Some(&token), None, 0).unwrap();
    assert_eq!(listing.requested, 1);
}

#[test]
fn test_listing_serializes_for_web_client() {
    let h = harness();
    let token = login(&h);
    let listing = h.service.list_messages(Some(&token), None, 50).unwrap();

    let json = serde_json::to_value(&listing.messages[1]).unwrap();
    assert_eq!(json["id"], "m1");
    assert_eq!(json["threadId"], "thread-m1");
    assert_eq!(json["categoryId"], "university");
    assert_eq!(json["dateTimestamp"], 200);
    assert_eq!(json["date"], "Mon, 1 Jan 2024 10:00:00 +0000");
    assert_eq!(json["detectedKeywords"][0], "Midterm");
}

// === Reading ===

#[test]
fn test_get_message_returns_body() {
    let h = harness();
    let token = login(&h);

    let detail = h.service.get_message(Some(&token), "m1").unwrap();
    assert_eq!(detail.body, "Body of m1");
    assert_eq!(detail.subject, "Midterm room change");

    let err = h.service.get_message(Some(&token), "missing").unwrap_err();
    assert!(matches!(err, ServiceError::Upstream(ref e) if e.operation == "get message"));
}

// === Sending ===

#[test]
fn test_send_new_message() {
    let h = harness();
    let token = login(&h);

    let sent = h
        .service
        .send(Some(&token), " you@example.com ", "Hello", "Hi there")
        .unwrap();
    assert_eq!(sent.id.as_str(), "sent-1");

    let records = h.mailbox.sent.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].thread_id, None);

    let text = decode_raw(&records[0].raw);
    assert!(text.contains("From: me@example.com\r\n"));
    assert!(text.contains("To: you@example.com\r\n"));
    assert!(text.contains("Subject: Hello\r\n"));
    assert!(!text.contains("In-Reply-To"));
    assert_eq!(decode_body(&text), "Hi there");
}

#[test]
fn test_send_validation_happens_before_any_call() {
    // Expired token: a refresh would be the first external call
    let auth = FakeAuth {
        token_lifetime: Duration::seconds(-60),
        ..FakeAuth::new()
    };
    let h = harness_with(auth, FakeMailbox::with_messages(sample_inbox()));
    let token = login(&h);

    let err = h.service.send(Some(&token), "  ", "Hi", "body").unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ValidationError::MissingRecipient)));

    let err = h
        .service
        .send(Some(&token), "you@example.com", "", "body")
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ValidationError::MissingSubject)));

    let err = h.service.reply(Some(&token), "m1", "   ").unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ValidationError::MissingBody)));

    assert_eq!(h.auth.refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(h.mailbox.call_count(), 0);
}

#[test]
fn test_reply_threads_onto_original() {
    let h = harness();
    let token = login(&h);

    let sent = h.service.reply(Some(&token), "m1", "See you there").unwrap();
    assert_eq!(sent.thread_id, Some(ThreadId::new("thread-m1")));

    let records = h.mailbox.sent.lock().unwrap();
    assert_eq!(records[0].thread_id, Some(ThreadId::new("thread-m1")));

    let text = decode_raw(&records[0].raw);
    assert!(text.contains("To: Prof <prof@mcmaster.ca>\r\n"));
    assert!(text.contains("Subject: Re: Midterm room change\r\n"));
    assert!(text.contains("In-Reply-To: <a@x>\r\n"));
    assert!(text.contains("References: <a@x>\r\n"));
    assert_eq!(decode_body(&text), "See you there");
}

#[test]
fn test_reply_extends_reference_chain() {
    let h = harness();
    let token = login(&h);

    h.service.reply(Some(&token), "m4", "Done").unwrap();

    let records = h.mailbox.sent.lock().unwrap();
    let text = decode_raw(&records[0].raw);
    // Lowercase header names on the original still resolve
    assert!(text.contains("Subject: Re: Lab 3\r\n"));
    assert!(!text.contains("Re: Re:"));
    assert!(text.contains("In-Reply-To: <c@x>\r\n"));
    assert!(text.contains("References: <b@x> <c@x>\r\n"));
}

#[test]
fn test_reply_to_missing_message() {
    let h = harness();
    let token = login(&h);

    let err = h.service.reply(Some(&token), "nope", "hello").unwrap_err();
    assert!(matches!(err, ServiceError::Upstream(_)));
    assert!(h.mailbox.sent.lock().unwrap().is_empty());
}

// === Refresh ===

#[test]
fn test_expired_token_refreshed_once_and_persisted() {
    let auth = FakeAuth {
        token_lifetime: Duration::seconds(-60),
        ..FakeAuth::new()
    };
    let h = harness_with(auth, FakeMailbox::with_messages(sample_inbox()));
    let token = login(&h);

    h.service.list_messages(Some(&token), None, 50).unwrap();
    h.service.get_message(Some(&token), "m1").unwrap();

    assert_eq!(h.auth.refreshes.load(Ordering::SeqCst), 1);
    let tokens = h.mailbox.tokens_seen.lock().unwrap();
    assert!(tokens.iter().all(|t| t == "refreshed-1"));

    let id = unclutter_mail::SessionId::from_bearer(&token).unwrap();
    let session = h.store.get(&id).unwrap().unwrap();
    assert_eq!(session.credential.access_token, "refreshed-1");
    assert_eq!(session.credential.refresh_token.as_deref(), Some("refresh-token"));
}

#[test]
fn test_concurrent_requests_share_one_refresh() {
    let auth = FakeAuth {
        token_lifetime: Duration::seconds(-60),
        ..FakeAuth::new()
    };
    let h = harness_with(auth, FakeMailbox::with_messages(sample_inbox()));
    let token = login(&h);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| h.service.get_message(Some(&token), "m3").unwrap());
        }
    });

    assert_eq!(h.auth.refreshes.load(Ordering::SeqCst), 1);
    let sent_tokens = h.mailbox.tokens_seen.lock().unwrap();
    assert_eq!(sent_tokens.len(), 4);
    assert!(sent_tokens.iter().all(|t| t == "refreshed-1"));
}

#[test]
fn test_send_uses_refreshed_token() {
    let auth = FakeAuth {
        token_lifetime: Duration::seconds(10),
        ..FakeAuth::new()
    };
    let h = harness_with(auth, FakeMailbox::default());
    let token = login(&h);

    h.service
        .send(Some(&token), "you@example.com", "Hi", "Body")
        .unwrap();

    let records = h.mailbox.sent.lock().unwrap();
    assert_eq!(records[0].access_token, "refreshed-1");
}
