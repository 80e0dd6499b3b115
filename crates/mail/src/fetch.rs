//! Concurrent message listing
//!
//! Gmail's list endpoint only returns IDs, so every entry of a listing costs
//! one metadata request. [`MessageFetcher`] fans those requests out over a
//! bounded worker pool, joins the results, and sorts them so the output order
//! never depends on which request finished first.

use anyhow::{Context, Result};
use log::{debug, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::cmp::Reverse;

use crate::gmail::{Mailbox, to_summary};
use crate::models::{Credential, MessageId, MessageSummary};

/// Headers requested for every list entry
pub const SUMMARY_HEADERS: [&str; 3] = ["From", "Subject", "Date"];

/// Result of a listing
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageListing {
    /// Successfully fetched messages, sorted
    pub messages: Vec<MessageSummary>,
    /// Number of IDs that were fetched (after the list limit was applied)
    pub requested: usize,
    /// Number of IDs whose fetch failed and were left out
    pub failed: usize,
}

impl MessageListing {
    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }
}

/// Fetches message summaries on a dedicated worker pool
pub struct MessageFetcher {
    pool: ThreadPool,
    list_limit: usize,
}

impl MessageFetcher {
    /// Create a fetcher with `workers` threads that fetches at most `list_limit` IDs per call
    pub fn new(workers: usize, list_limit: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("unclutter-fetch-{}", i))
            .build()
            .context("Failed to build fetch worker pool")?;

        Ok(Self { pool, list_limit })
    }

    pub fn list_limit(&self) -> usize {
        self.list_limit
    }

    /// Fetch, normalize and categorize `ids`, newest first
    pub fn fetch_recent(
        &self,
        mailbox: &dyn Mailbox,
        credential: &Credential,
        ids: &[MessageId],
    ) -> MessageListing {
        self.fetch_all(mailbox, credential, ids, MessageSummary::timestamp_or_zero, true)
    }

    /// Fetch, normalize and categorize `ids`, sorted by `sort_key`
    ///
    /// Blocks until every request has completed or failed. Failed IDs are
    /// logged and counted but produce no entry. The sort is stable, so
    /// entries with equal keys keep their input order.
    pub fn fetch_all<K, F>(
        &self,
        mailbox: &dyn Mailbox,
        credential: &Credential,
        ids: &[MessageId],
        sort_key: F,
        descending: bool,
    ) -> MessageListing
    where
        K: Ord,
        F: Fn(&MessageSummary) -> K,
    {
        let ids = &ids[..ids.len().min(self.list_limit)];
        debug!("Fetching {} messages", ids.len());

        // collect() on an indexed parallel iterator preserves input order
        let results: Vec<Option<MessageSummary>> = self.pool.install(|| {
            ids.par_iter()
                .map(|id| fetch_summary(mailbox, credential, id))
                .collect()
        });

        let requested = ids.len();
        let mut messages: Vec<MessageSummary> = results.into_iter().flatten().collect();
        let failed = requested - messages.len();

        if descending {
            messages.sort_by_key(|m| Reverse(sort_key(m)));
        } else {
            messages.sort_by_key(|m| sort_key(m));
        }

        MessageListing {
            messages,
            requested,
            failed,
        }
    }
}

fn fetch_summary(
    mailbox: &dyn Mailbox,
    credential: &Credential,
    id: &MessageId,
) -> Option<MessageSummary> {
    match mailbox.get_message_metadata(credential, id, &SUMMARY_HEADERS) {
        Ok(msg) => Some(to_summary(msg)),
        Err(e) => {
            warn!("Failed to fetch message {}: {:#}", id.as_str(), e);
            None
        }
    }
}
