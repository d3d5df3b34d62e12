// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pairs the request and response halves of each transaction.
//!
//! Halves may arrive in either order and in different batches. A half-seen transaction waits
//! in the pending map for as long as the reconciler lives; it is emitted exactly once, in the
//! batch that supplies its last missing field, and then forgotten.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use hashbrown::HashMap;
use tracing::debug;

use crate::record::LogRecord;

#[derive(Debug, Clone, Default)]
struct PendingTransaction {
    /// Set from the first half that carries a parseable time, then frozen.
    timestamp: Option<DateTime<FixedOffset>>,
    resource: Option<String>,
    format: Option<String>,
    user_agent: Option<String>,
    object_count: Option<u64>,
}

impl PendingTransaction {
    fn merge(&mut self, record: LogRecord) {
        if self.timestamp.is_none() {
            self.timestamp = record.timestamp();
        }
        match record {
            LogRecord::Request {
                resource,
                format,
                user_agent,
                ..
            } => {
                self.resource.get_or_insert(resource);
                if self.format.is_none() {
                    self.format = format;
                }
                if self.user_agent.is_none() {
                    self.user_agent = user_agent;
                }
            }
            LogRecord::Response { object_count, .. } => {
                self.object_count.get_or_insert(object_count);
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.resource.is_some() && self.object_count.is_some() && self.timestamp.is_some()
    }

    fn complete(self, txn_id: String) -> Option<CompletedTransaction> {
        Some(CompletedTransaction {
            txn_id,
            resource: self.resource?,
            format: self.format.unwrap_or_default(),
            user_agent: self.user_agent.unwrap_or_default(),
            object_count: self.object_count?,
            timestamp: self.timestamp?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransaction {
    pub txn_id: String,
    pub resource: String,
    pub format: String,
    pub user_agent: String,
    pub object_count: u64,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub lines: u64,
    pub malformed: u64,
    pub completed: u64,
    pub evicted: u64,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    pending: HashMap<String, PendingTransaction>,
    /// Newest log time seen so far; the clock for pending expiry.
    latest_seen: Option<DateTime<FixedOffset>>,
    stats: ReconcilerStats,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and merges every line, returning the transactions completed by this batch in
    /// completion order. Malformed lines are counted and skipped.
    pub fn process_batch<L: AsRef<[u8]>>(&mut self, lines: &[L]) -> Vec<CompletedTransaction> {
        let mut completed = Vec::new();
        let mut malformed = 0_u64;

        for line in lines {
            self.stats.lines += 1;
            let record = match LogRecord::parse(line.as_ref()) {
                Ok(record) => record,
                Err(e) => {
                    malformed += 1;
                    debug!("Skipping log line: {e}");
                    continue;
                }
            };
            if let Some(timestamp) = record.timestamp() {
                if self.latest_seen.map_or(true, |latest| timestamp > latest) {
                    self.latest_seen = Some(timestamp);
                }
            }
            if let Some(transaction) = self.observe(record) {
                completed.push(transaction);
            }
        }

        self.stats.malformed += malformed;
        self.stats.completed += completed.len() as u64;
        if malformed > 0 {
            debug!("Skipped {malformed} malformed lines in batch");
        }
        completed
    }

    fn observe(&mut self, record: LogRecord) -> Option<CompletedTransaction> {
        let txn_id = record.txn_id().to_string();
        let pending = self.pending.entry(txn_id.clone()).or_default();
        pending.merge(record);
        if !pending.is_complete() {
            return None;
        }
        self.pending
            .remove(&txn_id)
            .and_then(|pending| pending.complete(txn_id))
    }

    /// Drops pending transactions first seen more than `max_age` before the newest log time.
    /// Entries without a known time are kept.
    pub fn evict_older_than(&mut self, max_age: Duration) -> usize {
        let Some(latest) = self.latest_seen else {
            return 0;
        };
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let before = self.pending.len();
        self.pending.retain(|_, pending| {
            pending
                .timestamp
                .map_or(true, |timestamp| latest - timestamp <= max_age)
        });
        let evicted = before - self.pending.len();
        if evicted > 0 {
            debug!("Evicted {evicted} pending transactions older than {max_age}");
        }
        self.stats.evicted += evicted as u64;
        evicted
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, txn_id: &str) -> bool {
        self.pending.contains_key(txn_id)
    }

    pub fn stats(&self) -> ReconcilerStats {
        self.stats
    }
}
