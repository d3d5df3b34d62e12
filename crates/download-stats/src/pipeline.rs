// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One run over one log source.
//!
//! ```text
//!   cursor ──> LineReader ──batch──> Reconciler ──completed──> BotClassifier
//!                                                               │        │
//!                                                           bot │        │ human
//!                                                               v        v
//!                                                      BotStatusStore  Aggregator
//!                                                                          │ end of batch
//!                                                                          v
//!                                                                       Flusher
//! ```
//!
//! Bot counters are rewritten after every batch. The cursor is only written once the whole
//! file has been consumed, so a crash replays the run from the previous position.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::aggregator::Aggregator;
use crate::bot_status::BotStatusStore;
use crate::classifier::BotClassifier;
use crate::constants::BATCH_SIZE;
use crate::cursor::CursorStore;
use crate::errors::RunError;
use crate::flusher::{FlushOutcome, Flusher};
use crate::reader::LineReader;
use crate::reconciler::{CompletedTransaction, Reconciler};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub log_path: PathBuf,
    pub batch_size: usize,
    pub pending_max_age: Option<Duration>,
}

impl RunOptions {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            batch_size: BATCH_SIZE,
            pending_max_age: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// The file had the recorded size; nothing was read or sent.
    pub no_new_data: bool,
    pub batches: u64,
    pub lines: u64,
    pub malformed: u64,
    pub completed: u64,
    pub bot_hits: u64,
    pub humans: u64,
    pub deliveries: FlushOutcome,
    pub start_offset: u64,
    pub end_offset: u64,
    pub pending: usize,
}

pub struct Pipeline {
    options: RunOptions,
    cursor: CursorStore,
    bot_status: BotStatusStore,
    classifier: BotClassifier,
    reconciler: Reconciler,
    aggregator: Aggregator,
    flusher: Flusher,
}

impl Pipeline {
    pub fn new(
        options: RunOptions,
        cursor: CursorStore,
        bot_status: BotStatusStore,
        classifier: BotClassifier,
        flusher: Flusher,
    ) -> Self {
        Self {
            options,
            cursor,
            bot_status,
            classifier,
            reconciler: Reconciler::new(),
            aggregator: Aggregator::new(),
            flusher,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn bot_status(&self) -> &BotStatusStore {
        &self.bot_status
    }

    pub fn cursor(&self) -> &CursorStore {
        &self.cursor
    }

    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        let path = self.options.log_path.clone();
        let io_error = |source: std::io::Error| RunError::Io {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RunError::SourceNotFound(path.clone()),
            _ => io_error(e),
        })?;
        let size = file.metadata().map_err(io_error)?.len();
        let source = path.canonicalize().map_err(io_error)?;

        let mut summary = RunSummary::default();
        if !self.cursor.should_process(&source, size) {
            info!(
                "No new data in {} since last run ({size} bytes)",
                source.display()
            );
            summary.no_new_data = true;
            summary.start_offset = self.cursor.seek_offset(&source);
            summary.end_offset = summary.start_offset;
            summary.pending = self.reconciler.pending_len();
            return Ok(summary);
        }

        let before = self.reconciler.stats();
        let start_offset = self.cursor.resume_offset(&source, size);
        summary.start_offset = start_offset;
        summary.end_offset = start_offset;
        debug!(
            "Reading {} from offset {start_offset} up to {size}",
            source.display()
        );

        let reader = LineReader::from_file(file, size, start_offset).map_err(io_error)?;
        for batch in reader.batches(self.options.batch_size) {
            let batch = batch.map_err(io_error)?;
            let completed = self.reconciler.process_batch(&batch.lines);
            for transaction in completed {
                self.record_transaction(transaction, &mut summary);
            }
            if let Some(max_age) = self.options.pending_max_age {
                self.reconciler.evict_older_than(max_age);
            }

            let outcome = self.flusher.flush(&mut self.aggregator).await;
            self.bot_status.save()?;

            summary.batches += 1;
            summary.deliveries += outcome;
            summary.end_offset = batch.end_offset;
            debug!(
                "Batch {} done: {} lines, offset {}, {} pending",
                summary.batches,
                batch.lines.len(),
                batch.end_offset,
                self.reconciler.pending_len()
            );
        }

        self.cursor.record(&source, size, summary.end_offset)?;

        let stats = self.reconciler.stats();
        summary.lines = stats.lines - before.lines;
        summary.malformed = stats.malformed - before.malformed;
        summary.completed = stats.completed - before.completed;
        summary.pending = self.reconciler.pending_len();
        log_summary(&source, &summary);
        Ok(summary)
    }

    fn record_transaction(&mut self, transaction: CompletedTransaction, summary: &mut RunSummary) {
        let family = self.classifier.classify(&transaction.user_agent);
        if self.classifier.is_bot(&family) {
            self.bot_status.on_bot_hit(&family);
            summary.bot_hits += 1;
            return;
        }
        self.aggregator.insert(&transaction);
        summary.humans += 1;
    }
}

fn log_summary(source: &Path, summary: &RunSummary) {
    info!(
        "Processed {}: {} lines in {} batches ({} malformed), {} transactions ({} human, {} bot), {} aggregates delivered, {} failed, {} pending, offset {} -> {}",
        source.display(),
        summary.lines,
        summary.batches,
        summary.malformed,
        summary.completed,
        summary.humans,
        summary.bot_hits,
        summary.deliveries.delivered,
        summary.deliveries.failed,
        summary.pending,
        summary.start_offset,
        summary.end_offset,
    );
}
