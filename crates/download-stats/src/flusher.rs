// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of per-batch aggregates to the statistics endpoint.
//!
//! Every bucket becomes its own POST, sent one after the other. Delivery is best effort and at
//! most once: a failed POST is logged and dropped, never retried or re-queued, and the
//! aggregator is emptied before anything is sent.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, error};

use crate::aggregator::{AggregateKey, AggregateValue, Aggregator};
use crate::api_key::ApiKey;
use crate::constants::REPORT_TIME_FORMAT;
use crate::http::get_client;

/// Body of one aggregate POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatePayload {
    pub source: String,
    pub model: String,
    pub format: String,
    /// Midnight of the bucket day, `YYYY-MM-DD HH:MM:SS`.
    pub time: String,
    pub requests: u64,
    pub objects: u64,
}

impl AggregatePayload {
    pub fn new(source: &str, key: &AggregateKey, value: &AggregateValue) -> Self {
        let midnight = key.date.and_time(chrono::NaiveTime::MIN);
        Self {
            source: source.to_string(),
            model: key.resource.clone(),
            format: value.format.clone(),
            time: midnight.format(REPORT_TIME_FORMAT).to_string(),
            requests: value.request_count,
            objects: value.object_count,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    #[error("Failed to prepare request: {0}")]
    Payload(String),
    #[error("Error shipping data: {0:?} {1}")]
    Destination(Option<StatusCode>, String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub attempted: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl std::ops::AddAssign for FlushOutcome {
    fn add_assign(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

pub struct FlusherConfig {
    pub api_key: ApiKey,
    /// Full URL of the statistics endpoint.
    pub endpoint: String,
    /// Name reported in the `source` field of every aggregate.
    pub source: String,
    pub https_proxy: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Flusher {
    client: reqwest::Client,
    api_key: ApiKey,
    endpoint: String,
    source: String,
}

impl Flusher {
    pub fn new(config: FlusherConfig) -> Self {
        let client = get_client(config.https_proxy.as_deref(), config.timeout);
        Flusher {
            client,
            api_key: config.api_key,
            endpoint: config.endpoint,
            source: config.source,
        }
    }

    /// Sends every bucket of `aggregator`. The aggregator is left empty whatever the outcome.
    pub async fn flush(&self, aggregator: &mut Aggregator) -> FlushOutcome {
        let buckets = aggregator.consume();
        self.flush_buckets(buckets).await
    }

    pub async fn flush_buckets(&self, buckets: Vec<(AggregateKey, AggregateValue)>) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();
        if buckets.is_empty() {
            return outcome;
        }
        debug!("Flushing {} aggregates to {}", buckets.len(), self.endpoint);

        for (key, value) in &buckets {
            let payload = AggregatePayload::new(&self.source, key, value);
            outcome.attempted += 1;
            match self.ship(&payload).await {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.failed += 1;
                    error!(
                        "Dropping aggregate for {} on {}: {e}",
                        payload.model, payload.time
                    );
                }
            }
        }

        if outcome.failed == 0 {
            debug!("Successfully flushed {} aggregates", outcome.delivered);
        } else {
            error!(
                "Failed to flush {} of {} aggregates",
                outcome.failed, outcome.attempted
            );
        }
        outcome
    }

    pub async fn ship(&self, payload: &AggregatePayload) -> Result<(), ShippingError> {
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.api_key.authorization_header())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    ShippingError::Payload(e.to_string())
                } else {
                    ShippingError::Destination(e.status(), e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(
                "Delivered aggregate for {} in {} ms",
                payload.model,
                start.elapsed().as_millis()
            );
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ShippingError::Destination(Some(status), body))
    }
}
