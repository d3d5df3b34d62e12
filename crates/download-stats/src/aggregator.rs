// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;
use hashbrown::HashMap;
use tracing::warn;

use crate::reconciler::CompletedTransaction;

/// Bucket key: the requested resource and the calendar day of the transaction, taken in the
/// offset the log line was written with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub resource: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateValue {
    /// Format of the first transaction that opened the bucket.
    pub format: String,
    pub request_count: u64,
    pub object_count: u64,
}

/// Per-batch buckets of human traffic.
#[derive(Debug, Default)]
pub struct Aggregator {
    buckets: HashMap<AggregateKey, AggregateValue>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, transaction: &CompletedTransaction) {
        let key = AggregateKey {
            resource: transaction.resource.clone(),
            date: transaction.timestamp.date_naive(),
        };
        let bucket = self.buckets.entry(key).or_insert_with(|| AggregateValue {
            format: transaction.format.clone(),
            request_count: 0,
            object_count: 0,
        });
        bucket.request_count = bucket.request_count.saturating_add(1);
        bucket.object_count = match bucket.object_count.checked_add(transaction.object_count) {
            Some(total) => total,
            None => {
                warn!(
                    "Object count for {} overflowed at transaction {}, capping",
                    transaction.resource, transaction.txn_id
                );
                u64::MAX
            }
        };
    }

    pub fn get(&self, key: &AggregateKey) -> Option<&AggregateValue> {
        self.buckets.get(key)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Takes every bucket, ordered by resource then date, leaving the aggregator empty.
    pub fn consume(&mut self) -> Vec<(AggregateKey, AggregateValue)> {
        let mut buckets: Vec<_> = self.buckets.drain().collect();
        buckets.sort_by(|(a, _), (b, _)| a.cmp(b));
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_timestamp;
    use tracing_test::traced_test;

    fn transaction(resource: &str, format: &str, objects: u64, time: &str) -> CompletedTransaction {
        CompletedTransaction {
            txn_id: format!("{resource}-{time}"),
            resource: resource.to_string(),
            format: format.to_string(),
            user_agent: "HTTPie/3.2.1".to_string(),
            object_count: objects,
            timestamp: parse_timestamp(time).unwrap(),
        }
    }

    fn key(resource: &str, date: &str) -> AggregateKey {
        AggregateKey {
            resource: resource.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    #[test]
    fn test_sums_per_resource_and_day() {
        let mut aggregator = Aggregator::new();
        aggregator.insert(&transaction("M", "html", 1, "2000-01-01T01:00:00Z"));
        aggregator.insert(&transaction("M", "html", 5, "2000-01-01T12:00:00Z"));
        aggregator.insert(&transaction("M", "html", 1, "2000-01-01T23:59:59Z"));

        assert_eq!(aggregator.len(), 1);
        assert_eq!(
            aggregator.get(&key("M", "2000-01-01")),
            Some(&AggregateValue {
                format: "html".to_string(),
                request_count: 3,
                object_count: 7,
            })
        );
    }

    #[test]
    fn test_separate_buckets_for_days_and_resources() {
        let mut aggregator = Aggregator::new();
        aggregator.insert(&transaction("M", "html", 1, "2000-01-01T10:00:00Z"));
        aggregator.insert(&transaction("M", "html", 1, "2000-01-02T10:00:00Z"));
        aggregator.insert(&transaction("N", "csv", 2, "2000-01-01T10:00:00Z"));
        assert_eq!(aggregator.len(), 3);
    }

    #[test]
    fn test_day_follows_the_logged_offset() {
        let mut aggregator = Aggregator::new();
        aggregator.insert(&transaction("M", "html", 1, "2000-01-01T23:30:00-05:00"));
        assert!(aggregator.get(&key("M", "2000-01-01")).is_some());
    }

    #[test]
    fn test_first_format_wins() {
        let mut aggregator = Aggregator::new();
        aggregator.insert(&transaction("M", "html", 1, "2000-01-01T10:00:00Z"));
        aggregator.insert(&transaction("M", "json", 1, "2000-01-01T11:00:00Z"));
        assert_eq!(aggregator.get(&key("M", "2000-01-01")).unwrap().format, "html");
    }

    #[test]
    #[traced_test]
    fn test_object_count_saturates_instead_of_overflowing() {
        let mut aggregator = Aggregator::new();
        aggregator.insert(&transaction("M", "html", u64::MAX, "2000-01-01T10:00:00Z"));
        aggregator.insert(&transaction("M", "html", 1, "2000-01-01T11:00:00Z"));

        let bucket = aggregator.get(&key("M", "2000-01-01")).unwrap();
        assert_eq!(bucket.object_count, u64::MAX);
        assert_eq!(bucket.request_count, 2);
        assert!(logs_contain("overflowed"));
    }

    #[test]
    fn test_consume_drains_in_order() {
        let mut aggregator = Aggregator::new();
        aggregator.insert(&transaction("N", "csv", 2, "2000-01-01T10:00:00Z"));
        aggregator.insert(&transaction("M", "html", 1, "2000-01-02T10:00:00Z"));
        aggregator.insert(&transaction("M", "html", 1, "2000-01-01T10:00:00Z"));

        let buckets = aggregator.consume();
        let keys: Vec<AggregateKey> = buckets.into_iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![key("M", "2000-01-01"), key("M", "2000-01-02"), key("N", "2000-01-01")]
        );
        assert!(aggregator.is_empty());
    }
}
