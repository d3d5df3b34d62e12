// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Access log records.
//!
//! Each transaction is logged as two JSON lines sharing a `txn` id:
//!
//! ```text
//! {"time": "2000-01-01T10:00:00.000000+00:00", "txn": "A", "type": "request", "model": "M", "format": "html", "agent": "HTTPie/3.2.1"}
//! {"time": "2000-01-01T10:00:00.250000+00:00", "txn": "A", "type": "response", "objects": 1}
//! ```

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use tracing::warn;

use crate::errors::MalformedLine;

#[derive(Debug, Deserialize)]
struct RawRecord {
    time: Option<String>,
    txn: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    model: Option<String>,
    format: Option<String>,
    agent: Option<String>,
    objects: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Request {
        timestamp: Option<DateTime<FixedOffset>>,
        resource: String,
        format: Option<String>,
        user_agent: Option<String>,
        txn_id: String,
    },
    Response {
        timestamp: Option<DateTime<FixedOffset>>,
        object_count: u64,
        txn_id: String,
    },
}

impl LogRecord {
    pub fn parse(line: &[u8]) -> Result<LogRecord, MalformedLine> {
        let raw: RawRecord = serde_json::from_slice(line)?;
        let txn_id = raw
            .txn
            .filter(|txn| !txn.is_empty())
            .ok_or(MalformedLine::MissingField("txn"))?;
        let kind = raw.kind.ok_or(MalformedLine::MissingField("type"))?;

        let timestamp = match raw.time.as_deref() {
            Some(time) => {
                let parsed = parse_timestamp(time);
                if parsed.is_none() {
                    warn!("Unknown timestamp format {time:?} in transaction {txn_id}");
                }
                parsed
            }
            None => {
                warn!("Missing timestamp in transaction {txn_id}");
                None
            }
        };

        match kind.as_str() {
            "request" => Ok(LogRecord::Request {
                timestamp,
                resource: raw.model.ok_or(MalformedLine::MissingField("model"))?,
                format: raw.format,
                user_agent: raw.agent,
                txn_id,
            }),
            "response" => Ok(LogRecord::Response {
                timestamp,
                object_count: raw.objects.ok_or(MalformedLine::MissingField("objects"))?,
                txn_id,
            }),
            _ => Err(MalformedLine::UnknownType(kind)),
        }
    }

    pub fn txn_id(&self) -> &str {
        match self {
            LogRecord::Request { txn_id, .. } | LogRecord::Response { txn_id, .. } => txn_id,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            LogRecord::Request { timestamp, .. } | LogRecord::Response { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

/// RFC 3339 first; timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use tracing_test::traced_test;

    #[test]
    fn test_parse_request() {
        let record = LogRecord::parse(
            br#"{"time": "2000-01-01T10:00:00.123456+00:00", "txn": "A", "type": "request", "model": "M", "format": "html", "agent": "HTTPie/3.2.1", "ip": "10.0.0.1"}"#,
        )
        .unwrap();
        match record {
            LogRecord::Request {
                timestamp,
                resource,
                format,
                user_agent,
                txn_id,
            } => {
                let timestamp = timestamp.unwrap();
                assert_eq!(timestamp.year(), 2000);
                assert_eq!(timestamp.nanosecond(), 123_456_000);
                assert_eq!(resource, "M");
                assert_eq!(format.as_deref(), Some("html"));
                assert_eq!(user_agent.as_deref(), Some("HTTPie/3.2.1"));
                assert_eq!(txn_id, "A");
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_response() {
        let record = LogRecord::parse(
            br#"{"time": "2000-01-01T10:00:01Z", "txn": "A", "type": "response", "objects": 5}"#,
        )
        .unwrap();
        assert_eq!(record.txn_id(), "A");
        assert!(matches!(
            record,
            LogRecord::Response {
                object_count: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            LogRecord::parse(b"GET /index.html 200"),
            Err(MalformedLine::Json(_))
        ));
        assert!(matches!(
            LogRecord::parse(br#"{"time": "2000-01-01T10:00:00Z", "type": "response", "objects": 1}"#),
            Err(MalformedLine::MissingField("txn"))
        ));
        assert!(matches!(
            LogRecord::parse(br#"{"time": "2000-01-01T10:00:00Z", "txn": "A", "type": "response"}"#),
            Err(MalformedLine::MissingField("objects"))
        ));
        assert!(matches!(
            LogRecord::parse(br#"{"time": "2000-01-01T10:00:00Z", "txn": "A", "type": "ping"}"#),
            Err(MalformedLine::UnknownType(_))
        ));
        assert!(matches!(
            LogRecord::parse(b"\xff\xfe"),
            Err(MalformedLine::Json(_))
        ));
    }

    #[test]
    #[traced_test]
    fn test_unknown_timestamp_keeps_other_fields() {
        let record = LogRecord::parse(
            br#"{"time": "yesterday", "txn": "A", "type": "request", "model": "M"}"#,
        )
        .unwrap();
        assert_eq!(record.timestamp(), None);
        assert_eq!(record.txn_id(), "A");
        assert!(logs_contain("Unknown timestamp format"));
    }

    #[test]
    fn test_parse_timestamp_without_offset_is_utc() {
        let timestamp = parse_timestamp("2000-01-01T23:59:59.999999").unwrap();
        assert_eq!(timestamp.offset().local_minus_utc(), 0);
        assert_eq!(timestamp.day(), 1);
        assert!(parse_timestamp("01/01/2000").is_none());
    }
}
