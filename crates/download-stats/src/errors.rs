// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Errors raised while reading the JSON config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by the persisted cursor and bot status state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access state file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize state file {}: {source}", .path.display())]
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reasons a log line is skipped. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum MalformedLine {
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unknown record type {0:?}")]
    UnknownType(String),
}

/// Errors that abort a run. Everything per-line or per-delivery is recovered in place.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Log source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StoreError),

    #[error("Failed to read log source {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RunError::SourceNotFound(PathBuf::from("/var/log/portal/access.log"));
        assert_eq!(
            error.to_string(),
            "Log source not found: /var/log/portal/access.log"
        );

        let error = RunError::from(ConfigError::Invalid("auth.secret is empty".to_string()));
        assert_eq!(
            error.to_string(),
            "Invalid configuration: auth.secret is empty"
        );
    }

    #[test]
    fn test_store_error_keeps_path() {
        let error = StoreError::Io {
            path: PathBuf::from("/tmp/state.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(error.to_string().contains("/tmp/state.json"));
        assert!(error.to_string().contains("denied"));
    }
}
