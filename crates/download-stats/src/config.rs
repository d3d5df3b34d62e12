// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::api_key::ApiKey;
use crate::errors::ConfigError;

#[derive(Debug, Deserialize)]
struct RawAuth {
    secret: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    auth: RawAuth,
    #[serde(default)]
    bots: Vec<String>,
    #[serde(default)]
    pending_max_age_secs: Option<u64>,
}

/// Settings read from the JSON config file.
///
/// ```json
/// {"auth": {"secret": "s3cr3t"}, "bots": ["MyCrawler"], "pending_max_age_secs": 86400}
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: ApiKey,
    /// Extra bot families, added to the built-in set.
    pub bots: Vec<String>,
    /// Drop pending transactions older than this, measured in log time. `None` keeps them forever.
    pub pending_max_age: Option<Duration>,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Config::from_raw(raw)
    }

    pub fn from_json(contents: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        Config::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Config, ConfigError> {
        if raw.auth.secret.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.secret is empty".to_string()));
        }
        let bots = raw
            .bots
            .into_iter()
            .map(|bot| bot.trim().to_string())
            .filter(|bot| !bot.is_empty())
            .collect();
        Ok(Config {
            api_key: ApiKey::new(&raw.auth.secret),
            bots,
            pending_max_age: raw.pending_max_age_secs.map(Duration::from_secs),
        })
    }
}
