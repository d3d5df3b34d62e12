// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Number of log lines handed to the reconciler at a time.
pub const BATCH_SIZE: usize = 1_000;

/// Per-request timeout for aggregate delivery.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_TARGET_URL: &str = "http://localhost:8000/api/downloads-stats/";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/download-stats/config.json";
pub const DEFAULT_STATE_PATH: &str = "/var/lib/download-stats/state.json";
pub const DEFAULT_BOTS_STATUS_PATH: &str = "/var/lib/download-stats/bots.json";

/// Family reported for agents that match no known client.
pub const UNKNOWN_FAMILY: &str = "unknown";

/// Format of the `time` field posted with each aggregate.
pub const REPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Client families that are always treated as automated traffic.
///
/// The configured `bots` list is added to this set, never substituted for it.
pub const BUILTIN_BOT_FAMILIES: &[&str] = &[
    "AhrefsBot",
    "Amazonbot",
    "Applebot",
    "Baiduspider",
    "bingbot",
    "BLEXBot",
    "Bytespider",
    "CCBot",
    "ClaudeBot",
    "DataForSeoBot",
    "DotBot",
    "DuckDuckBot",
    "facebookexternalhit",
    "Googlebot",
    "GPTBot",
    "ia_archiver",
    "MJ12bot",
    "PetalBot",
    "SemrushBot",
    "SeznamBot",
    "Slurp",
    "Sogou web spider",
    "YandexBot",
];
