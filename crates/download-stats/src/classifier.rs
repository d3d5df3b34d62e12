// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! User-agent sniffing.
//!
//! A raw user-agent string is reduced to a client family (`"Chrome"`, `"HTTPie"`,
//! `"SemrushBot"`, ...) by the first matching rule below; the family is then looked up in the
//! bot set. Rules go from specific tools, through the generic `*bot`/`*spider`/`*crawler`
//! token, to browsers, and finally the leading product token.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::constants::{BUILTIN_BOT_FAMILIES, UNKNOWN_FAMILY};

struct FamilyRule {
    pattern: Regex,
    /// Fixed family name, or `None` to use the first capture group.
    family: Option<&'static str>,
}

const RULES: &[(&str, Option<&str>)] = &[
    (r"HTTPie/", Some("HTTPie")),
    (r"^curl/", Some("curl")),
    (r"^Wget/", Some("Wget")),
    (r"python-requests/", Some("Python Requests")),
    (r"(?i)^python-urllib", Some("Python-urllib")),
    (r"Go-http-client/", Some("Go-http-client")),
    (r"okhttp/", Some("okhttp")),
    (r"facebookexternalhit", Some("facebookexternalhit")),
    (r"ia_archiver", Some("ia_archiver")),
    (r"Yahoo! Slurp", Some("Slurp")),
    (r"Sogou web spider", Some("Sogou web spider")),
    (
        r"\b([A-Za-z][A-Za-z0-9_\-]*(?:[Bb]ot|[Ss]pider|[Cc]rawler))\b",
        None,
    ),
    (r"Edg(?:e|A|iOS)?/", Some("Edge")),
    (r"OPR/|Opera", Some("Opera")),
    (r"(?:Firefox|FxiOS)/", Some("Firefox")),
    (r"(?:Chrome|CriOS|Chromium)/", Some("Chrome")),
    (r"Version/[\d.]+.*Safari/", Some("Safari")),
    (r"MSIE |Trident/", Some("IE")),
    (r"^([A-Za-z][A-Za-z0-9_\-.]*)/\d", None),
];

#[allow(clippy::expect_used)]
fn rules() -> &'static [FamilyRule] {
    static COMPILED: OnceLock<Vec<FamilyRule>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|(pattern, family)| FamilyRule {
                pattern: Regex::new(pattern).expect("built-in user-agent pattern is valid"),
                family: *family,
            })
            .collect()
    })
}

/// Client family of a raw user-agent string; [`UNKNOWN_FAMILY`] when nothing matches.
pub fn classify(user_agent: &str) -> String {
    let user_agent = user_agent.trim();
    if user_agent.is_empty() {
        return UNKNOWN_FAMILY.to_string();
    }
    for rule in rules() {
        let Some(captures) = rule.pattern.captures(user_agent) else {
            continue;
        };
        let family = match rule.family {
            Some(family) => family,
            None => match captures.get(1) {
                Some(token) => token.as_str(),
                None => continue,
            },
        };
        // Every browser claims to be Mozilla; that says nothing about the client.
        if family == "Mozilla" {
            continue;
        }
        return family.to_string();
    }
    UNKNOWN_FAMILY.to_string()
}

/// Classifies user agents and tells bots from humans.
#[derive(Debug, Clone)]
pub struct BotClassifier {
    bots: HashSet<String>,
}

impl Default for BotClassifier {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl BotClassifier {
    /// Built-in bot families plus `extra`.
    pub fn new<S: AsRef<str>>(extra: impl IntoIterator<Item = S>) -> Self {
        let mut bots: HashSet<String> = BUILTIN_BOT_FAMILIES
            .iter()
            .map(|family| family.to_string())
            .collect();
        bots.extend(extra.into_iter().map(|family| family.as_ref().to_string()));
        Self { bots }
    }

    pub fn classify(&self, user_agent: &str) -> String {
        classify(user_agent)
    }

    pub fn is_bot(&self, family: &str) -> bool {
        self.bots.contains(family)
    }

    pub fn bot_families(&self) -> impl Iterator<Item = &str> {
        self.bots.iter().map(String::as_str)
    }
}
