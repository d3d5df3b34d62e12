// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cumulative bot hit counters.
//!
//! On disk: `{"agents": {"SemrushBot": 3, "Googlebot": 0}}`. The counters survive runs and are
//! rewritten after every batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StoreError;
use crate::store::StateStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotHitCounters {
    #[serde(default)]
    pub agents: BTreeMap<String, u64>,
}

impl BotHitCounters {
    pub fn get(&self, family: &str) -> u64 {
        self.agents.get(family).copied().unwrap_or(0)
    }

    /// Overlays `persisted` on top of `self`; persisted values win.
    fn merge(&mut self, persisted: BotHitCounters) {
        self.agents.extend(persisted.agents);
    }
}

pub struct BotStatusStore {
    backend: Box<dyn StateStore<BotHitCounters>>,
    counters: BotHitCounters,
}

impl BotStatusStore {
    /// Seeds every given family with 0 and merges the persisted counters over it.
    pub fn open<'a>(
        backend: Box<dyn StateStore<BotHitCounters>>,
        families: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, StoreError> {
        let mut counters = BotHitCounters {
            agents: families
                .into_iter()
                .map(|family| (family.to_string(), 0))
                .collect(),
        };
        if let Some(persisted) = backend.load()? {
            counters.merge(persisted);
        }
        Ok(Self { backend, counters })
    }

    pub fn on_bot_hit(&mut self, family: &str) {
        let count = self.counters.agents.entry(family.to_string()).or_insert(0);
        *count += 1;
        debug!("Bot hit from {family}, {count} so far");
    }

    pub fn counters(&self) -> &BotHitCounters {
        &self.counters
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.backend.save(&self.counters)
    }
}
