// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Resumable access-log aggregation for download statistics.
//!
//! A run tails one append-only access log from the last recorded byte offset, pairs the
//! request and response halves of every transaction, drops traffic from automated clients,
//! sums the remaining downloads per resource and day, and posts one aggregate per bucket to
//! the statistics endpoint at the end of every batch.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod api_key;
pub mod bot_status;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod errors;
pub mod flusher;
pub mod http;
pub mod pipeline;
pub mod reader;
pub mod reconciler;
pub mod record;
pub mod store;
