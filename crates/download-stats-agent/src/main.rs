// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use download_stats::{
    bot_status::BotStatusStore,
    classifier::BotClassifier,
    config::Config,
    constants::{
        BATCH_SIZE, DEFAULT_BOTS_STATUS_PATH, DEFAULT_CONFIG_PATH, DEFAULT_STATE_PATH,
        DEFAULT_TARGET_URL, DELIVERY_TIMEOUT,
    },
    cursor::CursorStore,
    errors::RunError,
    flusher::{Flusher, FlusherConfig},
    pipeline::{Pipeline, RunOptions},
    store::JsonFileStore,
};

fn parse_batch_size(s: &str) -> Result<usize, String> {
    let size: usize = s
        .parse()
        .map_err(|e| format!("Invalid batch size: {e}"))?;
    if size == 0 {
        return Err("Batch size must be at least 1".to_string());
    }
    Ok(size)
}

/// Reads new lines of an access log and reports human downloads per resource and day.
#[derive(Parser, Debug)]
#[command(name = "download-stats-agent", version, about, long_about = None)]
struct Args {
    /// Name reported as the source of every aggregate
    #[arg(env = "DOWNLOAD_STATS_SOURCE")]
    source: String,

    /// Access log to read
    #[arg(env = "DOWNLOAD_STATS_LOG_FILE")]
    log_file: PathBuf,

    /// Statistics endpoint receiving one POST per aggregate
    #[arg(long, env = "DOWNLOAD_STATS_URL", default_value = DEFAULT_TARGET_URL)]
    url: String,

    /// JSON config holding the endpoint secret and extra bot families
    #[arg(long, env = "DOWNLOAD_STATS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Read position per log file
    #[arg(long, env = "DOWNLOAD_STATS_STATE", default_value = DEFAULT_STATE_PATH)]
    state: PathBuf,

    /// Cumulative bot hit counters
    #[arg(long = "bots-status", env = "DOWNLOAD_STATS_BOTS_STATUS", default_value = DEFAULT_BOTS_STATUS_PATH)]
    bots_status: PathBuf,

    #[arg(long, env = "DOWNLOAD_STATS_BATCH_SIZE", default_value_t = BATCH_SIZE, value_parser = parse_batch_size)]
    batch_size: usize,

    /// Per-request delivery timeout
    #[arg(long, env = "DOWNLOAD_STATS_TIMEOUT_SECS", default_value_t = DELIVERY_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = env::var("DOWNLOAD_STATS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), RunError> {
    let config = Config::from_path(&args.config)?;

    let classifier = BotClassifier::new(&config.bots);
    let cursor = CursorStore::open(Box::new(JsonFileStore::new(args.state)))?;
    let bot_status = BotStatusStore::open(
        Box::new(JsonFileStore::new(args.bots_status)),
        classifier.bot_families(),
    )?;

    let https_proxy = env::var("HTTPS_PROXY").ok();
    let flusher = Flusher::new(FlusherConfig {
        api_key: config.api_key,
        endpoint: args.url,
        source: args.source,
        https_proxy,
        timeout: Duration::from_secs(args.timeout_secs),
    });

    let options = RunOptions {
        log_path: args.log_file,
        batch_size: args.batch_size,
        pending_max_age: config.pending_max_age,
    };
    Pipeline::new(options, cursor, bot_status, classifier, flusher)
        .run()
        .await?;
    Ok(())
}
