// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use std::error::Error;

use tracing::error;

/// Builds the delivery client. Falls back to a plain client when the proxy cannot be parsed.
#[must_use]
pub fn get_client(https_proxy: Option<&str>, timeout: Duration) -> reqwest::Client {
    match build_client(https_proxy, timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to parse proxy configuration: {e}, no proxy will be used");
            reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default()
        }
    }
}

pub fn build_client(
    https_proxy: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}
