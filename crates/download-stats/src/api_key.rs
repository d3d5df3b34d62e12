// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;

/// Scheme prefix of the `Authorization` header sent with every aggregate.
const AUTHORIZATION_SCHEME: &str = "ApiKey";

/// Shared secret used to authenticate against the statistics endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    secret: Arc<str>,
}

impl ApiKey {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Value for the `Authorization` header, e.g. `ApiKey s3cr3t`.
    pub fn authorization_header(&self) -> String {
        format!("{AUTHORIZATION_SCHEME} {}", self.secret)
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

#[cfg(test)]
pub mod tests {
    use crate::api_key::ApiKey;

    #[test]
    fn authorization_header() {
        let api_key = ApiKey::new("mock-api-key");
        assert_eq!(api_key.secret(), "mock-api-key");
        assert_eq!(api_key.authorization_header(), "ApiKey mock-api-key");
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let api_key = ApiKey::new("mock-api-key");
        assert!(!format!("{api_key:?}").contains("mock-api-key"));
    }
}
