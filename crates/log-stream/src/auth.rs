// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::AuthError;
use serde::Deserialize;
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

// Refresh a little before the issuer's deadline so in-flight requests don't
// race the expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Bearer token used for both the catalog and the gateway.
pub enum TokenSource {
    Static(String),
    ClientCredentials(ClientCredentials),
}

impl TokenSource {
    pub fn new_from_static_token(token: &str) -> Self {
        Self::Static(token.to_string())
    }

    pub fn new_client_credentials(
        client: reqwest::Client,
        uaa_addr: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self::ClientCredentials(ClientCredentials {
            client,
            token_url: format!("{}/oauth/token", uaa_addr.trim_end_matches('/')),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            cached: Mutex::new(None),
        })
    }

    pub async fn token(&self) -> Result<String, AuthError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ClientCredentials(credentials) => credentials.token().await,
        }
    }
}

impl Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => write!(f, "TokenSource::Static"),
            Self::ClientCredentials(c) => write!(f, "TokenSource::ClientCredentials({})", c.token_url),
        }
    }
}

pub struct ClientCredentials {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl ClientCredentials {
    async fn token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting new access token from {}", self.token_url);
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Status(response.status()));
        }
        let body: TokenResponse = response.json().await?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(body.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_static_token() {
        let source = TokenSource::new_from_static_token("abc");
        assert_eq!(source.token().await.expect("token"), "abc");
    }

    #[tokio::test]
    async fn test_client_credentials_token_is_cached() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "client_credentials".into(),
            ))
            .with_status(200)
            .with_body(r#"{"access_token":"fresh-token","token_type":"bearer","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let source =
            TokenSource::new_client_credentials(reqwest::Client::new(), &server.url(), "id", "s");
        assert_eq!(source.token().await.expect("token"), "fresh-token");
        assert_eq!(source.token().await.expect("token"), "fresh-token");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"access_token":"short-lived","expires_in":1}"#)
            .expect(2)
            .create_async()
            .await;

        let source =
            TokenSource::new_client_credentials(reqwest::Client::new(), &server.url(), "id", "s");
        source.token().await.expect("token");
        source.token().await.expect("token");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_endpoint_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .create_async()
            .await;

        let source =
            TokenSource::new_client_credentials(reqwest::Client::new(), &server.url(), "id", "s");
        let err = source.token().await.expect_err("should fail");
        assert!(matches!(err, AuthError::Status(s) if s.as_u16() == 401));
    }
}
