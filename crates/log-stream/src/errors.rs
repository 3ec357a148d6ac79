// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors returned by the source catalog. Every variant fails the whole poll.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog responded with {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("unable to decode catalog response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("invalid catalog url: {0}")]
    Url(#[from] url::ParseError),

    #[error("source {0} is neither an app nor a service instance")]
    NotFound(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Errors raised while opening a gateway stream.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway responded with {0}")]
    Status(StatusCode),

    #[error("invalid gateway url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint responded with {0}")]
    Status(StatusCode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CatalogError::NotFound("guid-1".to_string());
        assert_eq!(
            error.to_string(),
            "source guid-1 is neither an app nor a service instance"
        );

        let error = GatewayError::Status(StatusCode::UNAUTHORIZED);
        assert_eq!(error.to_string(), "gateway responded with 401 Unauthorized");
    }
}
