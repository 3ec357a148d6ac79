// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use std::io;

/// Errors returned by a single write. All of them are retryable from the
/// writer's point of view; the retry decorator decides when to give up.
#[derive(Debug, thiserror::Error)]
pub enum EgressError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("syslog drain responded with {0}")]
    Status(StatusCode),

    #[error("unable to encode syslog message: {0}")]
    Encode(String),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

/// Errors raised while turning a destination URL into a writer. These are
/// configuration errors and are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("invalid destination url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported destination scheme: {0}")]
    UnsupportedScheme(String),

    #[error("destination url {0} has no host")]
    MissingHost(String),

    #[error("destination url {0} has no port")]
    MissingPort(String),

    #[error("unable to build tls configuration: {0}")]
    Tls(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            EgressError::Status(StatusCode::BAD_GATEWAY).to_string(),
            "syslog drain responded with 502 Bad Gateway"
        );
        assert_eq!(EgressError::Timeout("tls handshake").to_string(), "tls handshake timed out");
        let handshake = io::Error::new(io::ErrorKind::InvalidData, "invalid peer certificate");
        assert!(matches!(EgressError::from(handshake), EgressError::Io(_)));
        assert_eq!(
            BindingError::UnsupportedScheme("ftp".to_string()).to_string(),
            "unsupported destination scheme: ftp"
        );
    }
}
