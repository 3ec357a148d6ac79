// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::BindingError;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const SCHEME_SYSLOG: &str = "syslog";
pub const SCHEME_SYSLOG_TLS: &str = "syslog-tls";
pub const SCHEME_HTTPS: &str = "https";

/// Everything a writer needs to know about its destination.
///
/// `context` governs the writer's lifetime: once it is canceled, retry loops
/// give up instead of sleeping again.
#[derive(Debug, Clone)]
pub struct UrlBinding {
    pub context: CancellationToken,
    pub hostname: String,
    pub url: Url,
}

impl UrlBinding {
    pub fn new(context: CancellationToken, hostname: &str, url: Url) -> Self {
        UrlBinding {
            context,
            hostname: hostname.to_string(),
            url,
        }
    }

    pub fn parse(context: CancellationToken, hostname: &str, url: &str) -> Result<Self, BindingError> {
        Ok(Self::new(context, hostname, Url::parse(url)?))
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// `host:port` for stream transports, which need an explicit port.
    pub fn socket_address(&self) -> Result<(String, u16), BindingError> {
        let host = self
            .url
            .host_str()
            .ok_or_else(|| BindingError::MissingHost(self.url.to_string()))?;
        let port = self
            .url
            .port()
            .ok_or_else(|| BindingError::MissingPort(self.url.to_string()))?;
        Ok((host.to_string(), port))
    }

    pub fn server_name(&self) -> Result<&str, BindingError> {
        self.url
            .host_str()
            .ok_or_else(|| BindingError::MissingHost(self.url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_address() {
        let binding =
            UrlBinding::parse(CancellationToken::new(), "h", "syslog://logs.example.com:6514").unwrap();
        assert_eq!(
            binding.socket_address().unwrap(),
            ("logs.example.com".to_string(), 6514)
        );
        assert_eq!(binding.scheme(), SCHEME_SYSLOG);
    }

    #[test]
    fn test_missing_port() {
        let binding = UrlBinding::parse(CancellationToken::new(), "h", "syslog://logs.example.com").unwrap();
        assert!(matches!(binding.socket_address(), Err(BindingError::MissingPort(_))));
    }

    #[test]
    fn test_invalid_url() {
        let result = UrlBinding::parse(CancellationToken::new(), "h", "not a url");
        assert!(matches!(result, Err(BindingError::InvalidUrl(_))));
    }
}
