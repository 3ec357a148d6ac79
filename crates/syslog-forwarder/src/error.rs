// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use syslog_egress::BindingError;

/// Errors that can occur while configuring or running the forwarder
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid syslog destination: {0}")]
    Binding(#[from] BindingError),

    #[error("Forwarder not running")]
    NotRunning,

    #[error("Runtime error: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ForwarderError::InvalidConfig("API_ADDR is required".to_string());
        assert_eq!(error.to_string(), "Invalid configuration: API_ADDR is required");

        let error = ForwarderError::from(BindingError::UnsupportedScheme("ftp".to_string()));
        assert_eq!(
            error.to_string(),
            "Invalid syslog destination: unsupported destination scheme: ftp"
        );
    }

    #[test]
    fn test_error_debug() {
        let debug_str = format!("{:?}", ForwarderError::NotRunning);
        assert!(debug_str.contains("NotRunning"));
    }
}
