// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ForwarderError;
use log_stream::auth::TokenSource;
use log_stream::{Scope, DEFAULT_BUFFER_SIZE};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use syslog_egress::writer::{DEFAULT_DIAL_TIMEOUT, DEFAULT_IO_TIMEOUT, DEFAULT_KEEPALIVE};
use syslog_egress::{UrlBinding, WriterConfig, WriterFactory};
use tokio_util::sync::CancellationToken;

const DEFAULT_SOURCE_HOSTNAME: &str = "forwarder";
const DEFAULT_SHARD_ID: &str = "syslog-forwarder";
const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RETRIES: usize = 5;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the forwarder
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Cloud controller base URL
    pub api_addr: String,
    /// Token issuer base URL, used with the client credentials below
    pub uaa_addr: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Static bearer token, used when no issuer is configured
    pub access_token: Option<String>,
    /// Streaming gateway base URL
    pub log_stream_url: String,
    /// Syslog destination
    pub syslog_url: String,
    /// Forward a single source
    pub source_id: Option<String>,
    /// Forward every app and service instance in a space
    pub space_id: Option<String>,
    /// Hostname sent in every syslog message
    pub source_hostname: String,
    pub shard_id: String,
    /// Leave the forwarder's own app out of space-wide forwarding
    pub exclude_self: bool,
    /// The forwarder's own app GUID, if it runs as an app
    pub self_app_id: Option<String>,
    pub update_interval: Duration,
    pub max_retries: usize,
    pub dial_timeout: Duration,
    pub io_timeout: Duration,
    pub keepalive: Duration,
    pub skip_cert_verify: bool,
    pub buffer_size: usize,
    pub metrics_interval: Duration,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            api_addr: String::new(),
            uaa_addr: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            log_stream_url: String::new(),
            syslog_url: String::new(),
            source_id: None,
            space_id: None,
            source_hostname: DEFAULT_SOURCE_HOSTNAME.to_string(),
            shard_id: DEFAULT_SHARD_ID.to_string(),
            exclude_self: true,
            self_app_id: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            keepalive: DEFAULT_KEEPALIVE,
            skip_cert_verify: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct VcapApplication {
    application_id: Option<String>,
}

impl ForwarderConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ForwarderError> {
        let defaults = Self::default();

        let self_app_id = env::var("VCAP_APPLICATION")
            .ok()
            .and_then(|val| serde_json::from_str::<VcapApplication>(&val).ok())
            .and_then(|app| app.application_id);

        let config = Self {
            api_addr: required("API_ADDR")?,
            uaa_addr: optional("UAA_ADDR"),
            client_id: optional("CLIENT_ID"),
            client_secret: optional("CLIENT_SECRET"),
            access_token: optional("ACCESS_TOKEN"),
            log_stream_url: required("LOG_STREAM_URL")?,
            syslog_url: required("SYSLOG_URL")?,
            source_id: optional("SOURCE_ID"),
            space_id: optional("SPACE_ID"),
            source_hostname: optional("SOURCE_HOSTNAME").unwrap_or(defaults.source_hostname),
            shard_id: optional("SHARD_ID").unwrap_or(defaults.shard_id),
            exclude_self: env::var("EXCLUDE_SELF")
                .map(|val| val.to_lowercase() != "false")
                .unwrap_or(defaults.exclude_self),
            self_app_id,
            update_interval: seconds("UPDATE_INTERVAL_SECS").unwrap_or(defaults.update_interval),
            max_retries: parsed("MAX_RETRIES").unwrap_or(defaults.max_retries),
            dial_timeout: seconds("DIAL_TIMEOUT_SECS").unwrap_or(defaults.dial_timeout),
            io_timeout: seconds("IO_TIMEOUT_SECS").unwrap_or(defaults.io_timeout),
            keepalive: seconds("KEEPALIVE_SECS").unwrap_or(defaults.keepalive),
            skip_cert_verify: env::var("SKIP_CERT_VERIFY")
                .map(|val| val.to_lowercase() == "true")
                .unwrap_or(defaults.skip_cert_verify),
            buffer_size: parsed("BUFFER_SIZE").unwrap_or(defaults.buffer_size),
            metrics_interval: seconds("METRICS_INTERVAL_SECS")
                .unwrap_or(defaults.metrics_interval),
            log_level: env::var("LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ForwarderError> {
        for (name, value) in [
            ("API_ADDR", &self.api_addr),
            ("LOG_STREAM_URL", &self.log_stream_url),
            ("SYSLOG_URL", &self.syslog_url),
        ] {
            if value.trim().is_empty() {
                return Err(ForwarderError::InvalidConfig(format!("{name} cannot be empty")));
            }
        }

        self.scope()?;

        if self.update_interval.is_zero() {
            return Err(ForwarderError::InvalidConfig(
                "UPDATE_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        if self.metrics_interval.is_zero() {
            return Err(ForwarderError::InvalidConfig(
                "METRICS_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ForwarderError::InvalidConfig(
                "MAX_RETRIES must be greater than 0".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ForwarderError::InvalidConfig(
                "BUFFER_SIZE must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ForwarderError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        let has_credentials =
            self.uaa_addr.is_some() && self.client_id.is_some() && self.client_secret.is_some();
        if !has_credentials && self.access_token.is_none() {
            return Err(ForwarderError::InvalidConfig(
                "either UAA_ADDR, CLIENT_ID and CLIENT_SECRET or ACCESS_TOKEN must be set"
                    .to_string(),
            ));
        }

        // Parsed with a throwaway token so an unsupported scheme fails here
        // rather than after the pipeline has started.
        WriterFactory::new(self.writer_config())
            .new_writer(&self.binding(CancellationToken::new())?)?;

        Ok(())
    }

    pub fn scope(&self) -> Result<Scope, ForwarderError> {
        match (&self.source_id, &self.space_id) {
            (Some(source), None) => Ok(Scope::Source(source.clone())),
            (None, Some(space)) => Ok(Scope::Space(space.clone())),
            _ => Err(ForwarderError::InvalidConfig(
                "exactly one of SOURCE_ID or SPACE_ID must be set".to_string(),
            )),
        }
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            dial_timeout: self.dial_timeout,
            io_timeout: self.io_timeout,
            keepalive: self.keepalive,
            skip_cert_verify: self.skip_cert_verify,
        }
    }

    pub fn binding(&self, context: CancellationToken) -> Result<UrlBinding, ForwarderError> {
        Ok(UrlBinding::parse(
            context,
            &self.source_hostname,
            &self.syslog_url,
        )?)
    }

    /// Client credentials win over a static token when both are set.
    pub fn token_source(&self, client: reqwest::Client) -> Result<TokenSource, ForwarderError> {
        match (
            &self.uaa_addr,
            &self.client_id,
            &self.client_secret,
            &self.access_token,
        ) {
            (Some(uaa), Some(id), Some(secret), _) => Ok(TokenSource::new_client_credentials(
                client, uaa, id, secret,
            )),
            (_, _, _, Some(token)) => Ok(TokenSource::new_from_static_token(token)),
            _ => Err(ForwarderError::InvalidConfig(
                "no credentials configured".to_string(),
            )),
        }
    }

    /// The GUID to leave out of space-wide results, if any.
    pub fn excluded_app(&self) -> Option<&str> {
        if self.exclude_self {
            self.self_app_id.as_deref()
        } else {
            None
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn required(key: &str) -> Result<String, ForwarderError> {
    optional(key).ok_or_else(|| ForwarderError::InvalidConfig(format!("{key} is required")))
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}

fn seconds(key: &str) -> Option<Duration> {
    parsed::<u64>(key).map(Duration::from_secs)
}
