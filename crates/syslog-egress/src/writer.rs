// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::binding::{UrlBinding, SCHEME_HTTPS, SCHEME_SYSLOG, SCHEME_SYSLOG_TLS};
use crate::errors::{BindingError, EgressError};
use crate::https::HttpsWriter;
use crate::retry::{exponential_duration, LogClient, RetryDuration, RetryWriter};
use crate::tcp::{TcpWriter, TlsWriter};
use async_trait::async_trait;
use log_stream::Envelope;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(10);

/// Sends one envelope to a syslog destination.
///
/// Writers are driven by a single task and are never shared, so both methods
/// take `&mut self`.
#[async_trait]
pub trait Writer: Send {
    async fn write(&mut self, envelope: &Envelope) -> Result<(), EgressError>;
    async fn close(&mut self) -> Result<(), EgressError>;
}

#[async_trait]
impl<W: Writer + ?Sized> Writer for Box<W> {
    async fn write(&mut self, envelope: &Envelope) -> Result<(), EgressError> {
        (**self).write(envelope).await
    }

    async fn close(&mut self) -> Result<(), EgressError> {
        (**self).close().await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub dial_timeout: Duration,
    pub io_timeout: Duration,
    pub keepalive: Duration,
    pub skip_cert_verify: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            keepalive: DEFAULT_KEEPALIVE,
            skip_cert_verify: false,
        }
    }
}

/// A writer for one of the supported destination schemes.
pub enum SyslogWriter {
    Tcp(TcpWriter),
    Tls(TlsWriter),
    Https(HttpsWriter),
}

#[async_trait]
impl Writer for SyslogWriter {
    async fn write(&mut self, envelope: &Envelope) -> Result<(), EgressError> {
        match self {
            SyslogWriter::Tcp(w) => w.write(envelope).await,
            SyslogWriter::Tls(w) => w.write(envelope).await,
            SyslogWriter::Https(w) => w.write(envelope).await,
        }
    }

    async fn close(&mut self) -> Result<(), EgressError> {
        match self {
            SyslogWriter::Tcp(w) => w.close().await,
            SyslogWriter::Tls(w) => w.close().await,
            SyslogWriter::Https(w) => w.close().await,
        }
    }
}

/// Picks a writer implementation from the destination scheme.
#[derive(Debug, Clone, Default)]
pub struct WriterFactory {
    config: WriterConfig,
}

impl WriterFactory {
    pub fn new(config: WriterConfig) -> Self {
        WriterFactory { config }
    }

    pub fn new_writer(&self, binding: &UrlBinding) -> Result<SyslogWriter, BindingError> {
        match binding.scheme() {
            SCHEME_SYSLOG => Ok(SyslogWriter::Tcp(TcpWriter::new_tcp(binding, &self.config)?)),
            SCHEME_SYSLOG_TLS => Ok(SyslogWriter::Tls(TlsWriter::new_tls(binding, &self.config)?)),
            SCHEME_HTTPS => Ok(SyslogWriter::Https(HttpsWriter::new(binding, &self.config)?)),
            other => Err(BindingError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Same as [`WriterFactory::new_writer`], wrapped with exponential
    /// backoff retries.
    pub fn new_retry_writer(
        &self,
        binding: &UrlBinding,
        max_retries: usize,
        log_client: Arc<dyn LogClient>,
    ) -> Result<RetryWriter<SyslogWriter>, BindingError> {
        let retry_duration: RetryDuration = Arc::new(exponential_duration);
        RetryWriter::new(binding, retry_duration, max_retries, log_client, |b| {
            self.new_writer(b)
        })
    }
}
