// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stream writers for the `syslog` and `syslog-tls` schemes.
//!
//! The connection is opened on the first write and reused afterwards. Any
//! failed write drops it, so the next write dials again. Retrying is left to
//! [`crate::retry::RetryWriter`].

use crate::binding::UrlBinding;
use crate::errors::{BindingError, EgressError};
use crate::tls;
use crate::translate::to_syslog_messages;
use crate::writer::{Writer, WriterConfig};
use async_trait::async_trait;
use log_stream::Envelope;
use rustls::pki_types::ServerName;
use socket2::{SockRef, TcpKeepalive};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

#[async_trait]
pub trait Dialer: Send + Sync {
    type Stream: AsyncWrite + Unpin + Send;

    async fn dial(&self) -> Result<Self::Stream, EgressError>;
}

#[derive(Debug, Clone)]
pub struct TcpDialer {
    host: String,
    port: u16,
    dial_timeout: Duration,
    keepalive: Duration,
}

impl TcpDialer {
    pub fn new(binding: &UrlBinding, config: &WriterConfig) -> Result<Self, BindingError> {
        let (host, port) = binding.socket_address()?;
        Ok(TcpDialer {
            host,
            port,
            dial_timeout: config.dial_timeout,
            keepalive: config.keepalive,
        })
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> Result<TcpStream, EgressError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = timeout(self.dial_timeout, connect)
            .await
            .map_err(|_| EgressError::Timeout("dial"))??;
        SockRef::from(&stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(self.keepalive))?;
        debug!("EGRESS | Connected to {}:{}", self.host, self.port);
        Ok(stream)
    }
}

pub struct TlsDialer {
    tcp: TcpDialer,
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

impl TlsDialer {
    pub fn new(binding: &UrlBinding, config: &WriterConfig) -> Result<Self, BindingError> {
        let tcp = TcpDialer::new(binding, config)?;
        let server_name = tls::server_name(binding.server_name()?)?;
        let connector = TlsConnector::from(Arc::new(tls::client_config(config.skip_cert_verify)?));
        Ok(TlsDialer {
            tcp,
            connector,
            server_name,
        })
    }
}

#[async_trait]
impl Dialer for TlsDialer {
    type Stream = TlsStream<TcpStream>;

    async fn dial(&self) -> Result<Self::Stream, EgressError> {
        let stream = self.tcp.dial().await?;
        let handshake = self.connector.connect(self.server_name.clone(), stream);
        let tls_stream = timeout(self.tcp.dial_timeout, handshake)
            .await
            .map_err(|_| EgressError::Timeout("tls handshake"))??;
        Ok(tls_stream)
    }
}

enum ConnectionState<S> {
    Disconnected,
    Connected(S),
}

/// Writes octet-counted RFC 5424 frames over a dialed stream.
pub struct StreamWriter<D: Dialer> {
    hostname: String,
    dialer: D,
    io_timeout: Duration,
    state: ConnectionState<D::Stream>,
}

pub type TcpWriter = StreamWriter<TcpDialer>;
pub type TlsWriter = StreamWriter<TlsDialer>;

impl TcpWriter {
    pub fn new_tcp(binding: &UrlBinding, config: &WriterConfig) -> Result<Self, BindingError> {
        Ok(StreamWriter::new(binding, TcpDialer::new(binding, config)?, config.io_timeout))
    }
}

impl TlsWriter {
    pub fn new_tls(binding: &UrlBinding, config: &WriterConfig) -> Result<Self, BindingError> {
        Ok(StreamWriter::new(binding, TlsDialer::new(binding, config)?, config.io_timeout))
    }
}

impl<D: Dialer> StreamWriter<D> {
    pub fn new(binding: &UrlBinding, dialer: D, io_timeout: Duration) -> Self {
        StreamWriter {
            hostname: binding.hostname.clone(),
            dialer,
            io_timeout,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), EgressError> {
        // Taken out of `state` so any early return leaves the writer
        // disconnected.
        let mut stream = match std::mem::replace(&mut self.state, ConnectionState::Disconnected) {
            ConnectionState::Connected(stream) => stream,
            ConnectionState::Disconnected => self.dialer.dial().await?,
        };

        let write = async {
            stream.write_all(frame).await?;
            stream.flush().await
        };
        timeout(self.io_timeout, write)
            .await
            .map_err(|_| EgressError::Timeout("write"))??;

        self.state = ConnectionState::Connected(stream);
        Ok(())
    }
}

#[async_trait]
impl<D: Dialer> Writer for StreamWriter<D> {
    async fn write(&mut self, envelope: &Envelope) -> Result<(), EgressError> {
        for message in to_syslog_messages(envelope, &self.hostname) {
            let frame = message.frame()?;
            self.send(&frame).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), EgressError> {
        if let ConnectionState::Connected(mut stream) =
            std::mem::replace(&mut self.state, ConnectionState::Disconnected)
        {
            stream.shutdown().await?;
        }
        Ok(())
    }
}
