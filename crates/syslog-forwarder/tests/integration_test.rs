// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use log_stream::envelope::{Log, LogType};
use log_stream::errors::CatalogError;
use log_stream::{
    Envelope, EnvelopeStream, Message, Resource, ResourceProvider, StreamConnector, StreamRequest,
};
use std::sync::Arc;
use std::time::Duration;
use syslog_forwarder::{ForwarderConfig, ForwarderError, ForwarderServices, ServiceStatus};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

struct FixedProvider(Vec<Resource>);

#[async_trait]
impl ResourceProvider for FixedProvider {
    async fn resources(&self) -> Result<Vec<Resource>, CatalogError> {
        Ok(self.0.clone())
    }
}

/// Emits one log line per source, then stays open.
struct OneLine(Option<Envelope>);

#[async_trait]
impl EnvelopeStream for OneLine {
    async fn next_batch(&mut self) -> Option<Vec<Envelope>> {
        match self.0.take() {
            Some(envelope) => Some(vec![envelope]),
            None => futures::future::pending().await,
        }
    }
}

struct OneLineConnector;

impl StreamConnector for OneLineConnector {
    fn stream(&self, request: StreamRequest) -> Box<dyn EnvelopeStream> {
        Box::new(OneLine(Some(Envelope {
            timestamp: 1_580_428_783_000_000_000,
            source_id: request.source_id.clone(),
            instance_id: "0".to_string(),
            tags: [("source_type".to_string(), "APP".to_string())]
                .into_iter()
                .collect(),
            message: Some(Message::Log(Log {
                payload: format!("hello from {}", request.source_id).into_bytes(),
                log_type: LogType::Out,
            })),
        })))
    }
}

fn config(syslog_url: String) -> ForwarderConfig {
    ForwarderConfig {
        api_addr: "https://api.example.com".to_string(),
        access_token: Some("token".to_string()),
        log_stream_url: "https://log-stream.example.com".to_string(),
        syslog_url,
        space_id: Some("space-guid".to_string()),
        source_hostname: "org".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_forwards_catalog_sources_to_tcp_drain() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let services = ForwarderServices::new(
        config(format!("syslog://{addr}")),
        Arc::new(FixedProvider(vec![Resource::new("service-1", "svc")])),
        Arc::new(OneLineConnector),
    );
    let handle = services.start().await.expect("start");
    assert!(handle.is_running().await);

    let (mut socket, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("no connection")
        .unwrap();

    let expected = "<14>1 2020-01-30T23:59:43Z org. service-1 [APP/0] - - hello from service-1\n";
    let framed = format!("{} {expected}", expected.len());
    let mut received = vec![0u8; framed.len()];
    tokio::time::timeout(Duration::from_secs(5), socket.read_exact(&mut received))
        .await
        .expect("no data")
        .unwrap();
    assert_eq!(String::from_utf8(received).unwrap(), framed);

    handle.stop().await.expect("stop");
    assert_eq!(handle.status().await, ServiceStatus::Stopped);
    assert!(matches!(handle.stop().await, Err(ForwarderError::NotRunning)));
}

#[tokio::test]
async fn test_start_rejects_unsupported_destination() {
    let services = ForwarderServices::new(
        config("ftp://logs.example.com:21".to_string()),
        Arc::new(FixedProvider(Vec::new())),
        Arc::new(OneLineConnector),
    );
    assert!(matches!(
        services.start().await,
        Err(ForwarderError::Binding(_))
    ));
}

#[tokio::test]
async fn test_start_rejects_zero_intervals() {
    for config in [
        ForwarderConfig {
            update_interval: Duration::ZERO,
            ..config("syslog://127.0.0.1:1".to_string())
        },
        ForwarderConfig {
            metrics_interval: Duration::ZERO,
            ..config("syslog://127.0.0.1:1".to_string())
        },
    ] {
        let services = ForwarderServices::new(
            config,
            Arc::new(FixedProvider(Vec::new())),
            Arc::new(OneLineConnector),
        );
        assert!(matches!(
            services.start().await,
            Err(ForwarderError::InvalidConfig(_))
        ));
    }
}

#[tokio::test]
async fn test_from_config_builds_platform_clients() {
    let services = ForwarderServices::from_config(config("syslog://127.0.0.1:1".to_string()));
    assert!(services.is_ok());
}
