// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::{config::ForwarderConfig, error::ForwarderError, metrics::Metrics, pipeline::Pipeline};
use log_stream::{
    interval_ticker, Aggregator, CatalogClient, CatalogProvider,
    HttpStreamConnector, Reconciler, Resource, ResourceProvider, StreamConnector,
};
use std::sync::Arc;
use std::time::Duration;
use syslog_egress::{tls::build_client, LogClient, TracingLogClient, WriterFactory};
use tokio::sync::{Mutex as TokioMutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Status of the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopping,
    Stopped,
}

/// Handle to a running forwarder.
#[derive(Debug, Clone)]
pub struct ForwarderHandle {
    status: Arc<RwLock<ServiceStatus>>,
    cancel: CancellationToken,
    tasks: Arc<TokioMutex<Vec<JoinHandle<()>>>>,
}

impl ForwarderHandle {
    pub async fn is_running(&self) -> bool {
        matches!(*self.status.read().await, ServiceStatus::Running)
    }

    pub async fn status(&self) -> ServiceStatus {
        *self.status.read().await
    }

    /// Stops polling, cancels every producer, and waits for the pipeline to
    /// close its writer.
    pub async fn stop(&self) -> Result<(), ForwarderError> {
        let mut status = self.status.write().await;
        if *status != ServiceStatus::Running {
            return Err(ForwarderError::NotRunning);
        }
        *status = ServiceStatus::Stopping;
        drop(status);

        info!("Shutting down forwarder");
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        let mut result = Ok(());
        for task in tasks {
            if let Err(e) = task.await {
                result = Err(ForwarderError::Runtime(e.to_string()));
            }
        }

        *self.status.write().await = ServiceStatus::Stopped;
        result
    }
}

/// Wires the catalog, reconciler, aggregator and egress writer together.
pub struct ForwarderServices {
    config: ForwarderConfig,
    provider: Arc<dyn ResourceProvider>,
    connector: Arc<dyn StreamConnector>,
    log_client: Arc<dyn LogClient>,
}

impl ForwarderServices {
    pub fn new(
        config: ForwarderConfig,
        provider: Arc<dyn ResourceProvider>,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        Self {
            config,
            provider,
            connector,
            log_client: Arc::new(TracingLogClient),
        }
    }

    /// Builds the platform clients described by `config`.
    pub fn from_config(config: ForwarderConfig) -> Result<Self, ForwarderError> {
        let api_client = build_client(config.skip_cert_verify, Some(API_TIMEOUT))?;
        // Streams stay open indefinitely, so no request timeout here.
        let stream_client = build_client(config.skip_cert_verify, None)?;

        let token_source = Arc::new(config.token_source(api_client.clone())?);
        let catalog = CatalogClient::new(api_client, &config.api_addr, Arc::clone(&token_source));

        let mut provider = CatalogProvider::new(catalog, config.scope()?);
        if let Some(own_guid) = config.excluded_app() {
            debug!("Excluding own app {own_guid} from forwarding");
            let own_guid = own_guid.to_string();
            provider = provider.with_exclusion(Box::new(move |r: &Resource| r.guid == own_guid));
        }

        let connector =
            HttpStreamConnector::new(stream_client, &config.log_stream_url, token_source);

        Ok(Self::new(config, Arc::new(provider), Arc::new(connector)))
    }

    #[must_use]
    pub fn with_log_client(mut self, log_client: Arc<dyn LogClient>) -> Self {
        self.log_client = log_client;
        self
    }

    pub async fn start(self) -> Result<ForwarderHandle, ForwarderError> {
        let config = self.config;
        config.validate()?;
        let cancel = CancellationToken::new();

        let binding = config.binding(cancel.child_token())?;
        let writer = WriterFactory::new(config.writer_config()).new_retry_writer(
            &binding,
            config.max_retries,
            self.log_client,
        )?;

        let aggregator = Aggregator::new(self.connector, &config.shard_id, config.buffer_size);
        let envelopes = aggregator
            .consume()
            .ok_or_else(|| ForwarderError::Runtime("aggregator channel already taken".into()))?;
        let metrics = Arc::new(Metrics::new());

        let reconciler = Reconciler::new(self.provider, Arc::new(aggregator.clone()));
        let reconciler_task = {
            let aggregator = aggregator.clone();
            let ticker = interval_ticker(config.update_interval);
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                reconciler.run(ticker, cancel).await;
                aggregator.shutdown();
            })
        };

        let metrics_task = {
            let metrics = Arc::clone(&metrics);
            let aggregator = aggregator.clone();
            let period = config.metrics_interval;
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                metrics
                    .run_reporter(period, move || aggregator.len(), cancel)
                    .await;
            })
        };

        let pipeline_task = {
            let pipeline = Pipeline::new(writer, metrics);
            let cancel = cancel.child_token();
            tokio::spawn(pipeline.run(envelopes, cancel))
        };

        info!(
            "Forwarding to {}://{} every {}s",
            binding.scheme(),
            binding.url.host_str().unwrap_or_default(),
            config.update_interval.as_secs()
        );

        Ok(ForwarderHandle {
            status: Arc::new(RwLock::new(ServiceStatus::Running)),
            cancel,
            tasks: Arc::new(TokioMutex::new(vec![
                reconciler_task,
                metrics_task,
                pipeline_task,
            ])),
        })
    }
}
