// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use log_stream::errors::CatalogError;
use log_stream::{
    Aggregator, Envelope, EnvelopeStream, Reconciler, Resource, ResourceProvider, SourceSet,
    StreamConnector, StreamRequest,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct FixedProvider(Mutex<Vec<Resource>>);

#[async_trait]
impl ResourceProvider for FixedProvider {
    async fn resources(&self) -> Result<Vec<Resource>, CatalogError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

/// Emits one batch, then stays open.
struct OneBatch(Option<Vec<Envelope>>);

#[async_trait]
impl EnvelopeStream for OneBatch {
    async fn next_batch(&mut self) -> Option<Vec<Envelope>> {
        match self.0.take() {
            Some(batch) => Some(batch),
            None => futures::future::pending().await,
        }
    }
}

#[derive(Default)]
struct OneBatchConnector {
    requests: Mutex<Vec<StreamRequest>>,
}

impl StreamConnector for OneBatchConnector {
    fn stream(&self, request: StreamRequest) -> Box<dyn EnvelopeStream> {
        let envelope = Envelope {
            source_id: request.source_id.clone(),
            ..Default::default()
        };
        self.requests.lock().unwrap().push(request);
        Box::new(OneBatch(Some(vec![envelope])))
    }
}

#[tokio::test]
async fn test_catalog_source_flows_into_output_channel() {
    let provider = Arc::new(FixedProvider(Mutex::new(vec![Resource::new(
        "service-1",
        "svc",
    )])));
    let connector = Arc::new(OneBatchConnector::default());
    let aggregator = Aggregator::new(connector.clone(), "shard-1", 100);
    let mut rx = aggregator.consume().expect("receiver");

    let reconciler = Reconciler::new(provider, Arc::new(aggregator.clone()));
    let delta = reconciler.reconcile_once().await.expect("delta");
    assert_eq!(delta.added, vec![Resource::new("service-1", "svc")]);

    let envelope = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .expect("envelope");
    assert_eq!(envelope.source_id, "service-1");

    let requests = connector.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].shard_id, "shard-1");
}

#[tokio::test]
async fn test_reconciler_drives_aggregator_until_canceled() {
    let provider = Arc::new(FixedProvider(Mutex::new(vec![
        Resource::new("a", "app-a"),
        Resource::new("b", "app-b"),
    ])));
    let aggregator = Aggregator::new(Arc::new(OneBatchConnector::default()), "shard", 100);
    let reconciler = Reconciler::new(provider.clone(), Arc::new(aggregator.clone()));

    let (tick_tx, tick_rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let run = tokio::spawn(async move { reconciler.run(tick_rx, run_cancel).await });

    tick_tx.send(()).await.unwrap();
    wait_for(|| aggregator.len() == 2).await;

    *provider.0.lock().unwrap() = vec![Resource::new("b", "app-b"), Resource::new("c", "app-c")];
    tick_tx.send(()).await.unwrap();
    wait_for(|| {
        let guids: Vec<String> = SourceSet::list(&aggregator)
            .into_iter()
            .map(|r| r.guid)
            .collect();
        guids == vec!["b".to_string(), "c".to_string()]
    })
    .await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("reconciler did not stop")
        .unwrap();

    aggregator.shutdown();
    assert!(aggregator.is_empty());
}

async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never met");
}
