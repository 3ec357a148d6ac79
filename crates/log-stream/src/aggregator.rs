// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Merges one gateway stream per source into a single bounded channel.
//!
//! ```text
//!   add(source) ──> Producer task ──┐
//!   add(source) ──> Producer task ──┼──> mpsc::Sender<Envelope> ──> consume()
//!   add(source) ──> Producer task ──┘        (bounded)
//! ```
//!
//! The channel propagates backpressure: when the consumer stalls, producers
//! block on send and stop pulling from their streams. Nothing is dropped here.
//!
//! Producers are keyed by source GUID in a single registry. A producer whose
//! stream closes upstream unregisters itself so the next reconciliation can
//! start a fresh one if the source is still wanted.

use crate::catalog::Resource;
use crate::envelope::Envelope;
use crate::gateway::{EnvelopeStream, StreamConnector, StreamRequest};
use crate::reconciler::SourceSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_BUFFER_SIZE: usize = 10_000;

struct ProducerHandle {
    resource: Resource,
    id: u64,
    cancel: CancellationToken,
}

struct Registry {
    producers: HashMap<String, ProducerHandle>,
    next_id: u64,
    // None once shut down. Producers own clones, so the channel closes when
    // the last of them exits.
    tx: Option<mpsc::Sender<Envelope>>,
}

struct Inner {
    registry: Mutex<Registry>,
    rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
    connector: Arc<dyn StreamConnector>,
    shard_id: String,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unregister(&self, guid: &str, id: u64) {
        let mut registry = self.registry();
        if registry.producers.get(guid).is_some_and(|p| p.id == id) {
            registry.producers.remove(guid);
            debug!("AGGREGATOR | {guid} unregistered after its stream closed");
        }
    }
}

/// Handle to the aggregator. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

impl Aggregator {
    pub fn new(connector: Arc<dyn StreamConnector>, shard_id: &str, buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        Aggregator {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry {
                    producers: HashMap::new(),
                    next_id: 0,
                    tx: Some(tx),
                }),
                rx: Mutex::new(Some(rx)),
                connector,
                shard_id: shard_id.to_string(),
            }),
        }
    }

    /// Starts streaming `source`. A GUID that is already streaming is left
    /// alone, so at most one producer runs per source.
    pub fn add(&self, source: Resource) {
        let mut registry = self.inner.registry();
        let Some(tx) = registry.tx.clone() else {
            warn!("AGGREGATOR | Ignoring {} added after shutdown", source.guid);
            return;
        };
        if registry.producers.contains_key(&source.guid) {
            debug!("AGGREGATOR | {} is already streaming", source.guid);
            return;
        }

        let id = registry.next_id;
        registry.next_id += 1;
        let cancel = CancellationToken::new();
        let stream = self
            .inner
            .connector
            .stream(StreamRequest::for_source(&self.inner.shard_id, &source.guid));

        let producer = Producer {
            source_id: source.guid.clone(),
            id,
            stream,
            tx,
            cancel: cancel.clone(),
            inner: Arc::clone(&self.inner),
        };
        registry.producers.insert(
            source.guid.clone(),
            ProducerHandle {
                resource: source,
                id,
                cancel,
            },
        );
        drop(registry);

        tokio::spawn(producer.run());
    }

    /// Stops streaming `guid`. Unknown GUIDs are ignored.
    pub fn remove(&self, guid: &str) {
        let removed = self.inner.registry().producers.remove(guid);
        if let Some(producer) = removed {
            producer.cancel.cancel();
        }
    }

    /// Snapshot of the tracked sources, in the order they were added.
    pub fn list(&self) -> Vec<Resource> {
        let registry = self.inner.registry();
        let mut producers: Vec<&ProducerHandle> = registry.producers.values().collect();
        producers.sort_by_key(|p| p.id);
        producers.iter().map(|p| p.resource.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.registry().producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the output channel. Only the first call gets it.
    pub fn consume(&self) -> Option<mpsc::Receiver<Envelope>> {
        self.inner
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Cancels every producer and refuses further adds. The output channel
    /// closes once the canceled producers have exited.
    pub fn shutdown(&self) {
        let producers: Vec<ProducerHandle> = {
            let mut registry = self.inner.registry();
            registry.tx = None;
            registry.producers.drain().map(|(_, p)| p).collect()
        };
        debug!("AGGREGATOR | shutting down {} producers", producers.len());
        for producer in producers {
            producer.cancel.cancel();
        }
    }
}

impl SourceSet for Aggregator {
    fn add(&self, source: Resource) {
        Aggregator::add(self, source);
    }

    fn remove(&self, guid: &str) {
        Aggregator::remove(self, guid);
    }

    fn list(&self) -> Vec<Resource> {
        Aggregator::list(self)
    }
}

struct Producer {
    source_id: String,
    id: u64,
    stream: Box<dyn EnvelopeStream>,
    tx: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
    inner: Arc<Inner>,
}

impl Producer {
    async fn run(mut self) {
        debug!("AGGREGATOR | producer for {} started", self.source_id);
        let closed_upstream = self.pump().await;
        if closed_upstream {
            self.inner.unregister(&self.source_id, self.id);
        }
        debug!("AGGREGATOR | producer for {} stopped", self.source_id);
    }

    /// Returns true when the stream ended on its own rather than by cancel.
    async fn pump(&mut self) -> bool {
        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                batch = self.stream.next_batch() => batch,
            };
            let batch = match batch {
                Some(batch) if !batch.is_empty() => batch,
                _ => return true,
            };

            for envelope in batch {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return false,
                    sent = self.tx.send(envelope) => {
                        if sent.is_err() {
                            debug!("AGGREGATOR | output channel closed");
                            return false;
                        }
                    }
                }
            }
        }
    }
}
