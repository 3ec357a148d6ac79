// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::metrics::Metrics;
use log_stream::Envelope;
use std::sync::Arc;
use syslog_egress::Writer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reads envelopes off the aggregator channel and writes them one at a time.
///
/// A failed write is a drop: it is counted, logged, and the driver moves on
/// to the next envelope.
pub struct Pipeline<W> {
    writer: W,
    metrics: Arc<Metrics>,
}

impl<W: Writer> Pipeline<W> {
    pub fn new(writer: W, metrics: Arc<Metrics>) -> Self {
        Pipeline { writer, metrics }
    }

    /// Runs until the channel closes or `cancel` fires, then closes the writer.
    pub async fn run(mut self, mut envelopes: mpsc::Receiver<Envelope>, cancel: CancellationToken) {
        debug!("PIPELINE | started");
        loop {
            let envelope = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                envelope = envelopes.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            self.forward(&envelope).await;
        }

        if let Err(e) = self.writer.close().await {
            warn!("PIPELINE | Error closing writer: {e}");
        }
        debug!("PIPELINE | stopped");
    }

    async fn forward(&mut self, envelope: &Envelope) {
        self.metrics.record_ingress();
        match self.writer.write(envelope).await {
            Ok(()) => self.metrics.record_egress(),
            Err(e) => {
                self.metrics.record_dropped();
                warn!(
                    "PIPELINE | Dropped envelope from {}: {e}",
                    envelope.source_id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use syslog_egress::EgressError;
    use tracing_test::traced_test;

    #[derive(Clone, Default)]
    struct RecordingWriter {
        written: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Writer for RecordingWriter {
        async fn write(&mut self, envelope: &Envelope) -> Result<(), EgressError> {
            if self.fail_for.as_deref() == Some(envelope.source_id.as_str()) {
                return Err(EgressError::Timeout("write"));
            }
            self.written.lock().unwrap().push(envelope.source_id.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), EgressError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn envelope(source_id: &str) -> Envelope {
        Envelope {
            source_id: source_id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_forwards_in_order_and_counts_drops() {
        let writer = RecordingWriter {
            fail_for: Some("bad".to_string()),
            ..Default::default()
        };
        let metrics = Arc::new(Metrics::new());
        let (tx, rx) = mpsc::channel(8);
        for id in ["a", "bad", "b", "c"] {
            tx.send(envelope(id)).await.unwrap();
        }
        drop(tx);

        Pipeline::new(writer.clone(), metrics.clone())
            .run(rx, CancellationToken::new())
            .await;

        assert_eq!(*writer.written.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(*writer.closed.lock().unwrap());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ingress, 4);
        assert_eq!(snapshot.egress, 3);
        assert_eq!(snapshot.dropped, 1);
        assert!(logs_contain("Dropped envelope from bad"));
    }

    #[tokio::test]
    async fn test_cancel_stops_driver_and_closes_writer() {
        let writer = RecordingWriter::default();
        let (_tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        Pipeline::new(writer.clone(), Arc::new(Metrics::new()))
            .run(rx, cancel)
            .await;

        assert!(writer.written.lock().unwrap().is_empty());
        assert!(*writer.closed.lock().unwrap());
    }
}
