// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Streaming gateway contract and its HTTP implementation.
//!
//! A stream is pull-style: callers ask for the next batch and get `None` once
//! the stream is closed. Connecting is lazy and happens on the first pull, so
//! building a stream never fails.

use crate::auth::TokenSource;
use crate::envelope::Envelope;
use crate::errors::GatewayError;
use crate::sse::{SseEvent, SseParser, MAX_BUFFERED_BYTES};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

const READ_PATH: &str = "/v2/read";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Log,
    Gauge,
    Counter,
}

impl Selector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Selector::Log => "log",
            Selector::Gauge => "gauge",
            Selector::Counter => "counter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub shard_id: String,
    pub source_id: String,
    pub selectors: Vec<Selector>,
}

impl StreamRequest {
    /// Subscribes to logs, gauges and counters of one source.
    pub fn for_source(shard_id: &str, source_id: &str) -> Self {
        StreamRequest {
            shard_id: shard_id.to_string(),
            source_id: source_id.to_string(),
            selectors: vec![Selector::Log, Selector::Gauge, Selector::Counter],
        }
    }
}

#[async_trait]
pub trait EnvelopeStream: Send {
    /// Returns the next non-empty batch, or `None` when the stream is closed.
    async fn next_batch(&mut self) -> Option<Vec<Envelope>>;
}

pub trait StreamConnector: Send + Sync {
    fn stream(&self, request: StreamRequest) -> Box<dyn EnvelopeStream>;
}

/// Connector for the gateway's server-sent-events read endpoint.
#[derive(Debug, Clone)]
pub struct HttpStreamConnector {
    client: reqwest::Client,
    gateway_addr: String,
    token_source: Arc<TokenSource>,
}

impl HttpStreamConnector {
    pub fn new(client: reqwest::Client, gateway_addr: &str, token_source: Arc<TokenSource>) -> Self {
        HttpStreamConnector {
            client,
            gateway_addr: gateway_addr.trim_end_matches('/').to_string(),
            token_source,
        }
    }

    pub fn read_url(&self, request: &StreamRequest) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&format!("{}{READ_PATH}", self.gateway_addr))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("shard_id", &request.shard_id);
            query.append_pair("source_id", &request.source_id);
            for selector in &request.selectors {
                query.append_key_only(selector.as_str());
            }
        }
        Ok(url)
    }
}

impl StreamConnector for HttpStreamConnector {
    fn stream(&self, request: StreamRequest) -> Box<dyn EnvelopeStream> {
        Box::new(SseEnvelopeStream {
            connector: self.clone(),
            request,
            body: None,
            parser: SseParser::default(),
            closed: false,
        })
    }
}

type Body = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

#[derive(Deserialize)]
struct BatchPayload {
    #[serde(default)]
    batch: Vec<serde_json::Value>,
}

enum Frame {
    Batch(Vec<Envelope>),
    Skip,
    Close,
}

struct SseEnvelopeStream {
    connector: HttpStreamConnector,
    request: StreamRequest,
    body: Option<Body>,
    parser: SseParser,
    closed: bool,
}

async fn open(connector: &HttpStreamConnector, request: &StreamRequest) -> Result<Body, GatewayError> {
    let url = connector.read_url(request)?;
    let token = connector.token_source.token().await?;
    debug!("Opening gateway stream for {}", request.source_id);

    let response = connector
        .client
        .get(url)
        .bearer_auth(token)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(GatewayError::Status(response.status()));
    }
    Ok(Box::pin(response.bytes_stream()))
}

impl SseEnvelopeStream {
    fn close(&mut self) -> Option<Vec<Envelope>> {
        self.closed = true;
        self.body = None;
        None
    }

    /// Decodes each envelope on its own so one bad entry does not cost the
    /// rest of the batch.
    fn decode_batch(&self, raw: Vec<serde_json::Value>) -> Vec<Envelope> {
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value::<Envelope>(value) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    warn!(
                        "Skipping undecodable envelope for {}: {e}",
                        self.request.source_id
                    );
                    None
                }
            })
            .collect()
    }

    fn classify(&self, event: SseEvent) -> Frame {
        match event.event.as_deref() {
            Some("heartbeat") => Frame::Skip,
            Some("closing") => Frame::Close,
            _ => match serde_json::from_str::<BatchPayload>(&event.data) {
                Ok(payload) => {
                    let batch = self.decode_batch(payload.batch);
                    if batch.is_empty() {
                        Frame::Skip
                    } else {
                        Frame::Batch(batch)
                    }
                }
                Err(e) => {
                    warn!(
                        "Discarding undecodable batch for {}: {e}",
                        self.request.source_id
                    );
                    Frame::Skip
                }
            },
        }
    }
}

#[async_trait]
impl EnvelopeStream for SseEnvelopeStream {
    async fn next_batch(&mut self) -> Option<Vec<Envelope>> {
        if self.closed {
            return None;
        }
        if self.body.is_none() {
            match open(&self.connector, &self.request).await {
                Ok(body) => self.body = Some(body),
                Err(e) => {
                    warn!(
                        "Unable to open gateway stream for {}: {e}",
                        self.request.source_id
                    );
                    return self.close();
                }
            }
        }

        loop {
            while let Some(event) = self.parser.next_event() {
                match self.classify(event) {
                    Frame::Batch(batch) => return Some(batch),
                    Frame::Skip => {}
                    Frame::Close => return self.close(),
                }
            }

            let body = self.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => {
                    if self.parser.push(&chunk).is_err() {
                        warn!(
                            "Gateway stream for {} sent an event larger than {MAX_BUFFERED_BYTES} bytes",
                            self.request.source_id
                        );
                        return self.close();
                    }
                }
                Some(Err(e)) => {
                    warn!(
                        "Gateway stream for {} failed: {e}",
                        self.request.source_id
                    );
                    return self.close();
                }
                None => {
                    debug!("Gateway stream for {} ended", self.request.source_id);
                    return self.close();
                }
            }
        }
    }
}
