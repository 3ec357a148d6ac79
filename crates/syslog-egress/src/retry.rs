// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Retry decorator for [`Writer`]s.
//!
//! A failed write is retried up to `max_retries` attempts in total, sleeping
//! between attempts. Each retry emits one log line on the failing source's
//! behalf so the app owner can see their drain is struggling.
//!
//! The binding's cancellation token is checked before each sleep, not during
//! it: an in-flight backoff always runs to completion.

use crate::binding::UrlBinding;
use crate::errors::EgressError;
use crate::writer::Writer;
use async_trait::async_trait;
use log_stream::Envelope;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(15);

/// Maps a zero-based attempt number to the sleep before the next attempt.
pub type RetryDuration = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

/// 1ms for the first retry, then 2ms, 4ms, 8ms and so on, capped at 15s.
pub fn exponential_duration(attempt: usize) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(1);
    }
    let exponent = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
    let tenths_of_ms = 2_u64
        .checked_pow(exponent)
        .map_or(u64::MAX, |factor| factor.saturating_mul(100));
    Duration::from_micros(tenths_of_ms.saturating_mul(10)).min(MAX_BACKOFF)
}

/// Receives retry telemetry for a source.
pub trait LogClient: Send + Sync {
    fn emit_log(&self, message: &str, source_id: &str);
}

/// Reports retries through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogClient;

impl LogClient for TracingLogClient {
    fn emit_log(&self, message: &str, source_id: &str) {
        warn!(source_id, "EGRESS | {message}");
    }
}

pub struct RetryWriter<W> {
    writer: W,
    binding: UrlBinding,
    retry_duration: RetryDuration,
    max_retries: usize,
    log_client: Arc<dyn LogClient>,
}

impl<W: Writer> RetryWriter<W> {
    /// Builds the inner writer from `binding` through `constructor`, so the
    /// inner writer and the retry loop share one binding.
    pub fn new<F, E>(
        binding: &UrlBinding,
        retry_duration: RetryDuration,
        max_retries: usize,
        log_client: Arc<dyn LogClient>,
        constructor: F,
    ) -> Result<Self, E>
    where
        F: FnOnce(&UrlBinding) -> Result<W, E>,
    {
        let writer = constructor(binding)?;
        Ok(RetryWriter {
            writer,
            binding: binding.clone(),
            retry_duration,
            max_retries: max_retries.max(1),
            log_client,
        })
    }

    pub fn inner(&self) -> &W {
        &self.writer
    }
}

#[async_trait]
impl<W: Writer> Writer for RetryWriter<W> {
    async fn write(&mut self, envelope: &Envelope) -> Result<(), EgressError> {
        let mut attempt = 0;
        loop {
            let err = match self.writer.write(envelope).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if attempt + 1 >= self.max_retries {
                debug!(
                    "EGRESS | Giving up on {} after {} attempts: {err}",
                    envelope.source_id, self.max_retries
                );
                return Err(err);
            }
            if self.binding.context.is_cancelled() {
                debug!("EGRESS | Binding canceled, not retrying: {err}");
                return Err(err);
            }

            let sleep = (self.retry_duration)(attempt);
            self.log_client.emit_log(
                &format!(
                    "Syslog Drain: Error when writing. Backing off for {sleep:?}. {err}"
                ),
                &envelope.source_id,
            );
            tokio::time::sleep(sleep).await;
            attempt += 1;
        }
    }

    async fn close(&mut self) -> Result<(), EgressError> {
        self.writer.close().await
    }
}
