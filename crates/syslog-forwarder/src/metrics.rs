// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwarder counters, reported periodically through the log.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Default)]
pub struct Metrics {
    ingress: AtomicU64,
    egress: AtomicU64,
    dropped: AtomicU64,
    active_sources: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ingress: u64,
    pub egress: u64,
    pub dropped: u64,
    pub active_sources: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingress(&self) {
        self.ingress.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_egress(&self) {
        self.egress.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_active_sources(&self, count: usize) {
        self.active_sources
            .store(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ingress: self.ingress.load(Ordering::Relaxed),
            egress: self.egress.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            active_sources: self.active_sources.load(Ordering::Relaxed),
        }
    }

    pub fn report(&self) {
        let s = self.snapshot();
        info!(
            ingress = s.ingress,
            egress = s.egress,
            dropped = s.dropped,
            active_sources = s.active_sources,
            "PIPELINE | metrics"
        );
    }

    /// Reports every `period` until `cancel` fires, then once more.
    ///
    /// `active_sources` is sampled from `sources` right before each report.
    pub async fn run_reporter<F>(&self, period: Duration, sources: F, cancel: CancellationToken)
    where
        F: Fn() -> usize,
    {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.set_active_sources(sources());
                    self.report();
                }
            }
        }
        self.set_active_sources(sources());
        self.report();
    }
}
