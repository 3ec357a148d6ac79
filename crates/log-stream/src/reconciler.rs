// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Keeps the running source set in line with the catalog.
//!
//! Every tick the reconciler polls the catalog and diffs the result against
//! what the [`SourceSet`] reports as running, by GUID. The diff is recomputed
//! from observed state each time, so a partially applied tick is repaired on
//! the next one. A failed poll leaves the running set untouched.

use crate::catalog::{Resource, ResourceProvider};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The running side of a reconciliation.
pub trait SourceSet: Send + Sync {
    fn add(&self, source: Resource);
    fn remove(&self, guid: &str);
    fn list(&self) -> Vec<Resource>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub added: Vec<Resource>,
    pub removed: Vec<Resource>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// `added = desired - current`, `removed = current - desired`, keyed by GUID.
/// Order within each side follows the input order.
pub fn reconcile(desired: &[Resource], current: &[Resource]) -> Delta {
    let desired_ids: HashSet<&str> = desired.iter().map(|r| r.guid.as_str()).collect();
    let current_ids: HashSet<&str> = current.iter().map(|r| r.guid.as_str()).collect();

    let mut seen = HashSet::new();
    let added = desired
        .iter()
        .filter(|r| !current_ids.contains(r.guid.as_str()) && seen.insert(r.guid.as_str()))
        .cloned()
        .collect();
    let removed = current
        .iter()
        .filter(|r| !desired_ids.contains(r.guid.as_str()))
        .cloned()
        .collect();

    Delta { added, removed }
}

/// Source of reconciliation ticks. Returns `false` once no more ticks will come.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self) -> bool;
}

#[async_trait]
impl Ticker for Interval {
    async fn tick(&mut self) -> bool {
        Interval::tick(self).await;
        true
    }
}

/// Ticks on demand, one per message received.
#[async_trait]
impl Ticker for mpsc::Receiver<()> {
    async fn tick(&mut self) -> bool {
        self.recv().await.is_some()
    }
}

/// Interval ticker whose first tick fires immediately.
pub fn interval_ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

pub struct Reconciler {
    provider: Arc<dyn ResourceProvider>,
    sources: Arc<dyn SourceSet>,
}

impl Reconciler {
    pub fn new(provider: Arc<dyn ResourceProvider>, sources: Arc<dyn SourceSet>) -> Self {
        Reconciler { provider, sources }
    }

    /// Runs one reconciliation per tick until canceled or the ticker ends.
    pub async fn run<T: Ticker>(&self, mut ticker: T, cancel: CancellationToken) {
        debug!("RECONCILER | started");
        loop {
            let more = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                more = ticker.tick() => more,
            };
            if !more {
                break;
            }
            self.reconcile_once().await;
        }
        debug!("RECONCILER | stopped");
    }

    /// Polls the catalog and applies the delta. Returns `None` when the poll
    /// failed and nothing was changed.
    pub async fn reconcile_once(&self) -> Option<Delta> {
        let desired = match self.provider.resources().await {
            Ok(resources) => resources,
            Err(e) => {
                warn!("RECONCILER | Failed to fetch sources, keeping current set: {e}");
                return None;
            }
        };

        let delta = reconcile(&desired, &self.sources.list());
        for source in &delta.added {
            info!("RECONCILER | Adding source {} ({})", source.guid, source.name);
            self.sources.add(source.clone());
        }
        for source in &delta.removed {
            info!("RECONCILER | Removing source {} ({})", source.guid, source.name);
            self.sources.remove(&source.guid);
        }
        Some(delta)
    }
}
