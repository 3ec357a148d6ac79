// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Source discovery and envelope streaming.
//!
//! The crate keeps a set of per-source streams in sync with a catalog of
//! sources and merges every stream into one bounded channel:
//!
//! ```text
//!   Catalog ──poll──> Reconciler ──add/remove──> Aggregator
//!                                                   │
//!                                  one Producer per source (gateway stream)
//!                                                   │
//!                                                   v
//!                                       bounded mpsc::Receiver<Envelope>
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod auth;
pub mod catalog;
pub mod envelope;
pub mod errors;
pub mod gateway;
pub mod reconciler;
mod sse;

pub use aggregator::{Aggregator, DEFAULT_BUFFER_SIZE};
pub use catalog::{CatalogClient, CatalogProvider, Resource, ResourceProvider, Scope};
pub use envelope::{Envelope, Message};
pub use gateway::{EnvelopeStream, HttpStreamConnector, Selector, StreamConnector, StreamRequest};
pub use reconciler::{interval_ticker, reconcile, Delta, Reconciler, SourceSet, Ticker};
