// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards platform telemetry to a syslog drain.
//!
//! This crate wires [`log_stream`] (source discovery and streaming) to
//! [`syslog_egress`] (RFC 5424 delivery) and owns the process lifecycle.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod services;

pub use config::ForwarderConfig;
pub use error::ForwarderError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::Pipeline;
pub use services::{ForwarderHandle, ForwarderServices, ServiceStatus};
