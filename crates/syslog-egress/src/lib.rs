// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Syslog egress: turns envelopes into RFC 5424 messages and delivers them.
//!
//! ```text
//!   Envelope ──> RetryWriter ──> SyslogWriter::{Tcp, Tls, Https} ──> drain
//!                     │
//!                 backoff + retry telemetry
//! ```
//!
//! The destination URL scheme picks the transport: `syslog` (TCP),
//! `syslog-tls` (TLS) or `https`.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod binding;
pub mod errors;
pub mod https;
pub mod retry;
pub mod rfc5424;
pub mod tcp;
pub mod tls;
pub mod translate;
pub mod writer;

pub use binding::UrlBinding;
pub use errors::{BindingError, EgressError};
pub use retry::{exponential_duration, LogClient, RetryDuration, RetryWriter, TracingLogClient};
pub use writer::{SyslogWriter, Writer, WriterConfig, WriterFactory};
