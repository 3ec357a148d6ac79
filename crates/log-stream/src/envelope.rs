// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telemetry envelopes as delivered by the streaming gateway.
//!
//! The gateway speaks the protobuf JSON mapping: 64-bit integers may arrive as
//! strings, byte payloads are base64 and zero-valued enums are omitted.

use base64::Engine;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// One unit of telemetry for a single source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawEnvelope")]
pub struct Envelope {
    /// Nanoseconds since the unix epoch.
    pub timestamp: i64,
    pub source_id: String,
    pub instance_id: String,
    pub tags: HashMap<String, String>,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Log(Log),
    Counter(Counter),
    Gauge(Gauge),
    Event(Event),
    Timer(Timer),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Log {
    #[serde(default, deserialize_with = "deserialize_base64")]
    pub payload: Vec<u8>,
    #[serde(default, rename = "type")]
    pub log_type: LogType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogType {
    #[default]
    Out,
    Err,
    /// A value this build does not know about. Kept so the egress side can
    /// reject it instead of guessing a severity.
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Counter {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_number_or_string")]
    pub delta: u64,
    #[serde(default, deserialize_with = "deserialize_number_or_string")]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Gauge {
    #[serde(default)]
    pub metrics: HashMap<String, GaugeValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GaugeValue {
    #[serde(default)]
    pub unit: String,
    #[serde(default, deserialize_with = "deserialize_number_or_string")]
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Timer {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_number_or_string")]
    pub start: i64,
    #[serde(default, deserialize_with = "deserialize_number_or_string")]
    pub stop: i64,
}

impl Envelope {
    pub fn log_type(&self) -> Option<LogType> {
        match &self.message {
            Some(Message::Log(log)) => Some(log.log_type),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default, deserialize_with = "deserialize_number_or_string")]
    timestamp: i64,
    #[serde(default)]
    source_id: String,
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    log: Option<Log>,
    #[serde(default)]
    counter: Option<Counter>,
    #[serde(default)]
    gauge: Option<Gauge>,
    #[serde(default)]
    event: Option<Event>,
    #[serde(default)]
    timer: Option<Timer>,
}

impl From<RawEnvelope> for Envelope {
    fn from(raw: RawEnvelope) -> Self {
        let message = raw
            .log
            .map(Message::Log)
            .or_else(|| raw.counter.map(Message::Counter))
            .or_else(|| raw.gauge.map(Message::Gauge))
            .or_else(|| raw.event.map(Message::Event))
            .or_else(|| raw.timer.map(Message::Timer));

        Envelope {
            timestamp: raw.timestamp,
            source_id: raw.source_id,
            instance_id: raw.instance_id,
            tags: raw.tags,
            message,
        }
    }
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Number(i64),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) => match name.as_str() {
                "OUT" => LogType::Out,
                "ERR" => LogType::Err,
                _ => LogType::Unknown,
            },
            Repr::Number(0) => LogType::Out,
            Repr::Number(1) => LogType::Err,
            Repr::Number(_) => LogType::Unknown,
        })
    }
}

/// Accepts a JSON number or a string holding one, as the protobuf JSON
/// mapping writes 64-bit integers as strings.
fn deserialize_number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value = Value::deserialize(deserializer)?;
    let text = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a number or a numeric string, got {other}"
            )))
        }
    };
    text.trim().parse::<T>().map_err(serde::de::Error::custom)
}

fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}
