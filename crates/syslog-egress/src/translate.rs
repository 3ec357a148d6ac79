// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns one envelope into the syslog messages that represent it.
//!
//! | Envelope | Messages | Priority          | PROCID                  |
//! |----------|----------|-------------------|-------------------------|
//! | log      | 1        | 14 (OUT), 11 (ERR) | `[SOURCE_TYPE/instance]` |
//! | gauge    | 1/metric | 14                | `[instance]`            |
//! | counter  | 1        | 14                | `[instance]`            |
//! | other    | 0        |                   |                         |

use crate::rfc5424::{SdParam, StructuredData, SyslogMessage, PRIORITY_ERROR, PRIORITY_INFO};
use chrono::DateTime;
use log_stream::envelope::{Counter, Gauge, Log, LogType};
use log_stream::{Envelope, Message};

pub const GAUGE_SD_ID: &str = "gauge@47450";
pub const COUNTER_SD_ID: &str = "counter@47450";

const HOSTNAME_SUFFIX_TAG: &str = "hostname_suffix";
const SOURCE_TYPE_TAG: &str = "source_type";

pub fn to_syslog_messages(envelope: &Envelope, hostname: &str) -> Vec<SyslogMessage> {
    let base = SyslogMessage {
        priority: Some(PRIORITY_INFO),
        timestamp: DateTime::from_timestamp_nanos(envelope.timestamp),
        hostname: format!(
            "{hostname}.{}",
            envelope
                .tags
                .get(HOSTNAME_SUFFIX_TAG)
                .map(String::as_str)
                .unwrap_or_default()
        ),
        app_name: envelope.source_id.clone(),
        process_id: format!("[{}]", envelope.instance_id),
        message_id: String::new(),
        structured_data: Vec::new(),
        message: b"\n".to_vec(),
    };

    match &envelope.message {
        Some(Message::Log(log)) => vec![log_message(envelope, log, base)],
        Some(Message::Gauge(gauge)) => gauge_messages(gauge, &base),
        Some(Message::Counter(counter)) => vec![counter_message(counter, base)],
        Some(Message::Event(_)) | Some(Message::Timer(_)) | None => Vec::new(),
    }
}

fn log_message(envelope: &Envelope, log: &Log, base: SyslogMessage) -> SyslogMessage {
    let priority = match log.log_type {
        LogType::Out => Some(PRIORITY_INFO),
        LogType::Err => Some(PRIORITY_ERROR),
        LogType::Unknown => None,
    };

    let source_type = envelope
        .tags
        .get(SOURCE_TYPE_TAG)
        .map(String::as_str)
        .unwrap_or_default();

    let mut payload: Vec<u8> = log.payload.iter().copied().filter(|b| *b != 0).collect();
    if payload.last() != Some(&b'\n') {
        payload.push(b'\n');
    }

    SyslogMessage {
        priority,
        process_id: process_id(source_type, &envelope.instance_id),
        message: payload,
        ..base
    }
}

fn gauge_messages(gauge: &Gauge, base: &SyslogMessage) -> Vec<SyslogMessage> {
    gauge
        .metrics
        .iter()
        .map(|(name, metric)| SyslogMessage {
            structured_data: vec![StructuredData {
                id: GAUGE_SD_ID.to_string(),
                params: vec![
                    SdParam::new("name", name.as_str()),
                    SdParam::new("value", metric.value.to_string()),
                    SdParam::new("unit", metric.unit.as_str()),
                ],
            }],
            ..base.clone()
        })
        .collect()
}

fn counter_message(counter: &Counter, base: SyslogMessage) -> SyslogMessage {
    SyslogMessage {
        structured_data: vec![StructuredData {
            id: COUNTER_SD_ID.to_string(),
            params: vec![
                SdParam::new("name", counter.name.as_str()),
                SdParam::new("total", counter.total.to_string()),
                SdParam::new("delta", counter.delta.to_string()),
            ],
        }],
        ..base
    }
}

fn process_id(source_type: &str, instance: &str) -> String {
    let source_type = source_type.to_uppercase().replace(' ', "-");
    if instance.is_empty() {
        format!("[{source_type}]")
    } else {
        format!("[{source_type}/{instance}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log_stream::envelope::{Event, GaugeValue};
    use std::collections::{HashMap, HashSet};

    fn envelope(message: Message) -> Envelope {
        Envelope {
            timestamp: 1_580_428_783_000_000_000,
            source_id: "app-guid".to_string(),
            instance_id: "2".to_string(),
            tags: HashMap::from([
                ("hostname_suffix".to_string(), "suffix".to_string()),
                ("source_type".to_string(), "app web".to_string()),
            ]),
            message: Some(message),
        }
    }

    fn log(payload: &[u8], log_type: LogType) -> Message {
        Message::Log(Log {
            payload: payload.to_vec(),
            log_type,
        })
    }

    #[test]
    fn test_out_log() {
        let messages = to_syslog_messages(&envelope(log(b"hello", LogType::Out)), "host");
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.priority, Some(14));
        assert_eq!(msg.hostname, "host.suffix");
        assert_eq!(msg.app_name, "app-guid");
        assert_eq!(msg.process_id, "[APP-WEB/2]");
        assert_eq!(msg.message, b"hello\n");

        assert_eq!(
            String::from_utf8(msg.encode().unwrap()).unwrap(),
            "<14>1 2020-01-30T23:59:43Z host.suffix app-guid [APP-WEB/2] - - hello\n"
        );
    }

    #[test]
    fn test_err_log() {
        let messages = to_syslog_messages(&envelope(log(b"boom\n", LogType::Err)), "host");
        assert_eq!(messages[0].priority, Some(11));
        assert_eq!(messages[0].message, b"boom\n");
    }

    #[test]
    fn test_unknown_log_type_cannot_be_encoded() {
        let messages = to_syslog_messages(&envelope(log(b"x", LogType::Unknown)), "host");
        assert_eq!(messages[0].priority, None);
        assert!(messages[0].encode().is_err());
    }

    #[test]
    fn test_log_strips_nul_bytes() {
        let messages = to_syslog_messages(&envelope(log(b"a\0b\0", LogType::Out)), "host");
        assert_eq!(messages[0].message, b"ab\n");
    }

    #[test]
    fn test_log_without_instance() {
        let mut env = envelope(log(b"x", LogType::Out));
        env.instance_id = String::new();
        let messages = to_syslog_messages(&env, "host");
        assert_eq!(messages[0].process_id, "[APP-WEB]");
    }

    #[test]
    fn test_missing_suffix_tag() {
        let mut env = envelope(log(b"x", LogType::Out));
        env.tags.clear();
        let messages = to_syslog_messages(&env, "host");
        assert_eq!(messages[0].hostname, "host.");
    }

    #[test]
    fn test_gauge_emits_one_message_per_metric() {
        let metrics: HashMap<String, GaugeValue> = ["cpu", "memory", "disk", "memory_quota", "disk_quota"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                (
                    name.to_string(),
                    GaugeValue {
                        unit: "bytes".to_string(),
                        value: i as f64 + 0.5,
                    },
                )
            })
            .collect();
        let messages = to_syslog_messages(&envelope(Message::Gauge(Gauge { metrics })), "host");

        assert_eq!(messages.len(), 5);
        let names: HashSet<String> = messages
            .iter()
            .map(|m| {
                assert_eq!(m.priority, Some(14));
                assert_eq!(m.process_id, "[2]");
                assert_eq!(m.message, b"\n");
                assert_eq!(m.structured_data[0].id, GAUGE_SD_ID);
                m.structured_data[0].params[0].value.clone()
            })
            .collect();
        assert_eq!(names.len(), 5);
        assert!(names.contains("memory_quota"));
    }

    #[test]
    fn test_gauge_value_uses_shortest_representation() {
        let metrics = HashMap::from([(
            "cpu".to_string(),
            GaugeValue {
                unit: "percentage".to_string(),
                value: 0.1,
            },
        )]);
        let messages = to_syslog_messages(&envelope(Message::Gauge(Gauge { metrics })), "host");
        assert_eq!(
            messages[0].structured_data[0].params,
            vec![
                SdParam::new("name", "cpu"),
                SdParam::new("value", "0.1"),
                SdParam::new("unit", "percentage"),
            ]
        );
    }

    #[test]
    fn test_counter() {
        let counter = Counter {
            name: "requests".to_string(),
            delta: 5,
            total: 120,
        };
        let messages = to_syslog_messages(&envelope(Message::Counter(counter)), "host");
        assert_eq!(messages.len(), 1);

        let encoded = String::from_utf8(messages[0].encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            "<14>1 2020-01-30T23:59:43Z host.suffix app-guid [2] - \
             [counter@47450 name=\"requests\" total=\"120\" delta=\"5\"] \n"
        );
    }

    #[test]
    fn test_other_payloads_produce_nothing() {
        let event = Message::Event(Event {
            title: "t".to_string(),
            body: "b".to_string(),
        });
        assert!(to_syslog_messages(&envelope(event), "host").is_empty());

        let mut empty = envelope(log(b"x", LogType::Out));
        empty.message = None;
        assert!(to_syslog_messages(&empty, "host").is_empty());
    }
}
