// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! RFC 5424 message model and its text encoding.
//!
//! ```text
//! <PRI>1 TIMESTAMP HOSTNAME APP-NAME PROCID MSGID [SD-ID k="v" ...] MSG
//! ```
//!
//! Empty header fields are rendered as the nil value `-`.

use crate::errors::EgressError;
use chrono::{DateTime, Utc};

const VERSION: u8 = 1;
const NIL: &str = "-";

const MAX_HOSTNAME_LEN: usize = 255;
const MAX_APP_NAME_LEN: usize = 48;
const MAX_PROCID_LEN: usize = 128;
const MAX_MSGID_LEN: usize = 32;
const MAX_PRIORITY: u8 = 191;

pub const FACILITY_USER: u8 = 1 << 3;
pub const SEVERITY_ERROR: u8 = 3;
pub const SEVERITY_INFO: u8 = 6;

pub const PRIORITY_INFO: u8 = FACILITY_USER + SEVERITY_INFO;
pub const PRIORITY_ERROR: u8 = FACILITY_USER + SEVERITY_ERROR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdParam {
    pub name: String,
    pub value: String,
}

impl SdParam {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        SdParam {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredData {
    pub id: String,
    pub params: Vec<SdParam>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyslogMessage {
    /// `None` when the source severity has no syslog equivalent. Such a
    /// message cannot be encoded.
    pub priority: Option<u8>,
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub app_name: String,
    pub process_id: String,
    pub message_id: String,
    pub structured_data: Vec<StructuredData>,
    pub message: Vec<u8>,
}

impl SyslogMessage {
    pub fn encode(&self) -> Result<Vec<u8>, EgressError> {
        let priority = match self.priority {
            Some(p) if p <= MAX_PRIORITY => p,
            Some(p) => return Err(EgressError::Encode(format!("priority {p} out of range"))),
            None => return Err(EgressError::Encode("invalid priority".to_string())),
        };
        check_field("hostname", &self.hostname, MAX_HOSTNAME_LEN)?;
        check_field("app name", &self.app_name, MAX_APP_NAME_LEN)?;
        check_field("process id", &self.process_id, MAX_PROCID_LEN)?;
        check_field("message id", &self.message_id, MAX_MSGID_LEN)?;

        let mut header = format!(
            "<{priority}>{VERSION} {} {} {} {} {} ",
            format_timestamp(&self.timestamp),
            nil_if_empty(&self.hostname),
            nil_if_empty(&self.app_name),
            nil_if_empty(&self.process_id),
            nil_if_empty(&self.message_id),
        );

        if self.structured_data.is_empty() {
            header.push_str(NIL);
        }
        for element in &self.structured_data {
            check_field("structured data id", &element.id, MAX_MSGID_LEN)?;
            header.push('[');
            header.push_str(&element.id);
            for param in &element.params {
                check_field("structured data param", &param.name, MAX_MSGID_LEN)?;
                header.push(' ');
                header.push_str(&param.name);
                header.push_str("=\"");
                header.push_str(&escape_param_value(&param.value));
                header.push('"');
            }
            header.push(']');
        }

        let mut out = header.into_bytes();
        if !self.message.is_empty() {
            out.push(b' ');
            out.extend_from_slice(&self.message);
        }
        Ok(out)
    }

    /// Encodes with octet-counting framing for stream transports.
    pub fn frame(&self) -> Result<Vec<u8>, EgressError> {
        let encoded = self.encode()?;
        let mut framed = format!("{} ", encoded.len()).into_bytes();
        framed.extend_from_slice(&encoded);
        Ok(framed)
    }
}

fn nil_if_empty(value: &str) -> &str {
    if value.is_empty() {
        NIL
    } else {
        value
    }
}

fn check_field(field: &str, value: &str, max_len: usize) -> Result<(), EgressError> {
    if value.len() > max_len {
        return Err(EgressError::Encode(format!(
            "{field} longer than {max_len} bytes"
        )));
    }
    if !value.bytes().all(|b| (33..=126).contains(&b)) {
        return Err(EgressError::Encode(format!(
            "{field} {value:?} is not printable ascii"
        )));
    }
    Ok(())
}

fn escape_param_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// RFC 3339 in UTC with microsecond precision, trailing zeros dropped.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    let mut formatted = timestamp.format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = timestamp.timestamp_subsec_micros();
    if micros > 0 {
        let fraction = format!("{micros:06}");
        formatted.push('.');
        formatted.push_str(fraction.trim_end_matches('0'));
    }
    formatted.push('Z');
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> SyslogMessage {
        SyslogMessage {
            priority: Some(PRIORITY_INFO),
            timestamp: DateTime::from_timestamp_nanos(1_580_428_783_123_450_000),
            hostname: "org.space.app".to_string(),
            app_name: "app-guid".to_string(),
            process_id: "[APP/1]".to_string(),
            message_id: String::new(),
            structured_data: Vec::new(),
            message: b"hello\n".to_vec(),
        }
    }

    #[test]
    fn test_priorities() {
        assert_eq!(PRIORITY_INFO, 14);
        assert_eq!(PRIORITY_ERROR, 11);
    }

    #[test]
    fn test_encode_log_line() {
        let encoded = message().encode().expect("encode");
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            "<14>1 2020-01-30T23:59:43.12345Z org.space.app app-guid [APP/1] - - hello\n"
        );
    }

    #[test]
    fn test_encode_structured_data_escapes_values() {
        let mut msg = message();
        msg.message = Vec::new();
        msg.structured_data = vec![StructuredData {
            id: "gauge@47450".to_string(),
            params: vec![
                SdParam::new("name", "cpu"),
                SdParam::new("unit", r#"a"b\c]"#),
            ],
        }];

        let encoded = String::from_utf8(msg.encode().expect("encode")).unwrap();
        assert!(encoded.ends_with(r#"- [gauge@47450 name="cpu" unit="a\"b\\c\]"]"#));
    }

    #[test]
    fn test_whole_second_timestamp_has_no_fraction() {
        let ts = DateTime::from_timestamp_nanos(1_580_428_783_000_000_000);
        assert_eq!(format_timestamp(&ts), "2020-01-30T23:59:43Z");
    }

    #[test]
    fn test_missing_priority_fails() {
        let mut msg = message();
        msg.priority = None;
        assert!(matches!(msg.encode(), Err(EgressError::Encode(_))));
    }

    #[test]
    fn test_field_limits() {
        let mut msg = message();
        msg.app_name = "a".repeat(49);
        assert!(matches!(msg.encode(), Err(EgressError::Encode(_))));

        let mut msg = message();
        msg.hostname = "has space".to_string();
        assert!(matches!(msg.encode(), Err(EgressError::Encode(_))));
    }

    #[test]
    fn test_frame_prefixes_octet_count() {
        let msg = message();
        let encoded = msg.encode().expect("encode");
        let framed = msg.frame().expect("frame");
        let prefix = format!("{} ", encoded.len());
        assert!(framed.starts_with(prefix.as_bytes()));
        assert_eq!(&framed[prefix.len()..], encoded.as_slice());
    }
}
