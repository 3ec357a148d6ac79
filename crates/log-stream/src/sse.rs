// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Incremental parser for `text/event-stream` bodies.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Largest amount of unterminated event data held before the stream is
/// considered broken.
pub(crate) const MAX_BUFFERED_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferFull;

/// Buffers body chunks and yields complete events as they become available.
#[derive(Debug)]
pub(crate) struct SseParser {
    buffer: Vec<u8>,
    // Bytes already searched for a terminator.
    scanned: usize,
    limit: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        SseParser::with_limit(MAX_BUFFERED_BYTES)
    }
}

impl SseParser {
    pub fn with_limit(limit: usize) -> Self {
        SseParser {
            buffer: Vec::new(),
            scanned: 0,
            limit,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), BufferFull> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
        if self.buffer.len() > self.limit {
            self.buffer.clear();
            self.scanned = 0;
            return Err(BufferFull);
        }
        Ok(())
    }

    pub fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            // Step back one byte so a terminator split across pushes is found.
            let start = self.scanned.saturating_sub(1);
            let Some(offset) = self.buffer[start..].windows(2).position(|w| w == b"\n\n") else {
                self.scanned = self.buffer.len();
                return None;
            };
            let end = start + offset;
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            self.scanned = 0;
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                return Some(event);
            }
        }
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}
