//! JSON-lines log record parser
//!
//! Stateless and purely functional: [`Records`] walks the given text one
//! line at a time and yields `Result<LogRecord, ParseFailure>`. Each line is
//! parsed independently, so a malformed line never prevents records before
//! or after it from being produced.
//!
//! A line that is syntactically valid JSON but missing a required field
//! (`timestamp`, `type`) is also a [`ParseFailure`]. Unknown record types
//! and stop reasons are not failures; they map to the `Other` variants.
//!
//! Completeness of the trailing line is the tailer's concern: the tailer
//! only hands over newline-terminated content, so the parser treats every
//! line it is given as complete.

use crate::types::{LogRecord, RecordType, StopReason, UsageCounters};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A line that could not be parsed into a [`LogRecord`].
///
/// Carries the line's byte offset within the file and its raw content so
/// failures are diagnosable without re-reading the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// Byte offset of the line start within the source file
    pub offset: u64,
    /// Raw line content
    pub line: String,
    /// Why the line was rejected
    pub reason: String,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "offset {}: {}", self.offset, self.reason)
    }
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// One raw line from an agent log.
///
/// Uses `#[serde(default)]` liberally; required-field checks happen after
/// deserialization so the error can say which field is missing.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    timestamp: Option<String>,
    #[serde(rename = "type")]
    record_type: Option<String>,
    agent_id: Option<String>,
    session_id: Option<String>,
    cwd: Option<String>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    model: Option<String>,
    usage: Option<RawUsage>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
}

/// Lazy, restartable iterator over the records of one chunk of log text.
///
/// `base_offset` is the byte position of `text` within the file, so
/// failure offsets stay file-absolute across incremental reads.
pub struct Records<'a> {
    text: &'a str,
    offset: u64,
}

impl<'a> Records<'a> {
    pub fn new(text: &'a str, base_offset: u64) -> Self {
        Self {
            text,
            offset: base_offset,
        }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<LogRecord, ParseFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.text.is_empty() {
                return None;
            }

            let (line, consumed) = match self.text.find('\n') {
                Some(pos) => (&self.text[..pos], pos + 1),
                None => (self.text, self.text.len()),
            };
            let line_offset = self.offset;
            self.text = &self.text[consumed..];
            self.offset += consumed as u64;

            if line.trim().is_empty() {
                continue;
            }

            return Some(parse_line(line).map_err(|reason| ParseFailure {
                offset: line_offset,
                line: line.to_string(),
                reason,
            }));
        }
    }
}

/// Parse one line into a [`LogRecord`].
fn parse_line(line: &str) -> Result<LogRecord, String> {
    let raw: RawRecord =
        serde_json::from_str(line).map_err(|e| format!("JSON parse error: {e}"))?;

    let timestamp_str = raw
        .timestamp
        .ok_or_else(|| "missing required field: timestamp".to_string())?;
    let timestamp = parse_timestamp(&timestamp_str)
        .ok_or_else(|| format!("invalid timestamp: {timestamp_str}"))?;

    let record_type = raw
        .record_type
        .as_deref()
        .map(RecordType::from_raw)
        .ok_or_else(|| "missing required field: type".to_string())?;

    let (model, usage, stop_reason) = match raw.message {
        Some(msg) => (
            msg.model,
            msg.usage.map(|u| UsageCounters {
                input_tokens: u.input_tokens.unwrap_or(0),
                output_tokens: u.output_tokens.unwrap_or(0),
                cache_creation_tokens: u.cache_creation_input_tokens.unwrap_or(0),
                cache_read_tokens: u.cache_read_input_tokens.unwrap_or(0),
            }),
            msg.stop_reason.as_deref().map(StopReason::from_raw),
        ),
        None => (None, None, None),
    };

    Ok(LogRecord {
        timestamp,
        record_type,
        agent_id: raw.agent_id,
        session_id: raw.session_id,
        cwd: raw.cwd,
        model,
        usage,
        stop_reason,
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
