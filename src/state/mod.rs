//! Loop record schema.
//!
//! The loop record is a small markdown document with a front-matter style
//! header followed by the task body:
//!
//! ```text
//! ---
//! active: true
//! iteration: 1
//! max_iterations: 10
//! completion_promise: "All tests pass"
//! started_at: "2026-01-01T00:00:00.000Z"
//! ---
//!
//! Fix the flaky integration test
//! ```
//!
//! Parsing is split in two layers. [`LoopRecord::parse`] only checks the
//! delimiter layout and collects raw field text; a document that fails that
//! check is reported as `None` and callers treat it exactly like a missing
//! record. The typed accessors ([`LoopRecord::iteration`],
//! [`LoopRecord::max_iterations`], ...) then validate individual fields so
//! the loop controller can tell corruption apart from absence.

pub mod store;

pub use store::StateStore;

use std::ops::Range;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Result, UcaiError};
use crate::promise::normalize;

/// Line that opens and closes the record header.
const DELIMITER: &str = "---";

/// Unquoted promise values that mean "no promise configured".
const NO_PROMISE_SENTINELS: &[&str] = &["", "null", "none", "~"];

/// Named header fields of the loop record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Informational activity flag
    Active,
    /// Current turn number
    Iteration,
    /// Iteration cap, `0` meaning unlimited
    MaxIterations,
    /// Phrase that signals genuine completion
    CompletionPromise,
    /// Creation timestamp
    StartedAt,
}

impl Field {
    /// All fields in the order they are written.
    pub const ALL: [Field; 5] = [
        Field::Active,
        Field::Iteration,
        Field::MaxIterations,
        Field::CompletionPromise,
        Field::StartedAt,
    ];

    /// Field name as it appears in the header.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Field::Active => "active",
            Field::Iteration => "iteration",
            Field::MaxIterations => "max_iterations",
            Field::CompletionPromise => "completion_promise",
            Field::StartedAt => "started_at",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw text of one header field plus where it sits in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldValue {
    text: String,
    span: Range<usize>,
}

/// A parsed loop record.
///
/// Holds the original document so that rewriting the iteration counter can
/// leave every other byte untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopRecord {
    content: String,
    fields: [Option<FieldValue>; 5],
    body: Range<usize>,
}

impl LoopRecord {
    /// Parse a record document.
    ///
    /// Returns `None` when the header/body delimiter layout is not present.
    /// Field values are not validated here.
    ///
    /// # Example
    ///
    /// ```
    /// use ucai::state::LoopRecord;
    ///
    /// let record = LoopRecord::parse("---\niteration: 2\nmax_iterations: 0\n---\n\nFix bug\n").unwrap();
    /// assert_eq!(record.iteration().unwrap(), 2);
    /// assert_eq!(record.task(), "Fix bug");
    ///
    /// assert!(LoopRecord::parse("iteration: 2\n").is_none());
    /// ```
    #[must_use]
    pub fn parse(content: &str) -> Option<Self> {
        let (header, body) = split_sections(content)?;

        let mut fields: [Option<FieldValue>; 5] = Default::default();
        let mut offset = header.start;
        for line in content[header.clone()].split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            let text = line.trim_end_matches(|c| c == '\n' || c == '\r');
            for (slot, field) in fields.iter_mut().zip(Field::ALL) {
                if slot.is_some() {
                    continue;
                }
                let Some(rest) = text
                    .strip_prefix(field.name())
                    .and_then(|r| r.strip_prefix(':'))
                else {
                    continue;
                };
                let value = rest.trim();
                let leading = rest.len() - rest.trim_start().len();
                let start = line_start + field.name().len() + 1 + leading;
                *slot = Some(FieldValue {
                    text: value.to_string(),
                    span: start..start + value.len(),
                });
            }
        }

        Some(Self {
            content: content.to_string(),
            fields,
            body,
        })
    }

    fn field(&self, field: Field) -> Option<&FieldValue> {
        let index = Field::ALL.iter().position(|f| *f == field)?;
        self.fields[index].as_ref()
    }

    /// Raw, trimmed text of a header field.
    #[must_use]
    pub fn raw(&self, field: Field) -> Option<&str> {
        self.field(field).map(|v| v.text.as_str())
    }

    fn parse_count(&self, field: Field) -> Result<u32> {
        let raw = self
            .raw(field)
            .ok_or_else(|| UcaiError::invalid_field(field.name(), "<missing>"))?;
        raw.parse::<u32>()
            .map_err(|_| UcaiError::invalid_field(field.name(), raw))
    }

    /// Current iteration number.
    pub fn iteration(&self) -> Result<u32> {
        self.parse_count(Field::Iteration)
    }

    /// Iteration cap; `0` means unlimited.
    pub fn max_iterations(&self) -> Result<u32> {
        self.parse_count(Field::MaxIterations)
    }

    /// Configured completion promise, if any.
    ///
    /// Quoted values are decoded as JSON strings when possible, otherwise a
    /// single layer of surrounding double quotes is stripped. Unquoted
    /// `null`/`none` and values that are blank after decoding mean no promise.
    #[must_use]
    pub fn completion_promise(&self) -> Option<String> {
        let raw = self.raw(Field::CompletionPromise)?;
        if NO_PROMISE_SENTINELS.contains(&raw) {
            return None;
        }
        let value = unquote(raw);
        if normalize(&value).is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Informational activity flag.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.raw(Field::Active) == Some("true")
    }

    /// Creation timestamp, when present and well formed.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let raw = unquote(self.raw(Field::StartedAt)?);
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Task body with surrounding whitespace removed.
    #[must_use]
    pub fn task(&self) -> &str {
        self.content[self.body.clone()].trim()
    }

    /// Render this document with only the iteration value replaced.
    ///
    /// Returns `None` when the header has no iteration field.
    #[must_use]
    pub fn with_iteration(&self, iteration: u32) -> Option<String> {
        let span = &self.field(Field::Iteration)?.span;
        let mut out = String::with_capacity(self.content.len() + 4);
        out.push_str(&self.content[..span.start]);
        out.push_str(&iteration.to_string());
        out.push_str(&self.content[span.end..]);
        Some(out)
    }
}

/// Settings for a brand-new loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoop {
    pub task: String,
    pub max_iterations: u32,
    pub completion_promise: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl NewLoop {
    /// Render the initial record document (iteration 1).
    #[must_use]
    pub fn render(&self) -> String {
        let promise = match &self.completion_promise {
            Some(p) => serde_json::Value::String(p.clone()).to_string(),
            None => "null".to_string(),
        };
        format!(
            "{DELIMITER}\nactive: true\niteration: 1\nmax_iterations: {}\ncompletion_promise: {}\nstarted_at: \"{}\"\n{DELIMITER}\n\n{}\n",
            self.max_iterations,
            promise,
            self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.task,
        )
    }
}

/// Display form of an iteration cap.
#[must_use]
pub fn max_display(max_iterations: u32) -> String {
    if max_iterations == 0 {
        "unlimited".to_string()
    } else {
        max_iterations.to_string()
    }
}

/// Locate the header and body byte ranges.
fn split_sections(content: &str) -> Option<(Range<usize>, Range<usize>)> {
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if !is_delimiter_line(first) {
        return None;
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if is_delimiter_line(line) {
            let body_start = offset + line.len();
            // The header ends with the newline preceding the closing delimiter.
            let header_end = offset.saturating_sub(1).max(header_start);
            return Some((header_start..header_end, body_start..content.len()));
        }
        offset += line.len();
    }
    None
}

fn is_delimiter_line(line: &str) -> bool {
    line.ends_with('\n') && line.trim_end_matches(|c| c == '\n' || c == '\r') == DELIMITER
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw[1..raw.len() - 1].to_string())
    } else {
        raw.to_string()
    }
}
