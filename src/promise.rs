//! Completion promise matching.
//!
//! The assistant signals that a looped task is genuinely done by wrapping the
//! configured phrase in a tag, e.g. `<promise>All tests pass</promise>`. Only
//! the most recent assistant turn counts, and the comparison is exact once
//! whitespace has been normalized on both sides.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::transcript::latest_assistant_turn;

static PROMISE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<promise>(.*?)</promise>").expect("promise tag pattern is valid")
});

/// Trim and collapse every internal whitespace run to a single space.
///
/// # Example
///
/// ```
/// use ucai::promise::normalize;
///
/// assert_eq!(normalize("  All   done \n"), "All done");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the first `<promise>...</promise>` span from text, normalized.
#[must_use]
pub fn extract_promise(text: &str) -> Option<String> {
    PROMISE_TAG
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize(m.as_str()))
}

/// Extract the promise from the latest assistant turn of a transcript file.
///
/// Any read or parse failure is reported as `None`.
#[must_use]
pub fn extract_latest_promise(transcript_path: &Path) -> Option<String> {
    let turn = latest_assistant_turn(transcript_path)?;
    extract_promise(&turn.text())
}

/// Whether an extracted promise fulfils the configured one.
#[must_use]
pub fn promise_matches(extracted: &str, configured: &str) -> bool {
    normalize(extracted) == normalize(configured)
}
