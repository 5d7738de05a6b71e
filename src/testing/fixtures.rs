//! Test fixtures for creating reproducible test environments.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::ProjectConfig;
use crate::state::StateStore;

/// A test fixture representing a temporary project directory.
///
/// Automatically cleans up when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::empty_project();
/// fixture.write_record("1", "5", "null", "Fix bug");
/// assert!(fixture.store().load().is_some());
/// ```
pub struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    /// Create a project directory with nothing in it.
    ///
    /// # Panics
    ///
    /// Panics if temporary directory creation fails.
    #[must_use]
    pub fn empty_project() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self { temp_dir }
    }

    /// Get the path to the fixture directory.
    #[must_use]
    pub fn project_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Store for the default record location in this project.
    #[must_use]
    pub fn store(&self) -> StateStore {
        StateStore::for_project(&ProjectConfig::default(), self.project_dir())
    }

    /// Write a loop record from raw header values.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_record(&self, iteration: &str, max_iterations: &str, promise: &str, task: &str) {
        let content = format!(
            "---\nactive: true\niteration: {iteration}\nmax_iterations: {max_iterations}\n\
             completion_promise: {promise}\nstarted_at: \"2026-01-01T00:00:00.000Z\"\n---\n\n{task}\n"
        );
        self.write_raw_record(&content);
    }

    /// Write arbitrary content at the record path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_raw_record(&self, content: &str) {
        self.store().save(content).expect("Failed to write loop record");
    }

    /// Write a JSONL transcript with one user + assistant exchange per text.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn write_transcript(&self, assistant_texts: &[&str]) -> PathBuf {
        let mut lines = Vec::new();
        for text in assistant_texts {
            lines.push(
                serde_json::json!({
                    "type": "user",
                    "message": {"role": "user", "content": "continue"}
                })
                .to_string(),
            );
            lines.push(
                serde_json::json!({
                    "type": "assistant",
                    "message": {
                        "role": "assistant",
                        "content": [{"type": "text", "text": text}]
                    }
                })
                .to_string(),
            );
        }
        let path = self.project_dir().join("transcript.jsonl");
        std::fs::write(&path, lines.join("\n") + "\n").expect("Failed to write transcript");
        path
    }

    /// A Stop event payload referencing `transcript`.
    #[must_use]
    pub fn stop_event(transcript: &Path) -> String {
        serde_json::json!({
            "session_id": "test-session",
            "transcript_path": transcript,
            "hook_event_name": "Stop",
            "stop_hook_active": false
        })
        .to_string()
    }
}
