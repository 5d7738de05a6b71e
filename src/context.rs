//! Read-only loop status for the session-start, pre-compact and
//! prompt-submit hooks.
//!
//! These handlers never write the loop record. They show raw header values
//! as found, so a half-broken record is still visible to the user until the
//! loop controller cleans it up.

use std::path::Path;
use std::process::Command;

use crate::config::ProjectConfig;
use crate::hooks::HookOutput;
use crate::state::{max_display, Field, LoopRecord, StateStore};

const BANNER: &str = "Ucai plugin is active. Use /init to analyze this project, /build for feature \
                      development, /iterate for autonomous iteration, or /review for code review.";

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
#[must_use]
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// `N/M` progress string built from the raw header values.
#[must_use]
pub fn progress(record: &LoopRecord) -> String {
    let iteration = record.raw(Field::Iteration).unwrap_or("?");
    let max = match record.max_iterations() {
        Ok(n) => max_display(n),
        Err(_) => record
            .raw(Field::MaxIterations)
            .filter(|raw| !raw.is_empty())
            .unwrap_or("unlimited")
            .to_string(),
    };
    format!("{iteration}/{max}")
}

/// Current git branch of the project, if it is a repository.
fn git_branch(project_dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(project_dir)
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty()).then_some(branch)
}

/// Session-start banner.
#[must_use]
pub fn session_start(store: &StateStore, project_dir: &Path) -> HookOutput {
    let mut parts = vec![BANNER.to_string()];

    if let Some(branch) = git_branch(project_dir) {
        parts.push(format!("Git branch: {branch}"));
    }

    if let Some(record) = store.load() {
        parts.push(format!("Iterate loop active: iteration {}", progress(&record)));
    }

    if !ProjectConfig::claude_md_path(project_dir).exists() {
        parts.push("No CLAUDE.md found. Run /init to generate project guidelines.".to_string());
    }

    HookOutput::additional_context("SessionStart", parts.join(" | "))
}

/// Loop summary shown before the context window is compacted.
#[must_use]
pub fn pre_compact(store: &StateStore, config: &ProjectConfig) -> Option<HookOutput> {
    let record = store.load()?;

    let mut msg = format!("Ucai iterate loop is active (iteration {})", progress(&record));
    if let Some(promise) = record.completion_promise() {
        msg.push_str(&format!(" | Completion promise: <promise>{promise}</promise>"));
    }
    msg.push_str(&format!(
        " - state preserved in {}",
        config.state_file.display()
    ));
    let task = record.task();
    if !task.is_empty() {
        msg.push_str(&format!(
            " | Task: {}",
            truncate(task, config.task_preview_chars)
        ));
    }

    Some(HookOutput::system_message(msg))
}

/// Reminder attached to each new user prompt while a loop runs.
#[must_use]
pub fn prompt_reminder(store: &StateStore) -> Option<HookOutput> {
    let record = store.load()?;

    let mut msg = format!("Ucai iterate loop active (iteration {})", progress(&record));
    if let Some(promise) = record.completion_promise() {
        msg.push_str(&format!(
            " - complete by outputting <promise>{promise}</promise>"
        ));
    }

    Some(HookOutput::additional_context("UserPromptSubmit", msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestFixture;

    fn context_of(output: &HookOutput) -> &str {
        &output
            .hook_specific_output
            .as_ref()
            .expect("hook specific output")
            .additional_context
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("abcdefghijk", 10), "abcdefghij...");
        assert_eq!(truncate("ééé", 2), "éé...");
    }

    #[test]
    fn test_progress_uses_raw_values() {
        let record = LoopRecord::parse("---\niteration: 3\nmax_iterations: 0\n---\n\nT\n").unwrap();
        assert_eq!(progress(&record), "3/unlimited");

        let record = LoopRecord::parse("---\niteration: x\nmax_iterations: y\n---\n\nT\n").unwrap();
        assert_eq!(progress(&record), "x/y");

        let record = LoopRecord::parse("---\n---\n\nT\n").unwrap();
        assert_eq!(progress(&record), "?/unlimited");
    }

    #[test]
    fn test_session_start_without_loop_or_claude_md() {
        let fixture = TestFixture::empty_project();
        let output = session_start(&fixture.store(), fixture.project_dir());
        let context = context_of(&output);

        assert!(context.starts_with("Ucai plugin is active."));
        assert!(!context.contains("Iterate loop active"));
        assert!(context.contains("No CLAUDE.md found"));
        assert_eq!(
            output.hook_specific_output.as_ref().unwrap().hook_event_name,
            "SessionStart"
        );
    }

    #[test]
    fn test_session_start_with_loop_and_claude_md() {
        let fixture = TestFixture::empty_project();
        fixture.write_record("4", "10", "null", "Task");
        std::fs::write(fixture.project_dir().join("CLAUDE.md"), "# Guidelines").unwrap();

        let output = session_start(&fixture.store(), fixture.project_dir());
        let context = context_of(&output);
        assert!(context.contains(" | Iterate loop active: iteration 4/10"));
        assert!(!context.contains("No CLAUDE.md found"));
    }

    #[test]
    fn test_pre_compact_without_loop() {
        let fixture = TestFixture::empty_project();
        assert!(pre_compact(&fixture.store(), &ProjectConfig::default()).is_none());
    }

    #[test]
    fn test_pre_compact_summarizes_loop() {
        let fixture = TestFixture::empty_project();
        let task = "t".repeat(250);
        fixture.write_record("2", "0", "\"Tests pass\"", &task);

        let output = pre_compact(&fixture.store(), &ProjectConfig::default()).unwrap();
        let msg = output.system_message.unwrap();
        assert!(msg.starts_with("Ucai iterate loop is active (iteration 2/unlimited)"));
        assert!(msg.contains("Completion promise: <promise>Tests pass</promise>"));
        assert!(msg.contains("state preserved in .claude/ucai-iterate.local.md"));
        assert!(msg.ends_with(&format!("Task: {}...", "t".repeat(200))));
    }

    #[test]
    fn test_pre_compact_never_writes() {
        let fixture = TestFixture::empty_project();
        fixture.write_record("2", "3", "null", "Task");
        let before = std::fs::read_to_string(fixture.store().path()).unwrap();

        let _ = pre_compact(&fixture.store(), &ProjectConfig::default());
        let _ = prompt_reminder(&fixture.store());
        let _ = session_start(&fixture.store(), fixture.project_dir());

        let after = std::fs::read_to_string(fixture.store().path()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_prompt_reminder() {
        let fixture = TestFixture::empty_project();
        assert!(prompt_reminder(&fixture.store()).is_none());

        fixture.write_record("3", "5", "\"All done\"", "Task");
        let output = prompt_reminder(&fixture.store()).unwrap();
        assert_eq!(
            context_of(&output),
            "Ucai iterate loop active (iteration 3/5) - complete by outputting <promise>All done</promise>"
        );

        fixture.write_record("3", "5", "null", "Task");
        let output = prompt_reminder(&fixture.store()).unwrap();
        assert_eq!(context_of(&output), "Ucai iterate loop active (iteration 3/5)");
    }
}
