//! Configuration management for Ucai.
//!
//! Everything has a sensible default; a project may override any field in
//! `.claude/ucai.json`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, UcaiError};

/// Default location of the loop record, relative to the project directory
pub const DEFAULT_STATE_FILE: &str = ".claude/ucai-iterate.local.md";

/// Plugin files that tool calls must never edit without the user's consent
pub const PROTECTED_FILES: &[&str] = &["plugin.json", "marketplace.json", "hooks/hooks.json"];

/// Project configuration loaded from .claude/ucai.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Loop record path, relative to the project directory
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Paths (relative to the plugin root) that the guard refuses to edit
    #[serde(default = "default_protected_files")]
    pub protected_files: Vec<String>,

    /// Characters of task body shown in the pre-compaction summary
    #[serde(default = "default_task_preview_chars")]
    pub task_preview_chars: usize,

    /// Characters of a subagent's final message surfaced to the main session
    #[serde(default = "default_subagent_preview_chars")]
    pub subagent_preview_chars: usize,
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_protected_files() -> Vec<String> {
    PROTECTED_FILES.iter().map(|s| (*s).to_string()).collect()
}

fn default_task_preview_chars() -> usize {
    200
}

fn default_subagent_preview_chars() -> usize {
    150
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            protected_files: default_protected_files(),
            task_preview_chars: default_task_preview_chars(),
            subagent_preview_chars: default_subagent_preview_chars(),
        }
    }
}

impl ProjectConfig {
    /// Load configuration from a project directory
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = Self::config_path(project_dir);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        serde_json::from_str(&content)
            .map_err(|e| UcaiError::config_with_path(e.to_string(), config_path))
    }

    /// Get the ucai.json path for a project
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(".claude/ucai.json")
    }

    /// Get the CLAUDE.md path for a project
    pub fn claude_md_path(project_dir: &Path) -> PathBuf {
        project_dir.join("CLAUDE.md")
    }

    /// Resolve the loop record path against a project directory
    pub fn state_path(&self, project_dir: &Path) -> PathBuf {
        if self.state_file.is_absolute() {
            self.state_file.clone()
        } else {
            project_dir.join(&self.state_file)
        }
    }
}
