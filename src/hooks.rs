//! Hook framework for Claude Code lifecycle events.
//!
//! The host runs `ucai hook <type>` for each registered event, passes the
//! event payload as JSON on stdin, and reads at most one JSON object back
//! from stdout. Diagnostics go to stderr. Exit code 2 blocks the pending
//! operation (only the guard uses it).
//!
//! Every handler fails open: a hook must never break the host's turn, so
//! errors are logged and mapped to an empty result.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProjectConfig;
use crate::context;
use crate::controller::LoopController;
use crate::error::Result;
use crate::guard;
use crate::state::StateStore;

/// Types of hooks that can be run
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum HookType {
    /// Turn boundary - drives the iteration loop
    Stop,
    /// Session initialization - status banner
    SessionStart,
    /// Before context compaction - loop summary
    PreCompact,
    /// New user prompt - loop reminder
    UserPromptSubmit,
    /// Session teardown - clears the loop record
    SessionEnd,
    /// Subagent finished - rejects empty results
    SubagentStop,
    /// Pre tool use - protects plugin config files
    PreToolUse,
}

/// Event payload delivered on stdin. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HookInput {
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub stop_hook_active: bool,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub last_assistant_message: Option<String>,
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
}

impl HookInput {
    /// Parse an event payload.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// `tool_input.file_path`, when present.
    #[must_use]
    pub fn tool_file_path(&self) -> Option<&str> {
        self.tool_input
            .as_ref()?
            .get("file_path")?
            .as_str()
            .filter(|p| !p.is_empty())
    }
}

/// Decision values understood by the host.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Block,
}

/// Event-specific output block.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub additional_context: String,
}

/// JSON object written to stdout.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

impl HookOutput {
    /// Block the pending stop and feed `reason` back to the assistant.
    #[must_use]
    pub fn block(reason: impl Into<String>, system_message: impl Into<String>) -> Self {
        Self {
            decision: Some(Decision::Block),
            reason: Some(reason.into()),
            system_message: Some(system_message.into()),
            ..Default::default()
        }
    }

    /// A user-visible system message only.
    #[must_use]
    pub fn system_message(message: impl Into<String>) -> Self {
        Self {
            system_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Extra context injected for the given event.
    #[must_use]
    pub fn additional_context(event: &str, context: impl Into<String>) -> Self {
        Self {
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: event.to_string(),
                additional_context: context.into(),
            }),
            ..Default::default()
        }
    }
}

/// Environment a hook runs in.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub project_dir: PathBuf,
    pub plugin_root: PathBuf,
    pub config: ProjectConfig,
}

impl HookContext {
    #[must_use]
    pub fn new(project_dir: impl AsRef<Path>, config: ProjectConfig) -> Self {
        let project_dir = project_dir.as_ref().to_path_buf();
        Self {
            plugin_root: project_dir.clone(),
            project_dir,
            config,
        }
    }

    #[must_use]
    pub fn with_plugin_root(mut self, plugin_root: impl AsRef<Path>) -> Self {
        self.plugin_root = plugin_root.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn store(&self) -> StateStore {
        StateStore::for_project(&self.config, &self.project_dir)
    }
}

/// Result of running a hook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookResult {
    /// Operation must be refused (exit code 2)
    pub blocked: bool,
    /// Stderr text
    pub message: Option<String>,
    /// Stdout JSON
    pub output: Option<HookOutput>,
}

impl HookResult {
    #[must_use]
    pub fn output(output: HookOutput) -> Self {
        Self {
            output: Some(output),
            ..Default::default()
        }
    }

    /// Process exit code for the host.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.blocked {
            2
        } else {
            0
        }
    }
}

/// Run a hook with the given raw stdin payload
pub fn run_hook(hook_type: HookType, ctx: &HookContext, input: &str) -> HookResult {
    debug!(?hook_type, bytes = input.len(), "running hook");
    match hook_type {
        HookType::Stop => stop(ctx, input),
        HookType::SessionStart => {
            HookResult::output(context::session_start(&ctx.store(), &ctx.project_dir))
        }
        HookType::PreCompact => context::pre_compact(&ctx.store(), &ctx.config)
            .map(HookResult::output)
            .unwrap_or_default(),
        HookType::UserPromptSubmit => context::prompt_reminder(&ctx.store())
            .map(HookResult::output)
            .unwrap_or_default(),
        HookType::SessionEnd => session_end(ctx),
        HookType::SubagentStop => subagent_stop(ctx, input),
        HookType::PreToolUse => guard::check(ctx, input),
    }
}

fn stop(ctx: &HookContext, input: &str) -> HookResult {
    let outcome = LoopController::new(ctx.store()).on_stop(input);
    HookResult {
        blocked: false,
        message: outcome.diagnostic(),
        output: outcome.hook_output(),
    }
}

fn session_end(ctx: &HookContext) -> HookResult {
    match ctx.store().delete() {
        Ok(true) => HookResult {
            message: Some("Ucai: iterate state cleared on session end".to_string()),
            ..Default::default()
        },
        Ok(false) => HookResult::default(),
        Err(e) => {
            debug!("session end cleanup failed: {}", e);
            HookResult::default()
        }
    }
}

fn subagent_stop(ctx: &HookContext, input: &str) -> HookResult {
    let Ok(input) = HookInput::parse(input) else {
        return HookResult::default();
    };
    if input.stop_hook_active {
        return HookResult::default();
    }

    let message = input.last_assistant_message.as_deref().unwrap_or("").trim();
    if message.is_empty() {
        return HookResult::output(HookOutput {
            decision: Some(Decision::Block),
            reason: Some(
                "Produce a substantive response before completing. Summarize what you found, \
                 what you did, or why the task cannot be completed."
                    .to_string(),
            ),
            ..Default::default()
        });
    }

    let agent_type = input.agent_type.as_deref().unwrap_or("Unknown");
    let flattened = message.replace("\r\n", " ").replace('\n', " ");
    let preview = context::truncate(&flattened, ctx.config.subagent_preview_chars);
    HookResult::output(HookOutput::system_message(format!(
        "Subagent {agent_type}: {preview}"
    )))
}
