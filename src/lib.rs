//! Ucai - bounded, resumable iteration loops for Claude Code
//!
//! A user starts a loop with a task, an optional iteration cap and an
//! optional completion promise. After every assistant turn the Stop hook
//! decides whether to end the loop or to block the stop and feed the task
//! back in. Loop state lives in a single markdown record on disk, so it
//! survives process restarts and context compaction.
//!
//! # Architecture
//!
//! - [`state`] - Loop record schema and its file store
//! - [`transcript`] - Typed, backwards-scanned view of the conversation transcript
//! - [`promise`] - Completion promise extraction and matching
//! - [`controller`] - Turn-boundary state machine
//! - [`setup`] - Creating a new loop from `/iterate` arguments
//! - [`context`] - Read-only status for session start, compaction and prompts
//! - [`guard`] - Protection for the plugin's own config files
//! - [`hooks`] - Event payloads and hook dispatch
//! - [`config`] - Project configuration
//! - [`error`] - Custom error types
//!
//! # Example
//!
//! ```rust,ignore
//! use ucai::{LoopController, ProjectConfig, StateStore};
//!
//! let config = ProjectConfig::load(".")?;
//! let store = StateStore::for_project(&config, Path::new("."));
//! let outcome = LoopController::new(store).on_stop(&stdin_payload);
//! if let Some(output) = outcome.hook_output() {
//!     println!("{}", serde_json::to_string(&output)?);
//! }
//! ```

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod promise;
pub mod setup;
pub mod state;
pub mod transcript;

#[cfg(test)]
pub mod testing;

// Re-export commonly used types
pub use error::{Result, UcaiError};

pub use config::ProjectConfig;
pub use controller::{AbortReason, LoopController, LoopOutcome, LoopState};
pub use hooks::{run_hook, HookContext, HookInput, HookOutput, HookResult, HookType};
pub use setup::{SetupCommand, SetupRequest};
pub use state::{LoopRecord, StateStore};
