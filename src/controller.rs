//! Loop controller: the turn-boundary state machine.
//!
//! Invoked once per Stop event. Each invocation loads the loop record,
//! decides whether the loop is over, and either cleans up or blocks the
//! assistant from stopping and feeds the task back in.
//!
//! ```text
//!            load()
//!              │
//!     absent ──┼──────────────────────────────► NoLoop      (no output)
//!              │
//!   bad count ─┼──────────────────────────────► Corrupted   (delete)
//!              │
//! iter >= cap ─┼──────────────────────────────► MaxReached  (delete)
//!              │
//!  promise met ┼──────────────────────────────► Completed   (delete)
//!              │
//!              └─ iteration += 1, update() ───► Active      (block + re-inject)
//! ```
//!
//! Every failure resolves to one of these outcomes; nothing escapes to the
//! host as an error.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::UcaiError;
use crate::hooks::{HookInput, HookOutput};
use crate::promise::{extract_latest_promise, promise_matches};
use crate::state::{max_display, LoopRecord, StateStore};

/// Prefix for every controller diagnostic.
const DIAGNOSTIC_PREFIX: &str = "Ucai iterate";

/// Coarse state reached by one controller invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No record present
    NoLoop,
    /// Loop continues
    Active,
    /// Iteration cap reached
    MaxReached,
    /// Completion promise matched
    Completed,
    /// Record or event could not be trusted
    Corrupted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::NoLoop => write!(f, "no-loop"),
            LoopState::Active => write!(f, "active"),
            LoopState::MaxReached => write!(f, "max-reached"),
            LoopState::Completed => write!(f, "completed"),
            LoopState::Corrupted => write!(f, "corrupted"),
        }
    }
}

/// Why a loop was aborted without continuing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A numeric header field did not parse
    InvalidField { field: String, raw: String },
    /// Nothing to re-inject
    EmptyTask,
    /// The Stop event payload was not valid JSON
    InvalidEvent,
    /// The iteration counter could not be written
    UpdateFailed(String),
}

impl From<UcaiError> for AbortReason {
    fn from(err: UcaiError) -> Self {
        match err {
            UcaiError::InvalidField { field, raw } => AbortReason::InvalidField { field, raw },
            other => AbortReason::UpdateFailed(other.to_string()),
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::InvalidField { field, raw } => {
                write!(f, "State file corrupted ({field}: '{raw}')")
            }
            AbortReason::EmptyTask => write!(f, "No task prompt found in state file"),
            AbortReason::InvalidEvent => write!(f, "Failed to parse hook input"),
            AbortReason::UpdateFailed(e) => write!(f, "Failed to update state file: {e}"),
        }
    }
}

/// Result of one controller invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    NoLoop,
    Corrupted(AbortReason),
    MaxReached {
        max_iterations: u32,
    },
    Completed {
        promise: String,
    },
    Continue {
        iteration: u32,
        max_iterations: u32,
        task: String,
        completion_promise: Option<String>,
    },
}

impl LoopOutcome {
    /// The state this outcome corresponds to.
    #[must_use]
    pub fn state(&self) -> LoopState {
        match self {
            LoopOutcome::NoLoop => LoopState::NoLoop,
            LoopOutcome::Corrupted(_) => LoopState::Corrupted,
            LoopOutcome::MaxReached { .. } => LoopState::MaxReached,
            LoopOutcome::Completed { .. } => LoopState::Completed,
            LoopOutcome::Continue { .. } => LoopState::Active,
        }
    }

    /// Message for the error stream, if this outcome ends a loop.
    #[must_use]
    pub fn diagnostic(&self) -> Option<String> {
        let message = match self {
            LoopOutcome::NoLoop | LoopOutcome::Continue { .. } => return None,
            LoopOutcome::Corrupted(reason) => reason.to_string(),
            LoopOutcome::MaxReached { max_iterations } => {
                format!("Max iterations ({max_iterations}) reached.")
            }
            LoopOutcome::Completed { promise } => {
                format!("Completion promise met - <promise>{promise}</promise>")
            }
        };
        Some(format!("{DIAGNOSTIC_PREFIX}: {message}"))
    }

    /// Decision payload for the host, present only when the loop continues.
    #[must_use]
    pub fn hook_output(&self) -> Option<HookOutput> {
        let LoopOutcome::Continue {
            iteration,
            max_iterations,
            task,
            completion_promise,
        } = self
        else {
            return None;
        };

        let status = match completion_promise {
            Some(promise) => format!(
                "Ucai iteration {}/{} | To complete: output <promise>{}</promise> (ONLY when TRUE)",
                iteration,
                max_display(*max_iterations),
                promise
            ),
            None => format!(
                "Ucai iteration {} | Max: {}",
                iteration,
                max_display(*max_iterations)
            ),
        };
        Some(HookOutput::block(task.clone(), status))
    }
}

/// Drives the loop record across turn boundaries.
#[derive(Debug, Clone)]
pub struct LoopController {
    store: StateStore,
}

impl LoopController {
    #[must_use]
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Handle a Stop event whose raw JSON payload is `event`.
    #[must_use]
    pub fn on_stop(&self, event: &str) -> LoopOutcome {
        let Some(record) = self.store.load() else {
            debug!("no active loop");
            return LoopOutcome::NoLoop;
        };

        let outcome = self.decide(&record, event);
        match &outcome {
            LoopOutcome::Continue { iteration, .. } => {
                debug!(iteration, "loop continues");
            }
            LoopOutcome::NoLoop => {}
            terminal => {
                info!(state = %terminal.state(), "loop finished");
                if let Err(e) = self.store.delete() {
                    warn!("Failed to delete loop record {}: {}", self.store.path().display(), e);
                }
            }
        }
        outcome
    }

    fn decide(&self, record: &LoopRecord, event: &str) -> LoopOutcome {
        let iteration = match record.iteration() {
            Ok(n) => n,
            Err(e) => return LoopOutcome::Corrupted(e.into()),
        };
        let max_iterations = match record.max_iterations() {
            Ok(n) => n,
            Err(e) => return LoopOutcome::Corrupted(e.into()),
        };

        // The cap is checked before the promise, even when both apply this turn.
        if max_iterations > 0 && iteration >= max_iterations {
            return LoopOutcome::MaxReached { max_iterations };
        }

        let input = match HookInput::parse(event) {
            Ok(input) => input,
            Err(e) => {
                debug!("invalid stop event: {}", e);
                return LoopOutcome::Corrupted(AbortReason::InvalidEvent);
            }
        };

        let completion_promise = record.completion_promise();
        if let (Some(configured), Some(transcript)) = (&completion_promise, &input.transcript_path)
        {
            if transcript.exists() {
                if let Some(found) = extract_latest_promise(transcript) {
                    if promise_matches(&found, configured) {
                        return LoopOutcome::Completed { promise: found };
                    }
                    debug!(found = %found, "promise tag present but does not match");
                }
            }
        }

        let task = record.task();
        if task.is_empty() {
            return LoopOutcome::Corrupted(AbortReason::EmptyTask);
        }

        let next = iteration.saturating_add(1);
        match self.store.update_iteration(next) {
            Ok(true) => LoopOutcome::Continue {
                iteration: next,
                max_iterations,
                task: task.to_string(),
                completion_promise,
            },
            // Record removed mid-turn: the loop was cancelled, nothing to do.
            Ok(false) => LoopOutcome::NoLoop,
            Err(e) => LoopOutcome::Corrupted(AbortReason::UpdateFailed(e.to_string())),
        }
    }
}
