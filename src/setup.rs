//! Loop setup: turns `/iterate` arguments into a fresh loop record.
//!
//! The slash command hands its arguments over either as separate argv words
//! or as one raw string on stdin. The raw form is split with
//! [`tokenize`], which honours quotes the way a user typing
//! `--completion-promise 'All tests pass'` expects. Either way the words go
//! through [`parse_args`]: the two options and `-h`/`--help` are recognised
//! anywhere, every other word (dash-prefixed or not) is task text.

use chrono::Utc;
use tracing::info;

use crate::error::{Result, UcaiError};
use crate::state::{max_display, NewLoop, StateStore};

/// Split a raw argument string into words, respecting single and double quotes.
///
/// Quote mode only starts at a token boundary, so an apostrophe inside a
/// word (`user's`) stays literal.
///
/// # Example
///
/// ```
/// use ucai::setup::tokenize;
///
/// assert_eq!(
///     tokenize("Fix user's bug --completion-promise 'All done'"),
///     vec!["Fix", "user's", "bug", "--completion-promise", "All done"]
/// );
/// ```
#[must_use]
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for ch in input.chars() {
        let at_boundary = current.is_empty();

        if ch == '\'' && !in_double && (at_boundary || in_single) {
            in_single = !in_single;
        } else if ch == '"' && !in_single && (at_boundary || in_double) {
            in_double = !in_double;
        } else if ch.is_whitespace() && !in_single && !in_double {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Help text for `/iterate`.
pub const USAGE: &str = "\
Ucai Iterate - Controlled autonomous iteration

USAGE:
  /iterate [TASK...] [OPTIONS]

ARGUMENTS:
  TASK...    Description of what to accomplish (can be multiple words)

OPTIONS:
  --max-iterations <n>           Maximum iterations before auto-stop (default: unlimited)
  --completion-promise '<text>'  Promise phrase that signals genuine completion
  -h, --help                     Show this help message

EXAMPLES:
  /iterate Build a REST API --completion-promise 'All endpoints working' --max-iterations 15
  /iterate Fix the authentication bug --max-iterations 5

STOPPING:
  - Reaches --max-iterations
  - You output <promise>YOUR_PHRASE</promise> when genuinely true
  - Use /cancel-iterate to stop manually";

/// What a set of `/iterate` arguments asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupCommand {
    Help,
    Start(SetupRequest),
}

/// Parse `/iterate` argument words.
///
/// # Example
///
/// ```
/// use ucai::setup::{parse_args, SetupCommand};
///
/// let words = ["Add", "a", "--dry-run", "flag", "--max-iterations", "3"];
/// let SetupCommand::Start(request) = parse_args(&words).unwrap() else {
///     unreachable!()
/// };
/// assert_eq!(request.task, "Add a --dry-run flag");
/// assert_eq!(request.max_iterations, 3);
/// ```
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<SetupCommand> {
    let mut max_iterations = 0;
    let mut completion_promise = None;
    let mut task_words = Vec::new();

    let mut iter = args.iter().map(|a| AsRef::<str>::as_ref(a));
    while let Some(arg) = iter.next() {
        match arg {
            "-h" | "--help" => return Ok(SetupCommand::Help),
            "--max-iterations" => {
                max_iterations = iter
                    .next()
                    .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|v| v.parse::<u32>().ok())
                    .ok_or_else(|| {
                        UcaiError::invalid_argument(
                            "--max-iterations requires a non-negative integer",
                        )
                    })?;
            }
            "--completion-promise" => {
                let value = iter.next().filter(|v| !v.is_empty()).ok_or_else(|| {
                    UcaiError::invalid_argument("--completion-promise requires a text argument")
                })?;
                completion_promise = Some(value.to_string());
            }
            word => task_words.push(word.to_string()),
        }
    }

    SetupRequest::new(&task_words, max_iterations, completion_promise).map(SetupCommand::Start)
}

/// A validated request to start a loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    pub task: String,
    pub max_iterations: u32,
    pub completion_promise: Option<String>,
}

impl SetupRequest {
    /// Build a request from task words and options.
    ///
    /// Task words are joined with single spaces; an empty task is rejected.
    pub fn new(
        task_words: &[String],
        max_iterations: u32,
        completion_promise: Option<String>,
    ) -> Result<Self> {
        let task = task_words.join(" ").trim().to_string();
        if task.is_empty() {
            return Err(UcaiError::MissingTask);
        }
        let completion_promise = completion_promise.filter(|p| !p.trim().is_empty());
        Ok(Self {
            task,
            max_iterations,
            completion_promise,
        })
    }

    /// Persist a new loop record, replacing any existing loop.
    pub fn start(&self, store: &StateStore) -> Result<NewLoop> {
        let new_loop = NewLoop {
            task: self.task.clone(),
            max_iterations: self.max_iterations,
            completion_promise: self.completion_promise.clone(),
            started_at: Utc::now(),
        };
        if store.exists() {
            info!("replacing existing loop record at {}", store.path().display());
        }
        store.save(&new_loop.render())?;
        Ok(new_loop)
    }

    /// Confirmation text printed after setup.
    #[must_use]
    pub fn summary(&self) -> String {
        let promise_display = self
            .completion_promise
            .as_deref()
            .unwrap_or("none (use --max-iterations to limit)");

        let mut out = format!(
            "Ucai iterate loop activated.\n\n\
             Task: {}\n\
             Iteration: 1\n\
             Max iterations: {}\n\
             Completion promise: {}\n\n\
             The Stop hook will feed this task back after each iteration.\n\
             Your previous work is visible in files and git history.",
            self.task,
            max_display(self.max_iterations),
            promise_display
        );

        if let Some(promise) = &self.completion_promise {
            out.push_str(&format!(
                "\n\nTo complete: output <promise>{promise}</promise>\n\
                 ONLY when the statement is genuinely true."
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_tokenize_plain_words() {
        assert_eq!(tokenize("  a  b\tc \n"), vec!["a", "b", "c"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"Build API --completion-promise "All endpoints working" --max-iterations 15"#),
            vec![
                "Build",
                "API",
                "--completion-promise",
                "All endpoints working",
                "--max-iterations",
                "15"
            ]
        );
        assert_eq!(tokenize(r#"'say "hi"' x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_tokenize_mid_word_apostrophe_is_literal() {
        assert_eq!(tokenize("don't stop"), vec!["don't", "stop"]);
        assert_eq!(tokenize("it's 'quoted words'"), vec!["it's", "quoted words"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote_keeps_text() {
        assert_eq!(tokenize("'open quote here"), vec!["open quote here"]);
    }

    fn start(args: &[&str]) -> SetupRequest {
        match parse_args(args).unwrap() {
            SetupCommand::Start(request) => request,
            SetupCommand::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_parse_args_options_anywhere() {
        let request = start(&[
            "--max-iterations",
            "15",
            "Build",
            "API",
            "--completion-promise",
            "All endpoints working",
        ]);
        assert_eq!(request.task, "Build API");
        assert_eq!(request.max_iterations, 15);
        assert_eq!(request.completion_promise.as_deref(), Some("All endpoints working"));
    }

    #[test]
    fn test_parse_args_keeps_dash_words_in_task() {
        assert_eq!(start(&["Handle", "-1", "as", "input"]).task, "Handle -1 as input");
        assert_eq!(start(&["Fix", "the", "-x", "option"]).task, "Fix the -x option");
        let request = start(&["Add", "a", "--dry-run", "flag", "--max-iterations", "3"]);
        assert_eq!(request.task, "Add a --dry-run flag");
        assert_eq!(request.max_iterations, 3);
    }

    #[test]
    fn test_parse_args_help() {
        assert_eq!(parse_args(&["Task", "-h"]).unwrap(), SetupCommand::Help);
        assert_eq!(parse_args(&["--help"]).unwrap(), SetupCommand::Help);
    }

    #[test]
    fn test_parse_args_rejects_bad_max_iterations() {
        for args in [
            &["Task", "--max-iterations"][..],
            &["Task", "--max-iterations", "-1"][..],
            &["Task", "--max-iterations", "abc"][..],
            &["Task", "--max-iterations", "+3"][..],
            &["Task", "--max-iterations", "99999999999"][..],
        ] {
            let err = parse_args(args).unwrap_err();
            assert!(matches!(err, UcaiError::InvalidArgument { .. }), "{args:?}");
            assert_eq!(err.exit_code(), 1);
        }
    }

    #[test]
    fn test_parse_args_rejects_missing_promise_text() {
        let err = parse_args(&["Task", "--completion-promise"]).unwrap_err();
        assert!(err.to_string().contains("--completion-promise requires a text argument"));
        assert!(parse_args(&["Task", "--completion-promise", ""]).is_err());
    }

    #[test]
    fn test_parse_args_without_task() {
        let err = parse_args(&["--max-iterations", "3"]).unwrap_err();
        assert!(matches!(err, UcaiError::MissingTask));
    }

    #[test]
    fn test_request_rejects_empty_task() {
        let err = SetupRequest::new(&[], 5, None).unwrap_err();
        assert!(matches!(err, UcaiError::MissingTask));
        let err = SetupRequest::new(&words("   "), 0, None).unwrap_err();
        assert!(matches!(err, UcaiError::MissingTask));
    }

    #[test]
    fn test_request_drops_blank_promise() {
        let request = SetupRequest::new(&words("Fix it"), 0, Some("  ".to_string())).unwrap();
        assert_eq!(request.completion_promise, None);
    }

    #[test]
    fn test_start_writes_fresh_record_and_supersedes_old_one() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().join(".claude/ucai-iterate.local.md"));

        let first = SetupRequest::new(&words("First task"), 3, None).unwrap();
        first.start(&store).unwrap();
        store.update_iteration(3).unwrap();

        let second =
            SetupRequest::new(&words("Second task"), 0, Some("Done now".to_string())).unwrap();
        second.start(&store).unwrap();

        let record = store.load().unwrap();
        assert_eq!(record.iteration().unwrap(), 1);
        assert_eq!(record.max_iterations().unwrap(), 0);
        assert_eq!(record.completion_promise().as_deref(), Some("Done now"));
        assert_eq!(record.task(), "Second task");
        assert!(record.started_at().is_some());
    }

    #[test]
    fn test_summary_with_promise() {
        let request =
            SetupRequest::new(&words("Fix the auth bug"), 5, Some("Auth works".to_string()))
                .unwrap();
        let summary = request.summary();
        assert!(summary.contains("Task: Fix the auth bug"));
        assert!(summary.contains("Max iterations: 5"));
        assert!(summary.contains("Completion promise: Auth works"));
        assert!(summary.contains("To complete: output <promise>Auth works</promise>"));
    }

    #[test]
    fn test_summary_without_promise() {
        let request = SetupRequest::new(&words("Refactor"), 0, None).unwrap();
        let summary = request.summary();
        assert!(summary.contains("Max iterations: unlimited"));
        assert!(summary.contains("Completion promise: none (use --max-iterations to limit)"));
        assert!(!summary.contains("To complete"));
    }
}
