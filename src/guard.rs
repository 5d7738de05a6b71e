//! PreToolUse guard for the plugin's own configuration files.
//!
//! Write/Edit calls whose target resolves to a protected path under the
//! plugin root are refused; the stderr message is shown to the assistant.
//! Anything the guard cannot interpret is allowed.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::hooks::{HookContext, HookInput, HookResult};

/// Check a PreToolUse payload against the protected file list.
pub fn check(ctx: &HookContext, input: &str) -> HookResult {
    let Ok(input) = HookInput::parse(input) else {
        return HookResult::default();
    };
    let Some(file_path) = input.tool_file_path() else {
        return HookResult::default();
    };

    let base = input.cwd.as_deref().unwrap_or(&ctx.project_dir);
    let Some(relative) = relative_to_root(Path::new(file_path), base, &ctx.plugin_root) else {
        return HookResult::default();
    };

    if is_protected(&relative, &ctx.config.protected_files) {
        debug!(path = %relative, "blocked edit of protected file");
        return HookResult {
            blocked: true,
            message: Some(format!(
                "BLOCKED: {relative} is a protected ucai config file. \
                 Ask the user for permission before modifying it."
            )),
            output: None,
        };
    }

    HookResult::default()
}

/// Whether a root-relative, `/`-separated path is in the protected list.
#[must_use]
pub fn is_protected(relative: &str, protected: &[String]) -> bool {
    if cfg!(windows) {
        protected.iter().any(|p| p.eq_ignore_ascii_case(relative))
    } else {
        protected.iter().any(|p| p == relative)
    }
}

/// Resolve `path` against `base` and express it relative to `root`.
///
/// Returns `None` when the path lies outside the root.
fn relative_to_root(path: &Path, base: &Path, root: &Path) -> Option<String> {
    let absolute = normalize(&base.join(path));
    let root = normalize(root);
    let relative = absolute.strip_prefix(&root).ok()?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
