//! File-backed storage for the loop record.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::LoopRecord;
use crate::config::ProjectConfig;
use crate::error::Result;

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Reads and writes the single loop record at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store for the record at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a store for a project using its configured record path.
    #[must_use]
    pub fn for_project(config: &ProjectConfig, project_dir: &Path) -> Self {
        Self::new(config.state_path(project_dir))
    }

    /// Returns the path to the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the temporary file used while writing.
    #[must_use]
    pub fn tmp_file_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(TMP_SUFFIX);
        self.path.with_file_name(name)
    }

    /// Checks if a record file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the record.
    ///
    /// A missing, unreadable, or malformed file all yield `None`; none of
    /// them is an error from the caller's point of view.
    #[must_use]
    pub fn load(&self) -> Option<LoopRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read loop record at {}: {}", self.path.display(), e);
                return None;
            }
        };

        let record = LoopRecord::parse(&content);
        if record.is_none() {
            debug!(path = %self.path.display(), "loop record has no header, treating as absent");
        }
        record
    }

    /// Writes a complete record document atomically, replacing any existing one.
    pub fn save(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_file_path();
        let mut tmp_file = fs::File::create(&tmp_path)?;
        tmp_file.write_all(content.as_bytes())?;
        tmp_file.sync_all()?;

        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), bytes = content.len(), "loop record written");
        Ok(())
    }

    /// Rewrites only the iteration counter of the current record.
    ///
    /// Returns `Ok(false)` without writing when the record disappeared (or
    /// stopped parsing) since it was loaded.
    pub fn update_iteration(&self, iteration: u32) -> Result<bool> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "loop record vanished before update");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(updated) = LoopRecord::parse(&content).and_then(|r| r.with_iteration(iteration))
        else {
            debug!(path = %self.path.display(), "loop record no longer parses, skipping update");
            return Ok(false);
        };

        self.save(&updated)?;
        Ok(true)
    }

    /// Deletes the record. Returns whether a file was removed.
    pub fn delete(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "loop record deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
