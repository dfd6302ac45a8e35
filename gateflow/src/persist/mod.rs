//! Saving finished runs to disk.
//!
//! [`TextRunStore`] writes the human-readable story file; [`JsonRunStore`]
//! writes the full run record.

use crate::core::PipelineRun;
use crate::errors::GateflowError;
use crate::utils::{display_stamp, file_stamp, remove_thinking_process};
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Line between the header and the body of a saved run.
pub const SEPARATOR: &str = "==================";

/// Writes completed runs as timestamped text files.
#[derive(Debug, Clone)]
pub struct TextRunStore {
    dir: PathBuf,
}

impl TextRunStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves a completed run and returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`GateflowError::Persistence`] if the run did not complete, or
    /// an IO error if the file cannot be written.
    pub fn save(&self, run: &PipelineRun) -> Result<PathBuf, GateflowError> {
        self.save_at(run, Local::now())
    }

    /// Saves a completed run as if at time `now`.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save).
    pub fn save_at(&self, run: &PipelineRun, now: DateTime<Local>) -> Result<PathBuf, GateflowError> {
        let body = match run.final_output() {
            Some(output) if run.status().is_completed() => remove_thinking_process(output),
            _ => {
                return Err(GateflowError::Persistence(format!(
                    "run {} is {}, only completed runs are saved",
                    run.run_id(),
                    run.status()
                )))
            }
        };

        fs::create_dir_all(&self.dir)?;
        let contents = format!(
            "User prompt: {}\nGenerated at: {}\n\n{SEPARATOR}\n\n{body}",
            run.seed(),
            display_stamp(&now),
        );

        let stem = file_stamp(&now);
        let path = write_new(&self.dir, &stem, "txt", contents.as_bytes())?;
        info!(path = %path.display(), run_id = %run.run_id(), "Saved run");
        Ok(path)
    }
}

/// Writes whole runs as pretty JSON, one file per run id.
#[derive(Debug, Clone)]
pub struct JsonRunStore {
    dir: PathBuf,
}

impl JsonRunStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Saves a run in any state.
    ///
    /// # Errors
    ///
    /// Returns a serialization or IO error.
    pub fn save(&self, run: &PipelineRun) -> Result<PathBuf, GateflowError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", run.run_id()));
        fs::write(&path, serde_json::to_string_pretty(run)?)?;
        info!(path = %path.display(), status = %run.status(), "Saved run record");
        Ok(path)
    }

    /// Loads a run by id.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file is missing, or a serialization error.
    pub fn load(&self, run_id: uuid::Uuid) -> Result<PipelineRun, GateflowError> {
        let raw = fs::read_to_string(self.dir.join(format!("{run_id}.json")))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Creates `<dir>/<stem>.<ext>`, or `<stem>-1`, `<stem>-2`... if taken.
fn write_new(dir: &Path, stem: &str, ext: &str, contents: &[u8]) -> Result<PathBuf, GateflowError> {
    for attempt in 0u32.. {
        let name = if attempt == 0 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}-{attempt}.{ext}")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(contents)?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(GateflowError::Persistence(format!(
        "no free file name for {stem} in {}",
        dir.display()
    )))
}
