//! Durable per-dataset chunk checkpoint
//!
//! A plain-text file holding one integer, colocated with the source dataset
//! through a fixed suffix. The checkpoint lives outside the relational store
//! so resume state can be consulted before a store connection is opened.

use std::path::{Path, PathBuf};
use tabload_common::{Result, TabloadError};

/// Suffix appended to the source path to form the checkpoint path.
pub const PROGRESS_SUFFIX: &str = ".progress";

/// Checkpoint of the last committed chunk index for one dataset identity.
pub struct ProgressTracker {
    path: PathBuf,
}

impl ProgressTracker {
    /// Tracker for the dataset at `source`: `<source>.progress`.
    pub fn for_source(source: impl AsRef<Path>) -> Self {
        let mut os = source.as_ref().as_os_str().to_os_string();
        os.push(PROGRESS_SUFFIX);
        Self { path: PathBuf::from(os) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Is a checkpoint outstanding for this dataset? True only between an
    /// interrupted run and its successful resumption.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the checkpoint. On first access the default of 0 is persisted
    /// immediately and returned.
    pub fn read(&self) -> Result<usize> {
        if self.path.exists() {
            let contents = std::fs::read_to_string(&self.path)?;
            contents.trim().parse::<usize>().map_err(|e| {
                TabloadError::Progress(format!(
                    "Invalid checkpoint in {}: {e}",
                    self.path.display()
                ))
            })
        } else {
            self.write(0)?;
            Ok(0)
        }
    }

    /// Overwrite the checkpoint.
    pub fn write(&self, index: usize) -> Result<()> {
        std::fs::write(&self.path, index.to_string())?;
        Ok(())
    }

    /// Remove the checkpoint. Called only on full successful completion.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
