//! Per-request input and output files.
//!
//! Every upload gets a fresh UUID. The uploaded matrix is written to `data_<uuid>.csv` and the
//! ranking tool is told to write its result to `result_<uuid>.csv`, both inside the configured
//! upload directory. The paths are owned by an [`Artifact`] guard from the moment they are named,
//! so whichever way the request ends (success, error response, panic) both files are removed when
//! the [`JobArtifacts`] value is dropped.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::types::{JobId, abbrev_uuid};

/// A file path that is deleted, if present, when the guard goes out of scope.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
}

impl Artifact {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> Result<bool> {
        tokio::fs::try_exists(&self.path).await.map_err(|e| Error::Internal {
            operation: format!("check {}: {e}", self.path.display()),
        })
    }
}

impl Drop for Artifact {
    // Blocking removal: Drop can't await, and these are two small files per request
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "Removed artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove artifact"),
        }
    }
}

/// The input/output pair belonging to one upload.
#[derive(Debug)]
pub struct JobArtifacts {
    id: JobId,
    input: Artifact,
    output: Artifact,
}

impl JobArtifacts {
    /// Name a fresh input/output pair under `dir`. Nothing is written yet.
    pub fn allocate(dir: &Path) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            input: Artifact::new(dir.join(format!("data_{id}.csv"))),
            output: Artifact::new(dir.join(format!("result_{id}.csv"))),
        }
    }

    /// Short form of the id for log lines.
    pub fn short_id(&self) -> String {
        abbrev_uuid(&self.id)
    }

    pub fn input(&self) -> &Artifact {
        &self.input
    }

    pub fn output(&self) -> &Artifact {
        &self.output
    }

    /// Persist the uploaded payload verbatim to the input path.
    pub async fn write_input(&self, contents: &[u8]) -> Result<()> {
        tokio::fs::write(self.input.path(), contents).await.map_err(|e| Error::Internal {
            operation: format!("save upload to {}: {e}", self.input.path().display()),
        })
    }
}
