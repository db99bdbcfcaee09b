//! Write-once copy of the pre-sweep grid.
//!
//! The checkpoint is taken from the base parameter file before the first chunk
//! is dispatched. Resume analysis rebuilds the full combination set from it,
//! so it is never overwritten; one file per run mode lets several sweep types
//! share a working directory.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CheckpointError, RecordError};
use crate::grid::Grid;
use crate::mode::{MODE_KEY, RunMode};
use crate::record::ParamRecord;

/// A loaded checkpoint
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub mode: RunMode,
    pub path: PathBuf,
    pub record: ParamRecord,
}

impl Checkpoint {
    /// Rebuild the initial grid
    pub fn grid(&self) -> Result<Grid, RecordError> {
        self.mode.grid_from(&self.record)
    }
}

/// Locates checkpoints next to the job file
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    job_file_name: String,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, job_file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            job_file_name: job_file_name.into(),
        }
    }

    /// Store for checkpoints of `job_file`, kept in the same directory
    #[must_use]
    pub fn beside(job_file: &Path) -> Self {
        let dir = job_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let name = job_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Params.dat".to_string());
        Self::new(dir, name)
    }

    #[must_use]
    pub fn path(&self, mode: RunMode) -> PathBuf {
        self.dir.join(mode.checkpoint_file_name(&self.job_file_name))
    }

    #[must_use]
    pub fn exists(&self, mode: RunMode) -> bool {
        self.path(mode).is_file()
    }

    /// Record `base` with its axes taken from `grid` and the mode tag.
    ///
    /// Fails with [`CheckpointError::AlreadyExists`] rather than overwrite.
    pub fn save(
        &self,
        base: &ParamRecord,
        grid: &Grid,
        mode: RunMode,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.path(mode);

        let mut record = base.clone();
        for axis in grid.axes() {
            record.set_axis(axis);
        }
        record.set(MODE_KEY, mode.tag());

        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir).map_err(|e| RecordError::io(&self.dir, e))?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(CheckpointError::AlreadyExists { path });
            }
            Err(e) => return Err(RecordError::io(&path, e).into()),
        };
        file.write_all(record.render().as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| RecordError::io(&path, e))?;

        info!(path = %path.display(), mode = mode.tag(), combinations = grid.len(), "checkpoint saved");
        Ok(path)
    }

    /// Remove the checkpoint for `mode`, if any.
    ///
    /// Only used when the operator explicitly starts a fresh sweep.
    pub fn discard(&self, mode: RunMode) -> Result<bool, CheckpointError> {
        let path = self.path(mode);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RecordError::io(&path, e).into()),
        }
    }

    pub fn load(&self, mode: RunMode) -> Result<Checkpoint, CheckpointError> {
        let path = self.path(mode);
        let record = ParamRecord::load(&path).map_err(|e| {
            if e.is_not_found() {
                CheckpointError::NotFound { path: path.clone() }
            } else {
                CheckpointError::Record(e)
            }
        })?;
        Ok(Checkpoint { mode, path, record })
    }
}
