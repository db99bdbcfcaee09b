//! Record of the sweep in progress, kept in the working directory.
//!
//! `run` creates it, `resume` reads it to find the mode and directories, and
//! `finish` removes it.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{WrapErr, eyre};
use gridsweep_core::{RunMode, atomic_write};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::util::io::remove_if_exists;

pub const SESSION_FILE_NAME: &str = ".gridsweep-session.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub mode: RunMode,
    pub job_file: PathBuf,
    pub checkpoint: PathBuf,
    pub artifact_dir: PathBuf,
    pub started_at: Timestamp,
    /// Workers launched so far
    pub launched: usize,
    /// Chunks in the plan
    pub total_chunks: usize,
}

impl Session {
    #[must_use]
    pub fn path(workdir: &Path) -> PathBuf {
        workdir.join(SESSION_FILE_NAME)
    }

    /// The session in `workdir`, if one is open
    pub fn load(workdir: &Path) -> color_eyre::Result<Option<Self>> {
        let path = Self::path(workdir);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let session = serde_saphyr::from_str(&content)
            .map_err(|e| eyre!("corrupt session file {}: {e}", path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, workdir: &Path) -> color_eyre::Result<()> {
        let path = Self::path(workdir);
        let yaml =
            serde_saphyr::to_string(self).map_err(|e| eyre!("failed to serialize session: {e}"))?;
        atomic_write(&path, &yaml).wrap_err_with(|| format!("failed to write {}", path.display()))
    }

    /// Remove the session file. Returns whether one existed.
    pub fn discard(workdir: &Path) -> color_eyre::Result<bool> {
        let path = Self::path(workdir);
        remove_if_exists(&path).wrap_err_with(|| format!("failed to remove {}", path.display()))
    }

    #[must_use]
    pub fn is_fully_launched(&self) -> bool {
        self.launched >= self.total_chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session() -> Session {
        Session {
            mode: RunMode::TZA,
            job_file: PathBuf::from("/work/Params.dat"),
            checkpoint: PathBuf::from("/work/Params.dat.Initial_TZA_tables"),
            artifact_dir: PathBuf::from("/work/output"),
            started_at: "2026-03-01T12:00:00Z".parse().unwrap(),
            launched: 2,
            total_chunks: 4,
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let dir = tempdir().unwrap();
        assert_eq!(Session::load(dir.path()).unwrap(), None);

        let mut session = session();
        session.save(dir.path()).unwrap();
        assert_eq!(Session::load(dir.path()).unwrap(), Some(session.clone()));
        assert!(!session.is_fully_launched());

        session.launched = 4;
        session.save(dir.path()).unwrap();
        let loaded = Session::load(dir.path()).unwrap().unwrap();
        assert!(loaded.is_fully_launched());

        assert!(Session::discard(dir.path()).unwrap());
        assert!(!Session::discard(dir.path()).unwrap());
        assert_eq!(Session::load(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(Session::path(dir.path()), "mode: [not a mode\n").unwrap();
        assert!(Session::load(dir.path()).is_err());
    }
}
