//! Filesystem helpers for the session and settings files

use std::fs;
use std::io;
use std::path::Path;

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
