//! Persisted cookie store.
//!
//! The session file is the only durable state in the crate: a JSON array
//! of cookies. Writes go through a temp file in the same directory and a
//! rename, so a crash mid-write never leaves a torn file. Reads treat a
//! missing, unreadable or malformed file as "no session".

// ============================================================================
// Imports
// ============================================================================

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::driver::Cookie;
use crate::error::Result;

// ============================================================================
// SessionStore
// ============================================================================

/// File-backed cookie store.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Creates a store at the given path. The file need not exist yet.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the store path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads persisted cookies.
    ///
    /// Returns `None` on a missing, unreadable or malformed file; the
    /// caller falls through to a fresh login instead of failing.
    #[must_use]
    pub fn read(&self) -> Option<Vec<Cookie>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "No readable session file");
                return None;
            }
        };

        match serde_json::from_str::<Vec<Cookie>>(&raw) {
            Ok(cookies) if !cookies.is_empty() => Some(cookies),
            Ok(_) => {
                debug!(path = %self.path.display(), "Session file is empty");
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Malformed session file, ignoring");
                None
            }
        }
    }

    /// Persists cookies atomically.
    pub fn write(&self, cookies: &[Cookie]) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut file = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut file, cookies)?;
        file.flush()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), count = cookies.len(), "Session persisted");
        Ok(())
    }

    /// Deletes the session file. Missing file is not an error.
    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
