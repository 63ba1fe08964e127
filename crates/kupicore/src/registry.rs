//! Flat-file registry of user ids.
//!
//! One id per line. The file is read in full and rewritten in full on
//! every add; fine for the small single-instance deployments this bot
//! targets. A mutex serializes mutations because handlers run on a
//! multi-threaded runtime.

use crate::error::AppResult;
use fs_err as fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Newline-delimited user id file.
pub struct UserRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl UserRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every recorded id, in file order. A missing file is an
    /// empty registry, not an error.
    pub fn load(&self) -> AppResult<Vec<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_ids()
    }

    /// Records `id` unless it is already present. Returns whether the
    /// registry changed.
    pub fn add(&self, id: &str) -> AppResult<bool> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(false);
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids = self.read_ids()?;
        if ids.iter().any(|existing| existing == id) {
            return Ok(false);
        }
        ids.push(id.to_string());

        let mut contents = ids.join("\n");
        contents.push('\n');
        fs::write(&self.path, contents)?;
        Ok(true)
    }

    fn read_ids(&self) -> AppResult<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
