//! File-backed token store for the command-line client.
//!
//! DESIGN
//! ======
//! Tokens live in a small JSON object keyed by cookie name, so the file reads
//! the same way the browser's cookie jar does. Every write goes straight to
//! disk; the in-memory map is only a cache of the last successful load.
//!
//! ERROR HANDLING
//! ==============
//! [`TokenStore`] writes are infallible for callers. A failed write is logged
//! and the cached value still changes, so the current process stays coherent
//! even when the next one will not see the update.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use termipics::cookies::{CookieOptions, TokenStore};

use crate::CliError;

const SESSION_DIR: &str = ".termipics";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileTokenStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CliError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(CliError::Io { path, source: err }),
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "session file loaded");
        Ok(Self { path, values })
    }

    /// `~/.termipics/session.json`.
    ///
    /// # Errors
    ///
    /// [`CliError::NoHomeDir`] when the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, CliError> {
        let home = dirs_next::home_dir().ok_or(CliError::NoHomeDir)?;
        Ok(home.join(SESSION_DIR).join(SESSION_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(content.as_bytes())?;
        file.write_all(b"\n")
    }

    fn persist_or_warn(&self) {
        if let Err(err) = self.persist() {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to write session file");
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_empty()).cloned()
    }

    fn set(&mut self, name: &str, value: &str, _options: &CookieOptions) {
        self.values.insert(name.to_owned(), value.to_owned());
        self.persist_or_warn();
    }

    fn remove(&mut self, name: &str, _options: &CookieOptions) {
        if self.values.remove(name).is_some() {
            self.persist_or_warn();
        }
    }
}
