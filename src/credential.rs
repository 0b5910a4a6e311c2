//! Persisted API key.
//!
//! The key is opaque: it is never validated, only attached to requests.
//! Every storage failure is logged and swallowed, so the worst case for the
//! user is an empty key field on the next start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::Result;
use tracing::{debug, warn};

use crate::config::app_config_dir;

const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Serialize, Deserialize, Default)]
struct StoredCredential {
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the user's config directory. Falls back to a relative
    /// path when no config directory can be determined.
    pub fn default_location() -> Self {
        let path = match app_config_dir() {
            Ok(dir) => dir.join(CREDENTIALS_FILE),
            Err(e) => {
                warn!("credential store falling back to working directory: {e}");
                PathBuf::from(CREDENTIALS_FILE)
            }
        };
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previously saved key, or `None` if nothing (or an empty string) was
    /// saved or the file could not be read.
    pub fn load(&self) -> Option<String> {
        match self.try_load() {
            Ok(key) => key.filter(|k| !k.is_empty()),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to load API key: {e:#}");
                None
            }
        }
    }

    pub fn save(&self, key: &str) {
        match self.try_save(key) {
            Ok(()) => debug!(path = %self.path.display(), "saved API key"),
            Err(e) => warn!(path = %self.path.display(), "failed to save API key: {e:#}"),
        }
    }

    fn try_load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let stored: StoredCredential = serde_json::from_str(&content)?;
        Ok(stored.api_key)
    }

    fn try_save(&self, key: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredCredential {
            api_key: Some(key.to_string()),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }
}

const MAX_MASK_STARS: usize = 20;

/// Hide all but the last four characters of a key for display.
pub fn mask_key(key: &str) -> String {
    let char_count = key.chars().count();
    if char_count <= 4 {
        return "*".repeat(char_count);
    }
    let masked_len = char_count - 4;
    let last_four: String = key.chars().skip(masked_len).collect();
    format!("{}{}", "*".repeat(masked_len.min(MAX_MASK_STARS)), last_four)
}

/// Display column in `mask_key(key)` for a cursor at char index `cursor`
/// of `key`. Positions inside a collapsed run of stars stick to its end.
pub fn masked_cursor(key: &str, cursor: usize) -> usize {
    let char_count = key.chars().count();
    let cursor = cursor.min(char_count);
    if char_count <= 4 {
        return cursor;
    }
    let masked_len = char_count - 4;
    let stars = masked_len.min(MAX_MASK_STARS);
    if cursor <= masked_len {
        cursor.min(stars)
    } else {
        stars + (cursor - masked_len)
    }
}
