use log::info;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::KeywordError;

/// Default location of the keyword list.
pub const KEYWORDS_FILE: &str = "database/keywords.json";

/// Ordered keyword list persisted as a JSON array of strings
///
/// Order is significant: keyword classification applies the list front to
/// back. Every change is written through to disk before returning.
#[derive(Debug)]
pub struct KeywordStore {
    path: PathBuf,
    keywords: Mutex<Vec<String>>,
}

impl KeywordStore {
    /// Opens the store, creating the parent directory and an empty list file
    /// if they don't exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KeywordError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| KeywordError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir).map_err(io_err)?;
        }
        if !path.exists() {
            fs::write(&path, b"[]").map_err(io_err)?;
        }

        let contents = fs::read_to_string(&path).map_err(io_err)?;
        let keywords: Vec<String> =
            serde_json::from_str(&contents).map_err(|source| KeywordError::Format {
                path: path.clone(),
                source,
            })?;

        Ok(KeywordStore {
            path,
            keywords: Mutex::new(keywords),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Appends a keyword (trimmed) to the end of the list.
    ///
    /// The list in memory only changes once the file write succeeded.
    pub fn add(&self, keyword: &str) -> Result<Vec<String>, KeywordError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(KeywordError::Empty);
        }

        let mut keywords = self.lock();
        if keywords.iter().any(|k| k == keyword) {
            return Err(KeywordError::Duplicate(keyword.to_string()));
        }

        let mut updated = keywords.clone();
        updated.push(keyword.to_string());
        self.save(&updated)?;
        *keywords = updated;

        info!("keyword added: {} ({} total)", keyword, keywords.len());
        Ok(keywords.clone())
    }

    /// Removes a keyword by value. Returns `false` if it wasn't in the list.
    pub fn remove(&self, keyword: &str) -> Result<bool, KeywordError> {
        let keyword = keyword.trim();
        let mut keywords = self.lock();
        if !keywords.iter().any(|k| k == keyword) {
            return Ok(false);
        }

        let updated: Vec<String> = keywords.iter().filter(|k| *k != keyword).cloned().collect();
        self.save(&updated)?;
        *keywords = updated;

        info!("keyword removed: {} ({} total)", keyword, keywords.len());
        Ok(true)
    }

    fn save(&self, keywords: &[String]) -> Result<(), KeywordError> {
        let json = serde_json::to_string_pretty(keywords).map_err(|source| KeywordError::Format {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| KeywordError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.keywords.lock().unwrap_or_else(|e| e.into_inner())
    }
}
