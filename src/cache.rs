// src/cache.rs
//! Filesystem-backed JSON store rooted at a cache directory.
//!
//! No eviction, no TTL, no locking: two writers racing on the same relative
//! path leave the file in an undefined state. Callers keep writes on one task.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on a derived key, in characters.
pub const MAX_KEY_LEN: usize = 180;

static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid json at {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("serializing value for {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Open (and create if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Read `root/rel`; a missing file yields `default`. A file that exists
    /// but does not parse is reported, not swallowed.
    pub fn read<T: DeserializeOwned>(&self, rel: &str, default: T) -> Result<T, CacheError> {
        read_json_or(&self.path_for(rel), default)
    }

    /// Same default-on-missing policy for a path outside the cache root.
    pub fn read_file<T: DeserializeOwned>(
        &self,
        path: &Path,
        default: T,
    ) -> Result<T, CacheError> {
        read_json_or(path, default)
    }

    /// Write `value` as pretty UTF-8 JSON (2-space indent, non-ASCII kept),
    /// creating parent directories and overwriting any existing file.
    pub fn write<T: Serialize + ?Sized>(&self, rel: &str, value: &T) -> Result<PathBuf, CacheError> {
        let path = self.path_for(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(value).map_err(|source| CacheError::Serialize {
            path: path.clone(),
            source,
        })?;
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };
        let mut f = fs::File::create(&path).map_err(io_err)?;
        f.write_all(json.as_bytes()).map_err(io_err)?;
        Ok(path)
    }

    /// Filesystem-safe token for an arbitrary string (e.g. a URL).
    ///
    /// Trimmed, lower-cased, every run of characters outside `[a-z0-9]`
    /// collapsed to `_`, cut to [`MAX_KEY_LEN`] characters. Distinct inputs
    /// that normalize to the same token share an entry.
    pub fn derive_key(raw: &str) -> String {
        let lowered = raw.trim().to_lowercase();
        let collapsed = RE_NON_ALNUM.replace_all(&lowered, "_");
        collapsed.chars().take(MAX_KEY_LEN).collect()
    }
}

fn read_json_or<T: DeserializeOwned>(path: &Path, default: T) -> Result<T, CacheError> {
    let content = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(default),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}
