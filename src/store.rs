use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::error::TrendsError;

pub const CACHE_FILE_NAME: &str = "pdb_counts.csv";

/// Location of persisted data, `~/.cache/pdb-trends` by default.
#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, TrendsError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("pdb-trends")).ok()
            })
            .ok_or_else(|| {
                TrendsError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { cache_root })
    }

    pub fn new_with_root(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn cache_file_path(&self) -> Utf8PathBuf {
        self.cache_root.join(CACHE_FILE_NAME)
    }

    /// Replaces `path` with `content` through a temp file in the same
    /// directory, so readers see either the old or the new file.
    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), TrendsError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| TrendsError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("pdb-trends")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| TrendsError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| TrendsError::Filesystem(err.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| TrendsError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| TrendsError::Filesystem(format!("persist {path}: {err}")))?;
        Ok(())
    }
}
