//! @acp:module "Source Cache"
//! @acp:summary "Memoized access to the source text entities are declared in"
//! @acp:domain annotations
//! @acp:layer io

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// @acp:summary "Where the source text of an entity comes from"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRef {
    /// No source available (built-in or generated type); no imports
    #[default]
    None,
    /// Source text supplied directly by the host
    Text(String),
    /// Source file on disk, read through the cache
    File(PathBuf),
}

/// @acp:summary "Per-process cache of source file contents keyed by path"
///
/// Several entities usually share one file, and every merge walks the same
/// ancestors again, so file contents are read once per run.
#[derive(Debug)]
pub struct SourceCache {
    enabled: bool,
    files: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SourceCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            files: RwLock::new(HashMap::new()),
        }
    }

    /// Text behind a source reference
    pub fn load(&self, source: &SourceRef) -> std::io::Result<Arc<str>> {
        match source {
            SourceRef::None => Ok(Arc::from("")),
            SourceRef::Text(text) => Ok(Arc::from(text.as_str())),
            SourceRef::File(path) => self.read(path),
        }
    }

    /// Contents of a file, from the cache when already read
    pub fn read(&self, path: &Path) -> std::io::Result<Arc<str>> {
        if self.enabled {
            let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(text) = files.get(path) {
                tracing::trace!("Source cache hit: {}", path.display());
                return Ok(Arc::clone(text));
            }
        }

        let text: Arc<str> = Arc::from(std::fs::read_to_string(path)?);
        if self.enabled {
            self.files
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(path.to_path_buf(), Arc::clone(&text));
        }
        Ok(text)
    }

    pub fn len(&self) -> usize {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
