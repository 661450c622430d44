//! @acp:module "Configuration"
//! @acp:summary "Engine configuration loading and defaults"
//! @acp:domain annotations
//! @acp:layer config

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::NotesError;
use crate::merge::MergeOptions;

/// Configuration file looked up by [`Config::load_or_default`]
pub const DEFAULT_CONFIG_FILE: &str = ".docnotes.json";

fn default_sigil() -> char {
    '@'
}

fn default_exclusion_marker() -> String {
    "Ignore".to_string()
}

fn default_doc_tags() -> Vec<String> {
    [
        "api",
        "author",
        "copyright",
        "deprecated",
        "example",
        "inheritdoc",
        "internal",
        "license",
        "link",
        "method",
        "package",
        "param",
        "property",
        "property-read",
        "property-write",
        "return",
        "see",
        "since",
        "throws",
        "todo",
        "uses",
        "var",
        "version",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
    true
}

/// @acp:summary "Annotation engine configuration"
/// @acp:lock normal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Character that starts a tag line
    #[serde(default = "default_sigil")]
    pub sigil: char,

    /// Tag name that drops a member from merged results (case-insensitive)
    #[serde(default = "default_exclusion_marker")]
    pub exclusion_marker: String,

    /// Plain documentation tags, kept but never parsed or resolved
    #[serde(default = "default_doc_tags")]
    pub doc_tags: Vec<String>,

    /// Memoize source file contents across entities
    #[serde(default = "default_true")]
    pub cache_sources: bool,

    /// Default merge mode per section
    #[serde(default)]
    pub merge: MergeOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sigil: default_sigil(),
            exclusion_marker: default_exclusion_marker(),
            doc_tags: default_doc_tags(),
            cache_sources: default_true(),
            merge: MergeOptions::default(),
        }
    }
}

impl Config {
    /// @acp:summary "Load config from a JSON file"
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// @acp:summary "Save config to a file"
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// @acp:summary "Load from default location or fall back to defaults"
    pub fn load_or_default() -> Self {
        match Self::load(DEFAULT_CONFIG_FILE) {
            Ok(config) => config,
            Err(NotesError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(err) => {
                tracing::warn!("Ignoring {}: {}", DEFAULT_CONFIG_FILE, err);
                Self::default()
            }
        }
    }

    /// Whether `word` names a documentation-only tag
    pub fn is_doc_tag(&self, word: &str) -> bool {
        self.doc_tags.iter().any(|tag| tag.eq_ignore_ascii_case(word))
    }

    pub fn with_sigil(mut self, sigil: char) -> Self {
        self.sigil = sigil;
        self
    }

    pub fn with_exclusion_marker(mut self, marker: impl Into<String>) -> Self {
        self.exclusion_marker = marker.into();
        self
    }

    pub fn with_merge(mut self, merge: MergeOptions) -> Self {
        self.merge = merge;
        self
    }
}
