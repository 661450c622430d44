//! @acp:module "Imports"
//! @acp:summary "Import alias tables built from source token streams"
//! @acp:domain annotations
//! @acp:layer logic
//!
//! # Import Tables
//!
//! Every entity carries the table of `use` statements found in its source file.
//! Tag names are short aliases (`@Positive`), so the table is what turns them back
//! into fully-qualified descriptor type names (`App\Validators\Positive`).
//!
//! - [`lexer`]: a small tokenizer that skips comments, strings, heredocs and inline
//!   HTML so that import-like text in those never reaches the scanner.
//! - [`scanner`]: the state machine that reads `use` statements, including renamed
//!   (`A\B as C`) and grouped (`A\{B, C as D}`) imports.

pub mod lexer;
pub mod scanner;

pub use lexer::{Lexer, Token};
pub use scanner::scan_imports;

use serde::{Deserialize, Serialize};

/// @acp:summary "One fully-qualified name and the local alias it is known by"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEntry {
    /// Fully-qualified name, without a leading separator
    pub name: String,
    /// Short name visible in the declaring source unit
    pub alias: String,
}

/// @acp:summary "Ordered alias table with unique names and unique aliases"
///
/// Inserting an entry evicts any existing entry that shares its name or its alias,
/// so a later declaration always wins and both lookup directions stay unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportTable {
    entries: Vec<ImportEntry>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` under `alias`, replacing earlier entries for either
    pub fn insert(&mut self, name: impl AsRef<str>, alias: impl Into<String>) {
        let name = normalize_name(name.as_ref()).to_string();
        let alias = alias.into();

        self.entries
            .retain(|entry| entry.name != name && entry.alias != alias);
        self.entries.push(ImportEntry { name, alias });
    }

    /// Merge another table into this one; entries from `other` take precedence
    pub fn extend(&mut self, other: &ImportTable) {
        for entry in &other.entries {
            self.insert(&entry.name, entry.alias.clone());
        }
    }

    /// Fully-qualified name an alias stands for
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.alias == alias)
            .map(|entry| entry.name.as_str())
    }

    /// Alias a fully-qualified name is imported as
    pub fn alias_of(&self, name: &str) -> Option<&str> {
        let name = normalize_name(name);
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.alias.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.alias_of(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, A: Into<String>> FromIterator<(N, A)> for ImportTable {
    fn from_iter<I: IntoIterator<Item = (N, A)>>(iter: I) -> Self {
        let mut table = ImportTable::new();
        for (name, alias) in iter {
            table.insert(name, alias);
        }
        table
    }
}

/// Strip the leading namespace separator from a fully-qualified name
pub fn normalize_name(name: &str) -> &str {
    name.trim_start_matches('\\')
}

/// Namespace part of a fully-qualified name (empty for the global namespace)
pub fn namespace_of(name: &str) -> &str {
    let name = normalize_name(name);
    match name.rfind('\\') {
        Some(idx) => &name[..idx],
        None => "",
    }
}
