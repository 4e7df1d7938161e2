//! Alias table: internal package name -> namespaced export identifier.
//!
//! Identifiers have the form `<root>/<category>[/<subname>]`. The table is the
//! single source of truth for renaming and must be loaded before the walk.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Mapping from internal package name to its canonical export identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    /// Build a table from `(name, identifier)` pairs.
    ///
    /// Identifiers must contain at least one `/`.
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries: BTreeMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for (name, id) in &entries {
            match id.split_once('/') {
                Some((root, rest)) if !root.is_empty() && !rest.is_empty() => {}
                _ => {
                    return Err(Error::Precondition(format!(
                        "alias for {name} must look like <root>/<category>, got \"{id}\""
                    )));
                }
            }
        }

        Ok(Self { entries })
    }

    /// Load the alias document at `path`.
    ///
    /// A missing document is a precondition failure: nothing can be renamed
    /// without it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::Precondition(format!(
                    "alias table not found at {}",
                    path.display()
                )));
            }
            Err(e) => return Err(Error::io("failed to read alias table", path, e)),
        };

        let entries: BTreeMap<String, String> =
            serde_json::from_str(&content).map_err(|source| Error::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;

        Self::new(entries)
    }

    /// Look up the export identifier of an internal package.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
