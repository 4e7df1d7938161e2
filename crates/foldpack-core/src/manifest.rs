//! Manifest (package.json) reading and writing.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Manifest file name inside every package folder.
pub const MANIFEST_FILE: &str = "package.json";

/// The fields of a package manifest that drive the assembly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Declared runtime dependencies (name -> range), sorted by name.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub exports: Option<Value>,
}

impl Manifest {
    /// The root export descriptor, `exports["."]`.
    #[must_use]
    pub fn root_export(&self) -> Option<&Value> {
        self.exports.as_ref()?.get(".")
    }
}

/// `"dependencies": null` reads as no dependencies.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BTreeMap<String, String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Read the manifest of the package at `dir`.
pub async fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::not_found("manifest", path));
        }
        Err(e) => return Err(Error::io("failed to read manifest", path, e)),
    };

    serde_json::from_str(&content).map_err(|source| Error::ManifestParse { path, source })
}

/// Read a JSON object document verbatim, keeping every field and its order.
pub fn read_document(path: &Path) -> Result<Map<String, Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::not_found("document", path));
        }
        Err(e) => return Err(Error::io("failed to read document", path, e)),
    };

    serde_json::from_str(&content).map_err(|source| Error::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a JSON object document with two-space indentation and a trailing newline.
pub fn write_document(path: &Path, doc: &Map<String, Value>) -> Result<()> {
    let mut text = serde_json::to_string_pretty(doc).map_err(|source| Error::ManifestParse {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');

    foldpack_util::fs::atomic_write(path, text.as_bytes())
        .map_err(|e| Error::io("failed to write document", path, e))
}
