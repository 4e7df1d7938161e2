//! Manifest composition.
//!
//! Folds the registry into the umbrella manifest: external dependencies,
//! version, the merged `exports` map and the `files` list. The result is laid
//! over the skeleton's base manifest; other fields pass through unchanged.

use crate::config::CollisionPolicy;
use crate::error::{Error, Result};
use crate::manifest::MANIFEST_FILE;
use crate::node::PackageNode;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Inputs of the composer that do not come from the registry.
#[derive(Debug, Clone)]
pub struct ComposeOptions<'a> {
    /// Package providing `version` and the `.` export.
    pub canonical: &'a str,
    /// Build-output folder marker rewritten in export descriptors.
    pub build_dir: &'a str,
    pub on_collision: CollisionPolicy,
}

/// The computed manifest fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub dependencies: BTreeMap<String, String>,
    pub version: String,
    pub exports: Map<String, Value>,
    pub files: Vec<String>,
}

impl Composition {
    /// Lay the computed fields over `base`, replacing only those four keys.
    #[must_use]
    pub fn apply(&self, base: &Map<String, Value>) -> Map<String, Value> {
        let mut out = base.clone();
        let dependencies: Map<String, Value> = self
            .dependencies
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        out.insert("dependencies".to_string(), Value::Object(dependencies));
        out.insert("version".to_string(), Value::String(self.version.clone()));
        out.insert("exports".to_string(), Value::Object(self.exports.clone()));
        out.insert(
            "files".to_string(),
            Value::Array(self.files.iter().cloned().map(Value::String).collect()),
        );
        out
    }
}

/// Compute the umbrella manifest fields from the registry nodes.
///
/// `nodes` may be in any order; the result is the same.
pub fn compose(
    nodes: &[Arc<PackageNode>],
    base: &Map<String, Value>,
    opts: &ComposeOptions<'_>,
) -> Result<Composition> {
    let mut libraries: Vec<&PackageNode> = nodes
        .iter()
        .map(Arc::as_ref)
        .filter(|n| !n.is_external())
        .collect();
    libraries.sort_by(|a, b| a.name().cmp(b.name()));

    let dependencies = external_dependencies(nodes);

    let canonical = libraries
        .iter()
        .find(|n| n.name() == opts.canonical)
        .ok_or_else(|| {
            Error::ConfigInvalid(format!(
                "canonical package {} is not an internal dependency of the workspace",
                opts.canonical
            ))
        })?;
    let version = canonical
        .manifest()
        .and_then(|m| m.version.clone())
        .ok_or_else(|| Error::not_found("version", canonical.base_path().join(MANIFEST_FILE)))?;

    let mut exports = merge_exports(&libraries, opts)?;
    let root_key = format!(
        "./{}",
        canonical.target_export_name().unwrap_or(canonical.name())
    );
    let root_entry = exports.get(&root_key).cloned().ok_or_else(|| {
        Error::Precondition(format!("no export {root_key} to alias as \".\""))
    })?;
    exports.insert(".".to_string(), root_entry);
    let exports = sort_map(exports);

    let files = merge_files(base, &libraries);

    Ok(Composition {
        dependencies,
        version,
        exports,
        files,
    })
}

/// External packages introduced directly by an internal package.
fn external_dependencies(nodes: &[Arc<PackageNode>]) -> BTreeMap<String, String> {
    nodes
        .iter()
        .filter(|n| n.is_external() && !n.is_transitively_external())
        .map(|n| (n.name().to_string(), n.version_range().to_string()))
        .collect()
}

fn merge_exports(
    libraries: &[&PackageNode],
    opts: &ComposeOptions<'_>,
) -> Result<Map<String, Value>> {
    let mut exports = Map::new();
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();

    for lib in libraries {
        for (key, value) in lib.get_exports(opts.build_dir)? {
            if let Some(first) = owners.get(&key) {
                match opts.on_collision {
                    CollisionPolicy::Error => {
                        return Err(Error::ExportCollision {
                            key,
                            first: (*first).to_string(),
                            second: lib.name().to_string(),
                        });
                    }
                    CollisionPolicy::Overwrite => {
                        tracing::warn!(export = %key, first = %first, second = %lib.name(), "export overwritten");
                    }
                }
            }
            owners.insert(key.clone(), lib.name());
            exports.insert(key, value);
        }
    }

    Ok(exports)
}

/// Sorted union of the base manifest's `files` and every library folder.
fn merge_files(base: &Map<String, Value>, libraries: &[&PackageNode]) -> Vec<String> {
    let mut files: BTreeSet<String> = base
        .get("files")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    files.extend(
        libraries
            .iter()
            .filter_map(|n| n.target_folder_name())
            .map(String::from),
    );
    files.into_iter().collect()
}

fn sort_map(map: Map<String, Value>) -> Map<String, Value> {
    let sorted: BTreeMap<String, Value> = map.into_iter().collect();
    sorted.into_iter().collect()
}
