//! Package nodes of the dependency graph.
//!
//! A node is classified and given its target names when it is constructed;
//! its manifest and child list are each filled in exactly once afterwards.

use crate::alias::AliasTable;
use crate::error::{Error, Result};
use crate::manifest::{read_manifest, Manifest, MANIFEST_FILE};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Rules deciding which package names belong to the monorepo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    scope: String,
    family: Option<String>,
    umbrella: String,
}

impl Namespace {
    /// `scope` is the internal prefix (`@scope/`), `family` the umbrella name
    /// family, `umbrella` the published package name.
    #[must_use]
    pub fn new(scope: impl Into<String>, family: Option<String>, umbrella: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            family,
            umbrella: umbrella.into(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    #[must_use]
    pub fn umbrella(&self) -> &str {
        &self.umbrella
    }

    /// Whether `name` is part of the umbrella name family.
    #[must_use]
    pub fn is_family(&self, name: &str) -> bool {
        self.family.as_deref().is_some_and(|family| {
            name == family
                || name
                    .strip_prefix(family)
                    .is_some_and(|rest| rest.starts_with('-'))
        })
    }

    /// Whether `name` is an internal package.
    #[must_use]
    pub fn is_internal(&self, name: &str) -> bool {
        name.starts_with(&self.scope) || self.is_family(name)
    }
}

/// Where an internal package lands in the umbrella package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetNames {
    /// Export path relative to the umbrella, e.g. `filter/bloom`.
    pub export_name: String,
    /// Physical folder in the output tree, e.g. `filter-bloom`.
    pub folder_name: String,
}

impl TargetNames {
    /// Split a `<root>/<rest>` identifier into target names.
    ///
    /// Returns `None` when the identifier has no category below its root.
    #[must_use]
    pub fn from_export_id(id: &str) -> Option<Self> {
        let (_, rest) = id.split_once('/')?;
        if rest.is_empty() {
            return None;
        }
        Some(Self {
            export_name: rest.to_string(),
            folder_name: rest.replace('/', "-"),
        })
    }
}

/// The node that first requested this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentRef {
    pub name: String,
    pub is_external: bool,
}

/// One package in the registry.
#[derive(Debug)]
pub struct PackageNode {
    name: String,
    version_range: String,
    parent: Option<ParentRef>,
    base_path: PathBuf,
    is_external: bool,
    targets: Option<TargetNames>,
    manifest: OnceLock<Manifest>,
    dependencies: OnceLock<Vec<String>>,
}

impl PackageNode {
    /// Construct a node, classifying it and deriving its target names.
    ///
    /// The alias table is required up front so that no node can exist
    /// without its renaming decided.
    #[must_use]
    pub fn new(
        parent: Option<ParentRef>,
        name: impl Into<String>,
        version_range: impl Into<String>,
        base_path: PathBuf,
        namespace: &Namespace,
        aliases: &AliasTable,
    ) -> Self {
        let name = name.into();
        let is_external = !namespace.is_internal(&name);
        let targets = if is_external {
            None
        } else {
            Some(derive_target_names(&name, namespace, aliases))
        };

        Self {
            name,
            version_range: version_range.into(),
            parent,
            base_path,
            is_external,
            targets,
            manifest: OnceLock::new(),
            dependencies: OnceLock::new(),
        }
    }

    /// Attach an already-read manifest instead of loading it from disk.
    #[cfg(test)]
    pub(crate) fn with_manifest(self, manifest: Manifest) -> Self {
        self.manifest
            .set(manifest)
            .expect("a new node has no manifest");
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version range declared by the parent. Never resolved.
    #[must_use]
    pub fn version_range(&self) -> &str {
        &self.version_range
    }

    #[must_use]
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// True for externals whose parent is external too (or the workspace seed).
    #[must_use]
    pub fn is_transitively_external(&self) -> bool {
        self.is_external && self.parent.as_ref().map_or(true, |p| p.is_external)
    }

    #[must_use]
    pub fn targets(&self) -> Option<&TargetNames> {
        self.targets.as_ref()
    }

    #[must_use]
    pub fn target_export_name(&self) -> Option<&str> {
        self.targets.as_ref().map(|t| t.export_name.as_str())
    }

    #[must_use]
    pub fn target_folder_name(&self) -> Option<&str> {
        self.targets.as_ref().map(|t| t.folder_name.as_str())
    }

    /// The loaded manifest, once `load` has completed.
    #[must_use]
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.get()
    }

    /// Names of the child nodes, once the walker has resolved them.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        self.dependencies.get().map_or(&[], Vec::as_slice)
    }

    /// Read the manifest at `base_path`. Later calls return the first result.
    pub async fn load(&self) -> Result<&Manifest> {
        if let Some(manifest) = self.manifest.get() {
            return Ok(manifest);
        }
        let manifest = read_manifest(&self.base_path).await?;
        Ok(self.manifest.get_or_init(|| manifest))
    }

    pub(crate) fn set_dependencies(&self, names: Vec<String>) {
        if self.dependencies.set(names).is_err() {
            tracing::warn!(package = %self.name, "dependencies already set");
        }
    }

    /// Build this library's entry in the umbrella `exports` map.
    ///
    /// Every `/<build_dir>/` segment in the root export descriptor is pointed
    /// at the target folder. The manifest itself is left untouched.
    pub fn get_exports(&self, build_dir: &str) -> Result<Map<String, Value>> {
        let targets = self.targets.as_ref().ok_or_else(|| {
            Error::Precondition(format!("{} is external and has no exports", self.name))
        })?;
        let manifest = self.manifest.get().ok_or_else(|| {
            Error::Precondition(format!("manifest of {} not loaded", self.name))
        })?;
        let descriptor = manifest
            .root_export()
            .ok_or_else(|| Error::not_found("exports[\".\"]", self.base_path.join(MANIFEST_FILE)))?;

        let marker = format!("/{build_dir}/");
        let folder = format!("/{}/", targets.folder_name);
        let rewritten = replace_in_value(descriptor, &marker, &folder);

        let mut entry = Map::new();
        entry.insert(format!("./{}", targets.export_name), rewritten);
        Ok(entry)
    }

    /// Serializable summary for reporting.
    #[must_use]
    pub fn summary(&self) -> NodeSummary {
        NodeSummary {
            name: self.name.clone(),
            range: self.version_range.clone(),
            version: self.manifest().and_then(|m| m.version.clone()),
            external: self.is_external,
            parent: self.parent.as_ref().map(|p| p.name.clone()),
            export_name: self.target_export_name().map(String::from),
            folder_name: self.target_folder_name().map(String::from),
            dependencies: self.dependencies().to_vec(),
        }
    }
}

/// Flat description of a node for `graph` output.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub external: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
    pub dependencies: Vec<String>,
}

/// Derive the target names of an internal package.
///
/// Names missing from the alias table fall back to
/// `<umbrella>/<name without scope>`.
#[must_use]
pub fn derive_target_names(name: &str, namespace: &Namespace, aliases: &AliasTable) -> TargetNames {
    if let Some(targets) = aliases.get(name).and_then(TargetNames::from_export_id) {
        return targets;
    }

    let short = name.strip_prefix(namespace.scope()).unwrap_or(name);
    tracing::warn!(package = %name, "no alias entry, using \"{short}\"");
    TargetNames {
        export_name: short.to_string(),
        folder_name: short.replace('/', "-"),
    }
}

/// Deep-copy `value`, replacing `from` with `to` in every key and string.
fn replace_in_value(value: &Value, from: &str, to: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(from, to)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| replace_in_value(v, from, to))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.replace(from, to), replace_in_value(v, from, to)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn namespace() -> Namespace {
        Namespace::new("@scope/", Some("acme.js".to_string()), "acme")
    }

    fn aliases() -> AliasTable {
        AliasTable::new([
            ("@scope/core", "acme/core"),
            ("@scope/filter-bloom", "acme/filter/bloom"),
            ("acme.js", "acme/browser"),
            ("acme.js-legacy", "acme/browser-legacy"),
        ])
        .unwrap()
    }

    fn node(name: &str) -> PackageNode {
        PackageNode::new(
            None,
            name,
            "*",
            PathBuf::from("/ws/node_modules").join(name),
            &namespace(),
            &aliases(),
        )
    }

    #[test]
    fn test_classify() {
        let ns = namespace();
        assert!(ns.is_internal("@scope/core"));
        assert!(ns.is_internal("acme.js"));
        assert!(ns.is_internal("acme.js-legacy"));
        assert!(!ns.is_internal("acme.jsx"));
        assert!(!ns.is_internal("left-pad"));
        assert!(!ns.is_internal("."));
    }

    #[test]
    fn test_target_names_nested_alias() {
        let n = node("@scope/filter-bloom");
        assert!(!n.is_external());
        assert_eq!(n.target_export_name(), Some("filter/bloom"));
        assert_eq!(n.target_folder_name(), Some("filter-bloom"));
    }

    #[test]
    fn test_target_names_family_alias() {
        let n = node("acme.js-legacy");
        assert_eq!(n.target_export_name(), Some("browser-legacy"));
        assert_eq!(n.target_folder_name(), Some("browser-legacy"));
    }

    #[test]
    fn test_target_names_fallback_strips_scope() {
        let n = node("@scope/unlisted");
        assert_eq!(n.target_export_name(), Some("unlisted"));
    }

    #[test]
    fn test_target_names_deterministic() {
        let ns = namespace();
        let table = aliases();
        for (name, _) in table.iter() {
            assert_eq!(
                derive_target_names(name, &ns, &table),
                derive_target_names(name, &ns, &table)
            );
        }
    }

    #[test]
    fn test_external_has_no_targets() {
        let n = node("left-pad");
        assert!(n.is_external());
        assert!(n.targets().is_none());
        assert!(n.get_exports("lib").is_err());
    }

    #[test]
    fn test_transitively_external() {
        let ns = namespace();
        let table = aliases();
        let via_internal = PackageNode::new(
            Some(ParentRef {
                name: "@scope/core".to_string(),
                is_external: false,
            }),
            "left-pad",
            "^1.0.0",
            PathBuf::from("/ws/node_modules/left-pad"),
            &ns,
            &table,
        );
        let via_external = PackageNode::new(
            Some(ParentRef {
                name: "left-pad".to_string(),
                is_external: true,
            }),
            "pad-core",
            "^2.0.0",
            PathBuf::from("/ws/node_modules/pad-core"),
            &ns,
            &table,
        );
        assert!(!via_internal.is_transitively_external());
        assert!(via_external.is_transitively_external());
    }

    #[test]
    fn test_get_exports_rewrites_build_dir() {
        let n = node("@scope/filter-bloom");
        let manifest: Manifest = serde_json::from_value(json!({
            "name": "@scope/filter-bloom",
            "exports": {".": {
                "import": {"types": "./lib/index.d.ts", "default": "./lib/index.mjs"},
                "require": "./lib/index.js"
            }}
        }))
        .unwrap();
        n.manifest.set(manifest).unwrap();

        let exports = n.get_exports("lib").unwrap();
        assert_eq!(
            Value::Object(exports),
            json!({"./filter/bloom": {
                "import": {"types": "./filter-bloom/index.d.ts", "default": "./filter-bloom/index.mjs"},
                "require": "./filter-bloom/index.js"
            }})
        );

        // Shared manifest untouched
        assert_eq!(
            n.manifest().unwrap().root_export().unwrap()["require"],
            json!("./lib/index.js")
        );
    }

    #[test]
    fn test_get_exports_missing_root_export() {
        let n = node("@scope/core");
        n.manifest.set(Manifest::default()).unwrap();
        let err = n.get_exports("lib").unwrap_err();
        assert_eq!(err.code(), crate::error::codes::NOT_FOUND);
    }
}
