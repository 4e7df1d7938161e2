//! Dependency walker.
//!
//! Discovers every package reachable from the workspace root and records one
//! node per distinct name. Resolution proceeds in waves: all manifests of a
//! wave load concurrently, then their children are requested in a fixed
//! order (wave order, then manifest order), so the first requester of every
//! name is the same on every run.

use crate::alias::AliasTable;
use crate::error::{Error, Result};
use crate::node::{Namespace, PackageNode, ParentRef};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Name of the synthetic seed node standing in for the workspace root.
pub const ROOT_NAME: &str = ".";

/// Folder holding installed packages.
const NODE_MODULES: &str = "node_modules";

/// Every package discovered by the walk, keyed by name.
#[derive(Debug, Default)]
pub struct Registry {
    nodes: Mutex<BTreeMap<String, Arc<PackageNode>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node for `name`, inserting `make()` if absent.
    ///
    /// The boolean is true when the node was created by this call.
    pub fn get_or_insert_with(
        &self,
        name: &str,
        make: impl FnOnce() -> PackageNode,
    ) -> (Arc<PackageNode>, bool) {
        let mut nodes = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = nodes.get(name) {
            return (Arc::clone(existing), false);
        }
        let node = Arc::new(make());
        nodes.insert(name.to_string(), Arc::clone(&node));
        (node, true)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<PackageNode>> {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<PackageNode>> {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// All nodes in name order.
    #[must_use]
    pub fn nodes(&self) -> Vec<Arc<PackageNode>> {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the registry for one workspace.
pub struct Walker<'a> {
    root: PathBuf,
    namespace: &'a Namespace,
    aliases: &'a AliasTable,
    registry: Registry,
}

impl<'a> Walker<'a> {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, namespace: &'a Namespace, aliases: &'a AliasTable) -> Self {
        Self {
            root: root.into(),
            namespace,
            aliases,
            registry: Registry::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Memoized node factory.
    ///
    /// The first request for `name` constructs the node; every later request
    /// returns that same node, whatever parent or range it names.
    pub fn create(
        &self,
        parent: Option<&PackageNode>,
        name: &str,
        version_range: &str,
        base_path: Option<PathBuf>,
    ) -> (Arc<PackageNode>, bool) {
        self.registry.get_or_insert_with(name, || {
            let base_path = base_path.unwrap_or_else(|| self.default_base_path(parent, name));
            let parent = parent.map(|p| ParentRef {
                name: p.name().to_string(),
                is_external: p.is_external(),
            });
            PackageNode::new(
                parent,
                name,
                version_range,
                base_path,
                self.namespace,
                self.aliases,
            )
        })
    }

    /// Walk the dependency tree from the workspace root and return the
    /// registry, with the seed node removed.
    pub async fn walk(self) -> Result<Registry> {
        let (seed, _) = self.create(None, ROOT_NAME, "*", Some(self.root.clone()));
        let mut wave = vec![seed];

        while !wave.is_empty() {
            try_join_all(wave.iter().map(|node| node.load())).await?;

            let mut next = Vec::new();
            for node in &wave {
                let manifest = node.manifest().ok_or_else(|| {
                    Error::Precondition(format!("manifest of {} not loaded", node.name()))
                })?;

                let mut children = Vec::with_capacity(manifest.dependencies.len());
                for (dep, range) in &manifest.dependencies {
                    let (child, created) = self.create(Some(node), dep, range, None);
                    if created {
                        tracing::debug!(
                            package = %dep,
                            parent = %node.name(),
                            external = child.is_external(),
                            "discovered"
                        );
                        next.push(child);
                    }
                    children.push(dep.clone());
                }
                node.set_dependencies(children);
            }

            wave = next;
        }

        self.registry.remove(ROOT_NAME);
        tracing::debug!(count = self.registry.len(), "dependency walk complete");
        Ok(self.registry)
    }

    /// `<parent>/node_modules/<name>` when installed there, else the root's.
    fn default_base_path(&self, parent: Option<&PackageNode>, name: &str) -> PathBuf {
        if let Some(parent) = parent {
            let nested = parent.base_path().join(NODE_MODULES).join(name);
            if nested.is_dir() {
                return nested;
            }
        }
        self.root.join(NODE_MODULES).join(name)
    }
}
