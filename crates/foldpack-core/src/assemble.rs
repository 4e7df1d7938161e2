//! The assembly pipeline.
//!
//! walk -> compose -> write manifest -> copy libraries -> rewrite -> pack.
//! Any failure aborts the run and leaves the output tree as it is.

use crate::alias::AliasTable;
use crate::compose::{compose, ComposeOptions};
use crate::config::PackConfig;
use crate::copy::{copy_libraries, CopyLayout, CopyReport};
use crate::error::{Error, Result};
use crate::manifest::{read_document, write_document, MANIFEST_FILE};
use crate::node::{Namespace, NodeSummary, PackageNode};
use crate::pack::{pack, PackOutcome};
use crate::rewrite::{FileSet, PathRewriter, RewriteReport};
use crate::walker::{Registry, Walker};
use foldpack_util::fs::{copy_dir_all, remove_dir_if_exists};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Switches for one run.
#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    /// Compose the manifest only; leave the output directory alone.
    pub dry_run: bool,
    /// Run the packaging command at the end.
    pub pack: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            pack: true,
        }
    }
}

/// Summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct AssembleReport {
    pub name: String,
    pub version: String,
    pub output: PathBuf,
    pub dry_run: bool,
    /// Number of packages in the registry.
    pub packages: usize,
    pub dependencies: BTreeMap<String, String>,
    pub files: Vec<String>,
    /// The composed umbrella manifest.
    pub manifest: Map<String, Value>,
    pub copied: Vec<CopyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<RewriteReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack: Option<PackOutcome>,
}

/// Base manifest, alias table and namespace read from a skeleton folder.
struct Skeleton {
    base: Map<String, Value>,
    aliases: AliasTable,
    namespace: Namespace,
}

impl Skeleton {
    fn read(dir: &Path, config: &PackConfig) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let base = read_document(&manifest_path)?;
        let umbrella = base
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::not_found("\"name\" in base manifest", &manifest_path))?
            .to_string();

        let aliases = AliasTable::load(&dir.join(&config.alias_file))?;
        let namespace = Namespace::new(config.scope.clone(), config.family.clone(), umbrella);

        Ok(Self {
            base,
            aliases,
            namespace,
        })
    }
}

fn skeleton_dir(root: &Path, config: &PackConfig) -> Result<PathBuf> {
    let dir = root.join(&config.source);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(Error::not_found("skeleton folder", dir))
    }
}

/// Refuse to clear `output` when it resolves to, or above, a protected folder.
///
/// Catches symlinked output folders that pass the lexical check in
/// `PackConfig::validate`.
fn ensure_clearable(output: &Path, protected: &[&Path]) -> Result<()> {
    let target = match dunce::canonicalize(output) {
        Ok(path) => path,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io("failed to resolve output directory", output, e)),
    };

    for dir in protected {
        let resolved = dunce::canonicalize(dir)
            .map_err(|e| Error::io("failed to resolve directory", *dir, e))?;
        if resolved.starts_with(&target) {
            return Err(Error::ConfigInvalid(format!(
                "output directory {} contains {}; refusing to clear it",
                target.display(),
                resolved.display()
            )));
        }
    }
    Ok(())
}

/// Walk the workspace without writing anything and describe every node.
pub async fn inspect(root: &Path, config: &PackConfig) -> Result<Vec<NodeSummary>> {
    config.validate()?;
    let skeleton = Skeleton::read(&skeleton_dir(root, config)?, config)?;
    let registry = Walker::new(root, &skeleton.namespace, &skeleton.aliases)
        .walk()
        .await?;
    Ok(registry.nodes().iter().map(|n| n.summary()).collect())
}

/// Assemble the umbrella package for the workspace at `root`.
pub async fn assemble(
    root: &Path,
    config: &PackConfig,
    opts: &AssembleOptions,
) -> Result<AssembleReport> {
    config.validate()?;
    let source = skeleton_dir(root, config)?;
    let output = root.join(&config.output);

    let skeleton_at = if opts.dry_run {
        source
    } else {
        info!(output = %output.display(), "creating output directory");
        ensure_clearable(&output, &[root, source.as_path()])?;
        remove_dir_if_exists(&output)
            .map_err(|e| Error::io("failed to clear output directory", &output, e))?;
        copy_dir_all(&source, &output)
            .map_err(|e| Error::io("failed to copy skeleton", &output, e))?;
        output.clone()
    };
    let skeleton = Skeleton::read(&skeleton_at, config)?;

    info!("sourcing packages");
    let registry: Registry = Walker::new(root, &skeleton.namespace, &skeleton.aliases)
        .walk()
        .await?;
    let nodes = registry.nodes();

    let canonical = config
        .canonical_name()
        .ok_or_else(|| Error::ConfigInvalid("no canonical package".to_string()))?;
    let composition = compose(
        &nodes,
        &skeleton.base,
        &ComposeOptions {
            canonical,
            build_dir: &config.build_dir,
            on_collision: config.on_export_collision,
        },
    )?;
    let manifest = composition.apply(&skeleton.base);

    let mut report = AssembleReport {
        name: skeleton.namespace.umbrella().to_string(),
        version: composition.version.clone(),
        output: output.clone(),
        dry_run: opts.dry_run,
        packages: nodes.len(),
        dependencies: composition.dependencies.clone(),
        files: composition.files.clone(),
        manifest,
        copied: Vec::new(),
        rewrite: None,
        pack: None,
    };
    if opts.dry_run {
        return Ok(report);
    }

    info!("writing manifest");
    write_document(&output.join(MANIFEST_FILE), &report.manifest)?;

    info!("copying libraries");
    let libraries: Vec<Arc<PackageNode>> = nodes.into_iter().filter(|n| !n.is_external()).collect();
    report.copied = copy_libraries(&libraries, &output, &CopyLayout::from(config)).await?;

    info!("patching internal package names");
    let rewriter = match &config.rules {
        Some(specs) => PathRewriter::from_specs(specs, &skeleton.namespace, &skeleton.aliases)?,
        None => PathRewriter::builtin(&skeleton.namespace, &skeleton.aliases)?,
    };
    let files = FileSet {
        extensions: config.extensions.clone(),
        ignore: config.ignore.clone(),
    };
    report.rewrite = Some(rewriter.rewrite_tree(&output, &files)?);

    if opts.pack {
        info!("packaging output");
        report.pack = Some(pack(&output, &config.pack_command).await?);
    }

    info!(name = %report.name, version = %report.version, "done");
    Ok(report)
}
