//! Artifact copier: materializes internal packages in the output tree.

use crate::config::PackConfig;
use crate::error::{Error, Result};
use crate::node::PackageNode;
use foldpack_util::fs::{atomic_write, copy_dir_all, read_to_string_lossy};
use futures::future::try_join_all;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File and folder names the copier works with.
#[derive(Debug, Clone)]
pub struct CopyLayout {
    /// Build-output folder inside every package.
    pub build_dir: String,
    /// Package-level global declaration file, next to the manifest.
    pub global_types: String,
    /// Entry-point declaration file that references the global one.
    pub entry_types: String,
}

impl From<&PackConfig> for CopyLayout {
    fn from(config: &PackConfig) -> Self {
        Self {
            build_dir: config.build_dir.clone(),
            global_types: config.global_types.clone(),
            entry_types: config.entry_types.clone(),
        }
    }
}

/// What was copied for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    pub package: String,
    pub folder: String,
    pub files: usize,
    pub global_types: bool,
}

impl PackageNode {
    /// Copy the build output to `<dest_root>/<target folder>`.
    ///
    /// When the package ships a global declaration file it is copied into the
    /// same folder and the entry declaration's `../<global>` reference is
    /// pointed at `./<global>`.
    pub fn copy_to(&self, dest_root: &Path, layout: &CopyLayout) -> Result<CopyReport> {
        let folder = self.target_folder_name().ok_or_else(|| {
            Error::Precondition(format!("{} is external and is not copied", self.name()))
        })?;

        let build_dir = self.base_path().join(&layout.build_dir);
        if !build_dir.is_dir() {
            return Err(Error::not_found("build output", build_dir));
        }

        let target = dest_root.join(folder);
        let files = copy_dir_all(&build_dir, &target)
            .map_err(|e| Error::io("failed to copy build output", &target, e))?;

        let global = self.base_path().join(&layout.global_types);
        let has_global = global.is_file();
        if has_global {
            let global_target = target.join(&layout.global_types);
            std::fs::copy(&global, &global_target)
                .map_err(|e| Error::io("failed to copy global types", &global_target, e))?;
            fix_global_reference(&target.join(&layout.entry_types), &layout.global_types)?;
        }

        tracing::debug!(package = %self.name(), folder, files, "copied");
        Ok(CopyReport {
            package: self.name().to_string(),
            folder: folder.to_string(),
            files,
            global_types: has_global,
        })
    }
}

/// Copy every library concurrently. Libraries write to disjoint folders.
pub async fn copy_libraries(
    libraries: &[Arc<PackageNode>],
    dest_root: &Path,
    layout: &CopyLayout,
) -> Result<Vec<CopyReport>> {
    let jobs = libraries.iter().map(|lib| {
        let lib = Arc::clone(lib);
        let dest_root = dest_root.to_path_buf();
        let layout = layout.clone();
        async move {
            let name = lib.name().to_string();
            tokio::task::spawn_blocking(move || lib.copy_to(&dest_root, &layout))
                .await
                .map_err(|e| Error::io("copy task failed", PathBuf::from(name), io::Error::other(e)))?
        }
    });

    try_join_all(jobs).await
}

/// Replace `../<global>` with `./<global>` in the entry declaration file.
fn fix_global_reference(entry: &Path, global: &str) -> Result<()> {
    if !entry.is_file() {
        tracing::warn!(path = %entry.display(), "no entry declaration to point at {global}");
        return Ok(());
    }

    let content = read_to_string_lossy(entry)
        .map_err(|e| Error::io("failed to read entry declaration", entry, e))?;
    let from = format!("../{global}");
    if !content.contains(&from) {
        return Ok(());
    }

    let fixed = content.replace(&from, &format!("./{global}"));
    atomic_write(entry, fixed.as_bytes())
        .map_err(|e| Error::io("failed to write entry declaration", entry, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasTable;
    use crate::node::Namespace;
    use std::fs;
    use tempfile::tempdir;

    fn layout() -> CopyLayout {
        CopyLayout::from(&PackConfig::default())
    }

    fn library(base: &Path, name: &str) -> PackageNode {
        let table = AliasTable::new([
            ("@scope/core", "acme/core"),
            ("@scope/filter-bloom", "acme/filter/bloom"),
        ])
        .unwrap();
        PackageNode::new(
            None,
            name,
            "7.0.0",
            base.to_path_buf(),
            &Namespace::new("@scope/", None, "acme"),
            &table,
        )
    }

    #[test]
    fn test_copy_to_target_folder() {
        let pkg = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::create_dir_all(pkg.path().join("lib/esm")).unwrap();
        fs::write(pkg.path().join("lib/index.js"), "export {}").unwrap();
        fs::write(pkg.path().join("lib/esm/index.mjs"), "export {}").unwrap();

        let report = library(pkg.path(), "@scope/filter-bloom")
            .copy_to(out.path(), &layout())
            .unwrap();

        assert_eq!(report.folder, "filter-bloom");
        assert_eq!(report.files, 2);
        assert!(!report.global_types);
        assert!(out.path().join("filter-bloom/esm/index.mjs").is_file());
    }

    #[test]
    fn test_global_types_reference_fixed_in_entry_only() {
        let pkg = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::create_dir_all(pkg.path().join("lib")).unwrap();
        fs::write(pkg.path().join("global.d.ts"), "declare namespace Acme {}").unwrap();
        fs::write(
            pkg.path().join("lib/index.d.ts"),
            "/// <reference path=\"../global.d.ts\" />\nexport * from './core';\n",
        )
        .unwrap();
        fs::write(
            pkg.path().join("lib/core.d.ts"),
            "/// <reference path=\"../global.d.ts\" />\n",
        )
        .unwrap();

        let report = library(pkg.path(), "@scope/core")
            .copy_to(out.path(), &layout())
            .unwrap();
        assert!(report.global_types);

        let target = out.path().join("core");
        assert!(target.join("global.d.ts").is_file());
        assert_eq!(
            fs::read_to_string(target.join("index.d.ts")).unwrap(),
            "/// <reference path=\"./global.d.ts\" />\nexport * from './core';\n"
        );
        assert_eq!(
            fs::read_to_string(target.join("core.d.ts")).unwrap(),
            "/// <reference path=\"../global.d.ts\" />\n"
        );
    }

    #[test]
    fn test_missing_build_output() {
        let pkg = tempdir().unwrap();
        let out = tempdir().unwrap();
        let err = library(pkg.path(), "@scope/core")
            .copy_to(out.path(), &layout())
            .unwrap_err();
        assert_eq!(err.code(), crate::error::codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_copy_libraries_concurrently() {
        let core = tempdir().unwrap();
        let bloom = tempdir().unwrap();
        let out = tempdir().unwrap();
        for dir in [core.path(), bloom.path()] {
            fs::create_dir_all(dir.join("lib")).unwrap();
            fs::write(dir.join("lib/index.js"), "").unwrap();
        }

        let libraries = vec![
            Arc::new(library(core.path(), "@scope/core")),
            Arc::new(library(bloom.path(), "@scope/filter-bloom")),
        ];
        let reports = copy_libraries(&libraries, out.path(), &layout()).await.unwrap();

        let folders: Vec<_> = reports.iter().map(|r| r.folder.as_str()).collect();
        assert_eq!(folders, vec!["core", "filter-bloom"]);
        assert!(out.path().join("core/index.js").is_file());
        assert!(out.path().join("filter-bloom/index.js").is_file());
    }
}
