//! End-to-end tests for the assembly pipeline.
//!
//! Each test builds a small workspace with a skeleton folder and an installed
//! `node_modules` tree, then assembles it with packaging disabled.

use foldpack_core::{assemble, codes, inspect, AssembleOptions, PackConfig};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn exports() -> Value {
    json!({".": {
        "import": {"types": "./lib/index.d.ts", "default": "./lib/index.mjs"},
        "require": "./lib/index.js"
    }})
}

/// Two internal packages (`browser` -> `core`) and one external (`left-pad`).
fn create_workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_json(
        &root.join("package.json"),
        &json!({
            "name": "monorepo",
            "private": true,
            "dependencies": {"@scope/browser": "*", "typescript": "^5.0.0"}
        }),
    );
    write_json(&root.join("node_modules/typescript/package.json"), &json!({"name": "typescript"}));

    write_json(
        &root.join("src/package.json"),
        &json!({"name": "acme", "description": "Everything in one package", "license": "MIT"}),
    );
    write_json(
        &root.join("src/aliases.json"),
        &json!({"@scope/core": "acme/core", "@scope/browser": "acme/browser"}),
    );
    write_file(&root.join("src/README.md"), "Import from '@scope/core' no more.\n");

    let browser = root.join("node_modules/@scope/browser");
    write_json(
        &browser.join("package.json"),
        &json!({
            "name": "@scope/browser",
            "version": "7.3.2",
            "dependencies": {"@scope/core": "7.3.2", "left-pad": "^1.0.0"},
            "exports": exports()
        }),
    );
    write_file(
        &browser.join("lib/index.js"),
        "const core = require('@scope/core');\n",
    );
    write_file(&browser.join("lib/index.mjs"), "export * from '@scope/core';\n");
    write_file(
        &browser.join("lib/index.d.ts"),
        "/// <reference path=\"../global.d.ts\" />\nexport * from '@scope/core';\n",
    );
    write_file(&browser.join("global.d.ts"), "declare namespace GlobalMixins {}\n");

    let core = root.join("node_modules/@scope/core");
    write_json(
        &core.join("package.json"),
        &json!({
            "name": "@scope/core",
            "version": "7.3.2",
            "exports": exports()
        }),
    );
    write_file(&core.join("lib/index.js"), "module.exports = {};\n");
    write_file(&core.join("lib/index.mjs"), "export {};\n");
    write_file(
        &core.join("lib/index.js.map"),
        r#"{"version":3,"sources":["../src/index.ts"],"file":"@scope/core"}"#,
    );

    write_json(
        &root.join("node_modules/left-pad/package.json"),
        &json!({"name": "left-pad", "version": "1.3.0"}),
    );

    dir
}

fn config() -> PackConfig {
    PackConfig::default()
        .with_scope("@scope/")
        .with_canonical("@scope/browser")
}

fn no_pack() -> AssembleOptions {
    AssembleOptions {
        dry_run: false,
        pack: false,
    }
}

#[tokio::test]
async fn test_assemble_two_libraries() {
    let ws = create_workspace();
    let report = assemble(ws.path(), &config(), &no_pack()).await.unwrap();

    assert_eq!(report.name, "acme");
    assert_eq!(report.version, "7.3.2");
    assert_eq!(report.files, vec!["browser", "core"]);
    assert_eq!(report.dependencies.len(), 1);
    assert_eq!(report.dependencies["left-pad"], "^1.0.0");

    let written: Value =
        serde_json::from_str(&fs::read_to_string(ws.path().join("dist/package.json")).unwrap())
            .unwrap();
    let exports = written["exports"].as_object().unwrap();
    let keys: Vec<_> = exports.keys().cloned().collect();
    assert_eq!(keys, vec![".", "./browser", "./core"]);
    assert_eq!(exports["."], exports["./browser"]);
    assert_eq!(exports["./core"]["require"], json!("./core/index.js"));
    assert_eq!(written["files"], json!(["browser", "core"]));
    assert_eq!(written["dependencies"], json!({"left-pad": "^1.0.0"}));
    assert_eq!(written["version"], json!("7.3.2"));
    assert_eq!(written["description"], json!("Everything in one package"));
    assert_eq!(written["license"], json!("MIT"));
}

#[tokio::test]
async fn test_assemble_rewrites_references() {
    let ws = create_workspace();
    let report = assemble(ws.path(), &config(), &no_pack()).await.unwrap();
    let dist = ws.path().join("dist");

    assert_eq!(
        fs::read_to_string(dist.join("browser/index.js")).unwrap(),
        "const core = require('acme/core');\n"
    );
    assert_eq!(
        fs::read_to_string(dist.join("browser/index.mjs")).unwrap(),
        "export * from 'acme/core';\n"
    );
    assert_eq!(
        fs::read_to_string(dist.join("core/index.js.map")).unwrap(),
        r#"{"version":3,"sources":["../src/index.ts"],"file":"acme/core"}"#
    );
    // Top-level docs are left alone
    assert_eq!(
        fs::read_to_string(dist.join("README.md")).unwrap(),
        "Import from '@scope/core' no more.\n"
    );

    let rewrite = report.rewrite.unwrap();
    assert_eq!(rewrite.changed, 4);
}

#[tokio::test]
async fn test_assemble_fixes_global_types() {
    let ws = create_workspace();
    assemble(ws.path(), &config(), &no_pack()).await.unwrap();
    let dist = ws.path().join("dist");

    assert!(dist.join("browser/global.d.ts").is_file());
    assert!(!dist.join("core/global.d.ts").exists());
    assert_eq!(
        fs::read_to_string(dist.join("browser/index.d.ts")).unwrap(),
        "/// <reference path=\"./global.d.ts\" />\nexport * from 'acme/core';\n"
    );
}

#[tokio::test]
async fn test_assemble_is_deterministic() {
    let ws = create_workspace();
    assemble(ws.path(), &config(), &no_pack()).await.unwrap();
    let first = fs::read_to_string(ws.path().join("dist/package.json")).unwrap();

    assemble(ws.path(), &config(), &no_pack()).await.unwrap();
    let second = fs::read_to_string(ws.path().join("dist/package.json")).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_dry_run_leaves_output_alone() {
    let ws = create_workspace();
    let opts = AssembleOptions {
        dry_run: true,
        pack: false,
    };
    let report = assemble(ws.path(), &config(), &opts).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.manifest["files"], json!(["browser", "core"]));
    assert!(report.copied.is_empty());
    assert!(!ws.path().join("dist").exists());
}

#[tokio::test]
async fn test_missing_alias_table_aborts() {
    let ws = create_workspace();
    fs::remove_file(ws.path().join("src/aliases.json")).unwrap();

    let err = assemble(ws.path(), &config(), &no_pack()).await.unwrap_err();
    assert_eq!(err.code(), codes::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_missing_build_output_aborts() {
    let ws = create_workspace();
    fs::remove_dir_all(ws.path().join("node_modules/@scope/core/lib")).unwrap();

    let err = assemble(ws.path(), &config(), &no_pack()).await.unwrap_err();
    assert_eq!(err.code(), codes::NOT_FOUND);
}

#[tokio::test]
async fn test_inspect_lists_every_package() {
    let ws = create_workspace();
    let nodes = inspect(ws.path(), &config()).await.unwrap();

    let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["@scope/browser", "@scope/core", "left-pad", "typescript"]
    );
    let core = nodes.iter().find(|n| n.name == "@scope/core").unwrap();
    assert_eq!(core.folder_name.as_deref(), Some("core"));
    assert_eq!(core.parent.as_deref(), Some("@scope/browser"));
}

#[tokio::test]
async fn test_unsafe_output_is_rejected_before_clearing() {
    let ws = create_workspace();
    let outside = tempfile::tempdir().unwrap();
    fs::write(ws.path().join("precious.txt"), "keep me").unwrap();
    fs::write(outside.path().join("precious.txt"), "keep me too").unwrap();

    let shapes = [
        ".".to_string(),
        "..".to_string(),
        "src".to_string(),
        outside.path().display().to_string(),
    ];
    for output in shapes {
        let err = assemble(ws.path(), &config().with_output(&output), &no_pack())
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::CONFIG_INVALID, "output {output:?}");
    }

    assert!(ws.path().join("precious.txt").is_file());
    assert!(ws.path().join("src/aliases.json").is_file());
    assert!(outside.path().join("precious.txt").is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_output_to_workspace_is_not_cleared() {
    let ws = create_workspace();
    fs::write(ws.path().join("precious.txt"), "keep me").unwrap();
    std::os::unix::fs::symlink(ws.path(), ws.path().join("dist")).unwrap();

    let err = assemble(ws.path(), &config(), &no_pack()).await.unwrap_err();

    assert_eq!(err.code(), codes::CONFIG_INVALID);
    assert!(ws.path().join("precious.txt").is_file());
    assert!(ws.path().join("node_modules/@scope/core/lib/index.js").is_file());
}
