use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// File name of the project configuration, looked up in the workspace root.
pub const CONFIG_FILE: &str = "foldpack.json";

/// Runtime configuration for the foldpack CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory (the workspace root).
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// What to do when two libraries produce the same export key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Abort the run.
    #[default]
    Error,
    /// Keep the last library's entry.
    Overwrite,
}

/// A user-supplied rewrite rule with `{scope}` and `{umbrella}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    pub replacement: String,
}

/// Project configuration, read from `foldpack.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackConfig {
    /// Internal scope prefix, e.g. `@scope/`.
    pub scope: String,
    /// Umbrella name family; `<family>` and `<family>-*` are internal.
    pub family: Option<String>,
    /// Package providing the umbrella version and the `.` export.
    pub canonical: Option<String>,
    /// Skeleton folder copied into the output.
    pub source: PathBuf,
    /// Output folder.
    pub output: PathBuf,
    /// Alias table document, relative to the skeleton.
    pub alias_file: PathBuf,
    /// Build-output folder inside every package.
    pub build_dir: String,
    pub global_types: String,
    pub entry_types: String,
    /// Extensions of files patched by the rewriter.
    pub extensions: Vec<String>,
    /// File names never patched by the rewriter.
    pub ignore: Vec<String>,
    pub pack_command: Vec<String>,
    pub on_export_collision: CollisionPolicy,
    pub rules: Option<Vec<RuleSpec>>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            scope: String::new(),
            family: None,
            canonical: None,
            source: PathBuf::from("src"),
            output: PathBuf::from("dist"),
            alias_file: PathBuf::from("aliases.json"),
            build_dir: "lib".to_string(),
            global_types: "global.d.ts".to_string(),
            entry_types: "index.d.ts".to_string(),
            extensions: ["mjs", "js", "ts", "map"].map(String::from).to_vec(),
            ignore: ["package.json", "README.md"].map(String::from).to_vec(),
            pack_command: ["npm", "pack"].map(String::from).to_vec(),
            on_export_collision: CollisionPolicy::default(),
            rules: None,
        }
    }
}

impl PackConfig {
    /// Load `foldpack.json` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse { path, source })
    }

    /// Set the internal scope prefix.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the umbrella name family.
    #[must_use]
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    /// Set the canonical package.
    #[must_use]
    pub fn with_canonical(mut self, canonical: impl Into<String>) -> Self {
        self.canonical = Some(canonical.into());
        self
    }

    /// Set the output folder.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Name of the package that provides the umbrella version and root export.
    #[must_use]
    pub fn canonical_name(&self) -> Option<&str> {
        self.canonical.as_deref().or(self.family.as_deref())
    }

    /// Check values that have no usable default.
    pub fn validate(&self) -> Result<()> {
        if self.scope.is_empty() {
            return Err(Error::ConfigInvalid(
                "`scope` is required (e.g. \"@scope/\")".to_string(),
            ));
        }
        if !self.scope.ends_with('/') {
            return Err(Error::ConfigInvalid(format!(
                "`scope` must end with '/', got \"{}\"",
                self.scope
            )));
        }
        if self.canonical_name().is_none() {
            return Err(Error::ConfigInvalid(
                "one of `canonical` or `family` is required".to_string(),
            ));
        }
        if self.pack_command.is_empty() {
            return Err(Error::ConfigInvalid("`packCommand` is empty".to_string()));
        }
        if self.build_dir.is_empty() || self.build_dir.contains('/') {
            return Err(Error::ConfigInvalid(format!(
                "`buildDir` must be a single folder name, got \"{}\"",
                self.build_dir
            )));
        }
        self.validate_output()
    }

    /// The output folder is cleared on every run, so it must be a plain
    /// relative path that does not cover the workspace root or the skeleton.
    fn validate_output(&self) -> Result<()> {
        let plain = |path: &Path| {
            path.components().next().is_some()
                && path.components().all(|c| matches!(c, Component::Normal(_)))
        };

        if !plain(&self.output) {
            return Err(Error::ConfigInvalid(format!(
                "`output` must be a relative folder below the workspace root, got \"{}\"",
                self.output.display()
            )));
        }
        if self.source.starts_with(&self.output) || self.output.starts_with(&self.source) {
            return Err(Error::ConfigInvalid(format!(
                "`output` \"{}\" overlaps the skeleton folder \"{}\"",
                self.output.display(),
                self.source.display()
            )));
        }
        Ok(())
    }
}
