//! Path rewriter.
//!
//! Converts references to internal packages into umbrella subpaths with an
//! ordered list of textual pattern/replacement rules. Nothing is parsed:
//! specific conventions come first so the catch-all scope rule cannot
//! pre-empt them, and the final family rules only match whole identifiers
//! so a second pass changes nothing.

use crate::alias::AliasTable;
use crate::config::RuleSpec;
use crate::error::{Error, Result};
use crate::node::{Namespace, TargetNames};
use foldpack_util::fs::{atomic_write, read_to_string_lossy};
use rayon::prelude::*;
use regex_lite::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Convention rules, applied before the catch-all scope rule.
const CONVENTION_RULES: &[(&str, &str)] = &[
    (r"{scope}filter-([\w-]+)", "{umbrella}/filter/${1}"),
    (r"{scope}mixin-([\w-]+)", "{umbrella}/display/${1}"),
    (r"{scope}canvas-([\w-]+)", "{umbrella}/${1}/canvas"),
    (r"{scope}(mesh|graphics|math)-extras", "{umbrella}/${1}/extras"),
];

/// Any remaining scoped reference.
const CATCH_ALL_RULE: (&str, &str) = ("{scope}", "{umbrella}/");

/// One pattern/replacement pair.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    matcher: Matcher,
    replacement: String,
}

#[derive(Debug, Clone)]
enum Matcher {
    Pattern(Regex),
    /// A literal that only matches as a whole package identifier.
    Identifier(String),
}

impl RewriteRule {
    /// Compile a rule. `replacement` may use `${n}` capture references.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|e| {
            Error::ConfigInvalid(format!("invalid rewrite pattern \"{pattern}\": {e}"))
        })?;
        Ok(Self {
            matcher: Matcher::Pattern(compiled),
            replacement: replacement.into(),
        })
    }

    /// Replace `name` wherever it stands alone as a package identifier.
    ///
    /// The neighbours of an occurrence are read from the input, so adjacent
    /// occurrences share their separator. `replacement` is taken literally.
    #[must_use]
    pub fn identifier(name: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::Identifier(name.into()),
            replacement: replacement.into(),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        match &self.matcher {
            Matcher::Pattern(re) => re.as_str(),
            Matcher::Identifier(name) => name,
        }
    }

    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    #[must_use]
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.matcher {
            Matcher::Pattern(re) => re.replace_all(text, self.replacement.as_str()),
            Matcher::Identifier(name) => replace_identifier(text, name, &self.replacement),
        }
    }
}

fn replace_identifier<'t>(text: &'t str, name: &str, replacement: &str) -> Cow<'t, str> {
    if name.is_empty() {
        return Cow::Borrowed(text);
    }

    let mut out = String::new();
    let mut last = 0;
    for (start, _) in text.match_indices(name) {
        let end = start + name.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        let standalone = before.map_or(true, |c| !is_word(c) && c != '@' && c != '/')
            && after.map_or(true, |c| !is_word(c) && c != '/');
        if standalone {
            out.push_str(&text[last..start]);
            out.push_str(replacement);
            last = end;
        }
    }

    if last == 0 {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[last..]);
    Cow::Owned(out)
}

/// Characters that continue a package identifier.
fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Files seen and changed by a rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    pub scanned: usize,
    pub changed: usize,
}

/// Which files a pass touches.
#[derive(Debug, Clone)]
pub struct FileSet {
    /// Extensions without the leading dot.
    pub extensions: Vec<String>,
    /// File names never touched.
    pub ignore: Vec<String>,
}

/// The ordered rule list.
#[derive(Debug, Clone)]
pub struct PathRewriter {
    rules: Vec<RewriteRule>,
}

impl PathRewriter {
    /// Built-in conventions, the catch-all scope rule, then the family rules.
    pub fn builtin(namespace: &Namespace, aliases: &AliasTable) -> Result<Self> {
        let specs: Vec<RuleSpec> = CONVENTION_RULES
            .iter()
            .chain(std::iter::once(&CATCH_ALL_RULE))
            .map(|(pattern, replacement)| RuleSpec {
                pattern: (*pattern).to_string(),
                replacement: (*replacement).to_string(),
            })
            .collect();
        Self::from_specs(&specs, namespace, aliases)
    }

    /// Rules from templates (`{scope}`, `{umbrella}` placeholders), followed
    /// by the family rules derived from `aliases`.
    pub fn from_specs(
        specs: &[RuleSpec],
        namespace: &Namespace,
        aliases: &AliasTable,
    ) -> Result<Self> {
        let scope_pattern = regex_lite::escape(namespace.scope());
        let umbrella_pattern = regex_lite::escape(namespace.umbrella());
        let umbrella_literal = namespace.umbrella().replace('$', "$$");

        let mut rules = Vec::with_capacity(specs.len() + 2);
        for spec in specs {
            let pattern = spec
                .pattern
                .replace("{scope}", &scope_pattern)
                .replace("{umbrella}", &umbrella_pattern);
            let replacement = spec
                .replacement
                .replace("{scope}", namespace.scope())
                .replace("{umbrella}", &umbrella_literal);
            rules.push(RewriteRule::new(&pattern, replacement)?);
        }

        rules.extend(family_rules(namespace, aliases));
        Ok(Self { rules })
    }

    #[must_use]
    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Apply every rule in order.
    #[must_use]
    pub fn rewrite(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.rules {
            let replaced = match rule.apply(&out) {
                Cow::Owned(next) => Some(next),
                Cow::Borrowed(_) => None,
            };
            if let Some(next) = replaced {
                out = next;
            }
        }
        out
    }

    /// Rewrite every matching file below the first level of `root`.
    ///
    /// Top-level files (the manifest, docs) are never touched. Files are
    /// processed in parallel; each file sees the rules in order.
    pub fn rewrite_tree(&self, root: &Path, files: &FileSet) -> Result<RewriteReport> {
        let paths = collect_files(root, files)?;

        let changed: Vec<bool> = paths
            .par_iter()
            .map(|path| self.rewrite_file(path))
            .collect::<Result<_>>()?;

        let report = RewriteReport {
            scanned: paths.len(),
            changed: changed.into_iter().filter(|c| *c).count(),
        };
        tracing::debug!(scanned = report.scanned, changed = report.changed, "rewrite pass");
        Ok(report)
    }

    fn rewrite_file(&self, path: &Path) -> Result<bool> {
        let content =
            read_to_string_lossy(path).map_err(|e| Error::io("failed to read", path, e))?;
        let rewritten = self.rewrite(&content);
        if rewritten == content {
            return Ok(false);
        }
        atomic_write(path, rewritten.as_bytes()).map_err(|e| Error::io("failed to write", path, e))?;
        tracing::trace!(path = %path.display(), "rewritten");
        Ok(true)
    }
}

/// Whole-identifier rules for family names (`acme.js`, `acme.js-legacy`),
/// longest name first.
fn family_rules(namespace: &Namespace, aliases: &AliasTable) -> Vec<RewriteRule> {
    let mut entries: Vec<(&str, TargetNames)> = aliases
        .iter()
        .filter(|(name, _)| namespace.is_family(name))
        .filter_map(|(name, id)| TargetNames::from_export_id(id).map(|t| (name, t)))
        .collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    let umbrella = namespace.umbrella();
    entries
        .into_iter()
        .map(|(name, targets)| {
            RewriteRule::identifier(name, format!("{umbrella}/{}", targets.export_name))
        })
        .collect()
}

fn collect_files(root: &Path, files: &FileSet) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut found = BTreeSet::new();

    for ext in &files.extensions {
        let pattern = format!("{base}/*/**/*.{ext}");
        let entries = glob::glob(&pattern)
            .map_err(|e| Error::ConfigInvalid(format!("invalid file pattern {pattern}: {e}")))?;

        for entry in entries {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                Error::io("failed to scan", path, e.into_error())
            })?;
            let ignored = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| files.ignore.iter().any(|i| i == n));
            if path.is_file() && !ignored {
                found.insert(path);
            }
        }
    }

    Ok(found.into_iter().collect())
}
