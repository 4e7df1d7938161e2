#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::return_self_not_must_use)]

//! Assembles a monorepo's built packages into one umbrella distribution.

pub mod alias;
pub mod assemble;
pub mod compose;
pub mod config;
pub mod copy;
pub mod error;
pub mod manifest;
pub mod node;
pub mod pack;
pub mod rewrite;
pub mod version;
pub mod walker;

pub use alias::AliasTable;
pub use assemble::{assemble, inspect, AssembleOptions, AssembleReport};
pub use compose::{compose, ComposeOptions, Composition};
pub use config::{CollisionPolicy, Config, PackConfig, RuleSpec, CONFIG_FILE};
pub use copy::{copy_libraries, CopyLayout, CopyReport};
pub use error::{codes, Error, Result};
pub use manifest::{read_manifest, Manifest, MANIFEST_FILE};
pub use node::{derive_target_names, Namespace, NodeSummary, PackageNode, ParentRef, TargetNames};
pub use pack::{pack, PackOutcome};
pub use rewrite::{FileSet, PathRewriter, RewriteReport, RewriteRule};
pub use version::VERSION;
pub use walker::{Registry, Walker, ROOT_NAME};
