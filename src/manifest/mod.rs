//! Manifest parsing.
//!
//! A manifest goes through these steps before the resolver sees it:
//!
//! ```text
//! bytes ──► template ──► YAML ──► Forest ──► validate ──► names ──► collisions
//!          (minijinja)  (serde)            (all errors)  ($name)   (per container)
//! ```
//!
//! The returned [`Documentation`] carries resolved document names, so
//! parsing its serialized form again yields the same structure.

pub mod collision;
pub mod error;
pub mod template;
pub mod types;
pub mod validate;
pub mod versions;

pub use collision::NameOptions;
pub use error::{ManifestError, ValidationError, ValidationErrors};
pub use types::{Documentation, NodeDef, NodeSelector};

use std::collections::BTreeMap;

use crate::config::Config;
use crate::debug;
use crate::node::Forest;

/// Everything a manifest parse depends on besides the content.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Template variables, including the reserved `versions`.
    pub variables: BTreeMap<String, String>,
    pub names: NameOptions,
}

impl ParseOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            variables: config.template_variables(),
            names: NameOptions {
                hugo: config.hugo.enabled,
                content_formats: config.content_formats(),
            },
        }
    }
}

/// Repository facts a templated manifest may refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestMetadata {
    /// Default branch of the repository holding the manifest.
    pub branch: String,
    pub tags: Vec<String>,
}

impl Default for ManifestMetadata {
    fn default() -> Self {
        Self {
            branch: "master".to_string(),
            tags: Vec::new(),
        }
    }
}

/// Parse manifest `content`.
pub fn parse(content: &str, opts: &ParseOptions) -> Result<Documentation, ManifestError> {
    let rendered = template::render(content, &opts.variables)?;
    let mut doc: Documentation = if rendered.trim().is_empty() {
        Documentation::default()
    } else {
        serde_yaml::from_str(&rendered)?
    };

    let mut forest = Forest::from_defs(&doc.structure);
    validate::validate(&doc, &forest).map_err(ManifestError::Validation)?;

    let roots = forest.roots().to_vec();
    collision::resolve_names(&mut forest, &roots, &opts.names);
    collision::check_collisions(&forest).into_result()?;

    doc.structure = forest.to_defs();
    Ok(doc)
}

/// Parse the manifest found at `uri`, exposing the target branch and the
/// last N version tags as the `versions` template variable.
pub fn parse_with_metadata(
    content: &str,
    uri: &str,
    metadata: &ManifestMetadata,
    config: &Config,
) -> Result<Documentation, ManifestError> {
    let branch = versions::choose_target_branch(
        uri,
        &config.version_flags,
        &config.versions,
        &metadata.branch,
    );
    let n = versions::choose_n_versions(uri, &config.version_flags, &config.versions);
    let tags = versions::last_n_versions(&metadata.tags, n)?;

    let mut all = Vec::with_capacity(tags.len() + 1);
    all.push(branch);
    all.extend(tags);
    let joined = all.join(",");
    debug!("manifest"; "{uri}: versions = {joined}");

    let mut opts = ParseOptions::from_config(config);
    opts.variables.insert(template::VERSIONS_VAR.to_string(), joined);
    parse(content, &opts)
}

/// Render `doc` as manifest YAML.
pub fn serialize(doc: &Documentation) -> Result<String, ManifestError> {
    Ok(serde_yaml::to_string(doc)?)
}
