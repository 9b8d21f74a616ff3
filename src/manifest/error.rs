//! Manifest parsing, validation and collision errors.

use owo_colors::OwoColorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("invalid manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // no #[from]: source() would print the list twice
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Collision(Collisions),

    #[error("Error parsing version: {0}")]
    VersionParse(String),

    #[error("n can't be negative")]
    NegativeN,

    #[error(
        "number of tags is greater than the actual number of all tags: wanted - {wanted}, actual - {actual}"
    )]
    NotEnoughVersions { wanted: usize, actual: usize },

    #[error("circular dependency discovered: {0}")]
    Circular(String),

    #[error("IO error when reading manifest `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(
        "the document structure must contains at least one of these properties: structure, nodesSelector"
    )]
    MissingRoot,

    #[error("node {0} must contains at least one of these properties: source, name")]
    MissingIdentity(String),

    #[error(
        "node {0} must contains at least one of these properties: source, nodesSelector, multiSource, nodes"
    )]
    Empty(String),

    #[error(
        "node {0} must be categorized as a document or a container, please specify only one of the following groups of properties: (source/multiSource),(nodes,nodesSelector)"
    )]
    CategoryConflict(String),

    #[error("nodesSelector under {0} must contains a path property")]
    MissingSelectorPath(String),

    #[error("node {node} contains empty multiSource value at position {position}")]
    EmptyMultiSource { node: String, position: usize },

    #[error("property index: true defined for multiple peer nodes: {}", .0.join(","))]
    MultipleIndex(Vec<String>),

    #[error("_index.md defined for multiple peer nodes: {}", .0.join(","))]
    MultipleSectionFiles(Vec<String>),

    #[error("index node {index} collides with peer nodes: {}", .peers.join(","))]
    IndexConflict { index: String, peers: Vec<String> },
}

/// Every validation failure found in one manifest.
#[derive(Debug, Default, Clone)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "manifest validation failed:".red().bold())?;
        for err in &self.errors {
            writeln!(f, "{} {err}", "→".red())?;
        }
        if self.errors.len() > 1 {
            write!(
                f,
                "\n{} {} {}",
                "found".dimmed(),
                self.errors.len().to_string().red().bold(),
                "errors".dimmed()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Collisions
// ============================================================================

/// Peers of one container that resolve to the same file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// Dot-joined names from the root to the container, or `root`.
    pub parent_path: String,
    /// Name -> sources of every peer resolving to it.
    pub nodes: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collisions(pub Vec<Collision>);

impl Collisions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ManifestError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Collision(self))
        }
    }
}

impl fmt::Display for Collisions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Node collisions detected.")?;
        for collision in &self.0 {
            write!(f, "\nIn {} container node.", collision.parent_path)?;
            for (name, sources) in &collision.nodes {
                write!(
                    f,
                    " Node with name {name} appears {} times for sources: {}.",
                    sources.len(),
                    sources.join(", ")
                )?;
            }
        }
        Ok(())
    }
}
