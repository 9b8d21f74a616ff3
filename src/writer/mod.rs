//! Output materialization.
//!
//! A [`Writer`] stores blobs under a root. Where a document lands is
//! decided by [`Layout`], which knows the Hugo section conventions:
//!
//! ```text
//! docs/guide/setup.md          document
//! docs/guide/README.md   ──►   docs/guide/_index.md    (index file, Hugo)
//! docs/guide/                  docs/guide/_index.md    (container front-matter)
//! ```
//!
//! - [`fs`]: writes below a directory
//! - [`dry_run`]: records writes and prints the projected tree

pub mod dry_run;
pub mod fs;

pub use dry_run::DryRunWriter;
pub use fs::FsWriter;

use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::types::Properties;
use crate::markdown::FrontMatterError;
use crate::markdown::frontmatter;
use crate::node::{Forest, NodeId, SECTION_FILE, is_index_file};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("error writing {0}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("cannot render front-matter of {0}")]
    FrontMatter(String, #[source] FrontMatterError),
}

/// Blob sink addressed by a slash path relative to the writer's root.
pub trait Writer: Send + Sync {
    fn write(&self, name: &str, path: &str, content: &[u8]) -> Result<(), WriteError>;
}

/// Target of a node inside the destination tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Slash path of the directory, empty for the root.
    pub path: String,
    pub name: String,
}

/// Maps nodes to their on-disk location.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub hugo: bool,
    pub index_file_names: Vec<String>,
}

impl Layout {
    pub fn new(hugo: bool, index_file_names: Vec<String>) -> Self {
        Self {
            hugo,
            index_file_names,
        }
    }

    /// Where document `id` is written.
    ///
    /// In Hugo mode documents marked `index: true` or named like an index
    /// file become the section file of their directory.
    pub fn document(&self, forest: &Forest, id: NodeId) -> Target {
        let node = &forest[id];
        let path = forest.path(id, "/");
        let name = if self.hugo
            && (node.is_marked_index() || is_index_file(&node.name, &self.index_file_names))
        {
            SECTION_FILE.to_string()
        } else {
            node.name.clone()
        };
        Target { path, name }
    }

    /// Section file of container `id`, carrying only its front-matter.
    ///
    /// `None` outside Hugo mode, for containers without front-matter and
    /// for containers that already hold a section document.
    pub fn section(&self, forest: &Forest, id: NodeId) -> Option<(Target, Properties)> {
        let node = &forest[id];
        if !self.hugo || node.is_document() {
            return None;
        }
        let fm = node.frontmatter()?;
        let has_section = forest.children(id).iter().any(|&c| {
            forest[c].is_document() && self.document(forest, c).name == SECTION_FILE
        });
        if has_section {
            return None;
        }
        let target = Target {
            path: forest.full_name(id, "/"),
            name: SECTION_FILE.to_string(),
        };
        Some((target, fm.clone()))
    }
}

/// Document bytes: the front-matter block (when not empty) and the body.
pub fn render(front_matter: &Properties, body: &str, node: &str) -> Result<Vec<u8>, WriteError> {
    let fm = frontmatter::render(front_matter)
        .map_err(|e| WriteError::FrontMatter(node.to_string(), e))?;
    Ok(frontmatter::insert(&fm, body).into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use serde_json::json;

    fn tree() -> (Forest, NodeId, NodeId, NodeId) {
        let mut forest = Forest::new();
        let docs = forest.insert(Node::container("docs"));
        let guide = forest.insert(Node::container("guide"));
        let readme = forest.insert(Node::document("README.md", "mem://README.md"));
        let setup = forest.insert(Node::document("setup.md", "mem://setup.md"));
        forest.append_child(docs, guide);
        forest.append_child(guide, readme);
        forest.append_child(guide, setup);
        forest.push_root(docs);
        (forest, guide, readme, setup)
    }

    #[test]
    fn test_document_target() {
        let (forest, _, readme, setup) = tree();
        let plain = Layout::new(false, vec!["readme.md".into()]);
        assert_eq!(
            plain.document(&forest, readme),
            Target {
                path: "docs/guide".into(),
                name: "README.md".into()
            }
        );

        let hugo = Layout::new(true, vec!["readme.md".into()]);
        assert_eq!(hugo.document(&forest, readme).name, SECTION_FILE);
        assert_eq!(hugo.document(&forest, setup).name, "setup.md");
    }

    #[test]
    fn test_marked_index_becomes_section_file() {
        let (mut forest, _, _, setup) = tree();
        forest[setup].properties = json!({ "index": true }).as_object().cloned().unwrap();
        let hugo = Layout::new(true, vec![]);
        assert_eq!(hugo.document(&forest, setup).name, SECTION_FILE);
    }

    #[test]
    fn test_container_section() {
        let (mut forest, guide, _, _) = tree();
        let docs = forest.parent(guide).unwrap();
        forest[docs].properties = json!({ "frontmatter": { "title": "Docs" } })
            .as_object()
            .cloned()
            .unwrap();
        forest[guide].properties = forest[docs].properties.clone();

        let hugo = Layout::new(true, vec!["readme.md".into()]);
        let (target, fm) = hugo.section(&forest, docs).unwrap();
        assert_eq!(target.path, "docs");
        assert_eq!(target.name, SECTION_FILE);
        assert_eq!(fm["title"], "Docs");

        // README.md is promoted, so guide already has a section file.
        assert!(hugo.section(&forest, guide).is_none());
        assert!(Layout::new(false, vec![]).section(&forest, docs).is_none());
    }

    #[test]
    fn test_render() {
        let mut fm = Properties::new();
        assert_eq!(render(&fm, "", "x").unwrap(), b"");
        assert_eq!(render(&fm, "# A\n", "x").unwrap(), b"# A\n");
        fm.insert("title".into(), "A".into());
        assert_eq!(render(&fm, "body", "x").unwrap(), b"---\ntitle: A\n---\nbody");
    }
}
