//! Structural validation of a parsed manifest.
//!
//! Every rule is checked on every node; failures are collected so one run
//! reports all of them.

use crate::node::{Forest, NodeId, SECTION_FILE};

use super::error::{ValidationError, ValidationErrors};
use super::types::{Documentation, NodeSelector};

/// Validate `doc`, whose structure has been loaded into `forest`.
pub fn validate(doc: &Documentation, forest: &Forest) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::new();

    if doc.structure.is_empty() && doc.node_selector.is_none() {
        errs.error(ValidationError::MissingRoot);
    }
    check_section_files(forest, forest.roots(), &mut errs);
    for &root in forest.roots() {
        check_node(forest, root, &mut errs);
    }
    check_selector(doc.node_selector.as_ref(), "/", &mut errs);

    errs.into_result()
}

fn check_selector(selector: Option<&NodeSelector>, under: &str, errs: &mut ValidationErrors) {
    if selector.is_some_and(|s| s.path.is_empty()) {
        errs.error(ValidationError::MissingSelectorPath(under.to_string()));
    }
}

fn check_node(forest: &Forest, id: NodeId, errs: &mut ValidationErrors) {
    let node = &forest[id];
    let full_name = || forest.full_name(id, "/");
    let has_children = !node.children().is_empty();
    let has_sources = !node.source.is_empty() || !node.multi_source.is_empty();

    if node.is_document() && node.source.is_empty() && node.name.is_empty() {
        errs.error(ValidationError::MissingIdentity(full_name()));
    }
    if !node.is_document() && !has_children && node.node_selector.is_none() {
        errs.error(ValidationError::Empty(full_name()));
    }
    if has_sources && (has_children || node.node_selector.is_some()) {
        errs.error(ValidationError::CategoryConflict(full_name()));
    }
    if node.node_selector.is_some() {
        check_selector(node.node_selector.as_ref(), &full_name(), errs);
    }
    if has_children {
        check_section_files(forest, node.children(), errs);
        for &child in node.children() {
            check_node(forest, child, errs);
        }
    }
    for (position, source) in node.multi_source.iter().enumerate() {
        if source.is_empty() {
            errs.error(ValidationError::EmptyMultiSource {
                node: full_name(),
                position,
            });
        }
    }
}

/// At most one peer marked `index: true`, at most one named `_index.md`,
/// and never both.
fn check_section_files(forest: &Forest, peers: &[NodeId], errs: &mut ValidationErrors) {
    let mut marked = Vec::new();
    let mut named = Vec::new();
    for &id in peers {
        let node = &forest[id];
        if !node.is_document() {
            continue;
        }
        if node.is_marked_index() {
            marked.push(forest.full_name(id, "/"));
        } else if node.name == SECTION_FILE || node.name == "_index" {
            named.push(forest.full_name(id, "/"));
        }
    }

    if marked.len() > 1 {
        errs.error(ValidationError::MultipleIndex(marked.clone()));
    }
    if named.len() > 1 {
        errs.error(ValidationError::MultipleSectionFiles(named.clone()));
    }
    if marked.len() == 1 && !named.is_empty() {
        errs.error(ValidationError::IndexConflict {
            index: marked.swap_remove(0),
            peers: named,
        });
    }
}
