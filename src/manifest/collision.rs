//! Document name resolution and sibling collision detection.

use crate::node::{Forest, NodeId, SECTION_FILE};
use crate::utils::hash::unique_token;
use crate::utils::path::resource_name;

use super::error::{Collision, Collisions};

/// Settings that influence the on-disk name of a document.
#[derive(Debug, Clone)]
pub struct NameOptions {
    pub hugo: bool,
    /// Accepted document suffixes, with the leading dot.
    pub content_formats: Vec<String>,
}

impl Default for NameOptions {
    fn default() -> Self {
        Self {
            hugo: false,
            content_formats: vec![".md".to_string()],
        }
    }
}

/// Evaluate the name expression of a document.
///
/// `$name`, `$ext` and `$uuid` expand against the resource named by
/// `source`; an empty name means `$name$ext`. In Hugo mode `index: true`
/// forces [`SECTION_FILE`]. The result always carries a content suffix.
pub fn resolve_document_name(
    name: &str,
    source: &str,
    marked_index: bool,
    opts: &NameOptions,
) -> String {
    let mut resolved = name.to_string();

    if !source.is_empty() {
        if resolved.is_empty() {
            resolved = "$name".to_string();
        }
        if resolved.contains('$') {
            let (stem, ext) = resource_name(source);
            if !ext.is_empty() && !resolved.contains("$ext") {
                resolved.push_str("$ext");
            }
            resolved = resolved
                .replace("$name", &stem)
                .replace("$uuid", &unique_token(source))
                .replace("$ext", &ext);
        }
    }

    if opts.hugo && marked_index {
        resolved = SECTION_FILE.to_string();
    }

    if !opts
        .content_formats
        .iter()
        .any(|suffix| resolved.ends_with(suffix.as_str()))
    {
        resolved.push_str(".md");
    }
    resolved
}

/// Resolve the names of every document below `ids`.
pub fn resolve_names(forest: &mut Forest, ids: &[NodeId], opts: &NameOptions) {
    for &id in ids {
        if forest[id].is_document() {
            let node = &forest[id];
            let name =
                resolve_document_name(&node.name, &node.source, node.is_marked_index(), opts);
            forest[id].name = name;
        } else {
            let children = forest.children(id).to_vec();
            resolve_names(forest, &children, opts);
        }
    }
}

/// Collect every container (and the root list) holding two or more peers
/// with the same name.
pub fn check_collisions(forest: &Forest) -> Collisions {
    let mut collisions = Vec::new();
    collect(forest, forest.roots(), None, &mut collisions);
    Collisions(collisions)
}

fn collect(forest: &Forest, peers: &[NodeId], parent: Option<NodeId>, out: &mut Vec<Collision>) {
    if let Some(collision) = peer_collision(forest, peers, parent) {
        out.push(collision);
    }
    for &id in peers {
        if !forest.children(id).is_empty() {
            collect(forest, forest.children(id), Some(id), out);
        }
    }
}

fn peer_collision(forest: &Forest, peers: &[NodeId], parent: Option<NodeId>) -> Option<Collision> {
    if peers.len() < 2 {
        return None;
    }

    let mut seen = rustc_hash::FxHashSet::default();
    let mut duplicated: Vec<&str> = Vec::new();
    for &id in peers {
        let name = forest[id].name.as_str();
        if !seen.insert(name) && !duplicated.contains(&name) {
            duplicated.push(name);
        }
    }
    if duplicated.is_empty() {
        return None;
    }

    let nodes = duplicated
        .into_iter()
        .map(|name| {
            let sources = peers
                .iter()
                .filter(|&&id| forest[id].name == name)
                .map(|&id| forest[id].sources())
                .collect();
            (name.to_string(), sources)
        })
        .collect();

    Some(Collision {
        parent_path: parent.map_or_else(|| "root".to_string(), |p| forest.full_name(p, ".")),
        nodes,
    })
}
