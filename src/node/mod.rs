//! Documentation node tree.
//!
//! Nodes live in a [`Forest`] arena and refer to each other by [`NodeId`].
//! The parent link is a relation kept next to the child lists, never
//! ownership, so trees can be re-parented and merged freely while the
//! manifest is resolved. Once resolution finishes the forest is shared
//! read-only with the workers.
//!
//! - [`path`]: parents, paths and the relative-path algebra used by links
//! - [`merge`]: union of sibling sets and removal of empty containers

pub mod merge;
pub mod path;

use serde_json::Value;

use crate::manifest::types::{
    ContentSelector, Links, NodeDef, NodeSelector, Properties, Template,
};

/// Property key carrying front-matter defaults for a document.
pub const FRONTMATTER_PROPERTY: &str = "frontmatter";
/// Property key marking the section index of a container.
pub const INDEX_PROPERTY: &str = "index";
/// Hugo section file name.
pub const SECTION_FILE: &str = "_index.md";

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("invalid merge: node `{0}` is a document and cannot hold children")]
    InvalidMerge(String),
}

/// Index of a node inside its [`Forest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A resolution statistic attached to a node (e.g. selector expansion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub title: String,
    pub figures: String,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub source: String,
    pub multi_source: Vec<String>,
    pub content_selectors: Vec<ContentSelector>,
    pub template: Option<Template>,
    pub node_selector: Option<NodeSelector>,
    pub properties: Properties,
    pub links: Option<Links>,
    /// Resource container a selector-created container was built from.
    pub source_location: String,
    pub stats: Vec<Stat>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// A leaf node from its serialized form; child definitions are ignored.
    pub fn from_def(def: &NodeDef) -> Self {
        Self {
            name: def.name.clone(),
            source: def.source.clone(),
            multi_source: def.multi_source.clone(),
            content_selectors: def.content_selectors.clone(),
            template: def.template.clone(),
            node_selector: def.node_selector.clone(),
            properties: def.properties.clone(),
            links: def.links.clone(),
            ..Default::default()
        }
    }

    pub fn document(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_document(&self) -> bool {
        !self.source.is_empty()
            || !self.multi_source.is_empty()
            || !self.content_selectors.is_empty()
            || self.template.is_some()
    }

    /// `source`, or the comma-joined multi-source list.
    pub fn sources(&self) -> String {
        if !self.source.is_empty() {
            self.source.clone()
        } else {
            self.multi_source.join(",")
        }
    }

    /// Front-matter defaults declared on the node.
    pub fn frontmatter(&self) -> Option<&Properties> {
        self.properties
            .get(FRONTMATTER_PROPERTY)
            .and_then(Value::as_object)
    }

    /// Carries `index: true`.
    pub fn is_marked_index(&self) -> bool {
        self.properties
            .get(INDEX_PROPERTY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// True when `name` is the Hugo section file or one of the configured
/// index file names (case-insensitive).
pub fn is_index_file(name: &str, index_file_names: &[String]) -> bool {
    name == SECTION_FILE
        || index_file_names
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(name))
}

// ============================================================================
// Forest
// ============================================================================

/// Arena of nodes with an ordered list of roots.
///
/// Detached nodes (no parent, not a root) may exist while a subtree is
/// being assembled or after it has been removed; they are unreachable from
/// [`Forest::roots`] and ignored by every traversal.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl std::ops::Index<NodeId> for Forest {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl std::ops::IndexMut<NodeId> for Forest {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load serialized roots, wiring every parent relation on the way down.
    pub fn from_defs(defs: &[NodeDef]) -> Self {
        let mut forest = Self::new();
        for def in defs {
            let id = forest.insert_def(def);
            forest.roots.push(id);
        }
        forest
    }

    /// Allocate a detached subtree for `def`.
    pub fn insert_def(&mut self, def: &NodeDef) -> NodeId {
        let id = self.insert(Node::from_def(def));
        for child in &def.nodes {
            let child_id = self.insert_def(child);
            self.append_child(id, child_id);
        }
        id
    }

    /// Allocate a detached node.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn push_root(&mut self, id: NodeId) {
        self[id].parent = None;
        self.roots.push(id);
    }

    pub fn set_roots(&mut self, roots: Vec<NodeId>) {
        for &id in &roots {
            self[id].parent = None;
        }
        self.roots = roots;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    /// Set only the parent relation; child lists are left untouched.
    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self[id].parent = parent;
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    /// Append `child` under `parent` and point it back.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self[child].parent = Some(parent);
        self[parent].children.push(child);
    }

    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            self[child].parent = Some(parent);
        }
        self[parent].children = children;
    }

    /// Detach `child` from `parent`. Returns whether it was a child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let children = &mut self[parent].children;
        match children.iter().position(|&c| c == child) {
            Some(pos) => {
                children.remove(pos);
                self[child].parent = None;
                true
            }
            None => false,
        }
    }

    /// Remove `id` from its parent or from the roots.
    pub fn detach(&mut self, id: NodeId) {
        match self[id].parent {
            Some(parent) => {
                self.remove_child(parent, id);
            }
            None => self.roots.retain(|&r| r != id),
        }
    }

    /// Re-derive the parent field of every descendant from the child lists.
    pub fn set_parents_downwards(&mut self, id: NodeId) {
        let children = self[id].children.clone();
        for child in children {
            self[child].parent = Some(id);
            self.set_parents_downwards(child);
        }
    }

    /// Pre-order walk of the subtree at `id`, including `id`.
    pub fn walk(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self[current].children.iter().rev());
        }
        out
    }

    /// Pre-order walk of every reachable node.
    pub fn walk_all(&self) -> Vec<NodeId> {
        self.roots.iter().flat_map(|&r| self.walk(r)).collect()
    }

    /// Reachable document nodes in pre-order.
    pub fn documents(&self) -> Vec<NodeId> {
        self.walk_all()
            .into_iter()
            .filter(|&id| self[id].is_document())
            .collect()
    }

    /// Peer of `id`'s children named `name`.
    pub fn find_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self[id]
            .children
            .iter()
            .copied()
            .find(|&c| self[c].name == name)
    }

    /// Serialize the subtree at `id`.
    pub fn to_def(&self, id: NodeId) -> NodeDef {
        let node = &self[id];
        NodeDef {
            name: node.name.clone(),
            source: node.source.clone(),
            multi_source: node.multi_source.clone(),
            content_selectors: node.content_selectors.clone(),
            template: node.template.clone(),
            nodes: node.children.iter().map(|&c| self.to_def(c)).collect(),
            node_selector: node.node_selector.clone(),
            properties: node.properties.clone(),
            links: node.links.clone(),
        }
    }

    pub fn to_defs(&self) -> Vec<NodeDef> {
        self.roots.iter().map(|&r| self.to_def(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Forest {
        let yaml = r#"
- name: docs
  nodes:
    - name: guide
      nodes:
        - source: https://x/a.md
          name: a.md
    - name: README.md
      source: https://x/README.md
      properties:
        index: true
        frontmatter:
          title: Docs
"#;
        let defs: Vec<NodeDef> = serde_yaml::from_str(yaml).unwrap();
        Forest::from_defs(&defs)
    }

    #[test]
    fn test_from_defs_sets_parents() {
        let forest = sample();
        let docs = forest.roots()[0];
        assert_eq!(forest.parent(docs), None);
        for &child in forest.children(docs) {
            assert_eq!(forest.parent(child), Some(docs));
        }
        let guide = forest.find_child(docs, "guide").unwrap();
        let a = forest.children(guide)[0];
        assert_eq!(forest.parent(a), Some(guide));
    }

    #[test]
    fn test_to_defs_roundtrip() {
        let forest = sample();
        let again = Forest::from_defs(&forest.to_defs());
        assert_eq!(forest.to_defs(), again.to_defs());
    }

    #[test]
    fn test_node_properties() {
        let forest = sample();
        let docs = forest.roots()[0];
        let readme = forest.find_child(docs, "README.md").unwrap();
        assert!(forest[readme].is_marked_index());
        assert_eq!(
            forest[readme].frontmatter().unwrap()["title"],
            Value::String("Docs".into())
        );
        assert!(!forest[docs].is_document());
        assert_eq!(forest.documents().len(), 2);
    }

    #[test]
    fn test_sources() {
        let mut node = Node::container("multi.md");
        node.multi_source = vec!["https://x/a.md".into(), "https://x/b.md".into()];
        assert!(node.is_document());
        assert_eq!(node.sources(), "https://x/a.md,https://x/b.md");
    }

    #[test]
    fn test_remove_child_and_detach() {
        let mut forest = sample();
        let docs = forest.roots()[0];
        let guide = forest.find_child(docs, "guide").unwrap();
        assert!(forest.remove_child(docs, guide));
        assert!(!forest.remove_child(docs, guide));
        assert_eq!(forest.parent(guide), None);

        forest.detach(docs);
        assert!(forest.roots().is_empty());
    }

    #[test]
    fn test_set_parents_downwards_repairs_relations() {
        let mut forest = sample();
        let docs = forest.roots()[0];
        let guide = forest.find_child(docs, "guide").unwrap();
        let a = forest.children(guide)[0];
        forest.set_parent(a, None);
        forest.set_parents_downwards(docs);
        assert_eq!(forest.parent(a), Some(guide));
    }

    #[test]
    fn test_is_index_file() {
        let names = vec!["readme.md".to_string(), "README.md".to_string()];
        assert!(is_index_file("_index.md", &names));
        assert!(is_index_file("Readme.MD", &names));
        assert!(!is_index_file("index.md", &names));
    }
}
