//! Merging sibling sets and pruning empty containers.

use super::{Forest, NodeError, NodeId};

impl Forest {
    /// Merge `incoming` nodes into the children of container `id`.
    ///
    /// Same-named peers: two containers merge their children recursively,
    /// any pairing involving a document keeps the existing peer. Properties
    /// of an incoming container that merges into a peer are discarded.
    pub fn union(&mut self, id: NodeId, incoming: &[NodeId]) -> Result<(), NodeError> {
        if self[id].is_document() {
            return Err(NodeError::InvalidMerge(self.full_name(id, "/")));
        }

        for &node in incoming {
            let name = self[node].name.clone();
            let Some(peer) = self.find_child(id, &name) else {
                self.append_child(id, node);
                continue;
            };
            if peer == node {
                continue;
            }

            match (self[peer].is_document(), self[node].is_document()) {
                (false, false) => {
                    if !self[node].properties.is_empty() {
                        crate::log!("warning";
                            "properties of `{}` are dropped when merging into an existing container",
                            self.full_name(peer, "/"));
                    }
                    let children = self[node].children.clone();
                    self[node].children.clear();
                    self.union(peer, &children)?;
                }
                (true, true) => {
                    crate::log!("warning";
                        "document `{}` ({}) collides with `{}`, keeping the existing one",
                        self.full_name(peer, "/"), self[node].sources(), self[peer].sources());
                }
                _ => {
                    crate::log!("warning";
                        "`{}` is declared both as document and container, keeping the existing one",
                        self.full_name(peer, "/"));
                }
            }
        }
        Ok(())
    }

    /// Remove descendant containers that hold no document and no selector.
    ///
    /// `id` itself is kept.
    pub fn cleanup(&mut self, id: NodeId) {
        let children = self[id].children.clone();
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            if self[child].is_document() {
                kept.push(child);
                continue;
            }
            self.cleanup(child);
            if !self[child].children.is_empty() || self[child].node_selector.is_some() {
                kept.push(child);
            } else {
                self.set_parent(child, None);
            }
        }
        self[id].children = kept;
    }

    /// [`Forest::cleanup`] every root and drop roots left empty.
    pub fn cleanup_roots(&mut self) {
        let roots = self.roots().to_vec();
        let mut kept = Vec::with_capacity(roots.len());
        for root in roots {
            if !self[root].is_document() {
                self.cleanup(root);
                if self[root].children.is_empty() && self[root].node_selector.is_none() {
                    continue;
                }
            }
            kept.push(root);
        }
        self.set_roots(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::types::{NodeDef, NodeSelector};
    use crate::node::Node;

    fn forest(yaml: &str) -> Forest {
        let defs: Vec<NodeDef> = serde_yaml::from_str(yaml).unwrap();
        Forest::from_defs(&defs)
    }

    fn snapshot(f: &Forest) -> String {
        serde_yaml::to_string(&f.to_defs()).unwrap()
    }

    #[test]
    fn test_union_appends_and_sets_parent() {
        let mut f = forest("- name: root\n  nodes:\n    - {name: a.md, source: x/a.md}\n");
        let root = f.roots()[0];
        let b = f.insert(Node::document("b.md", "x/b.md"));
        f.union(root, &[b]).unwrap();
        assert_eq!(f.children(root).len(), 2);
        assert_eq!(f.parent(b), Some(root));
    }

    #[test]
    fn test_union_keeps_existing_on_collision() {
        let mut f = forest(
            "- name: root\n  nodes:\n    - {name: a.md, source: x/a.md}\n    - name: sub\n      nodes:\n        - {name: s.md, source: x/s.md}\n",
        );
        let root = f.roots()[0];
        let doc = f.insert(Node::document("a.md", "y/a.md"));
        let as_container = f.insert(Node::container("a.md"));
        let sub_as_doc = f.insert(Node::document("sub", "y/sub.md"));
        f.union(root, &[doc, as_container, sub_as_doc]).unwrap();

        let a = f.find_child(root, "a.md").unwrap();
        assert_eq!(f[a].source, "x/a.md");
        let sub = f.find_child(root, "sub").unwrap();
        assert!(!f[sub].is_document());
        assert_eq!(f.children(root).len(), 2);
    }

    #[test]
    fn test_union_merges_containers_recursively() {
        let mut f = forest(
            "- name: root\n  nodes:\n    - name: sub\n      nodes:\n        - {name: s.md, source: x/s.md}\n",
        );
        let root = f.roots()[0];
        let incoming = f.insert_def(&serde_yaml::from_str::<NodeDef>(
            "name: sub\nproperties: {k: v}\nnodes:\n  - {name: s.md, source: y/s.md}\n  - {name: t.md, source: y/t.md}\n",
        ).unwrap());
        f.union(root, &[incoming]).unwrap();

        let sub = f.find_child(root, "sub").unwrap();
        let names: Vec<_> = f.children(sub).iter().map(|&c| f[c].name.clone()).collect();
        assert_eq!(names, vec!["s.md", "t.md"]);
        let s = f.find_child(sub, "s.md").unwrap();
        assert_eq!(f[s].source, "x/s.md");
        let t = f.find_child(sub, "t.md").unwrap();
        assert_eq!(f.parent(t), Some(sub));
        assert!(f[sub].properties.is_empty());
    }

    #[test]
    fn test_union_on_document_is_invalid() {
        let mut f = Forest::new();
        let doc = f.insert(Node::document("a.md", "x/a.md"));
        f.push_root(doc);
        let other = f.insert(Node::document("b.md", "x/b.md"));
        assert!(matches!(f.union(doc, &[other]), Err(NodeError::InvalidMerge(_))));
    }

    #[test]
    fn test_union_idempotent_for_disjoint_names() {
        let mut f = forest("- name: root\n  nodes:\n    - {name: a.md, source: x/a.md}\n");
        let root = f.roots()[0];
        let b_def: NodeDef =
            serde_yaml::from_str("name: b\nnodes:\n  - {name: c.md, source: x/c.md}\n").unwrap();

        let b = f.insert_def(&b_def);
        f.union(root, &[b]).unwrap();
        let once = snapshot(&f);

        let b_again = f.insert_def(&b_def);
        f.union(root, &[b_again]).unwrap();
        assert_eq!(snapshot(&f), once);
    }

    #[test]
    fn test_cleanup_removes_empty_containers() {
        let mut f = forest(
            r#"
- name: root
  nodes:
    - name: empty
      nodes:
        - name: deeper
    - name: selector
      nodesSelector: {path: x/tree}
    - name: keep
      nodes:
        - name: nested
          nodes:
            - {name: a.md, source: x/a.md}
        - name: hollow
    - name: last
      nodes:
        - {name: b.md, source: x/b.md}
"#,
        );
        let root = f.roots()[0];
        f.cleanup(root);
        let names: Vec<_> = f.children(root).iter().map(|&c| f[c].name.clone()).collect();
        assert_eq!(names, vec!["selector", "keep", "last"]);
        let keep = f.find_child(root, "keep").unwrap();
        assert_eq!(f.children(keep).len(), 1);

        let once = snapshot(&f);
        f.cleanup(root);
        assert_eq!(snapshot(&f), once);
    }

    #[test]
    fn test_cleanup_roots_drops_empty_roots() {
        let mut f = forest("- name: gone\n- {name: a.md, source: x/a.md}\n");
        let selector_root = f.insert(Node {
            name: "dynamic".into(),
            node_selector: Some(NodeSelector {
                path: "x".into(),
                ..Default::default()
            }),
            ..Default::default()
        });
        f.push_root(selector_root);
        f.cleanup_roots();
        let names: Vec<_> = f.roots().iter().map(|&r| f[r].name.clone()).collect();
        assert_eq!(names, vec!["a.md", "dynamic"]);
    }
}
