//! Ancestry and the relative-path algebra.
//!
//! `relative_path(from, to)` is what turns a link between two documents of
//! the structure into a link between their output files.

use super::{Forest, NodeId};

impl Forest {
    /// Ancestors of `id`, ordered root first, excluding `id`.
    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            if out.contains(&p) {
                break;
            }
            out.push(p);
            current = self.parent(p);
        }
        out.reverse();
        out
    }

    /// Ancestors of `id` followed by `id` itself.
    fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = self.parents(id);
        out.push(id);
        out
    }

    fn names(&self, ids: &[NodeId]) -> String {
        ids.iter()
            .map(|&id| self[id].name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Names of the ancestors joined by `sep`.
    pub fn path(&self, id: NodeId, sep: &str) -> String {
        self.parents(id)
            .iter()
            .map(|&p| self[p].name.as_str())
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// [`Forest::path`] plus the node's own name.
    pub fn full_name(&self, id: NodeId, sep: &str) -> String {
        let path = self.path(id, sep);
        if path.is_empty() {
            self[id].name.clone()
        } else {
            format!("{path}{sep}{}", self[id].name)
        }
    }

    /// Path from the output file of `from` to that of `to`.
    ///
    /// Nodes in different trees of the forest are reached by climbing to the
    /// top of `from`'s tree and descending from `to`'s root.
    pub fn relative_path(&self, from: NodeId, to: NodeId) -> String {
        if from == to {
            return self[to].name.clone();
        }

        let fp = self.lineage(from);
        let tp = self.lineage(to);
        let common: Vec<NodeId> = fp.iter().copied().filter(|id| tp.contains(id)).collect();

        let Some(&last) = common.last() else {
            let up = if fp.len() <= 1 {
                "./".to_string()
            } else {
                "../".repeat(fp.len() - 1)
            };
            return format!("{up}{}", self.names(&tp));
        };

        if last == from {
            return format!("./{}", self.names(&tp[common.len()..]));
        }
        if last == to {
            return format!("{}{}", "../".repeat(fp.len() - common.len()), self[to].name);
        }

        let remaining = fp.len() - common.len();
        let up = if remaining == 1 {
            "./".to_string()
        } else {
            "../".repeat(remaining - 1)
        };
        format!("{up}{}", self.names(&tp[common.len()..]))
    }
}
