//! Manifest resolution.
//!
//! Turns the parsed manifest into the final node forest:
//!
//! ```text
//! manifest ──► virtual root ──► selectors expanded ──► section files ──► cleanup
//!              (structure +      (trees, nested          (Hugo)
//!               top selector)     manifests, filters)
//! ```
//!
//! Selector results are merged with [`Forest::union`], so explicitly
//! declared nodes win over discovered peers of the same name.

use dashmap::DashMap;
use rayon::prelude::*;
use regex::Regex;

use crate::config::Config;
use crate::core::Context;
use crate::manifest::types::Links;
use crate::manifest::{Documentation, ManifestError, NodeSelector};
use crate::markdown::frontmatter::match_front_matter;
use crate::node::{Forest, Node, NodeId, SECTION_FILE, Stat};
use crate::resource::{Registry, ResourceError, ResourceHandler, TreeEntry};
use crate::utils::plural_count;
use crate::{debug, log};

use super::ReactorError;

/// Outcome of resolving a manifest.
#[derive(Debug, Default)]
pub struct Resolved {
    pub forest: Forest,
    /// Global link rules of the top manifest.
    pub links: Option<Links>,
    /// Sources read while filtering by front-matter, reused by the build.
    pub prefetched: DashMap<String, Vec<u8>>,
}

impl Resolved {
    /// The resolved forest in manifest form.
    pub fn documentation(&self) -> Documentation {
        Documentation {
            structure: self.forest.to_defs(),
            links: self.links.clone(),
            ..Default::default()
        }
    }
}

pub struct Resolver<'a> {
    ctx: &'a Context,
    registry: &'a Registry,
    config: &'a Config,
    forest: Forest,
    prefetched: DashMap<String, Vec<u8>>,
    /// Selector paths being expanded, outermost first.
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a Context, registry: &'a Registry, config: &'a Config) -> Self {
        Self {
            ctx,
            registry,
            config,
            forest: Forest::new(),
            prefetched: DashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Resolve the manifest at `uri`.
    pub fn resolve(mut self, uri: &str) -> Result<Resolved, ReactorError> {
        let handler = self.registry.require(uri)?;
        let doc = handler
            .resolve_documentation(self.ctx, uri, self.config)?
            .ok_or_else(|| ReactorError::NotAManifest(uri.to_string()))?;

        self.stack.push(uri.to_string());
        let root = self.forest.insert(Node::container(""));
        for def in &doc.structure {
            let id = self.forest.insert_def(def);
            self.forest.append_child(root, id);
        }
        if let Some(selector) = doc.node_selector {
            self.expand(root, &selector)?;
        }
        if self.forest.children(root).is_empty() {
            return Err(ReactorError::EmptyStructure);
        }

        let children = self.forest.children(root).to_vec();
        self.resolve_structure(&children)?;

        if self.config.hugo.enabled {
            self.resolve_section_files(root);
        }
        self.forest.cleanup(root);

        let roots = self.forest.children(root).to_vec();
        self.forest.set_roots(roots);
        debug!("resolve"; "{} resolved: {}", uri,
            plural_count(self.forest.documents().len(), "document"));

        Ok(Resolved {
            forest: self.forest,
            links: doc.links,
            prefetched: self.prefetched,
        })
    }

    fn resolve_structure(&mut self, ids: &[NodeId]) -> Result<(), ReactorError> {
        for &id in ids {
            if let Some(selector) = self.forest[id].node_selector.clone()
                && !self.expand(id, &selector)?
            {
                continue;
            }
            let children = self.forest.children(id).to_vec();
            self.resolve_structure(&children)?;
            if self.forest[id].node_selector.take().is_some() {
                self.stack.pop();
            }
        }
        Ok(())
    }

    /// Expand `selector` into `host`. Returns `false` when the host was
    /// dropped because its selector path does not exist.
    ///
    /// The selector path stays on the stack until the caller has resolved
    /// the host's children, which may carry selectors of their own.
    fn expand(&mut self, host: NodeId, selector: &NodeSelector) -> Result<bool, ReactorError> {
        self.enter(&selector.path)?;
        let selected = match self.select(host, selector) {
            Ok(selected) => selected,
            Err(ReactorError::Resource(err)) if err.is_not_found() && !self.config.build.fail_fast => {
                log!("warning"; "node selector {} of `{}`: {}",
                    selector.path, self.forest.full_name(host, "/"), err);
                self.stack.pop();
                self.forest[host].node_selector = None;
                self.forest.detach(host);
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        let count = selected
            .iter()
            .map(|&id| self.forest.walk(id).into_iter().filter(|&n| self.forest[n].is_document()).count())
            .sum::<usize>();
        self.forest[host].stats.push(Stat {
            title: "node selector".to_string(),
            figures: plural_count(count, "document"),
            details: vec![selector.path.clone()],
        });
        self.forest.union(host, &selected)?;
        self.forest.set_parents_downwards(host);

        if self.forest[host].node_selector.is_none() {
            // virtual roots carry no selector; nothing left to resolve on them
            self.stack.pop();
        } else {
            self.forest[host].node_selector = Some(selector.clone());
        }
        Ok(true)
    }

    fn enter(&mut self, path: &str) -> Result<(), ReactorError> {
        if let Some(pos) = self.stack.iter().position(|p| p == path) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(path.to_string());
            return Err(ManifestError::Circular(cycle.join(" -> ")).into());
        }
        self.stack.push(path.to_string());
        Ok(())
    }

    /// Detached nodes selected by `selector`.
    fn select(&mut self, host: NodeId, selector: &NodeSelector) -> Result<Vec<NodeId>, ReactorError> {
        let handler = self.registry.require(&selector.path)?;

        if let Some(doc) = handler.resolve_documentation(self.ctx, &selector.path, self.config)? {
            debug!("resolve"; "`{}` imports {}", self.forest.full_name(host, "/"), selector.path);
            let staging = self.forest.insert(Node::container(""));
            for def in &doc.structure {
                let id = self.forest.insert_def(def);
                self.forest.append_child(staging, id);
            }
            if let Some(nested) = &doc.node_selector {
                self.enter(&nested.path)?;
                let selected = self.select(staging, nested)?;
                self.forest.union(staging, &selected)?;
                self.stack.pop();
            }
            if self.forest[host].links.is_none() {
                self.forest[host].links = doc.links;
            }
            return Ok(self.take_children(staging));
        }

        if self.forest[host].source_location.is_empty() {
            self.forest[host].source_location = selector.path.trim_end_matches('/').to_string();
        }
        let entries = handler.file_tree(self.ctx, &selector.path)?;
        let staging = self.build_tree(selector, &entries)?;

        if selector.front_matter.is_some() || selector.exclude_front_matter.is_some() {
            self.filter_documents(handler.as_ref(), staging, selector)?;
            self.forest.cleanup(staging);
        }
        Ok(self.take_children(staging))
    }

    fn take_children(&mut self, staging: NodeId) -> Vec<NodeId> {
        let children = self.forest.children(staging).to_vec();
        self.forest.set_children(staging, Vec::new());
        for &child in &children {
            self.forest.set_parent(child, None);
        }
        children
    }

    /// Build a container chain for every tree entry below a staging node.
    fn build_tree(&mut self, selector: &NodeSelector, entries: &[TreeEntry]) -> Result<NodeId, ReactorError> {
        let excludes = selector
            .exclude_paths
            .iter()
            .map(|expr| Regex::new(expr).map_err(|e| ReactorError::ExcludePattern(expr.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        let base = selector.path.trim_end_matches('/');

        let staging = self.forest.insert(Node::container(""));
        for entry in entries {
            if let Some(re) = excludes.iter().find(|re| re.is_match(&entry.path)) {
                debug!("resolve"; "{} excluded by `{}`", entry.source, re.as_str());
                continue;
            }
            let segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
            let Some((file, dirs)) = segments.split_last() else {
                continue;
            };
            if selector.depth > 0 && dirs.len() as i64 > i64::from(selector.depth) {
                continue;
            }

            let mut parent = staging;
            for (i, dir) in dirs.iter().enumerate() {
                parent = match self.forest.find_child(parent, dir) {
                    Some(existing) if !self.forest[existing].is_document() => existing,
                    _ => {
                        let mut container = Node::container(*dir);
                        container.source_location = format!("{base}/{}", dirs[..=i].join("/"));
                        let id = self.forest.insert(container);
                        self.forest.append_child(parent, id);
                        id
                    }
                };
            }
            let id = self.forest.insert(Node::document(*file, entry.source.clone()));
            self.forest.append_child(parent, id);
        }
        self.sort_children(staging);
        Ok(staging)
    }

    fn sort_children(&mut self, id: NodeId) {
        let mut children = self.forest.children(id).to_vec();
        children.sort_by(|&a, &b| self.forest[a].name.cmp(&self.forest[b].name));
        for &child in &children {
            self.sort_children(child);
        }
        self.forest.set_children(id, children);
    }

    /// Drop documents below `staging` whose front-matter does not pass the
    /// selector's rules. Sources are read in parallel and kept for the build.
    fn filter_documents(
        &mut self,
        handler: &dyn ResourceHandler,
        staging: NodeId,
        selector: &NodeSelector,
    ) -> Result<(), ReactorError> {
        let documents: Vec<(NodeId, String)> = self
            .forest
            .walk(staging)
            .into_iter()
            .filter(|&id| self.forest[id].is_document())
            .map(|id| (id, self.forest[id].source.clone()))
            .collect();

        let ctx = self.ctx;
        let include = selector.front_matter.as_ref();
        let exclude = selector.exclude_front_matter.as_ref();
        let verdicts: Vec<(NodeId, Result<bool, ReactorError>)> = documents
            .par_iter()
            .map(|(id, source)| {
                let content = match handler.read(ctx, source) {
                    Ok(bytes) => bytes,
                    Err(ResourceError::NotFound(_)) => {
                        log!("warning"; "reading source {source} failed: not found");
                        Vec::new()
                    }
                    Err(err) => return (*id, Err(err.into())),
                };
                let text = String::from_utf8_lossy(&content).into_owned();
                let verdict = match_front_matter(&text, include, exclude)
                    .map_err(|e| ReactorError::FrontMatter(source.clone(), e));
                if !content.is_empty() {
                    self.prefetched.insert(source.clone(), content);
                }
                (*id, verdict)
            })
            .collect();

        for (id, verdict) in verdicts {
            if !verdict? {
                debug!("resolve"; "{} filtered out by front-matter rules", self.forest[id].source);
                self.prefetched.remove(&self.forest[id].source);
                self.forest.detach(id);
            }
        }
        Ok(())
    }

    /// In every container without a section file, promote the first
    /// document named like an index file, in configured priority order.
    fn resolve_section_files(&mut self, container: NodeId) {
        let children = self.forest.children(container).to_vec();
        let has_section = children
            .iter()
            .any(|&c| self.forest[c].is_document() && self.forest[c].name == SECTION_FILE);
        if !has_section {
            let promoted = self.config.hugo.index_file_names.iter().find_map(|index| {
                children.iter().copied().find(|&c| {
                    self.forest[c].is_document() && self.forest[c].name.eq_ignore_ascii_case(index)
                })
            });
            if let Some(id) = promoted {
                debug!("resolve"; "renaming {} -> {SECTION_FILE}", self.forest.full_name(id, "/"));
                self.forest[id].name = SECTION_FILE.to_string();
            }
        }
        for child in children {
            if !self.forest[child].is_document() {
                self.resolve_section_files(child);
            }
        }
    }
}
