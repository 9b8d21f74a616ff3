//! Link rules and the structure index used while resolving links.

use dashmap::DashMap;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::log;
use crate::manifest::types::{Downloads, Links, RenameRules};
use crate::node::{Forest, NodeId, SECTION_FILE};
use crate::utils::hash::{short_hash, unique_token};

/// Default name pattern of downloaded resources.
pub const DEFAULT_DOWNLOAD_NAME: &str = "$name_$hash$ext";

// ============================================================================
// Structure index
// ============================================================================

/// Nodes by the resource they were built from.
///
/// Documents are indexed by source, selector-built containers by their
/// source location, both without a trailing `/`.
#[derive(Debug, Default)]
pub struct SourceLocations {
    nodes: FxHashMap<String, Vec<NodeId>>,
}

impl SourceLocations {
    pub fn index(forest: &Forest) -> Self {
        let mut nodes: FxHashMap<String, Vec<NodeId>> = FxHashMap::default();
        for id in forest.walk_all() {
            let node = &forest[id];
            for key in [&node.source, &node.source_location] {
                if !key.is_empty() {
                    nodes.entry(key.trim_end_matches('/').to_string()).or_default().push(id);
                }
            }
        }
        Self { nodes }
    }

    pub fn get(&self, abs_link: &str) -> Option<&[NodeId]> {
        self.nodes.get(abs_link.trim_end_matches('/')).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Whether `candidate` is a better relative path than `current`:
/// descending paths win, then paths with fewer segments.
pub fn swap_paths(current: &str, candidate: &str) -> bool {
    if current.is_empty() {
        return true;
    }
    if !current.starts_with("./") && candidate.starts_with("./") {
        return true;
    }
    current.matches('/').count() > candidate.matches('/').count()
}

/// The node a link to `id` should land on: a document itself, or the
/// closest container (from `id` up) that has a section file.
pub fn find_visible_node(forest: &Forest, id: NodeId) -> Option<NodeId> {
    let mut current = Some(id);
    while let Some(node) = current {
        if forest[node].is_document() {
            return Some(node);
        }
        let has_section = forest
            .children(node)
            .iter()
            .any(|&c| forest[c].name == SECTION_FILE);
        if has_section {
            return Some(node);
        }
        current = forest.parent(node);
    }
    None
}

/// Link from `node` to resource `name` stored under `root`.
///
/// A root starting with `/` is site-absolute; otherwise the link climbs
/// from the node's output directory to the destination root.
pub fn download_destination(forest: &Forest, node: NodeId, name: &str, root: &str) -> String {
    let root = root.trim_end_matches('/');
    if root.starts_with('/') {
        return format!("{root}/{name}");
    }
    let depth = forest.parents(node).len();
    format!("{}{root}/{name}", "../".repeat(depth))
}

// ============================================================================
// Rules
// ============================================================================

/// Outcome of the rewrite rules matching a link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
    pub version: Option<String>,
    pub destination: Option<String>,
    pub text: Option<String>,
    pub title: Option<String>,
}

impl Rewrite {
    /// A rule with an empty destination removes the link.
    pub fn removes(&self) -> bool {
        self.destination.as_deref() == Some("")
    }

    fn removal() -> Self {
        Self {
            destination: Some(String::new()),
            text: Some(String::new()),
            ..Default::default()
        }
    }
}

/// Rewrite and download rules of the manifest and its nodes.
///
/// Regexes are compiled once per expression; invalid ones are reported
/// once and never match.
#[derive(Debug, Default)]
pub struct LinkRules {
    global: Option<Links>,
    compiled: DashMap<String, Option<Regex>>,
    uuids: DashMap<String, String>,
}

impl LinkRules {
    pub fn new(global: Option<Links>) -> Self {
        Self {
            global,
            ..Default::default()
        }
    }

    fn is_match(&self, expr: &str, link: &str) -> bool {
        if let Some(re) = self.compiled.get(expr) {
            return re.as_ref().is_some_and(|re| re.is_match(link));
        }
        let re = match Regex::new(expr) {
            Ok(re) => Some(re),
            Err(e) => {
                log!("warning"; "invalid link rewrite expression `{expr}`: {e}");
                None
            }
        };
        let matched = re.as_ref().is_some_and(|re| re.is_match(link));
        self.compiled.insert(expr.to_string(), re);
        matched
    }

    /// Rules matching `abs_link` for a link in `node`.
    ///
    /// Global rules apply first, then the rules of the node's ancestors
    /// from the root down and of the node itself; later rules override
    /// the fields they set. `None` when nothing matched.
    pub fn rewrite(&self, forest: &Forest, node: NodeId, abs_link: &str) -> Option<Rewrite> {
        let mut lineage = forest.parents(node);
        lineage.push(node);
        let scopes = self
            .global
            .iter()
            .chain(lineage.iter().filter_map(|&id| forest[id].links.as_ref()));

        let mut result: Option<Rewrite> = None;
        for links in scopes {
            for (expr, rule) in &links.rewrites {
                if !self.is_match(expr, abs_link) {
                    continue;
                }
                let Some(rule) = rule else {
                    return Some(Rewrite::removal());
                };
                let current = result.get_or_insert_with(Rewrite::default);
                if rule.version.is_some() {
                    current.version.clone_from(&rule.version);
                }
                if rule.destination.is_some() {
                    current.destination.clone_from(&rule.destination);
                }
                if rule.text.is_some() {
                    current.text.clone_from(&rule.text);
                }
                if rule.title.is_some() {
                    current.title.clone_from(&rule.title);
                }
                if current.removes() {
                    return result;
                }
            }
        }
        result
    }

    /// Name to download `abs_link` under when a download rule of `node`
    /// (or its ancestors, or the manifest) covers it.
    ///
    /// The closest scope wins. `name` and `ext` are the resource name and
    /// extension (with dot) of the link.
    pub fn download_name(
        &self,
        forest: &Forest,
        node: NodeId,
        abs_link: &str,
        name: &str,
        ext: &str,
    ) -> Option<String> {
        let mut lineage = forest.parents(node);
        lineage.push(node);
        let mut scopes: Vec<&Downloads> = self.global.iter().filter_map(|l| l.downloads.as_ref()).collect();
        scopes.extend(
            lineage
                .iter()
                .filter_map(|&id| forest[id].links.as_ref()?.downloads.as_ref()),
        );

        scopes
            .iter()
            .rev()
            .find_map(|downloads| self.match_download(downloads, abs_link))
            .map(|pattern| self.expand(&pattern, abs_link, name, ext))
    }

    fn match_download(&self, downloads: &Downloads, link: &str) -> Option<String> {
        for (expr, renames) in &downloads.scope {
            if !self.is_match(expr, link) {
                continue;
            }
            let pattern = renames
                .as_ref()
                .and_then(|r| self.match_rename(r, link))
                .or_else(|| self.match_rename(&downloads.renames, link))
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
            return Some(pattern);
        }
        self.match_rename(&downloads.renames, link)
    }

    fn match_rename(&self, rules: &RenameRules, link: &str) -> Option<String> {
        rules
            .iter()
            .find(|(expr, _)| self.is_match(expr, link))
            .map(|(_, pattern)| pattern.clone())
    }

    /// Substitute `$name`, `$hash`, `$uuid` and `$ext` in `pattern`.
    ///
    /// `$uuid` is drawn once per link so every reference to a resource
    /// agrees on its name.
    pub fn expand(&self, pattern: &str, abs_link: &str, name: &str, ext: &str) -> String {
        let mut out = pattern
            .replace("$name", name)
            .replace("$hash", &short_hash(abs_link))
            .replace("$ext", ext);
        if out.contains("$uuid") {
            let uuid = self
                .uuids
                .entry(abs_link.to_string())
                .or_insert_with(|| unique_token(abs_link))
                .clone();
            out = out.replace("$uuid", &uuid);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::types::LinkRewriteRule;
    use crate::node::Node;
    use std::collections::BTreeMap;

    fn links(yaml: &str) -> Links {
        serde_yaml::from_str(yaml).unwrap()
    }

    /// `docs -> guide -> page.md`
    fn tree() -> (Forest, NodeId, NodeId, NodeId) {
        let mut forest = Forest::new();
        let docs = forest.insert(Node::container("docs"));
        let guide = forest.insert(Node::container("guide"));
        let page = forest.insert(Node::document("page.md", "https://github.com/org/repo/blob/master/docs/page.md"));
        forest.append_child(docs, guide);
        forest.append_child(guide, page);
        forest.push_root(docs);
        (forest, docs, guide, page)
    }

    #[test]
    fn test_swap_paths() {
        assert!(swap_paths("", "../a.md"));
        assert!(swap_paths("../a.md", "./a.md"));
        assert!(!swap_paths("./a.md", "../a.md"));
        assert!(swap_paths("../../x/a.md", "../a.md"));
        assert!(!swap_paths("../a.md", "../../x/a.md"));
    }

    #[test]
    fn test_find_visible_node() {
        let (mut forest, docs, guide, page) = tree();
        assert_eq!(find_visible_node(&forest, page), Some(page));
        assert_eq!(find_visible_node(&forest, guide), None);

        let section = forest.insert(Node::document(SECTION_FILE, "mem://s.md"));
        forest.append_child(docs, section);
        assert_eq!(find_visible_node(&forest, guide), Some(docs));
    }

    #[test]
    fn test_source_locations() {
        let (mut forest, _, guide, page) = tree();
        forest[guide].source_location = "https://github.com/org/repo/tree/master/docs/".into();
        let index = SourceLocations::index(&forest);
        assert_eq!(index.get("https://github.com/org/repo/tree/master/docs"), Some(&[guide][..]));
        assert_eq!(
            index.get("https://github.com/org/repo/blob/master/docs/page.md/"),
            Some(&[page][..])
        );
        assert!(index.get("https://github.com/org/repo/blob/master/other.md").is_none());
    }

    #[test]
    fn test_download_destination() {
        let (forest, docs, _, page) = tree();
        assert_eq!(
            download_destination(&forest, page, "img_abc123.png", "__resources"),
            "../../__resources/img_abc123.png"
        );
        assert_eq!(download_destination(&forest, docs, "a.png", "__resources/"), "__resources/a.png");
        assert_eq!(download_destination(&forest, page, "a.png", "/__resources"), "/__resources/a.png");
    }

    #[test]
    fn test_rewrite_precedence() {
        let (mut forest, docs, _, page) = tree();
        let global = links(
            "rewrites:\n  github\\.com/org:\n    version: v1\n    text: Global\n",
        );
        forest[docs].links = Some(links("rewrites:\n  repo/blob:\n    version: v2\n"));
        let rules = LinkRules::new(Some(global));

        let got = rules
            .rewrite(&forest, page, "https://github.com/org/repo/blob/master/a.md")
            .unwrap();
        assert_eq!(got.version.as_deref(), Some("v2"));
        assert_eq!(got.text.as_deref(), Some("Global"));
        assert!(!got.removes());

        assert!(rules.rewrite(&forest, page, "https://example.com/a.md").is_none());
    }

    #[test]
    fn test_rewrite_null_rule_removes() {
        let (mut forest, _, guide, page) = tree();
        let mut rewrites = BTreeMap::new();
        rewrites.insert("internal".to_string(), None);
        rewrites.insert(
            "example".to_string(),
            Some(LinkRewriteRule {
                title: Some("T".into()),
                ..Default::default()
            }),
        );
        forest[guide].links = Some(Links {
            rewrites,
            downloads: None,
        });
        let rules = LinkRules::new(None);

        let got = rules.rewrite(&forest, page, "https://example.com/internal/a").unwrap();
        assert!(got.removes());
        assert_eq!(got.text.as_deref(), Some(""));
    }

    #[test]
    fn test_invalid_expression_never_matches() {
        let (mut forest, docs, _, page) = tree();
        forest[docs].links = Some(links("rewrites:\n  \"([\":\n    version: v1\n"));
        let rules = LinkRules::new(None);
        assert!(rules.rewrite(&forest, page, "([").is_none());
        assert!(rules.rewrite(&forest, page, "([").is_none());
    }

    #[test]
    fn test_download_name_scopes() {
        let (mut forest, docs, _, page) = tree();
        let global = links(
            r#"
downloads:
  renames:
    \.pdf$: "$name-global$ext"
  scope:
    github\.com/org/repo:
      \.svg$: "$name-scoped$ext"
"#,
        );
        let rules = LinkRules::new(Some(global));
        let svg = "https://github.com/org/repo/blob/master/img/arch.svg";
        assert_eq!(
            rules.download_name(&forest, page, svg, "arch", ".svg").as_deref(),
            Some("arch-scoped.svg")
        );
        let png = "https://github.com/org/repo/blob/master/img/a.png";
        assert_eq!(
            rules.download_name(&forest, page, png, "a", ".png"),
            Some(format!("a_{}.png", short_hash(png)))
        );
        let pdf = "https://other.org/spec.pdf";
        assert_eq!(
            rules.download_name(&forest, page, pdf, "spec", ".pdf").as_deref(),
            Some("spec-global.pdf")
        );
        assert!(rules.download_name(&forest, page, "https://other.org/a.png", "a", ".png").is_none());

        // node scopes win over the manifest
        forest[docs].links = Some(links("downloads:\n  scope:\n    \\.pdf$: ~\n"));
        assert_eq!(
            rules.download_name(&forest, page, pdf, "spec", ".pdf"),
            Some(format!("spec_{}.pdf", short_hash(pdf)))
        );
    }

    #[test]
    fn test_expand_uuid_is_stable_per_link() {
        let rules = LinkRules::new(None);
        let a = rules.expand("$uuid$ext", "https://x/a.png", "a", ".png");
        let b = rules.expand("$uuid$ext", "https://x/a.png", "a", ".png");
        let c = rules.expand("$uuid$ext", "https://x/c.png", "c", ".png");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), 36 + 4);
    }
}
