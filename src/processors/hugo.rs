//! Hugo link conventions.
//!
//! Hugo serves `a/b.md` as `a/b/` with pretty URLs and as `a/b.html`
//! without. Section files (`_index.md` and the configured index names)
//! are served as their directory.
//!
//! Without a base URL links stay relative: every page sits one directory
//! deeper than its source file, so relative links gain a `../`. With a
//! base URL, links to structure documents and downloaded resources become
//! site-absolute.

use serde_json::Value;

use crate::core::LinkKind;
use crate::core::link::split_suffix;
use crate::debug;
use crate::markdown::{LinkType, LinkUpdate, MarkdownDocument};
use crate::node::{FRONTMATTER_PROPERTY, Forest, NodeId};

use super::{Document, Link, ProcessingError, Processor};

#[derive(Debug, Clone, Default)]
pub struct HugoLinkRewriter {
    pub pretty_urls: bool,
    pub base_url: String,
    pub index_file_names: Vec<String>,
}

impl HugoLinkRewriter {
    pub fn new(pretty_urls: bool, base_url: impl Into<String>, index_file_names: Vec<String>) -> Self {
        Self {
            pretty_urls,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index_file_names,
        }
    }

    fn is_index_segment(&self, segment: &str) -> bool {
        let lower = segment.to_lowercase();
        let with_md = format!("{lower}.md");
        lower == "_index"
            || self.index_file_names.iter().any(|name| {
                let name = name.to_lowercase();
                name == lower || name == with_md
            })
    }

    /// Hugo form of `destination`. `link` is what resolution learned about
    /// it, if anything.
    pub fn rewrite_destination(&self, destination: &str, link: Option<&Link>, forest: &Forest) -> String {
        let trimmed = destination.trim().trim_matches('"');
        if trimmed.is_empty() || !LinkKind::parse(trimmed).is_relative() {
            return destination.to_string();
        }

        let (path, suffix) = split_suffix(trimmed);
        let target = link.and_then(|l| l.destination_node);
        let absolute = !self.base_url.is_empty();
        let mut out = path.to_string();

        if absolute {
            if let Some(node) = target {
                let parents = forest.path(node, "/");
                let name = forest[node].name.to_lowercase();
                out = if parents.is_empty() {
                    format!("{}/{name}", self.base_url)
                } else {
                    format!("{}/{parents}/{name}", self.base_url)
                };
            } else if link.is_some_and(|l| l.is_resource) {
                let mut rest = out.as_str();
                while let Some(stripped) = rest.strip_prefix("../") {
                    rest = stripped;
                }
                out = format!("{}/{}", self.base_url, rest.trim_start_matches("./"));
            }
        }

        if let Some(stripped) = out.strip_prefix("./") {
            out = stripped.to_string();
        }

        if self.pretty_urls {
            if let Some(stem) = out.strip_suffix(".md") {
                out = stem.to_string();
            }
            let last = out.rsplit('/').next().unwrap_or_default();
            if self.is_index_segment(last) {
                out.truncate(out.len() - last.len());
                if out.len() > 1 {
                    out.truncate(out.trim_end_matches('/').len());
                }
            }
            if !absolute {
                out = format!("../{out}");
            }
        } else if let Some(stem) = out.strip_suffix(".md") {
            out = format!("{stem}.html");
        }

        if let Some(url) = target.and_then(|node| front_matter_url(forest, node)) {
            out = url.to_string();
        }

        format!("{out}{suffix}")
    }
}

/// Hugo `url` front-matter of a destination node.
fn front_matter_url(forest: &Forest, node: NodeId) -> Option<&str> {
    forest[node]
        .properties
        .get(FRONTMATTER_PROPERTY)
        .and_then(|fm| fm.get("url"))
        .and_then(Value::as_str)
        .filter(|url| url::Url::parse(url).is_ok() || url.starts_with('/'))
}

impl Processor for HugoLinkRewriter {
    fn process(&self, document: &mut Document, forest: &Forest) -> Result<(), ProcessingError> {
        let source = forest[document.node].sources();
        let content = std::mem::take(&mut document.content);
        let mut md = MarkdownDocument::parse(content)
            .map_err(|e| ProcessingError::FrontMatter(source.clone(), e))?;

        let links = &document.links;
        let lookup = |destination: &str| links.iter().find(|l| l.destination.as_deref() == Some(destination));

        md.update_links(|info| {
            if info.kind == LinkType::AutoLink {
                return LinkUpdate::Keep;
            }
            let rewritten = self.rewrite_destination(&info.destination, lookup(&info.destination), forest);
            if rewritten == info.destination {
                return LinkUpdate::Keep;
            }
            debug!("hugo"; "[{source}] {} -> {rewritten}", info.destination);
            LinkUpdate::Replace {
                destination: Some(rewritten),
                text: None,
                title: None,
            }
        });
        md.update_html_links(|value, _| {
            let rewritten = self.rewrite_destination(value, lookup(value), forest);
            if rewritten == value {
                return None;
            }
            debug!("hugo"; "[{source}] {value} -> {rewritten}");
            Some(rewritten)
        });

        document.content = md.into_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use serde_json::json;

    /// `a -> b -> <leaf>`
    fn nested(forest: &mut Forest, leaf: &str) -> NodeId {
        let a = forest.insert(Node::container("a"));
        let b = forest.insert(Node::container("b"));
        let leaf = forest.insert(Node::document(leaf, "mem://x"));
        forest.append_child(a, b);
        forest.append_child(b, leaf);
        forest.push_root(a);
        leaf
    }

    fn to_node(node: NodeId, destination: &str) -> Link {
        Link {
            destination_node: Some(node),
            destination: Some(destination.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_process_pretty_relative() {
        let mut forest = Forest::new();
        let target = nested(&mut forest, "b.md");
        let page = forest.insert(Node::document("Test", "mem://test.md"));
        forest.push_root(page);

        let mut doc = Document::new(page);
        doc.content =
            "[GitHub](./a/b.md) ![img](./images/img.png) <a href=\"a.md\">A</a> [x](https://a.com/b.md)"
                .to_string();
        doc.add_link(to_node(target, "./a/b.md"));

        HugoLinkRewriter::new(true, "", vec![]).process(&mut doc, &forest).unwrap();
        assert_eq!(
            doc.content,
            "[GitHub](../a/b) ![img](../images/img.png) <a href=\"../a\">A</a> [x](https://a.com/b.md)"
        );
    }

    #[test]
    fn test_untouched_links() {
        let forest = Forest::new();
        let hugo = HugoLinkRewriter::new(true, "/base", vec![]);
        for link in ["#fragment-id", "https://github.com/a/b/sample.md", "/root/a.md", ""] {
            assert_eq!(hugo.rewrite_destination(link, None, &forest), link);
        }
    }

    #[test]
    fn test_ugly_urls() {
        let mut forest = Forest::new();
        let target = nested(&mut forest, "README.md");
        let hugo = HugoLinkRewriter::new(false, "", vec![]);
        assert_eq!(hugo.rewrite_destination("./x/y.md#top", None, &forest), "x/y.html#top");

        let hugo = HugoLinkRewriter::new(false, "/", vec![]);
        assert_eq!(hugo.base_url, "");
        let hugo = HugoLinkRewriter::new(false, "/site", vec![]);
        let link = to_node(target, "./a/b/README.md");
        assert_eq!(
            hugo.rewrite_destination("./a/b/README.md", Some(&link), &forest),
            "/site/a/b/readme.html"
        );
    }

    #[test]
    fn test_absolute_section_and_resource() {
        let mut forest = Forest::new();
        let target = nested(&mut forest, "README.md");
        let hugo = HugoLinkRewriter::new(
            true,
            "/base/url",
            vec!["readme".into(), "index".into(), "_index".into()],
        );
        let link = to_node(target, "./a/b/README.md");
        assert_eq!(
            hugo.rewrite_destination("./a/b/README.md", Some(&link), &forest),
            "/base/url/a/b"
        );

        let resource = Link {
            is_resource: true,
            destination: Some("../../images/1.png".into()),
            ..Default::default()
        };
        assert_eq!(
            hugo.rewrite_destination("../../images/1.png", Some(&resource), &forest),
            "/base/url/images/1.png"
        );
    }

    #[test]
    fn test_relative_index_segment_dropped() {
        let forest = Forest::new();
        let hugo = HugoLinkRewriter::new(true, "", vec!["readme.md".into()]);
        assert_eq!(hugo.rewrite_destination("./guide/README.md", None, &forest), "../guide");
        assert_eq!(hugo.rewrite_destination("../_index.md#a", None, &forest), "../..#a");
    }

    #[test]
    fn test_front_matter_url_override() {
        let mut forest = Forest::new();
        let target = nested(&mut forest, "b.md");
        forest[target].properties = json!({ "frontmatter": { "url": "/custom/path/" } })
            .as_object()
            .cloned()
            .unwrap();
        let hugo = HugoLinkRewriter::new(true, "/base", vec![]);
        let link = to_node(target, "./a/b.md");
        assert_eq!(
            hugo.rewrite_destination("./a/b.md#x", Some(&link), &forest),
            "/custom/path/#x"
        );
    }
}
