//! Document content assembly and link resolution.
//!
//! A document node's content is read part by part (source, multi-source,
//! content selectors, template), links in every markdown part are resolved
//! against the structure, and the parts are joined into one
//! [`Document`]:
//!
//! ```text
//! link ──► absolute ──► rewrite rules ──► structure document?  ──► relative node path
//!                                     └─► download rule/image? ──► resources root
//!                                     └─► otherwise            ──► absolute link (validated)
//! ```

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::core::Context;
use crate::core::link::{is_absolute_link, split_suffix};
use crate::manifest::template;
use crate::markdown::frontmatter;
use crate::markdown::{LinkInfo, LinkType, LinkUpdate, MarkdownDocument};
use crate::node::{Forest, NodeId};
use crate::processors::{Document, Link};
use crate::resource::{Registry, ResourceError};
use crate::utils::path::ext;
use crate::{debug, log};

use super::ReactorError;
use super::download::{DownloadScheduler, DownloadTask};
use super::links::{
    DEFAULT_DOWNLOAD_NAME, LinkRules, SourceLocations, download_destination, find_visible_node,
    swap_paths,
};
use super::validator::LinkValidator;

/// One piece of a document's content.
#[derive(Debug, Clone)]
struct Part {
    source: String,
    content: String,
}

/// Everything content assembly reads; shared by all document workers.
pub struct ContentReader<'a> {
    pub ctx: &'a Context,
    pub forest: &'a Forest,
    pub registry: &'a Registry,
    pub rules: &'a LinkRules,
    pub locations: &'a SourceLocations,
    /// Sources read during resolution; taken on first use.
    pub prefetched: &'a DashMap<String, Vec<u8>>,
    pub downloads: &'a dyn DownloadScheduler,
    pub validator: &'a dyn LinkValidator,
    pub resources_path: &'a str,
    pub rewrite_embedded: bool,
    /// Extensions (with dot) of sources parsed as markdown.
    pub content_formats: &'a [String],
}

impl ContentReader<'_> {
    /// Content of document `node`, `None` when none of its parts has any.
    pub fn read(&self, node: NodeId) -> Result<Option<Document>, ReactorError> {
        let parts = self.parts(node)?;
        if parts.is_empty() {
            return Ok(None);
        }

        let mut document = Document::new(node);
        for part in parts {
            if self.is_markdown(&part.source) {
                self.append_markdown(&mut document, &part)?;
            } else {
                document.append(&part.content);
            }
        }
        Ok(Some(document))
    }

    fn is_markdown(&self, source: &str) -> bool {
        let (path, _) = split_suffix(source);
        let e = ext(path);
        self.content_formats.iter().any(|f| f.eq_ignore_ascii_case(e))
    }

    fn parts(&self, id: NodeId) -> Result<Vec<Part>, ReactorError> {
        let node = &self.forest[id];
        let name = self.forest.full_name(id, "/");
        let mut parts = Vec::new();

        if !node.source.is_empty()
            && let Some(content) = self.fetch(&node.source, &format!("source of {name}"))?
        {
            parts.push(Part {
                source: node.source.clone(),
                content,
            });
        }
        for (i, source) in node.multi_source.iter().enumerate() {
            if let Some(content) = self.fetch(source, &format!("multiSource[{i}] of {name}"))? {
                parts.push(Part {
                    source: source.clone(),
                    content,
                });
            }
        }
        for (i, selector) in node.content_selectors.iter().enumerate() {
            if let Some(expr) = &selector.selector {
                debug!("content"; "{name}: selector `{expr}` is applied to the whole content");
            }
            let label = format!("contentSelectors[{i}] of {name}");
            if let Some(content) = self.fetch(&selector.source, &label)? {
                parts.push(Part {
                    source: selector.source.clone(),
                    content,
                });
            }
        }
        if let Some(tpl) = &node.template
            && let Some(content) = self.render_template(tpl, &name)?
        {
            parts.push(Part {
                source: tpl.path.clone(),
                content,
            });
        }
        Ok(parts)
    }

    fn render_template(
        &self,
        tpl: &crate::manifest::types::Template,
        name: &str,
    ) -> Result<Option<String>, ReactorError> {
        let Some(body) = self.fetch(&tpl.path, &format!("template of {name}"))? else {
            return Ok(None);
        };
        let mut vars = BTreeMap::new();
        for (section, selector) in &tpl.sections {
            let label = format!("template section `{section}` of {name}");
            let content = self.fetch(&selector.source, &label)?.unwrap_or_default();
            let (_, content) = frontmatter::strip(&content)
                .map_err(|e| ReactorError::FrontMatter(selector.source.clone(), e))?;
            vars.insert(section.clone(), content.to_string());
        }
        Ok(Some(template::render(&body, &vars)?))
    }

    /// Content of `source`; missing or empty sources are warned about.
    fn fetch(&self, source: &str, label: &str) -> Result<Option<String>, ReactorError> {
        let bytes = match self.prefetched.remove(source) {
            Some((_, bytes)) => bytes,
            None => {
                let handler = self.registry.require(source)?;
                match handler.read(self.ctx, source) {
                    Ok(bytes) => bytes,
                    Err(ResourceError::NotFound(_)) => {
                        log!("warning"; "reading {label} failed: {source} not found");
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        if bytes.is_empty() {
            log!("warning"; "no content read from {label}: {source}");
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn append_markdown(&self, document: &mut Document, part: &Part) -> Result<(), ReactorError> {
        let source = part.source.as_str();
        let mut md = MarkdownDocument::parse(part.content.as_str())
            .map_err(|e| ReactorError::FrontMatter(source.to_string(), e))?;
        let fm = frontmatter::parse_yaml(md.front_matter().unwrap_or_default())
            .map_err(|e| ReactorError::FrontMatter(source.to_string(), e))?;

        let mut failure: Option<ReactorError> = None;
        let mut links = Vec::new();
        md.update_links(|info| {
            if failure.is_some() {
                return LinkUpdate::Keep;
            }
            match self.resolve_link(document.node, source, info) {
                Ok((update, link)) => {
                    links.extend(link);
                    update
                }
                Err(e) => {
                    failure = Some(e);
                    LinkUpdate::Keep
                }
            }
        });
        md.update_html_links(|value, is_image| {
            if failure.is_some() {
                return None;
            }
            let info = LinkInfo {
                kind: if is_image { LinkType::Image } else { LinkType::Link },
                destination: value.to_string(),
                text: String::new(),
                title: None,
            };
            match self.resolve_link(document.node, source, &info) {
                Ok((LinkUpdate::Replace { destination, .. }, link)) => {
                    links.extend(link);
                    destination
                }
                // attribute values cannot drop their tag, so they are emptied
                Ok((LinkUpdate::Remove { .. }, _)) => Some(String::new()),
                Ok((_, link)) => {
                    links.extend(link);
                    None
                }
                Err(e) => {
                    failure = Some(e);
                    None
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let text = md.into_string();
        let (_, body) =
            frontmatter::strip(&text).map_err(|e| ReactorError::FrontMatter(source.to_string(), e))?;
        document.add_front_matter(fm);
        document.append(body);
        for link in links {
            document.add_link(link);
        }
        Ok(())
    }

    /// Resolve one link of `source`, a content part of `node`.
    fn resolve_link(
        &self,
        node: NodeId,
        source: &str,
        info: &LinkInfo,
    ) -> Result<(LinkUpdate, Option<Link>), ReactorError> {
        let dest = info.destination.trim();
        if dest.is_empty() || dest.starts_with('#') || dest.starts_with("mailto:") {
            return Ok((LinkUpdate::Keep, None));
        }
        if info.kind == LinkType::AutoLink {
            if is_absolute_link(dest) && self.registry.get(dest).is_none() {
                self.validator.validate(self.ctx, dest, source);
            }
            return Ok((LinkUpdate::Keep, None));
        }

        let mut link = Link {
            original_destination: dest.to_string(),
            destination: Some(dest.to_string()),
            text: Some(info.text.clone()),
            title: info.title.clone(),
            ..Default::default()
        };

        let relative = !is_absolute_link(dest);
        let mut abs = if relative {
            let handler = self.registry.require(source)?;
            match handler.build_abs_link(source, dest) {
                Ok(abs) => abs,
                Err(ResourceError::NotFound(abs)) => {
                    log!("warning"; "failed to validate absolute link for {dest} from source {source}: {abs} not found");
                    return Ok(self.replace(link, abs, source));
                }
                Err(e) => return Err(e.into()),
            }
        } else if self.registry.get(dest).is_some() {
            dest.to_string()
        } else {
            self.validator.validate(self.ctx, dest, source);
            return Ok((LinkUpdate::Keep, Some(link)));
        };
        let handler = self.registry.require(&abs)?;

        if let Some(rewrite) = self.rules.rewrite(self.forest, node, &abs) {
            if rewrite.removes() {
                debug!("links"; "[{source}] {dest} removed");
                let leave_text = rewrite.text.as_deref() != Some("");
                return Ok((LinkUpdate::Remove { leave_text }, None));
            }
            if let Some(version) = &rewrite.version {
                abs = handler.set_version(&abs, version)?;
            }
            if rewrite.text.is_some() {
                link.text.clone_from(&rewrite.text);
            }
            if rewrite.title.is_some() {
                link.title.clone_from(&rewrite.title);
            }
            if let Some(destination) = rewrite.destination {
                link.abs_link = Some(abs);
                return Ok(self.replace(link, destination, source));
            }
        }
        link.abs_link = Some(abs.clone());

        let (path, suffix) = split_suffix(&abs);
        let extension = ext(path);
        if extension == ".md" || extension.is_empty() {
            if let Some(target) = self.structure_path(node, path) {
                link.destination_node = Some(target.0);
                let destination = format!("{}{suffix}", target.1);
                return Ok(self.replace(link, destination, source));
            }
            self.validator.validate(self.ctx, &abs, source);
            return Ok(self.replace(link, abs.clone(), source));
        }

        let (name, ext) = handler.resource_name(path);
        let embeddable = info.kind == LinkType::Image;
        let download = self
            .rules
            .download_name(self.forest, node, path, &name, &ext)
            .or_else(|| (embeddable && relative).then(|| self.rules.expand(DEFAULT_DOWNLOAD_NAME, path, &name, &ext)));
        if let Some(target) = download {
            let destination = download_destination(self.forest, node, &target, self.resources_path);
            self.downloads.schedule(
                self.ctx,
                DownloadTask {
                    source: path.to_string(),
                    target,
                    referer: source.to_string(),
                    reference: dest.to_string(),
                },
            )?;
            link.is_resource = true;
            return Ok(self.replace(link, destination, source));
        }

        if embeddable && self.rewrite_embedded {
            abs = handler.raw_format_link(&abs)?;
        }
        self.validator.validate(self.ctx, &abs, source);
        Ok(self.replace(link, abs, source))
    }

    /// Best relative path from `node` to a structure node built from `path`.
    fn structure_path(&self, node: NodeId, path: &str) -> Option<(NodeId, String)> {
        let mut best: Option<(NodeId, String)> = None;
        for &candidate in self.locations.get(path)? {
            let Some(visible) = find_visible_node(self.forest, candidate) else {
                continue;
            };
            let rel = self.forest.relative_path(node, visible);
            let current = best.as_ref().map_or("", |(_, p)| p.as_str());
            if swap_paths(current, &rel) {
                best = Some((visible, rel));
            }
        }
        best
    }

    fn replace(
        &self,
        mut link: Link,
        destination: String,
        source: &str,
    ) -> (LinkUpdate, Option<Link>) {
        if destination != link.original_destination {
            debug!("links"; "[{source}] {} -> {destination}", link.original_destination);
        }
        link.destination = Some(destination.clone());
        let update = LinkUpdate::Replace {
            destination: Some(destination),
            text: link.text.clone(),
            title: link.title.clone(),
        };
        (update, Some(link))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;
    use crate::manifest::types::{ContentSelector, Links, Template};
    use crate::node::Node;
    use crate::resource::testing::MemoryHandler;
    use crate::utils::hash::short_hash;
    use std::sync::Arc;

    struct Fixture {
        forest: Forest,
        registry: Registry,
        rules: LinkRules,
        prefetched: DashMap<String, Vec<u8>>,
        recorder: Recorder,
        formats: Vec<String>,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)], forest: Forest) -> Self {
            Self {
                forest,
                registry: Registry::new(vec![Arc::new(MemoryHandler::with_files(files))]),
                rules: LinkRules::default(),
                prefetched: DashMap::new(),
                recorder: Recorder::default(),
                formats: vec![".md".to_string()],
            }
        }

        fn read(&self, node: NodeId) -> Option<Document> {
            let ctx = Context::background();
            let locations = SourceLocations::index(&self.forest);
            let reader = ContentReader {
                ctx: &ctx,
                forest: &self.forest,
                registry: &self.registry,
                rules: &self.rules,
                locations: &locations,
                prefetched: &self.prefetched,
                downloads: &self.recorder,
                validator: &self.recorder,
                resources_path: "__resources",
                rewrite_embedded: true,
                content_formats: &self.formats,
            };
            reader.read(node).unwrap()
        }
    }

    /// `docs/{intro.md, guide/{setup.md}}` over `mem://repo`.
    fn structure() -> (Forest, NodeId, NodeId) {
        let mut forest = Forest::new();
        let docs = forest.insert(Node::container("docs"));
        let intro = forest.insert(Node::document("intro.md", "mem://repo/intro.md"));
        let guide = forest.insert(Node::container("guide"));
        let setup = forest.insert(Node::document("setup.md", "mem://repo/guide/setup.md"));
        forest.append_child(docs, intro);
        forest.append_child(docs, guide);
        forest.append_child(guide, setup);
        forest.push_root(docs);
        (forest, intro, setup)
    }

    #[test]
    fn test_links_to_structure_documents_become_relative() {
        let (forest, intro, setup) = structure();
        let files = [
            ("repo/intro.md", "---\ntitle: Intro\n---\nSee [setup](./guide/setup.md#install) and [x](#top).\n"),
            ("repo/guide/setup.md", "Back to [intro](../intro.md).\n"),
        ];
        let fx = Fixture::new(&files, forest);

        let doc = fx.read(intro).unwrap();
        assert_eq!(doc.content, "See [setup](./guide/setup.md#install) and [x](#top).\n");
        assert_eq!(doc.front_matter["title"], "Intro");
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.links[0].destination_node, Some(setup));

        let doc = fx.read(setup).unwrap();
        assert_eq!(doc.content, "Back to [intro](../intro.md).\n");
        assert!(fx.recorder.validated.lock().is_empty());
    }

    #[test]
    fn test_links_outside_structure_become_absolute() {
        let (forest, intro, _) = structure();
        let files = [
            ("repo/intro.md", "[other](other.md) [ext](https://example.com/a) [gone](missing.md)\n"),
            ("repo/other.md", "# Other"),
        ];
        let fx = Fixture::new(&files, forest);
        let doc = fx.read(intro).unwrap();
        assert_eq!(
            doc.content,
            "[other](mem://repo/other.md) [ext](https://example.com/a) [gone](mem://repo/missing.md)\n"
        );
        assert_eq!(
            *fx.recorder.validated.lock(),
            vec!["mem://repo/other.md", "https://example.com/a"]
        );
    }

    #[test]
    fn test_embedded_images_are_downloaded() {
        let (forest, _, setup) = structure();
        let files = [
            ("repo/guide/setup.md", "![arch](../img/arch.png) <img src=\"../img/arch.png\">\n"),
            ("repo/img/arch.png", "PNG"),
        ];
        let fx = Fixture::new(&files, forest);
        let doc = fx.read(setup).unwrap();

        let name = format!("arch_{}.png", short_hash("mem://repo/img/arch.png"));
        assert_eq!(
            doc.content,
            format!("![arch](../../__resources/{name}) <img src=\"../../__resources/{name}\">\n")
        );
        assert!(doc.links.iter().all(|l| l.is_resource));
        let downloads = fx.recorder.downloads.lock();
        assert_eq!(downloads.len(), 2);
        assert_eq!(downloads[0].source, "mem://repo/img/arch.png");
        assert_eq!(downloads[0].target, name);
        assert_eq!(downloads[0].referer, "mem://repo/guide/setup.md");
    }

    #[test]
    fn test_rewrite_rules() {
        let (mut forest, intro, _) = structure();
        let root = forest.roots()[0];
        let links: Links = serde_yaml::from_str(
            "rewrites:\n  other\\.md:\n    text: Renamed\n    title: T\n  secret: ~\n",
        )
        .unwrap();
        forest[root].links = Some(links);
        let files = [
            ("repo/intro.md", "[old](other.md) and [hidden](secret.md) text\n"),
            ("repo/other.md", "x"),
            ("repo/secret.md", "x"),
        ];
        let fx = Fixture::new(&files, forest);
        let doc = fx.read(intro).unwrap();
        assert_eq!(doc.content, "[Renamed](mem://repo/other.md \"T\") and  text\n");
    }

    #[test]
    fn test_removal_rule_drops_images_and_empties_html_links() {
        let (mut forest, intro, _) = structure();
        let root = forest.roots()[0];
        let links: Links = serde_yaml::from_str("rewrites:\n  x\\.png:\n    destination: \"\"\n").unwrap();
        forest[root].links = Some(links);
        let files = [
            ("repo/intro.md", "![alt](x.png) <a href=\"x.png\">X</a> <img src=\"x.png\">\n"),
            ("repo/x.png", "PNG"),
        ];
        let fx = Fixture::new(&files, forest);
        let doc = fx.read(intro).unwrap();
        assert_eq!(doc.content, " <a href=\"\">X</a> <img src=\"\">\n");
        assert!(fx.recorder.downloads.lock().is_empty());
    }

    #[test]
    fn test_multi_source_merges_front_matter() {
        let mut forest = Forest::new();
        let mut node = Node::container("combined.md");
        node.multi_source = vec!["mem://a.md".into(), "mem://b.md".into(), "mem://gone.md".into()];
        let id = forest.insert(node);
        forest.push_root(id);
        let files = [
            ("a.md", "---\ntitle: A\n---\n# A\n"),
            ("b.md", "---\ntitle: B\nweight: 2\n---\n# B\n"),
        ];
        let fx = Fixture::new(&files, forest);
        let doc = fx.read(id).unwrap();
        assert_eq!(doc.content, "# A\n# B\n");
        assert_eq!(doc.front_matter["title"], "A");
        assert_eq!(doc.front_matter["weight"], 2);
    }

    #[test]
    fn test_prefetched_content_is_used_once() {
        let (forest, intro, _) = structure();
        let fx = Fixture::new(&[("repo/intro.md", "from handler")], forest);
        fx.prefetched.insert("mem://repo/intro.md".into(), b"prefetched".to_vec());
        assert_eq!(fx.read(intro).unwrap().content, "prefetched");
        assert_eq!(fx.read(intro).unwrap().content, "from handler");
    }

    #[test]
    fn test_missing_source_has_no_content() {
        let (forest, intro, _) = structure();
        let fx = Fixture::new(&[], forest);
        assert!(fx.read(intro).is_none());
    }

    #[test]
    fn test_content_selectors_and_template() {
        let mut forest = Forest::new();
        let mut node = Node::container("page.md");
        node.content_selectors = vec![ContentSelector {
            source: "mem://intro.md".into(),
            selector: Some("h1:first-of-type".into()),
        }];
        node.template = Some(Template {
            path: "mem://page.tpl.md".into(),
            sections: [(
                "body".to_string(),
                ContentSelector {
                    source: "mem://body.md".into(),
                    selector: None,
                },
            )]
            .into_iter()
            .collect(),
        });
        let id = forest.insert(node);
        forest.push_root(id);
        let files = [
            ("intro.md", "Intro\n"),
            ("page.tpl.md", "## Page\n{{ body }}"),
            ("body.md", "---\ntitle: Body\n---\nBody text\n"),
        ];
        let fx = Fixture::new(&files, forest);
        let doc = fx.read(id).unwrap();
        assert_eq!(doc.content, "Intro\n## Page\nBody text\n");
    }
}
