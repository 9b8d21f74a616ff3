//! Link-addressable markdown document.
//!
//! Parsing records where every link lives in the source; edits splice the
//! source in place and shift the recorded offsets of everything after the
//! edit. Bytes outside edited ranges are never rewritten, so an untouched
//! document serializes back byte for byte.

use std::collections::HashSet;
use std::ops::Range;

use pulldown_cmark::{Event, LinkType as CmarkLinkType, Options, Parser, Tag, TagEnd};

use super::frontmatter::{self, FrontMatterError};
use super::html::rewrite_html_links;
use super::scan;
use crate::core::link::is_absolute_link;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Link,
    Image,
    /// `<https://...>` or a bare `https://...` URL.
    AutoLink,
    /// `[label]: destination "title"`, shared by every reference use site.
    Definition,
}

/// Offsets of one link construct. Ranges index [`MarkdownDocument::as_str`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub kind: LinkType,
    pub span: Range<usize>,
    pub text: Option<Range<usize>>,
    pub destination: Option<Range<usize>>,
    pub title: Option<Range<usize>>,
}

/// Owned view of a link handed to [`MarkdownDocument::update_links`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub kind: LinkType,
    pub destination: String,
    pub text: String,
    pub title: Option<String>,
}

/// Visitor verdict for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkUpdate {
    Keep,
    /// `None` components stay as they are.
    Replace {
        destination: Option<String>,
        text: Option<String>,
        title: Option<String>,
    },
    /// Drop the construct, optionally leaving its text in place.
    Remove { leave_text: bool },
}

#[derive(Debug, Clone, Copy)]
enum Owner {
    Link(usize),
    Html(usize),
}

#[derive(Debug, Clone)]
pub struct MarkdownDocument {
    text: String,
    front_matter: Option<Range<usize>>,
    links: Vec<Link>,
    html: Vec<Range<usize>>,
}

fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts
}

fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl MarkdownDocument {
    /// Parse `text`. A leading front-matter block is kept verbatim and
    /// excluded from link scanning.
    pub fn parse(text: impl Into<String>) -> Result<Self, FrontMatterError> {
        let text = text.into();
        let layout = frontmatter::layout(&text)?;
        let body_start = layout.as_ref().map_or(0, |l| l.content_start);
        let (links, html) = scan_body(&text, body_start);
        Ok(Self {
            front_matter: layout.map(|l| l.yaml),
            text,
            links,
            html,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Raw front-matter YAML, if the document starts with a block.
    pub fn front_matter(&self) -> Option<&str> {
        self.front_matter.as_ref().map(|r| &self.text[r.clone()])
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    fn slice(&self, range: &Option<Range<usize>>) -> Option<&str> {
        range.as_ref().map(|r| &self.text[r.clone()])
    }

    pub fn info(&self, i: usize) -> LinkInfo {
        let link = &self.links[i];
        LinkInfo {
            kind: link.kind,
            destination: self.slice(&link.destination).unwrap_or_default().to_string(),
            text: self.slice(&link.text).unwrap_or_default().to_string(),
            title: self.slice(&link.title).map(str::to_string),
        }
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Replace `range` with `replacement` and shift every recorded offset.
    ///
    /// Links and HTML runs wholly inside a non-empty replaced range are
    /// dropped, except the owner of the edit.
    fn splice(&mut self, owner: Option<Owner>, range: Range<usize>, replacement: &str) {
        let (s, e) = (range.start, range.end);
        self.text.replace_range(s..e, replacement);
        let delta = replacement.len() as isize - (e - s) as isize;
        let swallowed = |r: &Range<usize>| s < e && r.start >= s && r.end <= e;

        let mut index = 0;
        self.links.retain(|link| {
            let own = matches!(owner, Some(Owner::Link(i)) if i == index);
            index += 1;
            own || !swallowed(&link.span)
        });
        let mut index = 0;
        self.html.retain(|r| {
            let own = matches!(owner, Some(Owner::Html(i)) if i == index);
            index += 1;
            own || !swallowed(r)
        });

        for link in &mut self.links {
            shift(&mut link.span, s, e, delta);
            for r in [&mut link.text, &mut link.destination, &mut link.title]
                .into_iter()
                .flatten()
            {
                shift(r, s, e, delta);
            }
        }
        for r in &mut self.html {
            shift(r, s, e, delta);
        }
    }

    pub fn set_destination(&mut self, i: usize, destination: &str) -> bool {
        let Some(dest) = self.links[i].destination.clone() else {
            return false;
        };
        let link = &self.links[i];

        // `<./a.md>` is not an autolink; relative targets become inline links.
        if link.kind == LinkType::AutoLink && !is_absolute_link(destination) {
            let label = self.text[dest].to_string();
            let replacement = format!("[{label}]({destination})");
            let span = link.span.clone();
            self.splice(Some(Owner::Link(i)), span.clone(), &replacement);
            let text_start = span.start + 1;
            let dest_start = text_start + label.len() + 2;
            self.links[i] = Link {
                kind: LinkType::Link,
                span: span.start..span.start + replacement.len(),
                text: Some(text_start..text_start + label.len()),
                destination: Some(dest_start..dest_start + destination.len()),
                title: None,
            };
            return true;
        }

        let angled = dest.start > 0 && self.text.as_bytes()[dest.start - 1] == b'<';
        let value = if !angled && destination.contains(char::is_whitespace) {
            destination.replace(' ', "%20")
        } else {
            destination.to_string()
        };
        self.splice(Some(Owner::Link(i)), dest.clone(), &value);
        self.links[i].destination = Some(dest.start..dest.start + value.len());
        true
    }

    pub fn set_text(&mut self, i: usize, text: &str) -> bool {
        let Some(range) = self.links[i].text.clone() else {
            return false;
        };
        self.splice(Some(Owner::Link(i)), range.clone(), text);
        self.links[i].text = Some(range.start..range.start + text.len());
        true
    }

    /// Replace the title, or add one after the destination.
    pub fn set_title(&mut self, i: usize, title: &str) -> bool {
        if let Some(range) = self.links[i].title.clone() {
            let quote = self.text.as_bytes()[range.start - 1];
            let close = if quote == b'(' { ')' } else { quote as char };
            let escaped = title.replace(close, &format!("\\{close}"));
            self.splice(Some(Owner::Link(i)), range.clone(), &escaped);
            self.links[i].title = Some(range.start..range.start + escaped.len());
            return true;
        }

        let Some(dest) = self.links[i].destination.clone() else {
            return false;
        };
        if self.links[i].kind == LinkType::AutoLink {
            return false;
        }
        let at = if self.text.as_bytes().get(dest.end) == Some(&b'>') {
            dest.end + 1
        } else {
            dest.end
        };
        let escaped = title.replace('"', "\\\"");
        let insertion = format!(" \"{escaped}\"");
        self.splice(Some(Owner::Link(i)), at..at, &insertion);
        self.links[i].title = Some(at + 2..at + 2 + escaped.len());
        true
    }

    /// Remove link `i`. With `leave_text` the link text (the URL for
    /// autolinks) stays in place. Images are always removed whole.
    pub fn remove(&mut self, i: usize, leave_text: bool) {
        let link = self.links[i].clone();
        let keep = match link.kind {
            LinkType::AutoLink => link.destination.clone(),
            LinkType::Definition | LinkType::Image => None,
            _ => link.text.clone(),
        };
        match keep {
            Some(text) if leave_text => {
                self.splice(Some(Owner::Link(i)), text.end..link.span.end, "");
                self.splice(Some(Owner::Link(i)), link.span.start..text.start, "");
            }
            _ => self.splice(Some(Owner::Link(i)), link.span.clone(), ""),
        }
        self.links.remove(i);
    }

    /// Visit every link in document order and apply the verdicts.
    ///
    /// Edits of one link are applied before the next link is visited.
    pub fn update_links<F>(&mut self, mut visit: F)
    where
        F: FnMut(&LinkInfo) -> LinkUpdate,
    {
        let mut i = 0;
        while i < self.links.len() {
            let info = self.info(i);
            match visit(&info) {
                LinkUpdate::Keep => {}
                LinkUpdate::Replace {
                    destination,
                    text,
                    title,
                } => {
                    if let Some(d) = destination.filter(|d| *d != info.destination) {
                        self.set_destination(i, &d);
                    }
                    if let Some(t) = text.filter(|t| *t != info.text) {
                        self.set_text(i, &t);
                    }
                    if let Some(t) = title.filter(|t| Some(t) != info.title.as_ref()) {
                        self.set_title(i, &t);
                    }
                }
                LinkUpdate::Remove { leave_text } => {
                    self.remove(i, leave_text);
                    continue;
                }
            }
            i += 1;
        }
    }

    /// Rewrite `href`/`src` values of raw HTML in the document.
    ///
    /// `rewrite(value, is_image)` returns the replacement or `None`.
    pub fn update_html_links<F>(&mut self, mut rewrite: F)
    where
        F: FnMut(&str, bool) -> Option<String>,
    {
        for h in 0..self.html.len() {
            let range = self.html[h].clone();
            if let Some(updated) = rewrite_html_links(&self.text[range.clone()], &mut rewrite) {
                self.splice(Some(Owner::Html(h)), range.clone(), &updated);
                self.html[h] = range.start..range.start + updated.len();
            }
        }
    }
}

/// Shift an offset range for an edit replacing `s..e` with a run `delta`
/// bytes longer.
///
/// For insertions (`s == e`) ranges ending at `s` stay put while non-empty
/// ranges starting at `s` move.
fn shift(r: &mut Range<usize>, s: usize, e: usize, delta: isize) {
    let empty = r.start == r.end;
    let moves = |p: usize, is_start: bool| {
        if s == e {
            p > s || (p == s && is_start && !empty)
        } else {
            p >= e
        }
    };
    let apply = |p: usize| (p as isize + delta).max(0) as usize;
    if moves(r.start, true) {
        r.start = apply(r.start);
    }
    if moves(r.end, false) {
        r.end = apply(r.end);
    }
}

fn scan_body(text: &str, body_start: usize) -> (Vec<Link>, Vec<Range<usize>>) {
    let body = &text[body_start..];
    let at = |r: Range<usize>| r.start + body_start..r.end + body_start;

    let mut iter = Parser::new_ext(body, options()).into_offset_iter();
    let definitions: Vec<(String, Range<usize>)> = iter
        .reference_definitions()
        .iter()
        .map(|(label, def)| (normalize_label(label), def.span.clone()))
        .collect();

    let mut links = Vec::new();
    let mut html = Vec::new();
    let mut image_labels = HashSet::new();
    let mut link_labels = HashSet::new();
    let mut in_link = 0usize;
    let mut in_code = 0usize;

    for (event, range) in iter.by_ref() {
        match event {
            Event::Start(Tag::Link { link_type, id, .. }) => {
                in_link += 1;
                match link_type {
                    CmarkLinkType::Inline => {
                        if let Some(c) = scan::inline_link(text, &at(range.clone())) {
                            links.push(component_link(LinkType::Link, at(range), c));
                        }
                    }
                    CmarkLinkType::Autolink => {
                        let span = at(range);
                        links.push(Link {
                            kind: LinkType::AutoLink,
                            destination: Some(span.start + 1..span.end - 1),
                            span,
                            text: None,
                            title: None,
                        });
                    }
                    CmarkLinkType::Reference
                    | CmarkLinkType::Collapsed
                    | CmarkLinkType::Shortcut => {
                        link_labels.insert(normalize_label(&id));
                    }
                    _ => {}
                }
            }
            Event::Start(Tag::Image { link_type, id, .. }) => {
                in_link += 1;
                match link_type {
                    CmarkLinkType::Inline => {
                        if let Some(c) = scan::inline_link(text, &at(range.clone())) {
                            links.push(component_link(LinkType::Image, at(range), c));
                        }
                    }
                    CmarkLinkType::Reference
                    | CmarkLinkType::Collapsed
                    | CmarkLinkType::Shortcut => {
                        image_labels.insert(normalize_label(&id));
                    }
                    _ => {}
                }
            }
            Event::End(TagEnd::Link | TagEnd::Image) => in_link = in_link.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => in_code += 1,
            Event::End(TagEnd::CodeBlock) => in_code = in_code.saturating_sub(1),
            Event::Start(Tag::HtmlBlock) => html.push(at(range)),
            Event::InlineHtml(_) => html.push(at(range)),
            Event::Text(_) if in_link == 0 && in_code == 0 => {
                for url in scan::bare_urls(text, &at(range)) {
                    links.push(Link {
                        kind: LinkType::AutoLink,
                        span: url.clone(),
                        text: None,
                        destination: Some(url),
                        title: None,
                    });
                }
            }
            _ => {}
        }
    }

    for (label, span) in definitions {
        let span = at(span);
        if let Some(c) = scan::definition(text, &span) {
            let kind = if image_labels.contains(&label) && !link_labels.contains(&label) {
                LinkType::Image
            } else {
                LinkType::Definition
            };
            let mut link = component_link(kind, span, c);
            link.text = None;
            links.push(link);
        }
    }

    links.sort_by_key(|l| l.span.start);
    links.dedup_by_key(|l| l.span.clone());
    html.sort_by_key(|r| r.start);
    (links, html)
}

fn component_link(kind: LinkType, span: Range<usize>, c: scan::Components) -> Link {
    Link {
        kind,
        span,
        text: c.text,
        destination: c.destination,
        title: c.title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\ntitle: Sample\n---\n\
# Heading\r\n\
\r\n\
Text with [a link](./a/b.md \"T\") and ![img](./images/img.png).\n\
\n\
    indented [code](x.md)\n\
\n\
```md\n[fenced](y.md)\n```\n\
\n\
`[span](z.md)` and <https://auto.link/x> plus https://bare.link/y.\n\
\n\
| col | link |\n|-----|------|\n| 1 | [t](t.md) |\n\
\n\
- [ ] task with [ref][r1]\n\
\n\
<div>\n<a href=\"a.md\">A</a>\n</div>\n\
\n\
[r1]: ../ref.md 'Ref'\n";

    fn destinations(doc: &MarkdownDocument) -> Vec<String> {
        (0..doc.links().len()).map(|i| doc.info(i).destination).collect()
    }

    #[test]
    fn test_parse_links() {
        let doc = MarkdownDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.front_matter(), Some("title: Sample\n"));
        assert_eq!(
            destinations(&doc),
            vec![
                "./a/b.md",
                "./images/img.png",
                "https://auto.link/x",
                "https://bare.link/y",
                "t.md",
                "../ref.md",
            ]
        );
        let kinds: Vec<_> = doc.links().iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LinkType::Link,
                LinkType::Image,
                LinkType::AutoLink,
                LinkType::AutoLink,
                LinkType::Link,
                LinkType::Definition,
            ]
        );
        assert_eq!(doc.info(0).title.as_deref(), Some("T"));
        assert_eq!(doc.info(5).title.as_deref(), Some("Ref"));
    }

    #[test]
    fn test_noop_update_is_identity() {
        let mut doc = MarkdownDocument::parse(SAMPLE).unwrap();
        doc.update_links(|_| LinkUpdate::Keep);
        doc.update_html_links(|_, _| None);
        assert_eq!(doc.as_str(), SAMPLE);
    }

    #[test]
    fn test_set_destination_roundtrip() {
        let mut doc = MarkdownDocument::parse(SAMPLE).unwrap();
        for i in 0..doc.links().len() {
            let original = doc.info(i).destination;
            doc.set_destination(i, "https://elsewhere.example/long/path.md");
            doc.set_destination(i, &original);
        }
        assert_eq!(doc.as_str(), SAMPLE);
    }

    #[test]
    fn test_edits_shift_following_links() {
        let mut doc = MarkdownDocument::parse("[a](1.md) [b](2.md \"t\") ![c](3.png)").unwrap();
        doc.set_destination(0, "../one/1");
        doc.set_title(1, "new \"title\"");
        doc.set_text(2, "alt text");
        assert_eq!(
            doc.as_str(),
            r#"[a](../one/1) [b](2.md "new \"title\"") ![alt text](3.png)"#
        );
        assert_eq!(doc.info(2).destination, "3.png");
        assert_eq!(doc.info(1).title.as_deref(), Some(r#"new \"title\""#));
    }

    #[test]
    fn test_set_title_inserts_when_missing() {
        let mut doc = MarkdownDocument::parse("[a](<b c.md>) [d]() x").unwrap();
        doc.set_title(0, "T");
        doc.set_title(1, "U");
        assert_eq!(doc.as_str(), r#"[a](<b c.md> "T") [d]( "U") x"#);
        assert_eq!(doc.info(1).destination, "");
        assert_eq!(doc.info(1).title.as_deref(), Some("U"));
    }

    #[test]
    fn test_remove_links() {
        let mut doc =
            MarkdownDocument::parse("see [docs](a.md), ![pic](p.png) and [![b](badge.svg)](ci)")
                .unwrap();
        doc.update_links(|info| match info.kind {
            LinkType::Image if info.destination == "p.png" => {
                LinkUpdate::Remove { leave_text: false }
            }
            LinkType::Link if info.destination == "a.md" => LinkUpdate::Remove { leave_text: true },
            LinkType::Link if info.destination == "ci" => LinkUpdate::Remove { leave_text: true },
            _ => LinkUpdate::Keep,
        });
        assert_eq!(doc.as_str(), "see docs,  and ![b](badge.svg)");
        assert_eq!(doc.links().len(), 1);
        assert_eq!(doc.info(0).destination, "badge.svg");
    }

    #[test]
    fn test_remove_image_drops_alt_text() {
        let mut doc = MarkdownDocument::parse("![alt](x.png)").unwrap();
        doc.remove(0, true);
        assert_eq!(doc.as_str(), "");
        assert!(doc.links().is_empty());
    }

    #[test]
    fn test_remove_outer_drops_nested() {
        let mut doc = MarkdownDocument::parse("x [![b](badge.svg)](ci) y").unwrap();
        doc.remove(0, false);
        assert_eq!(doc.as_str(), "x  y");
        assert!(doc.links().is_empty());
    }

    #[test]
    fn test_autolink_to_relative_becomes_inline() {
        let mut doc = MarkdownDocument::parse("<https://a.com/x.md> and https://b.com/y.md").unwrap();
        doc.set_destination(0, "./x.md");
        doc.set_destination(1, "https://c.com/z");
        assert_eq!(doc.as_str(), "[https://a.com/x.md](./x.md) and https://c.com/z");
        assert_eq!(doc.info(0).kind, LinkType::Link);
        assert_eq!(doc.info(0).text, "https://a.com/x.md");
    }

    #[test]
    fn test_reference_definition_serves_all_uses() {
        let mut doc = MarkdownDocument::parse("[one][r] and [two][r]\n\n[r]: a.md\n").unwrap();
        assert_eq!(doc.links().len(), 1);
        doc.set_destination(0, "../a");
        assert_eq!(doc.as_str(), "[one][r] and [two][r]\n\n[r]: ../a\n");
    }

    #[test]
    fn test_update_html_links() {
        let mut doc =
            MarkdownDocument::parse("[GitHub](./a/b.md) <a href=\"a.md\">A</a> <img src=i.png>")
                .unwrap();
        let mut images = Vec::new();
        doc.update_html_links(|v, img| {
            images.push(img);
            Some(format!("../{v}"))
        });
        doc.set_destination(0, "../a/b");
        assert_eq!(
            doc.as_str(),
            "[GitHub](../a/b) <a href=\"../a.md\">A</a> <img src=../i.png>"
        );
        assert_eq!(images, vec![false, true]);
    }
}
