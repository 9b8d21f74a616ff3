//! Markdown handling that preserves every byte it does not rewrite.
//!
//! - [`document`]: link-addressable document with offset-shifting edits
//! - [`html`]: `href`/`src` rewriting inside raw HTML
//! - [`frontmatter`]: YAML front-matter split, render and rule matching

pub mod document;
pub mod frontmatter;
pub mod html;
mod scan;

pub use document::{LinkInfo, LinkType, LinkUpdate, MarkdownDocument};
pub use frontmatter::FrontMatterError;
