//! Document processors.
//!
//! A [`Document`] is the in-flight form of one document node: its body
//! with front-matter split off, and the links the reactor resolved while
//! reading it. Processors run in declared order and mutate the document in
//! place.
//!
//! - [`frontmatter`]: node front-matter defaults and the derived title
//! - [`hugo`]: link conventions of Hugo sites (pretty URLs, sections)

pub mod frontmatter;
pub mod hugo;

pub use frontmatter::FrontMatterInjector;
pub use hugo::HugoLinkRewriter;

use thiserror::Error;

use crate::manifest::types::Properties;
use crate::markdown::FrontMatterError;
use crate::node::{Forest, NodeId};
use crate::resource::ResourceError;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to rewrite link `{link}` in {source_uri}: {reason}")]
    LinkRewrite {
        link: String,
        source_uri: String,
        reason: String,
    },

    #[error("invalid front-matter of {0}")]
    FrontMatter(String, #[source] FrontMatterError),

    #[error("invalid frontmatter properties for node: {0}")]
    FrontMatterProperties(String),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// A link of a document after resolution against the node tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    /// Document (or visible section) of the structure the link points to.
    pub destination_node: Option<NodeId>,
    /// Downloaded resource rather than a document.
    pub is_resource: bool,
    /// Destination as written in the source.
    pub original_destination: String,
    /// Absolute form of the destination, when one could be built.
    pub abs_link: Option<String>,
    /// Destination now written in the document.
    pub destination: Option<String>,
    pub text: Option<String>,
    pub title: Option<String>,
}

/// One document node being processed.
#[derive(Debug, Clone)]
pub struct Document {
    pub node: NodeId,
    /// Markdown body without front-matter.
    pub content: String,
    /// Front-matter; an empty map writes no block.
    pub front_matter: Properties,
    pub links: Vec<Link>,
}

impl Document {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            content: String::new(),
            front_matter: Properties::new(),
            links: Vec::new(),
        }
    }

    pub fn append(&mut self, content: &str) {
        self.content.push_str(content);
    }

    /// Add keys of `front_matter` that are not set yet.
    pub fn add_front_matter(&mut self, front_matter: Properties) {
        for (k, v) in front_matter {
            self.front_matter.entry(k).or_insert(v);
        }
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// First link currently written as `destination`.
    pub fn link_by_destination(&self, destination: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.destination.as_deref() == Some(destination))
    }
}

pub trait Processor: Send + Sync {
    fn process(&self, document: &mut Document, forest: &Forest) -> Result<(), ProcessingError>;
}

/// Processors applied one after the other; the first failure stops the chain.
#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl Processor for ProcessorChain {
    fn process(&self, document: &mut Document, forest: &Forest) -> Result<(), ProcessingError> {
        for processor in &self.processors {
            processor.process(document, forest)?;
        }
        Ok(())
    }
}
