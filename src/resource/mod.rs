//! Resource handlers.
//!
//! A [`ResourceHandler`] fulfils the read/list/link contract for one family
//! of URIs. The engine never talks to a backend directly; it asks the
//! [`Registry`] for the first handler accepting a URI.
//!
//! - [`fs`]: local paths and `file://` URIs
//! - [`github`]: GitHub blob/tree/raw URLs with tree and branch caches

pub mod fs;
pub mod github;

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::config::Config;
use crate::core::{Context, ContextError};
use crate::manifest::{self, Documentation, ManifestError, ManifestMetadata, NodeDef};
use crate::utils::path::{ext, resource_name};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource \"{0}\" not found")]
    NotFound(String),

    #[error("request for {url} failed with status {status}")]
    BackendFailure { url: String, status: u16 },

    #[error("rate limit exhausted for {host}, resets at {reset}")]
    RateLimited { host: String, reset: String },

    #[error("request for {0} failed")]
    Http(String, #[source] reqwest::Error),

    #[error("IO error for `{0}`")]
    Io(String, #[source] std::io::Error),

    #[error("invalid URL `{0}`: {1}")]
    InvalidUrl(String, String),

    #[error("{0}")]
    Unsupported(String),

    #[error("no suitable handler registered for {0}")]
    NoHandler(String),

    #[error("failed to resolve manifest {uri}")]
    Manifest {
        uri: String,
        #[source]
        source: Box<ManifestError>,
    },

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ResourceError {
    /// Missing targets are usually reported as warnings.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// API quota of a backend. Negative values mean not applicable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: i64,
    pub remaining: i64,
    pub reset: Option<OffsetDateTime>,
}

impl RateLimit {
    pub const fn unlimited() -> Self {
        Self {
            limit: -1,
            remaining: -1,
            reset: None,
        }
    }
}

/// A file found below a tree URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Slash path relative to the listed tree.
    pub path: String,
    /// Absolute URI readable through the same handler.
    pub source: String,
}

// ============================================================================
// Handler contract
// ============================================================================

pub trait ResourceHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn accept(&self, uri: &str) -> bool;

    fn read(&self, ctx: &Context, uri: &str) -> Result<Vec<u8>, ResourceError>;

    /// Git history of `uri` as JSON, `None` when the backend has none.
    fn read_git_info(&self, _ctx: &Context, _uri: &str) -> Result<Option<Vec<u8>>, ResourceError> {
        Ok(None)
    }

    /// Files below the tree `uri` whose names end with one of the
    /// extracted formats, sorted by path.
    fn file_tree(&self, ctx: &Context, uri: &str) -> Result<Vec<TreeEntry>, ResourceError>;

    fn manifest_from_url(&self, ctx: &Context, uri: &str) -> Result<String, ResourceError> {
        let bytes = self.read(ctx, uri)?;
        String::from_utf8(bytes)
            .map_err(|e| ResourceError::Unsupported(format!("manifest {uri} is not UTF-8: {e}")))
    }

    /// Default branch and tags of the repository holding `uri`.
    fn manifest_metadata(&self, _ctx: &Context, _uri: &str) -> Result<ManifestMetadata, ResourceError> {
        Ok(ManifestMetadata::default())
    }

    /// Whether `uri` names a nested manifest rather than a tree.
    fn is_manifest(&self, uri: &str) -> bool {
        matches!(ext(uri), ".yaml" | ".yml")
    }

    /// Absolute form of `link` as seen from `source`.
    ///
    /// Fails with [`ResourceError::NotFound`] when the target is known not
    /// to exist; the error carries the computed link.
    fn build_abs_link(&self, source: &str, link: &str) -> Result<String, ResourceError>;

    /// Link serving the raw bytes of `abs_link`, for embedding.
    fn raw_format_link(&self, abs_link: &str) -> Result<String, ResourceError> {
        Ok(abs_link.to_string())
    }

    /// `abs_link` pinned to another branch or tag.
    fn set_version(&self, abs_link: &str, _version: &str) -> Result<String, ResourceError> {
        Ok(abs_link.to_string())
    }

    /// `(name, ext)` of the resource a link points to; `ext` keeps its dot.
    fn resource_name(&self, link: &str) -> (String, String) {
        resource_name(link)
    }

    /// HTTP client for fetching this handler's resources, if any.
    fn client(&self) -> Option<reqwest::blocking::Client> {
        None
    }

    fn rate_limit(&self, _ctx: &Context) -> Result<RateLimit, ResourceError> {
        Ok(RateLimit::unlimited())
    }

    /// Parse the nested manifest at `uri`; `None` when `uri` is a tree.
    ///
    /// Relative sources and selector paths in the manifest are made
    /// absolute against `uri`.
    fn resolve_documentation(
        &self,
        ctx: &Context,
        uri: &str,
        config: &Config,
    ) -> Result<Option<Documentation>, ResourceError> {
        if !self.is_manifest(uri) {
            return Ok(None);
        }
        let content = self.manifest_from_url(ctx, uri)?;
        let metadata = self.manifest_metadata(ctx, uri)?;
        let mut doc = manifest::parse_with_metadata(&content, uri, &metadata, config).map_err(
            |e| ResourceError::Manifest {
                uri: uri.to_string(),
                source: Box::new(e),
            },
        )?;

        for def in &mut doc.structure {
            absolutize(self, def, uri)?;
        }
        if let Some(selector) = doc.node_selector.as_mut() {
            selector.path = absolute(self, uri, &selector.path)?;
        }
        Ok(Some(doc))
    }
}

fn absolute<H: ResourceHandler + ?Sized>(
    handler: &H,
    manifest: &str,
    link: &str,
) -> Result<String, ResourceError> {
    if link.is_empty() || crate::core::link::is_absolute_link(link) || link.starts_with('/') {
        return Ok(link.to_string());
    }
    handler.build_abs_link(manifest, link)
}

fn absolutize<H: ResourceHandler + ?Sized>(
    handler: &H,
    def: &mut NodeDef,
    manifest: &str,
) -> Result<(), ResourceError> {
    def.source = absolute(handler, manifest, &def.source)?;
    for source in &mut def.multi_source {
        *source = absolute(handler, manifest, source)?;
    }
    if let Some(selector) = def.node_selector.as_mut() {
        selector.path = absolute(handler, manifest, &selector.path)?;
    }
    for child in &mut def.nodes {
        absolutize(handler, child, manifest)?;
    }
    Ok(())
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered handler list; the first accepting handler wins.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: Vec<Arc<dyn ResourceHandler>>,
}

impl Registry {
    pub fn new(handlers: Vec<Arc<dyn ResourceHandler>>) -> Self {
        Self { handlers }
    }

    pub fn load(&mut self, handler: Arc<dyn ResourceHandler>) {
        self.handlers.push(handler);
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.iter().find(|h| h.accept(uri)).cloned()
    }

    /// Like [`Registry::get`], failing with [`ResourceError::NoHandler`].
    pub fn require(&self, uri: &str) -> Result<Arc<dyn ResourceHandler>, ResourceError> {
        self.get(uri)
            .ok_or_else(|| ResourceError::NoHandler(uri.to_string()))
    }

    /// Remove `handler`; with `None` every handler is removed.
    pub fn remove(&mut self, handler: Option<&Arc<dyn ResourceHandler>>) {
        match handler {
            Some(h) => self.handlers.retain(|x| !Arc::ptr_eq(x, h)),
            None => self.handlers.clear(),
        }
    }

    pub fn handlers(&self) -> &[Arc<dyn ResourceHandler>] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

// ============================================================================
// Test handler
// ============================================================================
