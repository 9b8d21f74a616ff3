//! GitHub handler.
//!
//! Repository trees are fetched once per `owner/repo@ref` through the
//! [`GitHubApi`] and indexed by a lowercased `host:owner:repo:ref:path`
//! key. Every later lookup (blob SHAs, blob/tree classification, subtree
//! listings) is answered from that index.
//!
//! Repositories listed in `[github.resource_mappings]` are served from a
//! local checkout instead.

pub mod api;
pub mod gitinfo;
pub mod locator;

pub use api::{GitHubApi, RestApi};
pub use locator::{DEFAULT_BRANCH, ResourceLocator, ResourceType};

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use url::Url;

use crate::config::Config;
use crate::core::Context;
use crate::core::link::is_absolute_link;
use crate::debug;
use crate::manifest::ManifestMetadata;
use crate::utils::path::{ext, expand_home};

use super::fs::{list_files, read_file};
use super::{RateLimit, ResourceError, ResourceHandler, TreeEntry};

type TreeIndex = FxHashMap<String, Option<ResourceLocator>>;

pub struct GitHubHandler {
    api: Arc<dyn GitHubApi>,
    client: Option<reqwest::blocking::Client>,
    accepted_hosts: Vec<String>,
    extracted_formats: Vec<String>,
    /// Repository URL -> local checkout.
    mappings: Vec<(String, PathBuf)>,
    /// `None` values mark repositories known to be missing.
    trees: RwLock<TreeIndex>,
    default_branches: Mutex<FxHashMap<String, String>>,
}

impl GitHubHandler {
    pub fn new(api: Arc<dyn GitHubApi>, config: &Config) -> Self {
        Self {
            api,
            client: None,
            accepted_hosts: config.github.accepted_hosts.clone(),
            extracted_formats: config.build.extracted_formats.clone(),
            mappings: config
                .github
                .resource_mappings
                .iter()
                .map(|(url, dir)| {
                    let dir = expand_home(&dir.to_string_lossy());
                    (url.trim_end_matches('/').to_lowercase(), dir)
                })
                .collect(),
            trees: RwLock::new(FxHashMap::default()),
            default_branches: Mutex::new(FxHashMap::default()),
        }
    }

    /// Handler for `host` backed by the REST API.
    pub fn rest(config: &Config, host: &str) -> Result<Self, ResourceError> {
        let client = RestApi::http_client()?;
        let api = RestApi::new(client.clone(), host, config.github.token(host));
        let mut handler = Self::new(Arc::new(api), config);
        handler.client = Some(client);
        Ok(handler)
    }

    /// Parse `link`, resolving the default branch placeholder.
    fn locate(&self, ctx: &Context, link: &str) -> Result<ResourceLocator, ResourceError> {
        let mut rl = ResourceLocator::parse(link)?;
        if rl.sha_alias == DEFAULT_BRANCH {
            rl.sha_alias = self.default_branch(ctx, &rl)?;
        }
        Ok(rl)
    }

    fn default_branch(&self, ctx: &Context, rl: &ResourceLocator) -> Result<String, ResourceError> {
        let key = format!("{}/{}/{}", rl.api_host(), rl.owner, rl.repo);
        let mut cache = self.default_branches.lock();
        if let Some(branch) = cache.get(&key) {
            return Ok(branch.clone());
        }
        let branch = self.api.default_branch(ctx, &rl.owner, &rl.repo)?;
        debug!("github"; "default branch of {key} is {branch}");
        cache.insert(key, branch.clone());
        Ok(branch)
    }

    fn local_path(&self, rl: &ResourceLocator) -> Option<PathBuf> {
        let repo = rl.repo_url().to_lowercase();
        self.mappings
            .iter()
            .find(|(url, _)| *url == repo)
            .map(|(_, dir)| dir.join(rl.clean_path()))
    }

    // ========================================================================
    // Tree index
    // ========================================================================

    fn key(rl: &ResourceLocator, path: &str) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            rl.api_host(),
            rl.owner,
            rl.repo,
            rl.sha_alias,
            path
        )
        .to_lowercase()
    }

    /// Index the tree of `rl`'s repository unless already indexed.
    fn index_repository(&self, ctx: &Context, rl: &ResourceLocator) -> Result<(), ResourceError> {
        let repo_key = Self::key(rl, "");
        if let Some(entry) = self.trees.read().get(&repo_key) {
            return match entry {
                Some(_) => Ok(()),
                None => Err(ResourceError::NotFound(rl.to_string())),
            };
        }

        let mut trees = self.trees.write();
        if trees.contains_key(&repo_key) {
            return Ok(());
        }
        let entries = match self.api.tree(ctx, &rl.owner, &rl.repo, &rl.sha_alias) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                trees.insert(repo_key, None);
                return Err(ResourceError::NotFound(rl.to_string()));
            }
            Err(e) => return Err(e),
        };

        debug!("github"; "indexed {} entries of {}/{}@{}", entries.len(), rl.owner, rl.repo, rl.sha_alias);
        for entry in entries {
            let kind = match entry.kind.as_str() {
                "blob" => ResourceType::Blob,
                "tree" => ResourceType::Tree,
                _ => continue,
            };
            let located = ResourceLocator {
                scheme: rl.scheme.clone(),
                host: rl.api_host().to_string(),
                owner: rl.owner.clone(),
                repo: rl.repo.clone(),
                kind: Some(kind),
                path: entry.path,
                sha_alias: rl.sha_alias.clone(),
                sha: entry.sha,
                is_raw_api: false,
            };
            trees.insert(Self::key(rl, &located.path), Some(located));
        }
        let mut root = rl.clone();
        root.kind = Some(ResourceType::Tree);
        root.path.clear();
        trees.insert(repo_key, Some(root));
        Ok(())
    }

    /// Indexed locator of `rl`, fetching the repository tree on first use.
    fn lookup(&self, ctx: &Context, rl: &ResourceLocator) -> Result<ResourceLocator, ResourceError> {
        self.index_repository(ctx, rl)?;
        self.trees
            .read()
            .get(&Self::key(rl, rl.clean_path()))
            .cloned()
            .flatten()
            .ok_or_else(|| ResourceError::NotFound(rl.to_string()))
    }

    /// Indexed blobs below the tree `rl`.
    fn subtree(&self, ctx: &Context, rl: &ResourceLocator) -> Result<Vec<ResourceLocator>, ResourceError> {
        self.index_repository(ctx, rl)?;
        let path = rl.clean_path();
        if !path.is_empty() {
            self.lookup(ctx, rl)?;
        }
        let prefix = if path.is_empty() {
            Self::key(rl, "")
        } else {
            format!("{}/", Self::key(rl, path))
        };
        Ok(self
            .trees
            .read()
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(_, v)| v.clone())
            .filter(|v| v.kind == Some(ResourceType::Blob))
            .collect())
    }

    fn matches_format(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        self.extracted_formats
            .iter()
            .any(|f| lower.ends_with(&f.to_ascii_lowercase()))
    }

    /// Fix blob/tree of `link` from the index.
    fn verify_link_type(&self, ctx: &Context, link: &str) -> Result<String, ResourceError> {
        let mut rl = self.locate(ctx, link)?;
        if !rl.kind.is_some_and(ResourceType::is_versioned) {
            return Ok(link.to_string());
        }

        let found = if let Some(local) = self.local_path(&rl) {
            local.exists().then(|| {
                if local.is_dir() {
                    ResourceType::Tree
                } else {
                    ResourceType::Blob
                }
            })
        } else {
            match self.lookup(ctx, &rl) {
                Ok(indexed) => indexed.kind,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            }
        };

        match found {
            Some(kind) if rl.kind == Some(kind) || rl.kind == Some(ResourceType::Raw) => Ok(rl.to_string()),
            Some(kind) => {
                rl.kind = Some(kind);
                Ok(rl.to_string())
            }
            None => Err(ResourceError::NotFound(rl.to_string())),
        }
    }

    fn read_wiki(&self, ctx: &Context, rl: &ResourceLocator) -> Result<Vec<u8>, ResourceError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        let mut page = rl.to_string();
        if !page.ends_with(".md") {
            page.push_str(".md");
        }
        let Some(client) = &self.client else {
            return Err(ResourceError::Unsupported(format!("no HTTP client to read {page}")));
        };
        let response = client
            .get(&page)
            .send()
            .map_err(|e| ResourceError::Http(page.clone(), e))?;
        if response.status().as_u16() == 404 {
            return Err(ResourceError::NotFound(page));
        }
        if response.status().as_u16() >= 400 {
            return Err(ResourceError::BackendFailure {
                status: response.status().as_u16(),
                url: page,
            });
        }
        let plain = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/plain"));
        if !plain {
            return Err(ResourceError::Unsupported(format!(
                "unexpected content type for wiki raw content of {page}"
            )));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ResourceError::Http(page, e))
    }
}

impl ResourceHandler for GitHubHandler {
    fn name(&self) -> &'static str {
        "github"
    }

    fn accept(&self, uri: &str) -> bool {
        if !uri.starts_with("http") {
            return false;
        }
        let Ok(url) = Url::parse(uri) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        self.accepted_hosts.iter().any(|h| h == host) && ResourceLocator::parse(uri).is_ok()
    }

    fn read(&self, ctx: &Context, uri: &str) -> Result<Vec<u8>, ResourceError> {
        let rl = self.locate(ctx, uri)?;
        if let Some(local) = self.local_path(&rl) {
            return read_file(&local, uri);
        }
        match rl.kind {
            Some(ResourceType::Blob | ResourceType::Raw) => {
                let indexed = self.lookup(ctx, &rl)?;
                if indexed.kind == Some(ResourceType::Tree) {
                    crate::log!("warning"; "attempted to read tree object {rl}; only blobs and wiki pages can be read");
                    return Ok(Vec::new());
                }
                self.api.blob(ctx, &rl.owner, &rl.repo, &indexed.sha)
            }
            Some(ResourceType::Wiki) => self.read_wiki(ctx, &rl),
            Some(ResourceType::Tree) => {
                crate::log!("warning"; "attempted to read tree object {rl}; only blobs and wiki pages can be read");
                Ok(Vec::new())
            }
            _ => Err(ResourceError::Unsupported(format!("cannot read {uri}"))),
        }
    }

    fn read_git_info(&self, ctx: &Context, uri: &str) -> Result<Option<Vec<u8>>, ResourceError> {
        let rl = self.locate(ctx, uri)?;
        if self.local_path(&rl).is_some() {
            return Ok(None);
        }
        let commits = self
            .api
            .commits(ctx, &rl.owner, &rl.repo, rl.clean_path(), &rl.sha_alias)?;
        let Some(mut info) = gitinfo::transform(&commits) else {
            return Ok(None);
        };

        let sha = self.lookup(ctx, &rl).map(|i| i.sha).unwrap_or_default();
        info.sha = Some(sha).filter(|s| !s.is_empty());
        info.sha_alias = Some(rl.sha_alias.clone()).filter(|s| !s.is_empty());
        info.path = Some(rl.clean_path().to_string()).filter(|s| !s.is_empty());

        serde_json::to_vec_pretty(&info)
            .map(Some)
            .map_err(|e| ResourceError::Unsupported(format!("git info of {uri}: {e}")))
    }

    fn file_tree(&self, ctx: &Context, uri: &str) -> Result<Vec<TreeEntry>, ResourceError> {
        let rl = self.locate(ctx, uri)?;
        let base = rl.clean_path().to_string();

        if let Some(local) = self.local_path(&rl) {
            let mut blob = rl.clone();
            blob.kind = Some(ResourceType::Blob);
            return Ok(list_files(&local, &self.extracted_formats)?
                .into_iter()
                .map(|path| {
                    blob.path = join_path(&base, &path);
                    TreeEntry {
                        source: blob.to_string(),
                        path,
                    }
                })
                .collect());
        }

        let mut entries: Vec<TreeEntry> = self
            .subtree(ctx, &rl)?
            .into_iter()
            .filter(|blob| self.matches_format(&blob.path))
            .map(|blob| {
                let relative = if base.is_empty() {
                    blob.path.clone()
                } else {
                    blob.path[base.len() + 1..].to_string()
                };
                TreeEntry {
                    source: blob.to_string(),
                    path: relative,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn manifest_metadata(&self, ctx: &Context, uri: &str) -> Result<ManifestMetadata, ResourceError> {
        let rl = self.locate(ctx, uri)?;
        if self.local_path(&rl).is_some() {
            return Ok(ManifestMetadata {
                branch: rl.sha_alias,
                tags: Vec::new(),
            });
        }
        Ok(ManifestMetadata {
            branch: self.default_branch(ctx, &rl)?,
            tags: self.api.tags(ctx, &rl.owner, &rl.repo)?,
        })
    }

    fn is_manifest(&self, uri: &str) -> bool {
        ResourceLocator::parse(uri).is_ok_and(|rl| {
            matches!(rl.kind, Some(ResourceType::Blob | ResourceType::Raw)) && ext(rl.clean_path()) != ".md"
        })
    }

    fn build_abs_link(&self, source: &str, link: &str) -> Result<String, ResourceError> {
        let ctx = Context::background();
        if is_absolute_link(link) {
            return self.verify_link_type(&ctx, link);
        }

        let mut relative = link.to_string();
        if link.starts_with('/') {
            let rl = ResourceLocator::parse(source)?;
            let kind = rl.kind.unwrap_or(ResourceType::Blob);
            let repo = format!("/{}/{}/{kind}/{}", rl.owner, rl.repo, rl.sha_alias);
            if !link.starts_with(&format!("{repo}/")) {
                relative = format!("{repo}{link}");
            }
        }
        let base = Url::parse(source).map_err(|e| ResourceError::InvalidUrl(source.to_string(), e.to_string()))?;
        let joined = base
            .join(&relative)
            .map_err(|e| ResourceError::InvalidUrl(link.to_string(), e.to_string()))?;
        self.verify_link_type(&ctx, joined.as_str())
    }

    fn raw_format_link(&self, abs_link: &str) -> Result<String, ResourceError> {
        let rl = ResourceLocator::parse(abs_link)?;
        Ok(rl.raw().unwrap_or_else(|| abs_link.to_string()))
    }

    fn set_version(&self, abs_link: &str, version: &str) -> Result<String, ResourceError> {
        let mut rl = ResourceLocator::parse(abs_link)?;
        if !rl.kind.is_some_and(ResourceType::is_versioned) {
            return Ok(abs_link.to_string());
        }
        rl.sha_alias = version.to_string();
        Ok(rl.to_string())
    }

    fn client(&self) -> Option<reqwest::blocking::Client> {
        self.client.clone()
    }

    fn rate_limit(&self, ctx: &Context) -> Result<RateLimit, ResourceError> {
        self.api.rate_limit(ctx)
    }
}

fn join_path(base: &str, path: &str) -> String {
    if base.is_empty() {
        path.to_string()
    } else {
        format!("{base}/{path}")
    }
}

// ============================================================================
// Test API
// ============================================================================
