//! GitHub REST transport.
//!
//! [`GitHubApi`] is the seam between the handler's caches and the network;
//! [`RestApi`] implements it over `reqwest::blocking`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

use crate::core::Context;
use crate::debug;
use crate::resource::{RateLimit, ResourceError};

const PAGE_SIZE: usize = 100;
const USER_AGENT: &str = concat!("docforge/", env!("CARGO_PKG_VERSION"));

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitTreeEntry {
    pub path: String,
    /// `blob`, `tree` or `commit` (submodules).
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub message: String,
    pub author: Option<CommitAuthor>,
    pub committer: Option<CommitAuthor>,
}

/// A GitHub account linked to a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub login: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepositoryCommit {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub html_url: String,
    pub commit: CommitDetail,
    pub author: Option<Account>,
    pub committer: Option<Account>,
}

pub trait GitHubApi: Send + Sync {
    /// Recursive tree of `owner/repo` at `reference`.
    fn tree(&self, ctx: &Context, owner: &str, repo: &str, reference: &str)
    -> Result<Vec<GitTreeEntry>, ResourceError>;

    fn blob(&self, ctx: &Context, owner: &str, repo: &str, sha: &str) -> Result<Vec<u8>, ResourceError>;

    fn default_branch(&self, ctx: &Context, owner: &str, repo: &str) -> Result<String, ResourceError>;

    fn tags(&self, ctx: &Context, owner: &str, repo: &str) -> Result<Vec<String>, ResourceError>;

    /// Commits touching `path` reachable from `reference`, newest first.
    fn commits(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<Vec<RepositoryCommit>, ResourceError>;

    fn rate_limit(&self, ctx: &Context) -> Result<RateLimit, ResourceError>;
}

// ============================================================================
// reqwest implementation
// ============================================================================

pub struct RestApi {
    client: Client,
    host: String,
    base_url: String,
    token: Option<String>,
}

impl RestApi {
    /// Client for `host`; Enterprise hosts are served under `/api/v3`.
    pub fn new(client: Client, host: &str, token: Option<String>) -> Self {
        let base_url = if host == "github.com" {
            "https://api.github.com".to_string()
        } else {
            format!("https://{host}/api/v3")
        };
        Self {
            client,
            host: host.to_string(),
            base_url,
            token,
        }
    }

    pub fn http_client() -> Result<Client, ResourceError> {
        Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ResourceError::Http("client".to_string(), e))
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(&self, ctx: &Context, url: &str) -> Result<Response, ResourceError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        debug!("github"; "GET {url}");
        let response = self
            .request(url)
            .send()
            .map_err(|e| ResourceError::Http(url.to_string(), e))?;
        check_status(&self.host, url, response)
    }

    fn get_json<T: DeserializeOwned>(&self, ctx: &Context, url: &str) -> Result<T, ResourceError> {
        self.send(ctx, url)?
            .json()
            .map_err(|e| ResourceError::Http(url.to_string(), e))
    }

    /// Follow `page=N` until a short page.
    fn get_paged<T: DeserializeOwned>(&self, ctx: &Context, url: &str) -> Result<Vec<T>, ResourceError> {
        let sep = if url.contains('?') { '&' } else { '?' };
        let mut all = Vec::new();
        for page in 1.. {
            let batch: Vec<T> =
                self.get_json(ctx, &format!("{url}{sep}per_page={PAGE_SIZE}&page={page}"))?;
            let done = batch.len() < PAGE_SIZE;
            all.extend(batch);
            if done {
                break;
            }
        }
        Ok(all)
    }
}

/// 404 -> NotFound, 403 with no remaining quota -> RateLimited, other
/// statuses >= 400 -> BackendFailure.
fn check_status(host: &str, url: &str, response: Response) -> Result<Response, ResourceError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ResourceError::NotFound(url.to_string()));
    }
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        if header("x-ratelimit-remaining").as_deref() == Some("0") {
            let reset = header("x-ratelimit-reset")
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
                .map_or_else(|| "unknown".to_string(), |t| t.to_string());
            return Err(ResourceError::RateLimited {
                host: host.to_string(),
                reset,
            });
        }
    }
    if status.as_u16() >= 400 {
        return Err(ResourceError::BackendFailure {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<GitTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}

#[derive(Deserialize)]
struct RepositoryResponse {
    default_branch: String,
}

#[derive(Deserialize)]
struct TagResponse {
    name: String,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    resources: RateResources,
}

#[derive(Deserialize)]
struct RateResources {
    core: CoreRate,
}

#[derive(Deserialize)]
struct CoreRate {
    limit: i64,
    remaining: i64,
    reset: i64,
}

impl GitHubApi for RestApi {
    fn tree(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<GitTreeEntry>, ResourceError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/git/trees/{reference}?recursive=1",
            self.base_url
        );
        let response: TreeResponse = self.get_json(ctx, &url)?;
        if response.truncated {
            crate::log!("warning"; "git tree of {owner}/{repo}@{reference} is truncated");
        }
        Ok(response.tree)
    }

    fn blob(&self, ctx: &Context, owner: &str, repo: &str, sha: &str) -> Result<Vec<u8>, ResourceError> {
        let url = format!("{}/repos/{owner}/{repo}/git/blobs/{sha}", self.base_url);
        let blob: BlobResponse = self.get_json(ctx, &url)?;
        if blob.encoding != "base64" {
            return Ok(blob.content.into_bytes());
        }
        let compact: String = blob.content.split_whitespace().collect();
        STANDARD
            .decode(compact)
            .map_err(|e| ResourceError::Unsupported(format!("blob {url} is not valid base64: {e}")))
    }

    fn default_branch(&self, ctx: &Context, owner: &str, repo: &str) -> Result<String, ResourceError> {
        let url = format!("{}/repos/{owner}/{repo}", self.base_url);
        let response: RepositoryResponse = self.get_json(ctx, &url)?;
        Ok(response.default_branch)
    }

    fn tags(&self, ctx: &Context, owner: &str, repo: &str) -> Result<Vec<String>, ResourceError> {
        let url = format!("{}/repos/{owner}/{repo}/tags", self.base_url);
        let tags: Vec<TagResponse> = self.get_paged(ctx, &url)?;
        Ok(tags.into_iter().map(|t| t.name).collect())
    }

    fn commits(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<Vec<RepositoryCommit>, ResourceError> {
        let path = percent_encoding::utf8_percent_encode(path, percent_encoding::NON_ALPHANUMERIC);
        let url = format!(
            "{}/repos/{owner}/{repo}/commits?path={path}&sha={reference}",
            self.base_url
        );
        self.get_paged(ctx, &url)
    }

    fn rate_limit(&self, ctx: &Context) -> Result<RateLimit, ResourceError> {
        let url = format!("{}/rate_limit", self.base_url);
        let response: RateLimitResponse = self.get_json(ctx, &url)?;
        let core = response.resources.core;
        Ok(RateLimit {
            limit: core.limit,
            remaining: core.remaining,
            reset: OffsetDateTime::from_unix_timestamp(core.reset).ok(),
        })
    }
}
