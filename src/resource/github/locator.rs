//! GitHub URL parsing.
//!
//! ```text
//! https://github.com/org/repo/blob/master/docs/README.md
//!         └─host─┘ └owner┘└repo┘└type┘└sha─┘└──path───┘
//! https://raw.githubusercontent.com/org/repo/master/docs/logo.png
//! https://github.enterprise/raw/org/repo/master/docs/logo.png
//! ```

use std::fmt;

use url::Url;

use crate::core::link::split_suffix;
use crate::resource::ResourceError;

/// Ref token replaced by the repository's default branch.
pub const DEFAULT_BRANCH: &str = "DEFAULT_BRANCH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Tree,
    Blob,
    Raw,
    Wiki,
    Releases,
    Issues,
    Issue,
    Pulls,
    Pull,
    Commit,
    Commits,
}

impl ResourceType {
    const ALL: [(&'static str, Self); 11] = [
        ("tree", Self::Tree),
        ("blob", Self::Blob),
        ("raw", Self::Raw),
        ("wiki", Self::Wiki),
        ("releases", Self::Releases),
        ("issues", Self::Issues),
        ("issue", Self::Issue),
        ("pulls", Self::Pulls),
        ("pull", Self::Pull),
        ("commit", Self::Commit),
        ("commits", Self::Commits),
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().find(|(name, _)| *name == s).map(|(_, t)| *t)
    }

    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, t)| *t == self)
            .map_or("tree", |(name, _)| name)
    }

    /// Types addressing a file or directory at a ref.
    pub fn is_versioned(self) -> bool {
        matches!(self, Self::Tree | Self::Blob | Self::Raw)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A GitHub URL broken into its segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    pub scheme: String,
    pub host: String,
    pub owner: String,
    pub repo: String,
    /// `None` for bare owner or repository URLs.
    pub kind: Option<ResourceType>,
    /// Path below the ref, with any `?query` / `#fragment` kept.
    pub path: String,
    /// Branch, tag or commit the URL points at.
    pub sha_alias: String,
    /// Object SHA, known only for entries from a git tree listing.
    pub sha: String,
    /// `https://host/raw/owner/repo/ref/path` form.
    pub is_raw_api: bool,
}

fn is_raw_host(host: &str) -> bool {
    host.starts_with("raw.")
}

impl ResourceLocator {
    pub fn parse(link: &str) -> Result<Self, ResourceError> {
        let invalid = |reason: &str| ResourceError::InvalidUrl(link.to_string(), reason.to_string());
        let url = Url::parse(link).map_err(|e| invalid(&e.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?.to_string();

        let url_path = url.path().trim_start_matches('/').trim_end_matches('/');
        let mut segments: Vec<&str> = if url_path.is_empty() {
            Vec::new()
        } else {
            url_path.split('/').collect()
        };

        let is_raw_api = segments.first() == Some(&"raw");
        if is_raw_api {
            segments.remove(0);
        }
        let owner = segments
            .first()
            .ok_or_else(|| invalid("need at least host and owner"))?
            .to_string();
        let repo = segments.get(1).map(|s| s.to_string()).unwrap_or_default();

        let raw_url = is_raw_host(&host) || is_raw_api;
        let mut kind = None;
        let mut sha_alias = String::new();
        let mut path = String::new();

        if segments.len() > 2 {
            let (resource_type, rest) = if raw_url {
                sha_alias = segments[2].to_string();
                (ResourceType::Raw, &segments[3..])
            } else {
                let resource_type = ResourceType::parse(segments[2]).ok_or_else(|| {
                    invalid(&format!("unknown resource type '{}'", segments[2]))
                })?;
                if resource_type.is_versioned() {
                    match segments.get(3) {
                        Some(alias) => {
                            sha_alias = alias.to_string();
                            (resource_type, &segments[4..])
                        }
                        None => {
                            sha_alias = "master".to_string();
                            (resource_type, &segments[3..])
                        }
                    }
                } else {
                    (resource_type, &segments[3..])
                }
            };
            kind = Some(resource_type);
            path = rest.join("/");
        }

        if let Some(query) = url.query() {
            path = format!("{path}?{query}");
        }
        if let Some(fragment) = url.fragment() {
            path = format!("{path}#{fragment}");
        }

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            owner,
            repo,
            kind,
            path,
            sha_alias,
            sha: String::new(),
            is_raw_api,
        })
    }

    /// Path without `?query` and `#fragment`.
    pub fn clean_path(&self) -> &str {
        split_suffix(&self.path).0.trim_end_matches('/')
    }

    /// `scheme://host/owner/repo`, the key of local mappings.
    pub fn repo_url(&self) -> String {
        format!("{}://{}/{}/{}", self.scheme, self.host, self.owner, self.repo)
    }

    /// Raw content URL for blob and raw locators.
    pub fn raw(&self) -> Option<String> {
        match self.kind {
            Some(ResourceType::Blob | ResourceType::Raw) => {
                let mut raw = self.clone();
                raw.kind = Some(ResourceType::Raw);
                Some(raw.to_string())
            }
            _ => None,
        }
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.clean_path().rsplit('/').next().unwrap_or_default()
    }

    /// API host for this locator's repository.
    pub fn api_host(&self) -> &str {
        if self.host == "raw.githubusercontent.com" {
            "github.com"
        } else if let Some(stripped) = self.host.strip_prefix("raw.") {
            stripped
        } else {
            &self.host
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = format!("{}://{}", self.scheme, self.host);
        if self.is_raw_api {
            return write!(
                f,
                "{base}/raw/{}/{}/{}/{}",
                self.owner, self.repo, self.sha_alias, self.path
            );
        }
        if self.repo.is_empty() {
            return write!(f, "{base}/{}", self.owner);
        }
        if is_raw_host(&self.host) {
            return write!(
                f,
                "{base}/{}/{}/{}/{}",
                self.owner, self.repo, self.sha_alias, self.path
            );
        }
        let Some(kind) = self.kind else {
            return write!(f, "{base}/{}/{}", self.owner, self.repo);
        };
        let prefix = format!("{base}/{}/{}/{kind}", self.owner, self.repo);
        match (self.sha_alias.is_empty(), self.path.is_empty()) {
            (false, false) => write!(f, "{prefix}/{}/{}", self.sha_alias, self.path),
            (false, true) if kind.is_versioned() => write!(f, "{prefix}/{}", self.sha_alias),
            (_, false) => write!(f, "{prefix}/{}", self.path),
            _ => f.write_str(&prefix),
        }
    }
}
