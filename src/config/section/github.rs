//! `[github]` section configuration.
//!
//! ```toml
//! [github]
//! accepted_hosts = ["github.com", "raw.githubusercontent.com"]
//!
//! [github.oauth_env]
//! "github.com" = "GITHUB_TOKEN"
//!
//! [github.resource_mappings]
//! "https://github.com/org/repo" = "~/src/repo"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Hosts served by the GitHub handler (Enterprise hosts go here too).
    pub accepted_hosts: Vec<String>,
    /// Host -> environment variable holding an access token.
    pub oauth_env: BTreeMap<String, String>,
    /// Repository URL -> local checkout used instead of the remote.
    pub resource_mappings: BTreeMap<String, PathBuf>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            accepted_hosts: vec![
                "github.com".to_string(),
                "raw.githubusercontent.com".to_string(),
            ],
            oauth_env: BTreeMap::new(),
            resource_mappings: BTreeMap::new(),
        }
    }
}

impl GitHubConfig {
    /// Token for `host` read from its configured environment variable.
    pub fn token(&self, host: &str) -> Option<String> {
        let var = self.oauth_env.get(host)?;
        std::env::var(var).ok().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_github_config() {
        let config = test_parse_config(
            "[github.oauth_env]\n\"github.com\" = \"DOCFORGE_TEST_TOKEN_UNSET\"\n[github.resource_mappings]\n\"https://github.com/org/repo\" = \"/tmp/repo\"",
        );
        assert_eq!(config.github.accepted_hosts.len(), 2);
        assert_eq!(config.github.token("github.com"), None);
        assert_eq!(
            config.github.resource_mappings["https://github.com/org/repo"].to_str(),
            Some("/tmp/repo")
        );
    }
}
