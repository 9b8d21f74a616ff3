//! `[hugo]` section configuration.
//!
//! ```toml
//! [hugo]
//! enabled = true
//! pretty_urls = true
//! base_url = "/docs"
//! index_file_names = ["readme.md", "README.md"]
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HugoConfig {
    pub enabled: bool,
    /// `a/b.md` links become `a/b`; otherwise `a/b.html`.
    pub pretty_urls: bool,
    pub base_url: String,
    /// Peers promoted to the section file (`_index.md`), in priority order.
    pub index_file_names: Vec<String>,
}

impl Default for HugoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pretty_urls: true,
            base_url: String::new(),
            index_file_names: vec!["readme.md".to_string(), "README.md".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_hugo_config() {
        let config = test_parse_config("[hugo]\nenabled = true\nbase_url = \"/docs\"");
        assert!(config.hugo.enabled);
        assert!(config.hugo.pretty_urls);
        assert_eq!(config.hugo.base_url, "/docs");
        assert_eq!(config.hugo.index_file_names, vec!["readme.md", "README.md"]);
    }
}
