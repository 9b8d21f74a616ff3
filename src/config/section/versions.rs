//! `[versions]` section configuration.
//!
//! Keys are manifest URIs; `default` applies to any URI without its own
//! entry.
//!
//! ```toml
//! [versions.default_branches]
//! default = "master"
//! "https://github.com/org/repo/blob/DEFAULT_BRANCH/manifest.yaml" = "main"
//!
//! [versions.n_versions]
//! default = 0
//! "https://github.com/org/repo/blob/DEFAULT_BRANCH/manifest.yaml" = 4
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_KEY: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionsConfig {
    pub default_branches: BTreeMap<String, String>,
    pub n_versions: BTreeMap<String, i64>,
}
