//! `[build]` section configuration.
//!
//! ```toml
//! [build]
//! manifest = "docs/manifest.yaml"   # local path or repository URL
//! destination = "hugo/content"
//! resources_path = "__resources"    # downloads, relative to destination
//! fail_fast = false
//! document_workers = 25
//! download_workers = 10
//! validation_workers = 10
//! skip_link_validation = false
//! extracted_formats = [".md"]       # files picked up by node selectors
//! content_formats = [".md"]         # suffixes accepted for document names
//! rewrite_embedded = true           # embedded images use raw links
//! git_info_destination = "gitinfo"  # optional, relative to destination
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub manifest: String,
    pub destination: PathBuf,
    pub resources_path: String,
    /// Abort on the first failing document instead of collecting errors.
    pub fail_fast: bool,
    /// Print the projected tree instead of writing files.
    pub dry_run: bool,
    /// Print the resolved manifest and exit.
    pub resolve: bool,
    pub document_workers: usize,
    pub download_workers: usize,
    pub validation_workers: usize,
    pub skip_link_validation: bool,
    pub extracted_formats: Vec<String>,
    pub content_formats: Vec<String>,
    pub rewrite_embedded: bool,
    pub git_info_destination: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            manifest: String::new(),
            destination: PathBuf::new(),
            resources_path: "__resources".to_string(),
            fail_fast: false,
            dry_run: false,
            resolve: false,
            document_workers: 25,
            download_workers: 10,
            validation_workers: 10,
            skip_link_validation: false,
            extracted_formats: vec![".md".to_string()],
            content_formats: vec![".md".to_string()],
            rewrite_embedded: true,
            git_info_destination: None,
        }
    }
}
