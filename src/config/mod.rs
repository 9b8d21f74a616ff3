//! Configuration for `docforge.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [build], [hugo], [versions], [github]
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! └── mod.rs         # Config (this file)
//! ```
//!
//! # Sections
//!
//! | Section        | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | `[build]`      | Manifest, destination, workers, formats            |
//! | `[hugo]`       | Hugo output conventions (pretty URLs, base URL)    |
//! | `[versions]`   | Default branches and version counts per manifest   |
//! | `[variables]`  | Template variables for manifests                   |
//! | `[github]`     | Accepted hosts, tokens, local repository mappings  |
//!
//! Values from the command line override the file. The resulting [`Config`]
//! is passed explicitly to every stage of a build.

pub mod section;
pub mod types;

pub use section::{BuildConfig, GitHubConfig, HugoConfig, VersionsConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{BuildArgs, Cli};
use crate::log;
use crate::utils::path::{expand_home, normalize_path};

/// Config file looked up in the working directory when `-C` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "docforge.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Absolute path of the loaded file, empty when running on defaults.
    #[serde(skip)]
    pub config_path: PathBuf,

    pub build: BuildConfig,
    pub hugo: HugoConfig,
    pub versions: VersionsConfig,
    pub variables: BTreeMap<String, String>,
    pub github: GitHubConfig,

    /// Branch and version maps given on the command line. They take
    /// precedence over `versions` for the URIs they name.
    #[serde(skip)]
    pub version_flags: VersionsConfig,
}

impl Config {
    /// Load from the file named by `-C` (or `docforge.toml` when present)
    /// and apply command-line overrides.
    pub fn load(cli: &Cli, args: &BuildArgs) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.clone()).into());
                }
                Self::from_path(path)?
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_path(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_build_args(args);
        config.normalize_paths();
        config.validate()?;
        Ok(config)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a file, warning about keys that are not recognized.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if !ignored.is_empty() {
            log!("warning"; "unknown fields in {}, ignoring:", path.display());
            for field in &ignored {
                eprintln!("- {field}");
            }
        }

        config.config_path = normalize_path(path);
        Ok(config)
    }

    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    fn apply_build_args(&mut self, args: &BuildArgs) {
        crate::logger::set_verbose(args.verbose);

        let build = &mut self.build;
        Self::update_option(&mut build.manifest, args.manifest.as_ref());
        Self::update_option(&mut build.destination, args.destination.as_ref());
        Self::update_option(&mut build.resources_path, args.resources_path.as_ref());
        Self::update_option(&mut build.fail_fast, args.fail_fast.as_ref());
        Self::update_option(&mut build.document_workers, args.document_workers.as_ref());
        Self::update_option(&mut build.download_workers, args.download_workers.as_ref());
        Self::update_option(&mut build.validation_workers, args.validation_workers.as_ref());
        Self::update_option(&mut build.skip_link_validation, args.skip_link_validation.as_ref());
        Self::update_option(&mut build.rewrite_embedded, args.rewrite_embedded.as_ref());
        if args.git_info_destination.is_some() {
            build.git_info_destination = args.git_info_destination.clone();
        }
        if !args.extracted_formats.is_empty() {
            build.extracted_formats = args.extracted_formats.clone();
        }
        if !args.content_formats.is_empty() {
            build.content_formats = args.content_formats.clone();
        }
        build.dry_run |= args.dry_run;

        let hugo = &mut self.hugo;
        Self::update_option(&mut hugo.enabled, args.hugo.as_ref());
        Self::update_option(&mut hugo.pretty_urls, args.hugo_pretty_urls.as_ref());
        Self::update_option(&mut hugo.base_url, args.hugo_base_url.as_ref());
        if !args.hugo_section_files.is_empty() {
            hugo.index_file_names = args.hugo_section_files.clone();
        }

        self.variables.extend(args.variables.iter().cloned());
        self.github.oauth_env.extend(args.github_oauth_env.iter().cloned());
        self.github.resource_mappings.extend(
            args.resource_mappings
                .iter()
                .map(|(url, dir)| (url.clone(), PathBuf::from(dir))),
        );

        self.version_flags
            .default_branches
            .extend(args.default_branches.iter().cloned());
        self.version_flags
            .n_versions
            .extend(args.n_versions.iter().cloned());
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    /// Expand `~` in user paths. Relative paths stay relative to the
    /// working directory.
    fn normalize_paths(&mut self) {
        if let Some(dest) = self.build.destination.to_str()
            && !dest.is_empty()
        {
            self.build.destination = expand_home(dest);
        }
        if !self.build.manifest.contains("://") && !self.build.manifest.is_empty() {
            self.build.manifest = expand_home(&self.build.manifest)
                .to_string_lossy()
                .into_owned();
        }
        for dir in self.github.resource_mappings.values_mut() {
            if let Some(s) = dir.to_str() {
                *dir = expand_home(s);
            }
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        let build = &self.build;

        if build.manifest.is_empty() {
            diag.error_with_hint(
                FieldPath::new("build.manifest"),
                "no manifest given",
                "set `manifest` in [build] or pass --manifest",
            );
        }
        if build.destination.as_os_str().is_empty() && !build.dry_run && !build.resolve {
            diag.error_with_hint(
                FieldPath::new("build.destination"),
                "no destination directory given",
                "set `destination` in [build] or pass --destination",
            );
        }
        for (field, value) in [
            (FieldPath::new("build.document_workers"), build.document_workers),
            (FieldPath::new("build.download_workers"), build.download_workers),
            (FieldPath::new("build.validation_workers"), build.validation_workers),
        ] {
            if value == 0 {
                diag.error(field, "must be at least 1");
            }
        }
        if build.resources_path.trim().is_empty() {
            diag.error(FieldPath::new("build.resources_path"), "must not be empty");
        }
        for (field, formats) in [
            (FieldPath::new("build.extracted_formats"), &build.extracted_formats),
            (FieldPath::new("build.content_formats"), &build.content_formats),
        ] {
            if let Some(bad) = formats.iter().find(|f| !f.starts_with('.')) {
                diag.error_with_hint(
                    field,
                    format!("`{bad}` is not a file suffix"),
                    format!("write it as `.{bad}`"),
                );
            }
        }
        if let Some((uri, n)) = self
            .versions
            .n_versions
            .iter()
            .chain(self.version_flags.n_versions.iter())
            .find(|(_, n)| **n < 0)
        {
            diag.error(
                FieldPath::new("versions.n_versions"),
                format!("negative version count {n} for `{uri}`"),
            );
        }

        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    /// Template variables: file values overridden by flag values.
    pub fn template_variables(&self) -> BTreeMap<String, String> {
        self.variables.clone()
    }

    /// Document and section names must end with one of these suffixes.
    pub fn content_formats(&self) -> Vec<String> {
        if self.build.content_formats.is_empty() {
            vec![".md".to_string()]
        } else {
            self.build.content_formats.clone()
        }
    }
}

/// Parse a config from TOML for tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> Config {
    Config::from_str(content).expect("valid test config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> BuildArgs {
        let mut argv = vec!["docforge", "build"];
        argv.extend_from_slice(extra);
        let cli = Cli::parse_from(argv);
        cli.build_args().clone()
    }

    #[test]
    fn test_parse_with_ignored_reports_unknown() {
        let (config, ignored) =
            Config::parse_with_ignored("[build]\nmanifest = \"m.yaml\"\nbogus = 1\n[nope]\nx = 1")
                .unwrap();
        assert_eq!(config.build.manifest, "m.yaml");
        assert_eq!(ignored.len(), 2);
        assert!(ignored.iter().any(|f| f.contains("bogus")));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = test_parse_config(
            "[build]\nmanifest = \"file.yaml\"\ndocument_workers = 3\n[variables]\nk = \"file\"\nkeep = \"yes\"",
        );
        config.apply_build_args(&args(&[
            "-f",
            "flag.yaml",
            "--variables",
            "k=flag",
            "--default-branches",
            "default=main",
            "--hugo",
        ]));
        assert_eq!(config.build.manifest, "flag.yaml");
        assert_eq!(config.build.document_workers, 3);
        assert_eq!(config.variables["k"], "flag");
        assert_eq!(config.variables["keep"], "yes");
        assert_eq!(config.version_flags.default_branches["default"], "main");
        assert!(config.hugo.enabled);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = test_parse_config(
            "[build]\ndocument_workers = 0\ndownload_workers = 0\ncontent_formats = [\"md\"]\n[versions.n_versions]\ndefault = -1",
        );
        config.build.resources_path = String::new();
        let Err(ConfigError::Diagnostics(diag)) = config.validate() else {
            panic!("expected diagnostics");
        };
        // manifest, destination, two worker counts, resources_path, formats, n_versions
        assert_eq!(diag.len(), 7);
        assert!(diag.errors().iter().any(|d| d.field.as_str() == "build.download_workers"));
    }

    #[test]
    fn test_validate_ok_for_dry_run_without_destination() {
        let mut config = test_parse_config("[build]\nmanifest = \"m.yaml\"\ndry_run = true");
        assert!(config.validate().is_ok());
        config.build.dry_run = false;
        assert!(config.validate().is_err());
    }
}
