//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Build documentation bundles from manifests spanning many repositories
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: docforge.toml when present)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve the manifest and write the documentation bundle
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Print the resolved manifest and exit
    #[command(visible_alias = "r")]
    Resolve {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Rebuild whenever the local manifest or mapped resources change
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

/// Build arguments shared by every subcommand
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Manifest file path or repository URL
    #[arg(short = 'f', long, value_hint = clap::ValueHint::AnyPath)]
    pub manifest: Option<String>,

    /// Destination directory for the bundle
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub destination: Option<PathBuf>,

    /// Downloaded resources directory, relative to the destination
    #[arg(long)]
    pub resources_path: Option<String>,

    /// Abort on the first error instead of collecting them
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub fail_fast: Option<bool>,

    /// Print the projected file tree instead of writing it
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum parallel document workers
    #[arg(long)]
    pub document_workers: Option<usize>,

    /// Maximum parallel download workers
    #[arg(long)]
    pub download_workers: Option<usize>,

    /// Maximum parallel link validation workers
    #[arg(long)]
    pub validation_workers: Option<usize>,

    /// Do not probe external links
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub skip_link_validation: Option<bool>,

    /// Embedded images link to the raw resource instead of the blob page
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub rewrite_embedded: Option<bool>,

    /// Write git info JSON files under this directory (relative to destination)
    #[arg(long)]
    pub git_info_destination: Option<String>,

    /// Suffixes of files picked up by node selectors
    #[arg(long, value_delimiter = ',')]
    pub extracted_formats: Vec<String>,

    /// Suffixes accepted for document names
    #[arg(long, value_delimiter = ',')]
    pub content_formats: Vec<String>,

    /// Emit Hugo-compatible output
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub hugo: Option<bool>,

    /// Rewrite links for Hugo pretty URLs
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub hugo_pretty_urls: Option<bool>,

    /// Prefix for links to structure nodes and resources in Hugo mode
    #[arg(long, value_hint = clap::ValueHint::Url)]
    pub hugo_base_url: Option<String>,

    /// File names promoted to Hugo section files, in priority order
    #[arg(long, value_delimiter = ',')]
    pub hugo_section_files: Vec<String>,

    /// Template variables (key=value), repeatable
    #[arg(long = "variables", value_parser = parse_key_val, value_delimiter = ',')]
    pub variables: Vec<(String, String)>,

    /// Environment variable holding the token per host (host=VAR)
    #[arg(long = "github-oauth-env-map", value_parser = parse_key_val, value_delimiter = ',')]
    pub github_oauth_env: Vec<(String, String)>,

    /// Serve a repository from a local directory (url=dir)
    #[arg(long = "resource-mappings", value_parser = parse_key_val, value_delimiter = ',')]
    pub resource_mappings: Vec<(String, String)>,

    /// Default branch per manifest URI (uri=branch; key `default` for all)
    #[arg(long = "default-branches", value_parser = parse_key_val, value_delimiter = ',')]
    pub default_branches: Vec<(String, String)>,

    /// Number of versions per manifest URI (uri=N; key `default` for all)
    #[arg(long = "n-versions", value_parser = parse_key_int, value_delimiter = ',')]
    pub n_versions: Vec<(String, i64)>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

/// Split on the last `=` so URIs containing `=` keep working as keys.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.rsplit_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("invalid key=value: `{s}`")),
    }
}

fn parse_key_int(s: &str) -> Result<(String, i64), String> {
    let (k, v) = parse_key_val(s)?;
    let n = v
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid number in `{s}`: {e}"))?;
    Ok((k, n))
}

#[allow(unused)]
impl Cli {
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build { .. })
    }
    pub const fn is_resolve(&self) -> bool {
        matches!(self.command, Commands::Resolve { .. })
    }
    pub const fn is_watch(&self) -> bool {
        matches!(self.command, Commands::Watch { .. })
    }

    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Build { build_args }
            | Commands::Resolve { build_args }
            | Commands::Watch { build_args } => build_args,
        }
    }
}
