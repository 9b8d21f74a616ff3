//! Configuration sections of `docforge.toml`.

mod build;
mod github;
mod hugo;
mod versions;

pub use build::BuildConfig;
pub use github::GitHubConfig;
pub use hugo::HugoConfig;
pub use versions::{DEFAULT_KEY, VersionsConfig};
