//! `build` and `resolve` commands.

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::config::Config;
use crate::core::Context;
use crate::debug;
use crate::reactor::Reactor;
use crate::resource::fs::FsHandler;
use crate::resource::github::GitHubHandler;
use crate::resource::{Registry, ResourceHandler};

/// Handlers for every accepted GitHub host, then the local filesystem.
///
/// Hosts are grouped by the API serving them, so `github.com` and
/// `raw.githubusercontent.com` share one handler and its caches.
pub fn registry(config: &Config) -> Result<Registry> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for host in &config.github.accepted_hosts {
        let api = api_host(host);
        match groups.iter_mut().find(|(h, _)| *h == api) {
            Some((_, hosts)) => hosts.push(host.clone()),
            None => groups.push((api, vec![host.clone()])),
        }
    }

    let mut registry = Registry::default();
    for (api, hosts) in groups {
        let mut scoped = config.clone();
        scoped.github.accepted_hosts = hosts;
        let handler = GitHubHandler::rest(&scoped, &api)
            .with_context(|| format!("failed to set up GitHub handler for {api}"))?;
        debug!("resource"; "github handler for {api}: {:?}", scoped.github.accepted_hosts);
        registry.load(Arc::new(handler));
    }
    let fs: Arc<dyn ResourceHandler> = Arc::new(FsHandler::new(config.build.extracted_formats.clone()));
    registry.load(fs);
    Ok(registry)
}

fn api_host(host: &str) -> String {
    if host == "raw.githubusercontent.com" {
        "github.com".to_string()
    } else {
        host.strip_prefix("raw.").unwrap_or(host).to_string()
    }
}

/// Resolve and write the bundle (or only print it in resolve mode).
pub fn build(ctx: &Context, config: &Config) -> Result<()> {
    let reactor = Reactor::new(config.clone(), registry(config)?);
    reactor
        .run(ctx)
        .with_context(|| format!("failed to build {}", config.build.manifest))
}

/// Print the resolved manifest.
pub fn resolve(ctx: &Context, config: &Config) -> Result<()> {
    let mut config = config.clone();
    config.build.resolve = true;
    build(ctx, &config)
}
