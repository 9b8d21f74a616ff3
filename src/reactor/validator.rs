//! External link validation.
//!
//! Links that no handler can take over are checked with a `HEAD` request,
//! retried as `GET` when the server rejects `HEAD`. Failures are only
//! reported; they never fail the build.

use std::time::Duration;

use crossbeam::channel;
use dashmap::DashSet;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use url::Url;

use crate::core::Context;
use crate::jobs::{Controller, WorkQueue, Worker, WorkerError};
use crate::resource::{Registry, ResourceError};
use crate::{debug, log};

/// Seconds to wait between attempts answered with `429`.
const RETRY_INTERVALS: [u64; 4] = [1, 5, 10, 20];
/// Longest `Retry-After` honoured, in seconds.
const MAX_RETRY_AFTER: u64 = 5 * 60;
const USER_AGENT: &str = concat!("docforge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTask {
    pub link: String,
    /// Source of the document holding the link.
    pub referer: String,
}

/// Accepts links to check while documents are processed.
pub trait LinkValidator: Send + Sync {
    fn validate(&self, ctx: &Context, link: &str, referer: &str);
}

/// Used with `skip_link_validation`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipValidation;

impl LinkValidator for SkipValidation {
    fn validate(&self, _: &Context, _: &str, _: &str) {}
}

impl LinkValidator for Controller<Validator> {
    fn validate(&self, ctx: &Context, link: &str, referer: &str) {
        let task = ValidationTask {
            link: link.to_string(),
            referer: referer.to_string(),
        };
        if !self.enqueue(ctx, task) {
            debug!("validate"; "validation of {link} from {referer} not scheduled");
        }
    }
}

pub struct Validator {
    client: Client,
    registry: Registry,
    /// `scheme://host/path` of links already checked.
    validated: DashSet<String>,
}

impl Validator {
    pub fn new(registry: Registry) -> Result<Self, ResourceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ResourceError::Http("client".to_string(), e))?;
        Ok(Self {
            client,
            registry,
            validated: DashSet::new(),
        })
    }

    pub fn is_validated(&self, link: &str) -> bool {
        Url::parse(link).is_ok_and(|u| self.validated.contains(&unified(&u)))
    }

    fn check(&self, ctx: &Context, task: &ValidationTask) {
        let Ok(url) = Url::parse(&task.link) else {
            log!("warning"; "invalid link {} in {}", task.link, task.referer);
            return;
        };
        let host = url.host_str().unwrap_or_default();
        if is_sample_host(host) {
            return;
        }
        let key = unified(&url);
        if self.validated.contains(&key) {
            return;
        }

        let mut client = self.client.clone();
        if let Some(handler) = self.registry.get(&task.link) {
            if handler.build_abs_link(&task.referer, &task.link).is_ok() {
                self.validated.insert(key);
                return;
            }
            if let Some(c) = handler.client() {
                client = c;
            }
        }

        let mut status = self.send(ctx, &client, reqwest::Method::HEAD, &task.link);
        if matches!(&status, Ok(s) if is_failure(*s)) {
            status = self.send(ctx, &client, reqwest::Method::GET, &task.link);
        }
        match status {
            Ok(s) if is_failure(s) => {
                log!("warning"; "failed to validate absolute link {} from source {}: HTTP status {s}",
                    task.link, task.referer);
            }
            Ok(_) => debug!("validate"; "{} ok", task.link),
            Err(e) => {
                log!("warning"; "failed to validate absolute link {} from source {}: {e}",
                    task.link, task.referer);
            }
        }
        self.validated.insert(key);
    }

    /// Send a request, retrying while the server answers `429`.
    fn send(
        &self,
        ctx: &Context,
        client: &Client,
        method: reqwest::Method,
        link: &str,
    ) -> Result<StatusCode, reqwest::Error> {
        let mut response = client.request(method.clone(), link).send()?;
        for interval in &RETRY_INTERVALS[..RETRY_INTERVALS.len() - 1] {
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                break;
            }
            let wait = retry_after(&response).unwrap_or(*interval);
            channel::select! {
                recv(ctx.done()) -> _ => break,
                default(Duration::from_secs(wait)) => {}
            }
            response = client.request(method.clone(), link).send()?;
        }
        Ok(response.status())
    }
}

impl Worker for Validator {
    type Task = ValidationTask;

    fn work(&self, ctx: &Context, task: ValidationTask, _: &WorkQueue<ValidationTask>) -> Result<(), WorkerError> {
        if !ctx.is_done() {
            self.check(ctx, &task);
        }
        Ok(())
    }
}

/// Hosts used in documentation samples.
fn is_sample_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "1.2.3.4") || host.contains("foo.bar")
}

/// Errors other than authorization failures.
fn is_failure(status: StatusCode) -> bool {
    status.as_u16() >= 400 && status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN
}

/// Link without query, fragment and user info.
fn unified(url: &Url) -> String {
    let mut out = format!("{}://", url.scheme());
    if let Some(host) = url.host_str() {
        out.push_str(host);
    }
    if let Some(port) = url.port() {
        out.push_str(&format!(":{port}"));
    }
    out.push_str(url.path());
    out
}

fn retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .filter(|&s| s <= MAX_RETRY_AFTER)
}
