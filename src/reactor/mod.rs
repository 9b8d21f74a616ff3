//! Build orchestration.
//!
//! # Module Structure
//!
//! ```text
//! reactor/
//! ├── resolver.rs    # manifest -> resolved forest (selectors, nested manifests)
//! ├── links.rs       # rewrite/download rules, structure index
//! ├── content.rs     # document parts, link resolution
//! ├── document.rs    # document job: read, process, write
//! ├── download.rs    # resource download job
//! ├── validator.rs   # external link checks
//! ├── gitinfo.rs     # git history export
//! └── mod.rs         # Reactor (this file)
//! ```
//!
//! # Build
//!
//! ```text
//! resolve ──► collisions ──► document job ──┬──► writer
//!                                           ├──► downloads   (controller)
//!                                           ├──► validation  (controller)
//!                                           └──► git info    (controller)
//! ```
//!
//! The forest is read-only once resolved; the document job and the three
//! controllers share it by reference inside one thread scope.

pub mod content;
pub mod document;
pub mod download;
pub mod gitinfo;
pub mod links;
pub mod resolver;
pub mod validator;

pub use resolver::{Resolved, Resolver};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam::channel;
use thiserror::Error;

use crate::config::Config;
use crate::core::Context;
use crate::jobs::{Controller, Job, MultiError, WorkQueue, WorkerError};
use crate::logger::ProgressLine;
use crate::manifest::collision::check_collisions;
use crate::manifest::ManifestError;
use crate::markdown::FrontMatterError;
use crate::node::NodeError;
use crate::processors::{FrontMatterInjector, HugoLinkRewriter, ProcessingError, ProcessorChain};
use crate::resource::{Registry, ResourceError};
use crate::utils::plural_count;
use crate::writer::{DryRunWriter, FsWriter, Layout, WriteError, Writer};
use crate::{debug, log};

use content::ContentReader;
use document::DocumentWorker;
use download::{DOWNLOAD_QUEUE_SIZE, Downloader};
use gitinfo::{GitInfoScheduler, GitInfoWorker};
use links::{LinkRules, SourceLocations};
use validator::{LinkValidator, SkipValidation, Validator};

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("{0} is not a manifest")]
    NotAManifest(String),

    #[error("document structure resolved to an empty list")]
    EmptyStructure,

    #[error("invalid exclude path expression `{0}`")]
    ExcludePattern(String, #[source] regex::Error),

    #[error("invalid front-matter in {0}")]
    FrontMatter(String, #[source] FrontMatterError),

    #[error("reference {reference} from referer {referer}: {source}")]
    Download {
        reference: String,
        referer: String,
        source: Box<ReactorError>,
    },

    #[error("`{0}` must be at least 1")]
    NoWorkers(&'static str),

    #[error("scheduling {reference} referenced by {referer} failed")]
    Schedule { reference: String, referer: String },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl Resolved {
    /// The resolved manifest as YAML.
    pub fn to_yaml(&self) -> Result<String, ReactorError> {
        serde_yaml::to_string(&self.documentation())
            .map_err(|e| ReactorError::Manifest(e.into()))
    }
}

/// Output roots of a build.
struct Outputs {
    documents: Arc<dyn Writer>,
    resources: Arc<dyn Writer>,
    git_info: Option<Arc<dyn Writer>>,
    dry_run: Option<DryRunWriter>,
}

pub struct Reactor {
    config: Config,
    registry: Registry,
}

impl Reactor {
    pub fn new(config: Config, registry: Registry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the configured manifest and check the result for peers
    /// sharing a file name.
    pub fn resolve(&self, ctx: &Context) -> Result<Resolved, ReactorError> {
        let manifest = &self.config.build.manifest;
        log!("resolve"; "{manifest}");
        let resolved = Resolver::new(ctx, &self.registry, &self.config).resolve(manifest)?;
        check_collisions(&resolved.forest).into_result()?;
        Ok(resolved)
    }

    /// Resolve, then print the manifest (`resolve` mode) or build it.
    pub fn run(&self, ctx: &Context) -> Result<(), ReactorError> {
        let resolved = self.resolve(ctx)?;
        if self.config.build.resolve {
            print!("{}", resolved.to_yaml()?);
            return Ok(());
        }
        self.build(ctx, &resolved)
    }

    fn outputs(&self) -> Outputs {
        let build = &self.config.build;
        let resources_path = build.resources_path.trim_start_matches('/');

        if build.dry_run {
            let dry = DryRunWriter::new();
            let root = build.destination.to_string_lossy();
            return Outputs {
                documents: Arc::new(dry.target(&root)),
                resources: Arc::new(dry.target(&format!("{}/{resources_path}", root.trim_end_matches('/')))),
                git_info: build
                    .git_info_destination
                    .as_deref()
                    .map(|dir| Arc::new(dry.target(dir)) as Arc<dyn Writer>),
                dry_run: Some(dry),
            };
        }

        Outputs {
            documents: Arc::new(FsWriter::new(&build.destination)),
            resources: Arc::new(FsWriter::new(build.destination.join(resources_path))),
            git_info: build
                .git_info_destination
                .as_deref()
                .map(|dir| Arc::new(FsWriter::new(dir)) as Arc<dyn Writer>),
            dry_run: None,
        }
    }

    fn chain(&self) -> ProcessorChain {
        let hugo = &self.config.hugo;
        let chain = ProcessorChain::new().with(FrontMatterInjector::new(hugo.index_file_names.clone()));
        if !hugo.enabled {
            return chain;
        }
        chain.with(HugoLinkRewriter::new(
            hugo.pretty_urls,
            hugo.base_url.clone(),
            hugo.index_file_names.clone(),
        ))
    }

    /// Process and write every node of `resolved`.
    ///
    /// Downloads, link validation and git info run beside the document job
    /// and are drained once it is done. With `fail_fast` the first error
    /// aborts everything; otherwise all errors are reported together.
    pub fn build(&self, ctx: &Context, resolved: &Resolved) -> Result<(), ReactorError> {
        let build = &self.config.build;
        // a job without workers never drains what the documents enqueue
        for (name, workers, used) in [
            ("document_workers", build.document_workers, true),
            ("download_workers", build.download_workers, true),
            ("validation_workers", build.validation_workers, !build.skip_link_validation),
        ] {
            if used && workers == 0 {
                return Err(ReactorError::NoWorkers(name));
            }
        }
        let hugo = &self.config.hugo;
        let forest = &resolved.forest;
        let tasks = forest.walk_all();
        let documents = forest.documents().len();
        let outputs = self.outputs();

        let progress = Arc::new(ProgressLine::new(&[("documents", tasks.len()), ("downloads", 0)]));

        let downloader = Downloader::new(self.registry.clone(), Arc::clone(&outputs.resources))
            .with_progress(Arc::clone(&progress));
        let downloads = Controller::new(
            Job::new("Download", downloader, WorkQueue::bounded(DOWNLOAD_QUEUE_SIZE))
                .with_workers(build.download_workers, build.download_workers)
                .with_fail_fast(build.fail_fast),
        );
        let validation = if build.skip_link_validation {
            None
        } else {
            Some(Controller::new(
                Job::new("Validator", Validator::new(self.registry.clone())?, WorkQueue::unbounded())
                    .with_workers(build.validation_workers, build.validation_workers),
            ))
        };
        let git_info = outputs.git_info.as_ref().map(|writer| {
            Controller::new(
                Job::new("GitInfo", GitInfoWorker::new(self.registry.clone(), Arc::clone(writer)), WorkQueue::unbounded())
                    .with_workers(build.download_workers, build.download_workers)
                    .with_fail_fast(build.fail_fast),
            )
        });

        let rules = LinkRules::new(resolved.links.clone());
        let locations = SourceLocations::index(forest);
        debug!("build"; "{} source locations indexed", locations.len());
        let content_formats = self.config.content_formats();
        let skip = SkipValidation;
        let validator: &dyn LinkValidator = match &validation {
            Some(controller) => controller,
            None => &skip,
        };

        let (err_tx, err_rx) = channel::unbounded::<WorkerError>();
        let result = thread::scope(|s| {
            let err_tx = &err_tx;
            let downloads = &downloads;
            s.spawn(move || downloads.start(ctx, err_tx, None));
            if let Some(controller) = &validation {
                s.spawn(move || controller.start(ctx, err_tx, None));
            }
            if let Some(controller) = &git_info {
                s.spawn(move || controller.start(ctx, err_tx, None));
            }

            let worker = DocumentWorker {
                forest,
                reader: ContentReader {
                    ctx,
                    forest,
                    registry: &self.registry,
                    rules: &rules,
                    locations: &locations,
                    prefetched: &resolved.prefetched,
                    downloads,
                    validator,
                    resources_path: &build.resources_path,
                    rewrite_embedded: build.rewrite_embedded,
                    content_formats: &content_formats,
                },
                chain: self.chain(),
                layout: Layout::new(hugo.enabled, hugo.index_file_names.clone()),
                writer: outputs.documents.as_ref(),
                git_info: git_info.as_ref().map(|c| c as &dyn GitInfoScheduler),
                progress: Some(progress.as_ref()),
            };
            let job = Job::new("Document", worker, WorkQueue::unbounded())
                .with_workers(0, build.document_workers)
                .with_fail_fast(build.fail_fast);
            let result = job.dispatch(ctx, tasks);

            if build.fail_fast && result.is_err() {
                downloads.shutdown();
                validation.iter().for_each(Controller::shutdown);
                git_info.iter().for_each(Controller::shutdown);
            } else {
                downloads.stop(None);
                validation.iter().for_each(|c| c.stop(None));
                git_info.iter().for_each(|c| c.stop(None));
            }
            result
        });

        let mut errors: Vec<WorkerError> = result.err().into_iter().collect();
        errors.extend(err_rx.try_iter());

        drop((downloads, validation, git_info));
        if let Ok(progress) = Arc::try_unwrap(progress) {
            progress.finish();
        }
        self.log_rate_limits(ctx);

        if let Some(dry) = &outputs.dry_run {
            dry.flush(&mut io::stdout().lock())
                .map_err(|e| WriteError::Io(PathBuf::from("<stdout>"), e))?;
        }

        if errors.is_empty() {
            log!("build"; "{} written to {}", plural_count(documents, "document"),
                build.destination.display());
            return Ok(());
        }
        if build.fail_fast {
            return Err(errors.swap_remove(0).into());
        }
        let mut multi = MultiError::default();
        for err in errors {
            multi.push(err);
        }
        Err(WorkerError::new(multi, 0).into())
    }

    fn log_rate_limits(&self, ctx: &Context) {
        for handler in self.registry.handlers() {
            match handler.rate_limit(ctx) {
                Ok(rate) if rate.limit >= 0 => {
                    let reset = rate.reset.map(|t| t.to_string()).unwrap_or_default();
                    log!("resource"; "{} rate limit: {}/{} remaining, reset {reset}",
                        handler.name(), rate.remaining, rate.limit);
                }
                Ok(_) => {}
                Err(e) => debug!("resource"; "{} rate limit unavailable: {e}", handler.name()),
            }
        }
    }
}
