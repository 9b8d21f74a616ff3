//! The document job: one task per node of the resolved forest.
//!
//! Documents are read, run through the processor chain and written;
//! containers only produce a section file when they carry front-matter
//! (Hugo mode).

use crate::core::Context;
use crate::jobs::{WorkQueue, Worker, WorkerError};
use crate::logger::ProgressLine;
use crate::node::{Forest, NodeId};
use crate::processors::{Processor, ProcessorChain};
use crate::writer::{self, Layout, Writer};
use crate::{debug, log};

use super::ReactorError;
use super::content::ContentReader;
use super::gitinfo::{GitInfoScheduler, GitInfoTask};

pub struct DocumentWorker<'a> {
    pub forest: &'a Forest,
    pub reader: ContentReader<'a>,
    pub chain: ProcessorChain,
    pub layout: Layout,
    pub writer: &'a dyn Writer,
    pub git_info: Option<&'a dyn GitInfoScheduler>,
    pub progress: Option<&'a ProgressLine>,
}

impl DocumentWorker<'_> {
    fn process(&self, ctx: &Context, id: NodeId) -> Result<(), ReactorError> {
        let node = &self.forest[id];
        let name = self.forest.full_name(id, "/");

        if !node.is_document() {
            if let Some((target, fm)) = self.layout.section(self.forest, id) {
                debug!("document"; "section file of {name}");
                let bytes = writer::render(&fm, "", &name)?;
                self.writer.write(&target.name, &target.path, &bytes)?;
            }
            return Ok(());
        }

        let Some(mut document) = self.reader.read(id)? else {
            log!("warning"; "no content read for node {name} ({})", node.sources());
            return Ok(());
        };
        self.chain.process(&mut document, self.forest)?;

        let target = self.layout.document(self.forest, id);
        let bytes = writer::render(&document.front_matter, &document.content, &name)?;
        self.writer.write(&target.name, &target.path, &bytes)?;
        debug!("document"; "{name} written as {}/{}", target.path, target.name);

        if let Some(git_info) = self.git_info {
            let source = match node.multi_source.first() {
                Some(first) if node.source.is_empty() => first.clone(),
                _ => node.source.clone(),
            };
            if !source.is_empty() {
                git_info.schedule(
                    ctx,
                    GitInfoTask {
                        source,
                        path: target.path,
                        name: target.name,
                    },
                )?;
            }
        }
        Ok(())
    }
}

impl Worker for DocumentWorker<'_> {
    type Task = NodeId;

    fn work(&self, ctx: &Context, id: NodeId, _: &WorkQueue<NodeId>) -> Result<(), WorkerError> {
        if ctx.is_done() {
            return Ok(());
        }
        let result = self.process(ctx, id);
        if let Some(progress) = self.progress {
            progress.inc("documents");
        }
        result.map_err(|err| {
            log!("error"; "{}: {err}", self.forest.full_name(id, "/"));
            WorkerError::new(err, 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dashmap::DashMap;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::node::{FRONTMATTER_PROPERTY, Node};
    use crate::processors::FrontMatterInjector;
    use crate::reactor::content::testing::Recorder;
    use crate::reactor::links::{LinkRules, SourceLocations};
    use crate::resource::Registry;
    use crate::resource::testing::MemoryHandler;
    use crate::writer::{DryRunWriter, WriteError};

    #[derive(Default)]
    struct Scheduled(Mutex<Vec<GitInfoTask>>);

    impl GitInfoScheduler for Scheduled {
        fn schedule(&self, _: &Context, task: GitInfoTask) -> Result<(), ReactorError> {
            self.0.lock().push(task);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Captured(Mutex<Vec<(String, String)>>);

    impl Writer for Captured {
        fn write(&self, name: &str, path: &str, content: &[u8]) -> Result<(), WriteError> {
            let text = String::from_utf8_lossy(content).into_owned();
            self.0.lock().push((format!("{path}/{name}"), text));
            Ok(())
        }
    }

    /// `docs/{README.md, empty.md}` with section front-matter on `docs`.
    fn forest() -> (Forest, NodeId, NodeId, NodeId) {
        let mut forest = Forest::new();
        let mut docs = Node::container("docs");
        docs.properties
            .insert(FRONTMATTER_PROPERTY.into(), json!({"title": "Docs"}));
        let docs = forest.insert(docs);
        let readme = forest.insert(Node::document("README.md", "mem://README.md"));
        let empty = forest.insert(Node::document("empty.md", "mem://empty.md"));
        forest.append_child(docs, readme);
        forest.append_child(docs, empty);
        forest.push_root(docs);
        (forest, docs, readme, empty)
    }

    fn run(hugo: bool, ids: impl Fn(&Forest) -> Vec<NodeId>) -> (Vec<(String, String)>, Vec<GitInfoTask>) {
        let (forest, ..) = forest();
        let registry = Registry::new(vec![Arc::new(MemoryHandler::with_files(&[(
            "README.md",
            "---\nweight: 1\n---\n# Docs\n",
        )]))]);
        let ctx = Context::background();
        let rules = LinkRules::default();
        let locations = SourceLocations::index(&forest);
        let prefetched = DashMap::new();
        let recorder = Recorder::default();
        let formats = vec![".md".to_string()];
        let captured = Captured::default();
        let scheduled = Scheduled::default();
        let index_names = vec!["readme.md".to_string()];

        let worker = DocumentWorker {
            forest: &forest,
            reader: ContentReader {
                ctx: &ctx,
                forest: &forest,
                registry: &registry,
                rules: &rules,
                locations: &locations,
                prefetched: &prefetched,
                downloads: &recorder,
                validator: &recorder,
                resources_path: "__resources",
                rewrite_embedded: true,
                content_formats: &formats,
            },
            chain: ProcessorChain::new().with(FrontMatterInjector::new(index_names.clone())),
            layout: Layout::new(hugo, index_names),
            writer: &captured,
            git_info: Some(&scheduled),
            progress: None,
        };
        let queue = WorkQueue::unbounded();
        for id in ids(&forest) {
            worker.work(&ctx, id, &queue).unwrap();
        }
        drop(worker);
        (captured.0.into_inner(), scheduled.0.into_inner())
    }

    #[test]
    fn test_document_is_written_with_front_matter() {
        let (written, git) = run(false, |f| f.documents());
        assert_eq!(
            written,
            vec![(
                "docs/README.md".to_string(),
                "---\ntitle: Docs\nweight: 1\n---\n# Docs\n".to_string()
            )]
        );
        assert_eq!(
            git,
            vec![GitInfoTask {
                source: "mem://README.md".into(),
                path: "docs".into(),
                name: "README.md".into(),
            }]
        );
    }

    #[test]
    fn test_hugo_index_file_becomes_section() {
        let (written, _) = run(true, |f| f.walk_all());
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, "docs/_index.md");
    }

    #[test]
    fn test_container_section_file() {
        let (written, _) = run(true, |f| vec![f.roots()[0]]);
        // README.md is a section document, so the container writes nothing
        assert!(written.is_empty());

        let (mut forest, docs, readme, _) = forest();
        forest.remove_child(docs, readme);
        let layout = Layout::new(true, vec!["readme.md".into()]);
        let (target, fm) = layout.section(&forest, docs).unwrap();
        assert_eq!((target.path.as_str(), target.name.as_str()), ("docs", "_index.md"));
        assert_eq!(fm["title"], "Docs");
    }

    #[test]
    fn test_done_context_skips_work() {
        let (forest, _, readme, _) = forest();
        let dry = DryRunWriter::new();
        let target = dry.target("out");
        let ctx = Context::background();
        ctx.cancel();
        let registry = Registry::default();
        let rules = LinkRules::default();
        let locations = SourceLocations::default();
        let prefetched = DashMap::new();
        let recorder = Recorder::default();
        let worker = DocumentWorker {
            forest: &forest,
            reader: ContentReader {
                ctx: &ctx,
                forest: &forest,
                registry: &registry,
                rules: &rules,
                locations: &locations,
                prefetched: &prefetched,
                downloads: &recorder,
                validator: &recorder,
                resources_path: "__resources",
                rewrite_embedded: false,
                content_formats: &[],
            },
            chain: ProcessorChain::new(),
            layout: Layout::default(),
            writer: &target,
            git_info: None,
            progress: None,
        };
        worker.work(&ctx, readme, &WorkQueue::unbounded()).unwrap();
        assert!(dry.files().is_empty());
    }
}
