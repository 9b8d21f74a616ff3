//! Dry-run writer: records writes and prints the projected tree.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::utils::path::join;

use super::{WriteError, Writer};

/// Shared record of every file the build would write.
///
/// Each output root (documents, resources, git info) gets its own
/// [`DryRunTarget`] via [`DryRunWriter::target`]; all of them feed the
/// same record.
#[derive(Debug)]
pub struct DryRunWriter {
    files: Arc<Mutex<BTreeMap<String, usize>>>,
    started: Instant,
}

impl Default for DryRunWriter {
    fn default() -> Self {
        Self {
            files: Arc::default(),
            started: Instant::now(),
        }
    }
}

impl DryRunWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self, root: &str) -> DryRunTarget {
        DryRunTarget {
            root: root.trim_end_matches('/').to_string(),
            files: Arc::clone(&self.files),
        }
    }

    /// Recorded paths with their sizes, sorted.
    pub fn files(&self) -> Vec<(String, usize)> {
        self.files
            .lock()
            .iter()
            .map(|(path, size)| (path.clone(), *size))
            .collect()
    }

    /// Print the tree followed by the elapsed time.
    pub fn flush(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_all(format_tree(&self.files()).as_bytes())?;
        writeln!(
            out,
            "\nBuild finished in {:.3} seconds",
            self.started.elapsed().as_secs_f64()
        )
    }
}

/// [`Writer`] recording into a [`DryRunWriter`].
#[derive(Debug, Clone)]
pub struct DryRunTarget {
    root: String,
    files: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl Writer for DryRunTarget {
    fn write(&self, name: &str, path: &str, content: &[u8]) -> Result<(), WriteError> {
        let file = join(&[&self.root, path, name]);
        self.files.lock().insert(file, content.len());
        Ok(())
    }
}

/// Indented tree, two spaces per level, directories printed once.
fn format_tree(files: &[(String, usize)]) -> String {
    let mut out = String::new();
    let mut printed: Vec<&str> = Vec::new();
    for (path, size) in files {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for (depth, segment) in segments.iter().enumerate() {
            let end = segments[..=depth].iter().map(|s| s.len() + 1).sum::<usize>() - 1;
            let prefix = &path.trim_start_matches('/')[..end];
            let is_file = depth + 1 == segments.len();
            if !is_file && printed.contains(&prefix) {
                continue;
            }
            printed.push(prefix);
            out.push_str(&"  ".repeat(depth));
            out.push_str(segment);
            if is_file {
                out.push_str(&format!(" ({size} B)"));
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_every_target() {
        let dry = DryRunWriter::new();
        let docs = dry.target("out");
        let resources = dry.target("out/__resources");
        docs.write("_index.md", "docs/guide", b"# Guide").unwrap();
        docs.write("setup.md", "docs/guide", b"").unwrap();
        resources.write("img_abc123.png", "", &[0; 12]).unwrap();

        assert_eq!(
            dry.files(),
            vec![
                ("out/__resources/img_abc123.png".to_string(), 12),
                ("out/docs/guide/_index.md".to_string(), 7),
                ("out/docs/guide/setup.md".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_format_tree() {
        let files = vec![
            ("dev/__resources/a.png".to_string(), 10),
            ("dev/doc/README.md".to_string(), 3),
            ("dev/doc/gardener/_index.md".to_string(), 1),
            ("dev/doc/gardener/concepts/apiserver.md".to_string(), 2),
        ];
        let expected = "\
dev
  __resources
    a.png (10 B)
  doc
    README.md (3 B)
    gardener
      _index.md (1 B)
      concepts
        apiserver.md (2 B)
";
        assert_eq!(format_tree(&files), expected);
    }

    #[test]
    fn test_flush_reports_time() {
        let dry = DryRunWriter::new();
        dry.target("out").write("a.md", "", b"x").unwrap();
        let mut buf = Vec::new();
        dry.flush(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("out\n  a.md (1 B)\n"));
        assert!(text.contains("Build finished in"));
    }
}
