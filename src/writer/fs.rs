//! Filesystem writer.

use std::fs;
use std::path::{Path, PathBuf};

use crate::debug;

use super::{WriteError, Writer};

/// Writes below `root`, creating directories as needed.
#[derive(Debug, Clone)]
pub struct FsWriter {
    root: PathBuf,
}

impl FsWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
    }
}

impl Writer for FsWriter {
    fn write(&self, name: &str, path: &str, content: &[u8]) -> Result<(), WriteError> {
        let dir = self.dir(path);
        fs::create_dir_all(&dir).map_err(|e| WriteError::Io(dir.clone(), e))?;
        let file = dir.join(name);
        fs::write(&file, content).map_err(|e| WriteError::Io(file.clone(), e))?;
        debug!("write"; "{} ({} bytes)", file.display(), content.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let writer = FsWriter::new(dir.path());
        writer.write("a.md", "docs/guide", b"# A").unwrap();
        writer.write("root.md", "", b"").unwrap();

        let written = fs::read_to_string(dir.path().join("docs/guide/a.md")).unwrap();
        assert_eq!(written, "# A");
        assert_eq!(fs::metadata(dir.path().join("root.md")).unwrap().len(), 0);
    }

    #[test]
    fn test_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let writer = FsWriter::new(dir.path().join("out"));
        writer.write("a.md", "./x", b"one").unwrap();
        writer.write("a.md", "x", b"two").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out/x/a.md")).unwrap(), "two");
    }
}
