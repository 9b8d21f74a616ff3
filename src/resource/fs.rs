//! Local filesystem handler for plain paths and `file://` URIs.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::core::Context;
use crate::core::link::{is_absolute_link, split_suffix};
use crate::utils::path::{clean, dir, normalize_path, to_slash};

use super::{ResourceError, ResourceHandler, TreeEntry};

const FILE_SCHEME: &str = "file://";
const IGNORED_FILES: &[&str] = &[".DS_Store"];

pub struct FsHandler {
    extracted_formats: Vec<String>,
}

impl FsHandler {
    pub fn new(extracted_formats: Vec<String>) -> Self {
        Self { extracted_formats }
    }
}

/// Filesystem path of `uri`.
pub(crate) fn local_path(uri: &str) -> PathBuf {
    let (path, _) = split_suffix(uri.strip_prefix(FILE_SCHEME).unwrap_or(uri));
    PathBuf::from(path)
}

pub(crate) fn read_file(path: &Path, uri: &str) -> Result<Vec<u8>, ResourceError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(Vec::new()),
        Ok(_) => fs::read(path).map_err(|e| ResourceError::Io(uri.to_string(), e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ResourceError::NotFound(uri.to_string())),
        Err(e) => Err(ResourceError::Io(uri.to_string(), e)),
    }
}

/// Files below `root` ending with one of `formats` (case-insensitive), as
/// sorted slash paths relative to `root`.
pub(crate) fn list_files(root: &Path, formats: &[String]) -> Result<Vec<String>, ResourceError> {
    if !root.is_dir() {
        return Err(ResourceError::NotFound(root.display().to_string()));
    }
    let mut files: Vec<String> = WalkDir::new(root)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default().to_ascii_lowercase();
            !IGNORED_FILES.contains(&name.as_str())
                && formats.iter().any(|f| name.ends_with(&f.to_ascii_lowercase()))
        })
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(to_slash)
        })
        .collect();
    files.sort();
    Ok(files)
}

impl ResourceHandler for FsHandler {
    fn name(&self) -> &'static str {
        "fs"
    }

    fn accept(&self, uri: &str) -> bool {
        if uri.starts_with(FILE_SCHEME) {
            return true;
        }
        !is_absolute_link(uri) && local_path(uri).exists()
    }

    fn read(&self, ctx: &Context, uri: &str) -> Result<Vec<u8>, ResourceError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        read_file(&local_path(uri), uri)
    }

    fn file_tree(&self, _ctx: &Context, uri: &str) -> Result<Vec<TreeEntry>, ResourceError> {
        let root = local_path(uri);
        let base = uri.trim_end_matches('/');
        Ok(list_files(&root, &self.extracted_formats)?
            .into_iter()
            .map(|path| TreeEntry {
                source: format!("{base}/{path}"),
                path,
            })
            .collect())
    }

    fn build_abs_link(&self, source: &str, link: &str) -> Result<String, ResourceError> {
        let (link_path, suffix) = split_suffix(link);
        let scheme = if source.starts_with(FILE_SCHEME) { FILE_SCHEME } else { "" };
        let source_path = to_slash(&local_path(source));

        let joined = if link_path.starts_with('/') {
            clean(link_path)
        } else {
            let cleaned = clean(&format!("{}/{link_path}", dir(&source_path)));
            if cleaned.starts_with('/') {
                cleaned
            } else {
                to_slash(&normalize_path(Path::new(&cleaned)))
            }
        };

        let abs = format!("{scheme}{joined}{suffix}");
        if Path::new(&joined).exists() {
            Ok(abs)
        } else {
            Err(ResourceError::NotFound(abs))
        }
    }
}
