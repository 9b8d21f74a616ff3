//! Slash-separated path algebra.
//!
//! Node paths, repository paths and URL paths are always `/`-separated
//! regardless of the host platform, so these helpers work on `&str` instead
//! of `std::path`. Filesystem paths go through [`normalize_path`] and
//! [`expand_home`].

use std::path::{Path, PathBuf};

/// Lexically clean a slash path: collapse `//`, resolve `.` and `..`.
///
/// Rooted paths never climb above `/`. An empty result becomes `.`.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|last| *last != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            s => out.push(s),
        }
    }
    let joined = out.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join and clean. Empty elements are skipped.
pub fn join(parts: &[&str]) -> String {
    let filtered: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    if filtered.is_empty() {
        return String::new();
    }
    clean(&filtered.join("/"))
}

/// Everything before the last `/`, cleaned.
pub fn dir(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => clean(&path[..i]),
        None => ".".to_string(),
    }
}

/// Last segment, ignoring trailing slashes.
pub fn base(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Extension of the last segment including the dot, or `""`.
pub fn ext(path: &str) -> &str {
    let b = base(path);
    match b.rfind('.') {
        Some(i) if i > 0 || b.len() > 1 => &b[i..],
        _ => "",
    }
}

/// Split `name.ext` into `("name", ".ext")`.
pub fn split_ext(name: &str) -> (&str, &str) {
    let e = ext(name);
    (&name[..name.len() - e.len()], e)
}

/// Name and extension of a link's last segment, ignoring `?query` and
/// `#fragment`: `https://x/a/img.png?raw=true` -> `("img", ".png")`.
pub fn resource_name(link: &str) -> (String, String) {
    let (path, _) = crate::core::link::split_suffix(link);
    let (name, ext) = split_ext(base(path));
    (name.to_string(), ext.to_string())
}

/// Expand `~` and `$VAR` in user supplied paths.
pub fn expand_home(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Normalize a filesystem path to absolute form.
///
/// Canonicalizes when the path exists, otherwise joins with the current
/// directory.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Forward-slash rendering of a relative filesystem path.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean("a/b/../c"), "a/c");
        assert_eq!(clean("/a/./b//c/"), "/a/b/c");
        assert_eq!(clean("/../a"), "/a");
        assert_eq!(clean("../a/../../b"), "../../b");
        assert_eq!(clean(""), ".");
        assert_eq!(clean("./"), ".");
    }

    #[test]
    fn test_join_and_dir() {
        assert_eq!(join(&["docs", "", "../img/a.png"]), "img/a.png");
        assert_eq!(dir("/owner/repo/docs/README.md"), "/owner/repo/docs");
        assert_eq!(dir("README.md"), ".");
        assert_eq!(dir("/a"), "/");
    }

    #[test]
    fn test_base_and_ext() {
        assert_eq!(base("docs/guide/"), "guide");
        assert_eq!(base("a/b.md"), "b.md");
        assert_eq!(ext("a/b.tar.gz"), ".gz");
        assert_eq!(ext("a/README"), "");
        assert_eq!(ext(".gitignore"), ".gitignore");
        assert_eq!(split_ext("img.png"), ("img", ".png"));
    }

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(
            resource_name("https://github.com/org/repo/blob/master/img.png?raw=true"),
            ("img".to_string(), ".png".to_string())
        );
        assert_eq!(
            resource_name("https://github.com/org/repo/tree/master/docs"),
            ("docs".to_string(), String::new())
        );
        assert_eq!(resource_name("./a/README.md#top").0, "README");
    }
}
