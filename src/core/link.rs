//! Link classification.

/// Syntactic classification of a link destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind<'a> {
    /// Has a URL scheme (`https://`, `mailto:`, `file:`...).
    Absolute(&'a str),
    /// Pure fragment (`#section`). Value excludes `#`.
    Fragment(&'a str),
    /// Site-root path (`/about`).
    SiteRoot(&'a str),
    /// Relative to the linking document (`./a.md`, `../img.png`, `a.md`).
    Relative(&'a str),
}

impl<'a> LinkKind<'a> {
    #[inline]
    pub fn parse(link: &'a str) -> Self {
        if is_absolute_link(link) {
            Self::Absolute(link)
        } else if let Some(anchor) = link.strip_prefix('#') {
            Self::Fragment(anchor)
        } else if link.starts_with('/') {
            Self::SiteRoot(link)
        } else {
            Self::Relative(link)
        }
    }

    #[inline]
    pub fn is_relative(&self) -> bool {
        matches!(self, Self::Relative(_))
    }
}

/// True when `link` starts with a URL scheme (`scheme:`).
///
/// Scheme chars per RFC 3986: alphanumerics plus `+ - .`. A single letter
/// followed by `:` is a Windows drive, not a scheme.
#[inline]
pub fn is_absolute_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 1
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Split off `#fragment` and `?query` suffixes: `("a/b.md", "?x=1#top")`.
#[inline]
pub fn split_suffix(link: &str) -> (&str, &str) {
    match link.find(['?', '#']) {
        Some(i) => (&link[..i], &link[i..]),
        None => (link, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute() {
        assert_eq!(
            LinkKind::parse("https://example.com/a.md"),
            LinkKind::Absolute("https://example.com/a.md")
        );
        assert_eq!(
            LinkKind::parse("mailto:user@example.com"),
            LinkKind::Absolute("mailto:user@example.com")
        );
        assert!(LinkKind::parse("C:/docs/a.md").is_relative());
    }

    #[test]
    fn test_parse_fragment_and_root() {
        assert_eq!(LinkKind::parse("#usage"), LinkKind::Fragment("usage"));
        assert_eq!(LinkKind::parse("#"), LinkKind::Fragment(""));
        assert_eq!(LinkKind::parse("/about"), LinkKind::SiteRoot("/about"));
    }

    #[test]
    fn test_parse_relative() {
        assert!(LinkKind::parse("./a/b.md").is_relative());
        assert!(LinkKind::parse("../img.png").is_relative());
        assert!(LinkKind::parse("a.md#top").is_relative());
        // colon after a slash is not a scheme
        assert!(LinkKind::parse("docs/a:b.md").is_relative());
    }

    #[test]
    fn test_split_suffix() {
        assert_eq!(split_suffix("a/b.md#top"), ("a/b.md", "#top"));
        assert_eq!(split_suffix("a.md?x=1#y"), ("a.md", "?x=1#y"));
        assert_eq!(split_suffix("a.md"), ("a.md", ""));
    }
}
