//! Byte-level scanners locating the components of a link construct.
//!
//! The parser reports the span of each link; these helpers find the text,
//! destination and title ranges inside that span so they can be edited
//! without touching any other byte.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Components {
    pub text: Option<Range<usize>>,
    pub destination: Option<Range<usize>>,
    pub title: Option<Range<usize>>,
}

/// `[text](dest "title")` or `![alt](dest 'title')`.
///
/// Reference forms (`[text][label]`, `[text][]`, `[label]`) yield only the
/// text range.
pub(crate) fn inline_link(src: &str, span: &Range<usize>) -> Option<Components> {
    let b = src.as_bytes();
    let end = span.end.min(b.len());
    let mut i = span.start;
    if b.get(i) == Some(&b'!') {
        i += 1;
    }
    if b.get(i) != Some(&b'[') {
        return None;
    }
    let text_start = i + 1;
    let text_end = closing_bracket(b, text_start, end)?;
    let text = Some(text_start..text_end);

    let mut j = text_end + 1;
    if j >= end || b[j] != b'(' {
        return Some(Components {
            text,
            ..Default::default()
        });
    }
    j = skip_ws(b, j + 1, end);

    let (destination, after) = destination(b, j, end, true)?;
    let title = title(b, skip_ws(b, after, end), end);

    Some(Components {
        text,
        destination: Some(destination),
        title,
    })
}

/// `[label]: dest "title"` reference definition.
pub(crate) fn definition(src: &str, span: &Range<usize>) -> Option<Components> {
    let b = src.as_bytes();
    let end = span.end.min(b.len());
    let mut i = span.start;
    while i < end && b[i] == b' ' {
        i += 1;
    }
    if b.get(i) != Some(&b'[') {
        return None;
    }
    let label_end = closing_bracket(b, i + 1, end)?;
    if b.get(label_end + 1) != Some(&b':') {
        return None;
    }
    let j = skip_ws(b, label_end + 2, end);
    let (destination, after) = destination(b, j, end, false)?;
    let title = title(b, skip_ws(b, after, end), end);

    Some(Components {
        text: None,
        destination: Some(destination),
        title,
    })
}

/// Index of the `]` closing a bracket opened just before `start`.
fn closing_bracket(b: &[u8], start: usize, end: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = start;
    while i < end {
        match b[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'`' => {
                let run = run_length(b, i, end, b'`');
                match find_backtick_run(b, i + run, end, run) {
                    Some(close) => {
                        i = close + run;
                        continue;
                    }
                    None => i += run - 1,
                }
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn run_length(b: &[u8], start: usize, end: usize, ch: u8) -> usize {
    b[start..end].iter().take_while(|&&c| c == ch).count()
}

fn find_backtick_run(b: &[u8], start: usize, end: usize, len: usize) -> Option<usize> {
    let mut i = start;
    while i < end {
        if b[i] == b'`' {
            let run = run_length(b, i, end, b'`');
            if run == len {
                return Some(i);
            }
            i += run;
        } else {
            i += 1;
        }
    }
    None
}

fn skip_ws(b: &[u8], mut i: usize, end: usize) -> usize {
    while i < end && b[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Destination starting at `i`: `<...>` or a run of non-space bytes.
///
/// Returns the destination range (inside angle brackets) and the index
/// after it. Inline destinations stop at an unbalanced `)`.
fn destination(b: &[u8], i: usize, end: usize, inline: bool) -> Option<(Range<usize>, usize)> {
    if b.get(i) == Some(&b'<') {
        let close = find_unescaped(b, i + 1, end, b'>')?;
        return Some((i + 1..close, close + 1));
    }
    let mut j = i;
    let mut depth = 0usize;
    while j < end {
        match b[j] {
            b'\\' => {
                j += 2;
                continue;
            }
            b'(' if inline => depth += 1,
            b')' if inline && depth == 0 => break,
            b')' if inline => depth -= 1,
            c if c.is_ascii_whitespace() => break,
            _ => {}
        }
        j += 1;
    }
    let j = j.min(end);
    Some((i..j, j))
}

/// Title quoted with `"`, `'` or `(...)` starting at `i`; range excludes quotes.
fn title(b: &[u8], i: usize, end: usize) -> Option<Range<usize>> {
    let close = match b.get(i)? {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    if i >= end {
        return None;
    }
    let e = find_unescaped(b, i + 1, end, close)?;
    Some(i + 1..e)
}

fn find_unescaped(b: &[u8], mut i: usize, end: usize, ch: u8) -> Option<usize> {
    while i < end {
        match b[i] {
            b'\\' => i += 2,
            c if c == ch => return Some(i),
            _ => i += 1,
        }
    }
    None
}

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:https?://|\bwww\.)[^\s<>]+|\b[A-Za-z0-9._+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+",
    )
    .expect("valid regex")
});

/// GFM extended autolinks inside a text run: `http(s)://` and `www.` URLs
/// and email addresses, with trailing punctuation and unbalanced closing
/// parentheses trimmed.
pub(crate) fn bare_urls(src: &str, range: &Range<usize>) -> Vec<Range<usize>> {
    let text = &src[range.clone()];
    BARE_URL
        .find_iter(text)
        .filter_map(|m| {
            let mut url = m.as_str();
            loop {
                let trimmed = url.trim_end_matches(['.', ',', ':', ';', '!', '?', '*', '_', '~', '\'', '"']);
                let trimmed = if trimmed.ends_with(')')
                    && trimmed.matches(')').count() > trimmed.matches('(').count()
                {
                    &trimmed[..trimmed.len() - 1]
                } else {
                    trimmed
                };
                if trimmed.len() == url.len() {
                    break;
                }
                url = trimmed;
            }
            let start = range.start + m.start();
            // trimming may leave a bare scheme or `www`
            BARE_URL
                .find(url)
                .is_some_and(|m| m.len() == url.len())
                .then(|| start..start + url.len())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice<'a>(src: &'a str, r: &Option<Range<usize>>) -> Option<&'a str> {
        r.as_ref().map(|r| &src[r.clone()])
    }

    #[test]
    fn test_inline_link_components() {
        let src = r#"see [the `]` docs](./a/b.md "Title \"x\"") now"#;
        let c = inline_link(src, &(4..src.len() - 4)).unwrap();
        assert_eq!(slice(src, &c.text), Some("the `]` docs"));
        assert_eq!(slice(src, &c.destination), Some("./a/b.md"));
        assert_eq!(slice(src, &c.title), Some(r#"Title \"x\""#));
    }

    #[test]
    fn test_image_with_angle_destination_and_paren_title() {
        let src = "![alt [nested]](<img dir/a.png> (cap))";
        let c = inline_link(src, &(0..src.len())).unwrap();
        assert_eq!(slice(src, &c.text), Some("alt [nested]"));
        assert_eq!(slice(src, &c.destination), Some("img dir/a.png"));
        assert_eq!(slice(src, &c.title), Some("cap"));
    }

    #[test]
    fn test_balanced_parens_in_destination() {
        let src = "[w](https://en.wikipedia.org/wiki/Rust_(language))";
        let c = inline_link(src, &(0..src.len())).unwrap();
        assert_eq!(
            slice(src, &c.destination),
            Some("https://en.wikipedia.org/wiki/Rust_(language)")
        );
        assert_eq!(c.title, None);
    }

    #[test]
    fn test_empty_destination_and_reference_form() {
        let src = "[a]()";
        let c = inline_link(src, &(0..src.len())).unwrap();
        assert_eq!(c.destination, Some(4..4));

        let src = "[a][ref]";
        let c = inline_link(src, &(0..src.len())).unwrap();
        assert_eq!(slice(src, &c.text), Some("a"));
        assert_eq!(c.destination, None);
    }

    #[test]
    fn test_definition_components() {
        let src = "[ref]: ../guide.md 'Guide'\n";
        let c = definition(src, &(0..src.len())).unwrap();
        assert_eq!(slice(src, &c.destination), Some("../guide.md"));
        assert_eq!(slice(src, &c.title), Some("Guide"));
        assert_eq!(c.text, None);
    }

    #[test]
    fn test_bare_urls() {
        let src = "Visit https://a.com/x. Or (see https://b.com/y) and http://";
        let urls: Vec<_> = bare_urls(src, &(0..src.len()))
            .into_iter()
            .map(|r| &src[r])
            .collect();
        assert_eq!(urls, vec!["https://a.com/x", "https://b.com/y"]);
    }

    #[test]
    fn test_bare_www_and_email() {
        let src = "Try www.a.com/docs, mail ops@b.io. Not awww.c.com or https://u@d.com/p";
        let urls: Vec<_> = bare_urls(src, &(0..src.len()))
            .into_iter()
            .map(|r| &src[r])
            .collect();
        assert_eq!(urls, vec!["www.a.com/docs", "ops@b.io", "https://u@d.com/p"]);
    }
}
