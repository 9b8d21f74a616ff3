//! `href`/`src` attribute rewriting inside raw HTML.

use std::sync::LazyLock;

use regex::Regex;

static HTML_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<prefix><\b[^>]*?\b(?i:href|src)\s*=\s*)(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^'">\s]+))"#,
    )
    .expect("valid regex")
});

/// Feed every `href`/`src` value in `html` to `rewrite` along with whether
/// the tag is an `<img>`. Returns the new HTML when any value changed.
///
/// Quoting is preserved: only the bytes of the value are replaced. An
/// empty replacement of an unquoted value is written as `""`.
pub fn rewrite_html_links<F>(html: &str, mut rewrite: F) -> Option<String>
where
    F: FnMut(&str, bool) -> Option<String>,
{
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    let mut changed = false;

    for caps in HTML_LINK.captures_iter(html) {
        let bare = caps.name("bare").is_some();
        let Some(value) = caps
            .name("dq")
            .or_else(|| caps.name("sq"))
            .or_else(|| caps.name("bare"))
        else {
            continue;
        };
        let is_image = caps
            .name("prefix")
            .is_some_and(|p| p.as_str().get(..4).is_some_and(|t| t.eq_ignore_ascii_case("<img")));

        if let Some(new) = rewrite(value.as_str(), is_image) {
            if new != value.as_str() {
                out.push_str(&html[last..value.start()]);
                out.push_str(if bare && new.is_empty() { "\"\"" } else { &new });
                last = value.end();
                changed = true;
            }
        }
    }

    if !changed {
        return None;
    }
    out.push_str(&html[last..]);
    Some(out)
}
