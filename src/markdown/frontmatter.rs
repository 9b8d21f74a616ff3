//! YAML front-matter: split, insert, render and rule matching.
//!
//! Front-matter is a YAML block between two `---` lines at the head of a
//! document. Only whitespace may precede the opening marker; anything else
//! means the document has no front-matter.

use std::collections::BTreeMap;
use std::ops::Range;

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("Missing closing frontmatter `---` found")]
    NotClosed,
    #[error("invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("frontmatter must be a mapping")]
    NotAMapping,
}

/// Byte layout of a front-matter block inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// YAML between the markers, including its trailing newline.
    pub yaml: Range<usize>,
    /// First byte after the closing marker line.
    pub content_start: usize,
}

/// Locate the front-matter block, if any.
pub fn layout(text: &str) -> Result<Option<Layout>, FrontMatterError> {
    let mut yaml_start: Option<usize> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if line.trim() != "---" {
            if yaml_start.is_none() && !line.trim().is_empty() {
                return Ok(None);
            }
            continue;
        }

        match yaml_start {
            None => yaml_start = Some(offset),
            Some(start) => {
                return Ok(Some(Layout {
                    yaml: start..line_start,
                    content_start: offset,
                }));
            }
        }
    }

    match yaml_start {
        Some(_) => Err(FrontMatterError::NotClosed),
        None => Ok(None),
    }
}

/// Split into `(front-matter yaml, content)`. Documents without
/// front-matter return an empty yaml string.
pub fn strip(text: &str) -> Result<(&str, &str), FrontMatterError> {
    Ok(match layout(text)? {
        Some(l) => (&text[l.yaml], &text[l.content_start..]),
        None => ("", text),
    })
}

/// Prepend `fm` enclosed in `---` markers. Empty `fm` returns `content`.
pub fn insert(fm: &str, content: &str) -> String {
    if fm.is_empty() {
        return content.to_string();
    }
    let newline = if fm.ends_with('\n') { "" } else { "\n" };
    format!("---\n{fm}{newline}---\n{content}")
}

/// Strip and deserialize the front-matter into a map.
pub fn parse(text: &str) -> Result<(Map<String, Value>, &str), FrontMatterError> {
    let (yaml, content) = strip(text)?;
    Ok((parse_yaml(yaml)?, content))
}

pub fn parse_yaml(yaml: &str) -> Result<Map<String, Value>, FrontMatterError> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(FrontMatterError::NotAMapping),
    }
}

/// Render a map as YAML with keys sorted. Empty maps render as `""`.
pub fn render(fm: &Map<String, Value>) -> Result<String, FrontMatterError> {
    if fm.is_empty() {
        return Ok(String::new());
    }
    let sorted: BTreeMap<&String, &Value> = fm.iter().collect();
    Ok(serde_yaml::to_string(&sorted)?)
}

// ============================================================================
// Rule matching
// ============================================================================

/// True when some element of `data` sits at a path matching `pattern` and
/// deep-equals `value`.
///
/// Paths start at `.`; object keys append `.key`, array elements `[i]`:
/// `.a.b[1].c`. One `**` in the pattern matches any run of segments,
/// including none.
pub fn match_rule(pattern: &str, value: &Value, data: &Value) -> bool {
    match_at(pattern, value, ".", data)
}

fn match_at(pattern: &str, value: &Value, path: &str, data: &Value) -> bool {
    if match_path(pattern, path) && value == data {
        return true;
    }
    match data {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .any(|(i, item)| match_at(pattern, value, &format!("{path}[{i}]"), item)),
        Value::Object(map) => map.iter().any(|(key, item)| {
            let child = if path.ends_with('.') {
                format!("{path}{key}")
            } else {
                format!("{path}.{key}")
            };
            match_at(pattern, value, &child, item)
        }),
        _ => false,
    }
}

pub fn match_path(pattern: &str, path: &str) -> bool {
    if pattern == path {
        return true;
    }
    match pattern.split_once("**") {
        Some((prefix, suffix)) if !suffix.contains("**") => {
            // `**` standing for no segment at all: `.a.**.c` matches `.a.c`
            let collapsed = format!("{}{suffix}", prefix.trim_end_matches('.'));
            path == collapsed
                || (path.len() >= prefix.len() + suffix.len()
                    && path.starts_with(prefix)
                    && path.ends_with(suffix))
        }
        _ => false,
    }
}

/// Whether a document passes the include/exclude rule sets.
///
/// Without include rules every document is included; exclusion wins over
/// inclusion.
pub fn match_front_matter(
    text: &str,
    include: Option<&Map<String, Value>>,
    exclude: Option<&Map<String, Value>>,
) -> Result<bool, FrontMatterError> {
    let (fm, _) = parse(text)?;
    let data = Value::Object(fm);

    let included = match include {
        Some(rules) if !rules.is_empty() => rules
            .iter()
            .any(|(pattern, value)| match_rule(pattern, value, &data)),
        _ => true,
    };
    let excluded = exclude.is_some_and(|rules| {
        rules
            .iter()
            .any(|(pattern, value)| match_rule(pattern, value, &data))
    });
    Ok(included && !excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip() {
        let (fm, content) = strip("---\ntitle: A\n---\n# Body\n").unwrap();
        assert_eq!(fm, "title: A\n");
        assert_eq!(content, "# Body\n");
    }

    #[test]
    fn test_strip_leading_whitespace() {
        let (fm, content) = strip("\n  \n---\na: 1\n---\ntext").unwrap();
        assert_eq!(fm, "a: 1\n");
        assert_eq!(content, "text");
    }

    #[test]
    fn test_strip_without_frontmatter() {
        let text = "# Title\n---\nnot: fm\n---\n";
        assert_eq!(strip(text).unwrap(), ("", text));
        assert_eq!(strip("").unwrap(), ("", ""));
    }

    #[test]
    fn test_strip_closing_at_eof() {
        let (fm, content) = strip("---\na: 1\n---").unwrap();
        assert_eq!(fm, "a: 1\n");
        assert_eq!(content, "");
    }

    #[test]
    fn test_strip_not_closed() {
        let err = strip("---\na: 1\n").unwrap_err();
        assert_eq!(err.to_string(), "Missing closing frontmatter `---` found");
    }

    #[test]
    fn test_insert_then_strip_keeps_content() {
        let content = "# Heading\n\ntext\n";
        let doc = insert("title: T\n", content);
        assert_eq!(doc, "---\ntitle: T\n---\n# Heading\n\ntext\n");
        assert_eq!(strip(&doc).unwrap().1, content);
        assert_eq!(insert("", content), content);
    }

    #[test]
    fn test_render_sorted() {
        let mut fm = Map::new();
        fm.insert("title".into(), json!("T"));
        fm.insert("aliases".into(), json!(["/a"]));
        assert_eq!(render(&fm).unwrap(), "aliases:\n- /a\ntitle: T\n");
        assert_eq!(render(&Map::new()).unwrap(), "");
    }

    #[test]
    fn test_match_rule_paths() {
        let data = json!({
            "title": "Guide",
            "tags": ["a", "b"],
            "meta": {"level": {"deep": 3}, "draft": false}
        });
        assert!(match_rule(".title", &json!("Guide"), &data));
        assert!(match_rule(".tags[1]", &json!("b"), &data));
        assert!(match_rule(".meta.level.deep", &json!(3), &data));
        assert!(match_rule(".meta.**.deep", &json!(3), &data));
        assert!(match_rule(".**", &json!(false), &data));
        assert!(match_rule(".", &data, &data));
        assert!(!match_rule(".tags[0]", &json!("b"), &data));
        assert!(!match_rule(".meta.draft", &json!(true), &data));
    }

    #[test]
    fn test_match_path_wildcard() {
        assert!(match_path(".a.**.c", ".a.b.x.c"));
        assert!(!match_path(".a.**.c", ".b.x.c"));
        assert!(!match_path(".a.**.**.c", ".a.b.c"));
    }

    #[test]
    fn test_match_path_wildcard_matches_no_segment() {
        assert!(match_path(".a.**.c", ".a.c"));
        assert!(match_path(".**.c", ".c"));
        assert!(match_path(".a.**", ".a"));
        assert!(match_path(".a.**", ".a.b[0]"));
        assert!(!match_path(".a.**.c", ".ac"));
        assert!(!match_path(".a.**.c", ".a.b"));
        assert!(match_rule(".a.**.c", &json!(1), &json!({"a": {"c": 1}})));
    }

    #[test]
    fn test_match_front_matter() {
        let doc = "---\ntype: faq\ndraft: true\n---\n# Q\n";
        let include = json!({".type": "faq"});
        let exclude = json!({".draft": true});

        assert!(match_front_matter(doc, include.as_object(), None).unwrap());
        assert!(!match_front_matter(doc, include.as_object(), exclude.as_object()).unwrap());
        assert!(match_front_matter("# no fm", None, exclude.as_object()).unwrap());
        assert!(!match_front_matter("# no fm", include.as_object(), None).unwrap());
    }
}
