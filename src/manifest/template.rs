//! Manifest templating.
//!
//! Manifests are rendered with `minijinja` before they are parsed. The
//! context holds the configured variables plus the reserved `versions`
//! variable; `Split` and `Add` are available as functions:
//!
//! ```yaml
//! structure:
//! {% for v in Split(versions, ",") %}
//!   - name: "{{ v }}"
//!     source: https://github.com/org/repo/blob/{{ v }}/README.md
//! {% endfor %}
//! ```

use std::collections::BTreeMap;

use minijinja::Environment;

use super::ManifestError;

/// Reserved variable holding the target branch and selected tags.
pub const VERSIONS_VAR: &str = "versions";

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_function("Split", |s: String, sep: String| -> Vec<String> {
        s.split(sep.as_str()).map(str::to_string).collect()
    });
    env.add_function("Add", |a: i64, b: i64| -> i64 { a + b });
    env
}

/// Render `content` against `vars`.
pub fn render(content: &str, vars: &BTreeMap<String, String>) -> Result<String, ManifestError> {
    if !content.contains("{{") && !content.contains("{%") {
        return Ok(content.to_string());
    }
    Ok(environment().render_str(content, vars)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_split_and_add() {
        let out = render(
            "{% for v in Split(versions, \",\") %}{{ Add(loop.index0, 1) }}:{{ v }} {% endfor %}",
            &vars(&[("versions", "master,v1.2")]),
        )
        .unwrap();
        assert_eq!(out, "1:master 2:v1.2 ");
    }

    #[test]
    fn test_render_plain_content_untouched() {
        let yaml = "structure:\n- source: https://x/a.md\n";
        assert_eq!(render(yaml, &BTreeMap::new()).unwrap(), yaml);
    }

    #[test]
    fn test_render_keeps_trailing_newline() {
        let out = render("name: {{ n }}\n", &vars(&[("n", "x")])).unwrap();
        assert_eq!(out, "name: x\n");
    }

    #[test]
    fn test_render_syntax_error() {
        let err = render("{% for %}", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ManifestError::Template(_)));
    }
}
