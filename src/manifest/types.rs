//! Serialized manifest model.
//!
//! These are the shapes read from and written to manifest YAML. After
//! parsing, the structure is loaded into a [`Forest`](crate::node::Forest)
//! where parents become index relations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form node properties (`frontmatter`, `index`, ...).
pub type Properties = Map<String, Value>;

/// Top-level manifest entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Documentation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub structure: Vec<NodeDef>,
    #[serde(rename = "nodesSelector", skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<NodeSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Value>,
}

/// One node of the declared structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeDef {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub multi_source: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content_selectors: Vec<ContentSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeDef>,
    #[serde(rename = "nodesSelector", skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<NodeSelector>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

/// A source plus an optional selector expression into its content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSelector {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// A template document whose named sections are filled from selectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    pub path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sections: BTreeMap<String, ContentSelector>,
}

/// Dynamic expansion of a container from a resource tree or nested manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSelector {
    pub path: String,
    /// Regexes matched against child paths relative to `path`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
    /// Path pattern -> expected value; documents must match one rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_matter: Option<Properties>,
    /// Path pattern -> value; documents matching any rule are dropped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_front_matter: Option<Properties>,
    /// Maximum depth below `path`. Zero or less is unbounded.
    #[serde(skip_serializing_if = "is_zero")]
    pub depth: i32,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

/// Link rewriting and download configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Links {
    /// Regex -> rule. A `null` rule removes every matching link.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub rewrites: BTreeMap<String, Option<LinkRewriteRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Downloads>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRewriteRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `Some("")` removes the link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Regex -> name pattern (`$name`, `$hash`, `$uuid`, `$ext`).
pub type RenameRules = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Downloads {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub renames: RenameRules,
    /// Regex over absolute links -> renames applied within that scope.
    /// A `null` scope downloads matches with the default name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub scope: BTreeMap<String, Option<RenameRules>>,
}

impl NodeDef {
    /// A document has content assigned; everything else is a container.
    pub fn is_document(&self) -> bool {
        !self.source.is_empty()
            || !self.multi_source.is_empty()
            || !self.content_selectors.is_empty()
            || self.template.is_some()
    }
}
