//! Front-matter injection.

use serde_json::Value;

use crate::manifest::types::Properties;
use crate::node::{FRONTMATTER_PROPERTY, Forest, NodeId, SECTION_FILE, is_index_file};

use super::{Document, ProcessingError, Processor};

/// Merges node-declared front-matter into documents and makes sure every
/// document has a `title`.
///
/// Precedence on duplicate keys: the node's `frontmatter` property, then
/// the parent's for section files, then the document's own block.
#[derive(Debug, Clone, Default)]
pub struct FrontMatterInjector {
    pub index_file_names: Vec<String>,
}

impl FrontMatterInjector {
    pub fn new(index_file_names: Vec<String>) -> Self {
        Self { index_file_names }
    }

    /// Title from the node name, or from the parent name for index files.
    pub fn node_title(&self, forest: &Forest, id: NodeId) -> String {
        let node = &forest[id];
        let name = match forest.parent(id) {
            Some(parent) if is_index_file(&node.name, &self.index_file_names) => {
                forest[parent].name.as_str()
            }
            _ => node.name.as_str(),
        };
        title_case(&name.strip_suffix(".md").unwrap_or(name).replace(['_', '-'], " "))
    }
}

fn declared(forest: &Forest, id: NodeId) -> Result<Option<&Properties>, ProcessingError> {
    match forest[id].properties.get(FRONTMATTER_PROPERTY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ProcessingError::FrontMatterProperties(forest.full_name(id, "/"))),
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Processor for FrontMatterInjector {
    fn process(&self, document: &mut Document, forest: &Forest) -> Result<(), ProcessingError> {
        let id = document.node;
        if !forest[id].is_document() {
            return Ok(());
        }

        let mut merged = declared(forest, id)?.cloned().unwrap_or_default();
        if forest[id].name == SECTION_FILE
            && let Some(parent) = forest.parent(id)
            && let Some(parent_fm) = declared(forest, parent)?
        {
            for (k, v) in parent_fm {
                merged.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        for (k, v) in std::mem::take(&mut document.front_matter) {
            merged.entry(k).or_insert(v);
        }
        if !merged.contains_key("title") {
            merged.insert("title".to_string(), Value::String(self.node_title(forest, id)));
        }
        document.front_matter = merged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::frontmatter::{insert, render};
    use crate::node::Node;
    use serde_json::json;

    fn fm(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn run(forest: &Forest, id: NodeId, doc_fm: Properties) -> Properties {
        let mut doc = Document::new(id);
        doc.front_matter = doc_fm;
        FrontMatterInjector::new(vec!["readme.md".into()])
            .process(&mut doc, forest)
            .unwrap();
        doc.front_matter
    }

    #[test]
    fn test_title_from_name() {
        let mut forest = Forest::new();
        let id = forest.insert(Node::document("test-1_2.md", "whatever"));
        forest.push_root(id);

        let out = run(&forest, id, Properties::new());
        let text = insert(&render(&out).unwrap(), "");
        assert_eq!(text, "---\ntitle: Test 1 2\n---\n");
    }

    #[test]
    fn test_node_front_matter_wins() {
        let mut forest = Forest::new();
        let mut node = Node::document("test3", "whatever");
        node.properties = fm(json!({ "frontmatter": { "title": "Test2" } }));
        let id = forest.insert(node);

        let out = run(&forest, id, fm(json!({ "title": "Test1", "prop1": "A" })));
        assert_eq!(out["title"], "Test2");
        assert_eq!(out["prop1"], "A");
    }

    #[test]
    fn test_index_file_takes_parent_name() {
        let mut forest = Forest::new();
        let parent = forest.insert(Node::container("content"));
        let id = forest.insert(Node::document("README.md", "whatever"));
        forest.append_child(parent, id);
        forest.push_root(parent);

        assert_eq!(run(&forest, id, Properties::new())["title"], "Content");
    }

    #[test]
    fn test_section_file_inherits_parent_front_matter() {
        let mut forest = Forest::new();
        let mut parent = Node::container("guides");
        parent.properties = fm(json!({ "frontmatter": { "weight": 5, "title": "Guides" } }));
        let parent = forest.insert(parent);
        let mut section = Node::document(SECTION_FILE, "whatever");
        section.properties = fm(json!({ "frontmatter": { "title": "All guides" } }));
        let id = forest.insert(section);
        forest.append_child(parent, id);

        let out = run(&forest, id, fm(json!({ "weight": 1 })));
        assert_eq!(out["title"], "All guides");
        assert_eq!(out["weight"], 5);
    }

    #[test]
    fn test_containers_untouched_and_bad_properties_rejected() {
        let mut forest = Forest::new();
        let container = forest.insert(Node::container("c"));
        assert!(run(&forest, container, Properties::new()).is_empty());

        let mut node = Node::document("a.md", "whatever");
        node.properties = fm(json!({ "frontmatter": "title: x" }));
        let id = forest.insert(node);
        let mut doc = Document::new(id);
        let err = FrontMatterInjector::default().process(&mut doc, &forest);
        assert!(matches!(err, Err(ProcessingError::FrontMatterProperties(_))));
    }
}
