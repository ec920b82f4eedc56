//! Matching ordered child collections against desired entries

use super::mutation::{ApplyError, Editor, Mutation};
use crate::xml::descriptor::{element, AttrSpec};
use crate::xml::node::{normalize_body, Node};
use std::collections::HashSet;

/// Desired child element, identified by `key`
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: String,
    pub specs: Vec<AttrSpec>,
    pub text: Option<String>,
}

impl Entry {
    pub fn new(key: impl Into<String>, specs: Vec<AttrSpec>) -> Self {
        Self {
            key: key.into(),
            specs,
            text: None,
        }
    }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text;
        self
    }

    fn to_node(&self, tag: &str) -> Node {
        let mut node = element(tag, &self.specs);
        node.text = self.text.clone();
        node
    }
}

/// Keeps the first entry of every key
pub fn dedupe(entries: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    entries.into_iter().filter(|e| seen.insert(e.key.clone())).collect()
}

fn child_path(parent: &[usize], index: usize) -> Vec<usize> {
    let mut path = parent.to_vec();
    path.push(index);
    path
}

/// Brings the attributes at `path` in line with `specs`
///
/// Attributes not named by `specs` are left alone. An unspecified value
/// removes the attribute unless it holds the schema default.
pub fn sync_attributes(editor: &mut Editor, path: &[usize], specs: &[AttrSpec]) -> Result<(), ApplyError> {
    let node = editor.node(path)?;
    let mut changes = Vec::new();
    for spec in specs {
        let existing = node.attribute(spec.name);
        match (spec.written(), existing) {
            (Some(value), Some(current)) if value == current => {}
            (Some(value), _) => changes.push(Mutation::SetAttribute {
                path: path.to_vec(),
                name: spec.name.to_string(),
                value: value.to_string(),
            }),
            (None, None) => {}
            (None, Some(current)) => {
                if spec.value.is_some() || spec.default != Some(current) {
                    changes.push(Mutation::RemoveAttribute {
                        path: path.to_vec(),
                        name: spec.name.to_string(),
                    });
                }
            }
        }
    }
    for change in changes {
        editor.record(change)?;
    }
    Ok(())
}

/// Replaces the text at `path` when its normalized lines differ from `text`
pub fn sync_text(editor: &mut Editor, path: &[usize], text: Option<&str>) -> Result<(), ApplyError> {
    let current = editor.node(path)?.text.as_deref();
    let same = match (current, text) {
        (None, None) => true,
        (Some(a), Some(b)) => normalize_body(a) == normalize_body(b),
        (Some(a), None) => normalize_body(a).is_empty(),
        (None, Some(_)) => false,
    };
    if !same {
        editor.record(Mutation::SetText {
            path: path.to_vec(),
            text: text.map(str::to_string),
        })?;
    }
    Ok(())
}

/// One ordered collection of same-tag children of `parent`
pub struct ChildList<'k> {
    pub tag: &'static str,
    pub key: &'k dyn Fn(&Node) -> Option<String>,
    /// Position for the first entry when none of it exists yet
    pub anchor: &'k dyn Fn(&Node) -> usize,
}

impl ChildList<'_> {
    fn position(&self, parent: &Node, key: &str) -> Option<usize> {
        parent
            .children
            .iter()
            .position(|c| c.local_name() == self.tag && (self.key)(c).as_deref() == Some(key))
    }

    /// Removes stale children, then inserts, moves and updates so the list
    /// matches `entries` in order
    pub fn reconcile(&self, editor: &mut Editor, parent: &[usize], entries: &[Entry]) -> Result<(), ApplyError> {
        let wanted: HashSet<&str> = entries.iter().map(|e| e.key.as_str()).collect();

        let mut kept = HashSet::new();
        let stale: Vec<usize> = editor
            .node(parent)?
            .children_named(self.tag)
            .filter(|(_, child)| match (self.key)(child) {
                Some(key) if wanted.contains(key.as_str()) => !kept.insert(key),
                _ => true,
            })
            .map(|(i, _)| i)
            .collect();
        for index in stale.into_iter().rev() {
            editor.record(Mutation::Remove {
                parent: parent.to_vec(),
                index,
            })?;
        }

        if entries.is_empty() {
            return Ok(());
        }

        let first = (self.anchor)(editor.node(parent)?);
        let mut previous: Option<usize> = None;
        for entry in entries {
            let existing = self.position(editor.node(parent)?, &entry.key);
            let index = match (existing, previous) {
                (None, prev) => {
                    let index = prev.map(|p| p + 1).unwrap_or(first);
                    editor.record(Mutation::Insert {
                        parent: parent.to_vec(),
                        index,
                        node: entry.to_node(self.tag),
                    })?;
                    previous = Some(index);
                    continue;
                }
                (Some(at), None) if first < at => self.relocate(editor, parent, at, first)?,
                (Some(at), None) => at,
                (Some(at), Some(prev)) if at == prev + 1 => at,
                (Some(at), Some(prev)) if at > prev => self.relocate(editor, parent, at, prev + 1)?,
                (Some(at), Some(prev)) => self.relocate(editor, parent, at, prev)?,
            };

            let path = child_path(parent, index);
            sync_attributes(editor, &path, &entry.specs)?;
            sync_text(editor, &path, entry.text.as_deref())?;
            previous = Some(index);
        }
        Ok(())
    }

    fn relocate(&self, editor: &mut Editor, parent: &[usize], from: usize, to: usize) -> Result<usize, ApplyError> {
        editor.record(Mutation::Move {
            parent: parent.to_vec(),
            from,
            to,
        })?;
        Ok(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(node: &Node) -> Option<String> {
        node.attribute("name").map(str::to_string)
    }

    fn first_or_zero(parent: &Node) -> usize {
        parent.first_position(&["item"]).unwrap_or(0)
    }

    fn list() -> ChildList<'static> {
        ChildList {
            tag: "item",
            key: &key,
            anchor: &first_or_zero,
        }
    }

    fn entry(name: &str, value: &str) -> Entry {
        Entry::new(
            name,
            vec![
                AttrSpec::new("name", Some(name.to_string())),
                AttrSpec::new("value", Some(value.to_string())),
            ],
        )
    }

    fn names(node: &Node) -> Vec<&str> {
        node.children.iter().filter_map(|c| c.attribute("name")).collect()
    }

    fn doc(items: &[&str]) -> Node {
        let mut root = Node::new("root").with_child(Node::new("header").with_attribute("name", "header"));
        for item in items {
            root.children.push(
                Node::new("item")
                    .with_attribute("name", *item)
                    .with_attribute("value", "1"),
            );
        }
        root
    }

    #[test]
    fn test_insert_remove_reorder() {
        let mut editor = Editor::new(doc(&["c", "a", "x"]));
        list()
            .reconcile(&mut editor, &[], &[entry("a", "1"), entry("b", "2"), entry("c", "1")])
            .unwrap();
        let (result, mutations) = editor.finish();
        assert_eq!(names(&result), vec!["header", "a", "b", "c"]);
        assert!(mutations.contains(&Mutation::Remove {
            parent: vec![],
            index: 3
        }));

        let mut again = Editor::new(result.clone());
        list()
            .reconcile(&mut again, &[], &[entry("a", "1"), entry("b", "2"), entry("c", "1")])
            .unwrap();
        let (second, mutations) = again.finish();
        assert!(mutations.is_empty(), "{:?}", mutations);
        assert_eq!(second, result);
    }

    #[test]
    fn test_unknown_attributes_preserved() {
        let mut root = doc(&["a"]);
        root.children[1].set_attribute("x-note", "keep");
        let mut editor = Editor::new(root);
        list().reconcile(&mut editor, &[], &[entry("a", "2")]).unwrap();
        let (result, mutations) = editor.finish();
        assert_eq!(mutations.len(), 1);
        assert_eq!(result.children[1].attribute("value"), Some("2"));
        assert_eq!(result.children[1].attribute("x-note"), Some("keep"));
    }

    #[test]
    fn test_duplicate_children_collapse() {
        let mut editor = Editor::new(doc(&["a", "a"]));
        list().reconcile(&mut editor, &[], &[entry("a", "1")]).unwrap();
        let (result, _) = editor.finish();
        assert_eq!(names(&result), vec!["header", "a"]);
    }

    #[test]
    fn test_default_attribute_kept_when_unspecified() {
        let mut editor = Editor::new(Node::new("root").with_attribute("enabled", "true").with_attribute("factory", "f"));
        let specs = vec![
            AttrSpec::with_default("enabled", None, "true"),
            AttrSpec::new("factory", None),
        ];
        sync_attributes(&mut editor, &[], &specs).unwrap();
        let (result, _) = editor.finish();
        assert_eq!(result.attribute("enabled"), Some("true"));
        assert_eq!(result.attribute("factory"), None);
    }

    #[test]
    fn test_text_compared_normalized() {
        let mut editor = Editor::new(Node::new("property").with_text("\n   a\n   b\n"));
        sync_text(&mut editor, &[], Some("a\nb")).unwrap();
        let (_, mutations) = editor.finish();
        assert!(mutations.is_empty());
    }
}
