//! Owned XML element tree

use serde::{Deserialize, Serialize};

/// One element with ordered attributes and children
///
/// Namespace declarations are kept as ordinary `xmlns`/`xmlns:*` attributes
/// and tags keep their prefix as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// Character data directly inside the element, if any is non-blank
    pub text: Option<String>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Tag without its namespace prefix
    pub fn local_name(&self) -> &str {
        local_name(&self.tag)
    }

    /// Prefix of the tag, if it has one
    pub fn prefix(&self) -> Option<&str> {
        self.tag.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets `name`, keeping its position when it already exists; returns
    /// whether anything changed
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) if *existing == value => false,
            Some((_, existing)) => {
                *existing = value;
                true
            }
            None => {
                self.attributes.push((name, value));
                true
            }
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let position = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(position).1)
    }

    /// Children whose local name is `name`, with their positions
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (usize, &'a Node)> + 'a {
        self.children
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.local_name() == name)
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.local_name() == name)
    }

    /// Position of the first child whose local name is one of `names`
    pub fn first_position(&self, names: &[&str]) -> Option<usize> {
        self.children.iter().position(|c| names.contains(&c.local_name()))
    }

    /// Position of the last child whose local name is one of `names`
    pub fn last_position(&self, names: &[&str]) -> Option<usize> {
        self.children.iter().rposition(|c| names.contains(&c.local_name()))
    }

    /// Descendant at `path`, a list of child positions from this node
    pub fn at(&self, path: &[usize]) -> Option<&Node> {
        path.iter().try_fold(self, |node, &i| node.children.get(i))
    }

    pub fn at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        path.iter().try_fold(self, |node, &i| node.children.get_mut(i))
    }
}

pub fn local_name(tag: &str) -> &str {
    tag.rsplit_once(':').map(|(_, local)| local).unwrap_or(tag)
}

/// Multi-line body in comparable form: trimmed lines, blank lines dropped
pub fn normalize_body(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attribute_keeps_position() {
        let mut node = Node::new("reference")
            .with_attribute("name", "log")
            .with_attribute("interface", "com.acme.Log");
        assert!(!node.set_attribute("name", "log"));
        assert!(node.set_attribute("name", "logger"));
        assert_eq!(node.attributes[0], ("name".to_string(), "logger".to_string()));
        assert_eq!(node.remove_attribute("interface").as_deref(), Some("com.acme.Log"));
        assert_eq!(node.remove_attribute("interface"), None);
    }

    #[test]
    fn test_names_and_paths() {
        let root = Node::new("scr:component")
            .with_child(Node::new("property"))
            .with_child(Node::new("service").with_child(Node::new("provide")))
            .with_child(Node::new("property"));
        assert_eq!(root.local_name(), "component");
        assert_eq!(root.prefix(), Some("scr"));
        assert_eq!(root.children_named("property").count(), 2);
        assert_eq!(root.last_position(&["property", "properties"]), Some(2));
        assert_eq!(root.at(&[1, 0]).map(|n| n.tag.as_str()), Some("provide"));
        assert!(root.at(&[1, 1]).is_none());

        let name = String::from("service");
        let service = root.child(&name);
        drop(name);
        assert_eq!(service.map(|s| s.children.len()), Some(1));
    }

    #[test]
    fn test_normalize_body() {
        assert_eq!(normalize_body("\n  a \n\n\tb\n  "), vec!["a", "b"]);
    }
}
