//! Parsing descriptor documents into [`Node`] trees

use super::node::Node;
use roxmltree::Document;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed XML: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("root element <{0}> is not a component")]
    NotAComponent(String),

    #[error("invalid value '{value}' for attribute '{attribute}' on <{element}>")]
    InvalidValue {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("failed to serialize document: {0}")]
    Write(String),
}

/// Parses `text` into an owned tree rooted at the document element
///
/// Comments and processing instructions are dropped. Whitespace-only text is
/// treated as formatting.
pub fn parse(text: &str) -> Result<Node, DocumentError> {
    let doc = Document::parse(text)?;
    Ok(convert(doc.root_element()))
}

fn convert(element: roxmltree::Node<'_, '_>) -> Node {
    let mut node = Node::new(qualified(element, element.tag_name().namespace(), element.tag_name().name(), true));

    // In-scope namespaces that the parent did not already have
    let inherited: Vec<(Option<&str>, &str)> = element
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    for ns in element.namespaces() {
        if ns.name() == Some("xml") || inherited.contains(&(ns.name(), ns.uri())) {
            continue;
        }
        let name = match ns.name() {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        node.attributes.push((name, ns.uri().to_string()));
    }

    for attr in element.attributes() {
        let name = qualified(element, attr.namespace(), attr.name(), false);
        node.attributes.push((name, attr.value().to_string()));
    }

    let mut text = String::new();
    for child in element.children() {
        if child.is_element() {
            node.children.push(convert(child));
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }
    if !text.trim().is_empty() {
        node.text = Some(text);
    }
    node
}

/// Rebuilds the prefixed name of an element or attribute
fn qualified(element: roxmltree::Node<'_, '_>, namespace: Option<&str>, local: &str, allow_default: bool) -> String {
    let Some(uri) = namespace else {
        return local.to_string();
    };
    let prefix = element
        .namespaces()
        .filter(|ns| ns.uri() == uri)
        .find_map(|ns| match ns.name() {
            Some(prefix) => Some(Some(prefix)),
            None if allow_default => Some(None),
            None => None,
        });
    match prefix {
        Some(Some(prefix)) => format!("{}:{}", prefix, local),
        _ => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_prefixes_and_order() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- generated -->
<scr:component xmlns:scr="http://www.osgi.org/xmlns/scr/v1.1.0" name="comp" x-custom="1">
    <implementation class="com.acme.Comp"/>
    <property name="multi">
        a
        b
    </property>
</scr:component>
"#;
        let root = parse(text).unwrap();
        assert_eq!(root.tag, "scr:component");
        assert_eq!(
            root.attributes,
            vec![
                ("xmlns:scr".to_string(), "http://www.osgi.org/xmlns/scr/v1.1.0".to_string()),
                ("name".to_string(), "comp".to_string()),
                ("x-custom".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.text, None);
        assert_eq!(root.children[0].attribute("class"), Some("com.acme.Comp"));
        assert!(root.children[1].text.as_deref().unwrap().contains('b'));
    }

    #[test]
    fn test_default_namespace() {
        let root = parse(r#"<component xmlns="http://www.osgi.org/xmlns/scr/v1.2.0"><service/></component>"#).unwrap();
        assert_eq!(root.tag, "component");
        assert_eq!(root.attribute("xmlns"), Some("http://www.osgi.org/xmlns/scr/v1.2.0"));
        assert_eq!(root.children[0].tag, "service");
        assert!(root.children[0].attributes.is_empty());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(parse("<a><b></a>"), Err(DocumentError::Parse(_))));
    }
}
