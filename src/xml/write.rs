//! Serializing [`Node`] trees

use super::node::Node;
use super::parse::DocumentError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

const INDENT: usize = 4;

/// Serializes `root` with an XML declaration and four-space indentation
pub fn to_xml_string(root: &Node) -> Result<String, DocumentError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| DocumentError::Write(e.to_string()))?;
    write_node(&mut writer, root)?;

    let mut text = String::from_utf8(writer.into_inner()).map_err(|e| DocumentError::Write(e.to_string()))?;
    text.push('\n');
    Ok(text)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (name, value) in &node.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    let event = if node.children.is_empty() && node.text.is_none() {
        Event::Empty(start)
    } else {
        Event::Start(start)
    };
    let is_empty = matches!(event, Event::Empty(_));
    writer
        .write_event(event)
        .map_err(|e| DocumentError::Write(e.to_string()))?;
    if is_empty {
        return Ok(());
    }

    if let Some(text) = &node.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| DocumentError::Write(e.to_string()))?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.tag.as_str())))
        .map_err(|e| DocumentError::Write(e.to_string()))?;
    Ok(())
}
