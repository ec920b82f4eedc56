//! Descriptor documents: tree, parser, writer and model mapping

pub mod descriptor;
pub mod node;
pub mod parse;
pub mod write;

pub use descriptor::read_descriptor;
pub use node::Node;
pub use parse::{parse, DocumentError};
pub use write::to_xml_string;
