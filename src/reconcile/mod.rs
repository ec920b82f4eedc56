//! Reconciling computed descriptors into existing documents
//!
//! The reconciler walks the root attributes and each child collection of a
//! component document, matching existing elements to desired entries by key.
//! Every edit is recorded as a [`Mutation`] against a working copy, so the
//! resulting list replays onto the same base with [`apply`].
//!
//! Unknown attributes and elements survive, but the tree holds no comments or
//! formatting. A document that needs any mutation is written back without its
//! comments and with normalized indentation; an unchanged document is never
//! rewritten.
//!
//! Child layout of a fresh document:
//!
//! ```text
//! property*  properties*  factory-property*  factory-properties*
//! service?  reference*  implementation
//! ```

pub mod children;
pub mod mutation;

pub use mutation::{apply, ApplyError, Editor, Mutation, NodePath};

use crate::model::descriptor::ComponentDescriptor;
use crate::xml::descriptor::{
    self as doc, component_attributes, file_attributes, implementation_attributes, namespace_attribute,
    property_attributes, provide_attributes, reference_attributes, service_attributes, PROPERTY_BLOCK,
};
use crate::xml::Node;
use children::{dedupe, sync_attributes, ChildList, Entry};
use tracing::trace;

/// Outcome of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Edits that turn the base document into `document`
    pub mutations: Vec<Mutation>,
    pub document: Node,
}

impl Reconciliation {
    pub fn is_unchanged(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Root element of a document that does not exist yet
pub fn empty_document() -> Node {
    Node::new(doc::COMPONENT_TAG)
}

fn after(parent: &Node, names: &[&str]) -> Option<usize> {
    parent.last_position(names).map(|i| i + 1)
}

fn attribute_key(name: &'static str) -> impl Fn(&Node) -> Option<String> {
    move |node| node.attribute(name).map(str::to_string)
}

fn property_entries(properties: &[crate::model::PropertyDescriptor]) -> Vec<Entry> {
    dedupe(
        properties
            .iter()
            .map(|p| Entry::new(p.name.clone(), property_attributes(p)).with_text(p.value.body()))
            .collect(),
    )
}

fn file_entries(files: &[String]) -> Vec<Entry> {
    dedupe(files.iter().map(|f| Entry::new(f.clone(), file_attributes(f))).collect())
}

/// Reconciles `descriptor` into `existing`, or into an empty document
///
/// References are written in ascending name order whatever the order of the
/// descriptor.
pub fn reconcile(descriptor: &ComponentDescriptor, existing: Option<&Node>) -> Result<Reconciliation, ApplyError> {
    let mut descriptor = descriptor.clone();
    descriptor.sort_references();

    let base = existing.cloned().unwrap_or_else(empty_document);
    let mut editor = Editor::new(base);

    // Root namespace and component attributes
    let namespace = descriptor.namespace();
    let ns_name = namespace_attribute(&editor.doc().tag);
    if editor.doc().attribute(&ns_name) != Some(namespace.as_str()) {
        editor.record(Mutation::SetAttribute {
            path: Vec::new(),
            name: ns_name,
            value: namespace,
        })?;
    }
    sync_attributes(&mut editor, &[], &component_attributes(&descriptor))?;

    let name_key = attribute_key("name");
    let entry_key = attribute_key("entry");
    let interface_key = attribute_key("interface");

    let first_or = |tag: &'static str, fallback: &'static [&'static str]| {
        move |parent: &Node| {
            parent
                .first_position(&[tag])
                .or_else(|| after(parent, fallback))
                .unwrap_or(0)
        }
    };

    let properties_anchor = first_or(doc::PROPERTY, &[]);
    ChildList {
        tag: doc::PROPERTY,
        key: &name_key,
        anchor: &properties_anchor,
    }
    .reconcile(&mut editor, &[], &property_entries(&descriptor.properties))?;

    let files_anchor = first_or(doc::PROPERTIES, &[doc::PROPERTY]);
    ChildList {
        tag: doc::PROPERTIES,
        key: &entry_key,
        anchor: &files_anchor,
    }
    .reconcile(&mut editor, &[], &file_entries(&descriptor.property_files))?;

    let factory_anchor = first_or(doc::FACTORY_PROPERTY, &[doc::PROPERTY, doc::PROPERTIES]);
    ChildList {
        tag: doc::FACTORY_PROPERTY,
        key: &name_key,
        anchor: &factory_anchor,
    }
    .reconcile(&mut editor, &[], &property_entries(&descriptor.factory_properties))?;

    let factory_files_anchor = first_or(
        doc::FACTORY_PROPERTIES,
        &[doc::PROPERTY, doc::PROPERTIES, doc::FACTORY_PROPERTY],
    );
    ChildList {
        tag: doc::FACTORY_PROPERTIES,
        key: &entry_key,
        anchor: &factory_files_anchor,
    }
    .reconcile(&mut editor, &[], &file_entries(&descriptor.factory_property_files))?;

    reconcile_service(&mut editor, &descriptor, &interface_key)?;

    let references_anchor = |parent: &Node| {
        parent
            .first_position(&[doc::REFERENCE])
            .or_else(|| after(parent, &[doc::SERVICE]))
            .or_else(|| after(parent, PROPERTY_BLOCK))
            .unwrap_or(0)
    };
    let reference_key = |node: &Node| doc::reference_key(node);
    let references: Vec<Entry> = descriptor
        .references
        .iter()
        .map(|r| Entry::new(r.name.clone(), reference_attributes(r)))
        .collect();
    ChildList {
        tag: doc::REFERENCE,
        key: &reference_key,
        anchor: &references_anchor,
    }
    .reconcile(&mut editor, &[], &dedupe(references))?;

    let implementation = implementation_attributes(&descriptor.implementation);
    match editor.doc().first_position(&[doc::IMPLEMENTATION]) {
        Some(index) => sync_attributes(&mut editor, &[index], &implementation)?,
        None => {
            let index = editor.doc().children.len();
            editor.record(Mutation::Insert {
                parent: Vec::new(),
                index,
                node: doc::element(doc::IMPLEMENTATION, &implementation),
            })?;
        }
    }

    let (document, mutations) = editor.finish();
    trace!(component = %descriptor.name, mutations = mutations.len(), "reconciled");
    Ok(Reconciliation { mutations, document })
}

fn reconcile_service(
    editor: &mut Editor,
    descriptor: &ComponentDescriptor,
    interface_key: &dyn Fn(&Node) -> Option<String>,
) -> Result<(), ApplyError> {
    let positions: Vec<usize> = editor.doc().children_named(doc::SERVICE).map(|(i, _)| i).collect();
    let keep = if descriptor.services.is_empty() { 0 } else { 1 };
    for &index in positions.iter().skip(keep).rev() {
        editor.record(Mutation::Remove {
            parent: Vec::new(),
            index,
        })?;
    }
    if descriptor.services.is_empty() {
        return Ok(());
    }

    let specs = service_attributes(descriptor);
    let provides = dedupe(
        descriptor
            .services
            .iter()
            .map(|s| Entry::new(s.clone(), provide_attributes(s)))
            .collect(),
    );

    match positions.first() {
        Some(&index) => {
            sync_attributes(editor, &[index], &specs)?;
            let anchor = |parent: &Node| parent.first_position(&[doc::PROVIDE]).unwrap_or(0);
            ChildList {
                tag: doc::PROVIDE,
                key: interface_key,
                anchor: &anchor,
            }
            .reconcile(editor, &[index], &provides)
        }
        None => {
            let mut node = doc::element(doc::SERVICE, &specs);
            node.children = provides
                .iter()
                .map(|p| doc::element(doc::PROVIDE, &p.specs))
                .collect();
            let index = after(editor.doc(), PROPERTY_BLOCK).unwrap_or(0);
            editor.record(Mutation::Insert {
                parent: Vec::new(),
                index,
                node,
            })
        }
    }
}

/// Document for `descriptor` built from scratch
pub fn render(descriptor: &ComponentDescriptor) -> Result<Node, ApplyError> {
    reconcile(descriptor, None).map(|r| r.document)
}
