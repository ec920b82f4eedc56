//! Mapping between [`ComponentDescriptor`] values and descriptor elements

use super::node::{normalize_body, Node};
use super::parse::DocumentError;
use crate::model::descriptor::{
    ActivationBinding, Cardinality, ComponentDescriptor, ConfigurationPolicy, FieldCollectionType, FieldOption,
    PolicyOption, PropertyDescriptor, PropertyType, PropertyValue, ReferenceDescriptor, ReferencePolicy,
    ReferenceScope, ServiceScope,
};
use crate::resolver::reference_name_from_method;
use crate::version::SpecVersion;

pub const COMPONENT: &str = "component";
pub const COMPONENT_TAG: &str = "scr:component";
pub const PROPERTY: &str = "property";
pub const PROPERTIES: &str = "properties";
pub const FACTORY_PROPERTY: &str = "factory-property";
pub const FACTORY_PROPERTIES: &str = "factory-properties";
pub const SERVICE: &str = "service";
pub const PROVIDE: &str = "provide";
pub const REFERENCE: &str = "reference";
pub const IMPLEMENTATION: &str = "implementation";

/// Elements that belong to the property block at the head of a component
pub const PROPERTY_BLOCK: &[&str] = &[PROPERTY, PROPERTIES, FACTORY_PROPERTY, FACTORY_PROPERTIES];

/// Desired state of one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSpec {
    pub name: &'static str,
    pub value: Option<String>,
    /// Schema default; an existing attribute holding it survives an
    /// unspecified value
    pub default: Option<&'static str>,
}

impl AttrSpec {
    pub fn new(name: &'static str, value: Option<String>) -> Self {
        Self {
            name,
            value,
            default: None,
        }
    }

    pub fn with_default(name: &'static str, value: Option<String>, default: &'static str) -> Self {
        Self {
            name,
            value,
            default: Some(default),
        }
    }

    /// Value to write, `None` when it is absent or equals the default
    pub fn written(&self) -> Option<&str> {
        match (&self.value, self.default) {
            (Some(value), Some(default)) if value == default => None,
            (Some(value), _) => Some(value),
            (None, _) => None,
        }
    }
}

fn flag(value: Option<bool>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn text<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

/// Namespace declaration attribute for the root tag `tag`
pub fn namespace_attribute(tag: &str) -> String {
    match tag.split_once(':') {
        Some((prefix, _)) => format!("xmlns:{}", prefix),
        None => "xmlns".to_string(),
    }
}

/// Attributes of the root element, namespace declaration excluded
pub fn component_attributes(descriptor: &ComponentDescriptor) -> Vec<AttrSpec> {
    let joined = |values: &[String]| (!values.is_empty()).then(|| values.join(" "));
    let mut specs = vec![
        AttrSpec::new("name", Some(descriptor.name.clone())),
        AttrSpec::with_default("enabled", flag(descriptor.enabled), "true"),
        AttrSpec::new("factory", descriptor.factory.clone()),
        AttrSpec::new("immediate", flag(descriptor.immediate)),
        AttrSpec::with_default(
            "configuration-policy",
            text(descriptor.configuration_policy),
            ConfigurationPolicy::Optional.as_str(),
        ),
        AttrSpec::new("configuration-pid", joined(&descriptor.configuration_pid)),
    ];

    // An implicit lifecycle method keeps an existing attribute naming it
    let lifecycle = |name: &'static str, value: Option<String>, implicit: bool| {
        if implicit {
            AttrSpec::with_default(name, value, name)
        } else {
            AttrSpec::new(name, value)
        }
    };
    specs.push(lifecycle(
        "activate",
        descriptor.activate_method().map(str::to_string),
        descriptor.implicit_activate,
    ));
    specs.push(lifecycle("deactivate", descriptor.deactivate.clone(), descriptor.implicit_deactivate));
    specs.push(AttrSpec::new("modified", descriptor.modified.clone()));
    specs.push(AttrSpec::new("init", text(descriptor.init_parameters())));
    specs.push(AttrSpec::new(
        "activation-fields",
        descriptor.activation_fields().and_then(joined),
    ));
    specs
}

pub fn property_attributes(property: &PropertyDescriptor) -> Vec<AttrSpec> {
    vec![
        AttrSpec::new("name", Some(property.name.clone())),
        AttrSpec::with_default("type", text(property.ty), PropertyType::String.as_str()),
        AttrSpec::new("value", property.value.single().map(str::to_string)),
    ]
}

pub fn file_attributes(entry: &str) -> Vec<AttrSpec> {
    vec![AttrSpec::new("entry", Some(entry.to_string()))]
}

pub fn service_attributes(descriptor: &ComponentDescriptor) -> Vec<AttrSpec> {
    let scope = descriptor.service_scope.filter(|s| *s != ServiceScope::Default);
    vec![
        AttrSpec::new("scope", text(scope)),
        AttrSpec::with_default("servicefactory", flag(descriptor.service_factory), "false"),
    ]
}

pub fn provide_attributes(interface: &str) -> Vec<AttrSpec> {
    vec![AttrSpec::new("interface", Some(interface.to_string()))]
}

pub fn reference_attributes(reference: &ReferenceDescriptor) -> Vec<AttrSpec> {
    vec![
        AttrSpec::new("name", Some(reference.name.clone())),
        AttrSpec::new("interface", Some(reference.interface.clone())),
        AttrSpec::with_default("cardinality", text(reference.cardinality), Cardinality::Mandatory.as_str()),
        AttrSpec::with_default("policy", text(reference.policy), ReferencePolicy::Static.as_str()),
        AttrSpec::new("target", reference.target.clone()),
        AttrSpec::new("bind", reference.bind.clone()),
        AttrSpec::new("unbind", reference.unbind.clone()),
        AttrSpec::new("updated", reference.updated.clone()),
        AttrSpec::with_default(
            "policy-option",
            text(reference.policy_option),
            PolicyOption::Reluctant.as_str(),
        ),
        AttrSpec::new("scope", text(reference.scope)),
        AttrSpec::new("field", reference.field.clone()),
        AttrSpec::new("field-option", text(reference.field_option)),
        AttrSpec::with_default(
            "field-collection-type",
            text(reference.field_collection_type),
            FieldCollectionType::Service.as_str(),
        ),
        AttrSpec::new("parameter", text(reference.parameter)),
    ]
}

pub fn implementation_attributes(class: &str) -> Vec<AttrSpec> {
    vec![AttrSpec::new("class", Some(class.to_string()))]
}

/// Fresh element carrying the written values of `specs`
pub fn element(tag: &str, specs: &[AttrSpec]) -> Node {
    let mut node = Node::new(tag);
    for spec in specs {
        if let Some(value) = spec.written() {
            node.attributes.push((spec.name.to_string(), value.to_string()));
        }
    }
    node
}

pub fn property_element(tag: &str, property: &PropertyDescriptor) -> Node {
    let mut node = element(tag, &property_attributes(property));
    node.text = property.value.body();
    node
}

/// Matching key of an existing reference element: its name, else a name
/// derived from `field`, `bind` or `interface`
pub fn reference_key(node: &Node) -> Option<String> {
    node.attribute("name")
        .or_else(|| node.attribute("field"))
        .or_else(|| node.attribute("bind").map(reference_name_from_method))
        .or_else(|| node.attribute("interface"))
        .map(str::to_string)
}

fn enum_attribute<T>(
    node: &Node,
    attribute: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, DocumentError> {
    match node.attribute(attribute) {
        None => Ok(None),
        Some(value) => parse(value).map(Some).ok_or_else(|| DocumentError::InvalidValue {
            element: node.tag.clone(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }),
    }
}

fn bool_attribute(node: &Node, attribute: &str) -> Result<Option<bool>, DocumentError> {
    enum_attribute(node, attribute, |v| v.parse().ok())
}

fn required(node: &Node, attribute: &str) -> Result<String, DocumentError> {
    node.attribute(attribute)
        .map(str::to_string)
        .ok_or_else(|| DocumentError::MissingAttribute {
            element: node.tag.clone(),
            attribute: attribute.to_string(),
        })
}

fn list_attribute(node: &Node, attribute: &str) -> Vec<String> {
    node.attribute(attribute)
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn read_property(node: &Node) -> Result<PropertyDescriptor, DocumentError> {
    let name = required(node, "name")?;
    let ty = enum_attribute(node, "type", PropertyType::from_xml)?;
    // Without a value attribute the body holds the values, possibly none
    let value = match (&node.text, node.attribute("value")) {
        (Some(body), _) => PropertyValue::Multi(normalize_body(body).into_iter().map(str::to_string).collect()),
        (None, Some(value)) => PropertyValue::Single(value.to_string()),
        (None, None) => PropertyValue::Multi(Vec::new()),
    };
    Ok(PropertyDescriptor { name, ty, value })
}

fn read_reference(node: &Node) -> Result<ReferenceDescriptor, DocumentError> {
    let name = reference_key(node).ok_or_else(|| DocumentError::MissingAttribute {
        element: node.tag.clone(),
        attribute: "name".to_string(),
    })?;
    let mut reference = ReferenceDescriptor::new(name, required(node, "interface")?);
    reference.cardinality = enum_attribute(node, "cardinality", Cardinality::from_xml)?;
    reference.policy = enum_attribute(node, "policy", ReferencePolicy::from_xml)?;
    reference.policy_option = enum_attribute(node, "policy-option", PolicyOption::from_xml)?;
    reference.target = node.attribute("target").map(str::to_string);
    reference.scope = enum_attribute(node, "scope", ReferenceScope::from_xml)?;
    reference.bind = node.attribute("bind").map(str::to_string);
    reference.unbind = node.attribute("unbind").map(str::to_string);
    reference.updated = node.attribute("updated").map(str::to_string);
    reference.field = node.attribute("field").map(str::to_string);
    reference.field_option = enum_attribute(node, "field-option", FieldOption::from_xml)?;
    reference.field_collection_type =
        enum_attribute(node, "field-collection-type", FieldCollectionType::from_xml)?;
    reference.parameter = enum_attribute(node, "parameter", |v| v.parse().ok())?;
    Ok(reference)
}

/// Reads a descriptor document back into its model
///
/// Values the document cannot carry (implied features, property type
/// names of activation bindings) are left empty. The version comes from the
/// root namespace; an unknown namespace is kept as the override.
pub fn read_descriptor(root: &Node) -> Result<ComponentDescriptor, DocumentError> {
    if root.local_name() != COMPONENT {
        return Err(DocumentError::NotAComponent(root.tag.clone()));
    }

    let implementation = root
        .child(IMPLEMENTATION)
        .map(|n| required(n, "class"))
        .transpose()?
        .unwrap_or_default();
    let name = root.attribute("name").map(str::to_string).unwrap_or_else(|| implementation.clone());
    let mut descriptor = ComponentDescriptor::new(name, implementation);

    let namespace = root.attribute(&namespace_attribute(&root.tag)).unwrap_or_default();
    match SpecVersion::from_namespace(namespace) {
        Some(version) => descriptor.version = version,
        None => descriptor.xmlns = Some(namespace.to_string()),
    }

    descriptor.enabled = bool_attribute(root, "enabled")?;
    descriptor.factory = root.attribute("factory").map(str::to_string);
    descriptor.immediate = bool_attribute(root, "immediate")?;
    descriptor.configuration_policy =
        enum_attribute(root, "configuration-policy", ConfigurationPolicy::from_xml)?;
    descriptor.configuration_pid = list_attribute(root, "configuration-pid");

    if let Some(parameters) = enum_attribute(root, "init", |v| v.parse().ok())? {
        descriptor.activation.push(ActivationBinding::Constructor {
            parameters,
            property_types: Vec::new(),
        });
    }
    let fields = list_attribute(root, "activation-fields");
    if !fields.is_empty() {
        descriptor.activation.push(ActivationBinding::Fields {
            names: fields,
            property_types: Vec::new(),
        });
    }
    if let Some(activate) = root.attribute("activate") {
        descriptor.activation.push(ActivationBinding::Method {
            name: activate.to_string(),
            property_types: Vec::new(),
        });
    }
    descriptor.deactivate = root.attribute("deactivate").map(str::to_string);
    descriptor.modified = root.attribute("modified").map(str::to_string);

    for child in &root.children {
        match child.local_name() {
            PROPERTY => descriptor.properties.push(read_property(child)?),
            PROPERTIES => descriptor.property_files.push(required(child, "entry")?),
            FACTORY_PROPERTY => descriptor.factory_properties.push(read_property(child)?),
            FACTORY_PROPERTIES => descriptor.factory_property_files.push(required(child, "entry")?),
            REFERENCE => descriptor.references.push(read_reference(child)?),
            SERVICE => {
                descriptor.service_scope = enum_attribute(child, "scope", ServiceScope::from_xml)?;
                descriptor.service_factory = bool_attribute(child, "servicefactory")?;
                for (_, provide) in child.children_named(PROVIDE) {
                    descriptor.services.push(required(provide, "interface")?);
                }
            }
            _ => {}
        }
    }

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse::parse;
    use crate::xml::write::to_xml_string;

    #[test]
    fn test_written_drops_defaults() {
        assert_eq!(AttrSpec::with_default("enabled", Some("true".into()), "true").written(), None);
        assert_eq!(
            AttrSpec::with_default("enabled", Some("false".into()), "true").written(),
            Some("false")
        );
        assert_eq!(AttrSpec::new("factory", None).written(), None);
    }

    #[test]
    fn test_reference_key_fallbacks() {
        assert_eq!(reference_key(&Node::new("reference").with_attribute("bind", "setLog")).as_deref(), Some("Log"));
        assert_eq!(
            reference_key(
                &Node::new("reference")
                    .with_attribute("interface", "com.acme.Log")
                    .with_attribute("field", "log")
            )
            .as_deref(),
            Some("log")
        );
        assert_eq!(reference_key(&Node::new("reference")), None);
    }

    #[test]
    fn test_read_descriptor() {
        let root = parse(
            r#"<scr:component xmlns:scr="http://www.osgi.org/xmlns/scr/v1.3.0" name="comp" configuration-pid="a b" activate="start">
    <property name="multi" type="Integer">
        1
        2
    </property>
    <property name="single" value="x"/>
    <service scope="prototype">
        <provide interface="com.acme.Api"/>
    </service>
    <reference name="log" interface="com.acme.Log" cardinality="0..n" field="logs"/>
    <implementation class="com.acme.Comp"/>
</scr:component>"#,
        )
        .unwrap();

        let descriptor = read_descriptor(&root).unwrap();
        assert_eq!(descriptor.name, "comp");
        assert_eq!(descriptor.implementation, "com.acme.Comp");
        assert_eq!(descriptor.version, SpecVersion::V1_3);
        assert_eq!(descriptor.configuration_pid, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(descriptor.activate_method(), Some("start"));
        assert_eq!(
            descriptor.properties[0].value,
            PropertyValue::Multi(vec!["1".into(), "2".into()])
        );
        assert_eq!(descriptor.properties[1].value, PropertyValue::Single("x".into()));
        assert_eq!(descriptor.services, vec!["com.acme.Api".to_string()]);
        assert_eq!(descriptor.service_scope, Some(ServiceScope::Prototype));
        assert_eq!(descriptor.references[0].cardinality, Some(Cardinality::Multiple));
    }

    #[test]
    fn test_empty_multi_valued_property_round_trips() {
        let property = PropertyDescriptor::multi("tags", None, Vec::new());
        let node = property_element("property", &property);
        assert_eq!(node.text, None);

        let read = read_property(&parse(&to_xml_string(&node).unwrap()).unwrap()).unwrap();
        assert_eq!(read, property);

        let single = PropertyDescriptor::single("tag", None, "");
        let node = property_element("property", &single);
        let read = read_property(&parse(&to_xml_string(&node).unwrap()).unwrap()).unwrap();
        assert_eq!(read.value, PropertyValue::Single(String::new()));
    }

    #[test]
    fn test_read_rejects_bad_values() {
        let root = parse(r#"<component enabled="maybe"/>"#).unwrap();
        assert!(matches!(read_descriptor(&root), Err(DocumentError::InvalidValue { .. })));
        let root = parse(r#"<beans/>"#).unwrap();
        assert!(matches!(read_descriptor(&root), Err(DocumentError::NotAComponent(_))));
    }
}
