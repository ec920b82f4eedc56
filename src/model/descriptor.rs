//! In-memory model of one component descriptor

use crate::define_xml_enum;
use crate::version::{Feature, SpecVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

define_xml_enum! {
    /// Reference multiplicity
    Cardinality {
        Optional => "0..1" | "OPTIONAL",
        Mandatory => "1..1" | "MANDATORY",
        Multiple => "0..n" | "MULTIPLE",
        AtLeastOne => "1..n" | "AT_LEAST_ONE",
    }
}

impl Cardinality {
    pub fn is_multiple(&self) -> bool {
        matches!(self, Cardinality::Multiple | Cardinality::AtLeastOne)
    }
}

define_xml_enum! {
    ReferencePolicy {
        Static => "static" | "STATIC",
        Dynamic => "dynamic" | "DYNAMIC",
    }
}

define_xml_enum! {
    PolicyOption {
        Reluctant => "reluctant" | "RELUCTANT",
        Greedy => "greedy" | "GREEDY",
    }
}

define_xml_enum! {
    ReferenceScope {
        Bundle => "bundle" | "BUNDLE",
        Prototype => "prototype" | "PROTOTYPE",
        PrototypeRequired => "prototype_required" | "PROTOTYPE_REQUIRED",
    }
}

define_xml_enum! {
    FieldOption {
        Replace => "replace" | "REPLACE",
        Update => "update" | "UPDATE",
    }
}

define_xml_enum! {
    /// How a multiple-cardinality field receives its services
    FieldCollectionType {
        Service => "service",
        Reference => "reference",
        ServiceObjects => "serviceobjects",
        Properties => "properties",
        Tuple => "tuple",
    }
}

define_xml_enum! {
    ConfigurationPolicy {
        Optional => "optional" | "OPTIONAL",
        Require => "require" | "REQUIRE",
        Ignore => "ignore" | "IGNORE",
    }
}

define_xml_enum! {
    /// Service scope; `Default` exists only on the annotation side and is never written
    ServiceScope {
        Singleton => "singleton" | "SINGLETON",
        Bundle => "bundle" | "BUNDLE",
        Prototype => "prototype" | "PROTOTYPE",
        Default => "default" | "DEFAULT",
    }
}

define_xml_enum! {
    /// Scalar type tag of a property
    PropertyType {
        String => "String",
        Long => "Long",
        Double => "Double",
        Float => "Float",
        Integer => "Integer",
        Byte => "Byte",
        Char => "Char" | "Character",
        Boolean => "Boolean",
        Short => "Short",
    }
}

/// Value of a property: one scalar, or a multi-valued body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyValue {
    Single(String),
    Multi(Vec<String>),
}

impl PropertyValue {
    /// Newline-joined body of a multi-valued property; an empty list has no body
    pub fn body(&self) -> Option<String> {
        match self {
            PropertyValue::Multi(values) if !values.is_empty() => Some(values.join("\n")),
            _ => None,
        }
    }

    pub fn single(&self) -> Option<&str> {
        match self {
            PropertyValue::Single(value) => Some(value),
            PropertyValue::Multi(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    /// `None` means the schema default (String)
    #[serde(rename = "type")]
    pub ty: Option<PropertyType>,
    pub value: PropertyValue,
}

impl PropertyDescriptor {
    pub fn single(name: impl Into<String>, ty: Option<PropertyType>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            value: PropertyValue::Single(value.into()),
        }
    }

    pub fn multi(name: impl Into<String>, ty: Option<PropertyType>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            value: PropertyValue::Multi(values),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    pub name: String,
    /// Binary name of the service interface
    pub interface: String,
    pub cardinality: Option<Cardinality>,
    pub policy: Option<ReferencePolicy>,
    pub policy_option: Option<PolicyOption>,
    pub target: Option<String>,
    pub scope: Option<ReferenceScope>,
    pub bind: Option<String>,
    pub unbind: Option<String>,
    pub updated: Option<String>,
    pub field: Option<String>,
    pub field_option: Option<FieldOption>,
    pub field_collection_type: Option<FieldCollectionType>,
    /// Constructor parameter index
    pub parameter: Option<usize>,
}

impl ReferenceDescriptor {
    pub fn new(name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interface: interface.into(),
            ..Default::default()
        }
    }

    pub fn is_multiple(&self) -> bool {
        self.cardinality.map(|c| c.is_multiple()).unwrap_or(false)
    }

    pub fn is_dynamic(&self) -> bool {
        self.policy == Some(ReferencePolicy::Dynamic)
    }
}

/// How the component receives its activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActivationBinding {
    Method {
        name: String,
        /// Component property types used by the parameters
        property_types: Vec<String>,
    },
    Constructor {
        parameters: usize,
        property_types: Vec<String>,
    },
    Fields {
        /// Sorted lexicographically
        names: Vec<String>,
        property_types: Vec<String>,
    },
}

impl ActivationBinding {
    pub fn property_types(&self) -> &[String] {
        match self {
            ActivationBinding::Method { property_types, .. }
            | ActivationBinding::Constructor { property_types, .. }
            | ActivationBinding::Fields { property_types, .. } => property_types,
        }
    }
}

/// Normalized model of one component prior to serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    pub implementation: String,
    pub services: Vec<String>,
    pub factory: Option<String>,
    pub service_scope: Option<ServiceScope>,
    pub service_factory: Option<bool>,
    pub enabled: Option<bool>,
    pub immediate: Option<bool>,
    pub configuration_policy: Option<ConfigurationPolicy>,
    pub configuration_pid: Vec<String>,
    pub properties: Vec<PropertyDescriptor>,
    pub property_files: Vec<String>,
    pub factory_properties: Vec<PropertyDescriptor>,
    pub factory_property_files: Vec<String>,
    /// Kept sorted by name
    pub references: Vec<ReferenceDescriptor>,
    pub activation: Vec<ActivationBinding>,
    pub deactivate: Option<String>,
    pub modified: Option<String>,
    /// An unannotated `activate` method exists and is used implicitly
    pub implicit_activate: bool,
    pub implicit_deactivate: bool,
    /// Features used that do not show up as attributes
    pub implied_features: BTreeSet<Feature>,
    /// Explicit namespace override from the marker
    pub xmlns: Option<String>,
    /// Computed minimum format version
    pub version: SpecVersion,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: implementation.into(),
            ..Default::default()
        }
    }

    /// Namespace written on the root element: the override, else the computed version
    pub fn namespace(&self) -> String {
        self.xmlns
            .clone()
            .unwrap_or_else(|| self.version.namespace().to_string())
    }

    pub fn activate_method(&self) -> Option<&str> {
        self.activation.iter().find_map(|b| match b {
            ActivationBinding::Method { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn init_parameters(&self) -> Option<usize> {
        self.activation.iter().find_map(|b| match b {
            ActivationBinding::Constructor { parameters, .. } => Some(*parameters),
            _ => None,
        })
    }

    pub fn activation_fields(&self) -> Option<&[String]> {
        self.activation.iter().find_map(|b| match b {
            ActivationBinding::Fields { names, .. } => Some(names.as_slice()),
            _ => None,
        })
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceDescriptor> {
        self.references.iter().find(|r| r.name == name)
    }

    /// Sorts references ascending by name, as the wire format requires
    pub fn sort_references(&mut self) {
        self.references.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Copy holding only what the XML document carries, with schema defaults
    /// folded to "unspecified"
    pub fn wire_form(&self) -> ComponentDescriptor {
        let mut out = self.clone();
        out.implied_features.clear();
        out.version = SpecVersion::default();
        out.implicit_activate = false;
        out.implicit_deactivate = false;
        out.xmlns = None;
        for binding in &mut out.activation {
            match binding {
                ActivationBinding::Method { property_types, .. }
                | ActivationBinding::Constructor { property_types, .. }
                | ActivationBinding::Fields { property_types, .. } => property_types.clear(),
            }
        }
        if out.enabled == Some(true) {
            out.enabled = None;
        }
        if out.service_factory == Some(false) {
            out.service_factory = None;
        }
        if out.configuration_policy == Some(ConfigurationPolicy::Optional) {
            out.configuration_policy = None;
        }
        if out.services.is_empty() {
            out.service_factory = None;
            out.service_scope = None;
        }
        if out.service_scope == Some(ServiceScope::Default) {
            out.service_scope = None;
        }
        for property in out.properties.iter_mut().chain(out.factory_properties.iter_mut()) {
            if property.ty == Some(PropertyType::String) {
                property.ty = None;
            }
        }
        for reference in &mut out.references {
            if reference.cardinality == Some(Cardinality::Mandatory) {
                reference.cardinality = None;
            }
            if reference.policy == Some(ReferencePolicy::Static) {
                reference.policy = None;
            }
            if reference.policy_option == Some(PolicyOption::Reluctant) {
                reference.policy_option = None;
            }
            if reference.field_collection_type == Some(FieldCollectionType::Service) {
                reference.field_collection_type = None;
            }
        }
        out
    }
}
