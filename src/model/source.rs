//! Source snapshot: the declarations and annotations the compiler consumes.
//!
//! A snapshot is a plain serde document (JSON or YAML) listing compilation
//! units with their type declarations, plus signature-only library types used
//! to answer hierarchy questions.

use super::descriptor::{
    Cardinality, ConfigurationPolicy, FieldOption, PolicyOption, ReferencePolicy, ReferenceScope,
    ServiceScope,
};
use super::types::TypeRef;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Byte range within a compilation unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub offset: usize,
    pub length: usize,
}

impl SourceRange {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }
}

/// Range of one annotation member value, with per-element ranges for arrays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberSpan {
    pub range: Option<SourceRange>,
    pub elements: Vec<SourceRange>,
}

/// Source location of an annotation and of its member values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSpan {
    pub range: SourceRange,
    pub members: BTreeMap<String, MemberSpan>,
}

impl AnnotationSpan {
    pub fn at(range: SourceRange) -> Self {
        Self {
            range,
            members: BTreeMap::new(),
        }
    }

    /// Narrowest known range for a member (and array element) of this annotation.
    ///
    /// Falls back to the member value, then to the whole annotation.
    pub fn locate(&self, member: Option<&str>, index: Option<usize>) -> SourceRange {
        let Some(span) = member.and_then(|m| self.members.get(m)) else {
            return self.range;
        };
        if let Some(element) = index.and_then(|i| span.elements.get(i)) {
            return *element;
        }
        span.range.unwrap_or(self.range)
    }
}

/// Annotation element value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<ElementValue>),
    Enum {
        #[serde(rename = "enum")]
        constant: String,
    },
    Class {
        class: String,
    },
    Annotation {
        annotation: String,
    },
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    }))
}

/// The component marker placed on an implementation class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentMarker {
    pub name: Option<String>,
    pub service: Option<Vec<TypeRef>>,
    pub factory: Option<String>,
    pub servicefactory: Option<bool>,
    pub enabled: Option<bool>,
    pub immediate: Option<bool>,
    pub property: Vec<String>,
    pub properties: Vec<String>,
    pub factory_property: Vec<String>,
    pub factory_properties: Vec<String>,
    pub configuration_policy: Option<ConfigurationPolicy>,
    #[serde(deserialize_with = "one_or_many")]
    pub configuration_pid: Option<Vec<String>>,
    pub scope: Option<ServiceScope>,
    pub reference: Vec<ReferenceMarker>,
    pub xmlns: Option<String>,
    pub span: AnnotationSpan,
}

/// The reference marker on a method, field, constructor parameter or inside
/// the component marker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceMarker {
    pub name: Option<String>,
    pub service: Option<TypeRef>,
    pub cardinality: Option<Cardinality>,
    pub policy: Option<ReferencePolicy>,
    pub target: Option<String>,
    pub bind: Option<String>,
    pub unbind: Option<String>,
    pub updated: Option<String>,
    pub policy_option: Option<PolicyOption>,
    pub scope: Option<ReferenceScope>,
    pub field: Option<String>,
    pub field_option: Option<FieldOption>,
    pub span: AnnotationSpan,
}

/// Activate, deactivate and modified markers carry no members
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleMarker {
    pub span: AnnotationSpan,
}

/// Use of a component property type as a class annotation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyTypeUsage {
    #[serde(rename = "type")]
    pub type_name: String,
    pub values: BTreeMap<String, ElementValue>,
    pub span: AnnotationSpan,
}

/// Closed set of annotations the compiler understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Annotation {
    Component(ComponentMarker),
    Reference(ReferenceMarker),
    Activate(LifecycleMarker),
    Deactivate(LifecycleMarker),
    Modified(LifecycleMarker),
    PropertyType(PropertyTypeUsage),
    Other { name: String },
}

/// Which lifecycle marker a declaration carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    Activate,
    Deactivate,
    Modified,
}

impl LifecycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::Activate => "activate",
            LifecycleKind::Deactivate => "deactivate",
            LifecycleKind::Modified => "modified",
        }
    }
}

fn find_reference(annotations: &[Annotation]) -> Option<&ReferenceMarker> {
    annotations.iter().find_map(|a| match a {
        Annotation::Reference(marker) => Some(marker),
        _ => None,
    })
}

fn find_lifecycle(annotations: &[Annotation], kind: LifecycleKind) -> Option<&LifecycleMarker> {
    annotations.iter().find_map(|a| match (a, kind) {
        (Annotation::Activate(m), LifecycleKind::Activate)
        | (Annotation::Deactivate(m), LifecycleKind::Deactivate)
        | (Annotation::Modified(m), LifecycleKind::Modified) => Some(m),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    #[default]
    Package,
    Private,
}

/// Declaration modifiers, serialized as a keyword list (`["public", "static"]`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_volatile: bool,
}

impl Modifiers {
    pub fn public() -> Self {
        Self {
            visibility: Visibility::Public,
            ..Default::default()
        }
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

impl TryFrom<Vec<String>> for Modifiers {
    type Error = String;

    fn try_from(keywords: Vec<String>) -> Result<Self, Self::Error> {
        let mut modifiers = Modifiers::default();
        for keyword in keywords {
            match keyword.as_str() {
                "public" => modifiers.visibility = Visibility::Public,
                "protected" => modifiers.visibility = Visibility::Protected,
                "private" => modifiers.visibility = Visibility::Private,
                "static" => modifiers.is_static = true,
                "abstract" => modifiers.is_abstract = true,
                "final" => modifiers.is_final = true,
                "volatile" => modifiers.is_volatile = true,
                "transient" | "synchronized" | "native" | "strictfp" | "default" => {}
                other => return Err(format!("unknown modifier '{}'", other)),
            }
        }
        Ok(modifiers)
    }
}

impl From<Modifiers> for Vec<String> {
    fn from(m: Modifiers) -> Self {
        let mut keywords = Vec::new();
        match m.visibility {
            Visibility::Public => keywords.push("public"),
            Visibility::Protected => keywords.push("protected"),
            Visibility::Private => keywords.push("private"),
            Visibility::Package => {}
        }
        for (set, keyword) in [
            (m.is_static, "static"),
            (m.is_abstract, "abstract"),
            (m.is_final, "final"),
            (m.is_volatile, "volatile"),
        ] {
            if set {
                keywords.push(keyword);
            }
        }
        keywords.into_iter().map(String::from).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Enum,
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl ParamDecl {
    pub fn reference_marker(&self) -> Option<&ReferenceMarker> {
        find_reference(&self.annotations)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDecl {
    pub name: String,
    #[serde(default = "void")]
    pub return_type: TypeRef,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub range: SourceRange,
}

fn void() -> TypeRef {
    TypeRef::Void
}

impl MethodDecl {
    pub fn param_types(&self) -> impl Iterator<Item = &TypeRef> {
        self.params.iter().map(|p| &p.ty)
    }

    pub fn reference_marker(&self) -> Option<&ReferenceMarker> {
        find_reference(&self.annotations)
    }

    pub fn lifecycle_marker(&self, kind: LifecycleKind) -> Option<&LifecycleMarker> {
        find_lifecycle(&self.annotations, kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Compile-time constant value, if any
    #[serde(default)]
    pub constant: Option<String>,
    #[serde(default)]
    pub range: SourceRange,
}

impl FieldDecl {
    pub fn reference_marker(&self) -> Option<&ReferenceMarker> {
        find_reference(&self.annotations)
    }

    pub fn lifecycle_marker(&self, kind: LifecycleKind) -> Option<&LifecycleMarker> {
        find_lifecycle(&self.annotations, kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructorDecl {
    pub params: Vec<ParamDecl>,
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub range: SourceRange,
}

impl ConstructorDecl {
    pub fn lifecycle_marker(&self, kind: LifecycleKind) -> Option<&LifecycleMarker> {
        find_lifecycle(&self.annotations, kind)
    }
}

/// Member of an annotation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMember {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub default: Option<ElementValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDecl {
    /// Binary name, e.g. `com.acme.Outer$Inner`
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub superclass: Option<TypeRef>,
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDecl>,
    #[serde(default)]
    pub members: Vec<AnnotationMember>,
    #[serde(default)]
    pub nested: Vec<TypeDecl>,
    #[serde(default)]
    pub range: SourceRange,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: Modifiers::public(),
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            members: Vec::new(),
            nested: Vec::new(),
            range: SourceRange::default(),
        }
    }

    pub fn package(&self) -> &str {
        self.name.rsplit_once('.').map(|(p, _)| p).unwrap_or("")
    }

    /// Name without package and enclosing types
    pub fn simple_name(&self) -> &str {
        self.name.rsplit(['.', '$']).next().unwrap_or(&self.name)
    }

    pub fn as_type_ref(&self) -> TypeRef {
        TypeRef::class(self.name.clone())
    }

    pub fn component_marker(&self) -> Option<&ComponentMarker> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Component(marker) => Some(marker),
            _ => None,
        })
    }

    pub fn property_type_usages(&self) -> impl Iterator<Item = &PropertyTypeUsage> {
        self.annotations.iter().filter_map(|a| match a {
            Annotation::PropertyType(usage) => Some(usage),
            _ => None,
        })
    }

    /// Value of the `PREFIX_` constant of a component property type
    pub fn property_prefix(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == "PREFIX_" && f.modifiers.is_static && f.modifiers.is_final)
            .and_then(|f| f.constant.as_deref())
    }

    /// This declaration followed by all nested declarations, depth first
    pub fn walk(&self) -> Vec<&TypeDecl> {
        let mut out = vec![self];
        for nested in &self.nested {
            out.extend(nested.walk());
        }
        out
    }
}

/// One compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Path of the unit relative to the source root, e.g. `com/acme/Foo.java`
    pub key: String,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

/// Immutable input of a build pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSnapshot {
    pub units: Vec<SourceUnit>,
    pub library: Vec<TypeDecl>,
}

impl SourceSnapshot {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn unit(&self, key: &str) -> Option<&SourceUnit> {
        self.units.iter().find(|u| u.key == key)
    }

    /// Adds all units and library types of `other`
    pub fn merge(&mut self, other: SourceSnapshot) {
        self.units.extend(other.units);
        self.library.extend(other.library);
    }
}
