//! Source-side and descriptor-side data model

pub mod xml_enum;

pub mod descriptor;
pub mod hierarchy;
pub mod source;
pub mod types;

pub use descriptor::{
    ActivationBinding, Cardinality, ComponentDescriptor, ConfigurationPolicy, FieldCollectionType,
    FieldOption, PolicyOption, PropertyDescriptor, PropertyType, PropertyValue, ReferenceDescriptor,
    ReferencePolicy, ReferenceScope, ServiceScope,
};
pub use hierarchy::TypeIndex;
pub use source::{
    Annotation, AnnotationSpan, ComponentMarker, ElementValue, FieldDecl, LifecycleKind,
    MethodDecl, Modifiers, ParamDecl, ReferenceMarker, SourceRange, SourceSnapshot, SourceUnit,
    TypeDecl, TypeKind,
};
pub use types::{Primitive, TypeRef, TypeRefError};
