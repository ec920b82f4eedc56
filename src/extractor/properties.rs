//! Component properties: explicit `name[:type]=value` entries and component
//! property types

use crate::diagnostics::{DiagnosticKind, ProblemReporter};
use crate::model::descriptor::{PropertyDescriptor, PropertyType, PropertyValue};
use crate::model::hierarchy::TypeIndex;
use crate::model::source::{AnnotationSpan, ElementValue, PropertyTypeUsage, TypeDecl};
use crate::model::types::{Primitive, TypeRef};
use crate::names::{map_class_name, map_name};
use crate::version::SpecVersion;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

static FLOATING_LITERAL: OnceLock<Regex> = OnceLock::new();

/// Ordered properties keyed by name.
///
/// Inserting an existing name replaces the entry at its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: Vec<PropertyDescriptor>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, property: PropertyDescriptor) {
        match self.entries.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.entries.push(property),
        }
    }

    pub fn extend(&mut self, properties: impl IntoIterator<Item = PropertyDescriptor>) {
        for property in properties {
            self.insert(property);
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.entries.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<PropertyDescriptor> {
        self.entries
    }
}

/// One `name[:type]=value` entry split into its parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyEntry<'a> {
    pub name: &'a str,
    pub ty: Option<&'a str>,
    pub value: Option<&'a str>,
}

pub fn parse_entry(entry: &str) -> PropertyEntry<'_> {
    let (head, value) = match entry.split_once('=') {
        Some((head, value)) => (head, Some(value.trim())),
        None => (entry, None),
    };
    let (name, ty) = match head.split_once(':') {
        Some((name, ty)) => (name, Some(ty)),
        None => (head, None),
    };
    PropertyEntry { name, ty, value }
}

/// Absent, empty and `String` types are the same type
fn is_string_type(ty: Option<&str>) -> bool {
    matches!(ty.map(str::trim), None | Some("") | Some("String"))
}

/// Decimal or hexadecimal floating literal with an optional `f`/`d` suffix,
/// or `NaN`/`Infinity`; out of range values are still literals
fn is_floating_literal(value: &str) -> bool {
    FLOATING_LITERAL
        .get_or_init(|| {
            Regex::new(
                r"^[+-]?(NaN|Infinity|(([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?|0[xX]([0-9a-fA-F]+\.?|[0-9a-fA-F]*\.[0-9a-fA-F]+)[pP][+-]?[0-9]+)[fFdD]?)$",
            )
            .expect("valid regex")
        })
        .is_match(value)
}

/// Whether `value` parses under the rules of `ty`
pub fn is_valid_value(ty: PropertyType, value: &str) -> bool {
    let value = value.trim();
    match ty {
        PropertyType::Long => value.parse::<i64>().is_ok(),
        PropertyType::Integer | PropertyType::Char => value.parse::<i32>().is_ok(),
        PropertyType::Short => value.parse::<i16>().is_ok(),
        PropertyType::Byte => value.parse::<i8>().is_ok(),
        PropertyType::Double | PropertyType::Float => is_floating_literal(value),
        PropertyType::Boolean | PropertyType::String => true,
    }
}

fn validate_entry(
    entry: &PropertyEntry<'_>,
    ty: Option<PropertyType>,
    member: &str,
    position: usize,
    span: &AnnotationSpan,
    reporter: &mut ProblemReporter,
) {
    let range = span.locate(Some(member), Some(position));
    if entry.name.trim().is_empty() {
        reporter.report(DiagnosticKind::PropertyViolation, range, "property name is required");
    }
    let Some(ty) = ty else {
        if !is_string_type(entry.ty) {
            reporter.report(
                DiagnosticKind::PropertyViolation,
                range,
                format!("unknown property type '{}'", entry.ty.unwrap_or_default()),
            );
        }
        return;
    };
    match entry.value {
        None => reporter.report(
            DiagnosticKind::PropertyViolation,
            range,
            format!("property '{}' requires a value", entry.name),
        ),
        Some(value) if !is_valid_value(ty, value) => reporter.report(
            DiagnosticKind::PropertyViolation,
            range,
            format!("'{}' is not a valid {} value", value, ty),
        ),
        Some(_) => {}
    }
}

/// Builds properties from the entries of the `member` array.
///
/// A repeated name turns the property multi-valued; its type must agree with
/// the first occurrence.
pub fn explicit_properties(
    entries: &[String],
    member: &str,
    span: &AnnotationSpan,
    reporter: &mut ProblemReporter,
) -> Vec<PropertyDescriptor> {
    let mut out: Vec<PropertyDescriptor> = Vec::new();
    let mut declared_types: Vec<Option<&str>> = Vec::new();

    for (position, text) in entries.iter().enumerate() {
        let entry = parse_entry(text);
        let ty = entry.ty.and_then(|t| PropertyType::from_xml(t.trim()));

        match out.iter().position(|p| p.name == entry.name) {
            None => {
                if reporter.checks_enabled() {
                    validate_entry(&entry, ty, member, position, span, reporter);
                }
                out.push(PropertyDescriptor::single(
                    entry.name,
                    ty,
                    entry.value.unwrap_or_default(),
                ));
                declared_types.push(entry.ty);
            }
            Some(existing) => {
                let property = &mut out[existing];
                if let PropertyValue::Single(first) = &property.value {
                    property.value = PropertyValue::Multi(vec![first.clone()]);
                }

                if reporter.checks_enabled() {
                    let expected = declared_types[existing];
                    let same = (is_string_type(expected) && is_string_type(entry.ty))
                        || expected.map(str::trim) == entry.ty.map(str::trim);
                    if same {
                        validate_entry(&entry, ty, member, position, span, reporter);
                    } else {
                        reporter.report(
                            DiagnosticKind::PropertyViolation,
                            span.locate(Some(member), Some(position)),
                            format!(
                                "inconsistent type {} for property '{}', expected {}",
                                entry.ty.filter(|t| !t.is_empty()).unwrap_or("String"),
                                entry.name,
                                expected.filter(|t| !t.is_empty()).unwrap_or("String")
                            ),
                        );
                    }
                }

                if let (Some(value), PropertyValue::Multi(values)) = (entry.value, &mut property.value) {
                    values.push(value.to_string());
                }
            }
        }
    }

    out
}

/// Property type tag of an annotation member type
pub fn property_type(ty: &TypeRef) -> PropertyType {
    let scalar = match ty {
        TypeRef::Array(element) => element.as_ref(),
        other => other,
    };
    let primitive = match scalar {
        TypeRef::Primitive(p) => Some(*p),
        other => other.erasure().and_then(Primitive::from_boxed),
    };
    match primitive {
        Some(Primitive::Boolean) => PropertyType::Boolean,
        Some(Primitive::Byte) => PropertyType::Byte,
        Some(Primitive::Char) => PropertyType::Char,
        Some(Primitive::Short) => PropertyType::Short,
        Some(Primitive::Int) => PropertyType::Integer,
        Some(Primitive::Long) => PropertyType::Long,
        Some(Primitive::Float) => PropertyType::Float,
        Some(Primitive::Double) => PropertyType::Double,
        None => PropertyType::String,
    }
}

/// Text of a scalar element value; `None` for nested annotations and arrays
pub fn value_text(value: &ElementValue) -> Option<String> {
    match value {
        ElementValue::Bool(b) => Some(b.to_string()),
        ElementValue::Int(i) => Some(i.to_string()),
        ElementValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{:.1}", f)),
        ElementValue::Float(f) => Some(f.to_string()),
        ElementValue::Str(s) => Some(s.clone()),
        ElementValue::Enum { constant } => Some(constant.clone()),
        ElementValue::Class { class } => Some(class.replace('$', ".")),
        ElementValue::Annotation { .. } | ElementValue::Array(_) => None,
    }
}

/// Collects properties from component property types, visiting each type once
pub struct PropertyTypeCollector<'a> {
    index: &'a TypeIndex,
    version: SpecVersion,
    visited: HashSet<String>,
}

impl<'a> PropertyTypeCollector<'a> {
    pub fn new(index: &'a TypeIndex, version: SpecVersion) -> Self {
        Self {
            index,
            version,
            visited: HashSet::new(),
        }
    }

    /// True once any property type has been seen
    pub fn used(&self) -> bool {
        !self.visited.is_empty()
    }

    /// Adds the defaults of `ty` when it is a property type not seen before.
    ///
    /// Returns whether `ty` is a property type at all.
    pub fn collect(&mut self, ty: &TypeRef, out: &mut PropertyMap) -> bool {
        let Some(decl) = self.property_type_decl(ty) else {
            return false;
        };
        if self.visited.insert(decl.name.clone()) {
            out.extend(self.properties_of(decl, &BTreeMap::new()));
        }
        true
    }

    /// Adds the properties of a property type used as a class annotation;
    /// explicit values override member defaults
    pub fn collect_usage(&mut self, usage: &PropertyTypeUsage, out: &mut PropertyMap) -> bool {
        let Some(decl) = self.index.get(&usage.type_name) else {
            return false;
        };
        self.visited.insert(decl.name.clone());
        out.extend(self.properties_of(decl, &usage.values));
        true
    }

    pub fn property_type_decl(&self, ty: &TypeRef) -> Option<&'a TypeDecl> {
        if !matches!(ty, TypeRef::Class { .. }) || !self.index.is_annotation(ty) {
            return None;
        }
        ty.erasure().and_then(|name| self.index.get(name))
    }

    fn properties_of(&self, decl: &TypeDecl, values: &BTreeMap<String, ElementValue>) -> Vec<PropertyDescriptor> {
        let prefix = decl.property_prefix();
        let modern = self.version.has_modern_naming();

        if modern && decl.members.is_empty() {
            let name = map_class_name(decl.simple_name(), prefix, self.version);
            return vec![PropertyDescriptor::single(name, Some(PropertyType::Boolean), "true")];
        }

        let single_element = modern && decl.members.len() == 1 && decl.members[0].name == "value";
        let mut out = Vec::new();

        for member in &decl.members {
            let Some(value) = values.get(&member.name).or(member.default.as_ref()) else {
                continue;
            };
            let scalar = match &member.ty {
                TypeRef::Array(element) => element.as_ref(),
                other => other,
            };
            if self.index.is_annotation(scalar) {
                continue;
            }

            let name = if single_element {
                map_class_name(decl.simple_name(), prefix, self.version)
            } else {
                map_name(&member.name, prefix, self.version)
            };
            let ty = Some(property_type(&member.ty));

            if matches!(member.ty, TypeRef::Array(_)) {
                let items: Vec<String> = match value {
                    ElementValue::Array(items) => items.iter().filter_map(value_text).collect(),
                    single => value_text(single).into_iter().collect(),
                };
                let items = items
                    .into_iter()
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect();
                out.push(PropertyDescriptor::multi(name, ty, items));
            } else if let Some(text) = value_text(value) {
                out.push(PropertyDescriptor::single(name, ty, text));
            }
        }

        out
    }
}
