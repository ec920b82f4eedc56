//! Type hierarchy lookups over a source snapshot

use super::source::{SourceSnapshot, TypeDecl, TypeKind};
use super::types::{self, Primitive, TypeRef};
use std::collections::{HashMap, HashSet, VecDeque};

/// Index of every known type declaration, keyed by binary name.
///
/// Seeded with the JDK and OSGi types the compiler reasons about, then
/// extended with library and unit declarations from a snapshot (later
/// declarations win).
#[derive(Debug, Clone)]
pub struct TypeIndex {
    types: HashMap<String, TypeDecl>,
}

impl Default for TypeIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin(
    name: &str,
    kind: TypeKind,
    params: &[&str],
    superclass: Option<&str>,
    interfaces: &[&str],
) -> TypeDecl {
    let mut decl = TypeDecl::new(name, kind);
    decl.type_params = params.iter().map(|p| p.to_string()).collect();
    decl.superclass = superclass.map(|s| s.parse().unwrap_or_else(|_| TypeRef::class(s)));
    decl.interfaces = interfaces
        .iter()
        .map(|i| i.parse().unwrap_or_else(|_| TypeRef::class(*i)))
        .collect();
    decl
}

impl TypeIndex {
    pub fn new() -> Self {
        use TypeKind::{Class, Interface};

        let mut index = Self {
            types: HashMap::new(),
        };
        let builtins = [
            builtin(types::OBJECT, Class, &[], None, &[]),
            builtin(types::STRING, Class, &[], Some(types::OBJECT), &["java.lang.CharSequence"]),
            builtin("java.lang.CharSequence", Interface, &[], None, &[]),
            builtin("java.lang.Number", Class, &[], Some(types::OBJECT), &[]),
            builtin("java.lang.Iterable", Interface, &["T"], None, &[]),
            builtin(types::COLLECTION, Interface, &["E"], None, &["java.lang.Iterable<E>"]),
            builtin(types::LIST, Interface, &["E"], None, &["java.util.Collection<E>"]),
            builtin("java.util.Set", Interface, &["E"], None, &["java.util.Collection<E>"]),
            builtin("java.util.SortedSet", Interface, &["E"], None, &["java.util.Set<E>"]),
            builtin("java.util.Queue", Interface, &["E"], None, &["java.util.Collection<E>"]),
            builtin(
                "java.util.AbstractCollection",
                Class,
                &["E"],
                Some(types::OBJECT),
                &["java.util.Collection<E>"],
            ),
            builtin(
                "java.util.AbstractList",
                Class,
                &["E"],
                Some("java.util.AbstractCollection<E>"),
                &["java.util.List<E>"],
            ),
            builtin("java.util.ArrayList", Class, &["E"], Some("java.util.AbstractList<E>"), &["java.util.List<E>"]),
            builtin("java.util.LinkedList", Class, &["E"], Some("java.util.AbstractList<E>"), &["java.util.List<E>"]),
            builtin(
                "java.util.concurrent.CopyOnWriteArrayList",
                Class,
                &["E"],
                Some(types::OBJECT),
                &["java.util.List<E>"],
            ),
            builtin(
                "java.util.HashSet",
                Class,
                &["E"],
                Some("java.util.AbstractCollection<E>"),
                &["java.util.Set<E>"],
            ),
            builtin(types::MAP, Interface, &["K", "V"], None, &[]),
            builtin(types::MAP_ENTRY, Interface, &["K", "V"], None, &[]),
            builtin(types::SERVICE_REFERENCE, Interface, &["S"], None, &[]),
            builtin(types::COMPONENT_SERVICE_OBJECTS, Interface, &["S"], None, &[]),
            builtin(types::COMPONENT_CONTEXT, Interface, &[], None, &[]),
            builtin(types::BUNDLE_CONTEXT, Interface, &[], None, &[]),
        ];
        for decl in builtins {
            index.insert(decl);
        }
        for p in [
            Primitive::Byte,
            Primitive::Short,
            Primitive::Int,
            Primitive::Long,
            Primitive::Float,
            Primitive::Double,
        ] {
            index.insert(builtin(p.boxed(), Class, &[], Some("java.lang.Number"), &[]));
        }
        for p in [Primitive::Boolean, Primitive::Char] {
            index.insert(builtin(p.boxed(), Class, &[], Some(types::OBJECT), &[]));
        }
        index
    }

    pub fn from_snapshot(snapshot: &SourceSnapshot) -> Self {
        let mut index = Self::new();
        for decl in &snapshot.library {
            index.insert(decl.clone());
        }
        for unit in &snapshot.units {
            for decl in &unit.types {
                index.insert(decl.clone());
            }
        }
        index
    }

    /// Registers a declaration and, recursively, its nested declarations
    pub fn insert(&mut self, decl: TypeDecl) {
        for nested in &decl.nested {
            self.insert(nested.clone());
        }
        self.types.insert(decl.name.clone(), decl);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn is_annotation(&self, ty: &TypeRef) -> bool {
        ty.erasure()
            .and_then(|name| self.get(name))
            .map(|decl| decl.kind == TypeKind::Annotation)
            .unwrap_or(false)
    }

    fn bindings(decl: &TypeDecl, ty: &TypeRef) -> HashMap<String, TypeRef> {
        decl.type_params
            .iter()
            .cloned()
            .zip(ty.type_args().iter().cloned())
            .collect()
    }

    /// Direct superclass of `ty` with type arguments substituted
    pub fn superclass(&self, ty: &TypeRef) -> Option<TypeRef> {
        let decl = self.get(ty.erasure()?)?;
        let bindings = Self::bindings(decl, ty);
        decl.superclass.as_ref().map(|s| s.substitute(&bindings))
    }

    /// Directly implemented interfaces of `ty` with type arguments substituted
    pub fn interfaces(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let Some(decl) = ty.erasure().and_then(|name| self.get(name)) else {
            return Vec::new();
        };
        let bindings = Self::bindings(decl, ty);
        decl.interfaces.iter().map(|i| i.substitute(&bindings)).collect()
    }

    /// Java assignment compatibility: can a value of `from` be assigned to a
    /// variable of `to`?
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        match (from, to) {
            (TypeRef::Void, _) | (_, TypeRef::Void) => false,
            (TypeRef::Primitive(a), TypeRef::Primitive(b)) => a == b,
            (TypeRef::Primitive(p), TypeRef::Class { .. }) => {
                to.is_class(p.boxed())
                    || to.is_class(types::OBJECT)
                    || (to.is_class("java.lang.Number")
                        && !matches!(p, Primitive::Boolean | Primitive::Char))
            }
            (TypeRef::Class { name, .. }, TypeRef::Primitive(p)) => name == p.boxed(),
            (TypeRef::Array(a), TypeRef::Array(b)) => match (a.as_ref(), b.as_ref()) {
                (TypeRef::Primitive(x), TypeRef::Primitive(y)) => x == y,
                _ => self.is_assignable(a, b),
            },
            (TypeRef::Array(_), TypeRef::Class { .. }) => to.is_class(types::OBJECT),
            (TypeRef::Primitive(_), TypeRef::Array(_))
            | (TypeRef::Array(_), TypeRef::Primitive(_))
            | (TypeRef::Class { .. }, TypeRef::Array(_)) => false,
            (TypeRef::Class { name: from_name, .. }, TypeRef::Class { name: to_name, .. }) => {
                to_name == types::OBJECT || self.is_subclass(from_name, to_name)
            }
        }
    }

    /// Erasure-level subtype test walking superclasses and interfaces
    pub fn is_subclass(&self, from: &str, to: &str) -> bool {
        let mut queue = VecDeque::from([from.to_string()]);
        let mut seen = HashSet::new();
        while let Some(name) = queue.pop_front() {
            if name == to {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(decl) = self.get(&name) {
                if let Some(superclass) = decl.superclass.as_ref().and_then(|s| s.erasure()) {
                    queue.push_back(superclass.to_string());
                }
                for interface in &decl.interfaces {
                    if let Some(interface) = interface.erasure() {
                        queue.push_back(interface.to_string());
                    }
                }
            }
        }
        false
    }

    /// The declaring class followed by its superclass chain (known declarations only)
    pub fn class_chain<'a>(&'a self, start: &'a TypeDecl) -> Vec<&'a TypeDecl> {
        let mut chain = vec![start];
        let mut seen: HashSet<&str> = HashSet::from([start.name.as_str()]);
        let mut current = start;
        while let Some(next) = current
            .superclass
            .as_ref()
            .and_then(|s| s.erasure())
            .and_then(|name| self.get(name))
        {
            if !seen.insert(next.name.as_str()) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }
}
