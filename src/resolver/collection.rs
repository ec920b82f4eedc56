//! Collection shape detection and service type derivation for field-like sites

use crate::model::descriptor::FieldCollectionType;
use crate::model::hierarchy::TypeIndex;
use crate::model::types::{self, TypeRef};
use std::collections::{HashSet, VecDeque};

/// Result of looking for a `Collection`/`List` ancestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionShape {
    /// Element type, `None` when the type is not a collection
    pub element: Option<TypeRef>,
    /// The declared type itself is `Collection` or `List`
    pub exact: bool,
}

impl CollectionShape {
    pub fn is_collection(&self) -> bool {
        self.element.is_some()
    }

    /// Attribute value derived from the element type; `None` means the default
    pub fn field_collection_type(&self) -> Option<FieldCollectionType> {
        let element = self.element.as_ref()?;
        match element.erasure()? {
            types::SERVICE_REFERENCE => Some(FieldCollectionType::Reference),
            types::COMPONENT_SERVICE_OBJECTS => Some(FieldCollectionType::ServiceObjects),
            types::MAP => Some(FieldCollectionType::Properties),
            types::MAP_ENTRY => Some(FieldCollectionType::Tuple),
            _ => None,
        }
    }
}

/// Breadth-first walk over superclasses (excluding Object) and interfaces
pub fn collection_shape(index: &TypeIndex, ty: &TypeRef) -> CollectionShape {
    let mut queue = VecDeque::from([ty.clone()]);
    let mut visited = HashSet::new();
    let mut exact = true;

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }

        if current.is_class(types::COLLECTION) || current.is_class(types::LIST) {
            let element = current
                .type_args()
                .first()
                .cloned()
                .unwrap_or_else(TypeRef::object);
            return CollectionShape {
                element: Some(element),
                exact,
            };
        }

        exact = false;

        if let Some(superclass) = index.superclass(&current) {
            if !superclass.is_class(types::OBJECT) {
                queue.push_back(superclass);
            }
        }
        queue.extend(index.interfaces(&current));
    }

    CollectionShape {
        element: None,
        exact: false,
    }
}

fn is_service_wrapper(ty: &TypeRef) -> bool {
    ty.is_class(types::SERVICE_REFERENCE) || ty.is_class(types::COMPONENT_SERVICE_OBJECTS)
}

/// Service type implied by a field, parameter or collection element type
pub fn field_service_type(ty: &TypeRef) -> Option<TypeRef> {
    if is_service_wrapper(ty) {
        return ty.type_args().first().cloned();
    }
    if ty.is_class(types::MAP_ENTRY) {
        return match ty.type_args() {
            [key, value, ..] if key.is_class(types::MAP) => Some(value.clone()),
            _ => None,
        };
    }
    if ty.is_class(types::MAP) {
        return None;
    }
    Some(ty.boxed())
}

/// Whether a field (or element) of type `ty` can receive `service`
pub fn is_valid_field_for_service(index: &TypeIndex, ty: &TypeRef, service: &TypeRef) -> bool {
    if is_service_wrapper(ty) {
        return match ty.type_args().first() {
            None => true,
            Some(arg) => index.is_assignable(service, arg),
        } || index.is_assignable(service, ty);
    }
    if ty.is_class(types::MAP) {
        return true;
    }
    if ty.is_class(types::MAP_ENTRY) {
        return match ty.type_args() {
            [key, value, ..] => key.is_class(types::MAP) && index.is_assignable(service, value),
            _ => true,
        };
    }
    index.is_assignable(service, ty)
}

/// Whether a bind method argument of type `ty` can receive `service`
pub fn is_valid_argument_for_service(index: &TypeIndex, ty: &TypeRef, service: &TypeRef) -> bool {
    let wrapper_ok = is_service_wrapper(ty)
        && ty
            .type_args()
            .first()
            .map(|arg| index.is_assignable(service, arg))
            .unwrap_or(true);
    wrapper_ok || index.is_assignable(service, ty) || ty.is_class(types::MAP)
}
