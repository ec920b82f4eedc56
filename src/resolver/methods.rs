//! Bind/unbind/updated method and reference field search along the class chain

use crate::model::hierarchy::TypeIndex;
use crate::model::source::{FieldDecl, MethodDecl, Modifiers, TypeDecl, Visibility};
use crate::model::types::{self, TypeRef};
use crate::version::SpecVersion;

/// Members of superclasses are usable when public, protected, or
/// package-private in the component's package
fn is_eligible(component: &TypeDecl, declaring: &TypeDecl, modifiers: &Modifiers) -> bool {
    declaring.name == component.name
        || matches!(modifiers.visibility, Visibility::Public | Visibility::Protected)
        || (modifiers.visibility == Visibility::Package && declaring.package() == component.package())
}

/// Finds the best method named `name` able to receive `service`.
///
/// Only the component class is searched unless `recurse` is set. Candidates
/// are ranked by parameter shape; with the 1.3 rules a lone `ServiceReference`
/// parameter wins outright and the first parameter carries a +10 offset.
pub fn find_reference_method<'a>(
    index: &'a TypeIndex,
    component: &'a TypeDecl,
    service: Option<&TypeRef>,
    name: &str,
    recurse: bool,
    version: SpecVersion,
) -> Option<&'a MethodDecl> {
    let chain = index.class_chain(component);
    let classes = if recurse { &chain[..] } else { &chain[..1] };

    let mut candidate = None;
    let mut priority = 0;

    for &declaring in classes {
        for method in &declaring.methods {
            if method.name != name
                || method.modifiers.is_static
                || !method.return_type.is_void()
                || !is_eligible(component, declaring, &method.modifiers)
            {
                continue;
            }

            let params: Vec<&TypeRef> = method.param_types().collect();
            if version.has_modern_signatures() {
                for (i, param) in params.iter().enumerate() {
                    let offset = if i == 0 { 10 } else { 0 };
                    if param.is_class(types::SERVICE_REFERENCE) {
                        if params.len() == 1 {
                            return Some(method);
                        }
                        if priority < 5 {
                            priority = 5;
                        }
                    } else if priority < offset + 4 && param.is_class(types::COMPONENT_SERVICE_OBJECTS) {
                        priority = offset + 4;
                    } else if priority < offset + 3 && service == Some(*param) {
                        priority = offset + 3;
                    } else if priority < offset + 2
                        && service.map(|s| index.is_assignable(s, param)).unwrap_or(false)
                    {
                        priority = offset + 2;
                    } else if priority < offset + 1 && param.is_class(types::MAP) {
                        priority = offset + 1;
                    } else {
                        continue;
                    }
                    candidate = Some(method);
                }
            } else if params.len() == 1 {
                let param = params[0];
                if param.is_class(types::SERVICE_REFERENCE) {
                    return Some(method);
                }
                if priority < 3 && service == Some(param) {
                    priority = 3;
                } else if priority < 2 && service.map(|s| index.is_assignable(s, param)).unwrap_or(false) {
                    priority = 2;
                } else {
                    continue;
                }
                candidate = Some(method);
            } else if params.len() == 2 {
                let map_second = params[1].is_class(types::MAP);
                if priority < 1 && service == Some(params[0]) && map_second {
                    priority = 1;
                } else if candidate.is_some()
                    || !service.map(|s| index.is_assignable(s, params[0])).unwrap_or(false)
                    || !map_second
                {
                    continue;
                }
                candidate = Some(method);
            }
        }
    }

    candidate
}

/// First non-static, eligible field named `name` along the class chain
pub fn find_reference_field<'a>(
    index: &'a TypeIndex,
    component: &'a TypeDecl,
    name: &str,
) -> Option<&'a FieldDecl> {
    index.class_chain(component).into_iter().find_map(|declaring| {
        declaring.fields.iter().find(|field| {
            field.name == name
                && !field.modifiers.is_static
                && is_eligible(component, declaring, &field.modifiers)
        })
    })
}

/// Signature accepted by 1.1/1.2 runtimes: `(T)`, `(ServiceReference)` or `(T, Map)`
pub fn is_legacy_signature(index: &TypeIndex, method: &MethodDecl, service: Option<&TypeRef>) -> bool {
    let assignable = |param: &TypeRef| service.map(|s| index.is_assignable(s, param)).unwrap_or(true);
    match method.params.as_slice() {
        [only] => only.ty.is_class(types::SERVICE_REFERENCE) || assignable(&only.ty),
        [first, second] => assignable(&first.ty) && second.ty.is_class(types::MAP),
        _ => false,
    }
}
