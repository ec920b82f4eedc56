//! Shape checks a type must pass before it can be a component

use crate::diagnostics::{DiagnosticKind, ProblemReporter};
use crate::model::source::{LifecycleKind, SourceRange, TypeDecl, TypeKind};
use crate::version::SpecVersion;

/// Top-level, or public static nested inside public types that are
/// themselves top-level or public static
pub fn is_reachable_nesting(decl: &TypeDecl, enclosing: &[&TypeDecl]) -> bool {
    let Some((outermost, inner)) = enclosing.split_first() else {
        return true;
    };
    decl.modifiers.is_static
        && outermost.modifiers.is_public()
        && inner.iter().all(|t| t.modifiers.is_public() && t.modifiers.is_static)
}

/// Public no-arg constructor, no constructor at all, or (from 1.4) exactly
/// one annotated activation constructor
pub fn has_usable_constructor(decl: &TypeDecl, version: SpecVersion) -> bool {
    if decl.constructors.is_empty() {
        return true;
    }
    if decl.constructors.iter().any(|c| c.modifiers.is_public() && c.params.is_empty()) {
        return true;
    }
    version.has_modern_naming()
        && decl
            .constructors
            .iter()
            .filter(|c| c.lifecycle_marker(LifecycleKind::Activate).is_some())
            .count()
            == 1
}

/// Returns whether `decl` may be a component, reporting the first violated
/// rule at `range`
pub fn check_preconditions(
    decl: &TypeDecl,
    enclosing: &[&TypeDecl],
    version: SpecVersion,
    range: SourceRange,
    reporter: &mut ProblemReporter,
) -> bool {
    let name = decl.simple_name();
    let problem = if !decl.modifiers.is_public() {
        Some(format!("component class '{}' must be public", name))
    } else {
        match decl.kind {
            TypeKind::Interface => Some(format!("'{}' is an interface and cannot be a component", name)),
            TypeKind::Enum => Some(format!("'{}' is an enum and cannot be a component", name)),
            TypeKind::Annotation => Some(format!("'{}' is an annotation type and cannot be a component", name)),
            TypeKind::Class if decl.modifiers.is_abstract => {
                Some(format!("component class '{}' must not be abstract", name))
            }
            TypeKind::Class if !is_reachable_nesting(decl, enclosing) => Some(format!(
                "component class '{}' must be top-level or a public static nested class",
                name
            )),
            TypeKind::Class if !has_usable_constructor(decl, version) => Some(format!(
                "component class '{}' must declare a public no-argument constructor or exactly one activation constructor",
                name
            )),
            TypeKind::Class => None,
        }
    };

    match problem {
        Some(message) => {
            reporter.report(DiagnosticKind::StructuralViolation, range, message);
            false
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ValidationLevel;
    use crate::model::source::{Annotation, ConstructorDecl, LifecycleMarker, Modifiers, ParamDecl};
    use crate::model::types::TypeRef;

    fn check(decl: &TypeDecl, enclosing: &[&TypeDecl], version: SpecVersion) -> (bool, usize) {
        let mut reporter = ProblemReporter::new(ValidationLevel::Error, ValidationLevel::Error);
        let ok = check_preconditions(decl, enclosing, version, SourceRange::default(), &mut reporter);
        (ok, reporter.diagnostics().len())
    }

    #[test]
    fn test_plain_class_passes() {
        let decl = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        assert_eq!(check(&decl, &[], SpecVersion::V1_3), (true, 0));
    }

    #[test]
    fn test_shapes_rejected() {
        let mut abstract_class = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        abstract_class.modifiers.is_abstract = true;
        let mut private = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        private.modifiers = Modifiers::default();

        for decl in [
            TypeDecl::new("com.acme.Api", TypeKind::Interface),
            TypeDecl::new("com.acme.Color", TypeKind::Enum),
            TypeDecl::new("com.acme.Config", TypeKind::Annotation),
            abstract_class,
            private,
        ] {
            assert_eq!(check(&decl, &[], SpecVersion::V1_3), (false, 1), "{}", decl.name);
        }
    }

    #[test]
    fn test_nesting() {
        let outer = TypeDecl::new("com.acme.Outer", TypeKind::Class);
        let mut inner = TypeDecl::new("com.acme.Outer$Inner", TypeKind::Class);
        assert!(!is_reachable_nesting(&inner, &[&outer]));
        inner.modifiers.is_static = true;
        assert!(is_reachable_nesting(&inner, &[&outer]));

        let mut middle = TypeDecl::new("com.acme.Outer$Middle", TypeKind::Class);
        assert!(!is_reachable_nesting(&inner, &[&outer, &middle]));
        middle.modifiers.is_static = true;
        assert!(is_reachable_nesting(&inner, &[&outer, &middle]));

        let mut hidden = TypeDecl::new("com.acme.Hidden", TypeKind::Class);
        hidden.modifiers = Modifiers::default();
        assert!(!is_reachable_nesting(&inner, &[&hidden]));
    }

    #[test]
    fn test_constructors() {
        let mut decl = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        let injected = ConstructorDecl {
            params: vec![ParamDecl {
                name: "log".into(),
                ty: TypeRef::class("com.acme.Log"),
                annotations: Vec::new(),
            }],
            modifiers: Modifiers::public(),
            annotations: Vec::new(),
            range: SourceRange::default(),
        };
        decl.constructors.push(injected.clone());
        assert!(!has_usable_constructor(&decl, SpecVersion::V1_4));

        decl.constructors[0]
            .annotations
            .push(Annotation::Activate(LifecycleMarker::default()));
        assert!(has_usable_constructor(&decl, SpecVersion::V1_4));
        assert!(!has_usable_constructor(&decl, SpecVersion::V1_3));

        decl.constructors.push(ConstructorDecl {
            modifiers: Modifiers::public(),
            ..ConstructorDecl::default()
        });
        assert!(has_usable_constructor(&decl, SpecVersion::V1_3));
    }

    #[test]
    fn test_several_activation_constructors_are_rejected() {
        let annotated = |param: &str| ConstructorDecl {
            params: vec![ParamDecl {
                name: param.into(),
                ty: TypeRef::class("com.acme.Log"),
                annotations: Vec::new(),
            }],
            modifiers: Modifiers::public(),
            annotations: vec![Annotation::Activate(LifecycleMarker::default())],
            range: SourceRange::default(),
        };
        let mut decl = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        decl.constructors.push(annotated("log"));
        decl.constructors.push(annotated("other"));

        assert!(!has_usable_constructor(&decl, SpecVersion::V1_4));
        assert_eq!(check(&decl, &[], SpecVersion::V1_4), (false, 1));

        decl.constructors.push(ConstructorDecl {
            modifiers: Modifiers::public(),
            ..ConstructorDecl::default()
        });
        assert_eq!(check(&decl, &[], SpecVersion::V1_4), (true, 0));
    }
}
