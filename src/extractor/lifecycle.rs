//! Activate, deactivate and modified methods, activation fields and the
//! activation constructor

use crate::diagnostics::{DiagnosticKind, ProblemReporter};
use crate::model::hierarchy::TypeIndex;
use crate::model::source::{ConstructorDecl, FieldDecl, LifecycleKind, LifecycleMarker, MethodDecl, ParamDecl, TypeDecl};
use crate::model::types::{self, Primitive, TypeRef};
use crate::version::SpecVersion;
use std::collections::HashSet;

/// Lifecycle bindings of one component
#[derive(Debug, Default)]
pub struct Lifecycle<'a> {
    pub activate: Option<&'a MethodDecl>,
    pub deactivate: Option<&'a MethodDecl>,
    pub modified: Option<&'a MethodDecl>,
    /// Unannotated `activate` method with a valid signature
    pub implicit_activate: Option<&'a MethodDecl>,
    pub implicit_deactivate: Option<&'a MethodDecl>,
    pub constructor: Option<&'a ConstructorDecl>,
    /// Sorted by name
    pub fields: Vec<&'a FieldDecl>,
}

impl<'a> Lifecycle<'a> {
    /// Activate method whose parameters contribute properties
    pub fn effective_activate(&self) -> Option<&'a MethodDecl> {
        self.activate.or(self.implicit_activate)
    }

    pub fn effective_deactivate(&self) -> Option<&'a MethodDecl> {
        self.deactivate.or(self.implicit_deactivate)
    }
}

/// Parameter kinds accepted by lifecycle methods and the activation constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ActivationParam<'t> {
    Map,
    ComponentContext,
    BundleContext,
    ReasonCode,
    PropertyType(&'t str),
}

fn classify<'t>(
    index: &TypeIndex,
    ty: &'t TypeRef,
    kind: LifecycleKind,
    version: SpecVersion,
) -> Option<ActivationParam<'t>> {
    if version.has_modern_signatures() && index.is_annotation(ty) {
        return ty.erasure().map(ActivationParam::PropertyType);
    }
    let reason_code =
        matches!(ty, TypeRef::Primitive(Primitive::Int)) || ty.is_class(types::INTEGER);
    match ty.erasure() {
        Some(types::MAP) => Some(ActivationParam::Map),
        Some(types::COMPONENT_CONTEXT) => Some(ActivationParam::ComponentContext),
        Some(types::BUNDLE_CONTEXT) => Some(ActivationParam::BundleContext),
        _ if reason_code && kind == LifecycleKind::Deactivate => Some(ActivationParam::ReasonCode),
        _ => None,
    }
}

/// Checks every parameter, reporting invalid and repeated types
fn validate_params<'p>(
    index: &TypeIndex,
    params: impl Iterator<Item = &'p ParamDecl>,
    kind: LifecycleKind,
    version: SpecVersion,
    marker: &LifecycleMarker,
    reporter: &mut ProblemReporter,
) {
    let mut seen = HashSet::new();
    for param in params {
        match classify(index, &param.ty, kind, version) {
            Some(class) => {
                if !seen.insert(class) {
                    reporter.report(
                        DiagnosticKind::DuplicateDeclaration,
                        marker.span.range,
                        format!("duplicate {} parameter type {}", kind.as_str(), param.ty.simple_name()),
                    );
                }
            }
            None => reporter.report(
                DiagnosticKind::LifecycleViolation,
                marker.span.range,
                format!("invalid {} parameter type {}", kind.as_str(), param.ty.simple_name()),
            ),
        }
    }
}

fn validate_method(
    index: &TypeIndex,
    method: &MethodDecl,
    kind: LifecycleKind,
    marker: &LifecycleMarker,
    version: SpecVersion,
    reporter: &mut ProblemReporter,
) {
    if !reporter.checks_enabled() {
        return;
    }
    if method.modifiers.is_static {
        reporter.report(
            DiagnosticKind::LifecycleViolation,
            marker.span.range,
            format!("{} method '{}' must not be static", kind.as_str(), method.name),
        );
    }
    if !method.return_type.is_void() {
        reporter.report(
            DiagnosticKind::LifecycleViolation,
            marker.span.range,
            format!(
                "{} method '{}' must return void, not {}",
                kind.as_str(),
                method.name,
                method.return_type.simple_name()
            ),
        );
    }
    validate_params(index, method.params.iter(), kind, version, marker, reporter);
}

/// Unannotated method named after the lifecycle kind, declared on the
/// component itself, with a signature the runtime accepts
pub fn find_lifecycle_method<'a>(
    index: &TypeIndex,
    component: &'a TypeDecl,
    kind: LifecycleKind,
    version: SpecVersion,
) -> Option<&'a MethodDecl> {
    component.methods.iter().find(|method| {
        if method.name != kind.as_str() || !method.return_type.is_void() {
            return false;
        }
        let mut seen = HashSet::new();
        method.params.iter().all(|param| {
            classify(index, &param.ty, kind, version)
                .map(|class| seen.insert(class))
                .unwrap_or(false)
        })
    })
}

/// Picks the single annotated candidate of one kind; with several candidates
/// every one is reported and none is used
fn single<'a, T>(
    candidates: Vec<(&'a T, &'a LifecycleMarker)>,
    describe: impl Fn(&T) -> String,
    kind: LifecycleKind,
    reporter: &mut ProblemReporter,
) -> Option<(&'a T, &'a LifecycleMarker)> {
    if candidates.len() <= 1 {
        return candidates.into_iter().next();
    }
    for (candidate, marker) in &candidates {
        reporter.report(
            DiagnosticKind::DuplicateDeclaration,
            marker.span.range,
            format!("duplicate {} declaration {}", kind.as_str(), describe(*candidate)),
        );
    }
    None
}

/// Finds and validates lifecycle declarations of `component`
pub fn collect<'a>(
    index: &TypeIndex,
    component: &'a TypeDecl,
    version: SpecVersion,
    reporter: &mut ProblemReporter,
) -> Lifecycle<'a> {
    let mut lifecycle = Lifecycle::default();

    for kind in [LifecycleKind::Activate, LifecycleKind::Deactivate, LifecycleKind::Modified] {
        let candidates: Vec<_> = component
            .methods
            .iter()
            .filter_map(|m| m.lifecycle_marker(kind).map(|marker| (m, marker)))
            .collect();
        let chosen = single(candidates, |m: &MethodDecl| format!("'{}'", m.name), kind, reporter);
        if let Some((method, marker)) = chosen {
            validate_method(index, method, kind, marker, version, reporter);
        }
        let method = chosen.map(|(m, _)| m);
        match kind {
            LifecycleKind::Activate => lifecycle.activate = method,
            LifecycleKind::Deactivate => lifecycle.deactivate = method,
            LifecycleKind::Modified => lifecycle.modified = method,
        }
    }

    // An annotated duplicate still suppresses the implicit method
    let annotated = |kind: LifecycleKind| component.methods.iter().any(|m| m.lifecycle_marker(kind).is_some());
    if !annotated(LifecycleKind::Activate) {
        lifecycle.implicit_activate = find_lifecycle_method(index, component, LifecycleKind::Activate, version);
    }
    if !annotated(LifecycleKind::Deactivate) {
        lifecycle.implicit_deactivate =
            find_lifecycle_method(index, component, LifecycleKind::Deactivate, version);
    }

    if !version.has_modern_naming() {
        return lifecycle;
    }

    let constructors: Vec<_> = component
        .constructors
        .iter()
        .filter_map(|c| c.lifecycle_marker(LifecycleKind::Activate).map(|marker| (c, marker)))
        .collect();
    let chosen = single(
        constructors,
        |c: &ConstructorDecl| format!("constructor with {} parameters", c.params.len()),
        LifecycleKind::Activate,
        reporter,
    );
    if let Some((constructor, marker)) = chosen {
        if reporter.checks_enabled() {
            if !constructor.modifiers.is_public() {
                reporter.report(
                    DiagnosticKind::LifecycleViolation,
                    marker.span.range,
                    "activation constructor must be public",
                );
            }
            let plain = constructor.params.iter().filter(|p| p.reference_marker().is_none());
            validate_params(index, plain, LifecycleKind::Activate, version, marker, reporter);
        }
        lifecycle.constructor = Some(constructor);
    }

    let mut fields: Vec<&FieldDecl> = component
        .fields
        .iter()
        .filter(|f| f.lifecycle_marker(LifecycleKind::Activate).is_some())
        .collect();
    if reporter.checks_enabled() {
        for field in &fields {
            if field.modifiers.is_static {
                let range = field
                    .lifecycle_marker(LifecycleKind::Activate)
                    .map(|m| m.span.range)
                    .unwrap_or(field.range);
                reporter.report(
                    DiagnosticKind::LifecycleViolation,
                    range,
                    format!("activation field '{}' must not be static", field.name),
                );
            }
        }
    }
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    lifecycle.fields = fields;

    lifecycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ValidationLevel;
    use crate::model::source::{Annotation, Modifiers, SourceRange, TypeKind};

    fn reporter() -> ProblemReporter {
        ProblemReporter::new(ValidationLevel::Error, ValidationLevel::Error)
    }

    fn method(name: &str, params: &[&str], annotations: Vec<Annotation>) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            return_type: TypeRef::Void,
            params: params
                .iter()
                .enumerate()
                .map(|(i, ty)| ParamDecl {
                    name: format!("p{i}"),
                    ty: ty.parse().unwrap(),
                    annotations: Vec::new(),
                })
                .collect(),
            modifiers: Modifiers::public(),
            annotations,
            range: SourceRange::default(),
        }
    }

    fn activate() -> Vec<Annotation> {
        vec![Annotation::Activate(LifecycleMarker::default())]
    }

    #[test]
    fn test_annotated_activate_with_valid_params() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods.push(method(
            "start",
            &["java.util.Map", "org.osgi.service.component.ComponentContext"],
            activate(),
        ));
        let index = TypeIndex::new();
        let mut reporter = reporter();
        let lifecycle = collect(&index, &component, SpecVersion::V1_3, &mut reporter);
        assert_eq!(lifecycle.activate.map(|m| m.name.as_str()), Some("start"));
        assert!(lifecycle.implicit_activate.is_none());
        assert!(reporter.diagnostics().is_empty());
    }

    #[test]
    fn test_duplicate_activate_honors_none() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods.push(method("start", &[], activate()));
        component.methods.push(method("begin", &[], activate()));
        component.methods.push(method("activate", &[], Vec::new()));
        let index = TypeIndex::new();
        let mut reporter = reporter();
        let lifecycle = collect(&index, &component, SpecVersion::V1_3, &mut reporter);
        assert!(lifecycle.activate.is_none());
        assert!(lifecycle.implicit_activate.is_none());
        assert_eq!(reporter.diagnostics().len(), 2);
        assert!(reporter
            .diagnostics()
            .iter()
            .all(|d| d.kind == DiagnosticKind::DuplicateDeclaration));
    }

    #[test]
    fn test_invalid_signature() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        let mut bad = method("stop", &["int", "java.util.Map", "java.util.Map", "java.lang.String"], Vec::new());
        bad.annotations = vec![Annotation::Deactivate(LifecycleMarker::default())];
        bad.modifiers.is_static = true;
        bad.return_type = TypeRef::class(types::STRING);
        component.methods.push(bad);
        let index = TypeIndex::new();
        let mut reporter = reporter();
        collect(&index, &component, SpecVersion::V1_3, &mut reporter);

        let kinds: Vec<DiagnosticKind> = reporter.diagnostics().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::LifecycleViolation,
                DiagnosticKind::LifecycleViolation,
                DiagnosticKind::DuplicateDeclaration,
                DiagnosticKind::LifecycleViolation,
            ]
        );
    }

    #[test]
    fn test_implicit_lifecycle_methods() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods.push(method("activate", &["org.osgi.framework.BundleContext"], Vec::new()));
        component.methods.push(method("deactivate", &["int"], Vec::new()));
        let index = TypeIndex::new();
        let lifecycle = collect(&index, &component, SpecVersion::V1_3, &mut reporter());
        assert!(lifecycle.implicit_activate.is_some());
        assert!(lifecycle.implicit_deactivate.is_some());
        assert!(lifecycle.effective_activate().is_some());

        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods.push(method("activate", &["int"], Vec::new()));
        assert!(find_lifecycle_method(&index, &component, LifecycleKind::Activate, SpecVersion::V1_3).is_none());
    }

    #[test]
    fn test_constructor_and_fields_need_modern_version() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.constructors.push(ConstructorDecl {
            params: vec![ParamDecl {
                name: "props".into(),
                ty: TypeRef::class(types::MAP),
                annotations: Vec::new(),
            }],
            modifiers: Modifiers::public(),
            annotations: activate(),
            range: SourceRange::default(),
        });
        for name in ["zeta", "alpha"] {
            component.fields.push(FieldDecl {
                name: name.into(),
                ty: TypeRef::class(types::MAP),
                modifiers: Modifiers::default(),
                annotations: activate(),
                constant: None,
                range: SourceRange::default(),
            });
        }
        let index = TypeIndex::new();

        let legacy = collect(&index, &component, SpecVersion::V1_3, &mut reporter());
        assert!(legacy.constructor.is_none());
        assert!(legacy.fields.is_empty());

        let modern = collect(&index, &component, SpecVersion::V1_4, &mut reporter());
        assert!(modern.constructor.is_some());
        let names: Vec<&str> = modern.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
