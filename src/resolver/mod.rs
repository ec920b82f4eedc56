//! Resolution of reference sites into reference descriptors
//!
//! A reference is declared on a bind method, a field, a constructor
//! parameter, or in the component marker's `reference` array. Each site
//! determines the service type, cardinality and the bind/unbind/updated
//! methods or field differently; they all report into the unit's
//! [`ProblemReporter`].

pub mod collection;
pub mod methods;

use crate::diagnostics::{DiagnosticKind, ProblemReporter};
use crate::filter;
use crate::model::descriptor::{FieldOption, ReferenceDescriptor, ReferencePolicy};
use crate::model::hierarchy::TypeIndex;
use crate::model::source::{FieldDecl, MethodDecl, ParamDecl, ReferenceMarker, SourceRange, TypeDecl};
use crate::model::types::{self, TypeRef};
use crate::version::{Feature, SpecVersion};
use std::collections::{BTreeSet, HashMap};

pub use collection::{collection_shape, CollectionShape};
pub use methods::{find_reference_field, find_reference_method, is_legacy_signature};

use collection::{field_service_type, is_valid_argument_for_service, is_valid_field_for_service};

/// Reference names seen so far in one component.
///
/// A duplicate is reported on the new declaration and, once, on the first.
#[derive(Debug, Default)]
pub struct ReferenceNames {
    seen: HashMap<String, Option<SourceRange>>,
}

impl ReferenceNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, name: &str, range: SourceRange, reporter: &mut ProblemReporter) {
        if !reporter.checks_enabled() {
            return;
        }
        match self.seen.get_mut(name) {
            Some(first) => {
                let message = format!("duplicate reference name '{}'", name);
                reporter.report(DiagnosticKind::ReferenceViolation, range, message.clone());
                if let Some(first) = first.take() {
                    reporter.report(DiagnosticKind::ReferenceViolation, first, message);
                }
            }
            None => {
                self.seen.insert(name.to_string(), Some(range));
            }
        }
    }
}

/// A resolved reference plus the features it uses that are not visible as
/// attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub reference: ReferenceDescriptor,
    pub features: BTreeSet<Feature>,
}

/// Name of a reference bound by `method`: the method name without a leading
/// `bind`, `set` or `add`
pub fn reference_name_from_method(method: &str) -> &str {
    ["bind", "set", "add"]
        .iter()
        .find_map(|prefix| method.strip_prefix(prefix))
        .unwrap_or(method)
}

/// Bind, unbind and updated method names with the methods they resolved to
struct EventMethods<'a> {
    bind: Option<String>,
    bind_method: Option<&'a MethodDecl>,
    unbind: Option<String>,
    unbind_method: Option<&'a MethodDecl>,
    updated: Option<String>,
    updated_method: Option<&'a MethodDecl>,
}

/// Resolves reference sites of one component class
pub struct ReferenceResolver<'a> {
    index: &'a TypeIndex,
    component: &'a TypeDecl,
    version: SpecVersion,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(index: &'a TypeIndex, component: &'a TypeDecl, version: SpecVersion) -> Self {
        Self {
            index,
            component,
            version,
        }
    }

    fn find_method(&self, service: Option<&TypeRef>, name: &str, recurse: bool) -> Option<&'a MethodDecl> {
        find_reference_method(self.index, self.component, service, name, recurse, self.version)
    }

    fn validate_target(&self, marker: &ReferenceMarker, target: &str, reporter: &mut ProblemReporter) {
        if !reporter.checks_enabled() {
            return;
        }
        if let Err(e) = filter::validate(target) {
            reporter.report(
                DiagnosticKind::AttributeViolation,
                marker.span.locate(Some("target"), None),
                format!("invalid target filter '{}': {}", target, e),
            );
        }
    }

    /// Explicit or implicit unbind/updated value: `-` disables it, anything
    /// else must name a method found along the class chain
    fn explicit_method(
        &self,
        marker: &ReferenceMarker,
        member: &str,
        value: &str,
        service: &TypeRef,
        reporter: &mut ProblemReporter,
    ) -> (Option<String>, Option<&'a MethodDecl>) {
        if value == "-" {
            return (None, None);
        }
        let mut found = None;
        if reporter.checks_enabled() {
            found = self.find_method(Some(service), value, true);
            if found.is_none() {
                reporter.report(
                    DiagnosticKind::ReferenceViolation,
                    marker.span.locate(Some(member), None),
                    format!("{} method '{}' not found", member, value),
                );
            }
        }
        (Some(value.to_string()), found)
    }

    fn validate_bind_method(
        &self,
        marker: &ReferenceMarker,
        service: &TypeRef,
        method: &MethodDecl,
        reporter: &mut ProblemReporter,
    ) {
        if !reporter.checks_enabled() {
            return;
        }
        let range = marker.span.range;
        if method.modifiers.is_static {
            reporter.report(
                DiagnosticKind::ReferenceViolation,
                range,
                format!("bind method '{}' must not be static", method.name),
            );
        }
        if !method.return_type.is_void() {
            reporter.report(
                DiagnosticKind::ReferenceViolation,
                range,
                format!(
                    "bind method '{}' must return void, not {}",
                    method.name,
                    method.return_type.simple_name()
                ),
            );
        }

        if self.version.has_modern_signatures() {
            if method.params.is_empty() {
                reporter.report(
                    DiagnosticKind::ReferenceViolation,
                    range,
                    format!(
                        "bind method '{}' must take at least one argument for service {}",
                        method.name,
                        service.simple_name()
                    ),
                );
            }
            for param in &method.params {
                if !param.ty.is_class(types::SERVICE_REFERENCE)
                    && !param.ty.is_class(types::COMPONENT_SERVICE_OBJECTS)
                    && !param.ty.is_class(types::MAP)
                    && !self.index.is_assignable(service, &param.ty)
                {
                    reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        range,
                        format!(
                            "bind method argument {} cannot receive service {}",
                            param.ty.simple_name(),
                            service.simple_name()
                        ),
                    );
                }
            }
        } else if !is_legacy_signature(self.index, method, Some(service)) {
            let args: Vec<String> = method.param_types().map(|t| t.simple_name()).collect();
            reporter.report(
                DiagnosticKind::ReferenceViolation,
                range,
                format!(
                    "bind method signature ({}) is not valid for service {} in this version",
                    args.join(", "),
                    service.simple_name()
                ),
            );
        }
    }

    /// Handles `field` and `fieldOption` on method and class-level sites
    fn apply_field_params(
        &self,
        marker: &ReferenceMarker,
        service: &TypeRef,
        reference: &mut ReferenceDescriptor,
        reporter: &mut ProblemReporter,
    ) {
        let multiple = reference.is_multiple();
        let mut field_decl: Option<&FieldDecl> = None;
        let mut shape: Option<CollectionShape> = None;

        if let Some(field) = &marker.field {
            if reporter.checks_enabled() {
                field_decl = find_reference_field(self.index, self.component, field);
                match field_decl {
                    None => reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        marker.span.locate(Some("field"), None),
                        format!("field '{}' not found", field),
                    ),
                    Some(decl) => {
                        let mut target = Some(decl.ty.clone());
                        if multiple {
                            let detected = collection_shape(self.index, &decl.ty);
                            target = detected.element.clone();
                            shape = Some(detected);
                        }
                        if let Some(target) = target {
                            if !is_valid_field_for_service(self.index, &target, service) {
                                reporter.report(
                                    DiagnosticKind::ReferenceViolation,
                                    marker.span.locate(Some("field"), None),
                                    format!(
                                        "field type {} is not compatible with service {}",
                                        target.simple_name(),
                                        service.simple_name()
                                    ),
                                );
                            }
                        }
                    }
                }
            }
        }

        if let Some(option) = marker.field_option {
            if reporter.checks_enabled() {
                let range = marker.span.locate(Some("fieldOption"), None);
                match (&marker.field, option) {
                    (None, _) => reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        range,
                        "fieldOption requires a field",
                    ),
                    (Some(field), FieldOption::Replace) => {
                        let decl = field_decl.or_else(|| find_reference_field(self.index, self.component, field));
                        if decl.map(|d| d.modifiers.is_final).unwrap_or(false) {
                            reporter.report(
                                DiagnosticKind::ReferenceViolation,
                                range,
                                "fieldOption replace cannot be used with a final field",
                            );
                        }
                    }
                    (Some(_), FieldOption::Update) => {
                        if !(reference.is_dynamic() && multiple) {
                            reporter.report(
                                DiagnosticKind::ReferenceViolation,
                                range,
                                "fieldOption update requires a dynamic policy and multiple cardinality",
                            );
                        }
                    }
                }
            }
        }

        if let (Some(field), true) = (&marker.field, multiple) {
            let decl = field_decl.or_else(|| find_reference_field(self.index, self.component, field));
            if let Some(decl) = decl {
                let shape = shape.unwrap_or_else(|| collection_shape(self.index, &decl.ty));
                reference.field_collection_type = shape.field_collection_type();
            }
        }

        reference.field = marker.field.clone();
        reference.field_option = marker.field_option;
    }

    /// Explicit `bind`/`unbind`/`updated` on field and class-level sites
    fn explicit_event_methods(
        &self,
        marker: &ReferenceMarker,
        service: &TypeRef,
        reporter: &mut ProblemReporter,
    ) -> EventMethods<'a> {
        let mut lookup = |member: &str, value: &Option<String>| -> (Option<String>, Option<&'a MethodDecl>) {
            let Some(value) = value else {
                return (None, None);
            };
            let mut found = None;
            if reporter.checks_enabled() {
                found = self.find_method(Some(service), value, true);
                if found.is_none() {
                    reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        marker.span.locate(Some(member), None),
                        format!("{} method '{}' not found", member, value),
                    );
                }
            }
            (Some(value.clone()), found)
        };
        let (bind, bind_method) = lookup("bind", &marker.bind);
        let (unbind, unbind_method) = lookup("unbind", &marker.unbind);
        let (updated, updated_method) = lookup("updated", &marker.updated);
        EventMethods {
            bind,
            bind_method,
            unbind,
            unbind_method,
            updated,
            updated_method,
        }
    }

    /// Records [`Feature::ModernBindSignature`] when an event method needs it
    fn signature_features(
        &self,
        service: &TypeRef,
        events: &EventMethods<'a>,
        features: &mut BTreeSet<Feature>,
    ) {
        if !self.version.has_modern_signatures() {
            return;
        }
        let pairs = [
            (&events.bind, events.bind_method),
            (&events.unbind, events.unbind_method),
            (&events.updated, events.updated_method),
        ];
        for (name, method) in pairs {
            let Some(name) = name else { continue };
            let method = method.or_else(|| self.find_method(Some(service), name, true));
            if let Some(method) = method {
                if !is_legacy_signature(self.index, method, Some(service)) {
                    features.insert(Feature::ModernBindSignature);
                    return;
                }
            }
        }
    }

    fn apply_common(&self, marker: &ReferenceMarker, reference: &mut ReferenceDescriptor, reporter: &mut ProblemReporter) {
        if let Some(target) = &marker.target {
            self.validate_target(marker, target, reporter);
            reference.target = Some(target.clone());
        }
        reference.policy_option = marker.policy_option;
        if self.version.has_modern_signatures() {
            reference.scope = marker.scope;
        }
    }

    /// Reference declared on a bind method
    pub fn resolve_method(
        &self,
        method: &'a MethodDecl,
        marker: &ReferenceMarker,
        names: &mut ReferenceNames,
        reporter: &mut ProblemReporter,
    ) -> ResolvedReference {
        let modern = self.version.has_modern_signatures();
        let params: Vec<&TypeRef> = method.param_types().collect();

        let service = match &marker.service {
            Some(service) => {
                if reporter.checks_enabled() && !params.is_empty() {
                    let invalid = if modern {
                        params
                            .iter()
                            .find(|p| !is_valid_argument_for_service(self.index, p, service))
                            .copied()
                    } else {
                        let first = params[0];
                        let wrapper_ok = first.is_class(types::SERVICE_REFERENCE)
                            && first
                                .type_args()
                                .first()
                                .map(|arg| self.index.is_assignable(service, arg))
                                .unwrap_or(true);
                        (!wrapper_ok && !self.index.is_assignable(service, first)).then_some(first)
                    };
                    if let Some(param) = invalid {
                        reporter.report(
                            DiagnosticKind::ReferenceViolation,
                            marker.span.locate(Some("service"), None),
                            format!(
                                "argument type {} is not compatible with service {}",
                                param.simple_name(),
                                service.simple_name()
                            ),
                        );
                    }
                }
                Some(service.clone())
            }
            None if modern => {
                let mut found = None;
                for param in &params {
                    if param.is_class(types::SERVICE_REFERENCE) || param.is_class(types::COMPONENT_SERVICE_OBJECTS) {
                        if let Some(arg) = param.type_args().first() {
                            found = Some(arg.clone());
                            break;
                        }
                        continue;
                    }
                    if param.is_class(types::MAP) {
                        continue;
                    }
                    found = Some(param.boxed());
                    break;
                }
                found
            }
            None => params.first().and_then(|first| {
                if first.is_class(types::SERVICE_REFERENCE) {
                    first.type_args().first().cloned()
                } else {
                    Some(first.boxed())
                }
            }),
        };

        let service = service.unwrap_or_else(|| {
            reporter.report(
                DiagnosticKind::ReferenceViolation,
                marker.span.range,
                format!("unable to determine the service type of '{}'", method.name),
            );
            TypeRef::object()
        });

        self.validate_bind_method(marker, &service, method, reporter);

        let derived_name = reference_name_from_method(&method.name);
        let name = marker.name.clone().unwrap_or_else(|| derived_name.to_string());
        names.check(&name, marker.span.locate(Some("name"), None), reporter);

        let mut reference = ReferenceDescriptor::new(name, service.erasure().unwrap_or(types::OBJECT));
        reference.cardinality = marker.cardinality;
        reference.policy = marker.policy;
        self.apply_common(marker, &mut reference, reporter);

        let (unbind, unbind_method) = match &marker.unbind {
            Some(value) => self.explicit_method(marker, "unbind", value, &service, reporter),
            None => {
                let candidate = match method.name.strip_prefix("add") {
                    Some(rest) => format!("remove{}", rest),
                    None => format!("un{}", method.name),
                };
                match self.find_method(Some(&service), &candidate, false) {
                    Some(found) => (Some(found.name.clone()), Some(found)),
                    None => {
                        if reference.is_dynamic() {
                            reporter.report_missing_unbind(
                                marker.span.range,
                                format!("no implicit unbind method '{}' for dynamic reference", candidate),
                            );
                        }
                        (None, None)
                    }
                }
            }
        };

        let (updated, updated_method) = match &marker.updated {
            Some(value) => self.explicit_method(marker, "updated", value, &service, reporter),
            None => {
                let candidate = format!("updated{}", derived_name);
                match self.find_method(Some(&service), &candidate, false) {
                    Some(found) => (Some(found.name.clone()), Some(found)),
                    None => (None, None),
                }
            }
        };

        if modern {
            self.apply_field_params(marker, &service, &mut reference, reporter);
            if let Some(bind) = &marker.bind {
                if reporter.checks_enabled() && bind != &method.name {
                    reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        marker.span.locate(Some("bind"), None),
                        format!("bind '{}' does not match the annotated method '{}'", bind, method.name),
                    );
                }
            }
        }

        reference.bind = Some(method.name.clone());
        reference.unbind = unbind;
        reference.updated = updated;

        let events = EventMethods {
            bind: reference.bind.clone(),
            bind_method: Some(method),
            unbind: reference.unbind.clone(),
            unbind_method,
            updated: reference.updated.clone(),
            updated_method,
        };
        let mut features = BTreeSet::new();
        self.signature_features(&service, &events, &mut features);

        ResolvedReference { reference, features }
    }

    /// Cardinality from the marker, else detected from the declared type
    fn cardinality_and_shape(
        &self,
        marker: &ReferenceMarker,
        ty: &TypeRef,
        reporter: &mut ProblemReporter,
    ) -> (crate::model::descriptor::Cardinality, Option<CollectionShape>) {
        use crate::model::descriptor::Cardinality;

        match marker.cardinality {
            None => {
                let shape = collection_shape(self.index, ty);
                let cardinality = if shape.is_collection() {
                    Cardinality::Multiple
                } else {
                    Cardinality::Mandatory
                };
                (cardinality, Some(shape))
            }
            Some(cardinality) if cardinality.is_multiple() && reporter.checks_enabled() => {
                let shape = collection_shape(self.index, ty);
                if !shape.is_collection() {
                    reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        marker.span.locate(Some("cardinality"), None),
                        format!("cardinality {} requires a collection type", cardinality),
                    );
                }
                (cardinality, Some(shape))
            }
            Some(cardinality) => (cardinality, None),
        }
    }

    /// Service type of a field-like site (field or constructor parameter)
    fn injected_service(
        &self,
        marker: &ReferenceMarker,
        ty: &TypeRef,
        multiple: bool,
        shape: &mut Option<CollectionShape>,
        reporter: &mut ProblemReporter,
    ) -> TypeRef {
        let target = if multiple {
            let shape = shape.get_or_insert_with(|| collection_shape(self.index, ty));
            shape.element.clone()
        } else {
            Some(ty.clone())
        };

        let service = match &marker.service {
            Some(service) => {
                if let (Some(target), true) = (&target, reporter.checks_enabled()) {
                    if !is_valid_field_for_service(self.index, target, service) {
                        reporter.report(
                            DiagnosticKind::ReferenceViolation,
                            marker.span.locate(Some("service"), None),
                            format!(
                                "type {} is not compatible with service {}",
                                target.simple_name(),
                                service.simple_name()
                            ),
                        );
                    }
                }
                Some(service.clone())
            }
            None => target.as_ref().and_then(field_service_type),
        };

        service.unwrap_or_else(|| {
            reporter.report(
                DiagnosticKind::ReferenceViolation,
                marker.span.range,
                "unable to determine the service type",
            );
            TypeRef::object()
        })
    }

    /// Reference declared on a field
    pub fn resolve_field(
        &self,
        field: &'a FieldDecl,
        marker: &ReferenceMarker,
        names: &mut ReferenceNames,
        reporter: &mut ProblemReporter,
    ) -> ResolvedReference {
        let (cardinality, mut shape) = self.cardinality_and_shape(marker, &field.ty, reporter);
        let multiple = cardinality.is_multiple();
        let service = self.injected_service(marker, &field.ty, multiple, &mut shape, reporter);

        if reporter.checks_enabled() && field.modifiers.is_static {
            reporter.report(
                DiagnosticKind::ReferenceViolation,
                marker.span.range,
                format!("reference field '{}' must not be static", field.name),
            );
        }

        let name = marker.name.clone().unwrap_or_else(|| field.name.clone());
        names.check(&name, marker.span.locate(Some("name"), None), reporter);

        if let Some(explicit) = &marker.field {
            if reporter.checks_enabled() && explicit != &field.name {
                reporter.report(
                    DiagnosticKind::ReferenceViolation,
                    marker.span.locate(Some("field"), None),
                    format!("field '{}' does not match the annotated field '{}'", explicit, field.name),
                );
            }
        }

        let policy = marker
            .policy
            .or_else(|| field.modifiers.is_volatile.then_some(ReferencePolicy::Dynamic));
        let dynamic = policy == Some(ReferencePolicy::Dynamic);

        let mut field_option = marker.field_option;
        match field_option {
            Some(option) if reporter.checks_enabled() => {
                let range = marker.span.locate(Some("fieldOption"), None);
                match option {
                    FieldOption::Replace if field.modifiers.is_final => reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        range,
                        "fieldOption replace cannot be used with a final field",
                    ),
                    FieldOption::Update if !(dynamic && multiple) => reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        range,
                        "fieldOption update requires a dynamic policy and multiple cardinality",
                    ),
                    _ => {}
                }
            }
            Some(_) => {}
            None => {
                if dynamic && multiple && field.modifiers.is_final {
                    field_option = Some(FieldOption::Update);
                }
            }
        }

        if reporter.checks_enabled() {
            if shape.as_ref().map(|s| s.is_collection() && !s.exact).unwrap_or(false) {
                if !dynamic {
                    let member = marker.policy.map(|_| "policy");
                    reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        marker.span.locate(member, None),
                        "a collection field that is not declared as Collection or List requires a dynamic policy",
                    );
                }
                if field_option != Some(FieldOption::Update) {
                    let member = field_option.map(|_| "fieldOption");
                    reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        marker.span.locate(member, None),
                        "a collection field that is not declared as Collection or List requires fieldOption update",
                    );
                }
            }
        }

        let mut reference = ReferenceDescriptor::new(name, service.erasure().unwrap_or(types::OBJECT));
        reference.cardinality = Some(cardinality);
        reference.policy = policy;
        self.apply_common(marker, &mut reference, reporter);

        let events = self.explicit_event_methods(marker, &service, reporter);
        reference.bind = events.bind.clone();
        reference.unbind = events.unbind.clone();
        reference.updated = events.updated.clone();

        reference.field = Some(field.name.clone());
        reference.field_option = field_option;
        if multiple {
            let shape = shape.unwrap_or_else(|| collection_shape(self.index, &field.ty));
            reference.field_collection_type = shape.field_collection_type();
        }

        let mut features = BTreeSet::new();
        self.signature_features(&service, &events, &mut features);
        ResolvedReference { reference, features }
    }

    /// Reference declared on parameter `position` of the activation constructor
    pub fn resolve_parameter(
        &self,
        param: &ParamDecl,
        position: usize,
        marker: &ReferenceMarker,
        names: &mut ReferenceNames,
        reporter: &mut ProblemReporter,
    ) -> ResolvedReference {
        let (cardinality, mut shape) = self.cardinality_and_shape(marker, &param.ty, reporter);
        let multiple = cardinality.is_multiple();
        let service = self.injected_service(marker, &param.ty, multiple, &mut shape, reporter);

        let name = marker.name.clone().unwrap_or_else(|| param.name.clone());
        names.check(&name, marker.span.locate(Some("name"), None), reporter);

        if reporter.checks_enabled() {
            if marker.policy == Some(ReferencePolicy::Dynamic) {
                reporter.report(
                    DiagnosticKind::ReferenceViolation,
                    marker.span.locate(Some("policy"), None),
                    "constructor parameter references must use the static policy",
                );
            }
            let not_applicable = [
                ("bind", marker.bind.is_some()),
                ("unbind", marker.unbind.is_some()),
                ("updated", marker.updated.is_some()),
                ("field", marker.field.is_some()),
                ("fieldOption", marker.field_option.is_some()),
            ];
            for (member, present) in not_applicable {
                if present {
                    reporter.report(
                        DiagnosticKind::ReferenceViolation,
                        marker.span.locate(Some(member), None),
                        format!("{} is not applicable to constructor parameters", member),
                    );
                }
            }
        }

        let mut reference = ReferenceDescriptor::new(name, service.erasure().unwrap_or(types::OBJECT));
        reference.cardinality = Some(cardinality);
        reference.policy = marker.policy;
        self.apply_common(marker, &mut reference, reporter);
        reference.parameter = Some(position);
        if multiple {
            let shape = shape.unwrap_or_else(|| collection_shape(self.index, &param.ty));
            reference.field_collection_type = shape.field_collection_type();
        }

        ResolvedReference {
            reference,
            features: BTreeSet::new(),
        }
    }

    /// Reference listed in the component marker; `name` and `service` are required
    pub fn resolve_class_level(
        &self,
        marker: &ReferenceMarker,
        names: &mut ReferenceNames,
        reporter: &mut ProblemReporter,
    ) -> ResolvedReference {
        let service = match &marker.service {
            Some(service) => service.clone(),
            None => {
                reporter.report(
                    DiagnosticKind::ReferenceViolation,
                    marker.span.range,
                    "class-level reference requires 'service'",
                );
                TypeRef::object()
            }
        };

        let name = match &marker.name {
            Some(name) => {
                names.check(name, marker.span.locate(Some("name"), None), reporter);
                name.clone()
            }
            None => {
                reporter.report(
                    DiagnosticKind::ReferenceViolation,
                    marker.span.range,
                    "class-level reference requires 'name'",
                );
                String::new()
            }
        };

        let mut reference = ReferenceDescriptor::new(name, service.erasure().unwrap_or(types::OBJECT));
        reference.cardinality = marker.cardinality;
        reference.policy = marker.policy;
        self.apply_common(marker, &mut reference, reporter);

        let events = self.explicit_event_methods(marker, &service, reporter);
        reference.bind = events.bind.clone();
        reference.unbind = events.unbind.clone();
        reference.updated = events.updated.clone();
        self.apply_field_params(marker, &service, &mut reference, reporter);

        let mut features = BTreeSet::from([Feature::ClassLevelReference]);
        self.signature_features(&service, &events, &mut features);
        ResolvedReference { reference, features }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ValidationLevel;
    use crate::model::descriptor::{Cardinality, FieldCollectionType};
    use crate::model::source::{Modifiers, TypeKind};

    fn reporter() -> ProblemReporter {
        ProblemReporter::new(ValidationLevel::Error, ValidationLevel::Error)
    }

    fn method(name: &str, params: &[&str]) -> MethodDecl {
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
            annotations: Vec::new(),
            range: SourceRange::default(),
        }
    }

    fn field(name: &str, ty: &str, modifiers: Modifiers) -> FieldDecl {
        FieldDecl {
            name: name.to_string(),
            ty: ty.parse().unwrap(),
            modifiers,
            annotations: Vec::new(),
            constant: None,
            range: SourceRange::default(),
        }
    }

    fn setup(component: TypeDecl) -> (TypeIndex, TypeDecl) {
        let mut index = TypeIndex::new();
        index.insert(TypeDecl::new("com.acme.Log", TypeKind::Interface));
        index.insert(component.clone());
        (index, component)
    }

    #[test]
    fn test_reference_name_from_method() {
        assert_eq!(reference_name_from_method("setLog"), "Log");
        assert_eq!(reference_name_from_method("bindLog"), "Log");
        assert_eq!(reference_name_from_method("addListener"), "Listener");
        assert_eq!(reference_name_from_method("log"), "log");
    }

    #[test]
    fn test_method_site_with_implicit_unbind_and_updated() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods = vec![
            method("addLog", &["com.acme.Log"]),
            method("removeLog", &["com.acme.Log"]),
            method("updatedLog", &["com.acme.Log"]),
        ];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let marker = ReferenceMarker {
            policy: Some(ReferencePolicy::Dynamic),
            ..Default::default()
        };
        let mut reporter = reporter();
        let resolved =
            resolver.resolve_method(&component.methods[0], &marker, &mut ReferenceNames::new(), &mut reporter);

        let reference = resolved.reference;
        assert_eq!(reference.name, "Log");
        assert_eq!(reference.interface, "com.acme.Log");
        assert_eq!(reference.bind.as_deref(), Some("addLog"));
        assert_eq!(reference.unbind.as_deref(), Some("removeLog"));
        assert_eq!(reference.updated.as_deref(), Some("updatedLog"));
        assert!(resolved.features.is_empty());
        assert!(reporter.diagnostics().is_empty());
    }

    #[test]
    fn test_missing_unbind_for_dynamic_reference() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods = vec![method("setLog", &["com.acme.Log"])];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let marker = ReferenceMarker {
            policy: Some(ReferencePolicy::Dynamic),
            ..Default::default()
        };

        let mut reporter = ProblemReporter::new(ValidationLevel::Error, ValidationLevel::Warning);
        let resolved =
            resolver.resolve_method(&component.methods[0], &marker, &mut ReferenceNames::new(), &mut reporter);
        assert_eq!(resolved.reference.unbind, None);
        assert_eq!(reporter.diagnostics().len(), 1);
        assert!(!reporter.has_errors());
    }

    #[test]
    fn test_service_from_service_reference_parameter() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods = vec![method(
            "setLog",
            &["org.osgi.framework.ServiceReference<com.acme.Log>", "java.util.Map"],
        )];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let mut reporter = reporter();
        let resolved = resolver.resolve_method(
            &component.methods[0],
            &ReferenceMarker::default(),
            &mut ReferenceNames::new(),
            &mut reporter,
        );
        assert_eq!(resolved.reference.interface, "com.acme.Log");
        assert!(resolved.features.contains(&Feature::ModernBindSignature));
    }

    #[test]
    fn test_unknown_service_falls_back_to_object() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods = vec![method("setProps", &["java.util.Map"])];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let mut reporter = reporter();
        let resolved = resolver.resolve_method(
            &component.methods[0],
            &ReferenceMarker::default(),
            &mut ReferenceNames::new(),
            &mut reporter,
        );
        assert_eq!(resolved.reference.interface, types::OBJECT);
        assert!(reporter.has_errors());
    }

    #[test]
    fn test_collection_field() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.fields = vec![field(
            "logs",
            "java.util.List<org.osgi.framework.ServiceReference<com.acme.Log>>",
            Modifiers::default(),
        )];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let mut reporter = reporter();
        let resolved = resolver.resolve_field(
            &component.fields[0],
            &ReferenceMarker::default(),
            &mut ReferenceNames::new(),
            &mut reporter,
        );
        let reference = resolved.reference;
        assert_eq!(reference.cardinality, Some(Cardinality::Multiple));
        assert_eq!(reference.interface, "com.acme.Log");
        assert_eq!(reference.field.as_deref(), Some("logs"));
        assert_eq!(reference.field_collection_type, Some(FieldCollectionType::Reference));
        assert!(reporter.diagnostics().is_empty());
    }

    #[test]
    fn test_final_dynamic_collection_field_implies_update() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        let modifiers = Modifiers {
            is_final: true,
            ..Modifiers::default()
        };
        component.fields = vec![field(
            "logs",
            "java.util.concurrent.CopyOnWriteArrayList<com.acme.Log>",
            modifiers,
        )];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let marker = ReferenceMarker {
            policy: Some(ReferencePolicy::Dynamic),
            ..Default::default()
        };
        let mut reporter = reporter();
        let resolved =
            resolver.resolve_field(&component.fields[0], &marker, &mut ReferenceNames::new(), &mut reporter);
        assert_eq!(resolved.reference.field_option, Some(FieldOption::Update));
        assert!(reporter.diagnostics().is_empty());
    }

    #[test]
    fn test_inexact_collection_without_update_is_reported() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.fields = vec![field("logs", "java.util.Set<com.acme.Log>", Modifiers::default())];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let mut reporter = reporter();
        resolver.resolve_field(
            &component.fields[0],
            &ReferenceMarker::default(),
            &mut ReferenceNames::new(),
            &mut reporter,
        );
        assert_eq!(reporter.diagnostics().len(), 2);
    }

    #[test]
    fn test_volatile_field_is_dynamic() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        let modifiers = Modifiers {
            is_volatile: true,
            ..Modifiers::default()
        };
        component.fields = vec![field("log", "com.acme.Log", modifiers)];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let mut reporter = reporter();
        let resolved = resolver.resolve_field(
            &component.fields[0],
            &ReferenceMarker::default(),
            &mut ReferenceNames::new(),
            &mut reporter,
        );
        assert_eq!(resolved.reference.policy, Some(ReferencePolicy::Dynamic));
        assert_eq!(resolved.reference.cardinality, Some(Cardinality::Mandatory));
    }

    #[test]
    fn test_duplicate_names_reported_on_both() {
        let mut reporter = reporter();
        let mut names = ReferenceNames::new();
        names.check("log", SourceRange::new(1, 1), &mut reporter);
        names.check("log", SourceRange::new(5, 1), &mut reporter);
        names.check("log", SourceRange::new(9, 1), &mut reporter);
        let offsets: Vec<usize> = reporter.diagnostics().iter().map(|d| d.range.offset).collect();
        assert_eq!(offsets, vec![5, 1, 9]);
    }

    #[test]
    fn test_class_level_requires_name_and_service() {
        let component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let mut reporter = reporter();
        let resolved =
            resolver.resolve_class_level(&ReferenceMarker::default(), &mut ReferenceNames::new(), &mut reporter);
        assert_eq!(reporter.diagnostics().len(), 2);
        assert!(resolved.features.contains(&Feature::ClassLevelReference));
    }

    #[test]
    fn test_invalid_target() {
        let mut component = TypeDecl::new("com.acme.Comp", TypeKind::Class);
        component.methods = vec![method("setLog", &["com.acme.Log"])];
        let (index, component) = setup(component);
        let resolver = ReferenceResolver::new(&index, &component, SpecVersion::V1_3);
        let marker = ReferenceMarker {
            target: Some("(name=foo".to_string()),
            ..Default::default()
        };
        let mut reporter = reporter();
        resolver.resolve_method(&component.methods[0], &marker, &mut ReferenceNames::new(), &mut reporter);
        assert_eq!(reporter.diagnostics()[0].kind, DiagnosticKind::AttributeViolation);
    }
}
