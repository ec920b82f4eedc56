//! Component descriptor extraction
//!
//! Every type carrying the component marker is checked for a usable shape,
//! then turned into a [`ComponentDescriptor`]:
//!
//! 1. component attributes (name, services, factory, flags, configuration PIDs)
//! 2. references from class-level declarations, fields, methods and the
//!    activation constructor, sorted by name
//! 3. lifecycle bindings and the properties they contribute
//! 4. explicit properties, property files and factory properties
//! 5. the minimum format version and the namespace override check
//!
//! Findings go to the unit's [`ProblemReporter`]; only a failed shape check
//! stops a component from being produced.

pub mod lifecycle;
pub mod properties;
pub mod structure;

use crate::diagnostics::{Diagnostic, DiagnosticKind, ProblemReporter, Severity, ValidationLevel};
use crate::fs::FileSystem;
use crate::model::descriptor::{ActivationBinding, ComponentDescriptor, ReferenceDescriptor, ServiceScope};
use crate::model::hierarchy::TypeIndex;
use crate::model::source::{AnnotationSpan, ComponentMarker, SourceUnit, TypeDecl};
use crate::model::types::TypeRef;
use crate::resolver::{ReferenceNames, ReferenceResolver, ResolvedReference};
use crate::version::{check_override, descriptor_version, Feature, SpecVersion};
use properties::{PropertyMap, PropertyTypeCollector};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

static IDENTIFIER_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Component names, factory ids and configuration PIDs share this shape
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_PATTERN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+(\.[a-zA-Z0-9_-]+)*$").expect("valid regex"))
        .is_match(value)
}

/// Settings that change what is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorOptions {
    /// Highest annotation version recognized
    pub version: SpecVersion,
    pub level: ValidationLevel,
    pub missing_unbind_level: ValidationLevel,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            version: SpecVersion::LATEST,
            level: ValidationLevel::Error,
            missing_unbind_level: ValidationLevel::Error,
        }
    }
}

/// Descriptors and diagnostics of one compilation unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitExtraction {
    pub key: String,
    pub descriptors: Vec<ComponentDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
}

impl UnitExtraction {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// Remembers where array values first appeared so a repeat can be reported
/// at both positions
#[derive(Default)]
struct DuplicateTracker {
    first: HashMap<String, Option<usize>>,
}

impl DuplicateTracker {
    /// Returns true when `value` is new
    fn add(
        &mut self,
        value: &str,
        position: usize,
        member: &str,
        span: &AnnotationSpan,
        message: &str,
        reporter: &mut ProblemReporter,
    ) -> bool {
        match self.first.get_mut(value) {
            None => {
                self.first.insert(value.to_string(), Some(position));
                true
            }
            Some(first) => {
                if reporter.checks_enabled() {
                    reporter.report(
                        DiagnosticKind::DuplicateDeclaration,
                        span.locate(Some(member), Some(position)),
                        format!("{} '{}'", message, value),
                    );
                    if let Some(first) = first.take() {
                        reporter.report(
                            DiagnosticKind::DuplicateDeclaration,
                            span.locate(Some(member), Some(first)),
                            format!("{} '{}'", message, value),
                        );
                    }
                }
                false
            }
        }
    }
}

pub struct ComponentModelExtractor<'a> {
    index: &'a TypeIndex,
    options: ExtractorOptions,
    fs: &'a dyn FileSystem,
    project_root: PathBuf,
}

impl<'a> ComponentModelExtractor<'a> {
    /// `project_root` resolves property file entries
    pub fn new(
        index: &'a TypeIndex,
        options: ExtractorOptions,
        fs: &'a dyn FileSystem,
        project_root: impl AsRef<Path>,
    ) -> Self {
        Self {
            index,
            options,
            fs,
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn options(&self) -> ExtractorOptions {
        self.options
    }

    /// Extracts every component declared in `unit`
    pub fn extract_unit(&self, unit: &SourceUnit) -> UnitExtraction {
        let mut reporter = ProblemReporter::new(self.options.level, self.options.missing_unbind_level);
        let mut descriptors = Vec::new();
        let mut enclosing = Vec::new();
        for decl in &unit.types {
            self.visit(decl, &mut enclosing, &mut reporter, &mut descriptors);
        }
        debug!(
            unit = %unit.key,
            components = descriptors.len(),
            diagnostics = reporter.diagnostics().len(),
            "extracted unit"
        );
        UnitExtraction {
            key: unit.key.clone(),
            descriptors,
            diagnostics: reporter.into_diagnostics(),
        }
    }

    fn visit<'t>(
        &self,
        decl: &'t TypeDecl,
        enclosing: &mut Vec<&'t TypeDecl>,
        reporter: &mut ProblemReporter,
        out: &mut Vec<ComponentDescriptor>,
    ) {
        // Non-public types and everything nested in them are skipped silently
        if !decl.modifiers.is_public() && !reporter.checks_enabled() {
            return;
        }

        if let Some(marker) = decl.component_marker() {
            let version = self.options.version;
            if structure::check_preconditions(decl, enclosing, version, marker.span.range, reporter) {
                out.push(self.extract_component(decl, marker, reporter));
            }
        }

        enclosing.push(decl);
        for nested in &decl.nested {
            self.visit(nested, enclosing, reporter, out);
        }
        enclosing.pop();
    }

    /// Builds the descriptor of a type that passed the shape checks
    pub fn extract_component(
        &self,
        decl: &TypeDecl,
        marker: &ComponentMarker,
        reporter: &mut ProblemReporter,
    ) -> ComponentDescriptor {
        let version = self.options.version;
        let span = &marker.span;

        let name = match &marker.name {
            Some(name) => {
                if reporter.checks_enabled() && !is_valid_identifier(name) {
                    reporter.report(
                        DiagnosticKind::AttributeViolation,
                        span.locate(Some("name"), None),
                        format!("invalid component name '{}'", name),
                    );
                }
                name.clone()
            }
            None => decl.name.clone(),
        };

        let mut descriptor = ComponentDescriptor::new(name, decl.name.clone());
        descriptor.services = self.services(decl, marker, reporter);

        if let Some(factory) = &marker.factory {
            if reporter.checks_enabled() && !is_valid_identifier(factory) {
                reporter.report(
                    DiagnosticKind::AttributeViolation,
                    span.locate(Some("factory"), None),
                    format!("invalid component factory id '{}'", factory),
                );
            }
            descriptor.factory = Some(factory.clone());
        }

        descriptor.enabled = marker.enabled;
        descriptor.immediate = marker.immediate;
        descriptor.configuration_policy = marker.configuration_policy;
        self.apply_service_flags(&mut descriptor, marker, reporter);
        descriptor.configuration_pid = self.configuration_pids(&descriptor.name, marker, reporter);

        let lifecycle = lifecycle::collect(self.index, decl, version, reporter);

        let mut implied = BTreeSet::new();
        descriptor.references = self.references(decl, marker, &lifecycle, &mut implied, reporter);
        descriptor.sort_references();

        let mut props = PropertyMap::new();
        let mut property_types = PropertyTypeCollector::new(self.index, version);

        if let Some(constructor) = lifecycle.constructor {
            let used = self.collect_property_types(
                &mut property_types,
                constructor
                    .params
                    .iter()
                    .filter(|p| p.reference_marker().is_none())
                    .map(|p| &p.ty),
                &mut props,
            );
            descriptor.activation.push(ActivationBinding::Constructor {
                parameters: constructor.params.len(),
                property_types: used,
            });
        }

        if !lifecycle.fields.is_empty() {
            let used =
                self.collect_property_types(&mut property_types, lifecycle.fields.iter().map(|f| &f.ty), &mut props);
            descriptor.activation.push(ActivationBinding::Fields {
                names: lifecycle.fields.iter().map(|f| f.name.clone()).collect(),
                property_types: used,
            });
        }

        if let Some(activate) = lifecycle.effective_activate() {
            let used = self.collect_property_types(&mut property_types, activate.param_types(), &mut props);
            if lifecycle.activate.is_some() {
                descriptor.activation.push(ActivationBinding::Method {
                    name: activate.name.clone(),
                    property_types: used,
                });
            } else {
                descriptor.implicit_activate = true;
            }
        }
        if let Some(modified) = lifecycle.modified {
            self.collect_property_types(&mut property_types, modified.param_types(), &mut props);
            descriptor.modified = Some(modified.name.clone());
        }
        if let Some(deactivate) = lifecycle.effective_deactivate() {
            self.collect_property_types(&mut property_types, deactivate.param_types(), &mut props);
            if lifecycle.deactivate.is_some() {
                descriptor.deactivate = Some(deactivate.name.clone());
            } else {
                descriptor.implicit_deactivate = true;
            }
        }

        if version.has_modern_naming() {
            for usage in decl.property_type_usages() {
                if !property_types.collect_usage(usage, &mut props) {
                    reporter.report(
                        DiagnosticKind::PropertyViolation,
                        usage.span.range,
                        format!("unknown component property type {}", usage.type_name),
                    );
                }
            }
        }
        if property_types.used() {
            implied.insert(Feature::PropertyTypes);
        }

        props.extend(properties::explicit_properties(&marker.property, "property", span, reporter));
        descriptor.properties = props.into_vec();
        self.check_property_files(&marker.properties, "properties", span, reporter);
        descriptor.property_files = marker.properties.clone();

        self.apply_factory_properties(&mut descriptor, marker, reporter);

        descriptor.implied_features = implied;
        descriptor.version = descriptor_version(&descriptor);

        if let Some(namespace) = &marker.xmlns {
            if reporter.checks_enabled() {
                if let Err(e) = check_override(namespace, descriptor.version) {
                    reporter.report(
                        DiagnosticKind::AttributeViolation,
                        span.locate(Some("xmlns"), None),
                        e.to_string(),
                    );
                }
            }
            descriptor.xmlns = Some(namespace.clone());
        }

        debug!(
            component = %descriptor.name,
            version = %descriptor.version,
            references = descriptor.references.len(),
            properties = descriptor.properties.len(),
            "extracted component"
        );
        descriptor
    }

    fn services(&self, decl: &TypeDecl, marker: &ComponentMarker, reporter: &mut ProblemReporter) -> Vec<String> {
        let Some(declared) = &marker.service else {
            return decl
                .interfaces
                .iter()
                .filter_map(|i| i.erasure().map(str::to_string))
                .collect();
        };

        let component = decl.as_type_ref();
        let mut services = Vec::new();
        let mut duplicates = DuplicateTracker::default();
        for (position, service) in declared.iter().enumerate() {
            let name = service.erasure().map(str::to_string).unwrap_or_else(|| service.to_string());
            if duplicates.add(&name, position, "service", &marker.span, "duplicate service", reporter) {
                services.push(name);
            }
            if reporter.checks_enabled() && !self.index.is_assignable(&component, service) {
                reporter.report(
                    DiagnosticKind::AttributeViolation,
                    marker.span.locate(Some("service"), Some(position)),
                    format!("component does not implement service {}", service.simple_name()),
                );
            }
        }
        services
    }

    fn apply_service_flags(
        &self,
        descriptor: &mut ComponentDescriptor,
        marker: &ComponentMarker,
        reporter: &mut ProblemReporter,
    ) {
        let span = &marker.span;
        let has_services = !descriptor.services.is_empty();
        let is_factory = descriptor.factory.is_some();
        let immediate = marker.immediate == Some(true);
        let checks = reporter.checks_enabled();
        let mut service_factory = marker.servicefactory;

        if checks && service_factory == Some(true) && !has_services {
            reporter.report(
                DiagnosticKind::AttributeViolation,
                span.locate(Some("servicefactory"), None),
                "servicefactory requires at least one service",
            );
        }
        if checks && is_factory && immediate {
            reporter.report(
                DiagnosticKind::AttributeViolation,
                span.locate(Some("immediate"), None),
                "a factory component cannot be immediate",
            );
        }
        if checks && !has_services && marker.immediate == Some(false) {
            reporter.report(
                DiagnosticKind::AttributeViolation,
                span.locate(Some("immediate"), None),
                "a delayed component must provide at least one service",
            );
        }

        let scope = marker.scope.filter(|_| self.options.version.has_modern_signatures());
        if let Some(scope) = scope {
            if checks {
                if !has_services {
                    reporter.report(
                        DiagnosticKind::AttributeViolation,
                        span.locate(Some("scope"), None),
                        "scope requires at least one service",
                    );
                } else if (is_factory || immediate) && !matches!(scope, ServiceScope::Singleton | ServiceScope::Default) {
                    reporter.report(
                        DiagnosticKind::AttributeViolation,
                        span.locate(Some("scope"), None),
                        "factory and immediate components must use the singleton scope",
                    );
                }
            }
            if scope != ServiceScope::Default {
                if let Some(flag) = service_factory.take() {
                    if flag != (scope == ServiceScope::Bundle) {
                        reporter.warn(
                            DiagnosticKind::AttributeViolation,
                            span.locate(Some("servicefactory"), None),
                            "servicefactory is ignored when scope is set",
                        );
                    }
                }
            }
        }

        if checks && service_factory == Some(true) && has_services && (is_factory || immediate) {
            reporter.report(
                DiagnosticKind::AttributeViolation,
                span.locate(Some("servicefactory"), None),
                "a service factory cannot be a factory or immediate component",
            );
        }

        descriptor.service_factory = service_factory;
        descriptor.service_scope = scope;
    }

    fn configuration_pids(&self, name: &str, marker: &ComponentMarker, reporter: &mut ProblemReporter) -> Vec<String> {
        let Some(declared) = &marker.configuration_pid else {
            return Vec::new();
        };
        let span = &marker.span;
        let mut declared: &[String] = declared;
        if declared.len() > 1 && !self.options.version.has_modern_signatures() {
            reporter.report(
                DiagnosticKind::AttributeViolation,
                span.locate(Some("configurationPid"), None),
                format!("multiple configuration PIDs require version {}", SpecVersion::V1_3),
            );
            declared = &declared[..1];
        }

        let mut pids = Vec::new();
        let mut duplicates = DuplicateTracker::default();
        for (position, pid) in declared.iter().enumerate() {
            let value = if pid == "$" {
                name.to_string()
            } else {
                if reporter.checks_enabled() && !is_valid_identifier(pid) {
                    reporter.report(
                        DiagnosticKind::AttributeViolation,
                        span.locate(Some("configurationPid"), Some(position)),
                        format!("invalid configuration PID '{}'", pid),
                    );
                }
                pid.clone()
            };
            if duplicates.add(&value, position, "configurationPid", span, "duplicate configuration PID", reporter) {
                pids.push(value);
            }
        }
        pids
    }

    fn references(
        &self,
        decl: &TypeDecl,
        marker: &ComponentMarker,
        lifecycle: &lifecycle::Lifecycle<'_>,
        implied: &mut BTreeSet<Feature>,
        reporter: &mut ProblemReporter,
    ) -> Vec<ReferenceDescriptor> {
        let version = self.options.version;
        let resolver = ReferenceResolver::new(self.index, decl, version);
        let mut names = ReferenceNames::new();
        let mut resolved: Vec<ResolvedReference> = Vec::new();

        if version.has_modern_signatures() {
            for reference in &marker.reference {
                resolved.push(resolver.resolve_class_level(reference, &mut names, reporter));
            }
            for field in &decl.fields {
                if let Some(reference) = field.reference_marker() {
                    resolved.push(resolver.resolve_field(field, reference, &mut names, reporter));
                }
            }
        }

        for method in &decl.methods {
            if let Some(reference) = method.reference_marker() {
                resolved.push(resolver.resolve_method(method, reference, &mut names, reporter));
            }
        }

        if let Some(constructor) = lifecycle.constructor {
            for (position, param) in constructor.params.iter().enumerate() {
                if let Some(reference) = param.reference_marker() {
                    resolved.push(resolver.resolve_parameter(param, position, reference, &mut names, reporter));
                }
            }
        }

        resolved
            .into_iter()
            .map(|r| {
                implied.extend(r.features);
                r.reference
            })
            .collect()
    }

    /// Adds properties of every component property type among `types`;
    /// returns the property type names seen, in order
    fn collect_property_types<'t>(
        &self,
        collector: &mut PropertyTypeCollector<'_>,
        types: impl Iterator<Item = &'t TypeRef>,
        props: &mut PropertyMap,
    ) -> Vec<String> {
        if !self.options.version.has_modern_signatures() {
            return Vec::new();
        }
        let mut used = Vec::new();
        for ty in types {
            if collector.collect(ty, props) {
                if let Some(name) = ty.erasure() {
                    if !used.iter().any(|u| u == name) {
                        used.push(name.to_string());
                    }
                }
            }
        }
        used
    }

    fn check_property_files(
        &self,
        files: &[String],
        member: &str,
        span: &AnnotationSpan,
        reporter: &mut ProblemReporter,
    ) {
        if !reporter.checks_enabled() {
            return;
        }
        for (position, file) in files.iter().enumerate() {
            if !self.fs.is_file(&self.project_root.join(file)) {
                reporter.report(
                    DiagnosticKind::PropertyViolation,
                    span.locate(Some(member), Some(position)),
                    format!("property file '{}' not found", file),
                );
            }
        }
    }

    fn apply_factory_properties(
        &self,
        descriptor: &mut ComponentDescriptor,
        marker: &ComponentMarker,
        reporter: &mut ProblemReporter,
    ) {
        let span = &marker.span;
        let declared = [
            ("factoryProperty", !marker.factory_property.is_empty()),
            ("factoryProperties", !marker.factory_properties.is_empty()),
        ];
        if declared.iter().all(|(_, present)| !present) {
            return;
        }

        if !self.options.version.has_modern_naming() {
            for (member, present) in declared {
                if present {
                    reporter.warn(
                        DiagnosticKind::AttributeViolation,
                        span.locate(Some(member), None),
                        format!("{} requires version {} and is ignored", member, SpecVersion::V1_4),
                    );
                }
            }
            return;
        }

        if descriptor.factory.is_none() && reporter.checks_enabled() {
            for (member, present) in declared {
                if present {
                    reporter.report(
                        DiagnosticKind::AttributeViolation,
                        span.locate(Some(member), None),
                        format!("{} requires a factory component", member),
                    );
                }
            }
        }

        descriptor.factory_properties =
            properties::explicit_properties(&marker.factory_property, "factoryProperty", span, reporter);
        self.check_property_files(&marker.factory_properties, "factoryProperties", span, reporter);
        descriptor.factory_property_files = marker.factory_properties.clone();
    }
}

/// Default descriptor key of a component: `<output>/<name>.xml`
pub fn descriptor_key(output_path: &str, component_name: &str) -> String {
    let folder = output_path.trim_matches('/');
    if folder.is_empty() {
        format!("{}.xml", component_name)
    } else {
        format!("{}/{}.xml", folder, component_name)
    }
}
