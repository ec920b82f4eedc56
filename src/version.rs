//! Descriptor format versions and the features that require them
//!
//! Every optionally emitted feature has a minimum format version. The version
//! a descriptor needs is the maximum over the features it actually uses, so
//! adding a feature can never lower it.

use crate::model::descriptor::{
    ActivationBinding, ComponentDescriptor, FieldCollectionType, ServiceScope,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const NAMESPACE_PREFIX: &str = "http://www.osgi.org/xmlns/scr/v";

/// Descriptor format version, ordered from oldest to newest
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SpecVersion {
    #[default]
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "1.3")]
    V1_3,
    #[serde(rename = "1.4")]
    V1_4,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown descriptor version '{0}' (expected 1.1, 1.2, 1.3 or 1.4)")]
pub struct UnknownVersion(pub String);

impl SpecVersion {
    pub const ALL: [SpecVersion; 4] = [
        SpecVersion::V1_1,
        SpecVersion::V1_2,
        SpecVersion::V1_3,
        SpecVersion::V1_4,
    ];

    /// Newest version the compiler can target
    pub const LATEST: SpecVersion = SpecVersion::V1_4;

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecVersion::V1_1 => "1.1",
            SpecVersion::V1_2 => "1.2",
            SpecVersion::V1_3 => "1.3",
            SpecVersion::V1_4 => "1.4",
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            SpecVersion::V1_1 => "http://www.osgi.org/xmlns/scr/v1.1.0",
            SpecVersion::V1_2 => "http://www.osgi.org/xmlns/scr/v1.2.0",
            SpecVersion::V1_3 => "http://www.osgi.org/xmlns/scr/v1.3.0",
            SpecVersion::V1_4 => "http://www.osgi.org/xmlns/scr/v1.4.0",
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        let version = namespace.trim().strip_prefix(NAMESPACE_PREFIX)?;
        Self::ALL
            .into_iter()
            .find(|v| version.strip_suffix(".0") == Some(v.as_str()))
    }

    /// Whether a feature may be recognized when targeting this version
    pub fn supports(&self, feature: Feature) -> bool {
        feature.min_version() <= *self
    }

    /// Property naming follows the 1.4 rules (escapes, prefixes)
    pub fn has_modern_naming(&self) -> bool {
        *self >= SpecVersion::V1_4
    }

    /// Bind method search uses the per-parameter priority table
    pub fn has_modern_signatures(&self) -> bool {
        *self >= SpecVersion::V1_3
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == trimmed)
            .ok_or_else(|| UnknownVersion(s.to_string()))
    }
}

/// An optionally emitted descriptor feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    PolicyOption,
    UpdatedMethod,
    SingleConfigurationPid,
    ReferenceScope,
    ReferenceField,
    FieldOption,
    FieldCollectionType,
    PropertyTypes,
    MultipleConfigurationPid,
    ServiceScope,
    ModernBindSignature,
    ClassLevelReference,
    ConstructorInjection,
    ActivationFields,
    FactoryProperties,
}

impl Feature {
    pub fn min_version(&self) -> SpecVersion {
        match self {
            Feature::PolicyOption | Feature::UpdatedMethod | Feature::SingleConfigurationPid => {
                SpecVersion::V1_2
            }
            Feature::ReferenceScope
            | Feature::ReferenceField
            | Feature::FieldOption
            | Feature::FieldCollectionType
            | Feature::PropertyTypes
            | Feature::MultipleConfigurationPid
            | Feature::ServiceScope
            | Feature::ModernBindSignature
            | Feature::ClassLevelReference => SpecVersion::V1_3,
            Feature::ConstructorInjection | Feature::ActivationFields | Feature::FactoryProperties => {
                SpecVersion::V1_4
            }
        }
    }
}

/// Maximum minimum-version over a set of features
pub fn required_version<I>(features: I) -> SpecVersion
where
    I: IntoIterator<Item = Feature>,
{
    features
        .into_iter()
        .map(|f| f.min_version())
        .fold(SpecVersion::V1_1, SpecVersion::max)
}

/// Features a descriptor uses: the ones visible as written attributes plus the
/// ones recorded during extraction
pub fn features(descriptor: &ComponentDescriptor) -> BTreeSet<Feature> {
    let mut used = descriptor.implied_features.clone();
    let wire = descriptor.wire_form();

    match wire.configuration_pid.len() {
        0 => {}
        1 => {
            used.insert(Feature::SingleConfigurationPid);
        }
        _ => {
            used.insert(Feature::MultipleConfigurationPid);
        }
    }
    if matches!(
        wire.service_scope,
        Some(ServiceScope::Singleton | ServiceScope::Bundle | ServiceScope::Prototype)
    ) {
        used.insert(Feature::ServiceScope);
    }
    if !wire.factory_properties.is_empty() || !wire.factory_property_files.is_empty() {
        used.insert(Feature::FactoryProperties);
    }
    for binding in &wire.activation {
        match binding {
            ActivationBinding::Method { .. } => {}
            ActivationBinding::Constructor { .. } => {
                used.insert(Feature::ConstructorInjection);
            }
            ActivationBinding::Fields { .. } => {
                used.insert(Feature::ActivationFields);
            }
        }
    }

    for reference in &wire.references {
        if reference.policy_option.is_some() {
            used.insert(Feature::PolicyOption);
        }
        if reference.updated.is_some() {
            used.insert(Feature::UpdatedMethod);
        }
        if reference.scope.is_some() {
            used.insert(Feature::ReferenceScope);
        }
        if reference.field.is_some() {
            used.insert(Feature::ReferenceField);
        }
        if reference.field_option.is_some() {
            used.insert(Feature::FieldOption);
        }
        if matches!(
            reference.field_collection_type,
            Some(t) if t != FieldCollectionType::Service
        ) {
            used.insert(Feature::FieldCollectionType);
        }
        if reference.parameter.is_some() {
            used.insert(Feature::ConstructorInjection);
        }
    }

    used
}

/// Minimum format version the descriptor needs
pub fn descriptor_version(descriptor: &ComponentDescriptor) -> SpecVersion {
    required_version(features(descriptor))
}

/// Problems with an explicit namespace override
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("unknown descriptor namespace '{0}'")]
    Unknown(String),

    #[error("namespace '{namespace}' declares version {declared} but the component requires {required}")]
    BelowRequired {
        namespace: String,
        declared: SpecVersion,
        required: SpecVersion,
    },
}

/// Validates a namespace override against the computed requirement.
///
/// The override is never upgraded; callers still write it as declared.
pub fn check_override(namespace: &str, required: SpecVersion) -> Result<SpecVersion, NamespaceError> {
    let declared = SpecVersion::from_namespace(namespace)
        .ok_or_else(|| NamespaceError::Unknown(namespace.to_string()))?;
    if declared < required {
        return Err(NamespaceError::BelowRequired {
            namespace: namespace.to_string(),
            declared,
            required,
        });
    }
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::descriptor::{Cardinality, ReferenceDescriptor, ReferencePolicy};

    #[test]
    fn test_namespace_round_trip() {
        for version in SpecVersion::ALL {
            assert_eq!(SpecVersion::from_namespace(version.namespace()), Some(version));
        }
        assert_eq!(SpecVersion::from_namespace("http://www.osgi.org/xmlns/scr/v1.5.0"), None);
        assert_eq!(SpecVersion::from_namespace("urn:other"), None);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!("1.3".parse::<SpecVersion>(), Ok(SpecVersion::V1_3));
        assert_eq!("v1.4.0".parse::<SpecVersion>(), Ok(SpecVersion::V1_4));
        assert!("2.0".parse::<SpecVersion>().is_err());
    }

    #[test]
    fn test_baseline_descriptor() {
        let mut descriptor = ComponentDescriptor::new("c", "com.acme.C");
        descriptor.services.push("com.acme.Api".to_string());
        assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_1);
    }

    #[test]
    fn test_default_valued_attributes_do_not_count() {
        let mut descriptor = ComponentDescriptor::new("c", "com.acme.C");
        let mut reference = ReferenceDescriptor::new("log", "com.acme.Log");
        reference.field_collection_type = Some(FieldCollectionType::Service);
        reference.cardinality = Some(Cardinality::Mandatory);
        reference.policy = Some(ReferencePolicy::Static);
        descriptor.references.push(reference);
        descriptor.service_scope = Some(ServiceScope::Default);
        assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_1);
    }

    #[test]
    fn test_configuration_pid_counts() {
        let mut descriptor = ComponentDescriptor::new("c", "com.acme.C");
        descriptor.configuration_pid.push("a".to_string());
        assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_2);
        descriptor.configuration_pid.push("b".to_string());
        assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_3);
    }

    #[test]
    fn test_check_override() {
        let ns = SpecVersion::V1_2.namespace();
        assert_eq!(check_override(ns, SpecVersion::V1_1), Ok(SpecVersion::V1_2));
        assert!(matches!(
            check_override(ns, SpecVersion::V1_3),
            Err(NamespaceError::BelowRequired { .. })
        ));
        assert!(matches!(
            check_override("urn:nope", SpecVersion::V1_1),
            Err(NamespaceError::Unknown(_))
        ));
    }

    #[test]
    fn test_supports() {
        assert!(SpecVersion::V1_3.supports(Feature::ReferenceField));
        assert!(!SpecVersion::V1_3.supports(Feature::ConstructorInjection));
        assert!(SpecVersion::V1_4.has_modern_naming());
        assert!(!SpecVersion::V1_3.has_modern_naming());
    }
}
