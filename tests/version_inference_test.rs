//! Minimum descriptor version inference

use scrgen::model::descriptor::{Cardinality, ComponentDescriptor, ReferenceDescriptor, ReferencePolicy};
use scrgen::version::{descriptor_version, features, required_version, Feature, SpecVersion};
use std::collections::BTreeSet;

const ALL_FEATURES: [Feature; 15] = [
    Feature::PolicyOption,
    Feature::UpdatedMethod,
    Feature::SingleConfigurationPid,
    Feature::ReferenceScope,
    Feature::ReferenceField,
    Feature::FieldOption,
    Feature::FieldCollectionType,
    Feature::PropertyTypes,
    Feature::MultipleConfigurationPid,
    Feature::ServiceScope,
    Feature::ModernBindSignature,
    Feature::ClassLevelReference,
    Feature::ConstructorInjection,
    Feature::ActivationFields,
    Feature::FactoryProperties,
];

#[test]
fn test_adding_a_feature_never_lowers_the_version() {
    for start in 0..ALL_FEATURES.len() {
        let mut used = BTreeSet::new();
        let mut version = required_version(used.iter().copied());
        for feature in ALL_FEATURES.iter().cycle().skip(start).take(ALL_FEATURES.len()) {
            used.insert(*feature);
            let next = required_version(used.iter().copied());
            assert!(next >= version, "{:?} lowered {} to {}", feature, version, next);
            assert!(next >= feature.min_version());
            version = next;
        }
        assert_eq!(version, SpecVersion::V1_4);
    }
}

#[test]
fn test_baseline_version() {
    let mut descriptor = ComponentDescriptor::new("acme.greeter", "com.acme.GreeterImpl");
    descriptor.services.push("com.acme.Greeter".to_string());
    assert!(features(&descriptor).is_empty());
    assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_1);
}

#[test]
fn test_reference_features_raise_version() {
    let mut descriptor = ComponentDescriptor::new("acme.greeter", "com.acme.GreeterImpl");
    let mut log = ReferenceDescriptor::new("log", "com.acme.Log");
    log.policy = Some(ReferencePolicy::Dynamic);
    log.bind = Some("setLog".to_string());
    log.unbind = Some("unsetLog".to_string());
    descriptor.references.push(log);
    assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_1);

    descriptor.references[0].updated = Some("updatedLog".to_string());
    assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_2);

    let mut greeters = ReferenceDescriptor::new("greeters", "com.acme.Greeter");
    greeters.cardinality = Some(Cardinality::Multiple);
    greeters.field = Some("greeters".to_string());
    descriptor.references.push(greeters);
    assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_3);

    descriptor.references[1].parameter = Some(0);
    assert_eq!(descriptor_version(&descriptor), SpecVersion::V1_4);
}
