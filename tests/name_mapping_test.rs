//! Property name mapping across descriptor versions

use scrgen::names::{map_class_name, map_name};
use scrgen::version::SpecVersion;
use yare::parameterized;

#[parameterized(
    single_underscore = { "a_b", "a.b" },
    double_underscore = { "a__b", "a_b" },
    dropped_dollar = { "a$b", "ab" },
    double_dollar = { "a$$b", "a$b" },
    dash_escape = { "my$_$name", "my-name" },
    dash_alone = { "$_$", "-" },
    plain = { "port", "port" },
)]
fn test_modern_member_names(identifier: &str, expected: &str) {
    assert_eq!(map_name(identifier, None, SpecVersion::V1_4), expected);
}

#[parameterized(
    single_underscore = { "a_b", "a.b" },
    dash_escape_is_not_special = { "$_$", "." },
    double_dollar = { "a$$b", "a$b" },
)]
fn test_legacy_member_names(identifier: &str, expected: &str) {
    assert_eq!(map_name(identifier, None, SpecVersion::V1_3), expected);
}

#[parameterized(
    camel_case = { "getFooBar", "get.foo.bar" },
    acronym = { "URLConfig", "urlconfig" },
    single_word = { "Limit", "limit" },
)]
fn test_class_names(simple_name: &str, expected: &str) {
    assert_eq!(map_class_name(simple_name, None, SpecVersion::V1_4), expected);
}

#[test]
fn test_prefix_applies_only_to_modern_rules() {
    assert_eq!(map_name("port", Some("http."), SpecVersion::V1_4), "http.port");
    assert_eq!(map_name("port", Some("http."), SpecVersion::V1_3), "port");
    assert_eq!(map_class_name("Limit", Some("a."), SpecVersion::V1_4), "a.limit");
}
