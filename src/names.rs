//! Property name mapping for component property type members
//!
//! Member identifiers are rewritten into property names with escape rules that
//! depend on the target format:
//!
//! - `$` is dropped unless doubled (`$$` becomes `$`)
//! - `_` becomes `.` unless doubled (`__` becomes `_`)
//! - from 1.4 on, `$_$` becomes `-` and the `PREFIX_` constant is prepended
//!
//! ```
//! use scrgen::names::map_name;
//! use scrgen::version::SpecVersion;
//!
//! assert_eq!(map_name("service_ranking", None, SpecVersion::V1_3), "service.ranking");
//! assert_eq!(map_name("a$_$b", Some("x."), SpecVersion::V1_4), "x.a-b");
//! ```

use crate::version::SpecVersion;

fn rewrite(identifier: &str, modern: bool) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    let mut out = String::with_capacity(identifier.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '$' if modern && chars.get(i + 1) == Some(&'_') && chars.get(i + 2) == Some(&'$') => {
                out.push('-');
                i += 3;
            }
            '$' if chars.get(i + 1) == Some(&'$') => {
                out.push('$');
                i += 2;
            }
            '$' => i += 1,
            '_' if chars.get(i + 1) == Some(&'_') => {
                out.push('_');
                i += 2;
            }
            '_' => {
                out.push('.');
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Maps a member identifier to a property name.
///
/// The prefix is only applied by the 1.4 rules.
pub fn map_name(identifier: &str, prefix: Option<&str>, version: SpecVersion) -> String {
    if !version.has_modern_naming() {
        return rewrite(identifier, false);
    }
    let name = rewrite(identifier, true);
    match prefix {
        Some(prefix) => format!("{prefix}{name}"),
        None => name,
    }
}

/// Maps a simple class name to a property name (single-element and marker
/// property types): escapes as in [`map_name`], then a `.` at every
/// lowercase to uppercase transition, then lowercased.
pub fn map_class_name(simple_name: &str, prefix: Option<&str>, version: SpecVersion) -> String {
    if !version.has_modern_naming() {
        return map_name(simple_name, prefix, version);
    }
    let escaped = rewrite(simple_name, true);
    let mut out = String::with_capacity(escaped.len() + 4);
    let mut previous_lower = false;
    for c in escaped.chars() {
        if c.is_uppercase() && previous_lower {
            out.push('.');
        }
        previous_lower = c.is_lowercase();
        out.extend(c.to_lowercase());
    }
    match prefix {
        Some(prefix) => format!("{prefix}{out}"),
        None => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_rules() {
        assert_eq!(map_name("a_b", None, SpecVersion::V1_3), "a.b");
        assert_eq!(map_name("a__b", None, SpecVersion::V1_3), "a_b");
        assert_eq!(map_name("a$b", None, SpecVersion::V1_3), "ab");
        assert_eq!(map_name("a$$b", None, SpecVersion::V1_3), "a$b");
        assert_eq!(map_name("$_$", None, SpecVersion::V1_3), ".");
    }

    #[test]
    fn test_legacy_ignores_prefix() {
        assert_eq!(map_name("port", Some("http."), SpecVersion::V1_3), "port");
    }

    #[test]
    fn test_modern_rules() {
        assert_eq!(map_name("$_$", None, SpecVersion::V1_4), "-");
        assert_eq!(map_name("my$_$name", Some("acme."), SpecVersion::V1_4), "acme.my-name");
        assert_eq!(map_name("a_b", None, SpecVersion::V1_4), "a.b");
    }

    #[test]
    fn test_class_name_form() {
        assert_eq!(map_class_name("getFooBar", None, SpecVersion::V1_4), "get.foo.bar");
        assert_eq!(map_class_name("URLConfig", None, SpecVersion::V1_4), "urlconfig");
        assert_eq!(map_class_name("Limit", Some("a."), SpecVersion::V1_4), "a.limit");
    }

    #[test]
    fn test_total_on_odd_input() {
        assert_eq!(map_name("", None, SpecVersion::V1_4), "");
        assert_eq!(map_name("$", None, SpecVersion::V1_4), "");
        assert_eq!(map_name("_", None, SpecVersion::V1_1), ".");
        assert_eq!(map_name("é_x", None, SpecVersion::V1_4), "é.x");
    }
}
