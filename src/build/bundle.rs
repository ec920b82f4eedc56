//! Keeping the bundle manifest and `build.properties` in step with the
//! descriptors of a pass
//!
//! Only files that already exist are edited. Headers and entries other than
//! the ones maintained here keep their original lines.

use crate::fs::FileSystem;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Manifest header listing the descriptors of a bundle
pub const SERVICE_COMPONENT_HEADER: &str = "Service-Component";
pub const ACTIVATION_POLICY_HEADER: &str = "Bundle-ActivationPolicy";
pub const MANIFEST_FILE: &str = "META-INF/MANIFEST.MF";
pub const BUILD_PROPERTIES_FILE: &str = "build.properties";
pub const BIN_INCLUDES: &str = "bin.includes";

/// Which bundle files a pass rewrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleUpdate {
    pub manifest: bool,
    pub build_properties: bool,
}

fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Matches `name` against a manifest entry's last segment, where `*` stands
/// for any run of characters
fn wildcard_matches(pattern: &str, name: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return false;
    };
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

fn split_last_segment(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(at) => (&path[..at], &path[at + 1..]),
        None => ("", path),
    }
}

fn manifest_entry_includes(entry: &str, key: &str) -> bool {
    if entry == key {
        return true;
    }
    let (entry_dir, pattern) = split_last_segment(entry);
    let (key_dir, name) = split_last_segment(key);
    entry_dir == key_dir && pattern.contains('*') && wildcard_matches(pattern, name)
}

/// New `Service-Component` value after dropping `abandoned` keys and adding
/// `retained` keys no existing entry covers
///
/// Returns `None` when the header stays as it is. An empty value means the
/// header should be removed.
pub fn merge_service_components(existing: Option<&str>, retained: &[String], abandoned: &[String]) -> Option<String> {
    let mut entries: Vec<String> = Vec::new();
    for entry in existing.unwrap_or_default().split(',').map(str::trim) {
        if !entry.is_empty() && !entries.iter().any(|e| e == entry) {
            entries.push(entry.to_string());
        }
    }

    let mut changed = false;
    for key in abandoned {
        if let Some(position) = entries.iter().position(|e| e == key) {
            entries.remove(position);
            changed = true;
        }
    }
    for key in retained {
        if !entries.iter().any(|e| manifest_entry_includes(e, key)) {
            entries.push(key.clone());
            changed = true;
        }
    }

    changed.then(|| entries.join(",\n "))
}

/// One main-section header with the physical lines it spans
struct Header {
    name: String,
    lines: Vec<String>,
}

impl Header {
    fn value(&self) -> String {
        let mut value = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i == 0 {
                let (_, rest) = line.split_once(':').unwrap_or((line.as_str(), ""));
                value.push_str(rest.trim_start());
            } else {
                value.push_str(line.strip_prefix(' ').unwrap_or(line));
            }
        }
        value
    }

    fn render(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: format!("{}: {}", name, value).split('\n').map(str::to_string).collect(),
        }
    }
}

/// Rewrites the main section of a manifest; returns `None` when nothing
/// changed
pub fn update_manifest(text: &str, retained: &[String], abandoned: &[String], activation_policy: bool) -> Option<String> {
    let eol = line_ending(text);
    let mut lines = text.lines();
    let mut headers: Vec<Header> = Vec::new();
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        match headers.last_mut() {
            Some(header) if line.starts_with(' ') => header.lines.push(line.to_string()),
            _ => headers.push(Header {
                name: line.split_once(':').map(|(n, _)| n.trim()).unwrap_or(line).to_string(),
                lines: vec![line.to_string()],
            }),
        }
    }
    let trailer: Vec<&str> = lines.collect();

    let position = headers
        .iter()
        .position(|h| h.name.eq_ignore_ascii_case(SERVICE_COMPONENT_HEADER));
    let existing = position.map(|i| headers[i].value());
    let value = merge_service_components(existing.as_deref(), retained, abandoned)?;

    match (position, value.is_empty()) {
        (Some(i), true) => {
            headers.remove(i);
        }
        (Some(i), false) => headers[i] = Header::render(SERVICE_COMPONENT_HEADER, &value),
        (None, true) => {}
        (None, false) => headers.push(Header::render(SERVICE_COMPONENT_HEADER, &value)),
    }

    if activation_policy {
        let policy = Header::render(ACTIVATION_POLICY_HEADER, "lazy");
        match headers
            .iter()
            .position(|h| h.name.eq_ignore_ascii_case(ACTIVATION_POLICY_HEADER))
        {
            Some(i) => headers[i] = policy,
            None => headers.push(policy),
        }
    }

    let mut out = String::new();
    for line in headers.iter().flat_map(|h| h.lines.iter()) {
        out.push_str(line);
        out.push_str(eol);
    }
    out.push_str(eol);
    for line in trailer.iter().skip_while(|l| l.is_empty()) {
        out.push_str(line);
        out.push_str(eol);
    }
    Some(out)
}

/// Physical line range of the `bin.includes` entry and its tokens
fn find_bin_includes(lines: &[&str]) -> Option<(usize, usize, Vec<String>)> {
    let mut i = 0;
    while i < lines.len() {
        let start = i;
        let mut logical = String::new();
        loop {
            let line = lines[i].trim_start();
            i += 1;
            match line.strip_suffix('\\') {
                Some(head) if i < lines.len() => logical.push_str(head),
                _ => {
                    logical.push_str(line.trim_end_matches('\\'));
                    break;
                }
            }
        }

        if logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }
        let Some(rest) = logical.strip_prefix(BIN_INCLUDES) else {
            continue;
        };
        let is_separator = |c: char| c == '=' || c == ':';
        let value = if rest.is_empty() {
            rest
        } else if let Some(value) = rest.strip_prefix(is_separator) {
            value
        } else if rest.starts_with(char::is_whitespace) {
            let rest = rest.trim_start();
            rest.strip_prefix(is_separator).unwrap_or(rest)
        } else {
            continue;
        };
        let tokens = value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        return Some((start, i, tokens));
    }
    None
}

/// One token per line, aligned under the first
fn render_bin_includes(tokens: &[String]) -> Vec<String> {
    let lead = format!("{} = ", BIN_INCLUDES);
    if tokens.is_empty() {
        return vec![lead.trim_end().to_string()];
    }
    let indent = " ".repeat(lead.len());
    let last = tokens.len() - 1;
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let prefix = if i == 0 { lead.as_str() } else { indent.as_str() };
            let tail = if i == last { "" } else { ",\\" };
            format!("{}{}{}", prefix, token, tail)
        })
        .collect()
}

/// Rewrites the `bin.includes` entry of a `build.properties` document;
/// returns `None` when nothing changed
pub fn update_build_properties(text: &str, retained: &[String], abandoned: &[String]) -> Option<String> {
    let eol = line_ending(text);
    let lines: Vec<&str> = text.lines().collect();
    let found = find_bin_includes(&lines);
    if found.is_none() && retained.is_empty() {
        return None;
    }

    let (range, mut tokens) = match found {
        Some((start, end, tokens)) => (Some((start, end)), tokens),
        None => (None, Vec::new()),
    };
    let mut changed = range.is_none();
    for key in abandoned {
        let before = tokens.len();
        tokens.retain(|t| t != key);
        changed |= tokens.len() != before;
    }
    for key in retained {
        let covered = tokens
            .iter()
            .any(|t| t == key || (t.ends_with('/') && key.starts_with(t.as_str())));
        if !covered {
            tokens.push(key.clone());
            changed = true;
        }
    }
    if !changed {
        return None;
    }

    let rendered = render_bin_includes(&tokens);
    let mut out: Vec<String> = Vec::new();
    match range {
        Some((start, end)) => {
            out.extend(lines[..start].iter().map(|l| l.to_string()));
            out.extend(rendered);
            out.extend(lines[end..].iter().map(|l| l.to_string()));
        }
        None => {
            out.extend(lines.iter().map(|l| l.to_string()));
            out.extend(rendered);
        }
    }

    let mut text = out.join(eol);
    text.push_str(eol);
    Some(text)
}

fn rewrite(
    fs: &dyn FileSystem,
    path: &Path,
    edit: impl FnOnce(&str) -> Option<String>,
) -> Result<bool> {
    if !fs.is_file(path) {
        return Ok(false);
    }
    let text = fs.read_to_string(path)?;
    match edit(&text) {
        Some(updated) => {
            fs.write(path, &updated)
                .with_context(|| format!("Failed to update {}", path.display()))?;
            debug!("Updated {}", path.display());
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Updates the manifest and `build.properties` under `project_dir`
pub fn update_bundle(
    fs: &dyn FileSystem,
    project_dir: &Path,
    retained: &[String],
    abandoned: &[String],
    activation_policy: bool,
) -> BundleUpdate {
    let manifest = rewrite(fs, &project_dir.join(MANIFEST_FILE), |text| {
        update_manifest(text, retained, abandoned, activation_policy)
    });
    let build_properties = rewrite(fs, &project_dir.join(BUILD_PROPERTIES_FILE), |text| {
        update_build_properties(text, retained, abandoned)
    });

    let mut update = BundleUpdate::default();
    match manifest {
        Ok(changed) => update.manifest = changed,
        Err(e) => warn!("{:#}", e),
    }
    match build_properties {
        Ok(changed) => update.build_properties = changed,
        Err(e) => warn!("{:#}", e),
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_merge_keeps_foreign_entries() {
        let merged = merge_service_components(
            Some("OSGI-INF/manual.xml, OSGI-INF/old.xml"),
            &keys(&["OSGI-INF/a.xml"]),
            &keys(&["OSGI-INF/old.xml"]),
        );
        assert_eq!(merged.as_deref(), Some("OSGI-INF/manual.xml,\n OSGI-INF/a.xml"));
    }

    #[test]
    fn test_merge_unchanged_and_wildcards() {
        assert_eq!(
            merge_service_components(Some("OSGI-INF/a.xml"), &keys(&["OSGI-INF/a.xml"]), &[]),
            None
        );
        assert_eq!(
            merge_service_components(Some("OSGI-INF/*.xml"), &keys(&["OSGI-INF/a.xml", "OSGI-INF/b.xml"]), &[]),
            None
        );
        assert_eq!(
            merge_service_components(Some("OSGI-INF/*.xml"), &keys(&["META-INF/ds/a.xml"]), &[]).as_deref(),
            Some("OSGI-INF/*.xml,\n META-INF/ds/a.xml")
        );
        assert_eq!(
            merge_service_components(Some("OSGI-INF/a.xml"), &[], &keys(&["OSGI-INF/a.xml"])).as_deref(),
            Some("")
        );
    }

    #[test]
    fn test_wildcard_matches() {
        assert!(wildcard_matches("*.xml", "a.xml"));
        assert!(wildcard_matches("com.*.xml", "com.acme.xml"));
        assert!(!wildcard_matches("com.*.xml", "org.acme.xml"));
        assert!(!wildcard_matches("a*a", "a"));
    }

    #[test]
    fn test_update_manifest() {
        let text = "Manifest-Version: 1.0\nBundle-SymbolicName: com.acme\nService-Component: OSGI-INF/old.xml,\n OSGI-INF/manual.xml\nBundle-Version: 1.0.0\n";
        let updated = update_manifest(text, &keys(&["OSGI-INF/a.xml"]), &keys(&["OSGI-INF/old.xml"]), true).unwrap();
        assert_eq!(
            updated,
            "Manifest-Version: 1.0\nBundle-SymbolicName: com.acme\nService-Component: OSGI-INF/manual.xml,\n OSGI-INF/a.xml\nBundle-Version: 1.0.0\nBundle-ActivationPolicy: lazy\n\n"
        );
        assert_eq!(update_manifest(&updated, &keys(&["OSGI-INF/a.xml"]), &[], true), None);
    }

    #[test]
    fn test_update_manifest_removes_empty_header() {
        let text = "Manifest-Version: 1.0\nService-Component: OSGI-INF/a.xml\n\nName: x\nKey: v\n";
        let updated = update_manifest(text, &[], &keys(&["OSGI-INF/a.xml"]), false).unwrap();
        assert_eq!(updated, "Manifest-Version: 1.0\n\nName: x\nKey: v\n");
    }

    #[test]
    fn test_update_build_properties() {
        let text = "source.. = src/\nbin.includes = META-INF/,\\\n               .,\\\n               OSGI-INF/old.xml\njars.compile.order = .\n";
        let updated = update_build_properties(text, &keys(&["OSGI-INF/a.xml"]), &keys(&["OSGI-INF/old.xml"])).unwrap();
        assert_eq!(
            updated,
            "source.. = src/\nbin.includes = META-INF/,\\\n               .,\\\n               OSGI-INF/a.xml\njars.compile.order = .\n"
        );
        assert_eq!(update_build_properties(&updated, &keys(&["OSGI-INF/a.xml"]), &[]), None);
    }

    #[test]
    fn test_build_properties_folder_entry_covers_descriptors() {
        let text = "bin.includes = META-INF/,\\\n               OSGI-INF/\n";
        assert_eq!(update_build_properties(text, &keys(&["OSGI-INF/a.xml"]), &[]), None);

        let updated = update_build_properties("source.. = src/\n", &keys(&["OSGI-INF/a.xml"]), &[]).unwrap();
        assert_eq!(updated, "source.. = src/\nbin.includes = OSGI-INF/a.xml\n");
        assert_eq!(update_build_properties("source.. = src/\n", &[], &keys(&["OSGI-INF/a.xml"])), None);
    }

    #[test]
    fn test_update_bundle_skips_missing_files() {
        let fs = MockFileSystem::new();
        fs.add_file("/project/META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n");
        let update = update_bundle(&fs, Path::new("/project"), &keys(&["OSGI-INF/a.xml"]), &[], false);
        assert_eq!(
            update,
            BundleUpdate {
                manifest: true,
                build_properties: false
            }
        );
        let text = fs.read_to_string(Path::new("/project/META-INF/MANIFEST.MF")).unwrap();
        assert!(text.contains("Service-Component: OSGI-INF/a.xml"));
    }
}
