//! Output formatting for build reports, check results and name mappings
//!
//! # Example
//!
//! ```ignore
//! use scrgen::cli::output::{OutputFormat, OutputFormatter};
//!
//! let formatter = OutputFormatter::new(OutputFormat::Json);
//! let output = formatter.format_batch(&report)?;
//! println!("{}", output);
//! ```

use anyhow::{Context, Result};
use serde::Serialize;

use crate::build::bundle::{BUILD_PROPERTIES_FILE, MANIFEST_FILE};
use crate::build::{BatchReport, DescriptorStatus};
use crate::diagnostics::Diagnostic;
use crate::extractor::{descriptor_key, UnitExtraction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    Yaml,
    /// Human-readable formatted text
    Human,
}

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Serialize)]
struct NameMapping<'a> {
    identifier: &'a str,
    property: &'a str,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_batch(&self, report: &BatchReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).context("Failed to serialize build report to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(report).context("Failed to serialize build report to YAML"),
            OutputFormat::Human => Ok(self.format_batch_human(report)),
        }
    }

    /// `output_path` is used to show where each descriptor would be written
    pub fn format_check(&self, units: &[UnitExtraction], output_path: &str) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(units).context("Failed to serialize check result to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(units).context("Failed to serialize check result to YAML"),
            OutputFormat::Human => Ok(self.format_check_human(units, output_path)),
        }
    }

    pub fn format_name(&self, identifier: &str, property: &str) -> Result<String> {
        let mapping = NameMapping { identifier, property };
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&mapping).context("Failed to serialize name to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(&mapping).context("Failed to serialize name to YAML"),
            OutputFormat::Human => Ok(format!("{}\n", property)),
        }
    }

    fn format_batch_human(&self, report: &BatchReport) -> String {
        let mut output = String::new();
        let errors = report.error_count();
        let failures = report.failures().count();

        if report.cancelled {
            output.push_str("\u{26A0} Build Cancelled\n");
        } else if errors > 0 || failures > 0 {
            output.push_str("\u{2717} Build Finished With Errors\n");
        } else {
            output.push_str("\u{2713} Descriptors Built\n");
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        for unit in &report.units {
            if unit.descriptors.is_empty() && unit.diagnostics.is_empty() {
                continue;
            }
            output.push_str(&format!("{}\n", unit.key));
            let lines: Vec<String> = unit
                .descriptors
                .iter()
                .map(|d| {
                    let mut line = format!("{}  {}  (v{})", d.key, status_label(d.status), d.version);
                    if let Some(error) = &d.error {
                        line.push_str(&format!(": {}", error));
                    }
                    line
                })
                .chain(unit.diagnostics.iter().map(Diagnostic::to_string))
                .collect();
            push_tree(&mut output, &lines);
            output.push('\n');
        }

        if !report.deleted.is_empty() {
            output.push_str("Deleted:\n");
            for key in &report.deleted {
                output.push_str(&format!("  - {}\n", key));
            }
            output.push('\n');
        }

        if let Some(header) = report.manifest_header() {
            output.push_str(&header);
            output.push_str("\n\n");
        }
        for (updated, file) in [
            (report.bundle.manifest, MANIFEST_FILE),
            (report.bundle.build_properties, BUILD_PROPERTIES_FILE),
        ] {
            if updated {
                output.push_str(&format!("Updated {}\n", file));
            }
        }

        output.push_str(&format!(
            "{} descriptor(s), {} error(s), {} warning(s)",
            report.retained.len(),
            errors,
            report.warning_count()
        ));
        if failures > 0 {
            output.push_str(&format!(", {} failed write(s)", failures));
        }
        if report.full_rebuild {
            output.push_str(" [full rebuild]");
        }
        output.push('\n');
        output
    }

    fn format_check_human(&self, units: &[UnitExtraction], output_path: &str) -> String {
        let mut output = String::new();
        let errors: usize = units.iter().filter(|u| u.has_errors()).count();

        if errors > 0 {
            output.push_str("\u{2717} Check Failed\n");
        } else {
            output.push_str("\u{2713} Check Passed\n");
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        let mut components = 0;
        for unit in units {
            if unit.descriptors.is_empty() && unit.diagnostics.is_empty() {
                continue;
            }
            components += unit.descriptors.len();
            output.push_str(&format!("{}\n", unit.key));
            let lines: Vec<String> = unit
                .descriptors
                .iter()
                .map(|d| format!("{} -> {}  (v{})", d.name, descriptor_key(output_path, &d.name), d.version))
                .chain(unit.diagnostics.iter().map(Diagnostic::to_string))
                .collect();
            push_tree(&mut output, &lines);
            output.push('\n');
        }

        let diagnostics: usize = units.iter().map(|u| u.diagnostics.len()).sum();
        output.push_str(&format!("{} component(s), {} diagnostic(s)\n", components, diagnostics));
        output
    }
}

fn status_label(status: DescriptorStatus) -> &'static str {
    match status {
        DescriptorStatus::Created => "created",
        DescriptorStatus::Updated => "updated",
        DescriptorStatus::Unchanged => "unchanged",
        DescriptorStatus::Renamed => "renamed",
        DescriptorStatus::Failed => "FAILED",
    }
}

fn push_tree(output: &mut String, lines: &[String]) {
    for (i, line) in lines.iter().enumerate() {
        let connector = if i + 1 == lines.len() { "\u{2514}" } else { "\u{251C}" };
        output.push_str(&format!("{}\u{2500} {}\n", connector, line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BundleUpdate, DescriptorReport, UnitReport};
    use crate::diagnostics::{DiagnosticKind, Severity};
    use crate::model::source::SourceRange;
    use crate::version::SpecVersion;

    fn report() -> BatchReport {
        BatchReport {
            units: vec![UnitReport {
                key: "com/acme/Foo.java".into(),
                descriptors: vec![DescriptorReport {
                    component: "com.acme.Foo".into(),
                    implementation: "com.acme.Foo".into(),
                    key: "OSGI-INF/com.acme.Foo.xml".into(),
                    version: SpecVersion::V1_3,
                    status: DescriptorStatus::Created,
                    error: None,
                }],
                diagnostics: vec![Diagnostic {
                    kind: DiagnosticKind::ReferenceViolation,
                    severity: Severity::Warning,
                    message: "missing unbind method".into(),
                    range: SourceRange::new(10, 4),
                }],
            }],
            retained: vec!["OSGI-INF/com.acme.Foo.xml".into()],
            deleted: vec!["OSGI-INF/old.xml".into()],
            service_component: "OSGI-INF/com.acme.Foo.xml".into(),
            cancelled: false,
            full_rebuild: false,
            bundle: BundleUpdate {
                manifest: true,
                build_properties: false,
            },
        }
    }

    #[test]
    fn test_human_batch() {
        let output = OutputFormatter::new(OutputFormat::Human).format_batch(&report()).unwrap();
        assert!(output.contains("Descriptors Built"));
        assert!(output.contains("\u{251C}\u{2500} OSGI-INF/com.acme.Foo.xml  created  (v1.3)"));
        assert!(output.contains("\u{2514}\u{2500} warning[reference-violation] @10+4: missing unbind method"));
        assert!(output.contains("  - OSGI-INF/old.xml"));
        assert!(output.contains("Updated META-INF/MANIFEST.MF"));
        assert!(!output.contains("Updated build.properties"));
        assert!(output.contains("Service-Component: OSGI-INF/com.acme.Foo.xml"));
        assert!(output.contains("1 descriptor(s), 0 error(s), 1 warning(s)"));
    }

    #[test]
    fn test_json_batch() {
        let output = OutputFormatter::new(OutputFormat::Json).format_batch(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["units"][0]["descriptors"][0]["status"], "created");
        assert_eq!(value["units"][0]["descriptors"][0]["version"], "1.3");
        assert_eq!(value["deleted"][0], "OSGI-INF/old.xml");
    }

    #[test]
    fn test_yaml_batch() {
        let output = OutputFormatter::new(OutputFormat::Yaml).format_batch(&report()).unwrap();
        let parsed: BatchReport = serde_yaml::from_str(&output).unwrap();
        assert_eq!(parsed, report());
    }

    #[test]
    fn test_name_formats() {
        let human = OutputFormatter::new(OutputFormat::Human).format_name("a_b", "a.b").unwrap();
        assert_eq!(human, "a.b\n");
        let json = OutputFormatter::new(OutputFormat::Json).format_name("a_b", "a.b").unwrap();
        assert!(json.contains("\"property\": \"a.b\""));
    }
}
