//! Diagnostics collected while extracting components from one unit

use crate::model::source::SourceRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How strictly optional checks are applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    #[default]
    Error,
    Warning,
    Ignore,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid validation level '{0}' (expected error, warning or ignore)")]
pub struct InvalidLevel(pub String);

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Error => "error",
            ValidationLevel::Warning => "warning",
            ValidationLevel::Ignore => "ignore",
        }
    }

    pub fn is_ignore(&self) -> bool {
        *self == ValidationLevel::Ignore
    }

    /// Severity of a finding at this level, `None` when it is not reported
    pub fn severity(&self) -> Option<Severity> {
        match self {
            ValidationLevel::Error => Some(Severity::Error),
            ValidationLevel::Warning => Some(Severity::Warning),
            ValidationLevel::Ignore => None,
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationLevel {
    type Err = InvalidLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(ValidationLevel::Error),
            "warning" | "warn" => Ok(ValidationLevel::Warning),
            "ignore" | "none" => Ok(ValidationLevel::Ignore),
            _ => Err(InvalidLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Disallowed type shape
    StructuralViolation,
    AttributeViolation,
    ReferenceViolation,
    PropertyViolation,
    DuplicateDeclaration,
    /// Invalid lifecycle method signature
    LifecycleViolation,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::StructuralViolation => "structural-violation",
            DiagnosticKind::AttributeViolation => "attribute-violation",
            DiagnosticKind::ReferenceViolation => "reference-violation",
            DiagnosticKind::PropertyViolation => "property-violation",
            DiagnosticKind::DuplicateDeclaration => "duplicate-declaration",
            DiagnosticKind::LifecycleViolation => "lifecycle-violation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub range: SourceRange,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}[{}] @{}+{}: {}",
            severity,
            self.kind.as_str(),
            self.range.offset,
            self.range.length,
            self.message
        )
    }
}

/// Collects the diagnostics of one unit.
///
/// Findings are dropped under [`ValidationLevel::Ignore`]; the missing unbind
/// check has its own level.
#[derive(Debug, Clone)]
pub struct ProblemReporter {
    level: ValidationLevel,
    missing_unbind_level: ValidationLevel,
    diagnostics: Vec<Diagnostic>,
}

impl ProblemReporter {
    pub fn new(level: ValidationLevel, missing_unbind_level: ValidationLevel) -> Self {
        Self {
            level,
            missing_unbind_level,
            diagnostics: Vec::new(),
        }
    }

    pub fn level(&self) -> ValidationLevel {
        self.level
    }

    /// Optional checks run only when this is true
    pub fn checks_enabled(&self) -> bool {
        !self.level.is_ignore()
    }

    pub fn report(&mut self, kind: DiagnosticKind, range: SourceRange, message: impl Into<String>) {
        if let Some(severity) = self.level.severity() {
            self.push(kind, severity, range, message.into());
        }
    }

    /// Reports at warning severity regardless of the level (still dropped under ignore)
    pub fn warn(&mut self, kind: DiagnosticKind, range: SourceRange, message: impl Into<String>) {
        if self.checks_enabled() {
            self.push(kind, Severity::Warning, range, message.into());
        }
    }

    pub fn report_missing_unbind(&mut self, range: SourceRange, message: impl Into<String>) {
        if let Some(severity) = self.missing_unbind_level.severity() {
            self.push(DiagnosticKind::ReferenceViolation, severity, range, message.into());
        }
    }

    fn push(&mut self, kind: DiagnosticKind, severity: Severity, range: SourceRange, message: String) {
        tracing::trace!(kind = kind.as_str(), %message, "diagnostic");
        self.diagnostics.push(Diagnostic {
            kind,
            severity,
            message,
            range,
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_gate_reporting() {
        let range = SourceRange::new(1, 2);
        let mut reporter = ProblemReporter::new(ValidationLevel::Warning, ValidationLevel::Error);
        reporter.report(DiagnosticKind::AttributeViolation, range, "bad pid");
        reporter.report_missing_unbind(range, "no unbind");
        assert_eq!(reporter.diagnostics()[0].severity, Severity::Warning);
        assert_eq!(reporter.diagnostics()[1].severity, Severity::Error);
        assert!(reporter.has_errors());

        let mut ignoring = ProblemReporter::new(ValidationLevel::Ignore, ValidationLevel::Ignore);
        ignoring.report(DiagnosticKind::AttributeViolation, range, "bad pid");
        ignoring.warn(DiagnosticKind::AttributeViolation, range, "ignored");
        ignoring.report_missing_unbind(range, "no unbind");
        assert!(ignoring.diagnostics().is_empty());
        assert!(!ignoring.checks_enabled());
    }

    #[test]
    fn test_warn_is_always_warning() {
        let mut reporter = ProblemReporter::new(ValidationLevel::Error, ValidationLevel::Error);
        reporter.warn(DiagnosticKind::AttributeViolation, SourceRange::default(), "dropped");
        assert_eq!(reporter.diagnostics()[0].severity, Severity::Warning);
        assert!(!reporter.has_errors());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("WARNING".parse::<ValidationLevel>(), Ok(ValidationLevel::Warning));
        assert_eq!("ignore".parse::<ValidationLevel>(), Ok(ValidationLevel::Ignore));
        assert!("loud".parse::<ValidationLevel>().is_err());
    }

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic {
            kind: DiagnosticKind::PropertyViolation,
            severity: Severity::Error,
            message: "not a number".to_string(),
            range: SourceRange::new(4, 3),
        };
        assert_eq!(diagnostic.to_string(), "error[property-violation] @4+3: not a number");
    }
}
