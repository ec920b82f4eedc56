//! Configuration management for scrgen
//!
//! Settings are loaded from environment variables with defaults. A project may
//! carry a `scrgen.toml` whose values override the environment, and command
//! line flags override both.
//!
//! # Environment Variables
//!
//! - `SCRGEN_OUTPUT_PATH`: Descriptor folder relative to the project - default: "OSGI-INF"
//! - `SCRGEN_SPEC_VERSION`: Highest annotation version recognized (1.3|1.4) - default: "1.4"
//! - `SCRGEN_VALIDATION_LEVEL`: error|warning|ignore - default: "error"
//! - `SCRGEN_MISSING_UNBIND_LEVEL`: Severity of a missing implicit unbind method - default: the validation level
//! - `SCRGEN_COMMIT_TIMEOUT`: Seconds to wait for one document commit - default: "30"
//! - `SCRGEN_PARALLELISM`: Units extracted concurrently - default: "4"
//! - `SCRGEN_INDEX_FILE`: Project index path relative to the project - default: ".scrgen/index.json"
//! - `SCRGEN_ACTIVATION_POLICY`: Set `Bundle-ActivationPolicy: lazy` when the manifest is updated - default: "true"
//! - `SCRGEN_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Project File
//!
//! ```toml
//! output-path = "OSGI-INF"
//! spec-version = "1.3"
//! validation-level = "warning"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use scrgen::ScrgenConfig;
//! use scrgen::fs::RealFileSystem;
//! use std::path::Path;
//!
//! let config = ScrgenConfig::load(Path::new("."), &RealFileSystem).expect("Invalid configuration");
//! config.validate().expect("Invalid configuration");
//! ```

use crate::build::index::IndexSettings;
use crate::diagnostics::ValidationLevel;
use crate::extractor::ExtractorOptions;
use crate::fs::FileSystem;
use crate::version::SpecVersion;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default values for configuration
const DEFAULT_OUTPUT_PATH: &str = "OSGI-INF";
const DEFAULT_SPEC_VERSION: SpecVersion = SpecVersion::V1_4;
const DEFAULT_VALIDATION_LEVEL: ValidationLevel = ValidationLevel::Error;
const DEFAULT_COMMIT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PARALLELISM: usize = 4;
const DEFAULT_INDEX_FILE: &str = ".scrgen/index.json";
const DEFAULT_ACTIVATION_POLICY: bool = true;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Name of the per-project configuration file
pub const PROJECT_FILE: &str = "scrgen.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    /// Project file could not be read or is not valid TOML
    #[error("Failed to load {path}: {error}")]
    FileError { path: PathBuf, error: String },
}

/// Values a `scrgen.toml` may set
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ProjectFile {
    output_path: Option<String>,
    spec_version: Option<String>,
    validation_level: Option<String>,
    missing_unbind_level: Option<String>,
    commit_timeout: Option<u64>,
    parallelism: Option<usize>,
    index_file: Option<PathBuf>,
    activation_policy: Option<bool>,
    log_level: Option<String>,
}

/// Main configuration structure for scrgen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrgenConfig {
    /// Descriptor folder, relative to the project directory
    pub output_path: String,

    /// Highest annotation version the extractor recognizes
    pub spec_version: SpecVersion,

    pub validation_level: ValidationLevel,

    /// `None` follows the validation level
    pub missing_unbind_level: Option<ValidationLevel>,

    /// Bound on waiting for one document commit, in seconds
    pub commit_timeout_secs: u64,

    /// Units extracted concurrently
    pub parallelism: usize,

    /// Project index location, relative to the project directory
    pub index_file: PathBuf,

    /// Whether a manifest update also sets a lazy activation policy
    pub activation_policy: bool,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn parse_field<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::ParseError {
        field: field.to_string(),
        error: e.to_string(),
    })
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Default for ScrgenConfig {
    /// Loads SCRGEN_* environment variables, falling back to defaults for
    /// missing or unparsable values
    fn default() -> Self {
        let validation_level = env_value("SCRGEN_VALIDATION_LEVEL").unwrap_or(DEFAULT_VALIDATION_LEVEL);

        Self {
            output_path: env::var("SCRGEN_OUTPUT_PATH").unwrap_or_else(|_| DEFAULT_OUTPUT_PATH.to_string()),
            spec_version: env_value("SCRGEN_SPEC_VERSION").unwrap_or(DEFAULT_SPEC_VERSION),
            validation_level,
            missing_unbind_level: env_value("SCRGEN_MISSING_UNBIND_LEVEL"),
            commit_timeout_secs: env_value("SCRGEN_COMMIT_TIMEOUT").unwrap_or(DEFAULT_COMMIT_TIMEOUT_SECS),
            parallelism: env_value("SCRGEN_PARALLELISM").unwrap_or(DEFAULT_PARALLELISM),
            index_file: env::var("SCRGEN_INDEX_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_INDEX_FILE)),
            activation_policy: env_value("SCRGEN_ACTIVATION_POLICY").unwrap_or(DEFAULT_ACTIVATION_POLICY),
            log_level: env::var("SCRGEN_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl ScrgenConfig {
    /// Environment defaults overridden by `<project_dir>/scrgen.toml` when present
    pub fn load(project_dir: &Path, fs: &dyn FileSystem) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let path = project_dir.join(PROJECT_FILE);
        if fs.is_file(&path) {
            let text = fs.read_to_string(&path).map_err(|e| ConfigError::FileError {
                path: path.clone(),
                error: format!("{:#}", e),
            })?;
            config.apply_toml(&text).map_err(|e| match e {
                ConfigError::FileError { error, .. } => ConfigError::FileError { path, error },
                other => other,
            })?;
        }
        Ok(config)
    }

    /// Overrides every value set in the TOML document `text`
    pub fn apply_toml(&mut self, text: &str) -> Result<(), ConfigError> {
        let file: ProjectFile = toml::from_str(text).map_err(|e| ConfigError::FileError {
            path: PathBuf::from(PROJECT_FILE),
            error: e.to_string(),
        })?;

        if let Some(output_path) = file.output_path {
            self.output_path = output_path;
        }
        if let Some(version) = file.spec_version {
            self.spec_version = parse_field("spec-version", &version)?;
        }
        if let Some(level) = file.validation_level {
            self.validation_level = parse_field("validation-level", &level)?;
        }
        if let Some(level) = file.missing_unbind_level {
            self.missing_unbind_level = Some(parse_field("missing-unbind-level", &level)?);
        }
        if let Some(timeout) = file.commit_timeout {
            self.commit_timeout_secs = timeout;
        }
        if let Some(parallelism) = file.parallelism {
            self.parallelism = parallelism;
        }
        if let Some(index_file) = file.index_file {
            self.index_file = index_file;
        }
        if let Some(activation_policy) = file.activation_policy {
            self.activation_policy = activation_policy;
        }
        if let Some(log_level) = file.log_level {
            self.log_level = log_level.to_lowercase();
        }
        Ok(())
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any validation fails
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spec_version < SpecVersion::V1_3 {
            return Err(ConfigError::ValidationFailed(format!(
                "Unsupported spec version {}. Valid options: 1.3, 1.4",
                self.spec_version
            )));
        }

        let output = Path::new(&self.output_path);
        if self.output_path.trim().is_empty() || output.is_absolute() {
            return Err(ConfigError::ValidationFailed(
                "Output path must be a non-empty path relative to the project".to_string(),
            ));
        }
        if output.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(ConfigError::ValidationFailed(
                "Output path must stay inside the project".to_string(),
            ));
        }

        if self.commit_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Commit timeout must be at least 1 second".to_string(),
            ));
        }
        if self.commit_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Commit timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.parallelism == 0 || self.parallelism > 256 {
            return Err(ConfigError::ValidationFailed(
                "Parallelism must be between 1 and 256".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn missing_unbind_level(&self) -> ValidationLevel {
        self.missing_unbind_level.unwrap_or(self.validation_level)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.commit_timeout_secs)
    }

    pub fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            version: self.spec_version,
            level: self.validation_level,
            missing_unbind_level: self.missing_unbind_level(),
        }
    }

    /// Settings recorded in the project index; a change forces a full rebuild
    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            output_path: self.output_path.trim_matches('/').to_string(),
            spec_version: self.spec_version,
            validation_level: self.validation_level,
            missing_unbind_level: self.missing_unbind_level(),
        }
    }
}

impl fmt::Display for ScrgenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scrgen Configuration:")?;
        writeln!(f, "  Output Path: {}", self.output_path)?;
        writeln!(f, "  Spec Version: {}", self.spec_version)?;
        writeln!(f, "  Validation Level: {}", self.validation_level)?;
        writeln!(f, "  Missing Unbind Level: {}", self.missing_unbind_level())?;
        writeln!(f, "  Commit Timeout: {}s", self.commit_timeout_secs)?;
        writeln!(f, "  Parallelism: {}", self.parallelism)?;
        writeln!(f, "  Index File: {}", self.index_file.display())?;
        writeln!(f, "  Activation Policy: {}", self.activation_policy)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
