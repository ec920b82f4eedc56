//! Structured logging setup for scrgen
//!
//! Logs go to stderr so that reports printed on stdout stay machine readable.
//! The subscriber is installed at most once per process.
//!
//! # Environment
//!
//! - `SCRGEN_LOG_LEVEL`: trace, debug, info, warn or error
//! - `SCRGEN_LOG_JSON`: `true` for one JSON object per event
//! - `RUST_LOG`: standard filter directives, taking precedence over the level
//!
//! # Example
//!
//! ```no_run
//! use scrgen::util::logging;
//! use tracing::{debug, info};
//!
//! logging::init_from_env();
//!
//! info!("Build started");
//! debug!(unit = "com/acme/Foo.java", "Extracting components");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for scrgen's own events
    pub level: Level,

    pub use_json: bool,

    /// Include the module target (e.g. scrgen::build::batch)
    pub include_target: bool,

    /// Include file and line number
    pub include_location: bool,

    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full event metadata, for build servers
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }

    /// Reads `SCRGEN_LOG_LEVEL` and `SCRGEN_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var("SCRGEN_LOG_LEVEL")
            .ok()
            .and_then(|v| try_parse_level(&v))
            .unwrap_or(Level::INFO);
        let use_json = env::var("SCRGEN_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        Self {
            level,
            use_json,
            ..Default::default()
        }
    }
}

pub fn try_parse_level(level_str: &str) -> Option<Level> {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Parses a level, falling back to INFO with a notice on stderr
pub fn parse_level(level_str: &str) -> Level {
    try_parse_level(level_str).unwrap_or_else(|| {
        eprintln!(
            "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
            level_str
        );
        Level::INFO
    })
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    let directive: Option<Directive> = format!("scrgen={}", level).parse().ok();
    let filter = EnvFilter::new("warn");
    match directive {
        Some(directive) => filter.add_directive(directive),
        None => filter,
    }
}

/// Installs the global subscriber; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids);

        if config.use_json {
            tracing_subscriber::registry().with(filter).with(layer.json()).init();
        } else {
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level(" warning "), Level::WARN);
        assert_eq!(parse_level("invalid"), Level::INFO);
        assert_eq!(try_parse_level(""), None);
    }

    #[test]
    fn test_presets() {
        let config = LoggingConfig::with_level(Level::DEBUG);
        assert_eq!(config.level, Level::DEBUG);
        assert!(!config.use_json);

        let production = LoggingConfig::production();
        assert!(production.use_json);
        assert!(production.include_location);

        let development = LoggingConfig::development();
        assert_eq!(development.level, Level::DEBUG);
        assert!(!development.use_json);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("SCRGEN_LOG_LEVEL", "error");
        env::set_var("SCRGEN_LOG_JSON", "true");
        let config = LoggingConfig::from_env();
        env::remove_var("SCRGEN_LOG_LEVEL");
        env::remove_var("SCRGEN_LOG_JSON");

        assert_eq!(config.level, Level::ERROR);
        assert!(config.use_json);
    }
}
