//! scrgen - Declarative Services annotation compiler
//!
//! This library turns component annotations on Java types, supplied as a
//! serialized source snapshot, into OSGi component descriptor documents. It
//! validates the annotated types, resolves references and lifecycle methods
//! across the type hierarchy, infers the minimum descriptor format version and
//! updates existing descriptors with minimal edits.
//!
//! # Core Concepts
//!
//! - **Source snapshot**: compilation units with their type declarations,
//!   members and annotations ([`model::source`])
//! - **Component descriptor**: the normalized model of one component
//!   ([`model::descriptor`]), produced by the [`extractor`]
//! - **Reconciliation**: the minimal set of edits that brings a descriptor
//!   document in line with a component descriptor ([`reconcile`])
//! - **Build pass**: extraction and reconciliation of every unit, with deferred
//!   cleanup of abandoned descriptors ([`build`])
//!
//! # Example Usage
//!
//! ```no_run
//! use scrgen::model::source::SourceSnapshot;
//! use scrgen::model::hierarchy::TypeIndex;
//! use scrgen::extractor::{ComponentModelExtractor, ExtractorOptions};
//! use scrgen::fs::RealFileSystem;
//! use scrgen::reconcile::reconcile;
//! use scrgen::xml::to_xml_string;
//!
//! # fn main() -> anyhow::Result<()> {
//! let snapshot = SourceSnapshot::from_json(&std::fs::read_to_string("snapshot.json")?)?;
//! let types = TypeIndex::from_snapshot(&snapshot);
//! let extractor = ComponentModelExtractor::new(&types, ExtractorOptions::default(), &RealFileSystem, ".");
//!
//! for unit in &snapshot.units {
//!     let extraction = extractor.extract_unit(unit);
//!     for descriptor in &extraction.descriptors {
//!         let document = reconcile(descriptor, None)?.document;
//!         println!("{}", to_xml_string(&document)?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod build;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod extractor;
pub mod filter;
pub mod fs;
pub mod model;
pub mod names;
pub mod reconcile;
pub mod resolver;
pub mod util;
pub mod version;
pub mod xml;

pub use build::{Batch, BatchReport, CancelToken, CommitError, Coordinator, DirectCoordinator, EventLoopCoordinator};
pub use config::{ConfigError, ScrgenConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, ProblemReporter, Severity, ValidationLevel};
pub use extractor::{ComponentModelExtractor, ExtractorOptions, UnitExtraction};
pub use model::descriptor::ComponentDescriptor;
pub use model::source::SourceSnapshot;
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};
pub use version::SpecVersion;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
