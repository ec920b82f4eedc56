//! Build passes: project index, document store, commit coordination and the
//! batch driver

pub mod batch;
pub mod bundle;
pub mod cancel;
pub mod coordinator;
pub mod index;
pub mod store;

pub use batch::{Batch, BatchReport, DescriptorReport, DescriptorStatus, UnitReport};
pub use bundle::BundleUpdate;
pub use cancel::CancelToken;
pub use coordinator::{on_store, CommitError, Coordinator, DirectCoordinator, EventLoopCoordinator};
pub use index::{IndexError, IndexSettings, ProjectIndex};
pub use store::{DocumentStore, FsDocumentStore};
