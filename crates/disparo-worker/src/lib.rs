//! # disparo-worker
//!
//! The paced send-queue engine: one operation drains one queue of contact
//! records, honoring pause/resume/stop at every suspension point and
//! reporting each record's outcome exactly once.

pub mod control;
pub mod dispatcher;
pub mod operation;
pub mod pacing;
pub mod prepare;
pub mod registry;
pub mod sinks;
pub mod snapshot;
pub mod source;

#[cfg(test)]
mod tests;

pub use control::{OperationControl, OperationStatus, StateSnapshot};
pub use dispatcher::Dispatcher;
pub use operation::{OperationParts, RunSummary, SendOperation};
pub use prepare::{prepare_queue, PreparedQueue};
pub use registry::{ProcessRegistry, RegistrySink};
pub use snapshot::{load_latest, OperationSnapshot, SnapshotWriter};
pub use source::MemorySource;
