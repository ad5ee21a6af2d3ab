//! Durable stores for the pipeline
//!
//! Three append-only JSONL stores (discovered targets, extracted sections,
//! failed targets) plus the atomically written discovery checkpoint. Each
//! store has exactly one writer at a time; readers load whole files.

mod checkpoint;
mod jsonl;
mod records;

pub use checkpoint::{Checkpoint, FrontierEntry};
pub use jsonl::{JsonlStore, StorageError, StorageResult};
pub use records::{DiscoveredTarget, ErrorKind, FailedTarget, SectionRecord};

/// Store of leaf URLs found during discovery
pub type DiscoveredStore = JsonlStore<DiscoveredTarget>;

/// Store of successfully extracted section records
pub type SectionStore = JsonlStore<SectionRecord>;

/// Store of targets whose extraction terminally failed
pub type FailedStore = JsonlStore<FailedTarget>;
