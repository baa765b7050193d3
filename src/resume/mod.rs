//! Resume capability for fetch runs
//!
//! Provides the record store, the pagination checkpoint, atomic persistence
//! and an advisory lock per output file.

pub mod atomic;
pub mod checkpoint;
pub mod lock;
pub mod state;
pub mod store;

pub use atomic::{write_atomic, StagedWrite};
pub use checkpoint::Checkpoint;
pub use lock::RunLock;
pub use state::{ResumeError, ResumePaths, ResumeState};
pub use store::{RecordStore, StoreMeta};
