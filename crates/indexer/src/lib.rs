//! # jsindex indexer
//!
//! Per-container index stores and the job machinery that fills them.
//!
//! ## Pipeline
//!
//! ```text
//! Container
//!     │
//!     ├──> File Contributors
//!     │      └─> Candidate files
//!     │
//!     ├──> Filter Participants (in order)
//!     │      └─> Files to index
//!     │
//!     └──> Per file: cleanup, then Indexers, then Build Participants
//!            ├─> IndexStore entries
//!            └─> ProblemStore diagnostics
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use jsindex_indexer::{IndexJob, IndexRegistry, Locator};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(IndexRegistry::new());
//! let container = Locator::new("file:///path/to/project");
//! let outcome = IndexJob::for_container(Arc::clone(&registry), Some(container)).run();
//! if let Some(report) = outcome.report() {
//!     println!("Indexed {} files", report.files_processed);
//! }
//! ```

mod context;
mod error;
mod job;
mod locator;
mod participant;
mod problems;
mod progress;
mod registry;
mod scheduler;
mod store;
mod watcher;

pub use context::{BuildContext, FileBuildContext};
pub use error::{IndexerError, Result};
pub use job::{
    IndexJob, JobOutcome, JobReport, JobScope, ParticipantFailure, StepOutcome, UNITS_PER_FILE,
};
pub use locator::{FileHandle, FileSource, Locator};
pub use participant::{
    BuildParticipant, FileContributor, FilterParticipant, Indexer, ParseHandle, TreeParser,
};
pub use problems::{Problem, ProblemCategory, ProblemStore, Severity};
pub use progress::{Progress, ProgressListener};
pub use registry::{IndexRegistry, SerializationToken};
pub use scheduler::JobSet;
pub use store::{Entry, IndexStore, KeyPattern, SharedIndex};
pub use watcher::{IndexWatcher, WatchUpdate, WatcherConfig};
