//! Contracts implemented by pluggable indexing participants.

use crate::context::BuildContext;
use crate::error::Result;
use crate::locator::{FileHandle, Locator};
use crate::progress::Progress;
use crate::store::IndexStore;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Opaque parsed tree. Consumers downcast to the concrete type their parser produces.
pub type ParseHandle = Arc<dyn Any + Send + Sync>;

/// Extracts index entries from one file.
///
/// Entries must be keyed to `context.locator()`. Errors are returned to the
/// job, which logs them and moves on to the next participant.
pub trait Indexer: Send + Sync {
    fn name(&self) -> &str;

    fn index(
        &self,
        context: &dyn BuildContext,
        store: &mut IndexStore,
        progress: &mut Progress,
    ) -> Result<()>;
}

/// Produces diagnostics of one category for a file.
pub trait BuildParticipant: Send + Sync {
    fn name(&self) -> &str;

    /// Replace this participant's problems for the file. No-op without a context.
    fn build_file(&self, context: Option<&dyn BuildContext>, progress: &mut Progress) -> Result<()>;

    /// Clear this participant's problems for the file. No-op without a context.
    fn delete_file(&self, context: Option<&dyn BuildContext>);
}

pub trait FileContributor: Send + Sync {
    fn files_for(&self, container: &Locator) -> BTreeSet<FileHandle>;
}

/// One stage of the filter pipeline; returns the narrowed set.
pub trait FilterParticipant: Send + Sync {
    fn apply_filter(&self, files: BTreeSet<FileHandle>) -> BTreeSet<FileHandle>;
}

pub trait TreeParser: Send + Sync {
    fn parse(&self, locator: &Locator, text: &str) -> Result<ParseHandle>;
}
