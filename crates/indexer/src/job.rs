use crate::context::{BuildContext, FileBuildContext};
use crate::error::{IndexerError, Result};
use crate::locator::{FileHandle, Locator};
use crate::participant::{BuildParticipant, Indexer};
use crate::progress::{Progress, ProgressListener};
use crate::registry::IndexRegistry;
use crate::store::{IndexStore, SharedIndex};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Progress units charged per file: one for cleanup, ten shared by its indexers.
pub const UNITS_PER_FILE: u64 = 11;
const CLEANUP_UNITS: u64 = 1;
const INDEXER_UNITS: u64 = 10;

/// Participant name reported when a file's contents cannot be read.
const READ_STEP: &str = "read";

#[derive(Debug, Clone)]
pub enum JobScope {
    /// Files from every registered contributor.
    Container,
    /// An explicit set, still passed through the filters.
    Files(BTreeSet<FileHandle>),
    /// Drop entries and diagnostics of deleted files.
    Remove(BTreeSet<FileHandle>),
}

/// Result of one step of a run, consumed by the job loop.
#[derive(Debug)]
pub enum StepOutcome {
    Completed,
    Skipped,
    Failed(IndexerError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantFailure {
    pub file: Locator,
    pub participant: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
    pub container: Option<Locator>,
    pub files_total: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub entries_removed: usize,
    pub failures: Vec<ParticipantFailure>,
    pub duration_ms: u64,
}

impl JobReport {
    fn record(&mut self, file: &Locator, participant: &str, outcome: StepOutcome) {
        if let StepOutcome::Failed(err) = outcome {
            log::error!("{participant} failed on {file}: {err}");
            self.failures.push(ParticipantFailure {
                file: file.clone(),
                participant: participant.to_string(),
                message: err.to_string(),
            });
        }
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    NothingToDo,
    Completed(JobReport),
    Cancelled(JobReport),
}

impl JobOutcome {
    #[must_use]
    pub const fn report(&self) -> Option<&JobReport> {
        match self {
            Self::NothingToDo => None,
            Self::Completed(report) | Self::Cancelled(report) => Some(report),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

enum RunState {
    Empty,
    Finished,
    Cancelled,
}

/// A unit of indexing work bound to one container.
///
/// Jobs of the same container form a family. Every job holds the registry's
/// serialization token for its whole body, so no two bodies overlap.
pub struct IndexJob {
    name: String,
    container: Option<Locator>,
    scope: JobScope,
    registry: Arc<IndexRegistry>,
    cancel: CancellationToken,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl IndexJob {
    pub fn for_container(registry: Arc<IndexRegistry>, container: Option<Locator>) -> Self {
        Self::new(registry, container, JobScope::Container)
    }

    pub fn for_files(
        registry: Arc<IndexRegistry>,
        container: Option<Locator>,
        files: BTreeSet<FileHandle>,
    ) -> Self {
        Self::new(registry, container, JobScope::Files(files))
    }

    pub fn for_removal(
        registry: Arc<IndexRegistry>,
        container: Option<Locator>,
        files: BTreeSet<FileHandle>,
    ) -> Self {
        Self::new(registry, container, JobScope::Remove(files))
    }

    fn new(registry: Arc<IndexRegistry>, container: Option<Locator>, scope: JobScope) -> Self {
        let name = match &container {
            Some(container) => format!("Indexing {container}"),
            None => "Indexing".to_string(),
        };
        Self {
            name,
            container,
            scope,
            registry,
            cancel: CancellationToken::new(),
            listener: None,
        }
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn container(&self) -> Option<&Locator> {
        self.container.as_ref()
    }

    #[must_use]
    pub const fn scope(&self) -> &JobScope {
        &self.scope
    }

    /// `None` matches only a job without a container.
    #[must_use]
    pub fn belongs_to(&self, family: Option<&Locator>) -> bool {
        match (&self.container, family) {
            (None, None) => true,
            (Some(container), Some(family)) => container == family,
            _ => false,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run on tokio's blocking pool.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<JobOutcome> {
        tokio::task::spawn_blocking(move || self.run())
    }

    /// Run synchronously, blocking until the serialization token is free.
    pub fn run(&self) -> JobOutcome {
        let Some(container) = self.container.as_ref() else {
            log::debug!("{}: no container, nothing to index", self.name);
            return JobOutcome::NothingToDo;
        };

        let _token = self.registry.serialization_token().acquire();
        let started = Instant::now();
        let index = self.registry.index(container);
        let mut report = JobReport {
            container: Some(container.clone()),
            ..JobReport::default()
        };

        let state = match &self.scope {
            JobScope::Container => {
                let files = self.contributed_files(container);
                self.index_files(&index, files, &mut report)
            }
            JobScope::Files(files) => self.index_files(&index, files.clone(), &mut report),
            JobScope::Remove(files) => self.remove_files(&index, files, &mut report),
        };

        #[allow(clippy::cast_possible_truncation)]
        {
            report.duration_ms = started.elapsed().as_millis() as u64;
        }

        match state {
            RunState::Empty => JobOutcome::NothingToDo,
            RunState::Finished => {
                log::info!(
                    "{}: {} of {} files in {}ms ({} failures)",
                    self.name,
                    report.files_processed,
                    report.files_total,
                    report.duration_ms,
                    report.failures.len()
                );
                JobOutcome::Completed(report)
            }
            RunState::Cancelled => {
                log::info!(
                    "{}: cancelled after {} of {} files",
                    self.name,
                    report.files_processed,
                    report.files_total
                );
                JobOutcome::Cancelled(report)
            }
        }
    }

    fn contributed_files(&self, container: &Locator) -> BTreeSet<FileHandle> {
        let mut files = BTreeSet::new();
        for contributor in self.registry.file_contributors() {
            files.extend(contributor.files_for(container));
        }
        files
    }

    fn filter_files(&self, mut files: BTreeSet<FileHandle>) -> BTreeSet<FileHandle> {
        if files.is_empty() {
            return files;
        }
        for filter in self.registry.filter_participants() {
            files = filter.apply_filter(files);
        }
        files
    }

    fn index_files(
        &self,
        index: &SharedIndex,
        files: BTreeSet<FileHandle>,
        report: &mut JobReport,
    ) -> RunState {
        let files = self.filter_files(files);
        if files.is_empty() {
            return RunState::Empty;
        }

        report.files_total = files.len();
        let mut remaining = files.len() as u64;
        let mut progress = Progress::root(self.listener.clone(), remaining * UNITS_PER_FILE);

        for file in &files {
            match self.index_file(index, file, &mut progress, report) {
                StepOutcome::Completed => report.files_processed += 1,
                StepOutcome::Skipped => {
                    report.files_processed += 1;
                    report.files_skipped += 1;
                }
                failed @ StepOutcome::Failed(_) => report.record(file.locator(), READ_STEP, failed),
                StepOutcome::Cancelled => return RunState::Cancelled,
            }
            remaining -= 1;
            progress.set_work_remaining(remaining * UNITS_PER_FILE);
        }

        RunState::Finished
    }

    fn index_file(
        &self,
        index: &SharedIndex,
        file: &FileHandle,
        progress: &mut Progress,
        report: &mut JobReport,
    ) -> StepOutcome {
        if self.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        progress.task(file.locator().as_str());

        let mut store = index.lock().unwrap_or_else(PoisonError::into_inner);
        report.entries_removed += store.remove(file.locator());
        progress.worked(CLEANUP_UNITS);

        let indexers = self.registry.indexers_for(file.name());
        let participants = self.registry.participants_for(file.name());
        if indexers.is_empty() && participants.is_empty() {
            return StepOutcome::Skipped;
        }

        let context = self.context_for(file);
        if let Err(err) = context.contents() {
            return StepOutcome::Failed(err);
        }

        if !indexers.is_empty() {
            let work = INDEXER_UNITS / indexers.len() as u64;
            for indexer in &indexers {
                if self.is_cancelled() {
                    return StepOutcome::Cancelled;
                }
                let mut slice = progress.child(work);
                let outcome = run_indexer(indexer.as_ref(), &context, &mut store, &mut slice);
                report.record(file.locator(), indexer.name(), outcome);
            }
        }

        for participant in &participants {
            if self.is_cancelled() {
                return StepOutcome::Cancelled;
            }
            let mut slice = progress.child(0);
            let outcome = run_participant(participant.as_ref(), &context, &mut slice);
            report.record(file.locator(), participant.name(), outcome);
        }

        StepOutcome::Completed
    }

    fn remove_files(
        &self,
        index: &SharedIndex,
        files: &BTreeSet<FileHandle>,
        report: &mut JobReport,
    ) -> RunState {
        if files.is_empty() {
            return RunState::Empty;
        }
        report.files_total = files.len();

        for file in files {
            if self.is_cancelled() {
                return RunState::Cancelled;
            }
            {
                let mut store = index.lock().unwrap_or_else(PoisonError::into_inner);
                report.entries_removed += store.remove(file.locator());
            }

            let participants = self.registry.participants_for(file.name());
            if !participants.is_empty() {
                let context = self.context_for(file);
                for participant in &participants {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        participant.delete_file(Some(&context as &dyn BuildContext));
                        Ok::<(), IndexerError>(())
                    }));
                    let outcome = settle(participant.name(), result);
                    report.record(file.locator(), participant.name(), outcome);
                }
            }
            report.files_processed += 1;
        }

        RunState::Finished
    }

    fn context_for(&self, file: &FileHandle) -> FileBuildContext {
        FileBuildContext::new(
            file.clone(),
            self.registry.parser_for(file.name()),
            self.registry.problems(),
        )
    }
}

fn run_indexer(
    indexer: &dyn Indexer,
    context: &dyn BuildContext,
    store: &mut IndexStore,
    progress: &mut Progress,
) -> StepOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| indexer.index(context, store, progress)));
    settle(indexer.name(), result)
}

fn run_participant(
    participant: &dyn BuildParticipant,
    context: &dyn BuildContext,
    progress: &mut Progress,
) -> StepOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        participant.build_file(Some(context), progress)
    }));
    settle(participant.name(), result)
}

fn settle(participant: &str, result: std::thread::Result<Result<()>>) -> StepOutcome {
    match result {
        Ok(Ok(())) => StepOutcome::Completed,
        Ok(Err(err)) => StepOutcome::Failed(err),
        Err(payload) => StepOutcome::Failed(IndexerError::Panicked {
            participant: participant.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_membership() {
        let registry = Arc::new(IndexRegistry::new());
        let project = Locator::new("file:///project");
        let other = Locator::new("file:///other");

        let job = IndexJob::for_container(Arc::clone(&registry), Some(project.clone()));
        assert!(job.belongs_to(Some(&project)));
        assert!(!job.belongs_to(Some(&other)));
        assert!(!job.belongs_to(None));

        let orphan = IndexJob::for_container(registry, None);
        assert!(orphan.belongs_to(None));
        assert!(!orphan.belongs_to(Some(&project)));
    }

    #[test]
    fn job_without_container_does_nothing() {
        let registry = Arc::new(IndexRegistry::new());
        let outcome = IndexJob::for_container(registry, None).run();
        assert!(matches!(outcome, JobOutcome::NothingToDo));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let result = panic::catch_unwind(|| -> Result<()> { panic!("boom") });
        match settle("p", result) {
            StepOutcome::Failed(IndexerError::Panicked { message, .. }) => {
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
