//! Tests for IndexJob orchestration against a private registry

use jsindex_indexer::{
    BuildContext, BuildParticipant, FileContributor, FileHandle, FilterParticipant, IndexJob,
    IndexRegistry, IndexStore, Indexer, IndexerError, JobOutcome, JobSet, KeyPattern, Locator,
    Problem, ProblemCategory, Progress, ProgressListener, Result,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MARKS: &str = "marks";
const CHECKS: ProblemCategory = ProblemCategory::new("test.checks");

fn project() -> Locator {
    Locator::new("mem://project")
}

fn files(names: &[&str]) -> BTreeSet<FileHandle> {
    names
        .iter()
        .map(|name| FileHandle::in_memory(format!("mem://project/{name}").as_str(), "var x = 1;"))
        .collect()
}

fn marked_values(registry: &IndexRegistry) -> Vec<(String, String)> {
    let index = registry.index(&project());
    let store = index.lock().unwrap();
    store
        .query(&[MARKS], &KeyPattern::Any)
        .into_iter()
        .map(|entry| (entry.key.clone(), entry.value.clone()))
        .collect()
}

struct StaticContributor(BTreeSet<FileHandle>);

impl FileContributor for StaticContributor {
    fn files_for(&self, _container: &Locator) -> BTreeSet<FileHandle> {
        self.0.clone()
    }
}

/// Writes `v{version}` under the file name and optionally cancels a job on first call.
#[derive(Default)]
struct VersionedIndexer {
    version: AtomicUsize,
    calls: AtomicUsize,
    cancel_on_call: Mutex<Option<CancellationToken>>,
}

impl Indexer for VersionedIndexer {
    fn name(&self) -> &str {
        "versioned"
    }

    fn index(
        &self,
        context: &dyn BuildContext,
        store: &mut IndexStore,
        progress: &mut Progress,
    ) -> Result<()> {
        progress.begin(100);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let value = format!("v{}", self.version.load(Ordering::SeqCst));
        let key = context.locator().file_name().to_string();
        store.add_entry(MARKS, &key, value, context.locator());
        if let Some(token) = self.cancel_on_call.lock().unwrap().take() {
            token.cancel();
        }
        progress.worked(100);
        Ok(())
    }
}

struct FailingIndexer;

impl Indexer for FailingIndexer {
    fn name(&self) -> &str {
        "failing"
    }

    fn index(&self, context: &dyn BuildContext, _: &mut IndexStore, _: &mut Progress) -> Result<()> {
        Err(IndexerError::parse(context.locator(), "unsupported syntax"))
    }
}

struct PanickingIndexer;

impl Indexer for PanickingIndexer {
    fn name(&self) -> &str {
        "panicking"
    }

    fn index(&self, _: &dyn BuildContext, _: &mut IndexStore, _: &mut Progress) -> Result<()> {
        panic!("indexer exploded");
    }
}

#[derive(Default)]
struct CheckParticipant {
    built: AtomicUsize,
    deleted: AtomicUsize,
}

impl BuildParticipant for CheckParticipant {
    fn name(&self) -> &str {
        "checks"
    }

    fn build_file(&self, context: Option<&dyn BuildContext>, _: &mut Progress) -> Result<()> {
        let Some(context) = context else {
            return Ok(());
        };
        self.built.fetch_add(1, Ordering::SeqCst);
        let problem = Problem::warning(CHECKS, "checked", 1, 0, 1, context.locator().as_str());
        context.put_problems(CHECKS, vec![problem]);
        Ok(())
    }

    fn delete_file(&self, context: Option<&dyn BuildContext>) {
        if let Some(context) = context {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            context.remove_problems(CHECKS);
        }
    }
}

struct DropPrefix(&'static str);

impl FilterParticipant for DropPrefix {
    fn apply_filter(&self, files: BTreeSet<FileHandle>) -> BTreeSet<FileHandle> {
        files
            .into_iter()
            .filter(|file| !file.name().starts_with(self.0))
            .collect()
    }
}

#[derive(Default)]
struct SeenByFilter(Mutex<Vec<String>>);

impl FilterParticipant for SeenByFilter {
    fn apply_filter(&self, files: BTreeSet<FileHandle>) -> BTreeSet<FileHandle> {
        let mut seen = self.0.lock().unwrap();
        seen.extend(files.iter().map(|file| file.name().to_string()));
        files
    }
}

#[derive(Default)]
struct LastProgress(Mutex<(u64, u64)>);

impl ProgressListener for LastProgress {
    fn progress(&self, done: u64, total: u64) {
        *self.0.lock().unwrap() = (done, total);
    }
}

/// Yields the same file names under whichever container is asked for.
struct ContainerFiles(&'static [&'static str]);

impl FileContributor for ContainerFiles {
    fn files_for(&self, container: &Locator) -> BTreeSet<FileHandle> {
        self.0
            .iter()
            .map(|name| FileHandle::in_memory(format!("{container}/{name}").as_str(), "var x = 1;"))
            .collect()
    }
}

/// Records the highest number of index calls running at once.
#[derive(Default)]
struct OverlapTracker {
    live: AtomicUsize,
    max_live: AtomicUsize,
    calls: AtomicUsize,
}

impl Indexer for OverlapTracker {
    fn name(&self) -> &str {
        "overlap"
    }

    fn index(&self, _: &dyn BuildContext, _: &mut IndexStore, _: &mut Progress) -> Result<()> {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn registry_with(names: &[&str]) -> (Arc<IndexRegistry>, Arc<VersionedIndexer>) {
    let registry = Arc::new(IndexRegistry::new());
    let indexer = Arc::new(VersionedIndexer::default());
    registry
        .register_indexer(&["*.js"], Arc::clone(&indexer) as Arc<dyn Indexer>)
        .unwrap();
    registry.add_contributor(Arc::new(StaticContributor(files(names))));
    (registry, indexer)
}

#[test]
fn test_reindex_is_idempotent() {
    let (registry, _) = registry_with(&["a.js", "b.js"]);

    let first = IndexJob::for_container(Arc::clone(&registry), Some(project())).run();
    let after_first = marked_values(&registry);
    let second = IndexJob::for_container(Arc::clone(&registry), Some(project())).run();
    let after_second = marked_values(&registry);

    assert_eq!(after_first, after_second);
    assert_eq!(after_second.len(), 2);
    assert_eq!(first.report().unwrap().entries_removed, 0);
    assert_eq!(second.report().unwrap().entries_removed, 2);
}

#[test]
fn test_cancel_keeps_untouched_files() {
    let (registry, indexer) = registry_with(&["a.js", "b.js", "c.js"]);
    indexer.version.store(1, Ordering::SeqCst);
    IndexJob::for_container(Arc::clone(&registry), Some(project())).run();

    indexer.version.store(2, Ordering::SeqCst);
    let job = IndexJob::for_container(Arc::clone(&registry), Some(project()));
    *indexer.cancel_on_call.lock().unwrap() = Some(job.cancel_token());
    let outcome = job.run();

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.report().unwrap().files_processed, 1);
    assert_eq!(
        marked_values(&registry),
        vec![
            ("a.js".to_string(), "v2".to_string()),
            ("b.js".to_string(), "v1".to_string()),
            ("c.js".to_string(), "v1".to_string()),
        ]
    );
}

#[test]
fn test_failing_participants_do_not_stop_the_job() {
    let (registry, _) = registry_with(&["a.js", "b.js"]);
    registry
        .register_indexer(&["*.js"], Arc::new(FailingIndexer))
        .unwrap();
    registry
        .register_indexer(&["*.js"], Arc::new(PanickingIndexer))
        .unwrap();

    let outcome = IndexJob::for_container(Arc::clone(&registry), Some(project())).run();
    let report = outcome.report().unwrap();

    assert!(matches!(outcome, JobOutcome::Completed(_)));
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.failures.len(), 4);
    assert!(report
        .failures
        .iter()
        .any(|f| f.participant == "panicking" && f.message.contains("indexer exploded")));
    assert_eq!(marked_values(&registry).len(), 2);
}

#[test]
fn test_filters_run_in_order_and_narrow() {
    let (registry, indexer) = registry_with(&["a.js", "b.js", "skip-me.js"]);
    let seen = Arc::new(SeenByFilter::default());
    registry.add_filter(Arc::new(DropPrefix("skip")));
    registry.add_filter(Arc::clone(&seen) as Arc<dyn FilterParticipant>);

    IndexJob::for_container(Arc::clone(&registry), Some(project())).run();

    assert_eq!(*seen.0.lock().unwrap(), vec!["a.js", "b.js"]);
    assert_eq!(indexer.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_files_without_participants_are_skipped() {
    let (registry, indexer) = registry_with(&["a.js", "README.md"]);

    let outcome = IndexJob::for_container(Arc::clone(&registry), Some(project())).run();
    let report = outcome.report().unwrap();

    assert_eq!(report.files_total, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(indexer.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_progress_budget_is_eleven_units_per_file() {
    let (registry, _) = registry_with(&["a.js", "b.js"]);
    registry
        .register_indexer(&["*.js"], Arc::new(FailingIndexer))
        .unwrap();
    let listener = Arc::new(LastProgress::default());

    IndexJob::for_container(Arc::clone(&registry), Some(project()))
        .with_listener(Arc::clone(&listener) as Arc<dyn ProgressListener>)
        .run();

    assert_eq!(*listener.0.lock().unwrap(), (22, 22));
}

#[test]
fn test_removal_clears_entries_and_problems() {
    let (registry, _) = registry_with(&["a.js", "b.js"]);
    let checks = Arc::new(CheckParticipant::default());
    registry
        .register_participant(&["*.js"], Arc::clone(&checks) as Arc<dyn BuildParticipant>)
        .unwrap();

    IndexJob::for_container(Arc::clone(&registry), Some(project())).run();
    assert_eq!(checks.built.load(Ordering::SeqCst), 2);
    assert_eq!(registry.problems().all().len(), 2);

    let outcome =
        IndexJob::for_removal(Arc::clone(&registry), Some(project()), files(&["a.js"])).run();

    assert_eq!(outcome.report().unwrap().entries_removed, 1);
    assert_eq!(checks.deleted.load(Ordering::SeqCst), 1);
    assert_eq!(
        marked_values(&registry),
        vec![("b.js".to_string(), "v0".to_string())]
    );
    let problems = registry.problems().all();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].0.as_str(), "mem://project/b.js");
}

#[test]
fn test_explicit_files_still_pass_filters() {
    let (registry, indexer) = registry_with(&[]);
    registry.add_filter(Arc::new(DropPrefix("skip")));

    let outcome = IndexJob::for_files(
        Arc::clone(&registry),
        Some(project()),
        files(&["skip-me.js"]),
    )
    .run();

    assert!(matches!(outcome, JobOutcome::NothingToDo));
    assert_eq!(indexer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_job_set_joins_by_family() {
    let (registry, _) = registry_with(&["a.js"]);
    let other = Locator::new("mem://other");
    let jobs = JobSet::new();

    jobs.schedule(IndexJob::for_container(Arc::clone(&registry), Some(project())));
    jobs.schedule(IndexJob::for_files(
        Arc::clone(&registry),
        Some(project()),
        files(&["a.js"]),
    ));
    jobs.schedule(IndexJob::for_container(Arc::clone(&registry), Some(other.clone())));

    let family = jobs.join_family(Some(&project())).await;
    assert_eq!(family.len(), 2);
    assert!(family.iter().all(|o| matches!(o, JobOutcome::Completed(_))));

    let rest = jobs.join_all().await;
    assert_eq!(rest.len(), 1);
    assert_eq!(jobs.pending(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_job_cancelled_before_start_touches_nothing() {
    let (registry, indexer) = registry_with(&["a.js", "b.js"]);
    let jobs = JobSet::new();

    let job = IndexJob::for_container(Arc::clone(&registry), Some(project()));
    job.cancel();
    jobs.schedule(job);

    let outcomes = jobs.join_all().await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_cancelled());
    assert_eq!(indexer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unreadable_file_is_reported_and_the_rest_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(IndexRegistry::new());
    let indexer = Arc::new(VersionedIndexer::default());
    registry
        .register_indexer(&["*.js"], Arc::clone(&indexer) as Arc<dyn Indexer>)
        .unwrap();
    let mut handles = files(&["a.js"]);
    handles.insert(FileHandle::on_disk(dir.path().join("missing.js")));
    registry.add_contributor(Arc::new(StaticContributor(handles)));

    let outcome = IndexJob::for_container(Arc::clone(&registry), Some(project())).run();
    let report = outcome.report().unwrap();

    assert_eq!(report.files_total, 2);
    assert_eq!(report.files_processed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].participant, "read");
    assert!(report.failures[0].file.as_str().ends_with("missing.js"));
    assert_eq!(indexer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_jobs_of_different_containers_never_overlap() {
    let registry = Arc::new(IndexRegistry::new());
    let tracker = Arc::new(OverlapTracker::default());
    registry
        .register_indexer(&["*.js"], Arc::clone(&tracker) as Arc<dyn Indexer>)
        .unwrap();
    registry.add_contributor(Arc::new(ContainerFiles(&["a.js", "b.js", "c.js"])));

    let jobs = JobSet::new();
    for container in ["mem://one", "mem://two", "mem://three"] {
        jobs.schedule(IndexJob::for_container(
            Arc::clone(&registry),
            Some(Locator::new(container)),
        ));
    }
    let outcomes = jobs.join_all().await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| matches!(o, JobOutcome::Completed(_))));
    assert_eq!(tracker.calls.load(Ordering::SeqCst), 9);
    assert_eq!(tracker.max_live.load(Ordering::SeqCst), 1);
}
