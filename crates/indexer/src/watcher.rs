use crate::error::{IndexerError, Result};
use crate::job::{IndexJob, JobOutcome};
use crate::locator::{FileHandle, Locator};
use crate::registry::IndexRegistry;
use log::{error, info, warn};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{broadcast, mpsc};
use tokio::time;

#[derive(Debug, Clone)]
pub struct WatchUpdate {
    pub completed_at: SystemTime,
    pub duration_ms: u64,
    pub indexed: usize,
    pub removed: usize,
    pub failures: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub debounce: Duration,
    pub max_batch_wait: Duration,
    pub notify_poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            max_batch_wait: Duration::from_secs(3),
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Keeps one container's index current by re-running jobs for changed files.
#[derive(Clone)]
pub struct IndexWatcher {
    inner: Arc<IndexWatcherInner>,
}

struct IndexWatcherInner {
    command_tx: mpsc::Sender<WatcherCommand>,
    update_tx: broadcast::Sender<WatchUpdate>,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

enum WatcherCommand {
    Shutdown,
}

impl IndexWatcher {
    /// Watch `root` recursively. Must be called inside a tokio runtime.
    pub fn start(
        registry: Arc<IndexRegistry>,
        container: Locator,
        root: impl AsRef<Path>,
        config: WatcherConfig,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (command_tx, command_rx) = mpsc::channel(4);
        let (update_tx, _) = broadcast::channel(32);

        let watcher = create_fs_watcher(&root, event_tx, config.notify_poll_interval)?;

        spawn_watch_loop(
            registry,
            container,
            root,
            config,
            event_rx,
            command_rx,
            update_tx.clone(),
        );

        Ok(Self {
            inner: Arc::new(IndexWatcherInner {
                command_tx,
                update_tx,
                _watcher: std::sync::Mutex::new(Some(watcher)),
            }),
        })
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<WatchUpdate> {
        self.inner.update_tx.subscribe()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.inner
            .command_tx
            .send(WatcherCommand::Shutdown)
            .await
            .map_err(|e| IndexerError::Other(format!("failed to stop watcher: {e}")))
    }
}

impl Drop for IndexWatcher {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
    poll_interval: Duration,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(poll_interval),
    )
    .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| IndexerError::Other(format!("failed to watch {}: {e}", root.display())))?;
    Ok(watcher)
}

fn spawn_watch_loop(
    registry: Arc<IndexRegistry>,
    container: Locator,
    root: PathBuf,
    config: WatcherConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    update_tx: broadcast::Sender<WatchUpdate>,
) {
    tokio::spawn(async move {
        let mut state = DebounceState::new(config.debounce, config.max_batch_wait);

        loop {
            let next_deadline = state.next_deadline();

            tokio::select! {
                Some(event) = event_rx.recv() => {
                    handle_event(&registry, &root, event, &mut state);
                }
                Some(cmd) = command_rx.recv() => {
                    match cmd {
                        WatcherCommand::Shutdown => break,
                    }
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if next_deadline.is_some() => {
                    let (changed, removed) = state.take();
                    let update = run_cycle(Arc::clone(&registry), &container, changed, removed).await;
                    let _ = update_tx.send(update);
                }
                else => break,
            }
        }
        info!("Stopped watching {}", root.display());
    });
}

async fn run_cycle(
    registry: Arc<IndexRegistry>,
    container: &Locator,
    changed: Vec<PathBuf>,
    removed: Vec<PathBuf>,
) -> WatchUpdate {
    let started = Instant::now();
    let mut update = WatchUpdate {
        completed_at: SystemTime::now(),
        duration_ms: 0,
        indexed: 0,
        removed: 0,
        failures: 0,
        cancelled: false,
    };

    let jobs = [
        (removed, true),
        (changed, false),
    ];
    for (paths, removal) in jobs {
        if paths.is_empty() {
            continue;
        }
        let files: BTreeSet<FileHandle> = paths.into_iter().map(FileHandle::on_disk).collect();
        let job = if removal {
            IndexJob::for_removal(Arc::clone(&registry), Some(container.clone()), files)
        } else {
            IndexJob::for_files(Arc::clone(&registry), Some(container.clone()), files)
        };

        match Arc::new(job).spawn().await {
            Ok(outcome) => {
                if let Some(report) = outcome.report() {
                    if removal {
                        update.removed += report.files_processed;
                    } else {
                        update.indexed += report.files_processed;
                    }
                    update.failures += report.failures.len();
                }
                update.cancelled |= matches!(outcome, JobOutcome::Cancelled(_));
            }
            Err(err) => error!("Watcher index cycle failed: {err}"),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    {
        update.duration_ms = started.elapsed().as_millis() as u64;
    }
    update.completed_at = SystemTime::now();
    info!(
        "Watcher cycle for {container}: {} indexed, {} removed in {}ms",
        update.indexed, update.removed, update.duration_ms
    );
    update
}

fn handle_event(
    registry: &IndexRegistry,
    root: &Path,
    event: notify::Result<Event>,
    state: &mut DebounceState,
) {
    match event {
        Ok(evt) => {
            if matches!(evt.kind, EventKind::Access(_)) {
                return;
            }
            for path in evt.paths {
                if !is_relevant_path(root, &path) {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !registry.handles_file(name) {
                    continue;
                }
                let change = if path.exists() {
                    Change::Changed
                } else {
                    Change::Removed
                };
                state.record(path, change);
            }
        }
        Err(err) => warn!("Watcher error: {err}"),
    }
}

fn is_relevant_path(root: &Path, path: &Path) -> bool {
    const IGNORED: &[&str] = &[".git", ".hg", ".svn", "node_modules", "target"];

    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };
    !relative.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        IGNORED.iter().any(|ignored| name == *ignored)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Changed,
    Removed,
}

struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    pending: BTreeMap<PathBuf, Change>,
    last_event: Option<Instant>,
    first_event: Option<Instant>,
}

impl DebounceState {
    const fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            pending: BTreeMap::new(),
            last_event: None,
            first_event: None,
        }
    }

    fn record(&mut self, path: PathBuf, change: Change) {
        self.pending.insert(path, change);
        self.last_event = Some(Instant::now());
        self.first_event.get_or_insert_with(Instant::now);
    }

    fn next_deadline(&self) -> Option<time::Instant> {
        if self.pending.is_empty() {
            return None;
        }

        let mut deadline = self.last_event.map(|last| last + self.debounce);
        if let Some(first) = self.first_event {
            let forced = first + self.max_batch;
            deadline = Some(match deadline {
                Some(current) if forced < current => forced,
                Some(current) => current,
                None => forced,
            });
        }

        deadline.map(time::Instant::from_std)
    }

    /// Drain pending paths as (changed, removed).
    fn take(&mut self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut changed = Vec::new();
        let mut removed = Vec::new();
        for (path, change) in std::mem::take(&mut self.pending) {
            match change {
                Change::Changed => changed.push(path),
                Change::Removed => removed.push(path),
            }
        }
        self.last_event = None;
        self.first_event = None;
        (changed, removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_generates_deadline() {
        let mut state = DebounceState::new(Duration::from_millis(100), Duration::from_secs(1));
        assert!(state.next_deadline().is_none());
        state.record(PathBuf::from("/p/a.js"), Change::Changed);
        assert!(state.next_deadline().is_some());
    }

    #[test]
    fn latest_change_wins_and_take_resets() {
        let mut state = DebounceState::new(Duration::from_millis(100), Duration::from_secs(1));
        state.record(PathBuf::from("/p/a.js"), Change::Changed);
        state.record(PathBuf::from("/p/b.js"), Change::Changed);
        state.record(PathBuf::from("/p/a.js"), Change::Removed);

        let (changed, removed) = state.take();
        assert_eq!(changed, vec![PathBuf::from("/p/b.js")]);
        assert_eq!(removed, vec![PathBuf::from("/p/a.js")]);
        assert!(state.next_deadline().is_none());
    }

    struct NameIndexer;

    impl crate::participant::Indexer for NameIndexer {
        fn name(&self) -> &str {
            "names"
        }

        fn index(
            &self,
            context: &dyn crate::context::BuildContext,
            store: &mut crate::store::IndexStore,
            _progress: &mut crate::progress::Progress,
        ) -> Result<()> {
            let text = context.contents()?;
            store.add_entry("name", context.locator().file_name(), text.trim(), context.locator());
            Ok(())
        }
    }

    #[tokio::test]
    async fn cycle_indexes_changes_then_removals() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.js");
        std::fs::write(&file, "first").unwrap();

        let registry = Arc::new(IndexRegistry::new());
        registry.register_indexer(&["*.js"], Arc::new(NameIndexer)).unwrap();
        let container = Locator::from_path(dir.path());

        let update = run_cycle(Arc::clone(&registry), &container, vec![file.clone()], Vec::new()).await;
        assert_eq!((update.indexed, update.removed, update.failures), (1, 0, 0));
        assert_eq!(registry.index(&container).lock().unwrap().len(), 1);

        std::fs::remove_file(&file).unwrap();
        let update = run_cycle(Arc::clone(&registry), &container, Vec::new(), vec![file]).await;
        assert_eq!((update.indexed, update.removed), (0, 1));
        assert!(registry.index(&container).lock().unwrap().is_empty());
    }

    #[test]
    fn vendored_directories_are_ignored() {
        let root = Path::new("/p");
        assert!(is_relevant_path(root, Path::new("/p/src/app.js")));
        assert!(!is_relevant_path(root, Path::new("/p/node_modules/x/index.js")));
        assert!(!is_relevant_path(root, Path::new("/p/.git/HEAD")));
    }
}
