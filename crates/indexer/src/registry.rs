use crate::error::Result;
use crate::locator::Locator;
use crate::participant::{BuildParticipant, FileContributor, FilterParticipant, Indexer, TreeParser};
use crate::problems::ProblemStore;
use crate::store::{IndexStore, SharedIndex};
use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

static GLOBAL_REGISTRY: Lazy<Arc<IndexRegistry>> = Lazy::new(|| Arc::new(IndexRegistry::new()));

/// The one lock every index job holds while it runs.
#[derive(Debug, Default)]
pub struct SerializationToken {
    lock: Mutex<()>,
}

impl SerializationToken {
    /// Block until no other job holds the token.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        match self.lock.try_lock() {
            Ok(guard) => Some(guard),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(std::sync::TryLockError::WouldBlock) => None,
        }
    }
}

struct Registered<T: ?Sized> {
    patterns: GlobSet,
    item: Arc<T>,
}

impl<T: ?Sized> Registered<T> {
    fn new(patterns: &[&str], item: Arc<T>) -> Result<Self> {
        Ok(Self {
            patterns: build_globset(patterns)?,
            item,
        })
    }

    fn matches(&self, file_name: &str) -> bool {
        self.patterns.is_match(file_name)
    }
}

/// Process-wide owner of index stores and participant registrations.
#[derive(Default)]
pub struct IndexRegistry {
    indexes: Mutex<HashMap<Locator, SharedIndex>>,
    indexers: RwLock<Vec<Registered<dyn Indexer>>>,
    participants: RwLock<Vec<Registered<dyn BuildParticipant>>>,
    parsers: RwLock<Vec<Registered<dyn TreeParser>>>,
    filters: RwLock<Vec<Arc<dyn FilterParticipant>>>,
    contributors: RwLock<Vec<Arc<dyn FileContributor>>>,
    problems: Arc<ProblemStore>,
    token: SerializationToken,
}

impl IndexRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily created registry shared by the whole process.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Cached store for `container`, created on first request.
    pub fn index(&self, container: &Locator) -> SharedIndex {
        let mut indexes = self.indexes.lock().unwrap_or_else(PoisonError::into_inner);
        let index = indexes.entry(container.clone()).or_insert_with(|| {
            log::debug!("Creating index for {container}");
            Arc::new(Mutex::new(IndexStore::new()))
        });
        Arc::clone(index)
    }

    pub fn remove_index(&self, container: &Locator) -> bool {
        let mut indexes = self.indexes.lock().unwrap_or_else(PoisonError::into_inner);
        indexes.remove(container).is_some()
    }

    #[must_use]
    pub fn has_index(&self, container: &Locator) -> bool {
        let indexes = self.indexes.lock().unwrap_or_else(PoisonError::into_inner);
        indexes.contains_key(container)
    }

    /// Register an indexer for file names matching any of `patterns` (e.g. `*.js`).
    pub fn register_indexer(&self, patterns: &[&str], indexer: Arc<dyn Indexer>) -> Result<()> {
        let registered = Registered::new(patterns, indexer)?;
        write(&self.indexers).push(registered);
        Ok(())
    }

    pub fn register_participant(
        &self,
        patterns: &[&str],
        participant: Arc<dyn BuildParticipant>,
    ) -> Result<()> {
        let registered = Registered::new(patterns, participant)?;
        write(&self.participants).push(registered);
        Ok(())
    }

    pub fn register_parser(&self, patterns: &[&str], parser: Arc<dyn TreeParser>) -> Result<()> {
        let registered = Registered::new(patterns, parser)?;
        write(&self.parsers).push(registered);
        Ok(())
    }

    pub fn add_filter(&self, filter: Arc<dyn FilterParticipant>) {
        write(&self.filters).push(filter);
    }

    pub fn add_contributor(&self, contributor: Arc<dyn FileContributor>) {
        write(&self.contributors).push(contributor);
    }

    /// Indexers applicable to `file_name`, in registration order.
    #[must_use]
    pub fn indexers_for(&self, file_name: &str) -> Vec<Arc<dyn Indexer>> {
        matching(&self.indexers, file_name)
    }

    #[must_use]
    pub fn participants_for(&self, file_name: &str) -> Vec<Arc<dyn BuildParticipant>> {
        matching(&self.participants, file_name)
    }

    #[must_use]
    pub fn parser_for(&self, file_name: &str) -> Option<Arc<dyn TreeParser>> {
        read(&self.parsers)
            .iter()
            .find(|registered| registered.matches(file_name))
            .map(|registered| Arc::clone(&registered.item))
    }

    /// Whether any indexer or participant would look at `file_name`.
    #[must_use]
    pub fn handles_file(&self, file_name: &str) -> bool {
        read(&self.indexers).iter().any(|r| r.matches(file_name))
            || read(&self.participants).iter().any(|r| r.matches(file_name))
    }

    #[must_use]
    pub fn filter_participants(&self) -> Vec<Arc<dyn FilterParticipant>> {
        read(&self.filters).clone()
    }

    #[must_use]
    pub fn file_contributors(&self) -> Vec<Arc<dyn FileContributor>> {
        read(&self.contributors).clone()
    }

    #[must_use]
    pub fn problems(&self) -> Arc<ProblemStore> {
        Arc::clone(&self.problems)
    }

    #[must_use]
    pub const fn serialization_token(&self) -> &SerializationToken {
        &self.token
    }
}

fn matching<T: ?Sized>(registrations: &RwLock<Vec<Registered<T>>>, file_name: &str) -> Vec<Arc<T>> {
    read(registrations)
        .iter()
        .filter(|registered| registered.matches(file_name))
        .map(|registered| Arc::clone(&registered.item))
        .collect()
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildContext;
    use crate::progress::Progress;

    struct Named(&'static str);

    impl Indexer for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn index(
            &self,
            _context: &dyn BuildContext,
            _store: &mut IndexStore,
            _progress: &mut Progress,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn index_is_identity_stable_until_removed() {
        let registry = IndexRegistry::new();
        let container = Locator::new("file:///project");

        let first = registry.index(&container);
        let second = registry.index(&container);
        assert!(Arc::ptr_eq(&first, &second));

        assert!(registry.remove_index(&container));
        let third = registry.index(&container);
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn indexers_match_by_file_name_in_registration_order() {
        let registry = IndexRegistry::new();
        registry
            .register_indexer(&["*.js"], Arc::new(Named("first")))
            .unwrap();
        registry
            .register_indexer(&["*.jsca", "*.js"], Arc::new(Named("second")))
            .unwrap();
        registry
            .register_indexer(&["*.css"], Arc::new(Named("css")))
            .unwrap();

        let names: Vec<String> = registry
            .indexers_for("app.js")
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(registry.indexers_for("README.md").is_empty());
        assert!(registry.handles_file("site.css"));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let registry = IndexRegistry::new();
        assert!(registry
            .register_indexer(&["*.{js"], Arc::new(Named("broken")))
            .is_err());
    }

    #[test]
    fn token_is_exclusive() {
        let registry = IndexRegistry::new();
        let guard = registry.serialization_token().acquire();
        assert!(registry.serialization_token().try_acquire().is_none());
        drop(guard);
        assert!(registry.serialization_token().try_acquire().is_some());
    }
}
