use crate::locator::Locator;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Store handle shared through the registry.
///
/// The mutex only satisfies aliasing rules; writers are serialized by the
/// registry's serialization token, so it is never contended by two jobs.
pub type SharedIndex = Arc<Mutex<IndexStore>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub category: String,
    pub key: String,
    pub value: String,
    pub source: Locator,
}

/// How `IndexStore::query` selects keys.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    Any,
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

impl KeyPattern {
    pub fn exact(key: impl Into<String>) -> Self {
        Self::Exact(key.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    pub fn regex(pattern: &str) -> crate::Result<Self> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => key == expected,
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Self::Regex(re) => re.is_match(key),
        }
    }
}

/// Per-container multimap of category -> key -> entries.
///
/// No internal locking.
#[derive(Debug, Default)]
pub struct IndexStore {
    categories: BTreeMap<String, BTreeMap<String, Vec<Entry>>>,
}

impl IndexStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record. Identical records from the same source are kept once.
    pub fn add_entry(
        &mut self,
        category: &str,
        key: &str,
        value: impl Into<String>,
        source: &Locator,
    ) {
        let entry = Entry {
            category: category.to_string(),
            key: key.to_string(),
            value: value.into(),
            source: source.clone(),
        };

        let bucket = self
            .categories
            .entry(entry.category.clone())
            .or_default()
            .entry(entry.key.clone())
            .or_default();

        if !bucket.contains(&entry) {
            bucket.push(entry);
        }
    }

    #[must_use]
    pub fn query(&self, categories: &[&str], pattern: &KeyPattern) -> Vec<&Entry> {
        let mut out = Vec::new();
        for category in categories {
            let Some(keys) = self.categories.get(*category) else {
                continue;
            };
            match pattern {
                KeyPattern::Exact(key) => {
                    if let Some(entries) = keys.get(key) {
                        out.extend(entries.iter());
                    }
                }
                _ => {
                    for (key, entries) in keys {
                        if pattern.matches(key) {
                            out.extend(entries.iter());
                        }
                    }
                }
            }
        }
        out
    }

    /// Remove every entry produced by `source`, in all categories.
    pub fn remove(&mut self, source: &Locator) -> usize {
        let mut removed = 0;
        for keys in self.categories.values_mut() {
            for entries in keys.values_mut() {
                let before = entries.len();
                entries.retain(|entry| &entry.source != source);
                removed += before - entries.len();
            }
            keys.retain(|_, entries| !entries.is_empty());
        }
        self.categories.retain(|_, keys| !keys.is_empty());
        removed
    }

    #[must_use]
    pub fn entries_for(&self, source: &Locator) -> Vec<&Entry> {
        self.categories
            .values()
            .flat_map(BTreeMap::values)
            .flatten()
            .filter(|entry| &entry.source == source)
            .collect()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
