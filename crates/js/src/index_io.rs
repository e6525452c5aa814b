//! Reading and writing JavaScript records in an [`IndexStore`].

use crate::model::{PropertyElement, TypeElement, WINDOW_TYPE};
use jsindex_indexer::{Entry, IndexStore, KeyPattern, Locator, Result};
use std::collections::BTreeSet;

pub const TYPE_CATEGORY: &str = "type";
pub const REQUIRE_CATEGORY: &str = "require";

#[derive(Debug, Default, Clone, Copy)]
pub struct JsIndexWriter;

impl JsIndexWriter {
    /// Store `ty` under its name, tagged with `location`.
    pub fn write_type(self, store: &mut IndexStore, ty: &TypeElement, location: &Locator) -> Result<()> {
        let value = serde_json::to_string(ty)?;
        store.add_entry(TYPE_CATEGORY, &ty.name, value, location);
        Ok(())
    }

    /// Store the module paths `location` requires. Empty sets are not written.
    pub fn write_requires(
        self,
        store: &mut IndexStore,
        paths: &BTreeSet<String>,
        location: &Locator,
    ) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let value = serde_json::to_string(paths)?;
        store.add_entry(REQUIRE_CATEGORY, location.as_str(), value, location);
        Ok(())
    }
}

/// Read side over one store. Undecodable records are logged and skipped.
pub struct JsIndexQuery<'a> {
    store: &'a IndexStore,
}

impl<'a> JsIndexQuery<'a> {
    #[must_use]
    pub const fn new(store: &'a IndexStore) -> Self {
        Self { store }
    }

    /// Every stored type named `name`, one per contributing file.
    #[must_use]
    pub fn types(&self, name: &str) -> Vec<(Locator, TypeElement)> {
        self.store
            .query(&[TYPE_CATEGORY], &KeyPattern::exact(name))
            .into_iter()
            .filter_map(|entry| decode_type(entry).map(|ty| (entry.source.clone(), ty)))
            .collect()
    }

    /// Properties of every stored type whose name is in `names`, in order.
    #[must_use]
    pub fn type_members(&self, names: &[String]) -> Vec<PropertyElement> {
        names
            .iter()
            .flat_map(|name| self.types(name))
            .flat_map(|(_, ty)| ty.properties)
            .collect()
    }

    /// Global-scope properties contributed by each file.
    #[must_use]
    pub fn globals(&self) -> Vec<(Locator, PropertyElement)> {
        self.types(WINDOW_TYPE)
            .into_iter()
            .flat_map(|(source, ty)| {
                ty.properties
                    .into_iter()
                    .map(move |property| (source.clone(), property))
            })
            .collect()
    }

    #[must_use]
    pub fn requires(&self, file: &Locator) -> BTreeSet<String> {
        self.store
            .query(&[REQUIRE_CATEGORY], &KeyPattern::exact(file.as_str()))
            .into_iter()
            .filter_map(|entry| match serde_json::from_str::<BTreeSet<String>>(&entry.value) {
                Ok(paths) => Some(paths),
                Err(err) => {
                    log::warn!("Skipping unreadable require entry for {}: {err}", entry.key);
                    None
                }
            })
            .flatten()
            .collect()
    }
}

fn decode_type(entry: &Entry) -> Option<TypeElement> {
    match serde_json::from_str(&entry.value) {
        Ok(ty) => Some(ty),
        Err(err) => {
            log::warn!("Skipping unreadable type entry {} from {}: {err}", entry.key, entry.source);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn globals_keep_their_source() {
        let mut store = IndexStore::new();
        let a = Locator::new("mem://a.js");
        let b = Locator::new("mem://b.js");

        let mut first = TypeElement::new(WINDOW_TYPE);
        first.add_property(PropertyElement::new("one", vec!["Number".into()]));
        let mut second = TypeElement::new(WINDOW_TYPE);
        second.add_property(PropertyElement::new("two", vec!["String".into()]));

        JsIndexWriter.write_type(&mut store, &first, &a).unwrap();
        JsIndexWriter.write_type(&mut store, &second, &b).unwrap();

        let globals: Vec<(String, String)> = JsIndexQuery::new(&store)
            .globals()
            .into_iter()
            .map(|(source, p)| (source.to_string(), p.name))
            .collect();
        assert_eq!(
            globals,
            vec![
                ("mem://a.js".to_string(), "one".to_string()),
                ("mem://b.js".to_string(), "two".to_string()),
            ]
        );
    }

    #[test]
    fn empty_requires_are_not_written() {
        let mut store = IndexStore::new();
        let file = Locator::new("mem://a.js");
        JsIndexWriter
            .write_requires(&mut store, &BTreeSet::new(), &file)
            .unwrap();
        assert!(store.is_empty());

        let paths: BTreeSet<String> = ["./b".to_string()].into_iter().collect();
        JsIndexWriter.write_requires(&mut store, &paths, &file).unwrap();
        assert_eq!(JsIndexQuery::new(&store).requires(&file), paths);
    }

    #[test]
    fn garbage_entries_are_skipped() {
        let mut store = IndexStore::new();
        store.add_entry(TYPE_CATEGORY, WINDOW_TYPE, "not json", &Locator::new("mem://x.js"));
        assert!(JsIndexQuery::new(&store).types(WINDOW_TYPE).is_empty());
    }
}
