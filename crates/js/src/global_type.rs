//! The `Window` type each file contributes to the global scope.

use crate::ast::{self, strip_quotes, Node, NodeKind};
use crate::index_io::{JsIndexQuery, JsIndexWriter};
use crate::infer::TypeInferrer;
use crate::model::{PropertyElement, TypeElement, GLOBAL_TYPE, WINDOW_TYPE};
use crate::parser::ParsedScript;
use crate::scope::{Scope, GLOBAL_OBJECT};
use jsindex_indexer::{BuildContext, IndexStore, Indexer, Locator, Progress, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Log target for per-step tracing.
pub const INDEXING_STEPS: &str = "jsindex::indexing";

/// Synthesizes one `Window` (parent `Global`) per file from its global scope,
/// assignments to `window`, and assignments inside self-invoking functions.
/// Also records the modules the file `require`s.
pub struct GlobalTypeExtractor {
    inferrer: Arc<dyn TypeInferrer>,
    user_agents: Vec<String>,
}

impl GlobalTypeExtractor {
    pub fn new(inferrer: Arc<dyn TypeInferrer>, user_agents: Vec<String>) -> Self {
        Self {
            inferrer,
            user_agents,
        }
    }

    pub fn extract(
        &self,
        script: &ParsedScript,
        store: &mut IndexStore,
        location: &Locator,
        progress: &mut Progress,
    ) -> Result<()> {
        log::trace!(target: INDEXING_STEPS, "Building symbol tables for file '{location}'");

        if let Some(globals) = &script.globals {
            let window = self.window_type(globals, &script.root, store, location);
            log::trace!(
                target: INDEXING_STEPS,
                "Writing {} global properties for file '{location}'",
                window.properties.len()
            );
            JsIndexWriter.write_type(store, &window, location)?;
        }
        progress.worked(80);

        let paths = required_paths(&script.root);
        JsIndexWriter.write_requires(store, &paths, location)?;
        progress.worked(20);
        Ok(())
    }

    fn window_type(
        &self,
        globals: &Scope,
        root: &Node,
        store: &mut IndexStore,
        location: &Locator,
    ) -> TypeElement {
        let mut window = TypeElement::new(WINDOW_TYPE);
        window.add_parent_type(GLOBAL_TYPE);

        log::trace!(
            target: INDEXING_STEPS,
            "Processing globally declared variables and functions in file '{location}'"
        );
        for property in self.inferrer.scope_properties(&[globals], store, location) {
            window.add_property(property);
        }

        log::trace!(target: INDEXING_STEPS, "Processing assignments to 'window' in file '{location}'");
        for property in self.window_assignments(&[globals], store, location) {
            window.add_property(property);
        }

        log::trace!(
            target: INDEXING_STEPS,
            "Processing assignments to 'window' within self-invoking function literals in file '{location}'"
        );
        for property in self.lambda_assignments(root, globals, store, location) {
            window.add_property(property);
        }

        log::trace!(target: INDEXING_STEPS, "Assigning user agents to properties in file '{location}'");
        for property in &mut window.properties {
            property.set_has_all_user_agents(&self.user_agents);
        }

        window
    }

    /// Members assigned to the global object local to `chain[0]`.
    fn window_assignments(
        &self,
        chain: &[&Scope],
        store: &mut IndexStore,
        location: &Locator,
    ) -> Vec<PropertyElement> {
        let Some(scope) = chain.first() else {
            return Vec::new();
        };
        if !scope.has_local_symbol(GLOBAL_OBJECT) {
            return Vec::new();
        }
        let types = self.inferrer.symbol_types(chain, GLOBAL_OBJECT, store, location);
        JsIndexQuery::new(store).type_members(&types)
    }

    fn lambda_assignments(
        &self,
        node: &Node,
        globals: &Scope,
        store: &mut IndexStore,
        location: &Locator,
    ) -> Vec<PropertyElement> {
        let functions = match ast::self_invoked_functions(node) {
            Ok(functions) => functions,
            Err(err) => {
                log::error!("Self-invoking function search failed in {location}: {err}");
                return Vec::new();
            }
        };

        let mut properties = Vec::new();
        for function in functions {
            let offset = function.body().map_or(function.start, |body| body.start);
            let chain = globals.chain_at_offset(offset);
            properties.extend(self.window_assignments(&chain, store, location));
            properties.extend(self.lambda_assignments(function, globals, store, location));
        }
        properties
    }
}

impl Indexer for GlobalTypeExtractor {
    fn name(&self) -> &str {
        "js.global-type"
    }

    fn index(
        &self,
        context: &dyn BuildContext,
        store: &mut IndexStore,
        progress: &mut Progress,
    ) -> Result<()> {
        progress.begin(100);
        let location = context.locator();
        progress.task(location.as_str());

        let Some(handle) = context.parsed_tree() else {
            log::debug!("No parsed tree for {location}, skipping global types");
            return Ok(());
        };
        let Some(script) = handle.downcast_ref::<ParsedScript>() else {
            log::debug!("Parsed tree for {location} is not a script, skipping global types");
            return Ok(());
        };

        self.extract(script, store, location, progress)
    }
}

/// Quoted first arguments of `require(...)` calls, quotes stripped.
fn required_paths(root: &Node) -> BTreeSet<String> {
    let invocations = match ast::require_invocations(root) {
        Ok(invocations) => invocations,
        Err(err) => {
            log::error!("require() search failed: {err}");
            return BTreeSet::new();
        }
    };

    invocations
        .into_iter()
        .filter_map(|invocation| invocation.arguments()?.first_child())
        .filter_map(|argument| match &argument.kind {
            NodeKind::Str(text) if text.chars().count() >= 2 => {
                Some(strip_quotes(text).to_string())
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JsParser;

    #[test]
    fn require_paths_skip_non_literals() {
        let script = JsParser::new()
            .parse_script("require('./a'); require(name); require(); require(`./t`); x.require('./n');")
            .unwrap();
        let paths: Vec<String> = required_paths(&script.root).into_iter().collect();
        assert_eq!(paths, vec!["./a"]);
    }

    #[test]
    fn deeply_nested_literal_keeps_other_requires() {
        let depth = ast::MAX_LOWER_DEPTH * 3;
        let source = format!(
            "require('./top');\nvar deep = {}{};\n",
            "[".repeat(depth),
            "]".repeat(depth)
        );
        let script = JsParser::new().parse_script(&source).unwrap();
        let paths: Vec<String> = required_paths(&script.root).into_iter().collect();
        assert_eq!(paths, vec!["./top"]);
    }
}
