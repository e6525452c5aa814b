use crate::ast::{self, Node};
use crate::error::{JsError, Result};
use crate::scope::{build_scopes, Scope};
use jsindex_indexer::{IndexerError, Locator, ParseHandle, TreeParser};
use std::sync::Arc;
use tree_sitter::Parser;

/// What [`JsParser`] hands to indexers through the parse handle.
#[derive(Debug, Clone)]
pub struct ParsedScript {
    pub root: Node,
    /// `None` when scopes could not be resolved.
    pub globals: Option<Scope>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsParser;

impl JsParser {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    pub fn parse_script(&self, source: &str) -> Result<ParsedScript> {
        let mut parser = Parser::new();
        let language: tree_sitter::Language = tree_sitter_javascript::LANGUAGE.into();
        parser.set_language(&language)?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| JsError::Parse("parser produced no tree".to_string()))?;

        let root = ast::lower(tree.root_node(), source);
        let globals = Some(build_scopes(&root));
        Ok(ParsedScript { root, globals })
    }
}

impl TreeParser for JsParser {
    fn parse(&self, locator: &Locator, text: &str) -> jsindex_indexer::Result<ParseHandle> {
        let script = self
            .parse_script(text)
            .map_err(|err| IndexerError::parse(locator, err.to_string()))?;
        log::trace!("Parsed {locator}");
        Ok(Arc::new(script))
    }
}
