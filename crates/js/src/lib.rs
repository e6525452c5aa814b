//! # jsindex JavaScript support
//!
//! Parses `.js` files, contributes each file's global `Window` type and
//! `require` edges to the index, and turns lint engine output into problems.
//!
//! ## Example
//!
//! ```no_run
//! use jsindex_indexer::{IndexJob, IndexRegistry, Locator};
//! use jsindex_js::{register, JsConfig};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(IndexRegistry::new());
//! register(&registry, &JsConfig::default()).unwrap();
//! IndexJob::for_container(registry, Some(Locator::new("file:///project"))).run();
//! ```

pub mod ast;
mod error;
mod global_type;
mod index_io;
mod infer;
mod lines;
pub mod lint;
mod model;
mod parser;
pub mod scope;

pub use error::{JsError, LintError, QueryError, Result};
pub use global_type::{GlobalTypeExtractor, INDEXING_STEPS};
pub use index_io::{JsIndexQuery, JsIndexWriter, REQUIRE_CATEGORY, TYPE_CATEGORY};
pub use infer::{StructuralInferrer, TypeInferrer};
pub use lines::LineIndex;
pub use model::{
    default_user_agents, PropertyElement, TypeElement, DEFAULT_USER_AGENTS, GLOBAL_TYPE,
    OBJECT_TYPE, WINDOW_TYPE,
};
pub use parser::{JsParser, ParsedScript};

use jsindex_indexer::IndexRegistry;
use lint::{DiagnosticTranslator, LintService, TranslatorConfig};
use std::sync::Arc;

/// File names handled by this crate.
pub const JS_FILE_PATTERNS: &[&str] = &["*.js"];

#[derive(Debug, Clone)]
pub struct JsConfig {
    pub user_agents: Vec<String>,
    /// `None` disables linting.
    pub lint: Option<TranslatorConfig>,
}

impl Default for JsConfig {
    fn default() -> Self {
        Self {
            user_agents: default_user_agents(),
            lint: Some(TranslatorConfig::default()),
        }
    }
}

/// Register the parser, the global type extractor and, if enabled, the lint
/// translator backed by [`LintService::global`].
pub fn register(registry: &IndexRegistry, config: &JsConfig) -> jsindex_indexer::Result<()> {
    register_with(registry, config, LintService::global())
}

pub fn register_with(
    registry: &IndexRegistry,
    config: &JsConfig,
    lint_service: Arc<LintService>,
) -> jsindex_indexer::Result<()> {
    registry.register_parser(JS_FILE_PATTERNS, Arc::new(JsParser::new()))?;
    registry.register_indexer(
        JS_FILE_PATTERNS,
        Arc::new(GlobalTypeExtractor::new(
            Arc::new(StructuralInferrer),
            config.user_agents.clone(),
        )),
    )?;
    if let Some(lint) = &config.lint {
        registry.register_participant(
            JS_FILE_PATTERNS,
            Arc::new(DiagnosticTranslator::new(lint_service, lint.clone())),
        )?;
    }
    log::debug!("Registered JavaScript support for {JS_FILE_PATTERNS:?}");
    Ok(())
}
