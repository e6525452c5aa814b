//! Lint engine seam and the diagnostics translated from it.
//!
//! An engine is compiled once into a [`LintScript`] and shared; every run
//! gets a fresh [`LintScope`] so no state carries over between files.

mod options;
mod syntax;
mod translator;

pub use options::{LintOption, LintOptions};
pub use syntax::{SyntaxLint, SyntaxLintCompiler};
pub use translator::{translate_report, DiagnosticTranslator, TranslatorConfig, LINT_CATEGORY};

use crate::error::LintError;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, PoisonError};

/// One reported issue. `line` and `character` are 1-based; `character`
/// counts a tab as four columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintRecord {
    pub line: usize,
    pub character: usize,
    pub reason: String,
}

/// Engine output. A `None` element marks that the engine stopped early.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub passed: bool,
    pub errors: Option<Vec<Option<LintRecord>>>,
}

pub trait LintCompiler: Send + Sync {
    fn compile(&self) -> Result<Arc<dyn LintScript>, LintError>;
}

/// Compiled engine, shared read-only between runs.
pub trait LintScript: Send + Sync {
    fn new_scope(&self) -> Box<dyn LintScope>;
}

pub trait LintScope {
    fn call_entry(&mut self, source: &str, options: &LintOptions) -> Result<LintReport, LintError>;
}

static GLOBAL_SERVICE: Lazy<Arc<LintService>> =
    Lazy::new(|| Arc::new(LintService::new(Arc::new(SyntaxLintCompiler))));

/// Lazily compiled engine cache.
///
/// A failed compile is logged and leaves the cache empty, so the next call
/// tries again.
pub struct LintService {
    compiler: Arc<dyn LintCompiler>,
    script: Mutex<Option<Arc<dyn LintScript>>>,
}

impl LintService {
    pub fn new(compiler: Arc<dyn LintCompiler>) -> Self {
        Self {
            compiler,
            script: Mutex::new(None),
        }
    }

    /// Process-wide service backed by [`SyntaxLint`].
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_SERVICE)
    }

    /// The compiled script, compiling it on first use.
    pub fn script(&self) -> Option<Arc<dyn LintScript>> {
        let mut cached = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(script) = cached.as_ref() {
            return Some(Arc::clone(script));
        }
        match self.compiler.compile() {
            Ok(script) => {
                log::debug!("Lint engine compiled");
                *cached = Some(Arc::clone(&script));
                Some(script)
            }
            Err(err) => {
                log::error!("{err}");
                None
            }
        }
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the cached script.
    pub fn reset(&self) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
