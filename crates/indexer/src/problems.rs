use crate::locator::Locator;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Tag partitioning problem ownership between participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProblemCategory(&'static str);

impl ProblemCategory {
    #[must_use]
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ProblemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub category: ProblemCategory,
    pub message: String,
    /// 1-based.
    pub line: usize,
    /// Absolute character offset from the start of the text.
    pub offset: usize,
    pub length: usize,
    pub severity: Severity,
    pub source: String,
}

impl Problem {
    pub fn warning(
        category: ProblemCategory,
        message: impl Into<String>,
        line: usize,
        offset: usize,
        length: usize,
        source: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            line,
            offset,
            length,
            severity: Severity::Warning,
            source: source.into(),
        }
    }

    pub fn error(
        category: ProblemCategory,
        message: impl Into<String>,
        line: usize,
        offset: usize,
        length: usize,
        source: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(category, message, line, offset, length, source)
        }
    }
}

/// In-process problem sink. Each (file, category) list is replaced whole.
#[derive(Debug, Default)]
pub struct ProblemStore {
    problems: Mutex<HashMap<(Locator, ProblemCategory), Vec<Problem>>>,
}

impl ProblemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, file: &Locator, category: ProblemCategory, problems: Vec<Problem>) {
        let mut guard = self.problems.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert((file.clone(), category), problems);
    }

    pub fn remove(&self, file: &Locator, category: ProblemCategory) {
        let mut guard = self.problems.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&(file.clone(), category));
    }

    #[must_use]
    pub fn get(&self, file: &Locator, category: ProblemCategory) -> Vec<Problem> {
        let guard = self.problems.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .get(&(file.clone(), category))
            .cloned()
            .unwrap_or_default()
    }

    /// All problems, ordered by file then offset.
    #[must_use]
    pub fn all(&self) -> Vec<(Locator, Problem)> {
        let guard = self.problems.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<(Locator, Problem)> = guard
            .iter()
            .flat_map(|((file, _), problems)| {
                problems.iter().map(move |p| (file.clone(), p.clone()))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.offset.cmp(&b.1.offset)));
        out
    }
}
