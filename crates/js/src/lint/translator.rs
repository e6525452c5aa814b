use super::{LintOption, LintOptions, LintReport, LintService};
use crate::lines::LineIndex;
use jsindex_indexer::{
    BuildContext, BuildParticipant, Problem, ProblemCategory, Progress, Result,
};
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

pub const LINT_CATEGORY: ProblemCategory = ProblemCategory::new("jsindex.lint");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    pub options: LintOptions,
    /// Reasons fully matching any of these are dropped.
    pub ignore: Vec<String>,
    /// Keep at most one problem per line.
    pub skip_duplicate_lines: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            options: LintOptions::default(),
            ignore: Vec::new(),
            skip_duplicate_lines: true,
        }
    }
}

/// Runs the lint engine over a file and stores its report as problems.
///
/// Options can be changed with [`set_option`](Self::set_option) while the
/// translator is registered; each run uses the options current when it starts.
pub struct DiagnosticTranslator {
    service: Arc<LintService>,
    options: RwLock<LintOptions>,
    ignore: Vec<Regex>,
    skip_duplicate_lines: bool,
}

impl DiagnosticTranslator {
    /// Ignore patterns that fail to compile are logged and dropped.
    pub fn new(service: Arc<LintService>, config: TranslatorConfig) -> Self {
        let ignore = config
            .ignore
            .iter()
            .filter_map(|pattern| match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(re) => Some(re),
                Err(err) => {
                    log::warn!("Ignoring invalid lint filter '{pattern}': {err}");
                    None
                }
            })
            .collect();
        Self {
            service,
            options: RwLock::new(config.options),
            ignore,
            skip_duplicate_lines: config.skip_duplicate_lines,
        }
    }

    #[must_use]
    pub fn options(&self) -> LintOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_option(&self, option: LintOption) {
        log::debug!("Setting lint option {option:?}");
        self.options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(option);
    }

    /// Problems for `source`; empty whenever the engine is unavailable or fails.
    #[must_use]
    pub fn lint(&self, source: &str, path: &str) -> Vec<Problem> {
        let Some(script) = self.service.script() else {
            return Vec::new();
        };

        let options = self.options();
        let run = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut scope = script.new_scope();
            scope.call_entry(source, &options)
        }));
        match run {
            Ok(Ok(report)) => translate_report(
                &report,
                source,
                path,
                &self.ignore,
                self.skip_duplicate_lines,
            ),
            Ok(Err(err)) => {
                log::warn!("Lint failed for {path}: {err}");
                Vec::new()
            }
            Err(_) => {
                log::error!("Lint engine panicked on {path}");
                Vec::new()
            }
        }
    }
}

impl BuildParticipant for DiagnosticTranslator {
    fn name(&self) -> &str {
        "js.lint"
    }

    fn build_file(&self, context: Option<&dyn BuildContext>, progress: &mut Progress) -> Result<()> {
        let Some(context) = context else {
            return Ok(());
        };
        progress.begin(1);
        let source = context.contents()?;
        let problems = self.lint(&source, context.locator().as_str());
        log::debug!("{} lint problems in {}", problems.len(), context.locator());
        context.put_problems(LINT_CATEGORY, problems);
        progress.worked(1);
        Ok(())
    }

    fn delete_file(&self, context: Option<&dyn BuildContext>) {
        if let Some(context) = context {
            context.remove_problems(LINT_CATEGORY);
        }
    }
}

/// Convert an engine report into positioned problems.
///
/// When the report ends in a `None` placeholder the element just before it
/// is an error; everything else is a warning.
#[must_use]
pub fn translate_report(
    report: &LintReport,
    source: &str,
    path: &str,
    ignore: &[Regex],
    skip_duplicate_lines: bool,
) -> Vec<Problem> {
    let Some(errors) = report.errors.as_ref().filter(|errors| !errors.is_empty()) else {
        return Vec::new();
    };

    let error_index = match errors.last() {
        Some(None) => errors.len().checked_sub(2),
        _ => None,
    };

    let mut lines: Option<LineIndex> = None;
    let mut problems: Vec<Problem> = Vec::with_capacity(errors.len());

    for (index, record) in errors.iter().enumerate() {
        let Some(record) = record else {
            continue;
        };
        if skip_duplicate_lines && problems.iter().any(|p| p.line == record.line) {
            continue;
        }
        let reason = record.reason.trim();
        if ignore.iter().any(|re| re.is_match(reason)) {
            continue;
        }

        let lines = lines.get_or_insert_with(|| LineIndex::new(source));
        let offset =
            column_offset(lines, record.line, record.character).unwrap_or(record.character);

        let problem = if Some(index) == error_index {
            Problem::error(LINT_CATEGORY, reason, record.line, offset, 1, path)
        } else {
            Problem::warning(LINT_CATEGORY, reason, record.line, offset, 1, path)
        };
        problems.push(problem);
    }

    problems
}

/// Absolute offset of a 1-based, tab-as-four `character` column on `line`.
fn column_offset(lines: &LineIndex, line: usize, character: usize) -> Option<usize> {
    let start = lines.line_start(line)?;
    let text = lines.line_text(line)?;
    let mut remaining = character as i64 - 1;
    let mut offset = start;
    let mut x: i64 = 0;
    while x < remaining {
        let ch = text.get(usize::try_from(x).ok()?)?;
        if *ch == '\t' {
            remaining -= 3;
        }
        offset += 1;
        x += 1;
    }
    Some(offset)
}
