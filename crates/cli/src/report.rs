use jsindex_indexer::{IndexRegistry, JobReport, KeyPattern, Locator, Severity};
use jsindex_js::{JsIndexQuery, REQUIRE_CATEGORY};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::sync::PoisonError;

#[derive(Debug, Serialize)]
pub struct IndexSummary {
    pub root: String,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub duration_ms: u64,
    pub globals: Vec<GlobalView>,
    pub requires: BTreeMap<String, BTreeSet<String>>,
    pub problems: Vec<ProblemView>,
    pub failures: Vec<FailureView>,
}

#[derive(Debug, Serialize)]
pub struct GlobalView {
    pub file: String,
    pub name: String,
    pub types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProblemView {
    pub file: String,
    pub line: usize,
    pub offset: usize,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct FailureView {
    pub file: String,
    pub participant: String,
    pub message: String,
}

impl IndexSummary {
    /// Snapshot the index and problems of `container` after a job.
    pub fn collect(registry: &IndexRegistry, container: &Locator, report: Option<&JobReport>) -> Self {
        let index = registry.index(container);
        let store = index.lock().unwrap_or_else(PoisonError::into_inner);
        let query = JsIndexQuery::new(&store);

        let globals = query
            .globals()
            .into_iter()
            .map(|(file, property)| GlobalView {
                file: file.to_string(),
                name: property.name,
                types: property.type_names,
            })
            .collect();

        let sources: BTreeSet<Locator> = store
            .query(&[REQUIRE_CATEGORY], &KeyPattern::Any)
            .into_iter()
            .map(|entry| entry.source.clone())
            .collect();
        let requires = sources
            .into_iter()
            .map(|file| {
                let paths = query.requires(&file);
                (file.to_string(), paths)
            })
            .collect();

        let prefix = format!("{}/", container.as_str().trim_end_matches('/'));
        let problems = registry
            .problems()
            .all()
            .into_iter()
            .filter(|(file, _)| file.as_str().starts_with(&prefix))
            .map(|(file, problem)| ProblemView {
                file: file.to_string(),
                line: problem.line,
                offset: problem.offset,
                severity: problem.severity,
                message: problem.message,
            })
            .collect();

        let failures = report
            .map(|report| {
                report
                    .failures
                    .iter()
                    .map(|failure| FailureView {
                        file: failure.file.to_string(),
                        participant: failure.participant.clone(),
                        message: failure.message.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            root: container.to_string(),
            files_processed: report.map_or(0, |r| r.files_processed),
            files_skipped: report.map_or(0, |r| r.files_skipped),
            duration_ms: report.map_or(0, |r| r.duration_ms),
            globals,
            requires,
            problems,
            failures,
        }
    }

    pub fn write_json(&self, out: &mut impl Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)
    }

    pub fn write_text(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(
            out,
            "Indexed {} files ({} skipped) in {} ms",
            self.files_processed, self.files_skipped, self.duration_ms
        )?;

        if !self.globals.is_empty() {
            writeln!(out, "\nGlobals:")?;
            for global in &self.globals {
                writeln!(
                    out,
                    "  {}: {} [{}]",
                    short_name(&global.file),
                    global.name,
                    global.types.join(", ")
                )?;
            }
        }

        if !self.requires.is_empty() {
            writeln!(out, "\nRequires:")?;
            for (file, paths) in &self.requires {
                let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
                writeln!(out, "  {} -> {}", short_name(file), paths.join(", "))?;
            }
        }

        if !self.problems.is_empty() {
            writeln!(out, "\nProblems:")?;
            for problem in &self.problems {
                let severity = match problem.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                writeln!(
                    out,
                    "  {}:{}: {severity}: {}",
                    short_name(&problem.file),
                    problem.line,
                    problem.message
                )?;
            }
        }

        for failure in &self.failures {
            writeln!(
                out,
                "failed: {} in {}: {}",
                failure.participant,
                short_name(&failure.file),
                failure.message
            )?;
        }
        Ok(())
    }
}

fn short_name(locator: &str) -> &str {
    locator.strip_prefix("file://").unwrap_or(locator)
}
