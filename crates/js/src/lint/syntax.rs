use super::{LintCompiler, LintOptions, LintRecord, LintReport, LintScope, LintScript};
use crate::error::LintError;
use crate::lines::LineIndex;
use std::sync::Arc;
use tree_sitter::{Language, Node, Parser};

/// Columns a tab occupies in reported positions.
const TAB_WIDTH: usize = 4;
const MAX_TOKEN_CHARS: usize = 20;

/// Compiles [`SyntaxLint`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntaxLintCompiler;

impl LintCompiler for SyntaxLintCompiler {
    fn compile(&self) -> Result<Arc<dyn LintScript>, LintError> {
        let language: Language = tree_sitter_javascript::LANGUAGE.into();
        Parser::new()
            .set_language(&language)
            .map_err(|e| LintError::Compile(e.to_string()))?;
        Ok(Arc::new(SyntaxLint { language }))
    }
}

/// Reports syntax errors found by the tree-sitter JavaScript grammar.
///
/// Stops after `maxerr` problems with a "Too many errors." record followed by
/// a `None` placeholder.
pub struct SyntaxLint {
    language: Language,
}

impl LintScript for SyntaxLint {
    fn new_scope(&self) -> Box<dyn LintScope> {
        Box::new(SyntaxScope {
            language: self.language.clone(),
        })
    }
}

struct SyntaxScope {
    language: Language,
}

impl LintScope for SyntaxScope {
    fn call_entry(&mut self, source: &str, options: &LintOptions) -> Result<LintReport, LintError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| LintError::Runtime(e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| LintError::Runtime("parser produced no tree".to_string()))?;

        let lines = LineIndex::new(source);
        let mut errors: Vec<Option<LintRecord>> = Vec::new();
        let mut cursor = tree.walk();

        'walk: loop {
            let node = cursor.node();
            let flagged = node.is_error() || node.is_missing();
            if flagged {
                let record = record_for(node, source, &lines);
                let (line, character) = (record.line, record.character);
                errors.push(Some(record));

                if options.maxerr > 0 && errors.len() >= options.maxerr {
                    let scanned = line * 100 / lines.line_count().max(1);
                    errors.push(Some(LintRecord {
                        line,
                        character,
                        reason: format!("Too many errors. ({scanned}% scanned)."),
                    }));
                    errors.push(None);
                    break 'walk;
                }
            }

            if !flagged && node.has_error() && cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    continue 'walk;
                }
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }

        Ok(LintReport {
            passed: errors.is_empty(),
            errors: Some(errors),
        })
    }
}

fn record_for(node: Node<'_>, source: &str, lines: &LineIndex) -> LintRecord {
    let offset = source
        .get(..node.start_byte())
        .map_or(0, |prefix| prefix.chars().count());
    let line = lines.line_of(offset);
    let character = display_column(lines, line, offset) + 1;

    let reason = if node.is_missing() {
        format!("Expected '{}'.", node.kind())
    } else {
        let token: String = source
            .get(node.byte_range())
            .unwrap_or("")
            .split_whitespace()
            .next()
            .unwrap_or("")
            .chars()
            .take(MAX_TOKEN_CHARS)
            .collect();
        if token.is_empty() {
            "Unexpected token.".to_string()
        } else {
            format!("Unexpected '{token}'.")
        }
    };

    LintRecord {
        line,
        character,
        reason,
    }
}

fn display_column(lines: &LineIndex, line: usize, offset: usize) -> usize {
    let (Some(start), Some(text)) = (lines.line_start(line), lines.line_text(line)) else {
        return 0;
    };
    text.iter()
        .take(offset.saturating_sub(start))
        .map(|&ch| if ch == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, options: &LintOptions) -> Vec<Option<LintRecord>> {
        let script = SyntaxLintCompiler.compile().unwrap();
        let mut scope = script.new_scope();
        scope.call_entry(source, options).unwrap().errors.unwrap()
    }

    #[test]
    fn clean_source_passes() {
        let script = SyntaxLintCompiler.compile().unwrap();
        let report = script
            .new_scope()
            .call_entry("var a = 1;\n", &LintOptions::default())
            .unwrap();
        assert!(report.passed);
        assert_eq!(report.errors, Some(Vec::new()));
    }

    #[test]
    fn tabs_count_as_four_columns() {
        let errors = run("var ok = 1;\n\tvar = 2;\n", &LintOptions::default());
        let first = errors[0].as_ref().unwrap();
        assert_eq!(first.line, 2);
        assert!(first.character > TAB_WIDTH);
    }

    #[test]
    fn maxerr_appends_stop_marker() {
        let options = LintOptions {
            maxerr: 1,
            ..LintOptions::default()
        };
        let errors = run("var = ;\nvar = ;\nvar = ;\n", &options);
        assert_eq!(errors.len(), 3);
        assert!(errors[1]
            .as_ref()
            .unwrap()
            .reason
            .starts_with("Too many errors."));
        assert!(errors[2].is_none());
    }
}
