use crate::error::LintError;
use serde::{Deserialize, Serialize};

/// Options handed to the lint engine on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintOptions {
    pub lax_line_end: bool,
    pub undef: bool,
    pub browser: bool,
    pub jscript: bool,
    pub debug: bool,
    /// Stop after this many problems; `0` means no limit.
    pub maxerr: usize,
    /// Globals the engine treats as defined.
    pub predef: Vec<String>,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            lax_line_end: true,
            undef: true,
            browser: true,
            jscript: true,
            debug: true,
            maxerr: 100,
            predef: ["Ti", "Titanium", "alert", "require", "exports", "native", "implements"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl LintOptions {
    pub fn apply(&mut self, option: LintOption) {
        match option {
            LintOption::LaxLineEnd(value) => self.lax_line_end = value,
            LintOption::Undef(value) => self.undef = value,
            LintOption::Browser(value) => self.browser = value,
            LintOption::Jscript(value) => self.jscript = value,
            LintOption::Debug(value) => self.debug = value,
            LintOption::MaxErr(value) => self.maxerr = value,
            LintOption::Predef(value) => self.predef = value,
        }
    }
}

/// A single override, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintOption {
    LaxLineEnd(bool),
    Undef(bool),
    Browser(bool),
    Jscript(bool),
    Debug(bool),
    MaxErr(usize),
    Predef(Vec<String>),
}

impl LintOption {
    /// Parse `name` and its textual `value`. `predef` takes a comma-separated list.
    pub fn parse(name: &str, value: &str) -> Result<Self, LintError> {
        let value = value.trim();
        let option = match name.trim() {
            "laxLineEnd" | "lax_line_end" => Self::LaxLineEnd(parse_bool(name, value)?),
            "undef" => Self::Undef(parse_bool(name, value)?),
            "browser" => Self::Browser(parse_bool(name, value)?),
            "jscript" => Self::Jscript(parse_bool(name, value)?),
            "debug" => Self::Debug(parse_bool(name, value)?),
            "maxerr" => Self::MaxErr(value.parse().map_err(|_| LintError::InvalidOption {
                name: name.to_string(),
                message: format!("expected a number, got '{value}'"),
            })?),
            "predef" => Self::Predef(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            ),
            _ => {
                return Err(LintError::InvalidOption {
                    name: name.to_string(),
                    message: "unknown option".to_string(),
                })
            }
        };
        Ok(option)
    }

    /// Parse `name=value`.
    pub fn parse_assignment(assignment: &str) -> Result<Self, LintError> {
        let (name, value) = assignment.split_once('=').ok_or_else(|| LintError::InvalidOption {
            name: assignment.to_string(),
            message: "expected name=value".to_string(),
        })?;
        Self::parse(name, value)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, LintError> {
    value.parse().map_err(|_| LintError::InvalidOption {
        name: name.to_string(),
        message: format!("expected true or false, got '{value}'"),
    })
}
