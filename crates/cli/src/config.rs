use anyhow::{Context, Result};
use jsindex_js::lint::{LintOption, LintOptions, TranslatorConfig};
use jsindex_js::{default_user_agents, JsConfig};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = ".jsindex.toml";

/// Contents of `.jsindex.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub index: IndexSection,
    pub js: JsSection,
    pub lint: LintSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexSection {
    /// Globs relative to the root; a file must match one to be indexed.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            include: vec!["**/*.js".to_string()],
            exclude: vec!["**/node_modules/**".to_string(), "**/*.min.js".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JsSection {
    pub user_agents: Vec<String>,
}

impl Default for JsSection {
    fn default() -> Self {
        Self {
            user_agents: default_user_agents(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintSection {
    pub enabled: bool,
    pub skip_duplicate_lines: bool,
    pub ignore: Vec<String>,
    pub options: LintOptions,
}

impl Default for LintSection {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_duplicate_lines: true,
            ignore: Vec::new(),
            options: LintOptions::default(),
        }
    }
}

impl CliConfig {
    /// Load `explicit` if given, else `<root>/.jsindex.toml` when present,
    /// else the defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    log::debug!("No {CONFIG_FILE_NAME} under {}, using defaults", root.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply command-line overrides in order.
    pub fn apply_overrides(&mut self, no_lint: bool, lint_options: &[String]) -> Result<()> {
        if no_lint {
            self.lint.enabled = false;
        }
        for assignment in lint_options {
            let option = LintOption::parse_assignment(assignment)
                .with_context(|| format!("Invalid --lint-option '{assignment}'"))?;
            self.lint.options.apply(option);
        }
        Ok(())
    }

    pub fn js_config(&self) -> JsConfig {
        let lint = self.lint.enabled.then(|| TranslatorConfig {
            options: self.lint.options.clone(),
            ignore: self.lint.ignore.clone(),
            skip_duplicate_lines: self.lint.skip_duplicate_lines,
        });
        JsConfig {
            user_agents: self.js.user_agents.clone(),
            lint,
        }
    }
}
