use jsindex_indexer::IndexerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JsError>;

#[derive(Error, Debug)]
pub enum JsError {
    #[error("Failed to set language: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Lint(#[from] LintError),

    #[error(transparent)]
    Index(#[from] IndexerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<JsError> for IndexerError {
    fn from(err: JsError) -> Self {
        match err {
            JsError::Index(inner) => inner,
            JsError::Json(inner) => Self::JsonError(inner),
            other => Self::Other(other.to_string()),
        }
    }
}

/// Structural query over the lowered tree failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("tree query exceeded maximum depth {limit}")]
    DepthExceeded { limit: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LintError {
    #[error("lint engine failed to compile: {0}")]
    Compile(String),

    #[error("lint engine failed: {0}")]
    Runtime(String),

    #[error("invalid lint option '{name}': {message}")]
    InvalidOption { name: String, message: String },
}
