use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid file pattern: {0}")]
    PatternError(#[from] globset::Error),

    #[error("Invalid key pattern: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Parse failed for {locator}: {message}")]
    ParseError { locator: String, message: String },

    #[error("{participant} panicked: {message}")]
    Panicked {
        participant: String,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub fn parse(locator: impl ToString, message: impl Into<String>) -> Self {
        Self::ParseError {
            locator: locator.to_string(),
            message: message.into(),
        }
    }
}
