use thiserror::Error;

use super::{Collection, RateLimitCategory, Record};

/// The standard result type used throughout the application.
pub type StdResult<T> = Result<T, anyhow::Error>;

/// Rate limit guard error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// The quota of a category could not be confirmed within the retry ceiling.
    #[error("Failed to check {category} rate limit after {attempts} attempts")]
    Exhausted {
        /// The category that was checked.
        category: RateLimitCategory,
        /// The number of attempts made.
        attempts: u32,
    },
}

/// Fetcher error
#[derive(Error, Debug)]
pub enum FetchError {
    /// The remote answered with a non success status
    #[error("Status error {status}: {message}")]
    Status { status: u16, message: String },
    /// The body could not be parsed
    #[error("Parsing error: {0}")]
    Parse(String),
    /// The request did not reach the remote or the body could not be read
    #[error("Transport error: {0}")]
    Transport(String),
    /// The remote reported an error inside a successful response
    #[error("Remote error: {0}")]
    Remote(String),
    /// The fetcher does not know how to follow this continuation token
    #[error("Unsupported page token: {0}")]
    UnsupportedToken(String),
    /// The rate limit guard gave up
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

impl FetchError {
    /// Whether the whole run must abort instead of stopping the current query.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::RateLimit(_))
    }

    /// Whether the same request may succeed if issued again.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        FetchError::Transport(error.to_string())
    }
}

/// A collection aborted by an unrecoverable error, with the records gathered before it.
#[derive(Error, Debug)]
#[error("Collection aborted after {} records: {source}", .partial.records().len())]
pub struct CollectionAborted {
    /// Records accumulated before the failing call.
    pub partial: Collection,
    /// The unrecoverable error.
    pub source: RateLimitError,
}

/// Keyword search error
#[derive(Error, Debug)]
pub enum HarvestError {
    /// The rate limit guard gave up; the dataset gathered so far is kept
    #[error("Harvest aborted with {} records: {source}", .records.len())]
    Aborted {
        /// The dataset, including the records of the interrupted keyword
        records: Vec<Record>,
        /// The unrecoverable error
        source: RateLimitError,
    },
    /// Saving the dataset failed
    #[error(transparent)]
    Checkpoint(#[from] anyhow::Error),
}

/// Keyword extraction error
#[derive(Error, Debug)]
pub enum KeywordError {
    /// The chat response does not contain a JSON document
    #[error("No JSON document in chat response")]
    Empty,
    /// The JSON document does not match the expected schema
    #[error("Invalid keywords document: {0}")]
    Schema(#[from] serde_json::Error),
}
