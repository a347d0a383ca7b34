//! Error types for butterfly-pairs
//!
//! Two layers of failure exist: [`Error`] for anything that stops an operation
//! (a batch start, an ingest, an export) and [`ProviderError`] for a single
//! routing lookup, which the batch controller logs and skips.

use std::fmt;

use strsim::normalized_levenshtein;

/// Minimum similarity for a fuzzy suggestion to be offered
const SUGGESTION_THRESHOLD: f64 = 0.5;

/// Suggest the closest candidate for a misspelled identifier
///
/// Matching is case-insensitive. An exact match yields `None` since there is
/// nothing to correct.
pub fn suggest_correction<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let input_lower = input.trim().to_lowercase();
    let mut best: Option<(&str, f64)> = None;

    for candidate in candidates {
        let score = normalized_levenshtein(&input_lower, &candidate.to_lowercase());
        if score >= 1.0 {
            return None;
        }
        if score >= SUGGESTION_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }

    best.map(|(candidate, _)| candidate.to_string())
}

/// Failure of a single provider lookup
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Connection failure or transport-level timeout
    Network(String),

    /// Non-success HTTP status
    Http(String),

    /// Routing service answered with a non-success status marker
    Status(String),

    /// Payload could not be parsed or lacked the expected fields
    Malformed(String),

    /// Per-call time bound elapsed before the provider answered
    Timeout(std::time::Duration),
}

impl ProviderError {
    /// Transient failures that a retry may cure
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::Timeout(_))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Network(msg) => write!(f, "Network error: {}", msg),
            ProviderError::Http(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::Status(code) => write!(f, "Routing service returned '{}'", code),
            ProviderError::Malformed(msg) => write!(f, "Malformed response: {}", msg),
            ProviderError::Timeout(limit) => {
                write!(f, "Provider did not answer within {}ms", limit.as_millis())
            }
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ProviderError::Network(err.to_string())
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}

/// Main error type for butterfly-pairs operations
#[derive(Debug)]
pub enum Error {
    /// Batch cannot start with the given provider setup (e.g. missing credential)
    Validation(String),

    /// File I/O error
    IoError(std::io::Error),

    /// Spreadsheet read/write error
    Csv(csv::Error),

    /// Invalid configuration, arguments or input data
    InvalidInput(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "Validation failed: {}", msg),
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::Csv(err) => write!(f, "CSV error: {}", err),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            Error::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err)
    }
}

/// Convenience result type for butterfly-pairs operations
pub type Result<T> = std::result::Result<T, Error>;
