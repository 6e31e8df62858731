//! Error types for the upstream listing source.

/// Failure to obtain a listing page from the upstream site.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("request for page {page} failed")]
    Request {
        page: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("request for page {page} timed out")]
    Timeout { page: u32 },
    #[error("page {page} returned HTTP {status}")]
    Status { page: u32, status: u16 },
    #[error("page {page} returned an empty body")]
    EmptyBody { page: u32 },
    #[error("invalid source URL")]
    InvalidUrl(#[from] url::ParseError),
}

/// Failure while turning listing HTML into candidate records.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("document is empty")]
    EmptyDocument,
    #[error("age {0:?} is not a valid number")]
    InvalidAge(String),
    #[error("invalid {field} pattern {pattern:?}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid detail link selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}
