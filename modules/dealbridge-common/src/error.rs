use std::fmt;

use thiserror::Error;

/// Why an extraction produced nothing usable. The three cases are one
/// `error` outcome for the orchestrator but are logged distinctly.
#[derive(Debug, Clone)]
pub enum ExtractFailure {
    /// The model call itself failed (network, API error, timeout).
    Service(String),
    /// The reply did not match the output schema.
    Malformed(String),
    /// The model explicitly declined: not enough information in the content.
    Insufficient,
}

impl fmt::Display for ExtractFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractFailure::Service(msg) => write!(f, "model call failed: {msg}"),
            ExtractFailure::Malformed(msg) => write!(f, "reply did not match schema: {msg}"),
            ExtractFailure::Insufficient => write!(f, "model reported insufficient data"),
        }
    }
}

impl ExtractFailure {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractFailure::Service(_) => "service_error",
            ExtractFailure::Malformed(_) => "parse_error",
            ExtractFailure::Insufficient => "insufficient_data",
        }
    }
}

/// Failure taxonomy for a single entity's pipeline run. Everything here is
/// caught at the per-item boundary and converted into a terminal outcome
/// plus a log entry; only `Config` escapes to the caller.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("entity has no website or domain to enrich from")]
    NoSource,

    #[error("source fetch failed: {0}")]
    FetchFailed(String),

    #[error("source rate-limited the request")]
    RateLimited,

    #[error("source returned only {chars} characters of content (minimum {min})")]
    EmptyContent { chars: usize, min: usize },

    #[error("extraction failed: {0}")]
    Extraction(ExtractFailure),

    #[error("persist failed: {0}")]
    Persist(String),

    #[error("entity not found: {0}")]
    EntityNotFound(uuid::Uuid),

    #[error("no candidate with id {0} on this entity")]
    UnknownCandidate(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EnrichError {
    /// Whether this failure should abort the whole invocation rather than
    /// classify one item. Per-item work cannot even begin on these.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EnrichError::Config(_))
    }
}
