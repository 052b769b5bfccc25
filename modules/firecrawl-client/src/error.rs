use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirecrawlError>;

#[derive(Debug, Error)]
pub enum FirecrawlError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Scrape returned no content for {0}")]
    NoContent(String),
}

impl FirecrawlError {
    /// Whether this error is the API's 429 rate-limit response.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FirecrawlError::Api { status: 429, .. })
    }
}

impl From<reqwest::Error> for FirecrawlError {
    fn from(err: reqwest::Error) -> Self {
        FirecrawlError::Network(err.to_string())
    }
}
