//! Source acquisition: turn an entity's locator into usable text content,
//! classifying every failure so the orchestrator can count it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use dealbridge_common::EnrichError;
use firecrawl_client::{FirecrawlClient, FirecrawlError};

/// Content below this many characters is junk (cookie walls, parked domains)
/// and is treated as a failed acquisition, not a success.
pub const MIN_CONTENT_CHARS: usize = 100;

// --- ContentFetcher trait ---

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub markdown: String,
    pub title: Option<String>,
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, EnrichError>;
    fn name(&self) -> &str;
}

// --- Firecrawl-backed fetcher ---

pub struct FirecrawlFetcher {
    client: FirecrawlClient,
}

impl FirecrawlFetcher {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: FirecrawlClient::new(api_key),
        }
    }

    pub fn with_client(client: FirecrawlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentFetcher for FirecrawlFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, EnrichError> {
        let page = self.client.scrape(url).await.map_err(|e| match e {
            ref err if err.is_rate_limited() => EnrichError::RateLimited,
            FirecrawlError::NoContent(_) => EnrichError::EmptyContent {
                chars: 0,
                min: MIN_CONTENT_CHARS,
            },
            other => EnrichError::FetchFailed(other.to_string()),
        })?;

        Ok(FetchedPage {
            title: page.metadata.and_then(|m| m.title),
            markdown: page.markdown,
        })
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

// --- SourceAcquirer ---

#[derive(Debug, Clone)]
pub struct AcquiredContent {
    pub content: String,
    /// The normalized locator the content came from; persisted as
    /// `enrichment_source` on a successful run.
    pub locator: String,
    pub title: Option<String>,
}

pub struct SourceAcquirer {
    fetcher: Arc<dyn ContentFetcher>,
    min_chars: usize,
}

impl SourceAcquirer {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self {
            fetcher,
            min_chars: MIN_CONTENT_CHARS,
        }
    }

    /// Acquire content for an entity's locator.
    ///
    /// `RateLimited` is passed through untouched; it is not retried here —
    /// the batch loop responds by lengthening its next inter-item delay.
    pub async fn acquire(&self, locator: Option<&str>) -> Result<AcquiredContent, EnrichError> {
        let raw = locator
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(EnrichError::NoSource)?;

        let url = normalize_locator(raw)
            .ok_or_else(|| EnrichError::FetchFailed(format!("not a fetchable URL: {raw}")))?;

        info!(url = url.as_str(), fetcher = self.fetcher.name(), "Acquiring source content");

        let page = self.fetcher.fetch(&url).await?;

        let chars = page.markdown.chars().count();
        if chars < self.min_chars {
            warn!(url = url.as_str(), chars, "Content below minimum length");
            return Err(EnrichError::EmptyContent {
                chars,
                min: self.min_chars,
            });
        }

        info!(url = url.as_str(), chars, "Source content acquired");
        Ok(AcquiredContent {
            content: page.markdown,
            locator: url,
            title: page.title,
        })
    }
}

/// Normalize a stored locator into a fetchable URL: bare domains get a
/// scheme, anything that still fails to parse (or is not http/https) is
/// rejected.
pub fn normalize_locator(raw: &str) -> Option<String> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let parsed = url::Url::parse(&candidate).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    parsed.host_str()?;
    Some(parsed.to_string())
}

/// Host of a locator with any `www.` prefix stripped. Used for domain
/// comparison during identity resolution.
pub fn host_of(raw: &str) -> Option<String> {
    let normalized = normalize_locator(raw)?;
    let parsed = url::Url::parse(&normalized).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_ascii_lowercase())
}
