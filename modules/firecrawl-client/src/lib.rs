pub mod error;

pub use error::{FirecrawlError, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

pub struct FirecrawlClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'a str>,
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "sourceURL", default)]
    pub source_url: Option<String>,
    #[serde(rename = "statusCode", default)]
    pub status_code: Option<u16>,
}

/// A scraped page: main content rendered to markdown plus page metadata.
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub markdown: String,
    pub metadata: Option<PageMetadata>,
}

impl FirecrawlClient {
    pub fn new(api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: api_key.to_string(),
            base_url: FIRECRAWL_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Scrape a single URL and return its main content as markdown.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        tracing::info!(url, "Firecrawl scrape");

        let request = ScrapeRequest {
            url,
            formats: vec!["markdown"],
            only_main_content: true,
        };

        let resp = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FirecrawlError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ScrapeResponse = resp.json().await.map_err(FirecrawlError::from)?;

        if !body.success {
            return Err(FirecrawlError::Api {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "scrape failed".to_string()),
            });
        }

        let data = body
            .data
            .ok_or_else(|| FirecrawlError::NoContent(url.to_string()))?;
        let markdown = data.markdown.unwrap_or_default();
        if markdown.is_empty() {
            return Err(FirecrawlError::NoContent(url.to_string()));
        }

        tracing::info!(url, bytes = markdown.len(), "Firecrawl scrape complete");
        Ok(ScrapedPage {
            markdown,
            metadata: data.metadata,
        })
    }
}
