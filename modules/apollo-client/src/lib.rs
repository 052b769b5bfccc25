pub mod error;
pub mod types;

pub use error::{ApolloError, Result};
pub use types::{OrgEnrichResponse, OrgSearchInput, OrgSearchResponse, Organization};

use std::time::Duration;

const BASE_URL: &str = "https://api.apollo.io/api/v1";

pub struct ApolloClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ApolloClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Search organizations by name. Returns the first page of matches.
    pub async fn search_organizations(&self, name: &str, per_page: u32) -> Result<Vec<Organization>> {
        tracing::info!(name, per_page, "Apollo organization search");

        let input = OrgSearchInput {
            q_organization_name: name,
            page: 1,
            per_page,
        };

        let url = format!("{}/mixed_companies/search", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApolloError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let search: OrgSearchResponse = resp.json().await?;
        tracing::info!(name, count = search.organizations.len(), "Apollo search complete");
        Ok(search.organizations)
    }

    /// Look up a single organization by its domain.
    pub async fn enrich_organization(&self, domain: &str) -> Result<Option<Organization>> {
        tracing::info!(domain, "Apollo organization enrich");

        let url = format!("{}/organizations/enrich", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[("domain", domain)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApolloError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let enrich: OrgEnrichResponse = resp.json().await?;
        Ok(enrich.organization)
    }
}
