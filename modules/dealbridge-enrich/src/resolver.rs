//! Identity resolution: match an entity lacking a confirmed web presence to
//! an external organization before enrichment can target it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use apollo_client::{ApolloClient, ApolloError};
use dealbridge_common::{CandidateMatch, EnrichError, EntityRecord};

use crate::acquire::host_of;

/// How many ranked candidates are persisted on an ambiguous entity.
const MAX_CANDIDATES: usize = 5;

// --- OrgSearcher trait ---

#[derive(Debug, Clone)]
pub struct OrgMatch {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub employee_count: Option<u32>,
}

impl OrgMatch {
    pub fn to_candidate(&self) -> CandidateMatch {
        CandidateMatch {
            id: self.id.clone(),
            name: self.name.clone(),
            domain: self.domain.clone(),
            industry: self.industry.clone(),
            location: self.location.clone(),
            employee_count: self.employee_count,
        }
    }
}

#[async_trait]
pub trait OrgSearcher: Send + Sync {
    async fn search(&self, name: &str) -> Result<Vec<OrgMatch>, EnrichError>;
}

// --- Apollo-backed searcher ---

pub struct ApolloSearcher {
    client: ApolloClient,
}

impl ApolloSearcher {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: ApolloClient::new(api_key.to_string()),
        }
    }

    pub fn with_client(client: ApolloClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrgSearcher for ApolloSearcher {
    async fn search(&self, name: &str) -> Result<Vec<OrgMatch>, EnrichError> {
        let orgs = self
            .client
            .search_organizations(name, MAX_CANDIDATES as u32)
            .await
            .map_err(|e| match e {
                ApolloError::Api { status: 429, .. } => EnrichError::RateLimited,
                other => EnrichError::FetchFailed(format!("organization search failed: {other}")),
            })?;

        Ok(orgs
            .into_iter()
            .map(|org| OrgMatch {
                location: org.location(),
                id: org.id,
                name: org.name,
                domain: org.primary_domain,
                industry: org.industry,
                employee_count: org.estimated_num_employees,
            })
            .collect())
    }
}

// --- IdentityResolver ---

#[derive(Debug)]
pub enum Resolution {
    /// A single strong match: proceed straight to extraction against it.
    AutoConfirmed(OrgMatch),
    /// Several plausible matches: persist them and wait for a human.
    Ambiguous(Vec<CandidateMatch>),
    NoMatches,
}

pub struct IdentityResolver {
    searcher: Arc<dyn OrgSearcher>,
}

impl IdentityResolver {
    pub fn new(searcher: Arc<dyn OrgSearcher>) -> Self {
        Self { searcher }
    }

    /// Search for the organization behind an entity.
    ///
    /// Auto-confirms on a domain match against the entity's known website, or
    /// when the search yields exactly one candidate. Anything else is
    /// ambiguous and goes to a human.
    pub async fn resolve(&self, entity: &EntityRecord) -> Result<Resolution, EnrichError> {
        let matches = self.searcher.search(&entity.name).await?;

        if matches.is_empty() {
            info!(entity = %entity.name, "Identity search returned no matches");
            return Ok(Resolution::NoMatches);
        }

        if let Some(known_host) = entity.website.as_deref().and_then(host_of) {
            if let Some(hit) = matches
                .iter()
                .find(|m| m.domain.as_deref().and_then(host_of).as_deref() == Some(known_host.as_str()))
            {
                info!(entity = %entity.name, domain = %known_host, "Auto-confirmed by domain match");
                return Ok(Resolution::AutoConfirmed(hit.clone()));
            }
        }

        if matches.len() == 1 {
            let only = matches.into_iter().next().expect("len checked");
            info!(entity = %entity.name, org = %only.name, "Auto-confirmed single match");
            return Ok(Resolution::AutoConfirmed(only));
        }

        let candidates: Vec<CandidateMatch> = matches
            .iter()
            .take(MAX_CANDIDATES)
            .map(OrgMatch::to_candidate)
            .collect();
        info!(entity = %entity.name, count = candidates.len(), "Identity ambiguous");
        Ok(Resolution::Ambiguous(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealbridge_common::EntityKind;

    struct FixedSearcher(Vec<OrgMatch>);

    #[async_trait]
    impl OrgSearcher for FixedSearcher {
        async fn search(&self, _name: &str) -> Result<Vec<OrgMatch>, EnrichError> {
            Ok(self.0.clone())
        }
    }

    fn org(id: &str, name: &str, domain: Option<&str>) -> OrgMatch {
        OrgMatch {
            id: id.to_string(),
            name: name.to_string(),
            domain: domain.map(String::from),
            industry: None,
            location: None,
            employee_count: None,
        }
    }

    #[tokio::test]
    async fn domain_match_auto_confirms_over_count() {
        let searcher = FixedSearcher(vec![
            org("a", "Acme Logistics", Some("acme-logistics.io")),
            org("b", "Acme Logistics Inc", Some("acme-logistics.com")),
        ]);
        let resolver = IdentityResolver::new(Arc::new(searcher));

        let entity = EntityRecord::new(EntityKind::Buyer, "Acme Logistics", "acme-logistics.com")
            .with_website("www.acme-logistics.com");

        match resolver.resolve(&entity).await.unwrap() {
            Resolution::AutoConfirmed(m) => assert_eq!(m.id, "b"),
            other => panic!("expected auto-confirm, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_match_auto_confirms() {
        let searcher = FixedSearcher(vec![org("a", "Acme", Some("acme.com"))]);
        let resolver = IdentityResolver::new(Arc::new(searcher));
        let entity = EntityRecord::new(EntityKind::Buyer, "Acme", "acme");

        assert!(matches!(
            resolver.resolve(&entity).await.unwrap(),
            Resolution::AutoConfirmed(_)
        ));
    }

    #[tokio::test]
    async fn several_matches_without_domain_are_ambiguous() {
        let searcher = FixedSearcher(vec![
            org("a", "Acme", Some("acme.io")),
            org("b", "Acme Corp", Some("acme.dev")),
        ]);
        let resolver = IdentityResolver::new(Arc::new(searcher));
        let entity = EntityRecord::new(EntityKind::Buyer, "Acme", "acme");

        match resolver.resolve(&entity).await.unwrap() {
            Resolution::Ambiguous(cands) => assert_eq!(cands.len(), 2),
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_search_is_no_matches() {
        let resolver = IdentityResolver::new(Arc::new(FixedSearcher(vec![])));
        let entity = EntityRecord::new(EntityKind::Buyer, "Ghost Co", "ghost");

        assert!(matches!(
            resolver.resolve(&entity).await.unwrap(),
            Resolution::NoMatches
        ));
    }
}
