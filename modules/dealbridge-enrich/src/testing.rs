// Test mocks for the enrichment pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockFetcher (ContentFetcher) — HashMap-based URL→markdown, records call times
// - MockExtractor (ProfileExtractor) — HashMap-based entity-name→outcome
// - MockSearcher (OrgSearcher) — HashMap-based name→matches
// - MockStore (EntityStore + AuditLog) — stateful in-memory rows
//
// Plus helpers for constructing entities and field values.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use dealbridge_common::{
    CandidateMatch, EnrichError, EntityKind, EntityRecord, ExtractFailure, FieldMap, FieldValue,
    ResolutionStatus, RunScope, RunStatus,
};

use crate::acquire::{ContentFetcher, FetchedPage};
use crate::descriptor::EntityDescriptor;
use crate::extract::{CandidateRecord, ExtractOutcome, ProfileExtractor};
use crate::resolver::{OrgMatch, OrgSearcher};
use crate::traits::{AuditLog, EnrichmentStamp, EntityStore};

// ---------------------------------------------------------------------------
// Field value helpers
// ---------------------------------------------------------------------------

pub fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_string())
}

pub fn list(items: &[&str]) -> FieldValue {
    FieldValue::List(items.iter().map(|s| s.to_string()).collect())
}

/// A successful extraction with the given fields.
pub fn extracted(pairs: &[(&str, FieldValue)]) -> ExtractOutcome {
    ExtractOutcome::Success(CandidateRecord {
        fields: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    })
}

/// A page body comfortably above the acquirer's minimum-length threshold.
pub fn long_page(lead: &str) -> String {
    format!(
        "# {lead}\n\nWe provide supply chain software and brokerage services to mid-market \
         shippers across North America, with offices in Chicago and Toronto."
    )
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

pub enum MockFailure {
    RateLimited,
    Unreachable,
}

/// HashMap-based content fetcher. Returns `FetchFailed` for unregistered
/// URLs. Records the (virtual) time of every fetch for spacing assertions.
pub struct MockFetcher {
    pages: HashMap<String, String>,
    failures: HashMap<String, MockFailure>,
    fetches: Mutex<Vec<(String, Instant)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failures: HashMap::new(),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn on_page(mut self, url: &str, markdown: &str) -> Self {
        self.pages.insert(url.to_string(), markdown.to_string());
        self
    }

    pub fn on_failure(mut self, url: &str, failure: MockFailure) -> Self {
        self.failures.insert(url.to_string(), failure);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn fetch_times(&self) -> Vec<Instant> {
        self.fetches.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, EnrichError> {
        self.fetches
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        if let Some(failure) = self.failures.get(url) {
            return Err(match failure {
                MockFailure::RateLimited => EnrichError::RateLimited,
                MockFailure::Unreachable => {
                    EnrichError::FetchFailed("connection refused".to_string())
                }
            });
        }

        match self.pages.get(url) {
            Some(markdown) => Ok(FetchedPage {
                markdown: markdown.clone(),
                title: None,
            }),
            None => Err(EnrichError::FetchFailed(format!(
                "MockFetcher: no page registered for {url}"
            ))),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

enum Scripted {
    Outcome(ExtractOutcome),
    ServiceError(String),
}

/// HashMap-based extractor keyed by entity name. Unregistered entities fail
/// with a service error.
pub struct MockExtractor {
    scripts: HashMap<String, Scripted>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
        }
    }

    pub fn on_entity(mut self, name: &str, outcome: ExtractOutcome) -> Self {
        self.scripts
            .insert(name.to_string(), Scripted::Outcome(outcome));
        self
    }

    pub fn service_error(mut self, name: &str, message: &str) -> Self {
        self.scripts
            .insert(name.to_string(), Scripted::ServiceError(message.to_string()));
        self
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileExtractor for MockExtractor {
    async fn extract(
        &self,
        _descriptor: &EntityDescriptor,
        entity_name: &str,
        _source_url: &str,
        _content: &str,
    ) -> Result<ExtractOutcome, EnrichError> {
        match self.scripts.get(entity_name) {
            Some(Scripted::Outcome(outcome)) => Ok(outcome.clone()),
            Some(Scripted::ServiceError(msg)) => Err(EnrichError::Extraction(
                ExtractFailure::Service(msg.clone()),
            )),
            None => Err(EnrichError::Extraction(ExtractFailure::Service(format!(
                "MockExtractor: no script registered for {entity_name}"
            )))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// HashMap-based organization searcher. Unregistered names return no matches.
pub struct MockSearcher {
    results: HashMap<String, Vec<OrgMatch>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
        }
    }

    pub fn on_query(mut self, name: &str, matches: Vec<OrgMatch>) -> Self {
        self.results.insert(name.to_string(), matches);
        self
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

pub fn org_match(id: &str, name: &str, domain: Option<&str>, industry: Option<&str>) -> OrgMatch {
    OrgMatch {
        id: id.to_string(),
        name: name.to_string(),
        domain: domain.map(String::from),
        industry: industry.map(String::from),
        location: None,
        employee_count: None,
    }
}

#[async_trait]
impl OrgSearcher for MockSearcher {
    async fn search(&self, name: &str) -> Result<Vec<OrgMatch>, EnrichError> {
        Ok(self.results.get(name).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: Uuid,
    pub scope: RunScope,
    pub entity_id: Option<Uuid>,
    pub status: RunStatus,
    pub outcome: Option<String>,
    pub error: Option<String>,
    pub summary: Option<serde_json::Value>,
}

/// In-memory entity rows plus an append-only run trail, behind the same
/// traits the Postgres store implements.
pub struct MockStore {
    entities: Mutex<HashMap<Uuid, EntityRecord>>,
    order: Mutex<Vec<Uuid>>,
    runs: Mutex<Vec<RunRecord>>,
    fail_writes: Mutex<Option<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            fail_writes: Mutex::new(None),
        }
    }

    pub fn seed(&self, entity: EntityRecord) -> Uuid {
        let id = entity.id;
        self.order.lock().unwrap().push(id);
        self.entities.lock().unwrap().insert(id, entity);
        id
    }

    /// Make every enrichment write fail with this message.
    pub fn fail_writes_with(&self, message: &str) {
        *self.fail_writes.lock().unwrap() = Some(message.to_string());
    }

    pub fn entity(&self, id: Uuid) -> EntityRecord {
        self.entities
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .expect("entity not seeded")
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.lock().unwrap().clone()
    }

    fn write_guard(&self) -> Result<(), EnrichError> {
        if let Some(msg) = self.fail_writes.lock().unwrap().clone() {
            return Err(EnrichError::Persist(msg));
        }
        Ok(())
    }

    fn with_entity<F>(&self, id: Uuid, f: F) -> Result<(), EnrichError>
    where
        F: FnOnce(&mut EntityRecord),
    {
        let mut entities = self.entities.lock().unwrap();
        let entity = entities.get_mut(&id).ok_or(EnrichError::EntityNotFound(id))?;
        f(entity);
        Ok(())
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MockStore {
    async fn get(&self, id: Uuid) -> Result<EntityRecord, EnrichError> {
        self.entities
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(EnrichError::EntityNotFound(id))
    }

    async fn apply_enrichment(
        &self,
        id: Uuid,
        updates: &FieldMap,
        stamp: &EnrichmentStamp,
    ) -> Result<(), EnrichError> {
        self.write_guard()?;
        self.with_entity(id, |entity| {
            entity.fields.extend(updates.clone());
            entity.enriched_at = Some(stamp.enriched_at);
            entity.enrichment_source = Some(stamp.source.clone());
            entity.enriched_data = Some(stamp.snapshot.clone());
        })
    }

    async fn apply_fields(&self, id: Uuid, updates: &FieldMap) -> Result<(), EnrichError> {
        self.write_guard()?;
        self.with_entity(id, |entity| {
            entity.fields.extend(updates.clone());
        })
    }

    async fn set_candidates(
        &self,
        id: Uuid,
        candidates: &[CandidateMatch],
        resolution: ResolutionStatus,
    ) -> Result<(), EnrichError> {
        self.with_entity(id, |entity| {
            entity.candidates = candidates.to_vec();
            entity.resolution = resolution;
        })
    }

    async fn clear_candidates(&self, id: Uuid) -> Result<(), EnrichError> {
        self.with_entity(id, |entity| {
            entity.candidates.clear();
        })
    }

    async fn set_resolution(
        &self,
        id: Uuid,
        resolution: ResolutionStatus,
    ) -> Result<(), EnrichError> {
        self.with_entity(id, |entity| {
            entity.resolution = resolution;
        })
    }

    async fn set_website(&self, id: Uuid, website: &str) -> Result<(), EnrichError> {
        self.with_entity(id, |entity| {
            entity.website = Some(website.to_string());
        })
    }

    async fn list_ids(&self, kind: EntityKind) -> Result<Vec<Uuid>, EnrichError> {
        let entities = self.entities.lock().unwrap();
        Ok(self
            .order
            .lock()
            .unwrap()
            .iter()
            .filter(|id| entities.get(id).map(|e| e.kind) == Some(kind))
            .copied()
            .collect())
    }
}

#[async_trait]
impl AuditLog for MockStore {
    async fn log_start(
        &self,
        scope: RunScope,
        entity_id: Option<Uuid>,
        _entity_kind: Option<EntityKind>,
    ) -> Result<Uuid, EnrichError> {
        let id = Uuid::new_v4();
        self.runs.lock().unwrap().push(RunRecord {
            id,
            scope,
            entity_id,
            status: RunStatus::Running,
            outcome: None,
            error: None,
            summary: None,
        });
        Ok(id)
    }

    async fn log_success(
        &self,
        run_id: Uuid,
        outcome: &str,
        summary: Option<serde_json::Value>,
    ) -> Result<(), EnrichError> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == RunStatus::Running)
        {
            run.status = RunStatus::Completed;
            run.outcome = Some(outcome.to_string());
            run.summary = summary;
        }
        Ok(())
    }

    async fn log_error(
        &self,
        run_id: Uuid,
        outcome: &str,
        message: &str,
    ) -> Result<(), EnrichError> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == RunStatus::Running)
        {
            run.status = RunStatus::Error;
            run.outcome = Some(outcome.to_string());
            run.error = Some(message.to_string());
        }
        Ok(())
    }
}
