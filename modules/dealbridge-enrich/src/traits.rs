// Trait abstractions for the pipeline's persistence dependencies.
//
// EntityStore and AuditLog put all Postgres access behind seams the tests
// can fill with in-memory mocks: no network, no database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dealbridge_common::{
    CandidateMatch, EnrichError, EntityKind, EntityRecord, FieldMap, ResolutionStatus, RunScope,
};
use dealbridge_store::{EnrichmentMeta, PgStore, StoreError};

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

/// Run metadata stamped alongside every successful extraction, regardless of
/// merge mode.
#[derive(Debug, Clone)]
pub struct EnrichmentStamp {
    pub enriched_at: DateTime<Utc>,
    pub source: String,
    /// The extractor's output verbatim, for audit and replay.
    pub snapshot: serde_json::Value,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<EntityRecord, EnrichError>;

    /// Write the merge plan's update set and refresh the run metadata, scoped
    /// to one entity id.
    async fn apply_enrichment(
        &self,
        id: Uuid,
        updates: &FieldMap,
        stamp: &EnrichmentStamp,
    ) -> Result<(), EnrichError>;

    /// Write profile fields without touching run metadata. Used by the
    /// confirm fallback, which persists search-step data rather than an
    /// extraction.
    async fn apply_fields(&self, id: Uuid, updates: &FieldMap) -> Result<(), EnrichError>;

    async fn set_candidates(
        &self,
        id: Uuid,
        candidates: &[CandidateMatch],
        resolution: ResolutionStatus,
    ) -> Result<(), EnrichError>;

    async fn clear_candidates(&self, id: Uuid) -> Result<(), EnrichError>;

    async fn set_resolution(&self, id: Uuid, resolution: ResolutionStatus)
        -> Result<(), EnrichError>;

    async fn set_website(&self, id: Uuid, website: &str) -> Result<(), EnrichError>;

    /// Ids of all entities of a kind, in creation order.
    async fn list_ids(&self, kind: EntityKind) -> Result<Vec<Uuid>, EnrichError>;
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Append-only invocation trail. Every pipeline invocation writes exactly one
/// start record and exactly one terminal record.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn log_start(
        &self,
        scope: RunScope,
        entity_id: Option<Uuid>,
        entity_kind: Option<EntityKind>,
    ) -> Result<Uuid, EnrichError>;

    async fn log_success(
        &self,
        run_id: Uuid,
        outcome: &str,
        summary: Option<serde_json::Value>,
    ) -> Result<(), EnrichError>;

    async fn log_error(&self, run_id: Uuid, outcome: &str, message: &str)
        -> Result<(), EnrichError>;
}

// ---------------------------------------------------------------------------
// Postgres implementations
// ---------------------------------------------------------------------------

fn store_err(err: StoreError) -> EnrichError {
    match err {
        StoreError::NotFound(id) => EnrichError::EntityNotFound(id),
        StoreError::Conflict { message } => EnrichError::Persist(message),
        StoreError::Database(e) => EnrichError::Persist(e.to_string()),
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<EntityRecord, EnrichError> {
        self.get_entity(id).await.map_err(store_err)
    }

    async fn apply_enrichment(
        &self,
        id: Uuid,
        updates: &FieldMap,
        stamp: &EnrichmentStamp,
    ) -> Result<(), EnrichError> {
        let meta = EnrichmentMeta {
            enriched_at: stamp.enriched_at,
            source: stamp.source.clone(),
            snapshot: stamp.snapshot.clone(),
        };
        PgStore::apply_enrichment(self, id, updates, &meta)
            .await
            .map_err(store_err)
    }

    async fn apply_fields(&self, id: Uuid, updates: &FieldMap) -> Result<(), EnrichError> {
        PgStore::apply_fields(self, id, updates).await.map_err(store_err)
    }

    async fn set_candidates(
        &self,
        id: Uuid,
        candidates: &[CandidateMatch],
        resolution: ResolutionStatus,
    ) -> Result<(), EnrichError> {
        PgStore::set_candidates(self, id, candidates, resolution)
            .await
            .map_err(store_err)
    }

    async fn clear_candidates(&self, id: Uuid) -> Result<(), EnrichError> {
        PgStore::clear_candidates(self, id).await.map_err(store_err)
    }

    async fn set_resolution(
        &self,
        id: Uuid,
        resolution: ResolutionStatus,
    ) -> Result<(), EnrichError> {
        PgStore::set_resolution(self, id, resolution)
            .await
            .map_err(store_err)
    }

    async fn set_website(&self, id: Uuid, website: &str) -> Result<(), EnrichError> {
        PgStore::set_website(self, id, website).await.map_err(store_err)
    }

    async fn list_ids(&self, kind: EntityKind) -> Result<Vec<Uuid>, EnrichError> {
        self.list_entity_ids(kind).await.map_err(store_err)
    }
}

#[async_trait]
impl AuditLog for PgStore {
    async fn log_start(
        &self,
        scope: RunScope,
        entity_id: Option<Uuid>,
        entity_kind: Option<EntityKind>,
    ) -> Result<Uuid, EnrichError> {
        self.insert_run(scope, entity_id, entity_kind)
            .await
            .map_err(store_err)
    }

    async fn log_success(
        &self,
        run_id: Uuid,
        outcome: &str,
        summary: Option<serde_json::Value>,
    ) -> Result<(), EnrichError> {
        self.finish_run_success(run_id, outcome, summary)
            .await
            .map_err(store_err)
    }

    async fn log_error(
        &self,
        run_id: Uuid,
        outcome: &str,
        message: &str,
    ) -> Result<(), EnrichError> {
        self.finish_run_error(run_id, outcome, message)
            .await
            .map_err(store_err)
    }
}
