// Entity rows: upsert keyed by (kind, natural_key), enrichment writes scoped
// to a single entity id.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use dealbridge_common::{
    CandidateMatch, EntityKind, EntityRecord, FieldMap, ResolutionStatus,
};

use crate::error::{Result, StoreError};
use crate::PgStore;

/// A row from the entities table.
#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    kind: String,
    name: String,
    natural_key: String,
    website: Option<String>,
    fields: serde_json::Value,
    enriched_at: Option<DateTime<Utc>>,
    enrichment_source: Option<String>,
    enriched_data: Option<serde_json::Value>,
    resolution: String,
    candidates: serde_json::Value,
}

impl EntityRow {
    fn into_record(self) -> Result<EntityRecord> {
        let kind: EntityKind = self
            .kind
            .parse()
            .map_err(|e: String| StoreError::Conflict { message: e })?;
        let fields: FieldMap = serde_json::from_value(self.fields).unwrap_or_default();
        let candidates: Vec<CandidateMatch> =
            serde_json::from_value(self.candidates).unwrap_or_default();
        let resolution = match self.resolution.as_str() {
            "ambiguous" => ResolutionStatus::Ambiguous,
            "ok" => ResolutionStatus::Ok,
            "error" => ResolutionStatus::Error,
            _ => ResolutionStatus::Unresolved,
        };

        Ok(EntityRecord {
            id: self.id,
            kind,
            name: self.name,
            natural_key: self.natural_key,
            website: self.website,
            fields,
            enriched_at: self.enriched_at,
            enrichment_source: self.enrichment_source,
            enriched_data: self.enriched_data,
            resolution,
            candidates,
        })
    }
}

fn resolution_str(status: ResolutionStatus) -> &'static str {
    match status {
        ResolutionStatus::Unresolved => "unresolved",
        ResolutionStatus::Ambiguous => "ambiguous",
        ResolutionStatus::Ok => "ok",
        ResolutionStatus::Error => "error",
    }
}

/// Metadata written alongside every successful extraction, regardless of
/// merge mode: it describes the run, not the business content.
#[derive(Debug, Clone)]
pub struct EnrichmentMeta {
    pub enriched_at: DateTime<Utc>,
    pub source: String,
    pub snapshot: serde_json::Value,
}

impl PgStore {
    pub async fn get_entity(&self, id: Uuid) -> Result<EntityRecord> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, kind, name, natural_key, website, fields,
                   enriched_at, enrichment_source, enriched_data,
                   resolution, candidates
            FROM entities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        row.into_record()
    }

    pub async fn find_by_natural_key(
        &self,
        kind: EntityKind,
        natural_key: &str,
    ) -> Result<Option<EntityRecord>> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, kind, name, natural_key, website, fields,
                   enriched_at, enrichment_source, enriched_data,
                   resolution, candidates
            FROM entities
            WHERE kind = $1 AND natural_key = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(natural_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EntityRow::into_record).transpose()
    }

    /// Create or update an entity, keyed by (kind, natural_key). Re-importing
    /// the same record updates identity fields and never duplicates the row.
    pub async fn upsert_entity(&self, entity: &EntityRecord) -> Result<Uuid> {
        let fields = serde_json::to_value(&entity.fields).unwrap_or_default();
        let candidates = serde_json::to_value(&entity.candidates).unwrap_or_default();

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO entities
                (id, kind, name, natural_key, website, fields,
                 enriched_at, enrichment_source, enriched_data,
                 resolution, candidates)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (kind, natural_key) DO UPDATE
                SET name = EXCLUDED.name,
                    website = COALESCE(EXCLUDED.website, entities.website),
                    updated_at = now()
            RETURNING id
            "#,
        )
        .bind(entity.id)
        .bind(entity.kind.as_str())
        .bind(&entity.name)
        .bind(&entity.natural_key)
        .bind(&entity.website)
        .bind(&fields)
        .bind(entity.enriched_at)
        .bind(&entity.enrichment_source)
        .bind(&entity.enriched_data)
        .bind(resolution_str(entity.resolution))
        .bind(&candidates)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, "entity"))?;

        debug!(id = %id, kind = %entity.kind, key = %entity.natural_key, "Entity upserted");
        Ok(id)
    }

    /// Ids of all entities of a kind, in creation order.
    pub async fn list_entity_ids(&self, kind: EntityKind) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT id FROM entities WHERE kind = $1 ORDER BY created_at",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Apply an enrichment write: merge the field-level update set into the
    /// profile and refresh the run metadata. `fields || $2` merges top-level
    /// keys, so untouched fields keep their persisted values.
    pub async fn apply_enrichment(
        &self,
        id: Uuid,
        updates: &FieldMap,
        meta: &EnrichmentMeta,
    ) -> Result<()> {
        let updates = serde_json::to_value(updates).unwrap_or_default();

        let affected = sqlx::query(
            r#"
            UPDATE entities
            SET fields = fields || $2,
                enriched_at = $3,
                enrichment_source = $4,
                enriched_data = $5,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&updates)
        .bind(meta.enriched_at)
        .bind(&meta.source)
        .bind(&meta.snapshot)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, "entity"))?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Merge profile fields without touching enrichment metadata. Used when
    /// the data being written came from a search step, not an extraction.
    pub async fn apply_fields(&self, id: Uuid, updates: &FieldMap) -> Result<()> {
        let updates = serde_json::to_value(updates).unwrap_or_default();

        let affected = sqlx::query(
            "UPDATE entities SET fields = fields || $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(&updates)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, "entity"))?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub async fn set_website(&self, id: Uuid, website: &str) -> Result<()> {
        let affected =
            sqlx::query("UPDATE entities SET website = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(website)
                .execute(&self.pool)
                .await?
                .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub async fn set_candidates(
        &self,
        id: Uuid,
        candidates: &[CandidateMatch],
        resolution: ResolutionStatus,
    ) -> Result<()> {
        let candidates = serde_json::to_value(candidates).unwrap_or_default();

        let affected = sqlx::query(
            r#"
            UPDATE entities
            SET candidates = $2, resolution = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&candidates)
        .bind(resolution_str(resolution))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub async fn clear_candidates(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE entities SET candidates = '[]'::jsonb, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_resolution(&self, id: Uuid, status: ResolutionStatus) -> Result<()> {
        sqlx::query("UPDATE entities SET resolution = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(resolution_str(status))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete an entity. A foreign-key conflict (e.g. the entity is linked to
    /// an active deal) comes back as a remediation hint, not a raw DB error.
    pub async fn delete_entity(&self, id: Uuid) -> Result<()> {
        let affected = sqlx::query("DELETE FROM entities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_write(e, "entity"))?
            .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
