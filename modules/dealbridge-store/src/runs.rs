// Pipeline run rows: one per invocation, created running, finalized exactly
// once, never deleted.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use dealbridge_common::{EntityKind, PipelineRun, RunScope, RunStatus};

use crate::error::{Result, StoreError};
use crate::PgStore;

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    scope: String,
    entity_id: Option<Uuid>,
    entity_kind: Option<String>,
    status: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    outcome: Option<String>,
    error: Option<String>,
    summary: Option<serde_json::Value>,
}

impl RunRow {
    fn into_run(self) -> PipelineRun {
        let scope = match self.scope.as_str() {
            "batch" => RunScope::Batch,
            "preview" => RunScope::Preview,
            _ => RunScope::Single,
        };
        let status = match self.status.as_str() {
            "completed" => RunStatus::Completed,
            "error" => RunStatus::Error,
            _ => RunStatus::Running,
        };
        PipelineRun {
            id: self.id,
            scope,
            entity_id: self.entity_id,
            entity_kind: self.entity_kind.and_then(|k| k.parse().ok()),
            status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            outcome: self.outcome,
            error: self.error,
            summary: self.summary,
        }
    }
}

impl PgStore {
    /// Record the start of a pipeline invocation. Returns the run id used to
    /// finalize it.
    pub async fn insert_run(
        &self,
        scope: RunScope,
        entity_id: Option<Uuid>,
        entity_kind: Option<EntityKind>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO pipeline_runs (id, scope, entity_id, entity_kind, status, started_at)
            VALUES ($1, $2, $3, $4, 'running', $5)
            "#,
        )
        .bind(id)
        .bind(scope.as_str())
        .bind(entity_id)
        .bind(entity_kind.map(|k| k.as_str()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Finalize a run as completed. Finalization only applies to rows still
    /// running; a second call is a no-op and logs a warning.
    pub async fn finish_run_success(
        &self,
        run_id: Uuid,
        outcome: &str,
        summary: Option<serde_json::Value>,
    ) -> Result<()> {
        let affected = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = 'completed', finished_at = $2, outcome = $3, summary = $4
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(Utc::now())
        .bind(outcome)
        .bind(&summary)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            warn!(run_id = %run_id, "Run already finalized, success ignored");
        }
        Ok(())
    }

    /// Finalize a run as failed.
    pub async fn finish_run_error(&self, run_id: Uuid, outcome: &str, message: &str) -> Result<()> {
        let affected = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = 'error', finished_at = $2, outcome = $3, error = $4
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(Utc::now())
        .bind(outcome)
        .bind(message)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            warn!(run_id = %run_id, "Run already finalized, error ignored");
        }
        Ok(())
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<PipelineRun> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, scope, entity_id, entity_kind, status,
                   started_at, finished_at, outcome, error, summary
            FROM pipeline_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(run_id))?;

        Ok(row.into_run())
    }

    /// Most recent runs for an entity, newest first.
    pub async fn runs_for_entity(&self, entity_id: Uuid, limit: i64) -> Result<Vec<PipelineRun>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, scope, entity_id, entity_kind, status,
                   started_at, finished_at, outcome, error, summary
            FROM pipeline_runs
            WHERE entity_id = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(entity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RunRow::into_run).collect())
    }
}
