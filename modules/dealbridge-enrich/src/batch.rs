//! Batch orchestration: sequential, rate-limited iteration over many
//! entities with per-item failure isolation.

use std::fmt;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use dealbridge_common::{EnrichError, RunScope};

use crate::pipeline::{EnrichOptions, EnrichReport, Enricher, ItemOutcome};

/// Per-item results beyond this many are dropped from the report; the counts
/// always cover every item.
const MAX_REPORTED_ITEMS: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct ItemResult {
    pub entity_id: Uuid,
    pub outcome: ItemOutcome,
    pub fields_updated: Vec<String>,
    pub error: Option<String>,
}

impl From<EnrichReport> for ItemResult {
    fn from(report: EnrichReport) -> Self {
        Self {
            entity_id: report.entity_id,
            outcome: report.status,
            fields_updated: report.fields_updated,
            error: report.error,
        }
    }
}

/// Aggregate outcome of a batch run. Derived, not persisted.
/// `enriched + skipped + errors + no_source == total_processed`, always.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total_processed: u32,
    pub enriched: u32,
    pub skipped: u32,
    pub errors: u32,
    pub no_source: u32,
    pub results: Vec<ItemResult>,
}

impl BatchReport {
    fn record(&mut self, item: ItemResult) {
        self.total_processed += 1;
        match item.outcome {
            ItemOutcome::Enriched => self.enriched += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::NoSource => self.no_source += 1,
            ItemOutcome::Error => self.errors += 1,
        }
        if self.results.len() < MAX_REPORTED_ITEMS {
            self.results.push(item);
        }
    }

    pub fn success(&self) -> bool {
        self.errors == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Batch Run Complete ===")?;
        writeln!(f, "Processed: {}", self.total_processed)?;
        writeln!(f, "Enriched:  {}", self.enriched)?;
        writeln!(f, "Skipped:   {}", self.skipped)?;
        writeln!(f, "No source: {}", self.no_source)?;
        writeln!(f, "Errors:    {}", self.errors)?;
        for item in &self.results {
            if item.outcome == ItemOutcome::Error {
                writeln!(
                    f,
                    "  {} [error] {}",
                    item.entity_id,
                    item.error.as_deref().unwrap_or("unknown")
                )?;
            }
        }
        Ok(())
    }
}

impl Enricher {
    /// Run the pipeline over a list of entity ids, strictly sequentially and
    /// in caller order.
    ///
    /// The inter-item delay is the throttle against third-party rate limits;
    /// after a rate-limited item the next gap doubles, then returns to base.
    /// No item's failure ever aborts the rest, and no item is silently
    /// dropped: the four counters always sum to the number of ids given.
    pub async fn run_batch(
        &self,
        ids: &[Uuid],
        opts: BatchOptions,
    ) -> Result<BatchReport, EnrichError> {
        let run_id = self.audit().log_start(RunScope::Batch, None, None).await?;
        info!(total = ids.len(), force = opts.force, "Batch enrichment starting");

        let mut report = BatchReport::default();
        let base_delay = self.item_delay();
        let mut next_delay = base_delay;

        for (i, id) in ids.iter().enumerate() {
            if i > 0 && !next_delay.is_zero() {
                tokio::time::sleep(next_delay).await;
            }
            next_delay = base_delay;

            let (item, rate_limited) = self.run_batch_item(*id, opts).await;
            if rate_limited {
                next_delay = base_delay * 2;
                warn!(entity_id = %id, "Rate limited; doubling next inter-item delay");
            }
            report.record(item);
        }

        self.log_success(
            run_id,
            "completed",
            Some(json!({
                "total_processed": report.total_processed,
                "enriched": report.enriched,
                "skipped": report.skipped,
                "errors": report.errors,
                "no_source": report.no_source,
            })),
        )
        .await;

        info!(
            total = report.total_processed,
            enriched = report.enriched,
            skipped = report.skipped,
            errors = report.errors,
            no_source = report.no_source,
            "Batch enrichment complete"
        );
        Ok(report)
    }

    /// Run every entity of a kind, in creation order.
    pub async fn run_batch_for_kind(
        &self,
        kind: dealbridge_common::EntityKind,
        opts: BatchOptions,
    ) -> Result<BatchReport, EnrichError> {
        let ids = self.store().list_ids(kind).await?;
        self.run_batch(&ids, opts).await
    }

    /// One item inside a batch. Never fails the batch: even a missing entity
    /// row becomes an `error` outcome.
    async fn run_batch_item(&self, id: Uuid, opts: BatchOptions) -> (ItemResult, bool) {
        let entity = match self.store().get(id).await {
            Ok(entity) => entity,
            Err(e) => {
                warn!(entity_id = %id, error = %e, "Failed to load batch item");
                return (
                    ItemResult {
                        entity_id: id,
                        outcome: ItemOutcome::Error,
                        fields_updated: Vec::new(),
                        error: Some(e.to_string()),
                    },
                    false,
                );
            }
        };

        let (report, rate_limited) = self
            .run_to_report(&entity, EnrichOptions { force: opts.force })
            .await;
        (report.into(), rate_limited)
    }
}
