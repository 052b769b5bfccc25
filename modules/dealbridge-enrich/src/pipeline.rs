//! The single-entity pipeline: acquire → extract → merge → persist → log,
//! with identity resolution and confirmation on top.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use dealbridge_common::{
    CandidateMatch, EnrichError, EntityRecord, ExtractFailure, FieldMap, FieldValue,
    ResolutionStatus, RunScope,
};

use crate::acquire::{ContentFetcher, SourceAcquirer};
use crate::descriptor::{descriptor, EntityDescriptor};
use crate::extract::{CandidateRecord, ExtractOutcome, ProfileExtractor};
use crate::merge::{plan_merge, MergeMode, MergePlan};
use crate::resolver::{IdentityResolver, OrgSearcher, Resolution};
use crate::traits::{AuditLog, EnrichmentStamp, EntityStore};

// ---------------------------------------------------------------------------
// Options and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichOptions {
    /// Overwrite populated fields instead of filling only empty ones, and
    /// re-run entities that are already enriched.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Enriched,
    Skipped,
    NoSource,
    Error,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Enriched => "enriched",
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::NoSource => "no_source",
            ItemOutcome::Error => "error",
        }
    }
}

/// Caller-facing result of one entity's run.
#[derive(Debug, Clone)]
pub struct EnrichReport {
    pub entity_id: Uuid,
    pub status: ItemOutcome,
    pub fields_updated: Vec<String>,
    pub source_locator: Option<String>,
    pub error: Option<String>,
}

impl EnrichReport {
    pub fn success(&self) -> bool {
        !matches!(self.status, ItemOutcome::Error)
    }
}

impl fmt::Display for EnrichReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.entity_id, self.status.as_str())?;
        if !self.fields_updated.is_empty() {
            write!(f, " updated: {}", self.fields_updated.join(", "))?;
        }
        if let Some(ref source) = self.source_locator {
            write!(f, " from {source}")?;
        }
        if let Some(ref error) = self.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

/// Candidate record beside the current profile, for human review before
/// anything is committed.
#[derive(Debug, Clone)]
pub struct PreviewReport {
    pub current: EntityRecord,
    pub candidate: CandidateRecord,
    pub source_locator: String,
}

/// Result of an identity-resolution run.
#[derive(Debug)]
pub enum ResolveReport {
    /// A match was confirmed (automatically) and the pipeline ran against it.
    Report(EnrichReport),
    /// Candidates were persisted; a human picks one via `confirm`.
    Ambiguous(Vec<CandidateMatch>),
    NoMatches,
}

enum ItemSuccess {
    Skipped,
    Enriched { plan: MergePlan, locator: String },
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

pub struct Enricher {
    store: Arc<dyn EntityStore>,
    audit: Arc<dyn AuditLog>,
    acquirer: SourceAcquirer,
    extractor: Arc<dyn ProfileExtractor>,
    resolver: IdentityResolver,
    item_delay: Duration,
}

impl Enricher {
    pub fn new(
        store: Arc<dyn EntityStore>,
        audit: Arc<dyn AuditLog>,
        fetcher: Arc<dyn ContentFetcher>,
        extractor: Arc<dyn ProfileExtractor>,
        searcher: Arc<dyn OrgSearcher>,
        item_delay: Duration,
    ) -> Self {
        Self {
            store,
            audit,
            acquirer: SourceAcquirer::new(fetcher),
            extractor,
            resolver: IdentityResolver::new(searcher),
            item_delay,
        }
    }

    pub fn item_delay(&self) -> Duration {
        self.item_delay
    }

    pub(crate) fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub(crate) fn audit(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    // -----------------------------------------------------------------------
    // Single-entity run
    // -----------------------------------------------------------------------

    /// Run the full pipeline for one entity.
    ///
    /// Per-item failures come back inside the report; only invocation-level
    /// problems (unknown entity, audit insert failing) escape as `Err`.
    pub async fn enrich_entity(
        &self,
        id: Uuid,
        opts: EnrichOptions,
    ) -> Result<EnrichReport, EnrichError> {
        let entity = self.store.get(id).await?;
        let run_id = self
            .audit
            .log_start(RunScope::Single, Some(id), Some(entity.kind))
            .await?;

        let (report, _rate_limited) = self.run_to_report(&entity, opts).await;
        self.finalize(run_id, &report).await;
        Ok(report)
    }

    /// Acquire and extract only; nothing is written. Returns the candidate
    /// record beside the current profile for human review.
    pub async fn preview(&self, id: Uuid) -> Result<PreviewReport, EnrichError> {
        let entity = self.store.get(id).await?;
        let run_id = self
            .audit
            .log_start(RunScope::Preview, Some(id), Some(entity.kind))
            .await?;

        let result = self.preview_inner(&entity).await;
        match &result {
            Ok(p) => {
                self.log_success(run_id, "preview", Some(json!({ "source": p.source_locator })))
                    .await
            }
            Err(e) => self.log_error(run_id, "error", &e.to_string()).await,
        }
        result
    }

    async fn preview_inner(&self, entity: &EntityRecord) -> Result<PreviewReport, EnrichError> {
        let acquired = self.acquirer.acquire(entity.website.as_deref()).await?;
        let candidate = self
            .extract_candidate(descriptor(entity.kind), entity, &acquired.locator, &acquired.content)
            .await?;

        Ok(PreviewReport {
            current: entity.clone(),
            candidate,
            source_locator: acquired.locator,
        })
    }

    // -----------------------------------------------------------------------
    // Identity resolution
    // -----------------------------------------------------------------------

    /// Match the entity to an external organization, then either enrich
    /// straight away (auto-confirm) or persist candidates for a human.
    pub async fn resolve_identity(&self, id: Uuid) -> Result<ResolveReport, EnrichError> {
        let entity = self.store.get(id).await?;
        let run_id = self
            .audit
            .log_start(RunScope::Single, Some(id), Some(entity.kind))
            .await?;

        let resolution = match self.resolver.resolve(&entity).await {
            Ok(r) => r,
            Err(e) => {
                self.mark_resolution(id, ResolutionStatus::Error).await;
                self.log_error(run_id, "error", &e.to_string()).await;
                return Ok(ResolveReport::Report(self.error_report(id, &e)));
            }
        };

        match resolution {
            Resolution::AutoConfirmed(org) => {
                let report = self
                    .enrich_against(&entity, org.domain.as_deref(), MergeMode::FillIfEmpty)
                    .await;
                if report.status == ItemOutcome::Enriched && entity.website.is_none() {
                    if let Some(ref domain) = org.domain {
                        if let Err(e) = self.store.set_website(id, domain).await {
                            warn!(entity_id = %id, error = %e, "Failed to persist resolved website");
                        }
                    }
                }
                let status = if report.success() {
                    ResolutionStatus::Ok
                } else {
                    ResolutionStatus::Error
                };
                self.mark_resolution(id, status).await;
                self.finalize(run_id, &report).await;
                Ok(ResolveReport::Report(report))
            }
            Resolution::Ambiguous(candidates) => {
                if let Err(e) = self
                    .store
                    .set_candidates(id, &candidates, ResolutionStatus::Ambiguous)
                    .await
                {
                    self.log_error(run_id, "error", &e.to_string()).await;
                    return Err(e);
                }
                self.log_success(
                    run_id,
                    "ambiguous",
                    Some(json!({ "candidates": candidates.len() })),
                )
                .await;
                Ok(ResolveReport::Ambiguous(candidates))
            }
            Resolution::NoMatches => {
                self.mark_resolution(id, ResolutionStatus::Error).await;
                self.log_error(run_id, "error", "identity search returned no matches")
                    .await;
                Ok(ResolveReport::NoMatches)
            }
        }
    }

    /// Act on a human's pick from the persisted candidate list.
    ///
    /// Re-runs acquisition/extraction against the chosen candidate. If that
    /// fails, the candidate's own summary fields are persisted instead —
    /// partial data beats no data once identity has been decided. The
    /// candidate list is cleared in every branch.
    pub async fn confirm(&self, id: Uuid, candidate_id: &str) -> Result<EnrichReport, EnrichError> {
        let entity = self.store.get(id).await?;
        let candidate = entity
            .candidates
            .iter()
            .find(|c| c.id == candidate_id)
            .cloned()
            .ok_or_else(|| EnrichError::UnknownCandidate(candidate_id.to_string()))?;

        let run_id = self
            .audit
            .log_start(RunScope::Single, Some(id), Some(entity.kind))
            .await?;

        let attempt = match candidate.domain.as_deref() {
            Some(domain) => {
                self.run_against_locator(&entity, Some(domain), MergeMode::FillIfEmpty)
                    .await
            }
            None => Err(EnrichError::NoSource),
        };

        let report = match attempt {
            Ok(ItemSuccess::Enriched { plan, locator }) => {
                if entity.website.is_none() {
                    if let Err(e) = self.store.set_website(id, &locator).await {
                        warn!(entity_id = %id, error = %e, "Failed to persist confirmed website");
                    }
                }
                self.clear_and_mark(id, ResolutionStatus::Ok).await;
                let report = EnrichReport {
                    entity_id: id,
                    status: ItemOutcome::Enriched,
                    fields_updated: plan.changed_fields,
                    source_locator: Some(locator),
                    error: None,
                };
                self.finalize(run_id, &report).await;
                report
            }
            Ok(ItemSuccess::Skipped) => unreachable!("confirm never skips"),
            Err(e) => {
                warn!(entity_id = %id, error = %e, "Confirmed-candidate pipeline failed, using search summary");
                self.confirm_fallback(run_id, &entity, &candidate, &e).await
            }
        };

        Ok(report)
    }

    /// Degrade gracefully: persist what the search step already told us about
    /// the chosen candidate.
    async fn confirm_fallback(
        &self,
        run_id: Uuid,
        entity: &EntityRecord,
        candidate: &CandidateMatch,
        cause: &EnrichError,
    ) -> EnrichReport {
        let updates = fallback_fields(descriptor(entity.kind), &entity.fields, candidate);

        let write = if updates.is_empty() {
            Ok(())
        } else {
            self.store.apply_fields(entity.id, &updates).await
        };

        if entity.website.is_none() {
            if let Some(ref domain) = candidate.domain {
                if let Err(e) = self.store.set_website(entity.id, domain).await {
                    warn!(entity_id = %entity.id, error = %e, "Failed to persist candidate domain");
                }
            }
        }

        match write {
            Ok(()) => {
                self.clear_and_mark(entity.id, ResolutionStatus::Ok).await;
                let fields_updated: Vec<String> = updates.keys().cloned().collect();
                self.log_success(
                    run_id,
                    "fallback",
                    Some(json!({
                        "fields_updated": fields_updated,
                        "cause": cause.to_string(),
                    })),
                )
                .await;
                EnrichReport {
                    entity_id: entity.id,
                    status: ItemOutcome::Enriched,
                    fields_updated,
                    source_locator: candidate.domain.clone(),
                    error: Some(format!(
                        "re-extraction failed ({cause}); persisted candidate summary instead"
                    )),
                }
            }
            Err(write_err) => {
                self.clear_and_mark(entity.id, ResolutionStatus::Error).await;
                let message =
                    format!("re-extraction failed ({cause}); fallback write failed ({write_err})");
                self.log_error(run_id, "error", &message).await;
                EnrichReport {
                    entity_id: entity.id,
                    status: ItemOutcome::Error,
                    fields_updated: Vec::new(),
                    source_locator: candidate.domain.clone(),
                    error: Some(message),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Shared internals
    // -----------------------------------------------------------------------

    /// Run one item and fold every failure into a report. The bool reports
    /// whether the failure was a rate limit, so the batch loop can slow down.
    pub(crate) async fn run_to_report(
        &self,
        entity: &EntityRecord,
        opts: EnrichOptions,
    ) -> (EnrichReport, bool) {
        match self.run_item(entity, opts).await {
            Ok(ItemSuccess::Skipped) => (
                EnrichReport {
                    entity_id: entity.id,
                    status: ItemOutcome::Skipped,
                    fields_updated: Vec::new(),
                    source_locator: None,
                    error: None,
                },
                false,
            ),
            Ok(ItemSuccess::Enriched { plan, locator }) => {
                info!(
                    entity_id = %entity.id,
                    fields = plan.changed_fields.len(),
                    source = %locator,
                    "Entity enriched"
                );
                (
                    EnrichReport {
                        entity_id: entity.id,
                        status: ItemOutcome::Enriched,
                        fields_updated: plan.changed_fields,
                        source_locator: Some(locator),
                        error: None,
                    },
                    false,
                )
            }
            Err(e) => {
                let rate_limited = matches!(e, EnrichError::RateLimited);
                (self.error_report(entity.id, &e), rate_limited)
            }
        }
    }

    async fn run_item(
        &self,
        entity: &EntityRecord,
        opts: EnrichOptions,
    ) -> Result<ItemSuccess, EnrichError> {
        if entity.enriched_at.is_some() && !opts.force {
            return Ok(ItemSuccess::Skipped);
        }
        let mode = if opts.force {
            MergeMode::Force
        } else {
            MergeMode::FillIfEmpty
        };
        self.run_against_locator(entity, entity.website.as_deref(), mode)
            .await
    }

    async fn run_against_locator(
        &self,
        entity: &EntityRecord,
        locator: Option<&str>,
        mode: MergeMode,
    ) -> Result<ItemSuccess, EnrichError> {
        let acquired = self.acquirer.acquire(locator).await?;
        let d = descriptor(entity.kind);
        let candidate = self
            .extract_candidate(d, entity, &acquired.locator, &acquired.content)
            .await?;

        let plan = plan_merge(d, &entity.fields, &candidate, mode);
        let stamp = EnrichmentStamp {
            enriched_at: Utc::now(),
            source: acquired.locator.clone(),
            snapshot: serde_json::to_value(&candidate.fields).unwrap_or_default(),
        };
        self.store
            .apply_enrichment(entity.id, &plan.updates, &stamp)
            .await?;

        Ok(ItemSuccess::Enriched {
            plan,
            locator: acquired.locator,
        })
    }

    async fn extract_candidate(
        &self,
        d: &EntityDescriptor,
        entity: &EntityRecord,
        locator: &str,
        content: &str,
    ) -> Result<CandidateRecord, EnrichError> {
        let outcome = self
            .extractor
            .extract(d, &entity.name, locator, content)
            .await?;

        match outcome {
            ExtractOutcome::Success(candidate) => Ok(candidate),
            ExtractOutcome::Insufficient => {
                Err(EnrichError::Extraction(ExtractFailure::Insufficient))
            }
            ExtractOutcome::Malformed(msg) => {
                Err(EnrichError::Extraction(ExtractFailure::Malformed(msg)))
            }
        }
    }

    /// Like `run_against_locator`, but folded straight into a report. Used by
    /// the auto-confirm path, which already holds the locator.
    async fn enrich_against(
        &self,
        entity: &EntityRecord,
        locator: Option<&str>,
        mode: MergeMode,
    ) -> EnrichReport {
        match self.run_against_locator(entity, locator, mode).await {
            Ok(ItemSuccess::Enriched { plan, locator }) => EnrichReport {
                entity_id: entity.id,
                status: ItemOutcome::Enriched,
                fields_updated: plan.changed_fields,
                source_locator: Some(locator),
                error: None,
            },
            Ok(ItemSuccess::Skipped) => unreachable!("locator runs never skip"),
            Err(e) => self.error_report(entity.id, &e),
        }
    }

    fn error_report(&self, entity_id: Uuid, e: &EnrichError) -> EnrichReport {
        let status = match e {
            EnrichError::NoSource => ItemOutcome::NoSource,
            _ => ItemOutcome::Error,
        };
        if let EnrichError::Extraction(ref failure) = e {
            warn!(entity_id = %entity_id, kind = failure.label(), "Extraction failed");
        } else {
            warn!(entity_id = %entity_id, error = %e, "Pipeline item failed");
        }
        EnrichReport {
            entity_id,
            status,
            fields_updated: Vec::new(),
            source_locator: None,
            error: Some(e.to_string()),
        }
    }

    /// Write the invocation's terminal audit record. A skipped item is a
    /// policy decision and logs as success; `no_source` never gets a success
    /// entry.
    pub(crate) async fn finalize(&self, run_id: Uuid, report: &EnrichReport) {
        match report.status {
            ItemOutcome::Enriched => {
                self.log_success(
                    run_id,
                    "enriched",
                    Some(json!({
                        "fields_updated": report.fields_updated,
                        "source": report.source_locator,
                    })),
                )
                .await
            }
            ItemOutcome::Skipped => self.log_success(run_id, "skipped", None).await,
            ItemOutcome::NoSource => {
                let msg = report.error.as_deref().unwrap_or("no source locator");
                self.log_error(run_id, "no_source", msg).await
            }
            ItemOutcome::Error => {
                let msg = report.error.as_deref().unwrap_or("unknown error");
                self.log_error(run_id, "error", msg).await
            }
        }
    }

    pub(crate) async fn log_success(
        &self,
        run_id: Uuid,
        outcome: &str,
        summary: Option<serde_json::Value>,
    ) {
        if let Err(e) = self.audit.log_success(run_id, outcome, summary).await {
            warn!(run_id = %run_id, error = %e, "Failed to finalize audit record");
        }
    }

    pub(crate) async fn log_error(&self, run_id: Uuid, outcome: &str, message: &str) {
        if let Err(e) = self.audit.log_error(run_id, outcome, message).await {
            warn!(run_id = %run_id, error = %e, "Failed to finalize audit record");
        }
    }

    async fn mark_resolution(&self, id: Uuid, status: ResolutionStatus) {
        if let Err(e) = self.store.set_resolution(id, status).await {
            warn!(entity_id = %id, error = %e, "Failed to update resolution status");
        }
    }

    async fn clear_and_mark(&self, id: Uuid, status: ResolutionStatus) {
        if let Err(e) = self.store.clear_candidates(id).await {
            warn!(entity_id = %id, error = %e, "Failed to clear candidate list");
        }
        self.mark_resolution(id, status).await;
    }
}

/// Map a search candidate's summary onto the descriptor's fields, filling
/// only what is currently empty.
fn fallback_fields(
    d: &EntityDescriptor,
    current: &FieldMap,
    candidate: &CandidateMatch,
) -> FieldMap {
    let mut updates = FieldMap::new();

    let mut put = |name: &str, value: FieldValue| {
        if d.field(name).is_none() {
            return;
        }
        let empty = current.get(name).map_or(true, FieldValue::is_empty);
        if empty && !value.is_empty() {
            updates.insert(name.to_string(), value);
        }
    };

    if let Some(ref industry) = candidate.industry {
        put("sector_focus", FieldValue::List(vec![industry.clone()]));
        put("sector_tags", FieldValue::List(vec![industry.clone()]));
    }
    if let Some(ref location) = candidate.location {
        put("headquarters", FieldValue::Text(location.clone()));
        put("location", FieldValue::Text(location.clone()));
        put("geography_focus", FieldValue::List(vec![location.clone()]));
    }

    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::descriptor as desc;
    use dealbridge_common::EntityKind;

    fn candidate(industry: Option<&str>, location: Option<&str>) -> CandidateMatch {
        CandidateMatch {
            id: "org_1".into(),
            name: "Acme".into(),
            domain: Some("acme.com".into()),
            industry: industry.map(String::from),
            location: location.map(String::from),
            employee_count: None,
        }
    }

    #[test]
    fn fallback_maps_summary_onto_buyer_fields() {
        let d = desc(EntityKind::Buyer);
        let updates = fallback_fields(d, &FieldMap::new(), &candidate(Some("Logistics"), Some("Chicago, United States")));
        assert!(updates.contains_key("sector_focus"));
        assert!(updates.contains_key("geography_focus"));
        assert!(!updates.contains_key("sector_tags"));
    }

    #[test]
    fn fallback_respects_existing_values() {
        let d = desc(EntityKind::Company);
        let mut current = FieldMap::new();
        current.insert(
            "headquarters".to_string(),
            FieldValue::Text("Boston, United States".into()),
        );
        let updates = fallback_fields(d, &current, &candidate(None, Some("Chicago, United States")));
        assert!(updates.is_empty());
    }
}
