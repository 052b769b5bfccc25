//! Boundary tests — one pipeline seam at a time.
//!
//! Each test follows MOCK → FUNCTION → OUTPUT: set up mocks, call one real
//! pipeline operation, assert the persisted state and the report.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use dealbridge_common::{
    CandidateMatch, EnrichError, EntityKind, EntityRecord, ResolutionStatus, RunScope, RunStatus,
};

use crate::extract::ExtractOutcome;
use crate::pipeline::{EnrichOptions, Enricher, ItemOutcome, ResolveReport};
use crate::batch::BatchOptions;
use crate::testing::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn buyer(name: &str, website: Option<&str>) -> EntityRecord {
    let mut entity = EntityRecord::new(EntityKind::Buyer, name, &name.to_lowercase().replace(' ', "-"));
    entity.website = website.map(String::from);
    entity
}

fn already_enriched(mut entity: EntityRecord) -> EntityRecord {
    entity.enriched_at = Some(Utc::now());
    entity.enrichment_source = entity.website.clone();
    entity
}

fn enricher(
    store: &Arc<MockStore>,
    fetcher: MockFetcher,
    extractor: MockExtractor,
) -> (Enricher, Arc<MockFetcher>) {
    let fetcher = Arc::new(fetcher);
    let enricher = Enricher::new(
        store.clone(),
        store.clone(),
        fetcher.clone(),
        Arc::new(extractor),
        Arc::new(MockSearcher::new()),
        Duration::ZERO,
    );
    (enricher, fetcher)
}

fn enricher_with_searcher(
    store: &Arc<MockStore>,
    fetcher: MockFetcher,
    extractor: MockExtractor,
    searcher: MockSearcher,
) -> (Enricher, Arc<MockFetcher>) {
    let fetcher = Arc::new(fetcher);
    let enricher = Enricher::new(
        store.clone(),
        store.clone(),
        fetcher.clone(),
        Arc::new(extractor),
        Arc::new(searcher),
        Duration::ZERO,
    );
    (enricher, fetcher)
}

// ---------------------------------------------------------------------------
// Acquire → Extract → Merge → Persist
//
// The canonical fill-if-empty scenario: sparse entity in, populated profile
// and refreshed metadata out.
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fill_if_empty_populates_sparse_profile() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Acme Logistics", Some("acme-logistics.com")));

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[
            ("description", text("A logistics software vendor")),
            ("sector_focus", list(&["logistics"])),
        ]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, ItemOutcome::Enriched);
    assert_eq!(report.fields_updated, vec!["description", "sector_focus"]);
    assert_eq!(
        report.source_locator.as_deref(),
        Some("https://acme-logistics.com/")
    );

    let entity = store.entity(id);
    assert_eq!(
        entity.fields.get("description"),
        Some(&text("A logistics software vendor"))
    );
    assert!(entity.enriched_at.is_some());
    assert_eq!(
        entity.enrichment_source.as_deref(),
        Some("https://acme-logistics.com/")
    );
    assert!(entity.enriched_data.is_some());
}

#[tokio::test]
async fn fill_if_empty_leaves_existing_description_alone() {
    let store = Arc::new(MockStore::new());
    let mut entity = buyer("Acme Logistics", Some("acme-logistics.com"));
    entity
        .fields
        .insert("description".to_string(), text("existing text"));
    let id = store.seed(entity);

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[
            ("description", text("A logistics software vendor")),
            ("sector_focus", list(&["logistics"])),
        ]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();

    assert_eq!(report.fields_updated, vec!["sector_focus"]);
    assert_eq!(
        store.entity(id).fields.get("description"),
        Some(&text("existing text"))
    );
}

#[tokio::test]
async fn force_overwrites_and_reruns_enriched_entities() {
    let store = Arc::new(MockStore::new());
    let mut entity = already_enriched(buyer("Acme Logistics", Some("acme-logistics.com")));
    entity
        .fields
        .insert("description".to_string(), text("existing text"));
    let id = store.seed(entity);

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[("description", text("fresh description"))]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher
        .enrich_entity(id, EnrichOptions { force: true })
        .await
        .unwrap();

    assert_eq!(report.status, ItemOutcome::Enriched);
    assert_eq!(report.fields_updated, vec!["description"]);
    assert_eq!(
        store.entity(id).fields.get("description"),
        Some(&text("fresh description"))
    );
}

#[tokio::test]
async fn metadata_refreshes_even_when_profile_is_already_complete() {
    let store = Arc::new(MockStore::new());
    let mut entity = buyer("Acme Logistics", Some("acme-logistics.com"));
    entity
        .fields
        .insert("description".to_string(), text("A logistics software vendor"));
    let id = store.seed(entity);

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[("description", text("A logistics software vendor"))]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();

    // "Profile already complete, only metadata refreshed."
    assert_eq!(report.status, ItemOutcome::Enriched);
    assert!(report.fields_updated.is_empty());
    let entity = store.entity(id);
    assert!(entity.enriched_at.is_some());
    assert!(entity.enriched_data.is_some());
}

// ---------------------------------------------------------------------------
// Skip and no-source short-circuits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enriched_entity_skips_without_force_and_fetches_nothing() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(already_enriched(buyer(
        "Acme Logistics",
        Some("acme-logistics.com"),
    )));

    let (enricher, fetcher) = enricher(&store, MockFetcher::new(), MockExtractor::new());

    let report = enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, ItemOutcome::Skipped);
    assert_eq!(fetcher.fetch_count(), 0);

    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].outcome.as_deref(), Some("skipped"));
}

#[tokio::test]
async fn missing_website_is_no_source_with_no_acquisition() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Mystery Holdings", None));

    let (enricher, fetcher) = enricher(&store, MockFetcher::new(), MockExtractor::new());

    let report = enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, ItemOutcome::NoSource);
    assert_eq!(fetcher.fetch_count(), 0);

    // A skip classification, never a success entry.
    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Error);
    assert_eq!(runs[0].outcome.as_deref(), Some("no_source"));
}

// ---------------------------------------------------------------------------
// Failure classification at the item boundary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn insufficient_extraction_is_an_error_outcome() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Acme Logistics", Some("acme-logistics.com")));

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor =
        MockExtractor::new().on_entity("Acme Logistics", ExtractOutcome::Insufficient);
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, ItemOutcome::Error);
    assert!(report.error.as_deref().unwrap().contains("insufficient"));
    assert!(store.entity(id).enriched_at.is_none());
}

#[tokio::test]
async fn persist_failure_is_reported_not_panicked() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Acme Logistics", Some("acme-logistics.com")));
    store.fail_writes_with("connection reset during write");

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[("description", text("A logistics software vendor"))]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, ItemOutcome::Error);
    assert!(report.error.as_deref().unwrap().contains("persist failed"));
}

// ---------------------------------------------------------------------------
// Preview: acquire + extract, nothing written
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preview_returns_candidate_without_writing() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Acme Logistics", Some("acme-logistics.com")));

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[("description", text("A logistics software vendor"))]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let preview = enricher.preview(id).await.unwrap();

    assert_eq!(
        preview.candidate.fields.get("description"),
        Some(&text("A logistics software vendor"))
    );
    assert_eq!(preview.source_locator, "https://acme-logistics.com/");

    let entity = store.entity(id);
    assert!(entity.fields.is_empty());
    assert!(entity.enriched_at.is_none());

    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].scope, RunScope::Preview);
    assert_eq!(runs[0].status, RunStatus::Completed);
}

// ---------------------------------------------------------------------------
// Batch: conservation, isolation, ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_counts_every_item_exactly_once() {
    let store = Arc::new(MockStore::new());
    let ok_id = store.seed(buyer("Good Co", Some("good.example")));
    let failing_id = store.seed(buyer("Broken Co", Some("broken.example")));
    let sourceless_id = store.seed(buyer("Mystery Holdings", None));
    let done_id = store.seed(already_enriched(buyer("Done Co", Some("done.example"))));

    let fetcher = MockFetcher::new()
        .on_page("https://good.example/", &long_page("Good Co"))
        .on_page("https://broken.example/", &long_page("Broken Co"));
    let extractor = MockExtractor::new()
        .on_entity("Good Co", extracted(&[("description", text("Does good things"))]))
        .service_error("Broken Co", "model unavailable");
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let ids = vec![ok_id, failing_id, sourceless_id, done_id];
    let report = enricher
        .run_batch(&ids, BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total_processed, 4);
    assert_eq!(report.enriched, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.no_source, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        report.enriched + report.skipped + report.errors + report.no_source,
        report.total_processed
    );

    // Caller order is preserved.
    let order: Vec<Uuid> = report.results.iter().map(|r| r.entity_id).collect();
    assert_eq!(order, ids);
}

#[tokio::test]
async fn one_item_failing_never_stops_the_rest() {
    let store = Arc::new(MockStore::new());
    let first = store.seed(buyer("First Co", Some("first.example")));
    let second = store.seed(buyer("Second Co", Some("second.example")));
    let third = store.seed(buyer("Third Co", Some("third.example")));

    let fetcher = MockFetcher::new()
        .on_page("https://first.example/", &long_page("First Co"))
        .on_page("https://second.example/", &long_page("Second Co"))
        .on_page("https://third.example/", &long_page("Third Co"));
    let extractor = MockExtractor::new()
        .on_entity("First Co", extracted(&[("description", text("first"))]))
        .service_error("Second Co", "model unavailable")
        .on_entity("Third Co", extracted(&[("description", text("third"))]));
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher
        .run_batch(&[first, second, third], BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(report.enriched, 2);
    assert_eq!(report.errors, 1);
    assert!(store.entity(third).enriched_at.is_some());
}

#[tokio::test]
async fn rate_limited_item_is_one_error_among_successes() {
    let store = Arc::new(MockStore::new());
    let first = store.seed(buyer("First Co", Some("first.example")));
    let second = store.seed(buyer("Second Co", Some("second.example")));
    let third = store.seed(already_enriched(buyer("Third Co", Some("third.example"))));

    let fetcher = MockFetcher::new()
        .on_page("https://first.example/", &long_page("First Co"))
        .on_failure("https://second.example/", MockFailure::RateLimited)
        .on_page("https://third.example/", &long_page("Third Co"));
    let extractor = MockExtractor::new()
        .on_entity("First Co", extracted(&[("description", text("first"))]));
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher
        .run_batch(&[first, second, third], BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(report.enriched, 1);
    assert_eq!(report.skipped, 1);

    let failed: Vec<Uuid> = report
        .results
        .iter()
        .filter(|r| r.outcome == ItemOutcome::Error)
        .map(|r| r.entity_id)
        .collect();
    assert_eq!(failed, vec![second]);
}

#[tokio::test]
async fn unknown_entity_in_batch_is_an_error_item() {
    let store = Arc::new(MockStore::new());
    let known = store.seed(already_enriched(buyer("Known Co", Some("known.example"))));
    let ghost = Uuid::new_v4();

    let (enricher, _) = enricher(&store, MockFetcher::new(), MockExtractor::new());

    let report = enricher
        .run_batch(&[known, ghost], BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total_processed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors, 1);
}

#[tokio::test]
async fn batch_writes_one_start_and_one_terminal_record() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(already_enriched(buyer("Done Co", Some("done.example"))));

    let (enricher, _) = enricher(&store, MockFetcher::new(), MockExtractor::new());
    enricher
        .run_batch(&[id], BatchOptions::default())
        .await
        .unwrap();

    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].scope, RunScope::Batch);
    assert_eq!(runs[0].status, RunStatus::Completed);
    let summary = runs[0].summary.as_ref().unwrap();
    assert_eq!(summary["total_processed"], 1);
}

// ---------------------------------------------------------------------------
// Identity resolution and confirmation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ambiguous_search_persists_candidates_and_writes_nothing() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Acme", None));

    let searcher = MockSearcher::new().on_query(
        "Acme",
        vec![
            org_match("a", "Acme Industrial", Some("acme-industrial.example"), Some("Manufacturing")),
            org_match("b", "Acme Software", Some("acme-software.example"), Some("SaaS")),
        ],
    );
    let (enricher, fetcher) =
        enricher_with_searcher(&store, MockFetcher::new(), MockExtractor::new(), searcher);

    let report = enricher.resolve_identity(id).await.unwrap();

    match report {
        ResolveReport::Ambiguous(cands) => assert_eq!(cands.len(), 2),
        other => panic!("expected ambiguous, got {other:?}"),
    }

    let entity = store.entity(id);
    assert_eq!(entity.resolution, ResolutionStatus::Ambiguous);
    assert_eq!(entity.candidates.len(), 2);
    assert!(entity.enriched_at.is_none());
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn single_match_auto_confirms_and_enriches() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Acme Logistics", None));

    let searcher = MockSearcher::new().on_query(
        "Acme Logistics",
        vec![org_match("a", "Acme Logistics", Some("acme-logistics.com"), Some("Logistics"))],
    );
    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[("description", text("A logistics software vendor"))]),
    );
    let (enricher, _) = enricher_with_searcher(&store, fetcher, extractor, searcher);

    let report = enricher.resolve_identity(id).await.unwrap();

    match report {
        ResolveReport::Report(r) => assert_eq!(r.status, ItemOutcome::Enriched),
        other => panic!("expected report, got {other:?}"),
    }

    let entity = store.entity(id);
    assert_eq!(entity.resolution, ResolutionStatus::Ok);
    assert_eq!(entity.website.as_deref(), Some("acme-logistics.com"));
    assert!(entity.enriched_at.is_some());
}

fn seeded_ambiguous(store: &MockStore) -> Uuid {
    let mut entity = buyer("Acme", None);
    entity.resolution = ResolutionStatus::Ambiguous;
    entity.candidates = vec![
        CandidateMatch {
            id: "a".into(),
            name: "Acme Industrial".into(),
            domain: Some("acme-industrial.example".into()),
            industry: Some("Manufacturing".into()),
            location: Some("Cleveland, United States".into()),
            employee_count: Some(250),
        },
        CandidateMatch {
            id: "b".into(),
            name: "Acme Software".into(),
            domain: Some("acme-software.example".into()),
            industry: Some("SaaS".into()),
            location: None,
            employee_count: None,
        },
    ];
    store.seed(entity)
}

#[tokio::test]
async fn confirm_reruns_pipeline_and_clears_candidates() {
    let store = Arc::new(MockStore::new());
    let id = seeded_ambiguous(&store);

    let fetcher = MockFetcher::new()
        .on_page("https://acme-software.example/", &long_page("Acme Software"));
    let extractor = MockExtractor::new().on_entity(
        "Acme",
        extracted(&[("description", text("A vertical SaaS vendor"))]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    let report = enricher.confirm(id, "b").await.unwrap();

    assert_eq!(report.status, ItemOutcome::Enriched);
    let entity = store.entity(id);
    assert!(entity.candidates.is_empty());
    assert_eq!(entity.resolution, ResolutionStatus::Ok);
    assert_eq!(entity.website.as_deref(), Some("https://acme-software.example/"));
    assert_eq!(entity.fields.get("description"), Some(&text("A vertical SaaS vendor")));
}

#[tokio::test]
async fn confirm_falls_back_to_candidate_summary_on_pipeline_failure() {
    let store = Arc::new(MockStore::new());
    let id = seeded_ambiguous(&store);

    // No page registered for the candidate domain → acquisition fails.
    let (enricher, _) = enricher(&store, MockFetcher::new(), MockExtractor::new());

    let report = enricher.confirm(id, "a").await.unwrap();

    // Partial data beats no data once a human has decided identity.
    assert_eq!(report.status, ItemOutcome::Enriched);
    assert!(report.error.as_deref().unwrap().contains("re-extraction failed"));

    let entity = store.entity(id);
    assert!(entity.candidates.is_empty(), "ambiguity cleared regardless");
    assert_eq!(entity.resolution, ResolutionStatus::Ok);
    assert_eq!(
        entity.fields.get("sector_focus"),
        Some(&list(&["Manufacturing"]))
    );
    assert_eq!(
        entity.fields.get("geography_focus"),
        Some(&list(&["Cleveland, United States"]))
    );
    assert_eq!(entity.website.as_deref(), Some("acme-industrial.example"));
    // The fallback is search-step data, not an extraction: no metadata stamp.
    assert!(entity.enriched_at.is_none());
}

#[tokio::test]
async fn confirm_with_unknown_candidate_id_fails_the_invocation() {
    let store = Arc::new(MockStore::new());
    let id = seeded_ambiguous(&store);

    let (enricher, _) = enricher(&store, MockFetcher::new(), MockExtractor::new());

    let err = enricher.confirm(id, "nope").await.unwrap_err();
    assert!(matches!(err, EnrichError::UnknownCandidate(_)));

    // Misuse, not a decision: candidates stay for a correct retry.
    assert_eq!(store.entity(id).candidates.len(), 2);
}

// ---------------------------------------------------------------------------
// Audit pairing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_single_run_gets_exactly_one_terminal_record() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Acme Logistics", Some("acme-logistics.com")));

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[("description", text("A logistics software vendor"))]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();
    enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();

    let runs = store.runs();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status != RunStatus::Running));
    assert_eq!(runs[0].outcome.as_deref(), Some("enriched"));
    assert_eq!(runs[1].outcome.as_deref(), Some("skipped"));
}

#[tokio::test]
async fn rerun_updates_the_same_entity_row() {
    let store = Arc::new(MockStore::new());
    let id = store.seed(buyer("Acme Logistics", Some("acme-logistics.com")));

    let fetcher = MockFetcher::new()
        .on_page("https://acme-logistics.com/", &long_page("Acme Logistics"));
    let extractor = MockExtractor::new().on_entity(
        "Acme Logistics",
        extracted(&[("description", text("A logistics software vendor"))]),
    );
    let (enricher, _) = enricher(&store, fetcher, extractor);

    enricher
        .enrich_entity(id, EnrichOptions::default())
        .await
        .unwrap();
    let first = store.entity(id);

    enricher
        .enrich_entity(id, EnrichOptions { force: true })
        .await
        .unwrap();
    let second = store.entity(id);

    // Same row, refreshed in place; repeated runs never duplicate.
    assert_eq!(first.id, second.id);
    assert_eq!(
        second.fields.get("description"),
        Some(&text("A logistics software vendor"))
    );
}
