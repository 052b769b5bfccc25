//! Batch pacing tests against a paused clock: the inter-item delay is a
//! throughput ceiling, and rate limits widen it.

use std::sync::Arc;
use std::time::Duration;

use dealbridge_common::{EntityKind, EntityRecord};
use dealbridge_enrich::testing::*;
use dealbridge_enrich::{BatchOptions, Enricher};

fn buyer(name: &str, website: &str) -> EntityRecord {
    EntityRecord::new(EntityKind::Buyer, name, website).with_website(website)
}

fn enricher_with_delay(
    store: &Arc<MockStore>,
    fetcher: Arc<MockFetcher>,
    extractor: MockExtractor,
    delay: Duration,
) -> Enricher {
    Enricher::new(
        store.clone(),
        store.clone(),
        fetcher,
        Arc::new(extractor),
        Arc::new(MockSearcher::new()),
        delay,
    )
}

#[tokio::test(start_paused = true)]
async fn acquisitions_are_spaced_by_at_least_the_configured_delay() {
    let store = Arc::new(MockStore::new());
    let a = store.seed(buyer("Alpha Co", "alpha.example"));
    let b = store.seed(buyer("Beta Co", "beta.example"));
    let c = store.seed(buyer("Gamma Co", "gamma.example"));

    let fetcher = Arc::new(
        MockFetcher::new()
            .on_page("https://alpha.example/", &long_page("Alpha Co"))
            .on_page("https://beta.example/", &long_page("Beta Co"))
            .on_page("https://gamma.example/", &long_page("Gamma Co")),
    );
    let extractor = MockExtractor::new()
        .on_entity("Alpha Co", extracted(&[("description", text("a"))]))
        .on_entity("Beta Co", extracted(&[("description", text("b"))]))
        .on_entity("Gamma Co", extracted(&[("description", text("c"))]));

    let delay = Duration::from_secs(5);
    let enricher = enricher_with_delay(&store, fetcher.clone(), extractor, delay);

    let report = enricher
        .run_batch(&[a, b, c], BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(report.enriched, 3);

    let times = fetcher.fetch_times();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= delay,
            "acquisitions closer than the configured delay"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_item_widens_the_next_gap() {
    let store = Arc::new(MockStore::new());
    let a = store.seed(buyer("Alpha Co", "alpha.example"));
    let b = store.seed(buyer("Beta Co", "beta.example"));
    let c = store.seed(buyer("Gamma Co", "gamma.example"));

    let fetcher = Arc::new(
        MockFetcher::new()
            .on_page("https://alpha.example/", &long_page("Alpha Co"))
            .on_failure("https://beta.example/", MockFailure::RateLimited)
            .on_page("https://gamma.example/", &long_page("Gamma Co")),
    );
    let extractor = MockExtractor::new()
        .on_entity("Alpha Co", extracted(&[("description", text("a"))]))
        .on_entity("Gamma Co", extracted(&[("description", text("c"))]));

    let delay = Duration::from_secs(5);
    let enricher = enricher_with_delay(&store, fetcher.clone(), extractor, delay);

    let report = enricher
        .run_batch(&[a, b, c], BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(report.enriched, 2);
    assert_eq!(report.errors, 1);

    let times = fetcher.fetch_times();
    assert_eq!(times.len(), 3);
    assert!(times[1] - times[0] >= delay);
    // The gap after the rate-limited item doubles.
    assert!(times[2] - times[1] >= delay * 2);
}

#[tokio::test(start_paused = true)]
async fn batch_of_one_sleeps_not_at_all() {
    let store = Arc::new(MockStore::new());
    let a = store.seed(buyer("Alpha Co", "alpha.example"));

    let fetcher = Arc::new(
        MockFetcher::new().on_page("https://alpha.example/", &long_page("Alpha Co")),
    );
    let extractor =
        MockExtractor::new().on_entity("Alpha Co", extracted(&[("description", text("a"))]));

    let start = tokio::time::Instant::now();
    let enricher =
        enricher_with_delay(&store, fetcher, extractor, Duration::from_secs(5));
    enricher.run_batch(&[a], BatchOptions::default()).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
}
