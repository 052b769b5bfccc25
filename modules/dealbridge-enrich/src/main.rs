use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use dealbridge_common::{Config, EntityKind};
use dealbridge_enrich::acquire::FirecrawlFetcher;
use dealbridge_enrich::extract::LlmExtractor;
use dealbridge_enrich::resolver::ApolloSearcher;
use dealbridge_enrich::{BatchOptions, EnrichOptions, Enricher, ResolveReport};
use dealbridge_store::PgStore;

#[derive(Parser)]
#[command(name = "dealbridge-enrich", about = "Enrichment pipeline for the Dealbridge CRM")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline for one entity.
    Enrich {
        #[arg(long)]
        id: Uuid,
        /// Overwrite populated fields and re-run already-enriched entities.
        #[arg(long)]
        force: bool,
        /// Acquire and extract only; print the candidate beside the current
        /// profile without committing anything.
        #[arg(long)]
        preview: bool,
    },
    /// Run the pipeline over many entities, sequentially and rate-limited.
    Batch {
        /// Entity kind to run (buyer, company, contact, lead). Ignored when
        /// explicit ids are given.
        #[arg(long)]
        kind: Option<String>,
        /// Explicit entity ids, processed in the order given.
        #[arg(long = "id")]
        ids: Vec<Uuid>,
        #[arg(long)]
        force: bool,
    },
    /// Match an entity to an external organization identity.
    Resolve {
        #[arg(long)]
        id: Uuid,
    },
    /// Confirm one of an entity's persisted identity candidates.
    Confirm {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        candidate: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dealbridge=info".parse()?))
        .init();

    let cli = Cli::parse();

    info!("Dealbridge enrichment starting...");
    let config = Config::from_env();
    config.log_redacted();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await?;

    let enricher = Enricher::new(
        store.clone(),
        store.clone(),
        Arc::new(FirecrawlFetcher::new(&config.firecrawl_api_key)),
        Arc::new(LlmExtractor::new(
            &config.anthropic_api_key,
            &config.claude_model,
        )),
        Arc::new(ApolloSearcher::new(&config.apollo_api_key)),
        Duration::from_secs(config.item_delay_secs),
    );

    match cli.command {
        Command::Enrich { id, force, preview } => {
            if preview {
                let p = enricher.preview(id).await?;
                println!("Source: {}", p.source_locator);
                println!(
                    "Current profile:\n{}",
                    serde_json::to_string_pretty(&p.current.fields)?
                );
                println!(
                    "Candidate:\n{}",
                    serde_json::to_string_pretty(&p.candidate.fields)?
                );
            } else {
                let report = enricher.enrich_entity(id, EnrichOptions { force }).await?;
                println!("{report}");
            }
        }
        Command::Batch { kind, ids, force } => {
            let report = if ids.is_empty() {
                let kind = kind
                    .ok_or_else(|| anyhow::anyhow!("either --kind or --id is required"))?;
                let kind: EntityKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
                enricher.run_batch_for_kind(kind, BatchOptions { force }).await?
            } else {
                enricher.run_batch(&ids, BatchOptions { force }).await?
            };
            print!("{report}");
        }
        Command::Resolve { id } => match enricher.resolve_identity(id).await? {
            ResolveReport::Report(report) => println!("{report}"),
            ResolveReport::Ambiguous(candidates) => {
                println!("Ambiguous: {} candidates persisted", candidates.len());
                for c in candidates {
                    println!(
                        "  {} {} ({})",
                        c.id,
                        c.name,
                        c.domain.as_deref().unwrap_or("no domain")
                    );
                }
            }
            ResolveReport::NoMatches => println!("No matches found"),
        },
        Command::Confirm { id, candidate } => {
            let report = enricher.confirm(id, &candidate).await?;
            println!("{report}");
        }
    }

    Ok(())
}
