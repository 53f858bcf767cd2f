#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for operating the Nightwatch ingestion pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use nightwatch_cli::IngestionHandler;
use nightwatch_database::{db, queries, run_migrations};
use nightwatch_extraction::LlmExtractor;
use nightwatch_scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "nightwatch_cli", about = "Nightwatch ingestion pipeline operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,
    /// List sources from the source-configuration document, upserting
    /// them into the datastore (without fetching anything).
    Sources {
        /// Path to the source-configuration document.
        #[arg(long, default_value = "config/sources.toml")]
        config: PathBuf,
    },
    /// Run a single scheduler cycle over every due, active, non-audio
    /// source: fetch, extract, geocode, dedup/link.
    Ingest {
        /// Path to the source-configuration document.
        #[arg(long, default_value = "config/sources.toml")]
        config: PathBuf,
        /// Bounded worker-pool concurrency (§4.1 default 8).
        #[arg(long, default_value_t = nightwatch_scheduler::DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Compute (or recompute) the weekly rollup for one scope.
    Rollup {
        /// Week-start date (`YYYY-MM-DD`, must be a Monday). Defaults to
        /// the Monday of the current week.
        #[arg(long)]
        week: Option<NaiveDate>,
        /// Municipality to scope the rollup to; omit for region-wide.
        #[arg(long)]
        municipality: Option<String>,
    },
    /// Approve an incident in the human-review queue.
    Approve {
        incident_id: uuid::Uuid,
        /// Operator identifier recorded on `reviewed_by`.
        #[arg(long, default_value = "cli")]
        reviewed_by: String,
    },
    /// Reject an incident in the human-review queue, cascading the
    /// rejection to every currently linked report.
    Reject {
        incident_id: uuid::Uuid,
        #[arg(long, default_value = "cli")]
        reviewed_by: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = nightwatch_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => {
            log::info!("running database migrations...");
            let db = db::connect_from_env().await?;
            run_migrations(db.as_ref()).await?;
            log::info!("migrations complete");
        }
        Commands::Sources { config } => {
            let db = db::connect_from_env().await?;
            run_migrations(db.as_ref()).await?;
            let defs = nightwatch_source::config::load_sources(&config)?;
            log::info!("{} enabled source(s) in {}", defs.len(), config.display());
            println!("{:<36} {:<10} {:<24} URL", "ID", "TYPE", "REGION");
            println!("{}", "-".repeat(100));
            for def in &defs {
                let id = queries::upsert_source(db.as_ref(), def).await?;
                println!("{:<36} {:<10} {:<24} {}", id, def.source_type, def.region, def.url);
            }
        }
        Commands::Ingest { config, concurrency } => {
            let db = db::connect_from_env().await?;
            run_migrations(db.as_ref()).await?;

            let defs = nightwatch_source::config::load_sources(&config)?;
            for def in &defs {
                queries::upsert_source(db.as_ref(), def).await?;
            }

            let sources = queries::list_active_sources(db.as_ref()).await?;
            log::info!("{} active source(s) loaded", sources.len());

            let provider = nightwatch_extraction::providers::create_provider_from_env()?;
            let model_identifier = std::env::var("AI_MODEL").unwrap_or_else(|_| "unknown".to_string());
            let extractor = Arc::new(LlmExtractor::new(provider, model_identifier));

            // The handler owns one connection for the fetch/extract/
            // geocode/link pipeline; the scheduler gets its own for
            // cadence bookkeeping (`touch_source_fetched`,
            // `deactivate_source`) so neither borrows from the other.
            let pipeline_db = db::connect_from_env().await?;
            let progress = nightwatch_cli_utils::IndicatifProgress::steps_bar(&multi, "ingesting sources", sources.len() as u64);
            let handler = IngestionHandler::new(Arc::from(pipeline_db), extractor).with_progress(progress.clone());
            let mut scheduler = Scheduler::new();

            let summary = scheduler.run_cycle(db.as_ref(), &sources, &handler, concurrency).await?;
            progress.finish_and_clear();

            log::info!(
                "cycle complete: polled={} succeeded={} failed={} ingested={} deactivated={}",
                summary.sources_polled,
                summary.sources_succeeded,
                summary.sources_failed,
                summary.observations_ingested,
                summary.sources_deactivated,
            );
        }
        Commands::Rollup { week, municipality } => {
            let db = db::connect_from_env().await?;
            run_migrations(db.as_ref()).await?;

            let week_start = week.unwrap_or_else(|| nightwatch_rollup::week_start_of(chrono::Utc::now().date_naive()));
            let rollup = nightwatch_rollup::run(db.as_ref(), week_start, municipality.as_deref()).await?;

            log::info!(
                "rollup week={} municipality={:?}: {}",
                rollup.week_start,
                rollup.municipality,
                rollup.summary_text
            );
        }
        Commands::Approve { incident_id, reviewed_by } => {
            let db = db::connect_from_env().await?;
            nightwatch_workflow::approve(db.as_ref(), incident_id, &reviewed_by).await?;
            log::info!("incident {incident_id} approved by {reviewed_by}");
        }
        Commands::Reject { incident_id, reviewed_by } => {
            let db = db::connect_from_env().await?;
            nightwatch_workflow::reject(db.as_ref(), incident_id, &reviewed_by).await?;
            log::info!("incident {incident_id} rejected by {reviewed_by} (linked reports cascaded)");
        }
    }

    Ok(())
}
