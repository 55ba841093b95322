use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feedforge_common::Config;
use feedforge_pipeline::infra::{FilePublisher, JsonFileSource, OpenAiService, PgStore};
use feedforge_pipeline::Orchestrator;

/// AI content-digest pipeline: acquire, enrich, summarize, validate,
/// filter, synthesize, publish.
#[derive(Parser, Debug)]
#[command(name = "feedforge", version, about)]
struct Args {
    /// Session counter for this run; drives the periodic synthesis gate.
    #[arg(long)]
    session: u32,

    /// JSON file of raw items to ingest.
    #[arg(long)]
    input: String,

    /// Directory the digest files are written to.
    #[arg(long, default_value = "digests")]
    out: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("feedforge=info".parse()?))
        .init();

    let args = Args::parse();
    info!(session = args.session, "Feedforge starting...");

    // Load config
    let config = Config::from_env();

    // Connect to Postgres and ensure the schema exists
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = PgStore::new(pool);
    store.init_schema().await?;

    let orchestrator = Orchestrator::new(
        Arc::new(JsonFileSource::new(&args.input)),
        Arc::new(OpenAiService::new(&config)),
        Arc::new(store),
        Arc::new(FilePublisher::new(&args.out)),
        config.pipeline,
    );

    let stats = orchestrator.run(args.session).await?;
    info!("Pipeline run complete. {stats}");

    Ok(())
}
