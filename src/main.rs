use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;

mod cleaning;
mod ingestion;
mod init;
mod listing;
mod stats;
mod telemetry;
mod util;

#[derive(Parser)]
#[command(name = "jobs", about = "Remote job listing scraper CLI")]
struct Cli {
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init(init::InitCmd),
    Scrape(ingestion::ScrapeCmd),
    Clean(cleaning::CleanCmd),
    Stats(stats::StatsCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);
    telemetry::emit::start_clock();

    // initialize logging/tracing (stderr). Respect RUST_LOG and JOBS_LOG_FORMAT
    telemetry::config::init_tracing();
    let dsn = cli.dsn.or_else(|| env::var("DATABASE_URL").ok());

    match cli.command {
        Commands::Init(args) => init::run(dsn.as_deref(), args).await?,
        Commands::Scrape(args) => {
            // Planning needs no database.
            let pool = if args.apply { Some(connect(dsn.as_deref()).await?) } else { None };
            ingestion::run(pool.as_ref(), args).await?
        }
        Commands::Clean(args) => cleaning::run(args).await?,
        Commands::Stats(args) => stats::run(&connect(dsn.as_deref()).await?, args).await?,
    }

    Ok(())
}

async fn connect(dsn: Option<&str>) -> Result<PgPool> {
    let dsn = dsn.context("Please provide --dsn or set DATABASE_URL in .env")?;
    let pool = PgPoolOptions::new().max_connections(5).connect(dsn).await.context("connect to database")?;
    Ok(pool)
}
