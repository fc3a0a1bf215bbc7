use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::cleaning::CleanerConfig;
use crate::telemetry::{self};
use crate::telemetry::ops::scrape::Phase as ScrapePhase;

pub mod driver;
pub mod extractor;
pub mod run;
pub mod scrape;
pub mod source;
pub mod types;
pub mod write;

use driver::webdriver::{WebDriverConfig, WebDriverLauncher};
use driver::{DriverConfig, PageDriver};
use run::{scrape_targets, RunOptions};
use scrape::Scraper;
use source::{custom_target, SourceConfig, Target};
use types::{ScrapeApply, ScrapePlan, ScrapeTotals};
use write::PgSink;

#[derive(Args, Debug)]
pub struct ScrapeCmd {
    /// Category to scrape (repeatable); all configured categories when omitted
    #[arg(long = "category")] pub categories: Vec<String>,
    /// Scrape this page instead of (or in addition to) the configured categories
    #[arg(long, requires = "label")] pub url: Option<String>,
    /// Category recorded for listings from --url
    #[arg(long, requires = "url")] pub label: Option<String>,
    #[arg(long, default_value_t = 2)] pub concurrency: usize,
    /// Write each category's raw listings to DIR/<category>.json
    #[arg(long)] pub raw_out: Option<PathBuf>,
    /// JSON rules file overriding promo keywords and/or title replacements
    #[arg(long)] pub rules: Option<PathBuf>,
    #[arg(long, default_value_t = false)] pub apply: bool,
}

pub async fn run(pool: Option<&PgPool>, args: ScrapeCmd) -> Result<()> {
    let log = telemetry::scrape();
    let root = log.root_span_kv([
        ("apply", args.apply.to_string()),
        ("categories", format!("{:?}", args.categories)),
        ("url", format!("{:?}", args.url)),
        ("concurrency", args.concurrency.to_string()),
        ("raw_out", format!("{:?}", args.raw_out)),
    ]);
    execute(pool, args).instrument(root).await
}

async fn execute(pool: Option<&PgPool>, args: ScrapeCmd) -> Result<()> {
    let log = telemetry::scrape();
    let targets = {
        let _s = log.span(&ScrapePhase::Plan).entered();
        resolve_targets(&SourceConfig::from_env()?, &args)?
    };

    if !args.apply {
        if telemetry::config::json_mode() {
            let plan = ScrapePlan {
                targets,
                concurrency: args.concurrency,
                raw_out: args.raw_out.as_ref().map(|p| p.display().to_string()),
            };
            log.plan(&plan)?;
        } else {
            log.info(format!("📝 Scrape plan — targets={} concurrency={}", targets.len(), args.concurrency));
            for t in &targets { log.info(format!("  {:<12} {}", t.category, t.url)); }
            if let Some(dir) = &args.raw_out { log.info(format!("  raw dumps → {}", dir.display())); }
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    let pool = pool.context("--apply needs a database: pass --dsn or set DATABASE_URL")?;
    let cleaner = match &args.rules {
        Some(path) => CleanerConfig::from_rules_file(path)?,
        None => CleanerConfig::defaults()?,
    };
    let launcher = WebDriverLauncher::new(WebDriverConfig::from_env());
    let scraper = Scraper::new(PageDriver::new(Box::new(launcher), DriverConfig::from_env()))?;
    let sink = PgSink::new(pool.clone());

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling in-flight sessions");
                cancel.cancel();
            }
        })
    };

    let opts = RunOptions { concurrency: args.concurrency, raw_out: args.raw_out.clone(), run_at: Utc::now() };
    let per_category = scrape_targets(&scraper, &cleaner, &sink, &targets, &opts, &cancel).await;
    watcher.abort();

    let totals = ScrapeTotals::from_summaries(&per_category);
    log.totals(totals.ok, totals.empty, totals.failed, totals.stored);

    let all_failed = !per_category.is_empty() && totals.failed == per_category.len();
    if telemetry::config::json_mode() {
        log.result(&ScrapeApply { scrape_run_at: opts.run_at.to_rfc3339(), totals, per_category })?;
    }
    if cancel.is_cancelled() {
        bail!("scrape interrupted");
    }
    if all_failed {
        bail!("every category failed; see the log for per-category errors");
    }
    Ok(())
}

fn resolve_targets(source: &SourceConfig, args: &ScrapeCmd) -> Result<Vec<Target>> {
    // A lone --url scrapes just that page.
    let mut targets = if args.url.is_some() && args.categories.is_empty() {
        Vec::new()
    } else {
        source.targets(&args.categories)?
    };
    if let (Some(url), Some(label)) = (&args.url, &args.label) {
        let custom = custom_target(url, label)?;
        if targets.iter().any(|t| t.category == custom.category) {
            bail!("--label {:?} collides with a configured category", custom.category);
        }
        targets.push(custom);
    }
    Ok(targets)
}
