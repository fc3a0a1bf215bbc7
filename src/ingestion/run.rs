use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::cleaning::{clean, CleanerConfig};
use crate::listing::{CleanedListing, RawListing};
use crate::telemetry::{self};
use crate::telemetry::ops::scrape::Phase as ScrapePhase;

use super::scrape::Scraper;
use super::source::Target;
use super::types::{CategorySummary, Outcome};
use super::write::ListingSink;

pub struct RunOptions {
    /// Categories scraped at once; each holds its own browser session.
    pub concurrency: usize,
    pub raw_out: Option<PathBuf>,
    /// Stamped on every row stored by this run.
    pub run_at: DateTime<Utc>,
}

/// Scrape, clean and store every target. A failing category is reported in its
/// summary and never stops the others. Summaries come back in target order.
pub async fn scrape_targets(
    scraper: &Scraper,
    cleaner: &CleanerConfig,
    sink: &dyn ListingSink,
    targets: &[Target],
    opts: &RunOptions,
    cancel: &CancellationToken,
) -> Vec<CategorySummary> {
    let log = telemetry::scrape();
    stream::iter(targets)
        .map(|t| {
            let span = log.span_kv(&ScrapePhase::Category, [("category", t.category.clone()), ("url", t.url.clone())]);
            run_category(scraper, cleaner, sink, t, opts, cancel).instrument(span)
        })
        .buffered(opts.concurrency.max(1))
        .collect()
        .await
}

async fn run_category(
    scraper: &Scraper,
    cleaner: &CleanerConfig,
    sink: &dyn ListingSink,
    target: &Target,
    opts: &RunOptions,
    cancel: &CancellationToken,
) -> CategorySummary {
    let log = telemetry::scrape();
    let mut summary = CategorySummary {
        category: target.category.clone(),
        url: target.url.clone(),
        outcome: Outcome::Empty,
        error: None,
        raw: 0,
        cleaned: 0,
        stored: 0,
    };

    let raw = match scraper.scrape(&target.url, cancel).instrument(log.span(&ScrapePhase::Load)).await {
        Ok(raw) => raw,
        Err(e) => {
            log.error_kv(
                &format!("❌ {} failed: {}", target.category, e),
                [("category", target.category.clone()), ("kind", e.kind().to_string())],
            );
            summary.outcome = Outcome::Failed(e.kind().to_string());
            summary.error = Some(e.to_string());
            log.category_summary(&summary.category, summary.outcome.label(), 0, 0, 0);
            return summary;
        }
    };
    summary.raw = raw.len();

    if let Some(dir) = &opts.raw_out {
        if let Err(e) = dump_raw(dir, &target.category, &raw).instrument(log.span(&ScrapePhase::RawDump)).await {
            log.warn(format!("⚠️ raw dump for {} skipped: {e:#}", target.category));
        }
    }

    if raw.is_empty() {
        log.info_kv("∅ no listings on page", [("category", target.category.clone())]);
        log.category_summary(&summary.category, summary.outcome.label(), 0, 0, 0);
        return summary;
    }

    let cleaned: Vec<CleanedListing> = {
        let _s = log.span_kv(&ScrapePhase::Clean, [("records", raw.len().to_string())]).entered();
        clean(raw, cleaner).into_iter().map(|l| l.with_category(&target.category)).collect()
    };
    summary.cleaned = cleaned.len();

    match sink.store(&cleaned, opts.run_at).instrument(log.span(&ScrapePhase::Store)).await {
        Ok(stored) => {
            summary.stored = stored;
            summary.outcome = Outcome::Ok;
        }
        Err(e) => {
            log.error_kv(
                &format!("❌ storing {} failed: {e:#}", target.category),
                [("category", target.category.clone()), ("kind", "store".to_string())],
            );
            summary.outcome = Outcome::Failed("store".to_string());
            summary.error = Some(format!("{e:#}"));
        }
    }
    log.category_summary(&summary.category, summary.outcome.label(), summary.raw, summary.cleaned, summary.stored);
    summary
}

async fn dump_raw(dir: &Path, category: &str, raw: &[RawListing]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await.with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(format!("{}.json", file_stem(category)));
    let body = serde_json::to_vec_pretty(raw)?;
    tokio::fs::write(&path, body).await.with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

// Custom labels come from the command line; keep them to one safe path segment.
fn file_stem(category: &str) -> String {
    let stem: String = category
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "category".to_string() } else { stem }
}
