use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::listing::{CleanedListing, RawListing};
use crate::telemetry::{self};
use crate::telemetry::ops::clean::Phase as CleanPhase;

pub mod config;
pub mod pipeline;

pub use config::CleanerConfig;
pub use pipeline::clean;

#[derive(Args, Debug)]
pub struct CleanCmd {
    /// Raw dump written by `scrape --raw-out` (a JSON array of listings)
    #[arg(long)] pub input: PathBuf,
    /// Tag every cleaned record with this category
    #[arg(long)] pub category: Option<String>,
    /// JSON rules file overriding promo keywords and/or title replacements
    #[arg(long)] pub rules: Option<PathBuf>,
    /// Write the cleaned set here instead of only reporting it
    #[arg(long)] pub out: Option<PathBuf>,
    /// Number of cleaned records to show in the human report
    #[arg(long, default_value_t = 10)] pub show: usize,
}

#[derive(Serialize)]
struct CleanResult {
    input: usize,
    cleaned: usize,
    dropped: usize,
    listings: Vec<CleanedListing>,
}

pub async fn run(args: CleanCmd) -> Result<()> {
    let log = telemetry::clean();
    let _g = log.root_span_kv([
        ("input", args.input.display().to_string()),
        ("category", format!("{:?}", args.category)),
        ("rules", format!("{:?}", args.rules)),
    ]).entered();

    let raw: Vec<RawListing> = {
        let _s = log.span(&CleanPhase::Read).entered();
        let text = tokio::fs::read_to_string(&args.input)
            .await
            .with_context(|| format!("read raw dump {}", args.input.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse raw dump {}", args.input.display()))?
    };

    let cfg = {
        let _s = log.span(&CleanPhase::Rules).entered();
        match &args.rules {
            Some(path) => CleanerConfig::from_rules_file(path)?,
            None => CleanerConfig::defaults()?,
        }
    };

    let input = raw.len();
    let mut listings = {
        let _s = log.span_kv(&CleanPhase::Clean, [("records", input.to_string())]).entered();
        clean(raw, &cfg)
    };
    if let Some(category) = &args.category {
        listings = listings.into_iter().map(|l| l.with_category(category)).collect();
    }

    if let Some(out) = &args.out {
        let body = serde_json::to_vec_pretty(&listings)?;
        tokio::fs::write(out, body).await.with_context(|| format!("write cleaned set {}", out.display()))?;
        log.info_kv("💾 wrote cleaned set", [("path", out.display().to_string())]);
    }

    let cleaned = listings.len();
    let dropped = input - cleaned;
    if telemetry::config::json_mode() {
        log.result(&CleanResult { input, cleaned, dropped, listings })?;
    } else {
        log.info(format!("🧹 Clean — input={} cleaned={} dropped={}", input, cleaned, dropped));
        for l in listings.iter().take(args.show) {
            log.info(format!("  {}  {} @ {}  [{}]", l.posted_at.format("%Y-%m-%d"), l.normalized_title, l.company, l.tags.join(", ")));
        }
        if cleaned > args.show { log.info(format!("  ... ({} more)", cleaned - args.show)); }
    }
    Ok(())
}
