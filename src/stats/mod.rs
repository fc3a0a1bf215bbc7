use anyhow::{bail, Result};
use clap::Args;
use sqlx::PgPool;

use crate::telemetry::{self};
use crate::telemetry::ops::stats::Phase as StatsPhase;
use crate::util::time::parse_since_opt;

pub mod db;
pub mod types;

use types::StatsReport;

#[derive(Args, Debug)]
pub struct StatsCmd {
    /// Restrict to one category; all stored listings when omitted
    #[arg(long)] pub category: Option<String>,
    /// Only listings posted since: Nd, YYYY-MM-DD or RFC3339
    #[arg(long)] pub since: Option<String>,
    /// Rows to show for skills and companies (default: 10)
    #[arg(long, default_value_t = 10)]
    pub top: i64,
}

pub async fn run(pool: &PgPool, args: StatsCmd) -> Result<()> {
    let log = telemetry::stats();
    let _g = log.root_span_kv([
        ("category", format!("{:?}", args.category)),
        ("since", format!("{:?}", args.since)),
        ("top", args.top.to_string()),
    ]).entered();

    if args.top <= 0 {
        bail!("--top must be positive (got {})", args.top);
    }
    let since = parse_since_opt(&args.since)?;
    let category = args.category.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(str::to_lowercase);
    let cat = category.as_deref();

    let count = { let _s = log.span(&StatsPhase::Count).entered(); db::count_listings(pool, cat, since).await? };
    let top_skills = { let _s = log.span(&StatsPhase::TopSkills).entered(); db::top_skills(pool, cat, since, args.top).await? };
    let top_companies = { let _s = log.span(&StatsPhase::TopCompanies).entered(); db::top_companies(pool, cat, since, args.top).await? };

    let report = StatsReport { category, since, count, top_skills, top_companies };
    if telemetry::config::json_mode() {
        log.result(&report)?;
        return Ok(());
    }

    log.info(format!(
        "📊 Listings: {}  category={}  since={}",
        report.count.listings,
        report.category.as_deref().unwrap_or("(all)"),
        report.since.map(|s| s.to_rfc3339()).unwrap_or_else(|| "(any)".to_string()),
    ));
    log.info(format!("   Last scrape run: {:?}", report.count.last_scrape_run));
    log.info("🛠  Top skills:");
    if report.top_skills.is_empty() { log.info("   (none)"); }
    for s in &report.top_skills { log.info(format!("   {:<24} {}", s.skill, s.cnt)); }
    log.info("🏢 Companies hiring more than once:");
    if report.top_companies.is_empty() { log.info("   (none)"); }
    for c in &report.top_companies { log.info(format!("   {:<24} {}", c.company, c.cnt)); }
    Ok(())
}
