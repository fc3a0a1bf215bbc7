use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use crate::telemetry::{self};
use crate::telemetry::ops::init::Phase as InitPhase;

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, default_value_t = false)] pub apply: bool,
}

#[derive(Serialize)]
struct MigrationRow { version: i64, description: String }

#[derive(Serialize)]
struct InitPlan { migrations: Vec<MigrationRow> }

#[derive(Serialize)]
struct InitResult { applied: bool, migrations: usize }

pub async fn run(dsn: Option<&str>, args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log.root_span_kv([("apply", args.apply.to_string())]).entered();

    let migrations: Vec<MigrationRow> = {
        let _s = log.span(&InitPhase::Plan).entered();
        MIGRATOR
            .iter()
            .map(|m| MigrationRow { version: m.version, description: m.description.to_string() })
            .collect()
    };

    if !args.apply {
        if telemetry::config::json_mode() {
            log.plan(&InitPlan { migrations })?;
        } else {
            log.info(format!("📝 Init plan — {} migration(s) embedded", migrations.len()));
            for m in &migrations { log.info(format!("  {:04} {}", m.version, m.description)); }
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    let dsn = dsn.context("init --apply needs a database: pass --dsn or set DATABASE_URL")?;
    let pool = {
        let _s = log.span(&InitPhase::Connect).entered();
        PgPoolOptions::new().max_connections(2).connect(dsn).await.context("connect to database")?
    };
    {
        let _s = log.span(&InitPhase::Migrate).entered();
        // Idempotent: already-applied versions are skipped.
        MIGRATOR.run(&pool).await.context("run migrations")?;
    }

    if telemetry::config::json_mode() {
        log.result(&InitResult { applied: true, migrations: migrations.len() })?;
    } else {
        log.info("✅ Database initialized");
    }
    Ok(())
}
