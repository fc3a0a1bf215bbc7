use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::stats::types::*;

// Every query takes the same optional filters: $1 category, $2 posted-at lower bound.

pub async fn count_listings(pool: &PgPool, category: Option<&str>, since: Option<DateTime<Utc>>) -> Result<StatsCount> {
    let (listings, last_scrape_run): (i64, Option<DateTime<Utc>>) = sqlx::query_as(
        r#"
        SELECT COUNT(*)::bigint, MAX(scrape_run_at)
        FROM jobs.listing
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::timestamptz IS NULL OR posted_at >= $2)
        "#,
    )
    .bind(category)
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(StatsCount { listings, last_scrape_run })
}

pub async fn top_skills(pool: &PgPool, category: Option<&str>, since: Option<DateTime<Utc>>, top: i64) -> Result<Vec<SkillCount>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT lower(btrim(t)) AS skill, COUNT(*)::bigint AS cnt
        FROM jobs.listing, unnest(tags) AS t
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::timestamptz IS NULL OR posted_at >= $2)
          AND btrim(t) <> ''
        GROUP BY 1
        ORDER BY cnt DESC, skill ASC
        LIMIT $3
        "#,
    )
    .bind(category)
    .bind(since)
    .bind(top)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(skill, cnt)| SkillCount { skill, cnt }).collect())
}

/// Companies with more than one listing in the window.
pub async fn top_companies(pool: &PgPool, category: Option<&str>, since: Option<DateTime<Utc>>, top: i64) -> Result<Vec<CompanyCount>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT company, COUNT(*)::bigint AS cnt
        FROM jobs.listing
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::timestamptz IS NULL OR posted_at >= $2)
        GROUP BY company
        HAVING COUNT(*) > 1
        ORDER BY cnt DESC, company ASC
        LIMIT $3
        "#,
    )
    .bind(category)
    .bind(since)
    .bind(top)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(company, cnt)| CompanyCount { company, cnt }).collect())
}
