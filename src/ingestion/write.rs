use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::listing::CleanedListing;

/// Destination for cleaned, category-tagged batches.
#[async_trait]
pub trait ListingSink: Send + Sync {
    /// Append `listings` stamped with `run_at`; returns the number of rows written.
    async fn store(&self, listings: &[CleanedListing], run_at: DateTime<Utc>) -> Result<u64>;
}

pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl ListingSink for PgSink {
    async fn store(&self, listings: &[CleanedListing], run_at: DateTime<Utc>) -> Result<u64> {
        if listings.is_empty() { return Ok(0); }
        let mut tx = self.pool.begin().await.context("begin listing batch")?;
        let mut written = 0u64;
        for l in listings {
            let res = sqlx::query(
                r#"
                INSERT INTO jobs.listing
                    (title, company, location, posted_at, tags, normalized_title, category, scrape_run_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&l.title)
            .bind(&l.company)
            .bind(&l.location)
            .bind(l.posted_at)
            .bind(l.tags.as_slice())
            .bind(&l.normalized_title)
            .bind(l.category.as_deref())
            .bind(run_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert listing {:?} @ {:?}", l.title, l.company))?;
            written += res.rows_affected();
        }
        tx.commit().await.context("commit listing batch")?;
        Ok(written)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use anyhow::bail;

    use super::*;

    /// Keeps every stored batch in memory; batches for `fail_category` are refused.
    #[derive(Default)]
    pub(crate) struct MemorySink {
        pub(crate) rows: Mutex<Vec<(CleanedListing, DateTime<Utc>)>>,
        pub(crate) fail_category: Option<String>,
    }

    impl MemorySink {
        pub(crate) fn categories(&self) -> Vec<String> {
            let rows = self.rows.lock().unwrap();
            let mut cats: Vec<String> = rows.iter().filter_map(|(l, _)| l.category.clone()).collect();
            cats.sort();
            cats.dedup();
            cats
        }
    }

    #[async_trait]
    impl ListingSink for MemorySink {
        async fn store(&self, listings: &[CleanedListing], run_at: DateTime<Utc>) -> Result<u64> {
            if let (Some(fail), Some(first)) = (&self.fail_category, listings.first()) {
                if first.category.as_deref() == Some(fail.as_str()) {
                    bail!("connection reset while storing {fail}");
                }
            }
            let mut rows = self.rows.lock().unwrap();
            rows.extend(listings.iter().cloned().map(|l| (l, run_at)));
            Ok(listings.len() as u64)
        }
    }
}
