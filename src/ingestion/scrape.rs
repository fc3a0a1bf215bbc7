use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::listing::RawListing;

use super::driver::{LoadError, PageDriver};
use super::extractor::{extract_listings, RowSelectors};

/// Loads one category page and extracts its listings.
pub struct Scraper {
    driver: PageDriver,
    selectors: RowSelectors,
}

impl Scraper {
    pub fn new(driver: PageDriver) -> Result<Self> {
        Ok(Self { driver, selectors: RowSelectors::new()? })
    }

    /// `Ok(vec![])` means the page loaded but held no valid listings;
    /// `Err` means the run could not complete.
    pub async fn scrape(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<RawListing>, LoadError> {
        let html = self.driver.load(url, cancel).await?;
        let report = extract_listings(&self.selectors, &html);
        info!(url, rows = report.rows, parsed = report.listings.len(), rejected = report.rejected(), "extracted listings");
        if report.rows > 0 && report.listings.is_empty() {
            // Rows matched but none parsed: the row markup probably changed.
            warn!(url, rows = report.rows, "no listing row could be parsed");
        }
        Ok(report.listings)
    }
}
