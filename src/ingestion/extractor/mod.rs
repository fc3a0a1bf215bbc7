use anyhow::{anyhow, Result};
use scraper::{Html, Selector};

use crate::listing::RawListing;

mod row;

use row::parse_row;

/// Compiled selectors for the listing page markup.
pub struct RowSelectors {
    pub(crate) row: Selector,
    pub(crate) id_attr: &'static str,
    pub(crate) posted_attr: &'static str,
    pub(crate) title: Selector,
    pub(crate) company: Selector,
    pub(crate) location: Selector,
    pub(crate) tags: Selector,
    pub(crate) tag: Selector,
}

impl RowSelectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            row: compile("tr.job")?,
            id_attr: "data-slug",
            posted_attr: "data-epoch",
            title: compile("h2[itemprop=title]")?,
            company: compile("h3[itemprop=name]")?,
            location: compile("div.location")?,
            tags: compile("td.tags")?,
            tag: compile("h3")?,
        })
    }
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {:?}: {:?}", css, e))
}

pub struct ExtractReport {
    /// Candidate rows matched by the coarse row selector.
    pub rows: usize,
    pub listings: Vec<RawListing>,
}

impl ExtractReport {
    pub fn rejected(&self) -> usize { self.rows - self.listings.len() }
}

/// Select candidate rows and keep the ones that parse, in document order.
pub fn extract_listings(sel: &RowSelectors, html: &str) -> ExtractReport {
    let doc = Html::parse_document(html);
    let mut rows = 0usize;
    let mut listings = Vec::new();
    for node in doc.select(&sel.row) {
        rows += 1;
        if let Some(listing) = parse_row(sel, node) {
            listings.push(listing);
        }
    }
    ExtractReport { rows, listings }
}
