use scraper::ElementRef;

use crate::listing::{PostedAt, RawListing, MISSING, NO_LOCATION};
use crate::util::time::from_epoch_secs;

use super::RowSelectors;

// Salary chips share the location class; they are marked with this emoji.
const SALARY_MARKER: char = '💰';

/// Parse one listing row. Any row that is not a complete listing yields None.
pub fn parse_row(sel: &RowSelectors, row: ElementRef<'_>) -> Option<RawListing> {
    let el = row.value();
    if el.attr(sel.id_attr).is_none() {
        return None;
    }

    let title = first_text(row, &sel.title).unwrap_or_else(|| MISSING.to_string());
    let company = first_text(row, &sel.company).unwrap_or_else(|| MISSING.to_string());

    // A posted attribute that is present but not an in-range epoch means the row is broken.
    let posted_at = match el.attr(sel.posted_attr) {
        Some(raw) => {
            let secs = raw.trim().parse::<i64>().ok()?;
            Some(PostedAt::At(from_epoch_secs(secs)?))
        }
        None => None,
    };

    let location = row
        .select(&sel.location)
        .map(stripped_text)
        .find(|text| !text.contains(SALARY_MARKER))
        .unwrap_or_else(|| NO_LOCATION.to_string());

    let tags: Vec<String> = match row.select(&sel.tags).next() {
        Some(container) => container
            .select(&sel.tag)
            .map(|t| t.text().collect::<String>().trim().to_string())
            .collect(),
        None => Vec::new(),
    };

    if title == MISSING || company == MISSING {
        return None;
    }

    Some(RawListing { title, company, location, posted_at, tags: tags.into() })
}

fn first_text(row: ElementRef<'_>, sel: &scraper::Selector) -> Option<String> {
    let node = row.select(sel).next()?;
    Some(node.text().collect::<String>().trim().to_string())
}

// Each text node trimmed, then concatenated with no separator.
fn stripped_text(node: ElementRef<'_>) -> String {
    node.text().map(str::trim).collect::<String>()
}
