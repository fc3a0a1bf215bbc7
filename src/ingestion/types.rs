use serde::Serialize;

use super::source::Target;

// Plan envelope types
#[derive(Serialize)]
pub struct ScrapePlan { pub targets: Vec<Target>, pub concurrency: usize, pub raw_out: Option<String> }

/// How a category's run ended. `Empty` is a successful load that held no listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Empty,
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Empty => "empty",
            Outcome::Failed(_) => "failed",
        }
    }
}

// Apply/result envelope types
#[derive(Clone, Debug, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub url: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub raw: usize,
    pub cleaned: usize,
    pub stored: u64,
}

#[derive(Serialize)]
pub struct ScrapeTotals { pub ok: usize, pub empty: usize, pub failed: usize, pub stored: u64 }

impl ScrapeTotals {
    pub fn from_summaries(per_category: &[CategorySummary]) -> Self {
        let count = |label: &str| per_category.iter().filter(|s| s.outcome.label() == label).count();
        Self {
            ok: count("ok"),
            empty: count("empty"),
            failed: count("failed"),
            stored: per_category.iter().map(|s| s.stored).sum(),
        }
    }
}

#[derive(Serialize)]
pub struct ScrapeApply { pub scrape_run_at: String, pub totals: ScrapeTotals, pub per_category: Vec<CategorySummary> }
