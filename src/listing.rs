// Listing records shared by the scraper, the cleaner and the sink.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value used when a title or company node is missing; such rows are rejected.
pub const MISSING: &str = "N/A";
pub const NO_LOCATION: &str = "No Location";

/// Posting time as it arrived. Rows parsed from the page always carry `At`;
/// raw dumps read back from disk may carry anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostedAt {
    At(DateTime<Utc>),
    Epoch(i64),
    Text(String),
    Other(Value),
}

/// Tags as they arrived. Anything that is not a JSON array lands in `Malformed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTags {
    List(Vec<Value>),
    Malformed(Value),
}

impl Default for RawTags {
    fn default() -> Self { RawTags::List(Vec::new()) }
}

impl From<Vec<String>> for RawTags {
    fn from(tags: Vec<String>) -> Self {
        RawTags::List(tags.into_iter().map(Value::String).collect())
    }
}

/// One scraped posting before cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub company: String,
    #[serde(default = "no_location")]
    pub location: String,
    #[serde(default)]
    pub posted_at: Option<PostedAt>,
    #[serde(default)]
    pub tags: RawTags,
}

fn no_location() -> String { NO_LOCATION.to_string() }

/// A posting that survived dedup, filtering and date validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedListing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub posted_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub normalized_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CleanedListing {
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}

impl From<CleanedListing> for RawListing {
    fn from(c: CleanedListing) -> Self {
        RawListing {
            title: c.title,
            company: c.company,
            location: c.location,
            posted_at: Some(PostedAt::At(c.posted_at)),
            tags: c.tags.into(),
        }
    }
}
