use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

const DEFAULT_PROMO_KEYWORDS: &[&str] = &["bootcamp", "guaranteed", "money back"];

// Applied in this order; later rules see the output of earlier ones.
const DEFAULT_TITLE_REPLACEMENTS: &[(&str, &str)] = &[
    (r"\bml\b", "machine learning"),
    ("software engineer", "swe"),
    ("data scientist", "ds"),
    ("data analyst", "da"),
    ("product manager", "pm"),
];

pub struct TitleRule {
    pub pattern: Regex,
    pub replacement: String,
}

/// Cleaning rules, passed explicitly into `clean`.
pub struct CleanerConfig {
    /// Lower-cased substrings; a title containing any of them is dropped.
    pub promo_keywords: Vec<String>,
    pub title_rules: Vec<TitleRule>,
}

/// On-disk override: `{"promo_keywords": [...], "title_replacements": [[pattern, replacement], ...]}`.
/// Missing keys keep the defaults.
#[derive(Debug, Deserialize)]
pub struct RulesFile {
    pub promo_keywords: Option<Vec<String>>,
    pub title_replacements: Option<Vec<(String, String)>>,
}

impl CleanerConfig {
    pub fn new<K, R>(promo_keywords: K, title_replacements: R) -> Result<Self>
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        R: IntoIterator<Item = (String, String)>,
    {
        let promo_keywords = promo_keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let mut title_rules = Vec::new();
        for (pattern, replacement) in title_replacements {
            let re = Regex::new(&pattern).with_context(|| format!("invalid title pattern {:?}", pattern))?;
            title_rules.push(TitleRule { pattern: re, replacement });
        }
        Ok(Self { promo_keywords, title_rules })
    }

    pub fn defaults() -> Result<Self> {
        Self::new(DEFAULT_PROMO_KEYWORDS.iter().copied(), default_replacements())
    }

    pub fn from_rules_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("read rules file {}", path.display()))?;
        let rules: RulesFile = serde_json::from_str(&text).with_context(|| format!("parse rules file {}", path.display()))?;
        let keywords = rules
            .promo_keywords
            .unwrap_or_else(|| DEFAULT_PROMO_KEYWORDS.iter().map(|s| s.to_string()).collect());
        let replacements = rules.title_replacements.unwrap_or_else(default_replacements);
        Self::new(keywords, replacements)
    }
}

fn default_replacements() -> Vec<(String, String)> {
    DEFAULT_TITLE_REPLACEMENTS.iter().map(|(p, r)| (p.to_string(), r.to_string())).collect()
}
