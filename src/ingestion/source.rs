use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://remoteok.com";

// category -> page slug under the base url
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("support", "remote-support-jobs"),
    ("engineer", "remote-engineer-jobs"),
    ("software", "remote-software-jobs"),
    ("senior", "remote-senior-jobs"),
    ("technical", "remote-technical-jobs"),
    ("management", "remote-management-jobs"),
    ("growth", "remote-growth-jobs"),
    ("lead", "remote-lead-jobs"),
    ("design", "remote-design-jobs"),
    ("sales", "remote-sales-jobs"),
    ("marketing", "remote-marketing-jobs"),
    ("security", "remote-security-jobs"),
];

/// One page to scrape and the category its listings are filed under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Target {
    pub category: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub base_url: Url,
    pub categories: BTreeMap<String, String>,
}

impl SourceConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = parse_page_url(base_url).context("invalid base url")?;
        let categories = DEFAULT_CATEGORIES.iter().map(|(c, s)| (c.to_string(), s.to_string())).collect();
        Ok(Self { base_url, categories })
    }

    pub fn from_env() -> Result<Self> {
        let base = std::env::var("JOBS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(&base).with_context(|| format!("JOBS_BASE_URL={base}"))
    }

    pub fn url_for(&self, slug: &str) -> Result<String> {
        let joined = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), slug.trim_start_matches('/'));
        Ok(parse_page_url(&joined)?.to_string())
    }

    /// Resolve requested categories to targets; an empty request means all of them.
    pub fn targets(&self, requested: &[String]) -> Result<Vec<Target>> {
        if requested.is_empty() {
            return self
                .categories
                .iter()
                .map(|(category, slug)| Ok(Target { category: category.clone(), url: self.url_for(slug)? }))
                .collect();
        }
        let mut out: Vec<Target> = Vec::with_capacity(requested.len());
        for category in requested {
            let key = category.trim().to_lowercase();
            let Some(slug) = self.categories.get(&key) else {
                let known: Vec<&str> = self.categories.keys().map(String::as_str).collect();
                bail!("unknown category {:?} (known: {})", category, known.join(", "));
            };
            if out.iter().any(|t| t.category == key) { continue; }
            out.push(Target { url: self.url_for(slug)?, category: key });
        }
        Ok(out)
    }
}

/// A caller-supplied page outside the configured categories.
pub fn custom_target(url: &str, label: &str) -> Result<Target> {
    let label = label.trim();
    if label.is_empty() {
        bail!("--label must not be empty");
    }
    Ok(Target { category: label.to_lowercase(), url: parse_page_url(url)?.to_string() })
}

fn parse_page_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid url {raw:?}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("unsupported url scheme {:?} in {raw}", url.scheme());
    }
    Ok(url)
}
