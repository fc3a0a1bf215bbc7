use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct StatsCount { pub listings: i64, pub last_scrape_run: Option<DateTime<Utc>> }

#[derive(Serialize)]
pub struct SkillCount { pub skill: String, pub cnt: i64 }

#[derive(Serialize)]
pub struct CompanyCount { pub company: String, pub cnt: i64 }

#[derive(Serialize)]
pub struct StatsReport {
    pub category: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub count: StatsCount,
    pub top_skills: Vec<SkillCount>,
    pub top_companies: Vec<CompanyCount>,
}
