use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use regex::NoExpand;
use serde_json::Value;

use crate::listing::{CleanedListing, PostedAt, RawListing, RawTags};
use crate::util::time::{from_epoch_secs, parse_timestamp_str};

use super::config::CleanerConfig;

/// Turn a raw listing set into a deduplicated, filtered, normalized and
/// date-validated one. Never fails; an empty or fully filtered input gives
/// an empty result.
///
/// Steps run in a fixed order: recency sort, (title, company) dedup keeping the
/// newest, promotional filter, title normalization, tag coercion, date check.
pub fn clean(raw: Vec<RawListing>, cfg: &CleanerConfig) -> Vec<CleanedListing> {
    let mut rows: Vec<(Option<DateTime<Utc>>, RawListing)> =
        raw.into_iter().map(|r| (coerce_posted_at(r.posted_at.as_ref()), r)).collect();

    // Newest first; undated rows last. Stable, so ties keep input order.
    rows.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut seen: HashSet<(String, String)> = HashSet::new();
    rows.retain(|(_, r)| seen.insert((r.title.clone(), r.company.clone())));

    rows.retain(|(_, r)| !is_promotional(&r.title, cfg));

    rows.into_iter()
        .filter_map(|(posted_at, r)| {
            let normalized_title = normalize_title(&r.title, cfg);
            let tags = coerce_tags(r.tags);
            let posted_at = posted_at?;
            Some(CleanedListing {
                title: r.title,
                company: r.company,
                location: r.location,
                posted_at,
                tags,
                normalized_title,
                category: None,
            })
        })
        .collect()
}

fn is_promotional(title: &str, cfg: &CleanerConfig) -> bool {
    let lowered = title.to_lowercase();
    cfg.promo_keywords.iter().any(|k| lowered.contains(k.as_str()))
}

pub fn normalize_title(title: &str, cfg: &CleanerConfig) -> String {
    let mut out = title.to_lowercase();
    for rule in &cfg.title_rules {
        out = rule.pattern.replace_all(&out, NoExpand(&rule.replacement)).into_owned();
    }
    out
}

fn coerce_tags(tags: RawTags) -> Vec<String> {
    match tags {
        RawTags::List(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        RawTags::Malformed(_) => Vec::new(),
    }
}

fn coerce_posted_at(posted_at: Option<&PostedAt>) -> Option<DateTime<Utc>> {
    match posted_at? {
        PostedAt::At(ts) => Some(*ts),
        PostedAt::Epoch(secs) => from_epoch_secs(*secs),
        PostedAt::Text(s) => parse_timestamp_str(s),
        PostedAt::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    fn raw(title: &str, company: &str, posted: Option<PostedAt>) -> RawListing {
        RawListing {
            title: title.to_string(),
            company: company.to_string(),
            location: "Remote".to_string(),
            posted_at: posted,
            tags: vec!["rust".to_string()].into(),
        }
    }

    fn at(day: u32) -> Option<PostedAt> { Some(PostedAt::At(ts(day))) }

    fn cfg() -> CleanerConfig { CleanerConfig::defaults().unwrap() }

    #[test]
    fn empty_in_empty_out() {
        assert!(clean(Vec::new(), &cfg()).is_empty());
    }

    #[test]
    fn newest_duplicate_wins() {
        let mut older = raw("Backend Dev", "Acme", at(1));
        older.location = "Berlin".into();
        let mut newer = raw("Backend Dev", "Acme", at(9));
        newer.location = "Lisbon".into();

        let out = clean(vec![newer, older], &cfg());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].posted_at, ts(9));
        assert_eq!(out[0].location, "Lisbon");
    }

    #[test]
    fn five_rows_with_one_duplicate_pair() {
        let mut r4 = raw("Backend Dev", "Acme", at(20));
        r4.tags = vec!["go".to_string()].into();
        let input = vec![
            raw("Frontend Engineer", "Globex", at(3)),
            raw("Backend Dev", "Acme", at(5)),
            raw("Data Scientist", "Initech", at(7)),
            r4,
            raw("Support Lead", "Helpdesk", at(2)),
        ];

        let out = clean(input, &cfg());
        assert_eq!(out.len(), 4);
        let acme: Vec<&CleanedListing> = out.iter().filter(|c| c.company == "Acme").collect();
        assert_eq!(acme.len(), 1);
        assert_eq!(acme[0].posted_at, ts(20));
        assert_eq!(acme[0].tags, vec!["go".to_string()]);
    }

    #[test]
    fn promotional_titles_are_dropped() {
        let input = vec![
            raw("Frontend Engineer Bootcamp Guaranteed Job", "Scam Inc", at(4)),
            raw("Frontend Engineer", "Acme", at(4)),
            raw("MONEY BACK if not hired", "Scam Inc", at(4)),
        ];
        let out = clean(input, &cfg());
        let titles: Vec<&str> = out.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Frontend Engineer"]);
    }

    #[test]
    fn titles_are_normalized_in_rule_order() {
        let c = cfg();
        assert_eq!(normalize_title("Senior ML Engineer", &c), "senior machine learning engineer");
        assert_eq!(normalize_title("HTML Developer", &c), "html developer");
        assert_eq!(normalize_title("Staff Software Engineer", &c), "staff swe");
        assert_eq!(normalize_title("Data Scientist / Data Analyst", &c), "ds / da");
        assert_eq!(normalize_title("Product Manager", &c), "pm");
    }

    #[test]
    fn rule_order_matters_when_patterns_overlap() {
        let first = CleanerConfig::new(
            Vec::<String>::new(),
            vec![("software engineer".to_string(), "swe".to_string()), ("engineer".to_string(), "eng".to_string())],
        )
        .unwrap();
        let reversed = CleanerConfig::new(
            Vec::<String>::new(),
            vec![("engineer".to_string(), "eng".to_string()), ("software engineer".to_string(), "swe".to_string())],
        )
        .unwrap();
        assert_eq!(normalize_title("Software Engineer", &first), "swe");
        assert_eq!(normalize_title("Software Engineer", &reversed), "software eng");
    }

    #[test]
    fn replacement_text_is_literal() {
        let c = CleanerConfig::new(Vec::<String>::new(), vec![("dev".to_string(), "$1 engineer".to_string())]).unwrap();
        assert_eq!(normalize_title("Dev", &c), "$1 engineer");
    }

    #[test]
    fn tags_are_coerced_not_rejected() {
        let mut mixed = raw("A", "X", at(1));
        mixed.tags = RawTags::List(vec![Value::String("rust".into()), Value::from(3), Value::Bool(true)]);
        let mut broken = raw("B", "Y", at(1));
        broken.tags = RawTags::Malformed(Value::String("rust, go".into()));

        let out = clean(vec![mixed, broken], &cfg());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].tags, vec!["rust".to_string(), "3".to_string(), "true".to_string()]);
        assert!(out[1].tags.is_empty());
    }

    #[test]
    fn undated_and_unparseable_rows_are_dropped() {
        let input = vec![
            raw("A", "X", at(1)),
            raw("B", "X", Some(PostedAt::Text("not a date".into()))),
            raw("C", "X", None),
            raw("D", "X", Some(PostedAt::Text("2024-06-02 08:00:00".into()))),
            raw("E", "X", Some(PostedAt::Epoch(1_717_300_000))),
        ];
        let out = clean(input, &cfg());
        let mut titles: Vec<&str> = out.iter().map(|c| c.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["A", "D", "E"]);
    }

    #[test]
    fn dated_duplicate_beats_undated_one() {
        let out = clean(vec![raw("Dev", "Acme", None), raw("Dev", "Acme", at(2))], &cfg());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].posted_at, ts(2));
    }

    #[test]
    fn output_is_newest_first() {
        let out = clean(vec![raw("A", "X", at(1)), raw("B", "X", at(3)), raw("C", "X", at(2))], &cfg());
        let titles: Vec<&str> = out.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C", "A"]);
    }

    #[test]
    fn cleaning_twice_changes_nothing() {
        let input = vec![
            raw("Senior ML Engineer", "Acme", at(5)),
            raw("Senior ML Engineer", "Acme", at(3)),
            raw("Bootcamp Mentor", "Scam", at(4)),
            raw("Designer", "Studio", None),
            raw("Software Engineer", "Globex", at(6)),
        ];
        let once = clean(input, &cfg());
        let again = clean(once.iter().cloned().map(RawListing::from).collect(), &cfg());
        assert_eq!(once, again);
        assert_eq!(once.len(), 2);
    }
}
