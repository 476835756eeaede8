//! FetchKB: keyword search over a small fixed knowledge base.

use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::info;

/// Terms shorter than this are ignored in per-term matching
const MIN_TERM_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KbEntry {
    pub id: &'static str,
    pub snippet: &'static str,
    pub confidence: f64,
    pub category: &'static str,
}

pub const KB_ENTRIES: &[KbEntry] = &[
    KbEntry {
        id: "KB1",
        snippet: "If you see 500 errors, try clearing cache and refreshing the page",
        confidence: 0.6,
        category: "troubleshooting",
    },
    KbEntry {
        id: "KB2",
        snippet: "Storage bucket access issues: Check IAM permissions and bucket policy",
        confidence: 0.8,
        category: "storage",
    },
    KbEntry {
        id: "KB3",
        snippet: "Billing refunds are processed within 3-5 business days",
        confidence: 0.9,
        category: "billing",
    },
    KbEntry {
        id: "KB4",
        snippet: "Service outages are posted on status.example.com",
        confidence: 0.7,
        category: "status",
    },
    KbEntry {
        id: "KB5",
        snippet: "Payment failed but amount deducted: the refund reverses automatically within 5-7 business days",
        confidence: 0.85,
        category: "billing",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KbResult {
    pub matched: bool,
    pub top_snippets: Vec<KbEntry>,
    pub query: String,
}

struct Scored<'a> {
    entry: &'a KbEntry,
    category_hits: usize,
    term_hits: usize,
}

/// Distinct terms in first-seen order
fn terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .filter(|t| seen.insert(*t))
        .map(str::to_string)
        .collect()
}

fn score<'a>(entry: &'a KbEntry, query: &str, terms: &[String]) -> Option<Scored<'a>> {
    let snippet = entry.snippet.to_lowercase();
    let category = entry.category.to_lowercase();

    let whole = snippet.contains(query) || category.contains(query);
    let category_hits = terms.iter().filter(|t| category.contains(t.as_str())).count()
        + usize::from(!query.is_empty() && category.contains(query));
    let term_hits = terms
        .iter()
        .filter(|t| snippet.contains(t.as_str()) || category.contains(t.as_str()))
        .count();

    (whole || term_hits > 0).then_some(Scored {
        entry,
        category_hits,
        term_hits,
    })
}

/// Search the knowledge base.
///
/// An entry matches when the whole query or any term of three or more
/// characters occurs in its snippet or category. Results rank by category
/// hits, then term hits, then confidence, then id. An empty query matches
/// every entry.
pub fn search(query: &str) -> KbResult {
    let q = query.trim().to_lowercase();
    let terms = terms(&q);

    let mut scored: Vec<Scored> = KB_ENTRIES
        .iter()
        .filter_map(|e| score(e, &q, &terms))
        .collect();

    scored.sort_by(|a, b| {
        b.category_hits
            .cmp(&a.category_hits)
            .then_with(|| b.term_hits.cmp(&a.term_hits))
            .then_with(|| {
                b.entry
                    .confidence
                    .partial_cmp(&a.entry.confidence)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.entry.id.cmp(b.entry.id))
    });

    let top_snippets: Vec<KbEntry> = scored.into_iter().map(|s| s.entry.clone()).collect();
    KbResult {
        matched: !top_snippets.is_empty(),
        top_snippets,
        query: query.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KbQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn kb_search(Query(query): Query<KbQuery>) -> Json<KbResult> {
    let result = search(&query.q);
    info!(
        "[FetchKB] '{}' matched {} entries",
        query.q,
        result.top_snippets.len()
    );
    Json(result)
}
