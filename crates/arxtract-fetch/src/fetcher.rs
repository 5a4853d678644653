use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info};

use arxtract_core::{Author, Paper};

use crate::error::Result;
use crate::feed::{FeedEntry, decode_feed};
use crate::http::RateLimitedClient;
use crate::ledger::FetchLedger;

pub const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

static PAGES_FIGURES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+) *pages*, *(\d+) *figures*").unwrap());

/// Polls the catalog for documents in one category, newest first, skipping
/// identifiers already present in the [`FetchLedger`].
pub struct IncrementalFetcher {
    client: RateLimitedClient,
    base_url: String,
    category: String,
}

impl IncrementalFetcher {
    pub fn new(category: &str) -> Self {
        Self::with_params(ARXIV_API_URL, category, Duration::from_secs(3))
    }

    pub fn with_params(base_url: &str, category: &str, min_interval: Duration) -> Self {
        // Catalog requests are not retried: a failed page is fatal for the
        // fetch call and the next invocation starts over cleanly.
        Self {
            client: RateLimitedClient::new(min_interval, 0, "arxtract/0.1"),
            base_url: base_url.to_string(),
            category: category.to_string(),
        }
    }

    /// Fetch up to `max_results` documents not already in the ledger, in
    /// pages of at most `batch_size`, starting at `start`.
    ///
    /// The ledger is appended to exactly once, after the whole batch has
    /// been collected; a page failure propagates without touching it.
    pub async fn fetch(
        &self,
        ledger: &mut FetchLedger,
        max_results: usize,
        batch_size: usize,
        start: usize,
    ) -> Result<Vec<Paper>> {
        let mut new_papers: Vec<Paper> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut start_index = start;

        'pages: while new_papers.len() < max_results {
            let remaining = max_results - new_papers.len();
            let page_size = batch_size.min(remaining).max(1);

            let url = format!(
                "{}?search_query=cat:{}&start={}&max_results={}&sortBy=submittedDate&sortOrder=descending",
                self.base_url,
                urlencoding::encode(&self.category),
                start_index,
                page_size,
            );
            let xml = self.client.get(&url).await?;
            let entries = decode_feed(&xml)?;

            if entries.is_empty() {
                info!("no papers found in the response");
                break;
            }

            for entry in entries {
                let Some(paper) = self.convert_entry(entry, ledger, &mut seen) else {
                    continue;
                };
                debug!(id = %paper.id, "paper fetched from the catalog");
                new_papers.push(paper);
                if new_papers.len() >= max_results {
                    break 'pages;
                }
            }

            start_index += page_size;
        }

        if !new_papers.is_empty() {
            ledger.append_all(new_papers.iter().map(|p| p.id.as_str()))?;
        }
        Ok(new_papers)
    }

    /// Validate one raw feed entry and turn it into a `Paper`. Entries that
    /// fail validation are dropped with one log line each; already-seen
    /// identifiers are skipped silently.
    fn convert_entry(
        &self,
        entry: FeedEntry,
        ledger: &FetchLedger,
        seen: &mut HashSet<String>,
    ) -> Option<Paper> {
        let title = entry.title.as_deref().unwrap_or_default();
        if title.contains("Error") {
            error!("error fetching the paper entry, skipping");
            return None;
        }

        let url_id = entry.id.as_deref().unwrap_or_default();
        if url_id.is_empty() || !url_id.contains("arxiv.org") {
            error!(url = %url_id, "paper without a valid catalog id, skipping");
            return None;
        }
        let id = url_id
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim_end_matches(".pdf")
            .to_string();

        if ledger.contains(&id) || !seen.insert(id.clone()) {
            debug!(%id, "paper already in ledger, skipping");
            return None;
        }

        let summary = entry.summary.as_deref().unwrap_or_default();
        if summary.trim().is_empty() {
            error!(%id, "paper without summary/abstract, skipping");
            return None;
        }

        let authors: Vec<Author> = entry
            .authors
            .into_iter()
            .map(|author| Author {
                name: clean_text(&author.name),
                affiliation: clean_optional(author.affiliation),
            })
            .collect();
        if authors.is_empty() {
            info!(%id, "paper without authors");
        }

        let categories: Vec<String> = entry
            .categories
            .into_iter()
            .filter_map(|category| clean_optional(category.term))
            .collect();

        let comment = clean_optional(entry.comment);
        let (n_pages, n_figures) = comment
            .as_deref()
            .map(parse_pages_figures)
            .unwrap_or((None, None));

        Some(Paper {
            id,
            url: url_id.to_string(),
            pdf_url: url_id.replace("abs", "pdf"),
            title: clean_text(title),
            summary: clean_text(summary),
            authors,
            comment,
            n_pages,
            n_figures,
            categories,
            published: parse_timestamp(entry.published.as_deref()),
            updated: parse_timestamp(entry.updated.as_deref()),
            text: None,
        })
    }
}

/// Declared page and figure counts from the free-text comment. First match
/// wins; no match is not an error.
pub fn parse_pages_figures(comment: &str) -> (Option<u32>, Option<u32>) {
    match PAGES_FIGURES.captures(comment) {
        Some(caps) => {
            let pages = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let figures = caps.get(2).and_then(|m| m.as_str().parse().ok());
            (pages, figures)
        }
        None => (None, None),
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value?.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}
