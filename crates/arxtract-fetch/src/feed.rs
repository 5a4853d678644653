use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::{FetchError, Result};

/// One raw entry of the catalog feed, as decoded off the wire. Validation
/// and conversion into a `Paper` happen in the fetcher.
#[derive(Debug, Deserialize)]
pub struct FeedEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(rename = "author", default)]
    pub authors: Vec<FeedAuthor>,
    #[serde(rename = "category", default)]
    pub categories: Vec<FeedCategory>,
    #[serde(rename = "arxiv:comment", alias = "comment", default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedAuthor {
    pub name: String,
    #[serde(rename = "arxiv:affiliation", alias = "affiliation", default)]
    pub affiliation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedCategory {
    #[serde(rename = "@term")]
    pub term: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<FeedEntry>,
}

/// Decode an Atom feed response into its entries. An undecodable body is a
/// fatal feed error for the fetch call; an empty entry list is not.
pub fn decode_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let feed: AtomFeed =
        from_str(xml).map_err(|e| FetchError::Feed(format!("invalid atom xml: {e}")))?;
    Ok(feed.entries)
}
