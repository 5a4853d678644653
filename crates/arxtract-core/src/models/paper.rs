use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One paper fetched from the catalog. Persisted as a JSON card on disk;
/// `text` is filled in after download + extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub url: String,
    pub pdf_url: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_figures: Option<u32>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Paper {
    /// File name of the downloaded binary for this paper.
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.id)
    }

    /// File name of the JSON card for this paper.
    pub fn card_file_name(&self) -> String {
        format!("{}.json", self.id)
    }
}
