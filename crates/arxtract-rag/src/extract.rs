use std::path::Path;

use lopdf::Document;
use tracing::warn;

use crate::error::{RagError, Result};

/// Raw text extraction from a document file. Behind a trait so the pipeline
/// can be tested without real PDFs.
pub trait TextExtraction {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// PDF text extraction via lopdf. Pages that fail to decode are skipped
/// with a warning; an unreadable document is an error.
pub struct PdfTextExtractor;

impl TextExtraction for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let doc = Document::load(path)
            .map_err(|e| RagError::Extraction(format!("{}: {e}", path.display())))?;

        let mut pages_text = Vec::new();
        for (page_number, _) in doc.get_pages() {
            match doc.extract_text(&[page_number]) {
                Ok(text) => pages_text.push(text),
                Err(e) => {
                    warn!(path = %path.display(), page = page_number, error = %e, "skipping undecodable page");
                }
            }
        }

        if pages_text.is_empty() {
            return Err(RagError::Extraction(format!(
                "{}: no extractable text",
                path.display()
            )));
        }
        Ok(pages_text.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_extraction_error() {
        let err = PdfTextExtractor
            .extract(Path::new("/nonexistent/paper.pdf"))
            .unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }
}
