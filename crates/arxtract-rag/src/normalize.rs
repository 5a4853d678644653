use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static REFERENCES_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\nReferences\n|\nBibliography\n|\n\[1\] *[A-Z])").unwrap());
static TRAILING_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\nSupplemental Material[:\n]*|\nSupplemental Information[:\n]*|\nAppendices[:\n]*)",
    )
    .unwrap()
});

static HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\s*\n\s*").unwrap());
static MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());
static ARXIV_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"arXiv:\d{4}\.\d{4,5}(v\d+)?").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static INDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]+").unwrap());
static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

/// Drop the references/bibliography section from extracted text.
///
/// The section starts at the first "References", "Bibliography" or "[1] X"
/// heading. If a supplemental-material heading appears after that start,
/// the text from there on is kept; otherwise everything from the start is
/// cut. No heading means the text is returned unchanged, which also makes
/// this idempotent.
pub fn strip_trailing_sections(text: &str) -> String {
    let Some(start) = REFERENCES_START.find(text) else {
        return text.to_string();
    };
    let head = &text[..start.start()];
    // Only a supplemental heading after the references start marks resumed
    // body text; earlier matches would splice the document out of order.
    match TRAILING_SECTION.find(&text[start.start()..]) {
        Some(end) => {
            let resume = start.start() + end.start();
            format!("{head}{}", &text[resume..])
        }
        None => head.to_string(),
    }
}

/// Normalize extracted text into one whitespace-collapsed line: join
/// hyphenated line breaks, drop arXiv identifiers, collapse runs of
/// spaces and newlines, trim.
pub fn normalize_whitespace(text: &str) -> String {
    if text.is_empty() {
        warn!("no text provided for cleaning");
        return String::new();
    }

    let text = HYPHEN_BREAK.replace_all(text, "");
    let text = MULTI_NEWLINE.replace_all(&text, "\n\n");
    let text = ARXIV_ID.replace_all(&text, "");
    let text = SPACES.replace_all(&text, " ");
    let text = INDENT.replace_all(&text, "\n");
    let text = NEWLINES.replace_all(&text, " ");
    text.trim().to_string()
}
