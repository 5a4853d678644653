use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::models::Paper;

/// Path of the JSON card for a paper id: `{data_dir}/{id}.json`.
pub fn card_path(data_dir: &Path, id: &str) -> PathBuf {
    data_dir.join(format!("{id}.json"))
}

/// Save a Paper as a pretty-printed JSON card. Overwrites silently.
pub fn save_card(data_dir: &Path, paper: &Paper) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)?;
    let path = card_path(data_dir, &paper.id);
    let json = serde_json::to_string_pretty(paper)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Load a single Paper card from a JSON file.
pub fn load_card(path: &Path) -> Result<Paper> {
    if !path.exists() {
        return Err(CoreError::DocumentNotFound(path.display().to_string()));
    }
    let contents = fs::read_to_string(path)?;
    let paper: Paper = serde_json::from_str(&contents)?;
    Ok(paper)
}

/// Recursively list all `*.json` card paths under a directory, sorted for a
/// stable batch order.
pub fn list_card_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    if !dir.exists() {
        return Ok(paths);
    }
    collect_cards(dir, &mut paths)?;
    paths.sort();
    Ok(paths)
}

fn collect_cards(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_cards(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_paper(id: &str) -> Paper {
        Paper {
            id: id.to_string(),
            url: format!("https://arxiv.org/abs/{id}"),
            pdf_url: format!("https://arxiv.org/pdf/{id}"),
            title: "Sample".to_string(),
            summary: "Abstract".to_string(),
            authors: vec![],
            comment: None,
            n_pages: None,
            n_figures: None,
            categories: vec!["cond-mat.str-el".to_string()],
            published: None,
            updated: None,
            text: Some("Main text content.".to_string()),
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let paper = sample_paper("2502.10309v1");
        let path = save_card(dir.path(), &paper).unwrap();
        let loaded = load_card(&path).unwrap();
        assert_eq!(loaded.id, "2502.10309v1");
        assert_eq!(loaded.text.as_deref(), Some("Main text content."));
    }

    #[test]
    fn load_missing_card_is_not_found() {
        let err = load_card(Path::new("/tmp/arxtract_no_such_card.json")).unwrap_err();
        assert!(matches!(err, CoreError::DocumentNotFound(_)));
    }

    #[test]
    fn list_cards_recurses_subdirectories() {
        let dir = TempDir::new().unwrap();
        save_card(dir.path(), &sample_paper("2501.00001v1")).unwrap();
        save_card(&dir.path().join("model"), &sample_paper("2501.00002v1")).unwrap();
        let paths = list_card_paths(dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn list_cards_missing_dir_is_empty() {
        let paths = list_card_paths(Path::new("/tmp/arxtract_no_such_dir")).unwrap();
        assert!(paths.is_empty());
    }
}
