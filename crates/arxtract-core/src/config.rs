use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Root application configuration, loaded from `~/.config/arxtract/config.toml`.
/// Missing file means defaults; a malformed file is a fatal config error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub category: String,
    pub page_size: u32,
    pub data_dir: String,
    pub ledger_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub model: String,
    pub n_top_chunks: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embeddings_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub base_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            category: "cond-mat.str-el".to_string(),
            page_size: 100,
            data_dir: "data".to_string(),
            ledger_file: "fetched_arxiv_ids.txt".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            n_top_chunks: 5,
            chunk_size: 1000,
            chunk_overlap: 200,
            embeddings_url: "http://localhost:11434/v1/embeddings".to_string(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-oss:20b".to_string(),
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arxtract")
            .join("config.toml")
    }

    /// Load config from the default location, falling back to defaults if
    /// the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(CoreError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_size
            )));
        }
        if self.fetch.page_size == 0 {
            return Err(CoreError::Config("page_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("/tmp/arxtract_no_such_config.toml")).unwrap();
        assert_eq!(config.fetch.category, "cond-mat.str-el");
        assert_eq!(config.retrieval.n_top_chunks, 5);
    }

    #[test]
    fn overlap_ge_size_is_a_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[retrieval]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[generation]\nmodel = \"llama3.1\"\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.generation.model, "llama3.1");
        assert_eq!(config.fetch.page_size, 100);
    }
}
