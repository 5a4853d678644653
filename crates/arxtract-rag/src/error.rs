use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("pdf extraction failed: {0}")]
    Extraction(String),

    #[error("embedding backend error: {0}")]
    Embedding(String),

    #[error("generation backend error: {0}")]
    Generation(String),

    #[error(transparent)]
    Core(#[from] arxtract_core::CoreError),

    #[error(transparent)]
    Fetch(#[from] arxtract_fetch::FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;
