pub mod chunker;
pub mod embed;
pub mod error;
pub mod extract;
pub mod generate;
pub mod normalize;
pub mod pipeline;
pub mod retriever;

pub use chunker::{Chunk, chunk};
pub use embed::{EmbeddingService, HashedEmbedder, HttpEmbedder};
pub use error::{RagError, Result};
pub use extract::{PdfTextExtractor, TextExtraction};
pub use generate::{GenerationService, Generator, OllamaGenerator, answer_to_values};
pub use normalize::{normalize_whitespace, strip_trailing_sections};
pub use pipeline::{BatchOutcome, Harvester, Orchestrator, ProcessOutcome};
pub use retriever::Retriever;
