use std::cmp::Ordering;

use tracing::{info, warn};

use crate::chunker::Chunk;
use crate::embed::EmbeddingService;
use crate::error::Result;

/// Scores chunks against a retrieval query and assembles the top ones into
/// a single context string.
pub struct Retriever<'a> {
    embedder: &'a dyn EmbeddingService,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn EmbeddingService) -> Self {
        Self { embedder }
    }

    /// Cosine-rank `chunks` against `query` and join the `n_top_chunks`
    /// best ones with blank lines, in score order. Ties keep chunk order.
    /// No chunks means an empty context, not an error.
    pub async fn relevant_context(
        &self,
        query: &str,
        chunks: &[Chunk],
        n_top_chunks: usize,
    ) -> Result<String> {
        if chunks.is_empty() {
            warn!("no chunks provided");
            return Ok(String::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let query_text = [query.to_string()];
        let query_vec = self
            .embedder
            .embed(&query_text)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        let chunk_vecs = self.embedder.embed(&texts).await?;

        let mut scored: Vec<(usize, f32)> = chunk_vecs
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&query_vec, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(n_top_chunks);

        info!(
            n_top_chunks,
            scores = ?scored.iter().map(|(_, s)| *s).collect::<Vec<_>>(),
            "top chunks retrieved"
        );

        Ok(scored
            .iter()
            .map(|(i, _)| texts[*i].as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashedEmbedder;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                start: i * 100,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.5, 0.7];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn most_relevant_chunk_comes_first() {
        let embedder = HashedEmbedder::new(512);
        let retriever = Retriever::new(&embedder);
        let chunks = chunks(&[
            "the weather is sunny and warm today",
            "density functional theory calculations of the band structure",
            "a recipe for sourdough bread",
        ]);

        let context = retriever
            .relevant_context("density functional theory band structure", &chunks, 2)
            .await
            .unwrap();

        let parts: Vec<&str> = context.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0],
            "density functional theory calculations of the band structure"
        );
    }

    #[tokio::test]
    async fn no_chunks_yields_empty_context() {
        let embedder = HashedEmbedder::new(64);
        let retriever = Retriever::new(&embedder);
        let context = retriever.relevant_context("query", &[], 5).await.unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn fewer_chunks_than_requested_returns_them_all() {
        let embedder = HashedEmbedder::new(64);
        let retriever = Retriever::new(&embedder);
        let chunks = chunks(&["only chunk"]);
        let context = retriever
            .relevant_context("anything", &chunks, 5)
            .await
            .unwrap();
        assert_eq!(context, "only chunk");
    }
}
