use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arxtract_fetch::RateLimitedClient;

use crate::error::{RagError, Result};

/// Maps texts to dense vectors. One call embeds a whole batch so backends
/// can amortize round trips.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier recorded alongside runs.
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embeddings over an OpenAI-compatible `/v1/embeddings` endpoint, as served
/// by local model runtimes.
pub struct HttpEmbedder {
    client: RateLimitedClient,
    url: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(url: &str, model: &str) -> Self {
        Self {
            client: RateLimitedClient::new(std::time::Duration::from_millis(0), 2, "arxtract/0.1"),
            url: url.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut response: EmbeddingResponse = self
            .client
            .post_json(&self.url, &request)
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if response.data.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Deterministic bag-of-words embedding: each lowercased token is hashed
/// into one of `dim` buckets and the result is L2-normalized. No external
/// service, useful as a degraded fallback and in tests.
pub struct HashedEmbedder {
    dim: usize,
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{DefaultHasher, Hash, Hasher};

        let mut vector = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dim;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for HashedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model(&self) -> &str {
        "hashed-bow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_embedder_is_deterministic_and_normalized() {
        let embedder = HashedEmbedder::new(256);
        let texts = vec!["density functional theory".to_string()];
        let a = embedder.embed(&texts).await.unwrap();
        let b = embedder.embed(&texts).await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn similar_texts_score_higher_than_unrelated_ones() {
        let embedder = HashedEmbedder::new(256);
        let texts = vec![
            "hubbard model on a square lattice".to_string(),
            "hubbard model with onsite interaction".to_string(),
            "weather forecast for tomorrow".to_string(),
        ];
        let vectors = embedder.embed(&texts).await.unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&vectors[0], &vectors[1]) > dot(&vectors[0], &vectors[2]));
    }

    #[tokio::test]
    async fn http_embedder_decodes_and_reorders_by_index() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let _m = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let embedder = HttpEmbedder::new(
            &format!("{}/v1/embeddings", server.url()),
            "all-MiniLM-L6-v2",
        );
        let texts = vec!["a".to_string(), "b".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn mismatched_embedding_count_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({"data": [{"index": 0, "embedding": [1.0]}]});
        let _m = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let embedder = HttpEmbedder::new(
            &format!("{}/v1/embeddings", server.url()),
            "all-MiniLM-L6-v2",
        );
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embedder.embed(&texts).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }
}
