use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};

use arxtract_core::{NewRun, QueryRegistry, RunStore, load_card, save_card};
use arxtract_fetch::{DocumentStore, FetchLedger, IncrementalFetcher, relocate};

use crate::chunker::chunk;
use crate::embed::EmbeddingService;
use crate::error::{RagError, Result};
use crate::extract::TextExtraction;
use crate::generate::{GenerationService, Generator};
use crate::normalize::{normalize_whitespace, strip_trailing_sections};
use crate::retriever::Retriever;

/// Answer sentinel for documents that simulate a toy model rather than a
/// real material; their cards are shelved into a `model/` subfolder.
const MODEL_SENTINEL: &str = "model";

/// Result of prompting one document.
#[derive(Debug)]
pub struct ProcessOutcome {
    /// Assigned run id, `None` when the answer was empty and nothing was
    /// recorded.
    pub run_id: Option<String>,
    pub answer: String,
    /// Card location after any relocation.
    pub card_path: PathBuf,
    pub elapsed: f64,
}

/// Result of prompting a whole folder of documents.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub processed: usize,
    pub failed: usize,
    pub elapsed: f64,
}

/// Ties chunking, retrieval, generation and the run log together for the
/// prompt commands. Configuration errors (unknown query, bad chunk
/// geometry) are fatal; per-document failures are logged and skipped in
/// batch mode.
pub struct Orchestrator<'a> {
    registry: &'a QueryRegistry,
    embedder: &'a dyn EmbeddingService,
    backend: &'a dyn GenerationService,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub n_top_chunks: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registry: &'a QueryRegistry,
        embedder: &'a dyn EmbeddingService,
        backend: &'a dyn GenerationService,
    ) -> Self {
        Self {
            registry,
            embedder,
            backend,
            chunk_size: 1000,
            chunk_overlap: 200,
            n_top_chunks: 5,
        }
    }

    /// Run one query against one document card and record the outcome.
    ///
    /// The run is appended only for a non-empty answer. If the answer is the
    /// model sentinel the card is relocated into a `model/` subfolder, after
    /// the append so the run log never misses a recorded answer.
    pub async fn process_document(
        &self,
        card_path: &Path,
        query_name: &str,
        runs: &mut RunStore,
    ) -> Result<ProcessOutcome> {
        let start = Instant::now();

        let entry = self.registry.get(query_name).map_err(RagError::Core)?;
        if card_path.extension().is_none_or(|ext| ext != "json") {
            return Err(RagError::InvalidInput(format!(
                "{} is not a JSON card",
                card_path.display()
            )));
        }
        let paper = load_card(card_path).map_err(RagError::Core)?;
        let text = paper.text.as_deref().ok_or_else(|| {
            RagError::InvalidInput(format!("card {} has no extracted text", paper.id))
        })?;

        let chunks = chunk(text, self.chunk_size, self.chunk_overlap)?;
        let retriever = Retriever::new(self.embedder);
        let context = retriever
            .relevant_context(&entry.retriever_query, &chunks, self.n_top_chunks)
            .await?;

        // An empty context means there is nothing to ask about; the model
        // is never invoked and nothing is recorded.
        if context.is_empty() {
            warn!(id = %paper.id, "empty retrieved context, skipping generation");
            return Ok(ProcessOutcome {
                run_id: None,
                answer: String::new(),
                card_path: card_path.to_path_buf(),
                elapsed: start.elapsed().as_secs_f64(),
            });
        }

        let prompt = entry.prompt.build(&context);
        let generator = Generator::new(self.backend);
        let answer = generator.generate(&prompt).await?;

        let elapsed = start.elapsed().as_secs_f64();
        if answer.is_empty() {
            warn!(id = %paper.id, "empty answer, no run recorded");
            return Ok(ProcessOutcome {
                run_id: None,
                answer,
                card_path: card_path.to_path_buf(),
                elapsed,
            });
        }

        let run = NewRun {
            retriever_model: self.embedder.model(),
            model: self.backend.model(),
            n_top_chunks: self.n_top_chunks,
            query: query_name,
            timestamp: Utc::now().to_rfc3339(),
            elapsed_time: elapsed,
            retriever_query: &entry.retriever_query,
            prompt: &prompt,
            answer: &answer,
        };
        let run_id = runs.append(&paper.id, &run).map_err(RagError::Core)?;
        info!(id = %paper.id, %run_id, "run recorded");

        let final_path = if answer == MODEL_SENTINEL {
            let moved = relocate(card_path, MODEL_SENTINEL)?;
            info!(id = %paper.id, path = %moved.display(), "card shelved as a model simulation");
            moved
        } else {
            card_path.to_path_buf()
        };

        Ok(ProcessOutcome {
            run_id: Some(run_id),
            answer,
            card_path: final_path,
            elapsed,
        })
    }

    /// Run one query against every card under `data_dir`, recursively. The
    /// query name is checked before any document is touched; after that,
    /// one failing document never aborts the batch.
    pub async fn process_all(
        &self,
        data_dir: &Path,
        query_name: &str,
        runs: &mut RunStore,
    ) -> Result<BatchOutcome> {
        let start = Instant::now();
        self.registry.get(query_name).map_err(RagError::Core)?;

        let mut outcome = BatchOutcome::default();
        for card_path in arxtract_core::list_card_paths(data_dir).map_err(RagError::Core)? {
            match self.process_document(&card_path, query_name, runs).await {
                Ok(_) => outcome.processed += 1,
                Err(e) => {
                    error!(path = %card_path.display(), error = %e, "failed to process document, skipping");
                    outcome.failed += 1;
                }
            }
        }
        outcome.elapsed = start.elapsed().as_secs_f64();
        info!(
            processed = outcome.processed,
            failed = outcome.failed,
            "processed arXiv papers in {:.2} seconds",
            outcome.elapsed
        );
        Ok(outcome)
    }
}

/// Fetch new catalog entries, download their PDFs, extract and normalize
/// their text, and persist one JSON card per document.
pub struct Harvester<'a> {
    fetcher: IncrementalFetcher,
    store: DocumentStore,
    extractor: &'a dyn TextExtraction,
    data_dir: PathBuf,
}

impl<'a> Harvester<'a> {
    pub fn new(
        fetcher: IncrementalFetcher,
        store: DocumentStore,
        extractor: &'a dyn TextExtraction,
        data_dir: &Path,
    ) -> Self {
        Self {
            fetcher,
            store,
            extractor,
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// One harvest pass: every returned path is a saved card with extracted,
    /// reference-stripped, normalized text. Documents failing download or
    /// extraction are logged and skipped.
    pub async fn fetch_and_extract(
        &self,
        ledger: &mut FetchLedger,
        max_results: usize,
        batch_size: usize,
    ) -> Result<Vec<PathBuf>> {
        let papers = self.fetcher.fetch(ledger, max_results, batch_size, 0).await?;
        info!(count = papers.len(), "new papers fetched");

        let mut cards = Vec::new();
        for mut paper in papers {
            let Some(pdf_path) = self.store.download(&paper).await else {
                continue;
            };
            match self.extract_text(&pdf_path) {
                Ok(text) => {
                    paper.text = Some(text);
                    let card = save_card(&self.data_dir, &paper).map_err(RagError::Core)?;
                    cards.push(card);
                }
                Err(e) => {
                    error!(id = %paper.id, error = %e, "failed to extract text, skipping");
                }
            }
        }
        Ok(cards)
    }

    fn extract_text(&self, pdf_path: &Path) -> Result<String> {
        let raw = self.extractor.extract(pdf_path)?;
        let body = strip_trailing_sections(&raw);
        Ok(normalize_whitespace(&body))
    }
}
