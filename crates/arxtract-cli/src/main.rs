use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use arxtract_core::{AppConfig, QueryRegistry, RunStore};
use arxtract_fetch::{DocumentStore, FetchLedger, IncrementalFetcher};
use arxtract_rag::{Harvester, HttpEmbedder, OllamaGenerator, Orchestrator, PdfTextExtractor};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "arxtract",
    about = "Fetch arXiv papers and extract structured data from them with an LLM",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new papers from arXiv, extract their text and store one JSON
    /// card per paper.
    Fetch {
        /// arXiv category to poll.
        #[arg(long)]
        category: Option<String>,

        /// Number of new papers to fetch.
        #[arg(long, short = 'n', default_value = "10")]
        count: usize,

        /// Page size for catalog requests.
        #[arg(long)]
        page_size: Option<usize>,

        /// Folder for PDFs, cards and the fetch ledger.
        #[arg(long)]
        data_dir: Option<String>,
    },

    /// Prompt the LLM with the text of one paper card and record the answer.
    Prompt {
        /// Path to the JSON card of the paper.
        #[arg(long, short = 'f')]
        file_path: String,

        /// Model used to embed chunks for retrieval.
        #[arg(long, short = 'r', default_value = "all-MiniLM-L6-v2")]
        retriever_model: String,

        /// Number of top chunks to retrieve.
        #[arg(long, default_value = "5")]
        n_top_chunks: usize,

        /// Model used for generation.
        #[arg(long, short = 'm', default_value = "llama3.1:70b")]
        model: String,

        /// Named query to run. See `arxtract queries`.
        #[arg(long, short = 'q', default_value = "material_formula")]
        query: String,
    },

    /// Prompt the LLM with the text of every paper card under a folder.
    PromptAll {
        /// Folder containing the JSON cards.
        #[arg(long, default_value = "./data")]
        data_path: String,

        /// Model used to embed chunks for retrieval.
        #[arg(long, short = 'r', default_value = "all-MiniLM-L6-v2")]
        retriever_model: String,

        /// Number of top chunks to retrieve.
        #[arg(long, default_value = "5")]
        n_top_chunks: usize,

        /// Model used for generation.
        #[arg(long, short = 'm', default_value = "llama3.1:70b")]
        model: String,

        /// Named query to run. See `arxtract queries`.
        #[arg(long, short = 'q', default_value = "material_formula")]
        query: String,
    },

    /// List the available named queries.
    Queries,
}

// ─── Main ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let start = Instant::now();
    let cli = Cli::parse();

    // Env var overrides
    let mut config = AppConfig::load()?;
    if let Ok(dir) = std::env::var("ARXTRACT_DATA_DIR") {
        config.fetch.data_dir = dir;
    }

    let registry = QueryRegistry::builtin();

    match cli.command {
        Commands::Fetch {
            category,
            count,
            page_size,
            data_dir,
        } => {
            let category = category.unwrap_or_else(|| config.fetch.category.clone());
            let page_size = page_size.unwrap_or(config.fetch.page_size as usize);
            let data_dir = PathBuf::from(data_dir.unwrap_or_else(|| config.fetch.data_dir.clone()));

            let mut ledger = FetchLedger::open(&data_dir.join(&config.fetch.ledger_file))?;
            let harvester = Harvester::new(
                IncrementalFetcher::new(&category),
                DocumentStore::new(&data_dir),
                &PdfTextExtractor,
                &data_dir,
            );
            let cards = harvester
                .fetch_and_extract(&mut ledger, count, page_size)
                .await?;

            println!(
                "Fetched and extracted {} paper(s) in {:.2} seconds",
                cards.len(),
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Prompt {
            file_path,
            retriever_model,
            n_top_chunks,
            model,
            query,
        } => {
            if !check_query(&registry, &query) {
                return Ok(());
            }
            let card_path = PathBuf::from(&file_path);
            let data_dir = card_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let mut runs = RunStore::open(&data_dir.join("runs.db"))?;

            let embedder = HttpEmbedder::new(&config.retrieval.embeddings_url, &retriever_model);
            let backend = OllamaGenerator::new(&config.generation.base_url, &model);
            let mut orchestrator = Orchestrator::new(&registry, &embedder, &backend);
            orchestrator.chunk_size = config.retrieval.chunk_size;
            orchestrator.chunk_overlap = config.retrieval.chunk_overlap;
            orchestrator.n_top_chunks = n_top_chunks;

            let outcome = orchestrator
                .process_document(&card_path, &query, &mut runs)
                .await?;
            match outcome.run_id {
                Some(run_id) => println!("Recorded {run_id}: {}", outcome.answer),
                None => println!("Empty answer, nothing recorded."),
            }
            println!(
                "Processed arXiv papers in {:.2} seconds\n",
                start.elapsed().as_secs_f64()
            );
        }

        Commands::PromptAll {
            data_path,
            retriever_model,
            n_top_chunks,
            model,
            query,
        } => {
            if !check_query(&registry, &query) {
                return Ok(());
            }
            let data_dir = PathBuf::from(&data_path);
            let mut runs = RunStore::open(&data_dir.join("runs.db"))?;

            let embedder = HttpEmbedder::new(&config.retrieval.embeddings_url, &retriever_model);
            let backend = OllamaGenerator::new(&config.generation.base_url, &model);
            let mut orchestrator = Orchestrator::new(&registry, &embedder, &backend);
            orchestrator.chunk_size = config.retrieval.chunk_size;
            orchestrator.chunk_overlap = config.retrieval.chunk_overlap;
            orchestrator.n_top_chunks = n_top_chunks;

            let outcome = orchestrator
                .process_all(&data_dir, &query, &mut runs)
                .await?;
            println!(
                "{} paper(s) processed, {} failed.",
                outcome.processed, outcome.failed
            );
            println!(
                "Processed arXiv papers in {:.2} seconds\n",
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Queries => {
            for name in registry.names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Query names are checked before any document is opened so a typo never
/// half-processes a batch.
fn check_query(registry: &QueryRegistry, query: &str) -> bool {
    if registry.contains(query) {
        return true;
    }
    println!(
        "Query '{query}' not found in registry. Available queries are: {:?}",
        registry.names()
    );
    false
}
