use alphadex_core::{build_index, read_corpus, BuildConfig, HtmlProcessor, IndexPaths, QueryEngine, StemmingNormalizer};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a letter-sharded TF-IDF inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of crawled JSON/JSONL pages
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Where partial indexes are spilled (defaults to <output>/partials)
        #[arg(long)]
        tmp: Option<String>,
        /// Documents per partial index
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
        /// Checkpoint early once a batch holds this many postings
        #[arg(long, default_value_t = 5_000_000)]
        max_batch_postings: usize,
        /// Split a letter shard into chunks above this many bytes
        #[arg(long, default_value_t = 1024 * 1024)]
        chunk_bytes: u64,
        /// Process documents on a single thread
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Run one query against a built index
    Search {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: String,
        /// Free text, or clauses joined by " AND "
        #[arg(long)]
        query: String,
        /// Number of results
        #[arg(long, default_value_t = 5)]
        k: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, tmp, batch_size, max_batch_postings, chunk_bytes, sequential } => {
            let config = BuildConfig { batch_size, max_batch_postings, chunk_bytes, parallel: !sequential };
            let mut paths = IndexPaths::new(&output);
            if let Some(tmp) = tmp {
                paths = paths.with_partials_dir(tmp);
            }
            build(&input, &paths, &config)
        }
        Commands::Search { index, query, k } => search(&index, &query, k),
    }
}

fn build(input: &str, paths: &IndexPaths, config: &BuildConfig) -> Result<()> {
    let processor = HtmlProcessor::new(StemmingNormalizer);
    let (num_docs, report) = build_index(read_corpus(Path::new(input)), &processor, config, paths)?;

    println!("Number of documents indexed: {}", report.documents_indexed);
    println!("Number of unique tokens: {}", report.unique_term_count);
    println!("Size of the index on disk: {:.3} kilobytes", report.on_disk_bytes as f64 / 1000.0);
    tracing::info!(num_docs, output = %paths.root.display(), "done");
    Ok(())
}

fn search(index: &str, query: &str, k: usize) -> Result<()> {
    let engine = QueryEngine::open(IndexPaths::new(index))?;
    let start = Instant::now();
    let hits = engine.search_top_k(query, k)?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    if hits.is_empty() {
        println!("No results found for your query.");
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. {} (TF-IDF score: {:.3})", i + 1, hit.url, hit.score);
    }
    println!("Querying took {elapsed_ms:.3} ms");
    Ok(())
}
