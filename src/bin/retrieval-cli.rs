//! Command-line entry point. Parses arguments and hands off to `Engine`;
//! no retrieval logic lives here.

use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};

use hybrid_retrieval::config::RetrievalConfig;
use hybrid_retrieval::dataset::{load_golden_dataset, load_movies, load_stopword_text};
use hybrid_retrieval::embed::{Embedder, HashEmbedder};
use hybrid_retrieval::engine::Engine;
use hybrid_retrieval::hybrid::enhance::EnhanceMode;
use hybrid_retrieval::hybrid::rerank::RerankMethod;
use hybrid_retrieval::Result;

#[derive(Parser)]
#[command(name = "retrieval-cli", version, about = "Hybrid lexical/semantic retrieval over a movie corpus")]
struct Cli {
    /// Path to the movies.json corpus.
    #[arg(long, global = true, default_value = "movies.json")]
    corpus: PathBuf,

    /// Path to a newline-delimited stopword list.
    #[arg(long, global = true, default_value = "stopwords.txt")]
    stopwords: PathBuf,

    /// Directory the cache/ subdirectory is read from and written to.
    #[arg(long, global = true, default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Builds the lexical and chunked semantic indexes and persists them.
    Build,
    /// Weak union-of-postings diagnostic search.
    Search { query: String, #[arg(long, default_value_t = 5)] limit: usize },
    /// BM25-ranked search.
    Bm25Search { query: String, #[arg(long, default_value_t = 5)] limit: usize },
    /// Raw term frequency of a term in a document.
    Tf { doc_id: u64, term: String },
    /// Inverse document frequency of a term.
    Idf { term: String },
    /// TF-IDF score of a term in a document.
    Tfidf { doc_id: u64, term: String },
    /// BM25 term-frequency component.
    Bm25Tf {
        doc_id: u64,
        term: String,
        /// Overrides the configured `k1` for this call only.
        #[arg(long)]
        k1: Option<f32>,
        /// Overrides the configured `b` for this call only.
        #[arg(long)]
        b: Option<f32>,
    },
    /// BM25 IDF component.
    Bm25Idf { term: String },
    /// Embeds arbitrary text and prints the vector.
    EmbedText { text: String },
    /// Embeds a query string (same as embed-text, semantically distinct entrypoint).
    EmbedQuery { text: String },
    /// Prints the embedder's model name and dimensionality.
    Verify,
    /// Builds (or loads) the whole-document embeddings and reports coverage.
    VerifyEmbeddings,
    /// Reports the number of chunk rows in the persisted semantic index.
    EmbedChunks,
    /// Splits text into fixed-size word windows.
    Chunk { text: String, #[arg(long, default_value_t = 4)] size: usize, #[arg(long, default_value_t = 1)] overlap: usize },
    /// Splits text into fixed-size sentence windows.
    SemanticChunk { text: String, #[arg(long, default_value_t = 4)] size: usize, #[arg(long, default_value_t = 1)] overlap: usize },
    /// Searches the chunked semantic index directly.
    SearchChunked { query: String, #[arg(long, default_value_t = 5)] limit: usize },
    /// Weighted-linear-combination hybrid search.
    WeightedSearch { query: String, #[arg(long, default_value_t = 0.5)] alpha: f32, #[arg(long, default_value_t = 5)] limit: usize },
    /// Reciprocal Rank Fusion hybrid search.
    RrfSearch {
        query: String,
        #[arg(long, default_value_t = 60.0)]
        k: f32,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Rewrite the query with an LLM before searching (requires the `llm` feature and GEMINI_API_KEY).
        #[arg(long)]
        enhance: Option<EnhanceMode>,
        /// Rerank the fused results with an LLM (requires the `llm` feature and GEMINI_API_KEY).
        #[arg(long)]
        rerank: Option<RerankMethod>,
    },
    /// Runs the precision/recall/F1 evaluator against a golden dataset.
    Evaluate {
        #[arg(long, default_value = "golden_dataset.json")]
        golden_dataset: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl clap::ValueEnum for EnhanceMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[EnhanceMode::Expand, EnhanceMode::Rewrite, EnhanceMode::Spell]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            EnhanceMode::Expand => clap::builder::PossibleValue::new("expand"),
            EnhanceMode::Rewrite => clap::builder::PossibleValue::new("rewrite"),
            EnhanceMode::Spell => clap::builder::PossibleValue::new("spell"),
        })
    }
}

impl clap::ValueEnum for RerankMethod {
    fn value_variants<'a>() -> &'a [Self] {
        &[RerankMethod::Individual, RerankMethod::Batch, RerankMethod::CrossEncoder]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            RerankMethod::Individual => clap::builder::PossibleValue::new("individual"),
            RerankMethod::Batch => clap::builder::PossibleValue::new("batch"),
            RerankMethod::CrossEncoder => clap::builder::PossibleValue::new("cross_encoder"),
        })
    }
}

fn default_embedder() -> Box<dyn Embedder> {
    Box::new(HashEmbedder::default())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("error: {e}");
        exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = RetrievalConfig::default();

    match cli.command {
        Command::Build => {
            let documents = load_movies(&cli.corpus)?;
            let stopwords = load_stopword_text(&cli.stopwords).unwrap_or_default();
            let engine = Engine::build(&cli.data_dir, &documents, &stopwords, config, default_embedder())?;
            println!("built index over {} documents", documents.len());
            let _ = engine;
        }
        Command::Search { query, limit } => {
            let documents = load_movies(&cli.corpus)?;
            let stopwords = load_stopword_text(&cli.stopwords).unwrap_or_default();
            let engine = Engine::load(&cli.data_dir, &documents, &stopwords, config, default_embedder())?;
            for doc in engine.search_command(&query, limit) {
                println!("{}\t{}", doc.id, doc.title);
            }
        }
        Command::Bm25Search { query, limit } => {
            let documents = load_movies(&cli.corpus)?;
            let stopwords = load_stopword_text(&cli.stopwords).unwrap_or_default();
            let engine = Engine::load(&cli.data_dir, &documents, &stopwords, config, default_embedder())?;
            for hit in engine.bm25_search(&query, limit) {
                println!("{}\t{:.6}\t{}", hit.document.id, hit.score, hit.document.title);
            }
        }
        Command::Tf { doc_id, term } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            println!("{}", engine.tf(doc_id, &term)?);
        }
        Command::Idf { term } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            println!("{:.6}", engine.idf(&term)?);
        }
        Command::Tfidf { doc_id, term } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            println!("{:.6}", engine.tfidf(doc_id, &term)?);
        }
        Command::Bm25Tf { doc_id, term, k1, b } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            println!("{:.6}", engine.bm25_tf(doc_id, &term, k1, b)?);
        }
        Command::Bm25Idf { term } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            println!("{:.6}", engine.bm25_idf(&term)?);
        }
        Command::EmbedText { text } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            println!("{:?}", engine.embed_text(&text)?);
        }
        Command::EmbedQuery { text } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            println!("{:?}", engine.embed_query(&text)?);
        }
        Command::Verify => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            let (model, dims) = engine.verify();
            println!("model={model} dimensions={dims}");
        }
        Command::VerifyEmbeddings => {
            let (mut engine, documents) = load_for_lexical(&cli, config)?;
            let (count, dims) = engine.verify_embeddings(&documents)?;
            println!("embedded {count}/{} documents at {dims} dimensions", documents.len());
        }
        Command::EmbedChunks => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            println!("{}", engine.embed_chunks());
        }
        Command::Chunk { text, size, overlap } => {
            for (i, chunk) in Engine::chunk(&text, size, overlap).into_iter().enumerate() {
                println!("{i}\t{chunk}");
            }
        }
        Command::SemanticChunk { text, size, overlap } => {
            for (i, chunk) in Engine::semantic_chunk(&text, size, overlap).into_iter().enumerate() {
                println!("{i}\t{}", chunk.join(" "));
            }
        }
        Command::SearchChunked { query, limit } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            for hit in engine.search_chunked(&query, limit)? {
                println!("{}\t{:.6}\t{}", hit.document.id, hit.best_chunk_score, hit.document.title);
            }
        }
        Command::WeightedSearch { query, alpha, limit } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            for hit in engine.weighted_search(&query, alpha, limit)? {
                println!(
                    "{}\t{:.6}\tbm25={:.6}\tsemantic={:.6}\t{}",
                    hit.document.id, hit.hybrid_score, hit.bm25_score, hit.semantic_score, hit.document.title
                );
            }
        }
        Command::RrfSearch { query, k, limit, enhance, rerank } => {
            let (engine, _) = load_for_lexical(&cli, config)?;
            let enhance_pair = resolve_enhancer(enhance)?;
            let rerank_pair = resolve_reranker(rerank)?;
            let enhance_ref = enhance_pair.as_ref().map(|(m, e)| (*m, e.as_ref()));
            let rerank_ref = rerank_pair.as_ref().map(|(m, r)| (*m, r.as_ref()));
            for hit in engine.rrf_search(&query, k, limit, enhance_ref, rerank_ref)? {
                println!("{}\t{:.6}\t{}", hit.document.id, hit.rrf_score, hit.document.title);
            }
        }
        Command::Evaluate { golden_dataset, limit } => {
            let (engine, _) = load_for_lexical(&cli, RetrievalConfig::for_evaluation())?;
            let cases = load_golden_dataset(&golden_dataset)?;
            let summary = engine.evaluate(&cases, limit);
            for case in &summary.per_case {
                println!("{}\tP={:.3}\tR={:.3}\tF1={:.3}", case.query, case.precision, case.recall, case.f1);
            }
            println!(
                "mean\tP={:.3}\tR={:.3}\tF1={:.3}",
                summary.mean_precision, summary.mean_recall, summary.mean_f1
            );
        }
    }

    Ok(())
}

fn load_for_lexical(
    cli: &Cli,
    config: RetrievalConfig,
) -> Result<(Engine, Vec<hybrid_retrieval::Document>)> {
    let documents = load_movies(&cli.corpus)?;
    let stopwords = load_stopword_text(&cli.stopwords).unwrap_or_default();
    let engine = Engine::load(&cli.data_dir, &documents, &stopwords, config, default_embedder())?;
    Ok((engine, documents))
}

#[cfg(feature = "llm")]
fn resolve_enhancer(
    mode: Option<EnhanceMode>,
) -> Result<Option<(EnhanceMode, Box<dyn hybrid_retrieval::hybrid::enhance::QueryEnhancer>)>> {
    use hybrid_retrieval::hybrid::enhance::gemini::GeminiQueryEnhancer;
    match mode {
        Some(mode) => Ok(Some((mode, Box::new(GeminiQueryEnhancer::from_env()?)))),
        None => Ok(None),
    }
}

#[cfg(not(feature = "llm"))]
fn resolve_enhancer(
    mode: Option<EnhanceMode>,
) -> Result<Option<(EnhanceMode, Box<dyn hybrid_retrieval::hybrid::enhance::QueryEnhancer>)>> {
    match mode {
        Some(_) => Err(hybrid_retrieval::RetrievalError::ExternalFailure(
            "query enhancement requires the `llm` feature".to_string(),
        )),
        None => Ok(None),
    }
}

#[cfg(feature = "llm")]
fn resolve_reranker(
    method: Option<RerankMethod>,
) -> Result<Option<(RerankMethod, Box<dyn hybrid_retrieval::hybrid::rerank::Reranker>)>> {
    use hybrid_retrieval::hybrid::rerank::gemini::GeminiReranker;
    match method {
        Some(method) => Ok(Some((method, Box::new(GeminiReranker::from_env(method)?)))),
        None => Ok(None),
    }
}

#[cfg(not(feature = "llm"))]
fn resolve_reranker(
    method: Option<RerankMethod>,
) -> Result<Option<(RerankMethod, Box<dyn hybrid_retrieval::hybrid::rerank::Reranker>)>> {
    match method {
        Some(_) => Err(hybrid_retrieval::RetrievalError::ExternalFailure(
            "reranking requires the `llm` feature".to_string(),
        )),
        None => Ok(None),
    }
}
