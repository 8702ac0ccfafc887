// CLI command implementations. Each command loads configuration, wires
// the pipeline pieces together, and reports to stdout; blocking work is
// dispatched to the blocking pool.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::chat::{ChatSession, QueryPipeline, user_facing_message};
use crate::config::Config;
use crate::embeddings::EmbeddingGenerator;
use crate::index::VectorIndex;
use crate::ingest::{CsvChunks, preprocess_chunk};
use crate::ollama::OllamaClient;
use crate::retriever::Retriever;
use crate::sanitizer::Sanitizer;
use crate::synthesis::Synthesizer;
use crate::{FloatError, Result};

/// Write the current configuration (defaults merged with whatever is
/// already on disk) back out, creating the file on first run.
#[inline]
pub fn init_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    config.save().context("Failed to save configuration")?;

    let config_path = Config::config_file_path()?;
    println!(
        "{} {}",
        style("✓ Configuration written to").green(),
        style(config_path.display()).cyan()
    );
    println!("Edit this file to change models, batch sizes, or sanitizer patterns.");
    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Ollama Settings:").bold().yellow());
    println!("  Host: {}", style(&config.ollama.host).cyan());
    println!("  Port: {}", style(config.ollama.port).cyan());
    println!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    println!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
    println!(
        "  Embed Batch Size: {}",
        style(config.ollama.embed_batch_size).cyan()
    );
    println!("  Max Tokens: {}", style(config.ollama.max_tokens).cyan());
    println!("  Temperature: {}", style(config.ollama.temperature).cyan());
    println!("  Top-p: {}", style(config.ollama.top_p).cyan());

    println!();
    println!("{}", style("Ingestion Settings:").bold().yellow());
    println!("  Chunk Size: {}", style(config.ingest.chunk_size).cyan());
    println!(
        "  Embedding Dimension: {}",
        style(config.ingest.embedding_dimension).cyan()
    );

    println!();
    println!("{}", style("Retrieval Settings:").bold().yellow());
    println!("  Top-k: {}", style(config.retrieval.top_k).cyan());
    println!("  Probed Partitions: {}", style(config.retrieval.nprobe).cyan());

    println!();
    match config.ollama_url() {
        Ok(url) => println!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => println!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    let config_path = Config::config_file_path()?;
    println!();
    println!("Config file: {}", style(config_path.display()).dim());

    Ok(())
}

/// Ingest a CSV file: preprocess rows, embed them, build the index, and
/// persist the bundle.
#[inline]
pub async fn ingest(csv_path: PathBuf) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!(
        "{} {}",
        style("Ingesting").bold().cyan(),
        style(csv_path.display()).cyan()
    );

    let summary = tokio::task::spawn_blocking(move || run_ingest(&csv_path, &config))
        .await
        .map_err(|e| FloatError::Ingestion(format!("ingestion task failed: {e}")))??;

    println!("{}", style("✓ Ingestion complete").green());
    println!("  Rows indexed: {}", summary.rows);
    println!("  Index bundle: {}", summary.bundle.display());
    Ok(())
}

struct IngestSummary {
    rows: usize,
    bundle: PathBuf,
}

fn run_ingest(csv_path: &std::path::Path, config: &Config) -> Result<IngestSummary> {
    let client = OllamaClient::new(config)?;
    client
        .health_check()
        .context("Ollama server is not ready for ingestion")?;

    let mut documents = Vec::new();
    let mut next_row_index = 0;
    for chunk in CsvChunks::open(csv_path, config.ingest.chunk_size)? {
        let rows = chunk?;
        let (chunk_documents, next) = preprocess_chunk(&rows, next_row_index);
        next_row_index = next;
        documents.extend(chunk_documents);
    }

    if documents.is_empty() {
        return Err(FloatError::Ingestion(format!(
            "no data rows found in {}",
            csv_path.display()
        )));
    }
    info!("Preprocessed {} rows from {}", documents.len(), csv_path.display());

    let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
    let bar = if console::user_attended_stderr() {
        ProgressBar::new(texts.len() as u64).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding rows")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let generator = EmbeddingGenerator::new(
        &client,
        config.ollama.embed_batch_size as usize,
        config.ingest.embedding_dimension,
    );
    let vectors = generator.generate(&texts, Some(&bar))?;
    bar.finish_and_clear();

    let index = VectorIndex::build(
        documents,
        vectors,
        &config.ollama.embedding_model,
        config.ingest.embedding_dimension,
    )?;

    let bundle = config.index_bundle_path()?;
    index.save(&bundle, &config.raw_index_path()?)?;

    Ok(IngestSummary {
        rows: index.len(),
        bundle,
    })
}

/// Answer a single question against the persisted index.
#[inline]
pub async fn ask(question: String) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let pipeline = build_pipeline(&config)?;

    match pipeline.answer_task(question).await {
        Ok((answer, supporting)) => {
            println!("{answer}");
            println!();
            println!(
                "{}",
                style(format!("({supporting} supporting records)")).dim()
            );
            Ok(())
        }
        Err(e) => {
            error!("Question failed: {e}");
            println!("{}", style(user_facing_message(&e)).red());
            Ok(())
        }
    }
}

/// Interactive question loop over stdin. `exit` or `quit` ends the
/// session; a failed question is reported and the loop continues.
#[inline]
pub async fn chat() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let mut session = ChatSession::new(build_pipeline(&config)?);

    println!("{}", style("🌊 FloatChat").bold().cyan());
    println!("Ask questions about the ingested sensor data. Type 'exit' to leave.");
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("{} ", style(">").bold().cyan());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match session.ask(question).await {
            Ok((answer, _)) => {
                println!("{answer}");
                println!();
            }
            Err(e) => {
                error!("Question failed: {e}");
                println!("{}", style(user_facing_message(&e)).red());
                println!();
            }
        }
    }

    println!(
        "Answered {} question(s) this session.",
        session.turns().len()
    );
    Ok(())
}

/// Report whether a usable index exists and what it was built from.
#[inline]
pub fn status() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let bundle = config.index_bundle_path()?;

    println!("{}", style("📊 Index Status").bold().cyan());
    println!();

    match VectorIndex::load(&bundle) {
        Ok(index) => {
            let metadata = index.metadata();
            println!("  Status: {}", style("Ready").green());
            println!("  Documents: {}", style(metadata.document_count).cyan());
            println!("  Embedding Model: {}", style(&metadata.model).cyan());
            println!("  Dimension: {}", style(metadata.dimension).cyan());
            println!(
                "  Built: {}",
                style(metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")).cyan()
            );
            println!("  Bundle: {}", style(bundle.display()).dim());
        }
        Err(e) => {
            println!("  Status: {}", style("Not available").yellow());
            println!("  {e}");
            println!("  Run 'floatchat ingest <csv>' to build the index.");
        }
    }

    Ok(())
}

fn build_pipeline(config: &Config) -> Result<Arc<QueryPipeline>> {
    let client = Arc::new(OllamaClient::new(config)?);

    let bundle = config.index_bundle_path()?;
    let index = Arc::new(VectorIndex::load(&bundle)?);

    let retriever = Retriever::new(
        index,
        Arc::clone(&client) as Arc<dyn crate::embeddings::Embedder>,
        config.ingest.embedding_dimension,
        config.retrieval.nprobe,
    )?;
    let synthesizer = Synthesizer::new(client as Arc<dyn crate::synthesis::Completer>);
    let sanitizer = Sanitizer::new(&config.sanitizer);

    Ok(Arc::new(QueryPipeline::new(
        retriever,
        synthesizer,
        sanitizer,
        config.retrieval.top_k,
    )))
}
