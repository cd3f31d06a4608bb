//! `admit`: the admission assistant on the command line.
//!
//! ```bash
//! export GROQ_API_KEY=...
//! admit --corpus vit ask "What is the B.Tech fee?"
//! admit chat
//! admit index
//! ```

mod cli;
mod console;

use std::process::ExitCode;
use std::sync::Arc;

use admit_rag::{
    CompletionProvider, GroqCompletionProvider, PipelineCache, RagConfig, embedding_provider_for,
    user_message,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    // Logs go to stderr so answers on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,admit=info,admit_rag=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Cli::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn completion_provider(config: &RagConfig) -> Result<Arc<dyn CompletionProvider>> {
    let provider = GroqCompletionProvider::from_config(config)
        .context("failed to set up the completion service")?;
    Ok(Arc::new(provider))
}

async fn run(args: Cli) -> Result<()> {
    let config = args.resolve_config().context("invalid configuration")?;
    let embedder =
        embedding_provider_for(&config).context("failed to set up the embedding model")?;
    let cache = PipelineCache::new(embedder, completion_provider(&config)?);

    info!(corpus = %config.corpus_path.display(), "starting admission assistant");
    let pipeline = cache.get_or_initialize(&config).await.with_context(|| {
        format!("failed to build the index from {}", config.corpus_path.display())
    })?;

    match args.command {
        Command::Ask { question, show_sources } => {
            let question = question.join(" ");
            match pipeline.try_answer(&question).await {
                Ok(answer) => {
                    println!("{}", answer.text.trim());
                    if show_sources && !answer.sources.is_empty() {
                        println!("\nSources:\n{}", console::format_sources(&answer.sources));
                    }
                }
                Err(e) => {
                    let message = user_message(&e);
                    return Err(anyhow::Error::new(e).context(message));
                }
            }
        }
        Command::Chat => console::run(pipeline).await?,
        Command::Index => {
            let stats = pipeline.stats();
            println!("corpus:     {}", config.corpus_path.display());
            println!("documents:  {}", stats.documents);
            println!("chunks:     {}", stats.chunks);
            println!("dimensions: {}", stats.dimensions);
            println!("model:      {}", stats.model_id);
        }
    }

    Ok(())
}
