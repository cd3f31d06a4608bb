use std::path::PathBuf;

use admit_rag::{ChunkingStrategy, RagConfig, Result};
use clap::{Parser, Subcommand};

/// Answer college admission questions from a folder of documents.
///
/// Settings are layered: defaults, then the TOML file given by `--config`,
/// then `ADMIT_*` environment variables, then the flags below. The Groq key
/// is read from `GROQ_API_KEY` (a `.env` file is loaded if present).
#[derive(Parser, Debug)]
#[command(name = "admit", version, about = "Admission assistant over your admission documents")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "ADMIT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the admission documents
    #[arg(long, value_name = "DIR")]
    pub corpus: Option<PathBuf>,

    /// Number of passages retrieved per question
    #[arg(long, value_name = "N")]
    pub top_k: Option<usize>,

    /// Maximum chunk length in characters
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long, value_name = "N")]
    pub chunk_overlap: Option<usize>,

    /// Chunking strategy: fixed or sentence
    #[arg(long, value_name = "STRATEGY")]
    pub chunking: Option<ChunkingStrategy>,

    /// OpenAI-compatible embeddings API base (local hashing embedder if unset)
    #[arg(long, value_name = "URL")]
    pub embedding_url: Option<String>,

    /// Embedding model id
    #[arg(long, value_name = "ID")]
    pub embedding_model: Option<String>,

    /// Completion model id
    #[arg(long, value_name = "ID")]
    pub completion_model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a single question and exit
    Ask {
        /// The question to answer
        #[arg(required = true, value_name = "QUESTION")]
        question: Vec<String>,

        /// Print the passages the answer was based on
        #[arg(long)]
        show_sources: bool,
    },
    /// Start an interactive console
    Chat,
    /// Build the index and print its statistics
    Index,
}

impl Cli {
    /// Resolve the effective configuration and validate it.
    pub fn resolve_config(&self) -> Result<RagConfig> {
        let config = match &self.config {
            Some(path) => RagConfig::from_toml_file(path)?,
            None => RagConfig::default(),
        };
        let mut config = config.apply_env_overrides()?;
        self.apply_flags(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_flags(&self, config: &mut RagConfig) {
        if let Some(corpus) = &self.corpus {
            config.corpus_path = corpus.clone();
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunk_overlap = overlap;
        }
        if let Some(strategy) = self.chunking {
            config.chunking = strategy;
        }
        if let Some(url) = &self.embedding_url {
            config.embedding_base_url = Some(url.clone());
        }
        if let Some(model) = &self.embedding_model {
            config.embedding_model_id = model.clone();
        }
        if let Some(model) = &self.completion_model {
            config.completion_model_id = model.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "admit",
            "--corpus",
            "docs",
            "--top-k",
            "5",
            "--chunking",
            "sentence",
            "--completion-model",
            "llama-3.3-70b-versatile",
            "index",
        ])
        .unwrap();

        let mut config = RagConfig::default();
        cli.apply_flags(&mut config);
        assert_eq!(config.corpus_path, PathBuf::from("docs"));
        assert_eq!(config.top_k, 5);
        assert_eq!(config.chunking, ChunkingStrategy::Sentence);
        assert_eq!(config.completion_model_id, "llama-3.3-70b-versatile");
        assert_eq!(config.chunk_size, RagConfig::default().chunk_size);
        assert!(matches!(cli.command, Command::Index));
    }

    #[test]
    fn ask_joins_question_words() {
        let cli = Cli::try_parse_from(["admit", "ask", "--show-sources", "What", "is", "the", "fee?"])
            .unwrap();
        match cli.command {
            Command::Ask { question, show_sources } => {
                assert_eq!(question.join(" "), "What is the fee?");
                assert!(show_sources);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ask_requires_a_question() {
        assert!(Cli::try_parse_from(["admit", "ask"]).is_err());
    }

    #[test]
    fn unknown_chunking_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["admit", "--chunking", "paragraph", "index"]).is_err());
    }
}
