//! Error types for the `admit-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Every variant carries owned strings so the error is `Clone`; a failed
/// pipeline build is memoized and handed back to every later caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RagError {
    /// A configuration validation error (invalid sizes, bad corpus path).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A required API credential is not configured.
    #[error("Missing credential for {provider}: set the {variable} environment variable")]
    CredentialMissing {
        /// The provider that needs the credential.
        provider: String,
        /// The environment variable the credential is read from.
        variable: String,
    },

    /// The embedding model could not be loaded or reached.
    #[error("Embedding model unavailable ({provider}): {message}")]
    ModelUnavailable {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The completion service is unreachable or returned an error.
    #[error("Generation unavailable ({provider}): {message}")]
    GenerationUnavailable {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A network call did not finish within the configured timeout.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout that elapsed, in seconds.
        seconds: u64,
    },

    /// The question was empty or whitespace-only.
    #[error("Query is empty")]
    EmptyQuery,

    /// An index invariant was violated (dimension or model mismatch).
    #[error("Vector index error: {message}")]
    VectorStoreError {
        /// A description of the failure.
        message: String,
    },

    /// The corpus could not be read.
    #[error("Corpus error ({path}): {message}")]
    CorpusError {
        /// The file or directory that failed.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::ModelUnavailable { .. }
                | RagError::GenerationUnavailable { .. }
                | RagError::Timeout { .. }
        )
    }

    /// Whether the error belongs to the startup taxonomy (configuration or
    /// credentials) rather than to a single query.
    pub fn is_configuration(&self) -> bool {
        matches!(self, RagError::ConfigError(_) | RagError::CredentialMissing { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
