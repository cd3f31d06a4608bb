//! Grounded answer synthesis.
//!
//! The [`AnswerSynthesizer`] turns retrieved chunks and a question into a
//! two-message prompt: a system instruction that confines the model to the
//! supplied context, and a user message carrying the numbered context blocks
//! followed by the question.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::completion::{CompletionProvider, GenerationOptions, Message};
use crate::document::{Answer, SearchResult};
use crate::error::Result;
use crate::retry::with_timeout;

/// Answer returned when retrieval found nothing to ground on.
pub const NO_CONTEXT_ANSWER: &str = "I could not find any information about that in the \
     admission documents. Please rephrase your question or contact the admissions office.";

/// System instruction sent with every grounded prompt.
pub const SYSTEM_PROMPT: &str = "You are an admissions assistant answering questions from \
     prospective students. Answer using only the context passages provided in the user \
     message, never prior knowledge. If the passages do not contain the answer, say that the \
     information is not available in the documents. Quote figures such as fees, dates and \
     eligibility criteria exactly as they appear. Do not mention the passages or the context \
     in your answer.";

/// Builds grounded prompts and calls a [`CompletionProvider`].
pub struct AnswerSynthesizer {
    llm: Arc<dyn CompletionProvider>,
    options: GenerationOptions,
    timeout: Duration,
}

impl AnswerSynthesizer {
    /// Create a synthesizer using `llm` with the given decoding options.
    pub fn new(llm: Arc<dyn CompletionProvider>, options: GenerationOptions) -> Self {
        Self { llm, options, timeout: Duration::from_secs(120) }
    }

    /// Bound each completion call, retries included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Decoding options sent with each completion.
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Build the prompt for `question` over `results` (already in
    /// descending-similarity order).
    pub fn build_prompt(question: &str, results: &[SearchResult]) -> Vec<Message> {
        let mut user = String::from("Context passages:\n---------------------\n");
        for (i, result) in results.iter().enumerate() {
            let _ = writeln!(user, "[{}] source: {}", i + 1, result.chunk.document_id);
            let _ = writeln!(user, "{}\n", result.chunk.text.trim());
        }
        let _ = write!(
            user,
            "---------------------\nUsing only the passages above, answer the question.\n\
             Question: {}\nAnswer:",
            question.trim()
        );

        vec![Message::system(SYSTEM_PROMPT), Message::user(user)]
    }

    /// Answer `question` from `results`.
    ///
    /// With no results the completion service is not called and
    /// [`NO_CONTEXT_ANSWER`] is returned with `grounded: false`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, typically
    /// [`RagError::GenerationUnavailable`](crate::RagError::GenerationUnavailable)
    /// or [`RagError::Timeout`](crate::RagError::Timeout).
    pub async fn synthesize(&self, question: &str, results: Vec<SearchResult>) -> Result<Answer> {
        if results.is_empty() {
            info!("no context retrieved, skipping completion");
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                sources: results,
                grounded: false,
            });
        }

        let messages = Self::build_prompt(question, &results);
        let text = with_timeout(
            "completion",
            self.timeout,
            self.llm.complete(&messages, &self.options),
        )
        .await
        .map_err(|e| {
            error!(model = %self.llm.model_id(), error = %e, "completion failed");
            e
        })?;

        info!(model = %self.llm.model_id(), source_count = results.len(), "answer synthesized");
        Ok(Answer { text, sources: results, grounded: true })
    }
}
