//! Completion provider trait for language-model calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who authored a [`Message`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions constraining the model.
    System,
    /// The question and its context.
    User,
    /// A model reply.
    Assistant,
}

/// A chat message sent to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The author of the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl Message {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Decoding parameters for one completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature; 0 asks for deterministic decoding.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.0, max_tokens: 512 }
    }
}

/// A language-model completion service.
///
/// Implementations must return the model's text unmodified and report
/// unreachable services or API errors as
/// [`RagError::GenerationUnavailable`](crate::RagError::GenerationUnavailable)
/// rather than returning an empty string.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send the conversation and return the assistant's reply text.
    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<String>;

    /// Return the identity of the completion model.
    fn model_id(&self) -> &str;
}
