//! Digest summarization via a chat-completion endpoint
//!
//! Sends the link-stripped digest as user content, with a system
//! instruction loaded from a text file, to an OpenAI-compatible
//! `chat/completions` endpoint. Every failure path — unreadable
//! instruction file, HTTP error, malformed response — is logged and
//! surfaces as a fixed placeholder string, never an error: the pipeline
//! persists something on every run.

use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::config::SummarizerConfig;
use crate::errors::{AppError, AppResult};

/// Placeholder persisted when the summarizer cannot produce output
pub const SUMMARY_UNAVAILABLE: &str = "Error producing the inbox summary";

/// Chat-completion summarizer client
///
/// Holds a reusable HTTP client and the summarizer settings. The system
/// instruction is re-read from disk on each call so edits take effect on
/// the next run.
pub struct Summarizer {
    client: Client,
    config: SummarizerConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl Summarizer {
    /// Create a summarizer from config
    pub fn new(config: SummarizerConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Summarize the digest, degrading to the placeholder on any failure
    ///
    /// Infallible from the caller's perspective: the error branch logs and
    /// returns [`SUMMARY_UNAVAILABLE`].
    pub async fn summarize(&self, digest: &str) -> String {
        match self.try_summarize(digest).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "summarization failed; substituting placeholder text");
                SUMMARY_UNAVAILABLE.to_owned()
            }
        }
    }

    /// Run the chat-completion call
    ///
    /// # Errors
    ///
    /// - `Summarizer` for an unreadable instruction file, a failed or
    ///   non-success HTTP exchange, or a response without choices
    async fn try_summarize(&self, digest: &str) -> AppResult<String> {
        let instruction = tokio::fs::read_to_string(&self.config.instruction_path)
            .await
            .map_err(|e| {
                AppError::Summarizer(format!(
                    "cannot read system instruction {}: {e}",
                    self.config.instruction_path.display()
                ))
            })?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&json!({
                "model": self.config.model,
                "temperature": self.config.temperature,
                "messages": [
                    { "role": "system", "content": instruction },
                    { "role": "user", "content": digest }
                ]
            }))
            .send()
            .await
            .map_err(|e| AppError::Summarizer(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Summarizer(format!(
                "chat request returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Summarizer(format!("malformed chat response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Summarizer("chat response contained no choices".to_owned()))
    }
}
