//! Speech synthesis for the summary artifact
//!
//! Optional stage: renders the validated summary text to an MP3 file via
//! an OpenAI-compatible `audio/speech` endpoint, reusing the summarizer's
//! endpoint and API key. The pipeline driver logs failures and continues;
//! nothing here aborts the run.

use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::config::{SpeechConfig, SummarizerConfig};
use crate::errors::{AppError, AppResult};

/// Render text to speech and write the MP3 to the configured path
///
/// # Errors
///
/// - `Delivery` for a failed or non-success HTTP exchange
/// - `Io` if the audio bytes cannot be written
pub async fn synthesize(
    api: &SummarizerConfig,
    speech: &SpeechConfig,
    text: &str,
) -> AppResult<()> {
    let client = Client::new();
    let response = client
        .post(format!("{}/audio/speech", api.endpoint))
        .bearer_auth(api.api_key.expose_secret())
        .json(&json!({
            "model": speech.model,
            "voice": speech.voice,
            "input": text
        }))
        .send()
        .await
        .map_err(|e| AppError::Delivery(format!("speech request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Delivery(format!(
            "speech request returned {status}: {body}"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Delivery(format!("speech response read failed: {e}")))?;
    tokio::fs::write(&speech.output_path, &bytes).await?;
    Ok(())
}
