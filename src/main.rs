//! mail-digest-rs: daily inbox digest pipeline
//!
//! Retrieves the day's inbox messages over IMAP/TLS, discards blacklisted
//! senders, normalizes each message into plain text, summarizes the result
//! through a chat-completion call, and persists the validated summary.
//! Optional stages render the summary to speech and deliver the audio over
//! a Matrix direct message.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading and a single pipeline run
//! - [`config`]: Environment-driven configuration for the account and stages
//! - [`errors`]: Application error model with per-stage degradation policy
//! - [`imap`]: IMAP transport/session operations with timeout wrappers
//! - [`source`]: Retrieval of the day's messages and attachment persistence
//! - [`message`]: Immutable message and attachment records
//! - [`filter`]: Sender blacklist loading and filtering
//! - [`normalize`]: HTML-to-text transform chain and block rendering
//! - [`digest`]: Block concatenation into the two digest variants
//! - [`validate`]: Echoed-block stripping of summarizer output
//! - [`summarize`]: Chat-completion summarizer client
//! - [`speech`]: Text-to-speech rendering of the artifact
//! - [`deliver`]: Matrix direct-message delivery of the audio
//! - [`pipeline`]: Run sequencing and artifact persistence

mod config;
mod deliver;
mod digest;
mod errors;
mod filter;
mod imap;
mod message;
mod normalize;
mod pipeline;
mod source;
mod speech;
mod summarize;
mod validate;

use config::Config;
use tracing_subscriber::EnvFilter;

/// Application entry point
///
/// Initializes tracing from environment, loads config, and runs the
/// pipeline once. This process expects to be spawned by a scheduler
/// (cron, systemd timer) around the time the day's digest is wanted.
///
/// # Environment Variables
///
/// See [`Config::load_from_env`] for full configuration options.
///
/// # Example
///
/// ```no_run
/// MAIL_DIGEST_IMAP_HOST=imap.example.com \
/// MAIL_DIGEST_IMAP_USER=user@example.com \
/// MAIL_DIGEST_IMAP_PASS=secret \
/// MAIL_DIGEST_OPENAI_API_KEY=sk-... \
/// cargo run
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_from_env()?;
    pipeline::run(&config).await?;
    Ok(())
}
