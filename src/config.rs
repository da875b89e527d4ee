//! Configuration module for the digest pipeline
//!
//! All configuration is loaded from environment variables following the
//! pattern `MAIL_DIGEST_<KEY>`. The configuration is constructed once at
//! process start and passed by reference into the pipeline stages; no
//! stage reads the environment on its own.

use std::env;
use std::env::VarError;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

/// IMAP account configuration
///
/// Holds connection details and credentials for the mailbox being digested.
/// The password is stored using `SecretString` to prevent accidental logging.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    /// IMAP server hostname
    pub host: String,
    /// IMAP server port (typically 993 for TLS)
    pub port: u16,
    /// Whether to use TLS (currently enforced to `true`)
    pub secure: bool,
    /// Username for authentication
    pub user: String,
    /// Password stored in a type that prevents accidental logging
    pub pass: SecretString,
    /// Mailbox to digest (default `INBOX`)
    pub mailbox: String,
}

/// Summarizer configuration
///
/// Settings for the chat-completion call that condenses the digest. The
/// system instruction is loaded from `instruction_path` on each run so it
/// can be edited without restarting anything.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Base URL of the OpenAI-compatible API (no trailing slash)
    pub endpoint: String,
    /// API key for bearer authentication
    pub api_key: SecretString,
    /// Chat model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Path to the system instruction text file
    pub instruction_path: PathBuf,
}

/// Speech synthesis configuration (optional stage)
///
/// Present only when `MAIL_DIGEST_SPEECH_ENABLED=true`. Shares the
/// summarizer's endpoint and API key.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Text-to-speech model identifier
    pub model: String,
    /// Voice name
    pub voice: String,
    /// Where the rendered MP3 is written
    pub output_path: PathBuf,
}

/// Matrix delivery configuration (optional stage)
///
/// Present only when `MAIL_DIGEST_MATRIX_HOMESERVER` is set. The rendered
/// audio artifact is sent as a direct message to `target_user`.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    /// Homeserver base URL (e.g., `https://matrix.example.org`)
    pub homeserver: String,
    /// Access token stored in a type that prevents accidental logging
    pub access_token: SecretString,
    /// Matrix user ID to message (e.g., `@user:example.org`)
    pub target_user: String,
}

/// Pipeline-wide configuration
///
/// Wraps the IMAP account, collaborator settings, file paths, and timeouts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Mailbox connection details
    pub imap: ImapConfig,
    /// TCP connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// IMAP greeting/TLS handshake timeout in milliseconds
    pub greeting_timeout_ms: u64,
    /// Socket I/O timeout in milliseconds
    pub socket_timeout_ms: u64,
    /// Path to the line-oriented sender blacklist (missing file is non-fatal)
    pub blacklist_path: PathBuf,
    /// Path the validated summary artifact is written to (overwritten each run)
    pub artifact_path: PathBuf,
    /// Path the link-preserving digest is archived to (overwritten each run)
    pub archive_path: PathBuf,
    /// Directory binary attachments are saved into
    pub attachments_dir: PathBuf,
    /// Summarizer collaborator settings
    pub summarizer: SummarizerConfig,
    /// Optional speech synthesis stage
    pub speech: Option<SpeechConfig>,
    /// Optional Matrix delivery stage
    pub matrix: Option<MatrixConfig>,
}

impl Config {
    /// Load all configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if required environment variables are missing
    /// or malformed.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// MAIL_DIGEST_IMAP_HOST=imap.example.com
    /// MAIL_DIGEST_IMAP_USER=user@example.com
    /// MAIL_DIGEST_IMAP_PASS=app-password
    /// MAIL_DIGEST_OPENAI_API_KEY=sk-...
    /// MAIL_DIGEST_SPEECH_ENABLED=true
    /// MAIL_DIGEST_MATRIX_HOMESERVER=https://matrix.example.org
    /// MAIL_DIGEST_MATRIX_TOKEN=syt_...
    /// MAIL_DIGEST_MATRIX_TARGET_USER=@user:example.org
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        let imap = ImapConfig {
            host: required_env("MAIL_DIGEST_IMAP_HOST")?,
            port: parse_u16_env("MAIL_DIGEST_IMAP_PORT", 993)?,
            secure: parse_bool_env("MAIL_DIGEST_IMAP_SECURE", true)?,
            user: required_env("MAIL_DIGEST_IMAP_USER")?,
            pass: SecretString::new(required_env("MAIL_DIGEST_IMAP_PASS")?.into()),
            mailbox: optional_env("MAIL_DIGEST_IMAP_MAILBOX").unwrap_or_else(|| "INBOX".to_owned()),
        };

        let summarizer = SummarizerConfig {
            endpoint: optional_env("MAIL_DIGEST_OPENAI_ENDPOINT")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_owned()),
            api_key: SecretString::new(required_env("MAIL_DIGEST_OPENAI_API_KEY")?.into()),
            model: optional_env("MAIL_DIGEST_SUMMARY_MODEL")
                .unwrap_or_else(|| "gpt-3.5-turbo".to_owned()),
            temperature: parse_f32_env("MAIL_DIGEST_SUMMARY_TEMPERATURE", 0.3)?,
            instruction_path: path_env("MAIL_DIGEST_INSTRUCTION_PATH", "prompt.txt"),
        };

        Ok(Self {
            imap,
            connect_timeout_ms: parse_u64_env("MAIL_DIGEST_CONNECT_TIMEOUT_MS", 30_000)?,
            greeting_timeout_ms: parse_u64_env("MAIL_DIGEST_GREETING_TIMEOUT_MS", 15_000)?,
            socket_timeout_ms: parse_u64_env("MAIL_DIGEST_SOCKET_TIMEOUT_MS", 300_000)?,
            blacklist_path: path_env("MAIL_DIGEST_BLACKLIST_PATH", "blacklist.txt"),
            artifact_path: path_env("MAIL_DIGEST_ARTIFACT_PATH", "output.txt"),
            archive_path: path_env("MAIL_DIGEST_ARCHIVE_PATH", "digest.txt"),
            attachments_dir: path_env("MAIL_DIGEST_ATTACHMENTS_DIR", "attachments"),
            summarizer,
            speech: load_speech()?,
            matrix: load_matrix()?,
        })
    }
}

/// Load the optional speech synthesis section
///
/// Enabled by `MAIL_DIGEST_SPEECH_ENABLED=true`; all other speech variables
/// have defaults matching the reference voice pipeline.
fn load_speech() -> AppResult<Option<SpeechConfig>> {
    if !parse_bool_env("MAIL_DIGEST_SPEECH_ENABLED", false)? {
        return Ok(None);
    }

    Ok(Some(SpeechConfig {
        model: optional_env("MAIL_DIGEST_SPEECH_MODEL").unwrap_or_else(|| "tts-1".to_owned()),
        voice: optional_env("MAIL_DIGEST_SPEECH_VOICE").unwrap_or_else(|| "echo".to_owned()),
        output_path: path_env("MAIL_DIGEST_SPEECH_PATH", "speech.mp3"),
    }))
}

/// Load the optional Matrix delivery section
///
/// Anchored on `MAIL_DIGEST_MATRIX_HOMESERVER`; when the homeserver is set,
/// the token and target user become required.
fn load_matrix() -> AppResult<Option<MatrixConfig>> {
    let Some(homeserver) = optional_env("MAIL_DIGEST_MATRIX_HOMESERVER") else {
        return Ok(None);
    };

    Ok(Some(MatrixConfig {
        homeserver: homeserver.trim_end_matches('/').to_owned(),
        access_token: SecretString::new(required_env("MAIL_DIGEST_MATRIX_TOKEN")?.into()),
        target_user: required_env("MAIL_DIGEST_MATRIX_TARGET_USER")?,
    }))
}

/// Read a required environment variable, returning error if missing or empty
fn required_env(key: &str) -> AppResult<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(format!(
            "missing required environment variable {key}"
        ))),
    }
}

/// Read an optional environment variable, treating empty values as unset
fn optional_env(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Read a path environment variable with default fallback
fn path_env(key: &str, default: &str) -> PathBuf {
    optional_env(key).map_or_else(|| PathBuf::from(default), PathBuf::from)
}

/// Parse a boolean environment variable with flexible values
///
/// Accepts: `1`, `true`, `yes`, `y`, `on` (truthy) or `0`, `false`, `no`,
/// `n`, `off` (falsy). Case-insensitive. Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set to an unrecognized value.
fn parse_bool_env(key: &str, default: bool) -> AppResult<bool> {
    match env::var(key) {
        Ok(v) => parse_bool_value(&v).ok_or_else(|| {
            AppError::InvalidInput(format!("invalid boolean environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u16` environment variable with default fallback
///
/// Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `u16`.
fn parse_u16_env(key: &str, default: u16) -> AppResult<u16> {
    match env::var(key) {
        Ok(v) => v.parse::<u16>().map_err(|_| {
            AppError::InvalidInput(format!("invalid u16 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// Parse a `u64` environment variable with default fallback
///
/// Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `u64`.
fn parse_u64_env(key: &str, default: u64) -> AppResult<u64> {
    match env::var(key) {
        Ok(v) => v.parse::<u64>().map_err(|_| {
            AppError::InvalidInput(format!("invalid u64 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// Parse an `f32` environment variable with default fallback
///
/// Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a finite `f32`.
fn parse_f32_env(key: &str, default: f32) -> AppResult<f32> {
    match env::var(key) {
        Ok(v) => match v.parse::<f32>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            _ => Err(AppError::InvalidInput(format!(
                "invalid f32 environment variable {key}: '{v}'"
            ))),
        },
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}
