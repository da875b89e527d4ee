//! Pipeline driver
//!
//! Sequences the run: blacklist load, retrieval, sender filtering, digest
//! composition, summarization, validation, artifact persistence, and the
//! optional speech/delivery stages. Collaborator failures degrade the run
//! per stage — the worst outcome is an artifact containing placeholder
//! text, never a crashed process.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::Config;
use crate::digest::compose_digest;
use crate::errors::AppResult;
use crate::filter::{Blacklist, filter_messages};
use crate::normalize::LinkMode;
use crate::summarize::Summarizer;
use crate::validate::strip_echoed_blocks;
use crate::{deliver, source, speech};

/// Run the digest pipeline once
///
/// Retrieval failure yields an empty message set and the run continues;
/// summarizer failure yields placeholder artifact text. Only artifact
/// persistence itself propagates an error.
///
/// # Errors
///
/// - `Io` if the artifact cannot be written
pub async fn run(config: &Config) -> AppResult<()> {
    let blacklist = Blacklist::load_or_default(&config.blacklist_path).await;
    if blacklist.is_empty() {
        info!("sender blacklist is empty; retaining all senders");
    } else {
        info!(entries = blacklist.len(), "loaded sender blacklist");
    }

    let messages = match source::fetch_todays_messages(config).await {
        Ok(messages) => messages,
        Err(e) => {
            error!(error = %e, "mail retrieval failed; continuing with an empty inbox");
            Vec::new()
        }
    };
    info!(retrieved = messages.len(), "retrieved today's messages");

    let retained = filter_messages(messages, &blacklist);
    info!(retained = retained.len(), "messages after sender filtering");

    let annotated = compose_digest(&retained, LinkMode::Annotated);
    let stripped = compose_digest(&retained, LinkMode::TextOnly);

    // The link-preserving digest is archival only; losing it degrades
    // nothing downstream.
    if let Err(e) = write_atomic(&config.archive_path, &annotated).await {
        warn!(error = %e, path = %config.archive_path.display(), "failed to archive link-preserving digest");
    }

    let summarizer = Summarizer::new(config.summarizer.clone());
    let summary = summarizer.summarize(&stripped).await;
    let artifact = strip_echoed_blocks(&summary);

    write_atomic(&config.artifact_path, &artifact).await?;
    info!(path = %config.artifact_path.display(), chars = artifact.len(), "wrote summary artifact");

    run_delivery(config, &artifact).await;
    Ok(())
}

/// Run the optional speech and Matrix stages
///
/// Delivery needs the rendered audio, so Matrix config without speech
/// config is a no-op with a warning. Failures log and return; the run has
/// already persisted its artifact by this point.
async fn run_delivery(config: &Config, artifact: &str) {
    let Some(speech_config) = &config.speech else {
        if config.matrix.is_some() {
            warn!("matrix delivery configured without speech synthesis; skipping delivery");
        }
        return;
    };

    if let Err(e) = speech::synthesize(&config.summarizer, speech_config, artifact).await {
        error!(error = %e, "speech synthesis failed");
        return;
    }
    info!(path = %speech_config.output_path.display(), "rendered summary audio");

    if let Some(matrix) = &config.matrix {
        match deliver::send_audio(matrix, &speech_config.output_path).await {
            Ok(()) => info!(target = %matrix.target_user, "delivered audio digest"),
            Err(e) => error!(error = %e, "matrix delivery failed"),
        }
    }
}

/// Write a file via temp-file-and-rename
///
/// Readers of the artifact never observe a partial write; the previous
/// run's content is fully replaced.
async fn write_atomic(path: &Path, contents: &str) -> AppResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_atomic;

    #[tokio::test]
    async fn overwrites_previous_artifact_wholesale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("output.txt");

        write_atomic(&path, "first run, longer content")
            .await
            .expect("first write");
        write_atomic(&path, "second").await.expect("second write");

        let contents = tokio::fs::read_to_string(&path).await.expect("readable");
        assert_eq!(contents, "second");
    }

    #[tokio::test]
    async fn leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("output.txt");
        write_atomic(&path, "content").await.expect("write");

        let mut entries = tokio::fs::read_dir(dir.path()).await.expect("read_dir");
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.expect("entry") {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, ["output.txt"]);
    }
}
