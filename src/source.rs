//! Mail source: retrieval of the day's inbox
//!
//! Drives the IMAP operations to produce the day's `Message` set: searches
//! the configured mailbox for messages received since local midnight,
//! fetches each one's raw RFC822 source, and parses it with `mailparse`.
//! Binary attachments are written to the attachments directory and carried
//! as path references only; their content is never inspected.

use std::path::Path;

use chrono::{Local, NaiveDate};
use mailparse::{DispositionType, ParsedMail};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::imap;
use crate::message::{Message, SavedAttachment};

/// Attachment bytes extracted during MIME traversal, not yet saved
struct RawAttachment {
    filename: Option<String>,
    bytes: Vec<u8>,
}

/// Body and attachment parts extracted from one RFC822 message
struct ParsedParts {
    body_text: Option<String>,
    body_html: Option<String>,
    attachments: Vec<RawAttachment>,
}

/// Fetch today's messages from the configured mailbox
///
/// Connects, selects the mailbox read-only, searches `SINCE <today>`, and
/// fetches each match in UID order. Messages whose RFC822 source cannot be
/// parsed are logged and skipped; absent header fields stay `None`.
///
/// # Errors
///
/// Propagates connection, authentication, and search failures. The pipeline
/// driver treats any error here as "zero messages retrieved" and continues.
pub async fn fetch_todays_messages(config: &Config) -> AppResult<Vec<Message>> {
    let mut session = imap::connect_authenticated(config).await?;
    let result = fetch_from_session(config, &mut session).await;
    if let Err(e) = imap::logout(config, &mut session).await {
        debug!(error = %e, "IMAP logout failed");
    }
    result
}

async fn fetch_from_session(
    config: &Config,
    session: &mut imap::ImapSession,
) -> AppResult<Vec<Message>> {
    imap::select_mailbox_readonly(config, session, &config.imap.mailbox).await?;

    let query = format!("SINCE {}", imap_date(Local::now().date_naive()));
    let uids = imap::uid_search(config, session, &query).await?;
    debug!(mailbox = %config.imap.mailbox, query = %query, matches = uids.len(), "searched mailbox");

    let mut messages = Vec::with_capacity(uids.len());
    for uid in uids {
        let raw = imap::fetch_raw_message(config, session, uid).await?;
        match parse_message(&raw) {
            Ok((message, raw_attachments)) => {
                let saved =
                    save_attachments(&config.attachments_dir, raw_attachments, uid).await;
                messages.push(Message {
                    attachments: saved,
                    ..message
                });
            }
            Err(e) => warn!(uid, error = %e, "skipping unparseable message"),
        }
    }
    Ok(messages)
}

/// Parse RFC822 bytes into a `Message` plus unsaved attachment parts
///
/// Extracts the standard headers and the primary body: the first
/// `text/plain` part if one exists, otherwise the first `text/html` part
/// kept raw for the normalizer to clean.
///
/// # Errors
///
/// - `Internal` if `mailparse` rejects the message source
fn parse_message(raw: &[u8]) -> AppResult<(Message, Vec<RawAttachment>)> {
    let parsed = mailparse::parse_mail(raw)
        .map_err(|e| AppError::Internal(format!("failed to parse RFC822 message: {e}")))?;

    let mut parts = ParsedParts {
        body_text: None,
        body_html: None,
        attachments: Vec::new(),
    };
    walk_parts(&parsed, &mut parts)?;

    let message = Message {
        sender: header_value(&parsed, "from"),
        recipient: header_value(&parsed, "to"),
        subject: header_value(&parsed, "subject"),
        received_at: header_value(&parsed, "date"),
        body: parts.body_text.or(parts.body_html),
        attachments: Vec::new(),
    };
    Ok((message, parts.attachments))
}

/// Walk MIME part tree recursively
///
/// Traverses all MIME parts to extract the first text/plain and text/html
/// bodies and collect attachment bytes. Handles multipart structures.
fn walk_parts(part: &ParsedMail<'_>, out: &mut ParsedParts) -> AppResult<()> {
    if part.subparts.is_empty() {
        let ctype = part.ctype.mimetype.to_ascii_lowercase();
        let disp = part.get_content_disposition();
        let filename = disp
            .params
            .get("filename")
            .cloned()
            .or_else(|| part.ctype.params.get("name").cloned());
        let is_attachment = disp.disposition == DispositionType::Attachment || filename.is_some();

        if is_attachment {
            let bytes = part
                .get_body_raw()
                .map_err(|e| AppError::Internal(format!("failed decoding attachment body: {e}")))?;
            out.attachments.push(RawAttachment { filename, bytes });
            return Ok(());
        }

        if ctype == "text/plain"
            && out.body_text.is_none()
            && let Ok(text) = part.get_body()
        {
            out.body_text = Some(text);
        }

        if ctype == "text/html"
            && out.body_html.is_none()
            && let Ok(html) = part.get_body()
        {
            out.body_html = Some(html);
        }

        return Ok(());
    }

    for sub in &part.subparts {
        walk_parts(sub, out)?;
    }
    Ok(())
}

/// First header value by case-insensitive key
fn header_value(parsed: &ParsedMail<'_>, key: &str) -> Option<String> {
    parsed
        .headers
        .iter()
        .find(|h| h.get_key_ref().eq_ignore_ascii_case(key))
        .map(|h| h.get_value())
}

/// Save attachment parts to the attachments directory
///
/// Best-effort: a failed write is logged against the message UID and the
/// attachment is dropped from the record, the run continues.
async fn save_attachments(
    dir: &Path,
    attachments: Vec<RawAttachment>,
    uid: u32,
) -> Vec<SavedAttachment> {
    let mut saved = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        match save_attachment(dir, &attachment).await {
            Ok(reference) => saved.push(reference),
            Err(e) => warn!(uid, error = %e, "failed to save attachment"),
        }
    }
    saved
}

/// Write one attachment, avoiding filename collisions
///
/// Uses the MIME filename when present. If the target path already exists,
/// a short random prefix keeps concurrent senders from overwriting each
/// other's files.
async fn save_attachment(dir: &Path, attachment: &RawAttachment) -> AppResult<SavedAttachment> {
    tokio::fs::create_dir_all(dir).await?;

    let name = attachment
        .filename
        .clone()
        .unwrap_or_else(|| "attachment.bin".to_owned());
    let mut path = dir.join(&name);
    if tokio::fs::try_exists(&path).await? {
        let prefix: String = Uuid::new_v4().simple().to_string()[..8].to_owned();
        path = dir.join(format!("{prefix}-{name}"));
    }

    tokio::fs::write(&path, &attachment.bytes).await?;
    Ok(SavedAttachment {
        filename: attachment.filename.clone(),
        stored_path: path,
    })
}

/// Format date as IMAP SEARCH date (e.g., "1-Jan-2025")
fn imap_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{RawAttachment, imap_date, parse_message, save_attachment};

    #[test]
    fn formats_imap_search_date_without_zero_padding() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
        assert_eq!(imap_date(date), "1-Jan-2025");

        let date = NaiveDate::from_ymd_opt(2025, 11, 28).expect("valid date");
        assert_eq!(imap_date(date), "28-Nov-2025");
    }

    #[test]
    fn parses_simple_plain_text_message() {
        let raw = b"From: sender@example.com\r\nTo: user@example.com\r\nSubject: Hi\r\nDate: Wed, 1 Jan 2025 00:00:00 +0000\r\n\r\nHello there";
        let (message, attachments) = parse_message(raw).expect("parse should succeed");

        assert_eq!(message.sender.as_deref(), Some("sender@example.com"));
        assert_eq!(message.recipient.as_deref(), Some("user@example.com"));
        assert_eq!(message.subject.as_deref(), Some("Hi"));
        assert_eq!(message.body.as_deref(), Some("Hello there"));
        assert!(attachments.is_empty());
    }

    #[test]
    fn prefers_plain_text_over_html_part() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "Subject: Multipart\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"sep\"\r\n",
            "\r\n",
            "--sep\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>rich</p>\r\n",
            "--sep\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain\r\n",
            "--sep--\r\n",
        )
        .as_bytes();
        let (message, _) = parse_message(raw).expect("parse should succeed");
        assert_eq!(message.body.as_deref(), Some("plain"));
    }

    #[test]
    fn collects_attachment_parts_without_treating_them_as_body() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "Subject: Report\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"sep\"\r\n",
            "\r\n",
            "--sep\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "see attached\r\n",
            "--sep\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
            "\r\n",
            "%PDF-1.4\r\n",
            "--sep--\r\n",
        )
        .as_bytes();
        let (message, attachments) = parse_message(raw).expect("parse should succeed");

        assert_eq!(message.body.as_deref(), Some("see attached"));
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename.as_deref(), Some("report.pdf"));
    }

    #[tokio::test]
    async fn avoids_clobbering_existing_attachment_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let attachment = RawAttachment {
            filename: Some("invoice.pdf".to_owned()),
            bytes: b"first".to_vec(),
        };

        let first = save_attachment(dir.path(), &attachment)
            .await
            .expect("first save succeeds");
        let second = save_attachment(dir.path(), &attachment)
            .await
            .expect("second save succeeds");

        assert_ne!(first.stored_path, second.stored_path);
        assert!(second.stored_path.exists());
    }
}
