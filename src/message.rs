//! Message data model
//!
//! Immutable records produced by the mail source and consumed by the
//! filtering and normalization stages. Header fields are optional because
//! real inbox traffic routinely omits them; downstream stages handle
//! absence as data, never as an error.

use std::path::PathBuf;

/// Reference to an attachment saved to local disk
///
/// The attachment bytes themselves are never inspected; only the original
/// filename and the path it was stored under are carried.
#[derive(Debug, Clone)]
pub struct SavedAttachment {
    /// Original filename from the MIME part, if any
    pub filename: Option<String>,
    /// Path the attachment bytes were written to
    pub stored_path: PathBuf,
}

/// One retrieved inbox message
///
/// Created by the mail source, filtered by sender, and rendered into a
/// digest block. Discarded after the pipeline run.
#[derive(Debug, Clone)]
pub struct Message {
    /// From header in display-name + address form
    pub sender: Option<String>,
    /// To header
    pub recipient: Option<String>,
    /// Subject header
    pub subject: Option<String>,
    /// Date header as transmitted
    pub received_at: Option<String>,
    /// Primary body, possibly HTML
    pub body: Option<String>,
    /// Attachments saved during retrieval, in MIME order
    pub attachments: Vec<SavedAttachment>,
}

impl Message {
    /// Create a message with only a sender and body, no other headers
    ///
    /// Convenience for the common test shape.
    #[cfg(test)]
    pub fn bare(sender: Option<&str>, body: Option<&str>) -> Self {
        Self {
            sender: sender.map(str::to_owned),
            recipient: None,
            subject: None,
            received_at: None,
            body: body.map(str::to_owned),
            attachments: Vec::new(),
        }
    }
}
