//! Digest composition
//!
//! Concatenates per-message rendered blocks into one aggregate text blob.
//! Each block already carries its own leading newline and trailing
//! delimiter line, so composition adds nothing between blocks. Two digests
//! are produced per run: a link-preserving one kept for the archive and a
//! link-stripped one handed to the summarizer.

use crate::message::Message;
use crate::normalize::{LinkMode, render_block};

/// Compose the digest for a message sequence
///
/// Blocks appear in input order. An empty message slice yields an empty
/// digest, which the pipeline still carries through the remaining stages.
pub fn compose_digest(messages: &[Message], links: LinkMode) -> String {
    messages
        .iter()
        .map(|message| render_block(message, links))
        .collect()
}
