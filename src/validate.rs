//! Summary validation
//!
//! Guards against a summarization failure mode where the model echoes raw
//! digest blocks verbatim instead of condensing them. Any span that
//! structurally matches a rendered block — from a `From:` marker to the
//! next delimiter line, crossing line breaks — is removed from the output
//! before it is persisted.

use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::BLOCK_DELIMITER;

/// Matches one echoed digest block, non-greedily, across line breaks
static ECHOED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s)From:.*?{}", regex::escape(BLOCK_DELIMITER)))
        .expect("valid echoed-block pattern")
});

/// Strip echoed digest blocks from summarizer output
///
/// Removes all non-overlapping matches, then trims residual whitespace.
/// Text without any echoed block passes through verbatim.
pub fn strip_echoed_blocks(summary: &str) -> String {
    if !ECHOED_BLOCK.is_match(summary) {
        return summary.to_owned();
    }
    ECHOED_BLOCK.replace_all(summary, "").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::strip_echoed_blocks;
    use crate::digest::compose_digest;
    use crate::message::Message;
    use crate::normalize::LinkMode;

    #[test]
    fn passes_through_text_without_blocks_verbatim() {
        let summary = "Three messages today: two invoices and a meeting reminder.\n";
        assert_eq!(strip_echoed_blocks(summary), summary);
    }

    #[test]
    fn removes_single_echoed_block_and_trims() {
        let echoed = "Summary so far.\n\nFrom: a@example.com\nSubject: Hi\nContent:\nhello\n-------------------\n\nNothing else.";
        assert_eq!(
            strip_echoed_blocks(echoed),
            "Summary so far.\n\n\n\nNothing else."
        );
    }

    #[test]
    fn removes_every_echoed_block() {
        let messages = vec![
            Message::bare(Some("a@example.com"), Some("one")),
            Message::bare(Some("b@example.com"), Some("two")),
        ];
        let digest = compose_digest(&messages, LinkMode::TextOnly);
        let summary = format!("Real summary.\n{digest}\nTrailing note.");

        let stripped = strip_echoed_blocks(&summary);
        assert!(!stripped.contains("From:"));
        assert!(stripped.starts_with("Real summary."));
        assert!(stripped.ends_with("Trailing note."));
    }

    #[test]
    fn an_entirely_echoed_summary_collapses_to_empty() {
        let messages = vec![Message::bare(Some("a@example.com"), Some("one"))];
        let digest = compose_digest(&messages, LinkMode::TextOnly);
        assert_eq!(strip_echoed_blocks(&digest), "");
    }
}
