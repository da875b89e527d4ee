//! HTML-to-text normalization and per-message block rendering
//!
//! Converts a raw, possibly-HTML message body into clean plain text through
//! an ordered chain of pure transform steps. The order is load-bearing:
//! style and CSS-rule removal must run before tag stripping, tag stripping
//! before whitespace collapsing, and entity decoding last.
//!
//! Two link modes share the chain. `Annotated` rewrites anchors to
//! `TEXT (URL)` for the archival digest; `TextOnly` keeps just the anchor
//! text for the digest handed to the summarizer.

use std::sync::LazyLock;

use regex::Regex;

use crate::message::Message;

/// Separator line terminating every rendered block
///
/// Used both to join blocks into a digest and to locate echoed blocks in
/// summarizer output.
pub const BLOCK_DELIMITER: &str = "-------------------";

/// Fixed entity table, decoded in this order
///
/// `&amp;` before `&lt;`/`&gt;` so double-escaped sequences resolve the way
/// sequential replacement always has. No numeric-entity support.
const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
];

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid style pattern"));

static MEDIA_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)@media[^{]*\{.*?\}").expect("valid media pattern"));

static BRACE_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("valid brace pattern"));

static ANCHOR_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\s+(?:[^>]*?\s+)?href="([^"]*)"[^>]*>(.*?)</a>"#).expect("valid anchor pattern")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Link handling mode for the transform chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Rewrite `<a href="URL">TEXT</a>` to `TEXT (URL)`
    Annotated,
    /// Rewrite `<a href="URL">TEXT</a>` to `TEXT`, discarding the URL
    TextOnly,
}

/// Clean a raw message body into plain text
///
/// Applies the transform steps in their required order: style blocks,
/// CSS rules, anchors, remaining tags, whitespace, entities.
pub fn clean_body(raw: &str, links: LinkMode) -> String {
    let text = strip_style_blocks(raw);
    let text = strip_css_rules(&text);
    let text = rewrite_anchors(&text, links);
    let text = strip_tags(&text);
    let text = collapse_whitespace(&text);
    decode_entities(&text)
}

/// Render one message as a digest block
///
/// Block shape: a leading blank line, `From:`/`Subject:` headers (plus
/// `Date:` in `Annotated` mode), `Content:`, the cleaned body, and the
/// delimiter line. In `TextOnly` mode an empty body falls back to the
/// subject, matching what the summarizer digest has always carried for
/// subject-only messages.
pub fn render_block(message: &Message, links: LinkMode) -> String {
    let sender = message.sender.as_deref().unwrap_or_default();
    let subject = message.subject.as_deref().unwrap_or_default();
    let body = message.body.as_deref().unwrap_or_default();

    let mut block = String::new();
    block.push_str(&format!("\nFrom: {sender}\n"));
    block.push_str(&format!("Subject: {subject}\n"));

    let raw_body = match links {
        LinkMode::Annotated => {
            let date = message.received_at.as_deref().unwrap_or_default();
            block.push_str(&format!("Date: {date}\n"));
            body
        }
        LinkMode::TextOnly => {
            if body.is_empty() {
                subject
            } else {
                body
            }
        }
    };

    let cleaned = clean_body(raw_body, links);
    block.push_str(&format!("Content:\n{cleaned}\n"));
    block.push_str(BLOCK_DELIMITER);
    block.push('\n');
    block
}

/// Remove `<style>...</style>` blocks entirely
fn strip_style_blocks(input: &str) -> String {
    STYLE_BLOCK.replace_all(input, "").into_owned()
}

/// Remove `@media { ... }` blocks, then any remaining brace-delimited rule
/// bodies (no nesting assumed)
fn strip_css_rules(input: &str) -> String {
    let without_media = MEDIA_RULE.replace_all(input, "");
    BRACE_RULE.replace_all(&without_media, "").into_owned()
}

/// Rewrite anchor tags according to the link mode
fn rewrite_anchors(input: &str, links: LinkMode) -> String {
    let replacement = match links {
        LinkMode::Annotated => "$2 ($1)",
        LinkMode::TextOnly => "$2",
    };
    ANCHOR_TAG.replace_all(input, replacement).into_owned()
}

/// Replace every remaining tag with a single space
fn strip_tags(input: &str) -> String {
    ANY_TAG.replace_all(input, " ").into_owned()
}

/// Collapse whitespace runs (including newlines) to a single space and trim
fn collapse_whitespace(input: &str) -> String {
    WHITESPACE_RUN.replace_all(input, " ").trim().to_owned()
}

/// Decode the fixed entity set, in table order
fn decode_entities(input: &str) -> String {
    ENTITIES
        .iter()
        .fold(input.to_owned(), |text, (entity, replacement)| {
            text.replace(entity, replacement)
        })
}

#[cfg(test)]
mod tests {
    use super::{LinkMode, clean_body, render_block};
    use crate::message::Message;

    #[test]
    fn plain_body_passes_through_unchanged() {
        let body = "Lunch at noon?";
        assert_eq!(clean_body(body, LinkMode::Annotated), body);
        assert_eq!(clean_body(body, LinkMode::TextOnly), body);
    }

    #[test]
    fn collapses_whitespace_runs_to_single_spaces() {
        assert_eq!(clean_body("a   \n\n  b", LinkMode::Annotated), "a b");
        assert_eq!(clean_body("  padded  ", LinkMode::TextOnly), "padded");
    }

    #[test]
    fn annotated_mode_keeps_link_targets() {
        let body = r#"<a href="http://x.com">click</a>"#;
        assert_eq!(
            clean_body(body, LinkMode::Annotated),
            "click (http://x.com)"
        );
    }

    #[test]
    fn text_only_mode_discards_link_targets() {
        let body = r#"<a href="http://x.com">click</a>"#;
        let cleaned = clean_body(body, LinkMode::TextOnly);
        assert_eq!(cleaned, "click");
        assert!(!cleaned.contains("http://x.com"));
    }

    #[test]
    fn rewrites_anchors_with_extra_attributes() {
        let body = r#"<a class="btn" href="https://e.example/go" target="_blank">Go now</a>"#;
        assert_eq!(
            clean_body(body, LinkMode::Annotated),
            "Go now (https://e.example/go)"
        );
    }

    #[test]
    fn removes_style_blocks_spanning_newlines() {
        let body = "before <STYLE type=\"text/css\">\n.p { color: red; }\n</style> after";
        assert_eq!(clean_body(body, LinkMode::Annotated), "before after");
    }

    #[test]
    fn removes_media_queries_and_rule_bodies() {
        let body = "@media screen and (max-width: 600px) {\n  .col: narrow;\n} .row {margin: 0} text";
        assert_eq!(clean_body(body, LinkMode::Annotated), ".row text");
    }

    #[test]
    fn strips_remaining_tags_to_spaces() {
        let body = "<div><p>Hello</p><br/>world</div>";
        assert_eq!(clean_body(body, LinkMode::Annotated), "Hello world");
    }

    #[test]
    fn decodes_fixed_entity_set_in_order() {
        let body = "a&nbsp;b &amp; c &lt;d&gt; &quot;e&quot;";
        assert_eq!(
            clean_body(body, LinkMode::Annotated),
            "a b & c <d> \"e\""
        );
    }

    #[test]
    fn renders_annotated_block_with_date_line() {
        let message = Message {
            sender: Some("Alice <alice@example.com>".to_owned()),
            recipient: None,
            subject: Some("Status".to_owned()),
            received_at: Some("Wed, 1 Jan 2025 09:00:00 +0000".to_owned()),
            body: Some("<p>All  good</p>".to_owned()),
            attachments: Vec::new(),
        };

        let block = render_block(&message, LinkMode::Annotated);
        assert_eq!(
            block,
            "\nFrom: Alice <alice@example.com>\nSubject: Status\nDate: Wed, 1 Jan 2025 09:00:00 +0000\nContent:\nAll good\n-------------------\n"
        );
    }

    #[test]
    fn text_only_block_omits_date_line() {
        let message = Message {
            sender: Some("alice@example.com".to_owned()),
            recipient: None,
            subject: Some("Status".to_owned()),
            received_at: Some("Wed, 1 Jan 2025 09:00:00 +0000".to_owned()),
            body: Some("fine".to_owned()),
            attachments: Vec::new(),
        };

        let block = render_block(&message, LinkMode::TextOnly);
        assert!(!block.contains("Date:"));
        assert!(block.contains("Content:\nfine\n"));
    }

    #[test]
    fn text_only_block_falls_back_to_subject_for_empty_body() {
        let message = Message {
            sender: Some("alice@example.com".to_owned()),
            recipient: None,
            subject: Some("Reminder: standup".to_owned()),
            received_at: None,
            body: None,
            attachments: Vec::new(),
        };

        let block = render_block(&message, LinkMode::TextOnly);
        assert!(block.contains("Content:\nReminder: standup\n"));

        // The annotated variant does not fall back.
        let block = render_block(&message, LinkMode::Annotated);
        assert!(block.contains("Content:\n\n"));
    }
}
