//! Sender filtering against a blacklist
//!
//! A blacklist entry is either a full address (`user@domain`) matched by
//! exact equality, or a domain-suffix marker (`@domain`) matched by a
//! literal string-suffix test on the extracted sender address. All
//! comparison is case-insensitive; entries are normalized to lowercase at
//! load time.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::message::Message;

/// Matches the address inside angle brackets of a display-name sender
static ANGLE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(.+?)>").expect("valid angle-address pattern"));

/// Blocked-sender list
///
/// Loaded once per run. Absence of the backing file is an expected
/// configuration state, not an error: the pipeline simply filters nothing.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: Vec<String>,
}

impl Blacklist {
    /// Load the blacklist from a line-oriented text file, or default to empty
    ///
    /// Each non-empty line (tolerating `\r\n` and `\n` endings) becomes one
    /// entry, lowercased. A missing or unreadable file logs a warning and
    /// yields an empty blacklist.
    pub async fn load_or_default(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Self::from_lines(&contents),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "blacklist not readable; filtering nothing");
                Self::default()
            }
        }
    }

    /// Build a blacklist from raw file contents
    pub fn from_lines(contents: &str) -> Self {
        let entries = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self { entries }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the blacklist has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a lowercase sender address is blocked
    ///
    /// Entries starting with `@` match by literal suffix; all others match
    /// by exact equality.
    fn blocks(&self, address: &str) -> bool {
        self.entries.iter().any(|entry| {
            if entry.starts_with('@') {
                address.ends_with(entry.as_str())
            } else {
                address == entry
            }
        })
    }
}

/// Filter messages against the blacklist
///
/// Messages without a sender are excluded unconditionally. Retained
/// messages keep their original relative order. Pure: no side effects
/// beyond the returned vector.
pub fn filter_messages(messages: Vec<Message>, blacklist: &Blacklist) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|message| match &message.sender {
            Some(sender) => !blacklist.blocks(&extract_address(sender)),
            None => false,
        })
        .collect()
}

/// Extract the bare lowercase address from a From header value
///
/// Takes the contents of angle brackets when present (`Name <addr>` form),
/// otherwise the whole sender string.
fn extract_address(sender: &str) -> String {
    ANGLE_ADDRESS
        .captures(sender)
        .and_then(|c| c.get(1))
        .map_or(sender, |m| m.as_str())
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{Blacklist, extract_address, filter_messages};
    use crate::message::Message;

    fn blacklist(entries: &[&str]) -> Blacklist {
        Blacklist::from_lines(&entries.join("\n"))
    }

    #[test]
    fn excludes_messages_without_sender_regardless_of_blacklist() {
        let messages = vec![Message::bare(None, Some("body"))];
        assert!(filter_messages(messages.clone(), &Blacklist::default()).is_empty());
        assert!(filter_messages(messages, &blacklist(&["user@domain.com"])).is_empty());
    }

    #[test]
    fn blocks_exact_address_case_insensitively() {
        let list = blacklist(&["user@domain.com"]);
        let messages = vec![
            Message::bare(Some("USER@DOMAIN.COM"), None),
            Message::bare(Some("other@domain.com"), None),
        ];

        let retained = filter_messages(messages, &list);
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].sender.as_deref(), Some("other@domain.com"));
    }

    #[test]
    fn domain_suffix_is_a_literal_suffix_test() {
        let list = blacklist(&["@domain.com"]);

        // Blocked: the address literally ends with "@domain.com".
        let blocked = vec![Message::bare(Some("user@domain.com"), None)];
        assert!(filter_messages(blocked, &list).is_empty());

        // Not blocked: a subdomain address ends with ".domain.com", which is
        // not the literal entry. No DNS-hierarchy matching.
        let subdomain = vec![Message::bare(Some("user@sub.domain.com"), None)];
        assert_eq!(filter_messages(subdomain, &list).len(), 1);

        // Not blocked: "notdomain.com" merely contains the domain text.
        let lookalike = vec![Message::bare(Some("user@notdomain.com"), None)];
        assert_eq!(filter_messages(lookalike, &list).len(), 1);
    }

    #[test]
    fn extracts_address_from_display_name_form() {
        assert_eq!(
            extract_address("Alice Example <ALICE@Spam.example>"),
            "alice@spam.example"
        );
        assert_eq!(extract_address("bob@example.com"), "bob@example.com");
    }

    #[test]
    fn retains_original_relative_order() {
        let list = blacklist(&["@spam.example"]);
        let messages = vec![
            Message::bare(Some("a@ok.example"), None),
            Message::bare(Some("x@spam.example"), None),
            Message::bare(Some("b@ok.example"), None),
            Message::bare(Some("c@ok.example"), None),
        ];

        let retained = filter_messages(messages, &list);
        let senders: Vec<_> = retained
            .iter()
            .map(|m| m.sender.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(senders, ["a@ok.example", "b@ok.example", "c@ok.example"]);
    }

    #[test]
    fn skips_blank_lines_and_trims_line_endings() {
        let list = Blacklist::from_lines("user@domain.com\r\n\r\n  \n@spam.example\n");
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_yields_empty_blacklist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list = Blacklist::load_or_default(&dir.path().join("absent.txt")).await;
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn loads_entries_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blacklist.txt");
        tokio::fs::write(&path, "Noise@Lists.example\n@ads.example\n")
            .await
            .expect("write blacklist");

        let list = Blacklist::load_or_default(&path).await;
        assert_eq!(list.len(), 2);

        let messages = vec![Message::bare(Some("noise@lists.example"), None)];
        assert!(filter_messages(messages, &list).is_empty());
    }
}
