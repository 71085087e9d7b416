//! IMAP command model and wire encoding.
//!
//! Commands are modeled as a closed enum carrying their arguments;
//! [`Command::encode`] renders the RFC 3501 wire form
//! `<tag> SP <command> CRLF`. Credentials and mailbox names are inserted
//! verbatim; the caller is responsible for quoting where needed.

mod tag;

pub use tag::{MAX_TAG_INDEX, TagGenerator};

use bitflags::bitflags;

/// Kind of an issued command, used to route its completed response to
/// the matching handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// LOGIN command.
    Login,
    /// LOGOUT command.
    Logout,
    /// LIST command.
    List,
    /// SELECT command.
    Select,
    /// NOOP command.
    Noop,
    /// SEARCH command.
    Search,
    /// FETCH command.
    Fetch,
}

impl CommandKind {
    /// Returns the command name as sent on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::List => "LIST",
            Self::Select => "SELECT",
            Self::Noop => "NOOP",
            Self::Search => "SEARCH",
            Self::Fetch => "FETCH",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameterless SEARCH criteria (RFC 3501 section 6.4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages in the mailbox.
    All,
    /// Messages with the \Answered flag set.
    Answered,
    /// Messages with the \Deleted flag set.
    Deleted,
    /// Messages with the \Draft flag set.
    Draft,
    /// Messages with the \Flagged flag set.
    Flagged,
    /// Messages that have the \Recent flag set but not the \Seen flag.
    New,
    /// Messages that do not have the \Recent flag set.
    Old,
    /// Messages that have the \Recent flag set.
    Recent,
    /// Messages that have the \Seen flag set.
    Seen,
    /// Messages that do not have the \Answered flag set.
    Unanswered,
    /// Messages that do not have the \Deleted flag set.
    Undeleted,
    /// Messages that do not have the \Draft flag set.
    Undraft,
    /// Messages that do not have the \Flagged flag set.
    Unflagged,
    /// Messages that do not have the \Seen flag set.
    Unseen,
}

impl SearchCriteria {
    /// Returns the uppercase wire token for this criterion.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Answered => "ANSWERED",
            Self::Deleted => "DELETED",
            Self::Draft => "DRAFT",
            Self::Flagged => "FLAGGED",
            Self::New => "NEW",
            Self::Old => "OLD",
            Self::Recent => "RECENT",
            Self::Seen => "SEEN",
            Self::Unanswered => "UNANSWERED",
            Self::Undeleted => "UNDELETED",
            Self::Undraft => "UNDRAFT",
            Self::Unflagged => "UNFLAGGED",
            Self::Unseen => "UNSEEN",
        }
    }
}

bitflags! {
    /// Message parts requested by a FETCH command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FetchFields: u8 {
        /// Date, subject, from and to header fields.
        const ENVELOPE = 0b001;
        /// Content type of the message and of its first part.
        const MIME = 0b010;
        /// Body of the first part.
        const TEXT = 0b100;
    }
}

impl FetchFields {
    /// Returns the FETCH data-item fragment for a single flag.
    ///
    /// ENVELOPE and MIME use `BODY.PEEK` so fetching headers does not
    /// set the `\Seen` flag; TEXT deliberately does.
    #[must_use]
    pub const fn fragment(flag: Self) -> &'static str {
        match flag.bits() {
            0b001 => "BODY.PEEK[HEADER.FIELDS (DATE SUBJECT FROM TO)]",
            0b010 => "BODY.PEEK[HEADER.FIELDS (CONTENT-TYPE)] BODY.PEEK[1.MIME]",
            0b100 => "BODY[1]",
            _ => "",
        }
    }

    /// Renders the parenthesized field list for this set of flags.
    #[must_use]
    pub fn render(self) -> String {
        let mut parts = Vec::new();
        for flag in [Self::ENVELOPE, Self::MIME, Self::TEXT] {
            if self.contains(flag) {
                parts.push(Self::fragment(flag));
            }
        }
        parts.join(" ")
    }
}

/// A command ready to be issued, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Authenticate with a plaintext username and password.
    Login {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// End the session.
    Logout,
    /// List mailboxes under a reference matching a pattern.
    List {
        /// Reference name, e.g. `""`.
        reference: String,
        /// Mailbox pattern, e.g. `*`.
        pattern: String,
    },
    /// Select a mailbox for subsequent message commands.
    Select {
        /// Mailbox name.
        mailbox: String,
    },
    /// Keep-alive; also solicits pending status updates.
    Noop,
    /// Search the selected mailbox by a parameterless criterion.
    Search {
        /// Search criterion.
        criteria: SearchCriteria,
    },
    /// Fetch message parts for a run of sequence numbers.
    Fetch {
        /// First message sequence number.
        start: u64,
        /// Number of consecutive messages; values below 2 fetch one.
        span: u64,
        /// Requested message parts.
        fields: FetchFields,
    },
}

impl Command {
    /// Returns the kind of this command.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Login { .. } => CommandKind::Login,
            Self::Logout => CommandKind::Logout,
            Self::List { .. } => CommandKind::List,
            Self::Select { .. } => CommandKind::Select,
            Self::Noop => CommandKind::Noop,
            Self::Search { .. } => CommandKind::Search,
            Self::Fetch { .. } => CommandKind::Fetch,
        }
    }

    /// Renders the command body without tag or CRLF.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Login { username, password } => format!("LOGIN {username} {password}"),
            Self::Logout => "LOGOUT".to_string(),
            Self::List { reference, pattern } => format!("LIST {reference} {pattern}"),
            Self::Select { mailbox } => format!("SELECT {mailbox}"),
            Self::Noop => "NOOP".to_string(),
            Self::Search { criteria } => format!("SEARCH {}", criteria.as_str()),
            Self::Fetch {
                start,
                span,
                fields,
            } => {
                let range = if *span <= 1 {
                    start.to_string()
                } else {
                    format!("{}:{}", start, start + span - 1)
                };
                format!("FETCH {range} ({})", fields.render())
            }
        }
    }

    /// Renders the full wire form `<tag> SP <command> CRLF`.
    #[must_use]
    pub fn encode(&self, tag: &str) -> Vec<u8> {
        format!("{tag} {}\r\n", self.text()).into_bytes()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;

    #[test]
    fn test_login_text() {
        let cmd = Command::Login {
            username: "alice".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(cmd.text(), "LOGIN alice secret");
        assert_eq!(cmd.encode("A000"), b"A000 LOGIN alice secret\r\n");
    }

    #[test]
    fn test_list_text() {
        let cmd = Command::List {
            reference: "\"\"".to_string(),
            pattern: "*".to_string(),
        };
        assert_eq!(cmd.text(), "LIST \"\" *");
    }

    #[test]
    fn test_select_text() {
        let cmd = Command::Select {
            mailbox: "INBOX".to_string(),
        };
        assert_eq!(cmd.text(), "SELECT INBOX");
    }

    #[test]
    fn test_search_text() {
        let cmd = Command::Search {
            criteria: SearchCriteria::Unseen,
        };
        assert_eq!(cmd.text(), "SEARCH UNSEEN");
    }

    #[test]
    fn test_fetch_single_message() {
        let cmd = Command::Fetch {
            start: 7,
            span: 1,
            fields: FetchFields::TEXT,
        };
        assert_eq!(cmd.text(), "FETCH 7 (BODY[1])");
    }

    #[test]
    fn test_fetch_range() {
        let cmd = Command::Fetch {
            start: 1,
            span: 10,
            fields: FetchFields::ENVELOPE,
        };
        assert_eq!(
            cmd.text(),
            "FETCH 1:10 (BODY.PEEK[HEADER.FIELDS (DATE SUBJECT FROM TO)])"
        );
    }

    #[test]
    fn test_fetch_combined_fields() {
        let cmd = Command::Fetch {
            start: 1,
            span: 1,
            fields: FetchFields::MIME | FetchFields::TEXT,
        };
        assert_eq!(
            cmd.text(),
            "FETCH 1 (BODY.PEEK[HEADER.FIELDS (CONTENT-TYPE)] BODY.PEEK[1.MIME] BODY[1])"
        );
    }

    #[test]
    fn test_encode_tokenize_round_trip() {
        // encode -> split back into (tag, command, args) must be identity
        // for every supported command.
        let commands = [
            Command::Login {
                username: "u".to_string(),
                password: "p".to_string(),
            },
            Command::Logout,
            Command::List {
                reference: "\"\"".to_string(),
                pattern: "%".to_string(),
            },
            Command::Select {
                mailbox: "INBOX".to_string(),
            },
            Command::Noop,
            Command::Search {
                criteria: SearchCriteria::All,
            },
            Command::Fetch {
                start: 3,
                span: 2,
                fields: FetchFields::TEXT,
            },
        ];

        for cmd in &commands {
            let wire = cmd.encode("B007");
            let text = std::str::from_utf8(&wire).unwrap();
            assert!(text.ends_with("\r\n"));
            let line = text.trim_end_matches("\r\n");
            let (tag, rest) = line.split_once(' ').unwrap();
            assert_eq!(tag, "B007");
            assert_eq!(rest, cmd.text());
            assert!(rest.starts_with(cmd.kind().name()));
        }
    }

    #[test]
    fn test_criteria_tokens() {
        assert_eq!(SearchCriteria::All.as_str(), "ALL");
        assert_eq!(SearchCriteria::Unanswered.as_str(), "UNANSWERED");
        assert_eq!(SearchCriteria::New.as_str(), "NEW");
    }
}
