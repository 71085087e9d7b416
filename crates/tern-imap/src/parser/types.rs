//! Parser-facing response types.

use std::collections::BTreeMap;

/// Server response codes recognized by the parser.
///
/// Any other token in code position is a parse error; the parser never
/// silently drops a line it cannot classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// OK response.
    Ok,
    /// NO response.
    No,
    /// BAD response.
    Bad,
    /// PREAUTH response.
    PreAuth,
    /// BYE response.
    Bye,
    /// CAPABILITY response.
    Capability,
    /// LIST response.
    List,
    /// LSUB response.
    Lsub,
    /// SEARCH response.
    Search,
    /// FLAGS response.
    Flags,
    /// EXISTS response.
    Exists,
    /// RECENT response.
    Recent,
    /// EXPUNGE response.
    Expunge,
    /// FETCH response.
    Fetch,
    /// MAILBOX response.
    Mailbox,
    /// COPY response.
    Copy,
    /// STORE response.
    Store,
}

impl ResponseCode {
    /// Parses a wire token into a response code.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "OK" => Self::Ok,
            "NO" => Self::No,
            "BAD" => Self::Bad,
            "PREAUTH" => Self::PreAuth,
            "BYE" => Self::Bye,
            "CAPABILITY" => Self::Capability,
            "LIST" => Self::List,
            "LSUB" => Self::Lsub,
            "SEARCH" => Self::Search,
            "FLAGS" => Self::Flags,
            "EXISTS" => Self::Exists,
            "RECENT" => Self::Recent,
            "EXPUNGE" => Self::Expunge,
            "FETCH" => Self::Fetch,
            "MAILBOX" => Self::Mailbox,
            "COPY" => Self::Copy,
            "STORE" => Self::Store,
            _ => return None,
        })
    }

    /// Returns the wire token for this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
            Self::Capability => "CAPABILITY",
            Self::List => "LIST",
            Self::Lsub => "LSUB",
            Self::Search => "SEARCH",
            Self::Flags => "FLAGS",
            Self::Exists => "EXISTS",
            Self::Recent => "RECENT",
            Self::Expunge => "EXPUNGE",
            Self::Fetch => "FETCH",
            Self::Mailbox => "MAILBOX",
            Self::Copy => "COPY",
            Self::Store => "STORE",
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of an in-flight response after a `digest` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More input is needed before the tagged completion arrives.
    Incomplete,
    /// The tagged completion (or, for the greeting, the first untagged
    /// line) has been parsed.
    Complete,
    /// The response could not be parsed; the error flag is sticky.
    Error,
}

/// Literal payloads accumulated from FETCH, keyed by message sequence
/// number and then by field name.
pub type FetchRaw = BTreeMap<u64, BTreeMap<String, Vec<u8>>>;

/// A fully accumulated server response for one command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    /// The tag this response was parsed for.
    pub tag: String,
    /// Tagged completions, typically exactly one.
    pub tagged: Vec<(ResponseCode, String)>,
    /// Untagged responses of the form `* CODE data`.
    pub untagged: Vec<(ResponseCode, String)>,
    /// Untagged responses of the form `* <number> CODE`.
    pub untagged_trailing: Vec<(ResponseCode, String)>,
    /// Literal payloads from FETCH.
    pub raw: FetchRaw,
    /// Sticky flag set on an unrecoverable parse failure.
    pub error: bool,
}

impl ParsedResponse {
    /// Creates an empty response for the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
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
    fn test_token_round_trip() {
        for code in [
            ResponseCode::Ok,
            ResponseCode::No,
            ResponseCode::Bad,
            ResponseCode::PreAuth,
            ResponseCode::Bye,
            ResponseCode::Capability,
            ResponseCode::List,
            ResponseCode::Lsub,
            ResponseCode::Search,
            ResponseCode::Flags,
            ResponseCode::Exists,
            ResponseCode::Recent,
            ResponseCode::Expunge,
            ResponseCode::Fetch,
            ResponseCode::Mailbox,
            ResponseCode::Copy,
            ResponseCode::Store,
        ] {
            assert_eq!(ResponseCode::from_token(code.as_str()), Some(code));
        }
    }

    #[test]
    fn test_unknown_token() {
        assert_eq!(ResponseCode::from_token("IDLE"), None);
        assert_eq!(ResponseCode::from_token("ok"), None);
        assert_eq!(ResponseCode::from_token(""), None);
    }
}
