//! Error types for the IMAP client.
//!
//! Every failure the client can surface carries one of the kinds in
//! [`ErrorKind`]; callers that only care about the category can use
//! [`Error::kind`] instead of matching the full enum.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Lifecycle method called in an incompatible state.
    #[error("Duplicate operation: {0}")]
    Duplicate(String),

    /// Command issued while disconnected.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Socket-level failure; the connection is no longer usable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol shape not matched (e.g. wrong number of tagged completions).
    #[error("Unexpected response: {0}")]
    Unexpected(String),

    /// Server returned BAD.
    #[error("Bad command: {0}")]
    BadCommand(String),

    /// Server returned NO to LOGIN.
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// Server returned NO to a name-dependent command.
    #[error("Reference failed: {0}")]
    ReferenceFailed(String),

    /// The parser could not recognize a line or literal sequence.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unclassified error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Tls(_) | Self::InvalidDnsName(_) | Self::Transport(_) => {
                ErrorKind::Transport
            }
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::NotConnected(_) => ErrorKind::NotConnected,
            Self::Unexpected(_) => ErrorKind::Unexpected,
            Self::BadCommand(_) => ErrorKind::BadCommand,
            Self::LoginFailed(_) => ErrorKind::LoginFailed,
            Self::ReferenceFailed(_) => ErrorKind::ReferenceFailed,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Returns true if this error indicates the connection is dead.
    #[must_use]
    pub const fn is_connection_dead(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
    }
}

/// Category of a client error, as surfaced by the last-error accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    /// No error has occurred.
    #[default]
    NoError,
    /// Unclassified error.
    Unknown,
    /// Lifecycle method called in an incompatible state.
    Duplicate,
    /// Socket-level failure; the connection is no longer usable.
    Transport,
    /// Protocol shape not matched.
    Unexpected,
    /// Command issued while disconnected.
    NotConnected,
    /// Server returned BAD.
    BadCommand,
    /// Server returned NO to LOGIN.
    LoginFailed,
    /// Server returned NO to a name-dependent command.
    ReferenceFailed,
    /// Response could not be parsed.
    Parse,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn test_kind_mapping() {
        assert_eq!(
            Error::Duplicate("x".to_string()).kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            Error::LoginFailed("x".to_string()).kind(),
            ErrorKind::LoginFailed
        );
        assert_eq!(
            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom")).kind(),
            ErrorKind::Transport
        );
        assert_eq!(Error::Parse("x".to_string()).kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_default_kind_is_no_error() {
        assert_eq!(ErrorKind::default(), ErrorKind::NoError);
    }

    #[test]
    fn test_connection_dead() {
        assert!(Error::Transport("flush failed".to_string()).is_connection_dead());
        assert!(!Error::BadCommand("nope".to_string()).is_connection_dead());
    }
}
