//! Typed results surfaced to callers.

pub use crate::parser::FetchRaw;

/// One mailbox entry from a LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Hierarchy delimiter or parent reference, e.g. `/`.
    pub parent: String,
    /// Mailbox name, e.g. `INBOX`.
    pub name: String,
    /// Name attributes with the leading backslash stripped, e.g.
    /// `HasNoChildren`.
    pub attrs: Vec<String>,
}

/// The state of a mailbox as reported by SELECT.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of messages with the \Recent flag set.
    pub recent: u32,
    /// Sequence number of the first unseen message.
    pub unseen: u32,
    /// UIDVALIDITY of the mailbox.
    pub uidvalidity: u32,
    /// Flags defined in the mailbox (leading backslash stripped).
    pub flags: Vec<String>,
    /// Flags the client can change permanently.
    pub permanent_flags: Vec<String>,
    /// Access granted by the server, e.g. `READ-WRITE`.
    pub permission: String,
}

/// Outcome of a completed request, as delivered to callbacks and (for
/// data-bearing commands) the [`read`](crate::Client::read) queue.
///
/// `Connected`, `Disconnected` and `Logout` are lifecycle results: they
/// reach the issuing callback but are never enqueued for `read`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// The connection is established and the greeting was accepted.
    Connected,
    /// The connection is fully closed.
    Disconnected,
    /// LOGIN completed.
    Login,
    /// LOGOUT completed; the server will close the connection.
    Logout,
    /// LIST completed with the matched mailboxes.
    List(Vec<ListItem>),
    /// SELECT completed with the mailbox state.
    Select(MailboxStatus),
    /// NOOP completed.
    Noop,
    /// SEARCH completed with the matching sequence numbers.
    Search(Vec<u64>),
    /// FETCH completed with per-message field buffers.
    Fetch(FetchRaw),
}

impl CommandResult {
    /// Returns true for results that are enqueued for `read`.
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        !matches!(self, Self::Connected | Self::Disconnected | Self::Logout)
    }
}
