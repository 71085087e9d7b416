//! # tern-imap
//!
//! Asynchronous pipelined IMAP4 client (RFC 3501) for the Tern mail
//! client.
//!
//! The crate keeps a TLS or plaintext transport to a mail server,
//! serializes a stream of user-issued commands under distinct tags, and
//! incrementally parses the server's line-oriented response stream —
//! including octet literals in `FETCH` bodies — into typed results that
//! come back in issue order.
//!
//! ## Features
//!
//! - **Non-blocking issue methods**: every command returns immediately
//!   and completes through its callback, the [`Client::read`] queue and
//!   the lifecycle events
//! - **Resumable parser**: response bytes can arrive in any chunking;
//!   literals are consumed by octet count, never by line handling
//! - **Strict FIFO pipelining**: responses are matched to the oldest
//!   in-flight command; a command's callback fires before the next
//!   command's parser sees a single byte
//! - **TLS via rustls**: implicit TLS on port 993 without an OpenSSL
//!   dependency
//!
//! ## Quick Start
//!
//! ```ignore
//! use tern_imap::{Client, SearchCriteria, Security};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new();
//!
//!     // Port 0 selects the default for the security mode (993 here).
//!     client.connect_to_host("imap.example.com", 0, Security::Tls, |_| {});
//!     assert!(client.wait_for_connected(30_000).await);
//!
//!     client.login("user@example.com", "password", |_| {});
//!     client.wait_for_ready_read(30_000).await;
//!
//!     client.list("\"\"", "*", |_| {});
//!     if client.wait_for_ready_read(30_000).await {
//!         println!("{:?}", client.read());
//!     }
//!
//!     client.logout(|_| {});
//!     client.wait_for_disconnected(30_000).await;
//! }
//! ```
//!
//! ## Status machine
//!
//! ```text
//! DISCONNECTED --connect, greeting OK--------> CONNECTED
//! DISCONNECTED --connect, greeting PREAUTH---> AUTHENTICATED
//! CONNECTED    --LOGIN OK-------------------->  AUTHENTICATED
//! AUTHENTICATED --LOGOUT OK, close-----------> DISCONNECTED
//! *            --transport error------------->  DISCONNECTED (with error)
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the client core and its lifecycle surface
//! - [`command`]: command model, tag generation and wire encoding
//! - [`connection`]: security modes, streams and the transport
//! - [`parser`]: the incremental response parser
//! - [`response`]: typed results surfaced to callers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod response;

pub use client::{
    CONNECT_TAG, Client, ClientEvent, CommandCallback, DEFAULT_TIMEOUT_MSECS, DISCONNECT_TAG,
    Status,
};
pub use command::{Command, CommandKind, FetchFields, SearchCriteria, TagGenerator};
pub use connection::{Security, ServerStream, StreamLike, Transport, TransportEvent};
pub use error::{Error, ErrorKind, Result};
pub use parser::{FetchRaw, ParsedResponse, Progress, ResponseCode, ResponseParser};
pub use response::{CommandResult, ListItem, MailboxStatus};

/// IMAP protocol version implemented.
pub const IMAP_VERSION: &str = "IMAP4rev1";
