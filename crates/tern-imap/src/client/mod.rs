//! IMAP4 client core.
//!
//! The public [`Client`] is a cheap handle: every issue method posts an
//! op to a single owning task that holds the transport, the tag
//! generator, the in-flight request queue and the callback registry.
//! The task is a state machine advanced by transport events, so no lock
//! is ever held across a write or while a user callback runs.
//!
//! Results reach callers two ways: through the per-command callback,
//! and — for data-bearing commands — through the [`Client::read`] queue
//! signalled by [`ClientEvent::ReadyRead`].

mod handlers;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::command::{Command, CommandKind, FetchFields, SearchCriteria, TagGenerator};
use crate::connection::{Security, StreamLike, Transport, TransportEvent};
use crate::parser::{Progress, ResponseCode, ResponseParser};
use crate::response::CommandResult;
use crate::{Error, ErrorKind, Result};

/// Reserved tag for the connect lifecycle transition. Never sent on the
/// wire; generated command tags (`[A-Z][0-9]{3}`) cannot collide with it.
pub const CONNECT_TAG: &str = "CONNECT";

/// Reserved tag for the disconnect lifecycle transition.
pub const DISCONNECT_TAG: &str = "DISCONNECT";

/// Default waiter deadline in milliseconds.
pub const DEFAULT_TIMEOUT_MSECS: i64 = 30_000;

/// How long a dropped client waits for the server to honor its
/// best-effort LOGOUT.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Connection status of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// No connection is established.
    #[default]
    Disconnected,
    /// Greeting OK received; not authenticated.
    Connected,
    /// Greeting PREAUTH received, or LOGIN completed.
    Authenticated,
}

/// Lifecycle events observable through the waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// The greeting was accepted and the connection is usable.
    Connected,
    /// The connection is fully closed.
    Disconnected,
    /// A typed result was enqueued for [`Client::read`].
    ReadyRead,
    /// A request failed; see the last-error accessors.
    ErrorOccurred,
}

/// Terminal callback for an issued request.
///
/// Exactly one invocation happens per request: `Ok` with the typed
/// result, or `Err` with the failure.
pub type CommandCallback = Box<dyn FnOnce(Result<CommandResult>) + Send + 'static>;

/// Operations posted from the handle to the core task.
enum Op {
    Connect {
        host: String,
        port: u16,
        security: Security,
        callback: CommandCallback,
    },
    ConnectStream {
        stream: Box<dyn StreamLike>,
        callback: CommandCallback,
    },
    Disconnect {
        callback: CommandCallback,
    },
    Command {
        command: Command,
        callback: CommandCallback,
    },
}

impl Op {
    fn into_callback(self) -> CommandCallback {
        match self {
            Self::Connect { callback, .. }
            | Self::ConnectStream { callback, .. }
            | Self::Disconnect { callback }
            | Self::Command { callback, .. } => callback,
        }
    }
}

/// State shared between the handle and the core task.
struct Shared {
    status: Mutex<Status>,
    read_queue: Mutex<VecDeque<CommandResult>>,
    last_error: Mutex<(ErrorKind, String)>,
    events: broadcast::Sender<ClientEvent>,
}

impl Shared {
    fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            status: Mutex::new(Status::Disconnected),
            read_queue: Mutex::new(VecDeque::new()),
            last_error: Mutex::new((ErrorKind::NoError, String::new())),
            events,
        }
    }

    fn status(&self) -> Status {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: Status) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn push_result(&self, result: CommandResult) {
        self.read_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    fn pop_result(&self) -> Option<CommandResult> {
        self.read_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn has_results(&self) -> bool {
        !self
            .read_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn set_error(&self, kind: ErrorKind, message: impl Into<String>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = (kind, message.into());
    }

    fn last_error(&self) -> (ErrorKind, String) {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn emit(&self, event: ClientEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

/// Asynchronous pipelined IMAP4 client.
///
/// All issue methods are non-blocking: they return immediately and
/// deliver their outcome through the supplied callback, the `read`
/// queue, and the lifecycle events.
pub struct Client {
    ops: mpsc::UnboundedSender<Op>,
    shared: Arc<Shared>,
}

impl Client {
    /// Creates a client with a random tag letter.
    ///
    /// Must be called from within a tokio runtime; the core task is
    /// spawned immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::spawn(TagGenerator::random())
    }

    /// Creates a client with a fixed tag letter.
    #[must_use]
    pub fn with_tag_letter(letter: char) -> Self {
        Self::spawn(TagGenerator::new(letter))
    }

    fn spawn(tags: TagGenerator) -> Self {
        let shared = Arc::new(Shared::new());
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();

        let core = Core {
            ops: ops_rx,
            shared: Arc::clone(&shared),
            transport: Transport::new(),
            tags,
            in_flight: VecDeque::new(),
            callbacks: HashMap::new(),
        };
        tokio::spawn(core.run());

        Self {
            ops: ops_tx,
            shared,
        }
    }

    /// Begins connecting to a server.
    ///
    /// Refused with [`ErrorKind::Duplicate`] if a connection is already
    /// established. A `port` of 0 selects the default for the security
    /// mode (143 plaintext, 993 TLS).
    pub fn connect_to_host(
        &self,
        host: impl Into<String>,
        port: u16,
        security: Security,
        callback: impl FnOnce(Result<CommandResult>) + Send + 'static,
    ) {
        self.post(Op::Connect {
            host: host.into(),
            port,
            security,
            callback: Box::new(callback),
        });
    }

    /// Begins a session over an already-established stream.
    ///
    /// The greeting is read from the stream exactly as after
    /// [`connect_to_host`](Self::connect_to_host); useful for tests and
    /// for callers that manage their own transport.
    pub fn connect_with_stream(
        &self,
        stream: impl StreamLike + 'static,
        callback: impl FnOnce(Result<CommandResult>) + Send + 'static,
    ) {
        self.post(Op::ConnectStream {
            stream: Box::new(stream),
            callback: Box::new(callback),
        });
    }

    /// Begins closing the connection.
    ///
    /// Refused with [`ErrorKind::Duplicate`] if already disconnected.
    pub fn disconnect_from_host(&self, callback: impl FnOnce(Result<CommandResult>) + Send + 'static) {
        self.post(Op::Disconnect {
            callback: Box::new(callback),
        });
    }

    /// Issues `LOGIN <username> <password>`.
    ///
    /// Credentials are inserted verbatim; the caller is responsible for
    /// quoting if needed.
    pub fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
        callback: impl FnOnce(Result<CommandResult>) + Send + 'static,
    ) {
        self.command(
            Command::Login {
                username: username.into(),
                password: password.into(),
            },
            callback,
        );
    }

    /// Issues `LOGOUT`.
    ///
    /// When connected but not authenticated this degrades to a plain
    /// disconnect.
    pub fn logout(&self, callback: impl FnOnce(Result<CommandResult>) + Send + 'static) {
        self.command(Command::Logout, callback);
    }

    /// Issues `LIST <reference> <pattern>`.
    pub fn list(
        &self,
        reference: impl Into<String>,
        pattern: impl Into<String>,
        callback: impl FnOnce(Result<CommandResult>) + Send + 'static,
    ) {
        self.command(
            Command::List {
                reference: reference.into(),
                pattern: pattern.into(),
            },
            callback,
        );
    }

    /// Issues `SELECT <mailbox>`.
    pub fn select(
        &self,
        mailbox: impl Into<String>,
        callback: impl FnOnce(Result<CommandResult>) + Send + 'static,
    ) {
        self.command(
            Command::Select {
                mailbox: mailbox.into(),
            },
            callback,
        );
    }

    /// Issues `NOOP`.
    pub fn noop(&self, callback: impl FnOnce(Result<CommandResult>) + Send + 'static) {
        self.command(Command::Noop, callback);
    }

    /// Issues `SEARCH <criterion>`.
    pub fn search(
        &self,
        criteria: SearchCriteria,
        callback: impl FnOnce(Result<CommandResult>) + Send + 'static,
    ) {
        self.command(Command::Search { criteria }, callback);
    }

    /// Issues `FETCH <id>[:<id+span-1>] (<fields>)`.
    pub fn fetch(
        &self,
        id: u64,
        fields: FetchFields,
        span: u64,
        callback: impl FnOnce(Result<CommandResult>) + Send + 'static,
    ) {
        self.command(
            Command::Fetch {
                start: id,
                span,
                fields,
            },
            callback,
        );
    }

    fn command(
        &self,
        command: Command,
        callback: impl FnOnce(Result<CommandResult>) + Send + 'static,
    ) {
        self.post(Op::Command {
            command,
            callback: Box::new(callback),
        });
    }

    fn post(&self, op: Op) {
        if let Err(mpsc::error::SendError(op)) = self.ops.send(op) {
            // The core task is gone; fail the request synchronously.
            self.shared
                .set_error(ErrorKind::Unknown, "client core terminated");
            op.into_callback()(Err(Error::Unknown("client core terminated".to_string())));
            self.shared.emit(ClientEvent::ErrorOccurred);
        }
    }

    /// Pops the oldest typed result, if any.
    #[must_use]
    pub fn read(&self) -> Option<CommandResult> {
        let result = self.shared.pop_result();
        if result.is_none() {
            tracing::warn!("failed to read from IMAP client: no response in queue");
        }
        result
    }

    /// Returns the current connection status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.shared.status()
    }

    /// Returns true once connected (authenticated or not).
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.status(), Status::Connected | Status::Authenticated)
    }

    /// Returns true while no connection is established.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.status() == Status::Disconnected
    }

    /// Returns the kind of the last error, [`ErrorKind::NoError`] by
    /// default.
    #[must_use]
    pub fn error(&self) -> ErrorKind {
        self.shared.last_error().0
    }

    /// Returns the message of the last error.
    #[must_use]
    pub fn error_string(&self) -> String {
        self.shared.last_error().1
    }

    /// Clears the last error.
    pub fn reset_error(&self) {
        self.shared.set_error(ErrorKind::NoError, String::new());
    }

    /// Waits until the client is connected.
    ///
    /// Returns true on the matched signal, false if an error occurred or
    /// the deadline elapsed. Non-positive `msecs` waits forever.
    pub async fn wait_for_connected(&self, msecs: i64) -> bool {
        let events = self.shared.events.subscribe();
        if self.is_connected() {
            return true;
        }
        wait_signal(events, ClientEvent::Connected, msecs).await
    }

    /// Waits until the client is disconnected. See
    /// [`wait_for_connected`](Self::wait_for_connected) for semantics.
    pub async fn wait_for_disconnected(&self, msecs: i64) -> bool {
        let events = self.shared.events.subscribe();
        if self.is_disconnected() {
            return true;
        }
        wait_signal(events, ClientEvent::Disconnected, msecs).await
    }

    /// Waits until a typed result is available for [`read`](Self::read).
    /// See [`wait_for_connected`](Self::wait_for_connected) for
    /// semantics.
    ///
    /// A timeout does not cancel the underlying command; its result
    /// will still arrive later.
    pub async fn wait_for_ready_read(&self, msecs: i64) -> bool {
        let events = self.shared.events.subscribe();
        if self.shared.has_results() {
            return true;
        }
        wait_signal(events, ClientEvent::ReadyRead, msecs).await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for one target event, giving up on `ErrorOccurred` or timeout.
async fn wait_signal(
    mut events: broadcast::Receiver<ClientEvent>,
    target: ClientEvent,
    msecs: i64,
) -> bool {
    let wait = async move {
        loop {
            match events.recv().await {
                Ok(event) if event == target => return true,
                Ok(ClientEvent::ErrorOccurred) => return false,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    };

    if msecs > 0 {
        (tokio::time::timeout(Duration::from_millis(msecs.unsigned_abs()), wait).await)
            .unwrap_or(false)
    } else {
        wait.await
    }
}

/// One issued request awaiting its response.
struct InFlight {
    kind: EntryKind,
    parser: ResponseParser,
}

/// What the head-of-queue parser is parsing for.
#[derive(Clone, Copy)]
enum EntryKind {
    /// The connection greeting.
    Greeting,
    /// A regular command.
    Command(CommandKind),
}

/// Owner of the transport and all per-connection state.
struct Core {
    ops: mpsc::UnboundedReceiver<Op>,
    shared: Arc<Shared>,
    transport: Transport,
    tags: TagGenerator,
    in_flight: VecDeque<InFlight>,
    callbacks: HashMap<String, CommandCallback>,
}

/// What woke the core loop up.
enum Wakeup {
    Op(Option<Op>),
    Transport(TransportEvent),
}

impl Core {
    async fn run(mut self) {
        loop {
            let wakeup = {
                let ops = &mut self.ops;
                let transport = &mut self.transport;
                if transport.is_active() {
                    tokio::select! {
                        op = ops.recv() => Wakeup::Op(op),
                        event = transport.next_event() => Wakeup::Transport(event),
                    }
                } else {
                    Wakeup::Op(ops.recv().await)
                }
            };

            match wakeup {
                Wakeup::Op(Some(op)) => self.handle_op(op).await,
                Wakeup::Op(None) => {
                    // Every handle is gone.
                    self.shutdown().await;
                    return;
                }
                Wakeup::Transport(event) => self.handle_transport(event),
            }
        }
    }

    async fn handle_op(&mut self, op: Op) {
        match op {
            Op::Connect {
                host,
                port,
                security,
                callback,
            } => {
                self.callbacks.insert(CONNECT_TAG.to_string(), callback);
                if self.shared.status() != Status::Disconnected {
                    self.tag_error(
                        CONNECT_TAG,
                        Error::Duplicate("connection already established".to_string()),
                    );
                    return;
                }

                tracing::debug!(%host, port, ?security, "connecting to host");
                match self.transport.connect(&host, port, security).await {
                    Ok(()) => self.expect_greeting(),
                    Err(err) => self.tag_error(CONNECT_TAG, err),
                }
            }

            Op::ConnectStream { stream, callback } => {
                self.callbacks.insert(CONNECT_TAG.to_string(), callback);
                if self.shared.status() != Status::Disconnected {
                    self.tag_error(
                        CONNECT_TAG,
                        Error::Duplicate("connection already established".to_string()),
                    );
                    return;
                }

                self.transport.attach(stream);
                self.expect_greeting();
            }

            Op::Disconnect { callback } => {
                self.callbacks.insert(DISCONNECT_TAG.to_string(), callback);
                if self.shared.status() == Status::Disconnected {
                    self.tag_error(
                        DISCONNECT_TAG,
                        Error::Duplicate("connection not established".to_string()),
                    );
                    return;
                }

                tracing::debug!("disconnecting from host");
                if let Err(err) = self.transport.disconnect().await {
                    tracing::warn!(error = %err, "shutdown failed while disconnecting");
                }
                self.finish_disconnect();
            }

            Op::Command { command, callback } => self.issue(command, callback).await,
        }
    }

    /// Queues the greeting pseudo-request; the response dispatch loop
    /// completes it like any other in-flight entry.
    fn expect_greeting(&mut self) {
        self.in_flight.push_back(InFlight {
            kind: EntryKind::Greeting,
            parser: ResponseParser::new(CONNECT_TAG),
        });
    }

    async fn issue(&mut self, command: Command, callback: CommandCallback) {
        let kind = command.kind();

        // A LOGOUT before authentication carries no session to end;
        // degrade it to a plain disconnect.
        if kind == CommandKind::Logout && self.shared.status() == Status::Connected {
            self.callbacks.insert(DISCONNECT_TAG.to_string(), callback);
            if let Err(err) = self.transport.disconnect().await {
                tracing::warn!(error = %err, "shutdown failed while disconnecting");
            }
            self.finish_disconnect();
            return;
        }

        let tag = self.tags.generate();
        self.callbacks.insert(tag.clone(), callback);

        if self.shared.status() == Status::Disconnected {
            self.tag_error(
                &tag,
                Error::NotConnected("connection not established".to_string()),
            );
            return;
        }

        self.in_flight.push_back(InFlight {
            kind: EntryKind::Command(kind),
            parser: ResponseParser::new(tag.clone()),
        });

        tracing::debug!(%tag, command = %kind, "issuing command");
        if let Err(err) = self.transport.write(&command.encode(&tag)).await {
            // The write never reached the server; roll the entry back.
            self.in_flight.pop_back();
            self.tag_error(&tag, err);
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Readable => {
                let bytes = self.transport.read_available();
                self.feed(bytes);
            }
            TransportEvent::Disconnected => {
                self.fail_in_flight("connection closed by server");
                self.finish_disconnect();
            }
            TransportEvent::Error(message) => {
                // The error reaches listeners before the disconnect.
                if self.in_flight.is_empty() {
                    self.shared.set_error(ErrorKind::Transport, message.clone());
                    self.shared.emit(ClientEvent::ErrorOccurred);
                } else {
                    self.fail_in_flight(&message);
                }
                self.finish_disconnect();
            }
        }
    }

    /// Routes inbound bytes to the head parser, dispatching completed
    /// responses and carrying leftover bytes to the next entry.
    fn feed(&mut self, mut bytes: Vec<u8>) {
        loop {
            if bytes.is_empty() {
                return;
            }
            let Some(head) = self.in_flight.front_mut() else {
                // Stray data after logout, or a server talking out of
                // turn.
                tracing::warn!(len = bytes.len(), "discarding bytes with no request in flight");
                return;
            };

            match head.parser.digest(&bytes) {
                Progress::Incomplete => return,
                Progress::Error => {
                    if let Some(entry) = self.in_flight.pop_front() {
                        let tag = entry.parser.tag().to_string();
                        tracing::warn!(%tag, "failed to parse response");
                        self.tag_error(&tag, Error::Parse("invalid response".to_string()));
                    }
                    return;
                }
                Progress::Complete => {
                    if let Some(mut entry) = self.in_flight.pop_front() {
                        bytes = entry.parser.take_remainder();
                        self.dispatch(entry);
                    }
                }
            }
        }
    }

    /// Completes one in-flight entry: greeting interpretation or
    /// command-handler dispatch, then callback and read-queue delivery.
    fn dispatch(&mut self, entry: InFlight) {
        match entry.kind {
            EntryKind::Greeting => self.finish_greeting(entry),
            EntryKind::Command(kind) => {
                let response = entry.parser.into_response();
                let tag = response.tag.clone();

                match handlers::handle(kind, &response) {
                    Ok(result) => {
                        if kind == CommandKind::Login {
                            self.shared.set_status(Status::Authenticated);
                        }
                        let readable = result.is_readable();
                        self.fire_success(&tag, result.clone());
                        if readable {
                            self.shared.push_result(result);
                            self.shared.emit(ClientEvent::ReadyRead);
                        }
                    }
                    Err(err) => self.tag_error(&tag, err),
                }
            }
        }
    }

    /// Interprets the greeting: OK connects, PREAUTH authenticates,
    /// anything else is fatal.
    fn finish_greeting(&mut self, entry: InFlight) {
        let response = entry.parser.into_response();

        if response.untagged.len() != 1 {
            self.transport.abort();
            self.tag_error(
                CONNECT_TAG,
                Error::Unexpected("unexpected greeting response".to_string()),
            );
            return;
        }

        match response.untagged[0].0 {
            ResponseCode::Ok => self.shared.set_status(Status::Connected),
            ResponseCode::PreAuth => self.shared.set_status(Status::Authenticated),
            _ => {
                self.transport.abort();
                self.tag_error(
                    CONNECT_TAG,
                    Error::Unexpected("unexpected greeting response".to_string()),
                );
                return;
            }
        }

        tracing::info!(tags = %self.tags.label(), "connection established");
        self.fire_success(CONNECT_TAG, CommandResult::Connected);
        self.shared.emit(ClientEvent::Connected);
    }

    /// Fails every in-flight entry with a transport error, oldest first.
    fn fail_in_flight(&mut self, message: &str) {
        while let Some(entry) = self.in_flight.pop_front() {
            let tag = entry.parser.tag().to_string();
            self.tag_error(&tag, Error::Transport(message.to_string()));
        }
    }

    /// Marks the connection closed and notifies listeners.
    ///
    /// Requests still in flight get their terminal error callback
    /// before the disconnect is announced.
    fn finish_disconnect(&mut self) {
        self.transport.abort();
        self.fail_in_flight("connection closed");
        self.shared.set_status(Status::Disconnected);
        tracing::info!("disconnected");
        self.fire_success(DISCONNECT_TAG, CommandResult::Disconnected);
        self.shared.emit(ClientEvent::Disconnected);
    }

    /// Invokes the success callback registered for a tag, if any.
    fn fire_success(&mut self, tag: &str, result: CommandResult) {
        if let Some(callback) = self.callbacks.remove(tag) {
            callback(Ok(result));
        }
    }

    /// Records a failure, invokes the tag's callback with it, and emits
    /// the error event.
    fn tag_error(&mut self, tag: &str, error: Error) {
        tracing::warn!(%tag, %error, "request failed");
        self.shared.set_error(error.kind(), error.to_string());
        if let Some(callback) = self.callbacks.remove(tag) {
            callback(Err(error));
        }
        self.shared.emit(ClientEvent::ErrorOccurred);
    }

    /// Best-effort LOGOUT and close when the last handle is dropped
    /// while connected.
    async fn shutdown(&mut self) {
        if self.shared.status() == Status::Disconnected || !self.transport.is_active() {
            return;
        }

        tracing::debug!("handle dropped while connected; sending LOGOUT");
        let tag = self.tags.generate();
        let _ = self.transport.write(&Command::Logout.encode(&tag)).await;

        let transport = &mut self.transport;
        let drain = async {
            loop {
                match transport.next_event().await {
                    TransportEvent::Readable => {
                        let _ = transport.read_available();
                    }
                    TransportEvent::Disconnected | TransportEvent::Error(_) => return,
                }
            }
        };
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, drain).await;

        let _ = self.transport.disconnect().await;
        self.shared.set_status(Status::Disconnected);
        self.shared.emit(ClientEvent::Disconnected);
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

    #[tokio::test]
    async fn test_connect_while_connected_is_duplicate() {
        let (client_side, mut server) = tokio::io::duplex(1024);
        let client = Client::with_tag_letter('A');

        client.connect_with_stream(client_side, |_| {});
        tokio::io::AsyncWriteExt::write_all(&mut server, b"* OK ready\r\n")
            .await
            .unwrap();
        assert!(client.wait_for_connected(1000).await);

        client.connect_to_host("example.com", 0, Security::Tls, |outcome| {
            assert!(matches!(outcome, Err(Error::Duplicate(_))));
        });

        // The refusal surfaces through the last-error accessors.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while client.error() == ErrorKind::NoError {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::task::yield_now().await;
        }
        assert_eq!(client.error(), ErrorKind::Duplicate);
    }

    #[tokio::test]
    async fn test_command_while_disconnected_is_not_connected() {
        let client = Client::with_tag_letter('A');

        client.noop(|outcome| {
            assert!(matches!(outcome, Err(Error::NotConnected(_))));
        });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while client.error() == ErrorKind::NoError {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::task::yield_now().await;
        }
        assert_eq!(client.error(), ErrorKind::NotConnected);

        client.reset_error();
        assert_eq!(client.error(), ErrorKind::NoError);
        assert!(client.error_string().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_while_disconnected_is_duplicate() {
        let client = Client::with_tag_letter('A');

        client.disconnect_from_host(|outcome| {
            assert!(matches!(outcome, Err(Error::Duplicate(_))));
        });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while client.error() == ErrorKind::NoError {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::task::yield_now().await;
        }
        assert_eq!(client.error(), ErrorKind::Duplicate);
    }

    #[tokio::test]
    async fn test_read_empty_queue() {
        let client = Client::with_tag_letter('A');
        assert!(client.read().is_none());
    }
}
