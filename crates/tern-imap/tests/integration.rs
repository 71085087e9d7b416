//! Integration tests for the IMAP client.
//!
//! Each test drives the full client core over an in-memory duplex
//! stream, playing the server side of a scripted transcript. The tag
//! letter is pinned so the client's wire output is deterministic.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;

use tern_imap::{
    Client, CommandResult, Error, ErrorKind, FetchFields, Result, SearchCriteria, Status,
};

/// Builds a connected client with tag letter `A` and a server handle,
/// after playing the given greeting.
async fn connected_client(greeting: &[u8]) -> (Client, DuplexStream) {
    let (stream, mut server) = tokio::io::duplex(4096);
    let client = Client::with_tag_letter('A');

    client.connect_with_stream(stream, |_| {});
    server.write_all(greeting).await.unwrap();
    assert!(client.wait_for_connected(1000).await);

    (client, server)
}

/// Reads one CRLF-terminated line of client output.
async fn read_line(server: &mut DuplexStream) -> String {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = server.read(&mut byte).await.unwrap();
        assert_ne!(n, 0, "client closed the stream mid-line");
        line.push(byte[0]);
        if line.ends_with(b"\r\n") {
            return String::from_utf8(line).unwrap();
        }
    }
}

/// Captures a command outcome for assertion on the test task.
fn capture() -> (
    impl FnOnce(Result<CommandResult>) + Send + 'static,
    oneshot::Receiver<Result<CommandResult>>,
) {
    let (tx, rx) = oneshot::channel();
    (
        move |outcome| {
            let _ = tx.send(outcome);
        },
        rx,
    )
}

#[tokio::test]
async fn scenario_connect_login_logout() {
    let (client, mut server) = connected_client(b"* OK IMAP4rev1 Service Ready\r\n").await;
    assert_eq!(client.status(), Status::Connected);

    client.login("alice", "secret", |_| {});
    assert_eq!(read_line(&mut server).await, "A000 LOGIN alice secret\r\n");
    server.write_all(b"A000 OK LOGIN completed\r\n").await.unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    assert_eq!(client.status(), Status::Authenticated);
    assert_eq!(client.read(), Some(CommandResult::Login));
    assert!(client.read().is_none());

    client.logout(|_| {});
    assert_eq!(read_line(&mut server).await, "A001 LOGOUT\r\n");
    server
        .write_all(b"* BYE Logging out\r\nA001 OK LOGOUT completed\r\n")
        .await
        .unwrap();
    drop(server);

    assert!(client.wait_for_disconnected(1000).await);
    assert_eq!(client.status(), Status::Disconnected);
    assert_eq!(client.error(), ErrorKind::NoError);
}

#[tokio::test]
async fn scenario_preauth_greeting() {
    let (client, _server) = connected_client(b"* PREAUTH Welcome back\r\n").await;
    assert_eq!(client.status(), Status::Authenticated);
}

#[tokio::test]
async fn scenario_select_inbox() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    client.select("INBOX", |_| {});
    assert_eq!(read_line(&mut server).await, "A000 SELECT INBOX\r\n");
    server
        .write_all(
            b"* 172 EXISTS\r\n\
              * 1 RECENT\r\n\
              * OK [UNSEEN 12]\r\n\
              * OK [UIDVALIDITY 3857529045]\r\n\
              * FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
              * OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)]\r\n\
              A000 OK [READ-WRITE] SELECT completed\r\n",
        )
        .await
        .unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    let Some(CommandResult::Select(status)) = client.read() else {
        panic!("expected a select result");
    };
    assert_eq!(status.exists, 172);
    assert_eq!(status.recent, 1);
    assert_eq!(status.unseen, 12);
    assert_eq!(status.uidvalidity, 3857529045);
    assert_eq!(
        status.flags,
        vec!["Answered", "Flagged", "Deleted", "Seen", "Draft"]
    );
    assert_eq!(status.permanent_flags, vec!["Deleted", "Seen", "*"]);
    assert_eq!(status.permission, "READ-WRITE");
}

#[tokio::test]
async fn scenario_list() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    client.list("\"\"", "*", |_| {});
    assert_eq!(read_line(&mut server).await, "A000 LIST \"\" *\r\n");
    server
        .write_all(
            b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
              * LIST (\\HasChildren) \"/\" \"Sent\"\r\n\
              A000 OK LIST completed\r\n",
        )
        .await
        .unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    let Some(CommandResult::List(items)) = client.read() else {
        panic!("expected a list result");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].parent, "/");
    assert_eq!(items[0].name, "INBOX");
    assert_eq!(items[0].attrs, vec!["HasNoChildren"]);
    assert_eq!(items[1].name, "Sent");
    assert_eq!(items[1].attrs, vec!["HasChildren"]);
}

#[tokio::test]
async fn scenario_fetch_with_literal() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    client.fetch(1, FetchFields::TEXT, 1, |_| {});
    assert_eq!(read_line(&mut server).await, "A000 FETCH 1 (BODY[1])\r\n");
    server
        .write_all(b"* 1 FETCH (BODY[1] {12}\r\nHello\r\nWorld)\r\nA000 OK FETCH completed\r\n")
        .await
        .unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    let Some(CommandResult::Fetch(raw)) = client.read() else {
        panic!("expected a fetch result");
    };
    assert_eq!(raw[&1]["BODY[1]"], b"Hello\r\nWorld");
}

#[tokio::test]
async fn scenario_fetch_literal_split_across_writes() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    client.fetch(1, FetchFields::TEXT, 1, |_| {});
    assert_eq!(read_line(&mut server).await, "A000 FETCH 1 (BODY[1])\r\n");

    // The literal arrives in three separate transport reads.
    server.write_all(b"* 1 FETCH (BODY[1] {12}\r\nHel").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    server.write_all(b"lo\r\nWor").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    server
        .write_all(b"ld)\r\nA000 OK FETCH completed\r\n")
        .await
        .unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    let Some(CommandResult::Fetch(raw)) = client.read() else {
        panic!("expected a fetch result");
    };
    assert_eq!(raw[&1]["BODY[1]"], b"Hello\r\nWorld");
    assert_eq!(raw[&1]["BODY[1]"].len(), 12);
}

#[tokio::test]
async fn scenario_fetch_range_and_fields() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    client.fetch(1, FetchFields::ENVELOPE | FetchFields::MIME, 3, |_| {});
    assert_eq!(
        read_line(&mut server).await,
        "A000 FETCH 1:3 (BODY.PEEK[HEADER.FIELDS (DATE SUBJECT FROM TO)] \
         BODY.PEEK[HEADER.FIELDS (CONTENT-TYPE)] BODY.PEEK[1.MIME])\r\n"
    );
    server.write_all(b"A000 OK FETCH completed\r\n").await.unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    assert!(matches!(client.read(), Some(CommandResult::Fetch(_))));
}

#[tokio::test]
async fn scenario_bad_command() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    let (callback, outcome) = capture();
    client.select("Drafts", callback);
    assert_eq!(read_line(&mut server).await, "A000 SELECT Drafts\r\n");
    server
        .write_all(b"A000 BAD Missing mailbox name\r\n")
        .await
        .unwrap();

    let err = outcome.await.unwrap().unwrap_err();
    assert!(matches!(&err, Error::BadCommand(msg) if msg == "Missing mailbox name"));
    assert_eq!(client.error(), ErrorKind::BadCommand);

    // No result was enqueued.
    assert!(!client.wait_for_ready_read(200).await);
    assert!(client.read().is_none());
}

#[tokio::test]
async fn scenario_login_rejected() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    let (callback, outcome) = capture();
    client.login("alice", "wrong", callback);
    assert_eq!(read_line(&mut server).await, "A000 LOGIN alice wrong\r\n");
    server
        .write_all(b"A000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .await
        .unwrap();

    let err = outcome.await.unwrap().unwrap_err();
    assert!(matches!(&err, Error::LoginFailed(msg) if msg.contains("Invalid credentials")));
    assert_eq!(client.error(), ErrorKind::LoginFailed);
    // A rejected login leaves the session connected but unauthenticated.
    assert_eq!(client.status(), Status::Connected);
}

#[tokio::test]
async fn scenario_search() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    client.search(SearchCriteria::Unseen, |_| {});
    assert_eq!(read_line(&mut server).await, "A000 SEARCH UNSEEN\r\n");
    server
        .write_all(b"* SEARCH 2 84 882\r\nA000 OK SEARCH completed\r\n")
        .await
        .unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    assert_eq!(client.read(), Some(CommandResult::Search(vec![2, 84, 882])));
}

#[tokio::test]
async fn scenario_noop() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    client.noop(|_| {});
    assert_eq!(read_line(&mut server).await, "A000 NOOP\r\n");
    server.write_all(b"A000 OK NOOP completed\r\n").await.unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    assert_eq!(client.read(), Some(CommandResult::Noop));
}

#[tokio::test]
async fn pipelined_commands_complete_in_order() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    client.search(SearchCriteria::All, |_| {});
    client.noop(|_| {});
    assert_eq!(read_line(&mut server).await, "A000 SEARCH ALL\r\n");
    assert_eq!(read_line(&mut server).await, "A001 NOOP\r\n");

    // Both responses arrive in a single transport read; the leftover
    // bytes after the first completion must reach the second parser.
    server
        .write_all(b"* SEARCH 5\r\nA000 OK SEARCH completed\r\nA001 OK NOOP completed\r\n")
        .await
        .unwrap();

    assert!(client.wait_for_ready_read(1000).await);
    assert_eq!(client.read(), Some(CommandResult::Search(vec![5])));

    let second = match client.read() {
        Some(result) => result,
        None => {
            assert!(client.wait_for_ready_read(1000).await);
            client.read().expect("second result must be queued")
        }
    };
    assert_eq!(second, CommandResult::Noop);
}

#[tokio::test]
async fn logout_before_authentication_degrades_to_disconnect() {
    let (client, _server) = connected_client(b"* OK ready\r\n").await;
    assert_eq!(client.status(), Status::Connected);

    let (callback, outcome) = capture();
    client.logout(callback);

    assert!(client.wait_for_disconnected(1000).await);
    assert_eq!(
        outcome.await.unwrap().unwrap(),
        CommandResult::Disconnected
    );
    assert_eq!(client.status(), Status::Disconnected);
}

#[tokio::test]
async fn greeting_rejection_is_fatal() {
    let (stream, mut server) = tokio::io::duplex(4096);
    let client = Client::with_tag_letter('A');

    let (callback, outcome) = capture();
    client.connect_with_stream(stream, callback);
    server.write_all(b"* BYE Try again later\r\n").await.unwrap();

    let err = outcome.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert_eq!(client.status(), Status::Disconnected);
}

#[tokio::test]
async fn transport_read_error_fails_head_command() {
    let mock = tokio_test::io::Builder::new()
        .read(b"* OK ready\r\n")
        .write(b"A000 NOOP\r\n")
        .read_error(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ))
        .build();

    let client = Client::with_tag_letter('A');
    client.connect_with_stream(mock, |_| {});
    assert!(client.wait_for_connected(1000).await);

    let (callback, outcome) = capture();
    client.noop(callback);

    let err = outcome.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(client.wait_for_disconnected(1000).await);
    assert_eq!(client.error(), ErrorKind::Transport);
}

#[tokio::test]
async fn failed_write_rolls_back_in_flight_entry() {
    let mock = tokio_test::io::Builder::new()
        .read(b"* OK ready\r\n")
        .write_error(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        ))
        .build();

    let client = Client::with_tag_letter('A');
    client.connect_with_stream(mock, |_| {});
    assert!(client.wait_for_connected(1000).await);

    let (callback, outcome) = capture();
    client.noop(callback);

    let err = outcome.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(client.error(), ErrorKind::Transport);

    // The connection itself is still attached; close it explicitly so
    // the dropped client has nothing left to do.
    client.disconnect_from_host(|_| {});
    assert!(client.wait_for_disconnected(1000).await);
}

#[tokio::test]
async fn ready_read_waiter_times_out() {
    let (client, _server) = connected_client(b"* OK ready\r\n").await;

    let start = tokio::time::Instant::now();
    assert!(!client.wait_for_ready_read(100).await);
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn command_callbacks_fire_exactly_once() {
    let (client, mut server) = connected_client(b"* OK ready\r\n").await;

    let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    for _ in 0..3 {
        let counter = std::sync::Arc::clone(&counter);
        client.noop(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
    }

    for tag in ["A000", "A001", "A002"] {
        assert_eq!(read_line(&mut server).await, format!("{tag} NOOP\r\n"));
        server
            .write_all(format!("{tag} OK NOOP completed\r\n").as_bytes())
            .await
            .unwrap();
    }

    for _ in 0..3 {
        assert!(client.wait_for_ready_read(1000).await);
        assert_eq!(client.read(), Some(CommandResult::Noop));
    }
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);
}
