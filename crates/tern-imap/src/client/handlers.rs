//! Per-command response handlers.
//!
//! Each handler turns the [`ParsedResponse`] accumulated for one command
//! into a typed [`CommandResult`] or an [`Error`]. All share the same
//! completion preamble: exactly one tagged entry, `NO` mapped to a
//! per-command error, `BAD` mapped to [`Error::BadCommand`].
//!
//! Per-line anomalies inside LIST and SELECT extraction (unparseable
//! items, stray numeric text) are not fatal: they are logged and
//! skipped.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::command::CommandKind;
use crate::parser::{ParsedResponse, ResponseCode};
use crate::response::{CommandResult, ListItem, MailboxStatus};
use crate::{Error, Result};

/// Matches one LIST item such as `(\HasNoChildren) "/" "INBOX"`.
static LIST_REG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\((?P<attrs>[^)]+)\) "(?P<parent>[^"]+)" "(?P<name>[^"]+)"$"#).unwrap()
});

/// Matches a parenthesized attribute list such as `(\Answered \Seen)`.
static ATTRS_REG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((?P<attrs>[^)]+)\)").unwrap());

/// Matches a bracketed status such as `[READ-WRITE]`, `[UNSEEN 12]` or
/// `[PERMANENTFLAGS (\Deleted \Seen \*)]`.
static BRACKET_REG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?P<type>[A-Z-]+)( (\()?(?P<data>[^)]+)(\))?)?\]").unwrap());

/// Dispatches a completed response to the handler for its command.
pub(crate) fn handle(kind: CommandKind, resp: &ParsedResponse) -> Result<CommandResult> {
    match kind {
        CommandKind::Login => handle_login(resp),
        CommandKind::Logout => handle_logout(resp),
        CommandKind::List => handle_list(resp),
        CommandKind::Select => handle_select(resp),
        CommandKind::Noop => handle_noop(resp),
        CommandKind::Search => handle_search(resp),
        CommandKind::Fetch => handle_fetch(resp),
    }
}

/// Shared completion preamble.
///
/// `map_no` decides which error a `NO` completion maps to for this
/// command.
fn completion(
    resp: &ParsedResponse,
    map_no: fn(String) -> Error,
) -> Result<&(ResponseCode, String)> {
    if resp.tagged.len() != 1 {
        return Err(Error::Unexpected("unexpected tagged response".to_string()));
    }
    let tagged = &resp.tagged[0];
    match tagged.0 {
        ResponseCode::No => Err(map_no(tagged.1.clone())),
        ResponseCode::Bad => Err(Error::BadCommand(tagged.1.clone())),
        _ => Ok(tagged),
    }
}

fn handle_login(resp: &ParsedResponse) -> Result<CommandResult> {
    let _ = completion(resp, Error::LoginFailed)?;
    Ok(CommandResult::Login)
}

fn handle_logout(resp: &ParsedResponse) -> Result<CommandResult> {
    let tagged = completion(resp, Error::BadCommand)?;
    if tagged.0 != ResponseCode::Ok {
        return Err(Error::BadCommand(tagged.1.clone()));
    }
    Ok(CommandResult::Logout)
}

fn handle_noop(resp: &ParsedResponse) -> Result<CommandResult> {
    let tagged = completion(resp, Error::BadCommand)?;
    if tagged.0 != ResponseCode::Ok {
        return Err(Error::BadCommand(tagged.1.clone()));
    }
    Ok(CommandResult::Noop)
}

fn handle_list(resp: &ParsedResponse) -> Result<CommandResult> {
    let _ = completion(resp, Error::ReferenceFailed)?;

    let mut items = Vec::new();
    for (code, data) in &resp.untagged {
        if *code != ResponseCode::List {
            tracing::warn!(code = %code, "unexpected untagged response in LIST");
            continue;
        }
        let Some(caps) = LIST_REG.captures(data) else {
            tracing::warn!(%data, "failed to parse LIST item: unexpected format");
            continue;
        };
        items.push(ListItem {
            parent: caps["parent"].to_string(),
            name: caps["name"].to_string(),
            attrs: parse_attrs(&caps["attrs"]),
        });
    }

    Ok(CommandResult::List(items))
}

fn handle_select(resp: &ParsedResponse) -> Result<CommandResult> {
    let tagged = completion(resp, Error::ReferenceFailed)?;

    let mut status = MailboxStatus::default();

    if let Some(caps) = BRACKET_REG.captures(&tagged.1) {
        status.permission = caps["type"].to_string();
    } else {
        tracing::warn!(data = %tagged.1, "failed to parse permission from SELECT completion");
    }

    for (code, data) in &resp.untagged_trailing {
        match code {
            ResponseCode::Exists => match data.parse::<u32>() {
                Ok(exists) => status.exists = exists,
                Err(_) => tracing::warn!(%data, "failed to parse SELECT EXISTS: not a number"),
            },
            ResponseCode::Recent => match data.parse::<u32>() {
                Ok(recent) => status.recent = recent,
                Err(_) => tracing::warn!(%data, "failed to parse SELECT RECENT: not a number"),
            },
            _ => {}
        }
    }

    for (code, data) in &resp.untagged {
        if *code == ResponseCode::Flags {
            if let Some(caps) = ATTRS_REG.captures(data) {
                status.flags = parse_attrs(&caps["attrs"]);
            }
            continue;
        }

        if *code != ResponseCode::Ok {
            continue;
        }
        let Some(caps) = BRACKET_REG.captures(data) else {
            continue;
        };
        let value = caps.name("data").map(|m| m.as_str());
        match (&caps["type"], value) {
            ("UNSEEN", Some(value)) => match value.parse::<u32>() {
                Ok(unseen) => status.unseen = unseen,
                Err(_) => tracing::warn!(%data, "failed to parse SELECT UNSEEN: not a number"),
            },
            ("UIDVALIDITY", Some(value)) => match value.parse::<u32>() {
                Ok(uidvalidity) => status.uidvalidity = uidvalidity,
                Err(_) => {
                    tracing::warn!(%data, "failed to parse SELECT UIDVALIDITY: not a number");
                }
            },
            ("PERMANENTFLAGS", Some(value)) => status.permanent_flags = parse_attrs(value),
            _ => {}
        }
    }

    Ok(CommandResult::Select(status))
}

fn handle_search(resp: &ParsedResponse) -> Result<CommandResult> {
    let _ = completion(resp, Error::ReferenceFailed)?;

    let hits: Vec<&String> = resp
        .untagged
        .iter()
        .filter(|(code, _)| *code == ResponseCode::Search)
        .map(|(_, data)| data)
        .collect();
    if hits.len() != 1 {
        return Err(Error::Unexpected("unexpected untagged response".to_string()));
    }

    let mut ids = Vec::new();
    for token in hits[0].split_whitespace() {
        match token.parse::<u64>() {
            Ok(id) => ids.push(id),
            Err(_) => tracing::warn!(%token, "failed to parse SEARCH response: not a number"),
        }
    }

    Ok(CommandResult::Search(ids))
}

fn handle_fetch(resp: &ParsedResponse) -> Result<CommandResult> {
    let _ = completion(resp, Error::ReferenceFailed)?;
    Ok(CommandResult::Fetch(resp.raw.clone()))
}

/// Splits a space-separated attribute list, stripping each leading
/// backslash.
fn parse_attrs(attrs: &str) -> Vec<String> {
    attrs
        .split_whitespace()
        .map(|attr| attr.strip_prefix('\\').unwrap_or(attr).to_string())
        .collect()
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
    use crate::ErrorKind;
    use crate::parser::{Progress, ResponseParser};

    fn parse(tag: &str, input: &[u8]) -> ParsedResponse {
        let mut parser = ResponseParser::new(tag);
        assert_eq!(parser.digest(input), Progress::Complete);
        parser.into_response()
    }

    #[test]
    fn test_login_ok() {
        let resp = parse("A000", b"A000 OK LOGIN completed\r\n");
        assert_eq!(handle_login(&resp).unwrap(), CommandResult::Login);
    }

    #[test]
    fn test_login_no_maps_to_login_failed() {
        let resp = parse(
            "F000",
            b"F000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n",
        );
        let err = handle_login(&resp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoginFailed);
        assert!(err.to_string().contains("Invalid credentials"));
    }

    #[test]
    fn test_bad_maps_to_bad_command() {
        let resp = parse("E000", b"E000 BAD Missing mailbox name\r\n");
        let err = handle_select(&resp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadCommand);
        assert!(err.to_string().contains("Missing mailbox name"));
    }

    #[test]
    fn test_missing_completion_is_unexpected() {
        let resp = ParsedResponse::new("A000");
        let err = handle_noop(&resp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_list_items() {
        let resp = parse(
            "C000",
            b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
              * LIST (\\HasChildren) \"/\" \"Sent\"\r\n\
              C000 OK LIST completed\r\n",
        );
        let CommandResult::List(items) = handle_list(&resp).unwrap() else {
            panic!("expected list result");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].parent, "/");
        assert_eq!(items[0].name, "INBOX");
        assert_eq!(items[0].attrs, vec!["HasNoChildren"]);
        assert_eq!(items[1].name, "Sent");
        assert_eq!(items[1].attrs, vec!["HasChildren"]);
    }

    #[test]
    fn test_list_skips_malformed_items() {
        let resp = parse(
            "C000",
            b"* LIST garbage here\r\n\
              * LIST (\\HasChildren) \"/\" \"Sent\"\r\n\
              C000 OK LIST completed\r\n",
        );
        let CommandResult::List(items) = handle_list(&resp).unwrap() else {
            panic!("expected list result");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Sent");
    }

    #[test]
    fn test_select_full_status() {
        let resp = parse(
            "B000",
            b"* 172 EXISTS\r\n\
              * 1 RECENT\r\n\
              * OK [UNSEEN 12]\r\n\
              * OK [UIDVALIDITY 3857529045]\r\n\
              * FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
              * OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)]\r\n\
              B000 OK [READ-WRITE] SELECT completed\r\n",
        );
        let CommandResult::Select(status) = handle_select(&resp).unwrap() else {
            panic!("expected select result");
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

    #[test]
    fn test_select_no_maps_to_reference_failed() {
        let resp = parse("B000", b"B000 NO No such mailbox\r\n");
        let err = handle_select(&resp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferenceFailed);
    }

    #[test]
    fn test_select_numeric_anomaly_is_skipped() {
        // A non-numeric EXISTS count is logged and skipped; the rest of
        // the status still fills in.
        let mut resp = parse("B000", b"* 3 RECENT\r\nB000 OK [READ-ONLY] done\r\n");
        resp.untagged_trailing
            .push((ResponseCode::Exists, "many".to_string()));
        let CommandResult::Select(status) = handle_select(&resp).unwrap() else {
            panic!("expected select result");
        };
        assert_eq!(status.exists, 0);
        assert_eq!(status.recent, 3);
        assert_eq!(status.permission, "READ-ONLY");
    }

    #[test]
    fn test_search_ids() {
        let resp = parse("S000", b"* SEARCH 2 84 882\r\nS000 OK SEARCH completed\r\n");
        assert_eq!(
            handle_search(&resp).unwrap(),
            CommandResult::Search(vec![2, 84, 882])
        );
    }

    #[test]
    fn test_search_empty_result() {
        let resp = parse("S000", b"* SEARCH\r\nS000 OK SEARCH completed\r\n");
        assert_eq!(handle_search(&resp).unwrap(), CommandResult::Search(vec![]));
    }

    #[test]
    fn test_search_skips_non_numeric_tokens() {
        let resp = parse("S000", b"* SEARCH 1 two 3\r\nS000 OK done\r\n");
        assert_eq!(
            handle_search(&resp).unwrap(),
            CommandResult::Search(vec![1, 3])
        );
    }

    #[test]
    fn test_search_requires_exactly_one_untagged() {
        let resp = parse(
            "S000",
            b"* SEARCH 1\r\n* SEARCH 2\r\nS000 OK done\r\n",
        );
        let err = handle_search(&resp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_fetch_exposes_raw() {
        let resp = parse(
            "D000",
            b"* 1 FETCH (BODY[1] {5}\r\nhello)\r\nD000 OK FETCH completed\r\n",
        );
        let CommandResult::Fetch(raw) = handle_fetch(&resp).unwrap() else {
            panic!("expected fetch result");
        };
        assert_eq!(raw[&1]["BODY[1]"], b"hello");
    }

    #[test]
    fn test_logout_requires_ok() {
        let resp = parse("A001", b"A001 OK LOGOUT completed\r\n");
        assert_eq!(handle_logout(&resp).unwrap(), CommandResult::Logout);
    }
}
