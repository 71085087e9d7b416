//! Incremental IMAP response parser.
//!
//! The parser is resumable: [`ResponseParser::digest`] consumes opaque
//! byte chunks as they arrive from the transport and reports whether the
//! response for its tag is still incomplete, complete, or failed. Line
//! classification uses regexes; literal payloads (`{N}` followed by
//! exactly N octets, CRLFs included) are consumed by length-prefixed
//! byte copying, never by line or regex handling.

#![allow(clippy::missing_errors_doc)]

mod types;

pub use types::{FetchRaw, ParsedResponse, Progress, ResponseCode};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::client::CONNECT_TAG;

/// Matches a tagged completion such as `A001 OK LOGIN completed`.
static TAGGED_REG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<tag>[A-Z][0-9]+) (?P<type>[A-Z]+)(?: (?P<data>.*))?$").unwrap());

/// Matches the first line of a FETCH response such as
/// `* 1 FETCH (BODY[1] {11}`. The closing parenthesis is absent when
/// literals or further field headers follow on later lines.
static UNTAGGED_FETCH_REG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\* (?P<id>[0-9]+) FETCH \((?P<data>.*?)(?P<close>\))?$").unwrap());

/// Matches a leading untagged response such as `* OK [UNSEEN 12]` or
/// `* LIST (\HasNoChildren) "/" "INBOX"`.
static UNTAGGED_REG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\* (?P<type>[A-Z-]+)(?: (?P<data>.*))?$").unwrap());

/// Matches a trailing untagged response such as `* 172 EXISTS`.
static UNTAGGED_TRAILING_REG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\* (?P<data>.*) (?P<type>[A-Z-]+)$").unwrap());

/// Matches one `field value` pair inside the FETCH parenthesized region.
///
/// - `BODY[1.MIME] NIL` captures only `field`.
/// - `BODY[HEADER.FIELDS (CONTENT-TYPE)] {12}` captures `field` and
///   `size`; the literal octets follow out of band.
/// - `BODY[1] {5} abcde` additionally captures inline `data`.
static PAIRED_FIELD_REG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\s?(?P<field>[A-Za-z0-9\-\[\]().\s]+?) (NIL|\{(?P<size>[0-9]+)\}(?:\s(?P<data>[\s\S]*))?)\s?",
    )
    .unwrap()
});

/// Outcome of handling one complete command line.
enum LineStep {
    /// Keep reading lines.
    Continue,
    /// The response is complete.
    Complete,
    /// The line could not be classified.
    Failed,
}

/// Outcome of scanning a FETCH field region.
enum FieldStep {
    /// All pairs were inline or NIL; stay in line mode.
    Inline,
    /// A literal header queued octets to read.
    Literal,
    /// A pair could not be parsed.
    Failed,
}

/// Outcome of draining literal octets and interleaved field headers.
enum RawStep {
    /// The FETCH body closed with `)`.
    Finished,
    /// The input ran out mid-literal or mid-line.
    NeedMore,
    /// A field header could not be parsed.
    Failed,
}

/// Resumable parser for the response stream of a single command.
#[derive(Debug)]
pub struct ResponseParser {
    response: ParsedResponse,
    /// Partial line carried between `digest` calls.
    carry: Vec<u8>,
    raw_mode: bool,
    bytes_to_read: u64,
    current_id: u64,
    current_field: String,
    done: bool,
    /// Bytes received past the tagged completion; they belong to the
    /// next in-flight response.
    remainder: Vec<u8>,
}

impl ResponseParser {
    /// Creates a parser expecting the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            response: ParsedResponse::new(tag),
            carry: Vec::new(),
            raw_mode: false,
            bytes_to_read: 0,
            current_id: 0,
            current_field: String::new(),
            done: false,
            remainder: Vec::new(),
        }
    }

    /// Returns the tag this parser was created with.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.response.tag
    }

    /// Returns the response accumulated so far.
    #[must_use]
    pub const fn response(&self) -> &ParsedResponse {
        &self.response
    }

    /// Consumes the parser and returns the accumulated response.
    #[must_use]
    pub fn into_response(self) -> ParsedResponse {
        self.response
    }

    /// Returns true once the tagged completion has been parsed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.done
    }

    /// Takes any bytes received past the completion, to be fed to the
    /// next in-flight parser.
    #[must_use]
    pub fn take_remainder(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.remainder)
    }

    /// Digests one chunk of transport input.
    pub fn digest(&mut self, chunk: &[u8]) -> Progress {
        if self.response.error {
            return Progress::Error;
        }
        if self.done {
            self.remainder.extend_from_slice(chunk);
            return Progress::Complete;
        }
        if chunk.is_empty() {
            tracing::warn!(tag = %self.response.tag, "unexpected empty input mid-response");
            self.response.error = true;
            return Progress::Error;
        }

        let mut cursor = chunk;
        loop {
            if self.raw_mode {
                match self.drain_raw(&mut cursor) {
                    RawStep::Finished => self.raw_mode = false,
                    RawStep::NeedMore => return Progress::Incomplete,
                    RawStep::Failed => return Progress::Error,
                }
            }

            let Some(line) = self.next_line(&mut cursor) else {
                return Progress::Incomplete;
            };

            match self.handle_line(&line) {
                LineStep::Continue => {}
                LineStep::Complete => {
                    self.done = true;
                    self.remainder.extend_from_slice(cursor);
                    return Progress::Complete;
                }
                LineStep::Failed => return Progress::Error,
            }
        }
    }

    /// Extracts the next CRLF-terminated line, without its terminator.
    ///
    /// Partial trailing bytes stay in the carry buffer until the next
    /// `digest` call.
    fn next_line(&mut self, cursor: &mut &[u8]) -> Option<Vec<u8>> {
        while let Some((&byte, rest)) = cursor.split_first() {
            self.carry.push(byte);
            *cursor = rest;
            if self.carry.ends_with(b"\r\n") {
                let mut line = std::mem::take(&mut self.carry);
                line.truncate(line.len() - 2);
                return Some(line);
            }
        }
        None
    }

    /// Classifies one complete command line by its first byte.
    fn handle_line(&mut self, raw_line: &[u8]) -> LineStep {
        let text = String::from_utf8_lossy(raw_line);
        let line = text.trim();

        if line.starts_with('*') {
            let step = self.handle_untagged(line);
            // The greeting carries no tagged completion; its first
            // untagged line is the whole response.
            if matches!(step, LineStep::Continue) && self.response.tag == CONNECT_TAG {
                return LineStep::Complete;
            }
            step
        } else if line.starts_with(self.response.tag.as_str()) {
            self.handle_tagged(line)
        } else {
            tracing::warn!(%line, "unhandled response line");
            self.fail()
        }
    }

    /// Handles a `*`-prefixed line: FETCH opener, leading untagged, or
    /// trailing untagged, in that precedence order.
    fn handle_untagged(&mut self, line: &str) -> LineStep {
        if let Some(caps) = UNTAGGED_FETCH_REG.captures(line) {
            let Ok(id) = caps["id"].parse::<u64>() else {
                tracing::warn!(%line, "failed to parse FETCH id: not a number");
                return self.fail();
            };
            self.current_id = id;

            let closed = caps.name("close").is_some();
            let data = caps.name("data").map_or("", |m| m.as_str());
            return match self.scan_fields(data) {
                // Without the closing parenthesis the FETCH body is
                // still open; later lines carry more field headers or
                // the lone `)`.
                FieldStep::Inline => {
                    self.raw_mode = !closed;
                    LineStep::Continue
                }
                FieldStep::Literal => {
                    self.raw_mode = true;
                    LineStep::Continue
                }
                FieldStep::Failed => LineStep::Failed,
            };
        }

        if let Some(caps) = UNTAGGED_REG.captures(line) {
            let Some(code) = ResponseCode::from_token(&caps["type"]) else {
                tracing::warn!(%line, "unknown untagged response type");
                return self.fail();
            };
            let data = caps.name("data").map_or_else(String::new, |m| m.as_str().to_string());
            self.response.untagged.push((code, data));
            return LineStep::Continue;
        }

        if let Some(caps) = UNTAGGED_TRAILING_REG.captures(line) {
            let Some(code) = ResponseCode::from_token(&caps["type"]) else {
                tracing::warn!(%line, "unknown trailing response type");
                return self.fail();
            };
            self.response
                .untagged_trailing
                .push((code, caps["data"].to_string()));
            return LineStep::Continue;
        }

        tracing::warn!(%line, "unhandled untagged line");
        self.fail()
    }

    /// Handles the tagged completion line.
    fn handle_tagged(&mut self, line: &str) -> LineStep {
        let Some(caps) = TAGGED_REG.captures(line) else {
            tracing::warn!(%line, "unhandled tagged line");
            return self.fail();
        };
        if &caps["tag"] != self.response.tag.as_str() {
            tracing::warn!(%line, expected = %self.response.tag, "completion for a different tag");
            return self.fail();
        }
        let Some(code) = ResponseCode::from_token(&caps["type"]) else {
            tracing::warn!(%line, "unknown completion type");
            return self.fail();
        };
        let data = caps.name("data").map_or_else(String::new, |m| m.as_str().to_string());
        self.response.tagged.push((code, data));
        LineStep::Complete
    }

    /// Scans a FETCH field region for `field value` pairs.
    ///
    /// NIL values are skipped; inline values are stored directly; a
    /// literal header `{N}` (N > 0) queues N octets and suspends the
    /// scan. A `{0}` header stores an empty buffer without suspending.
    fn scan_fields(&mut self, data: &str) -> FieldStep {
        for caps in PAIRED_FIELD_REG.captures_iter(data) {
            let Some(size) = caps.name("size") else {
                // NIL value.
                continue;
            };
            let Ok(size) = size.as_str().parse::<u64>() else {
                tracing::warn!(%data, "failed to parse FETCH literal size: not a number");
                self.response.error = true;
                return FieldStep::Failed;
            };
            let field = caps["field"].to_string();

            if let Some(inline) = caps.name("data") {
                self.store(field, inline.as_str().as_bytes());
            } else if size == 0 {
                self.store(field, b"");
            } else {
                self.bytes_to_read = size;
                self.current_field = field;
                return FieldStep::Literal;
            }
        }
        FieldStep::Inline
    }

    /// Consumes literal octets and interleaved field-header lines until
    /// the FETCH body closes with `)`.
    fn drain_raw(&mut self, cursor: &mut &[u8]) -> RawStep {
        loop {
            if self.bytes_to_read == 0 {
                let Some(line) = self.next_line(cursor) else {
                    return RawStep::NeedMore;
                };
                let text = String::from_utf8_lossy(&line);
                let line = text.trim();

                if line.starts_with(')') {
                    return RawStep::Finished;
                }
                match self.scan_fields(line) {
                    FieldStep::Inline => continue,
                    FieldStep::Literal => {}
                    FieldStep::Failed => return RawStep::Failed,
                }
            }

            let take = usize::try_from(self.bytes_to_read)
                .unwrap_or(usize::MAX)
                .min(cursor.len());
            let (octets, rest) = cursor.split_at(take);
            let field = self.current_field.clone();
            self.response
                .raw
                .entry(self.current_id)
                .or_default()
                .entry(field)
                .or_default()
                .extend_from_slice(octets);
            *cursor = rest;
            self.bytes_to_read -= take as u64;

            if self.bytes_to_read > 0 {
                return RawStep::NeedMore;
            }
        }
    }

    /// Stores one field buffer for the current message.
    fn store(&mut self, field: String, value: &[u8]) {
        self.response
            .raw
            .entry(self.current_id)
            .or_default()
            .insert(field, value.to_vec());
    }

    fn fail(&mut self) -> LineStep {
        self.response.error = true;
        LineStep::Failed
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

    fn complete(tag: &str, input: &[u8]) -> ParsedResponse {
        let mut parser = ResponseParser::new(tag);
        assert_eq!(parser.digest(input), Progress::Complete);
        parser.into_response()
    }

    #[test]
    fn test_tagged_only_response() {
        // A tagged line before any untagged line is a valid response.
        let resp = complete("A000", b"A000 OK NOOP completed\r\n");
        assert_eq!(
            resp.tagged,
            vec![(ResponseCode::Ok, "NOOP completed".to_string())]
        );
        assert!(resp.untagged.is_empty());
        assert!(!resp.error);
    }

    #[test]
    fn test_untagged_and_tagged() {
        let resp = complete(
            "C000",
            b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
              * LIST (\\HasChildren) \"/\" \"Sent\"\r\n\
              C000 OK LIST completed\r\n",
        );
        assert_eq!(resp.untagged.len(), 2);
        assert_eq!(resp.untagged[0].0, ResponseCode::List);
        assert_eq!(resp.untagged[0].1, "(\\HasNoChildren) \"/\" \"INBOX\"");
        assert_eq!(resp.tagged.len(), 1);
    }

    #[test]
    fn test_trailing_untagged() {
        let resp = complete(
            "B000",
            b"* 172 EXISTS\r\n* 1 RECENT\r\nB000 OK SELECT completed\r\n",
        );
        assert_eq!(
            resp.untagged_trailing,
            vec![
                (ResponseCode::Exists, "172".to_string()),
                (ResponseCode::Recent, "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_classification_precedence() {
        // `* EXPUNGE 10` carries a leading code and must land in
        // `untagged`; `* 10 EXPUNGE` has the code last and must land in
        // `untagged_trailing`.
        let resp = complete(
            "D000",
            b"* EXPUNGE 10\r\n* 10 EXPUNGE\r\nD000 OK done\r\n",
        );
        assert_eq!(resp.untagged, vec![(ResponseCode::Expunge, "10".to_string())]);
        assert_eq!(
            resp.untagged_trailing,
            vec![(ResponseCode::Expunge, "10".to_string())]
        );
    }

    #[test]
    fn test_fetch_precedence_over_untagged() {
        let resp = complete(
            "D000",
            b"* 1 FETCH (BODY[1] {3}\r\nhey)\r\nD000 OK FETCH completed\r\n",
        );
        assert!(resp.untagged.is_empty());
        assert!(resp.untagged_trailing.is_empty());
        assert_eq!(resp.raw[&1]["BODY[1]"], b"hey");
    }

    #[test]
    fn test_greeting_completes_on_untagged() {
        let mut parser = ResponseParser::new("CONNECT");
        assert_eq!(
            parser.digest(b"* OK IMAP4rev1 Service Ready\r\n"),
            Progress::Complete
        );
        let resp = parser.into_response();
        assert_eq!(
            resp.untagged,
            vec![(ResponseCode::Ok, "IMAP4rev1 Service Ready".to_string())]
        );
        assert!(resp.tagged.is_empty());
    }

    #[test]
    fn test_literal_spanning_crlf() {
        let resp = complete(
            "D000",
            b"* 1 FETCH (BODY[1] {12}\r\nHello\r\nWorld)\r\nD000 OK FETCH completed\r\n",
        );
        assert_eq!(resp.raw[&1]["BODY[1]"], b"Hello\r\nWorld");
    }

    #[test]
    fn test_literal_exact_octet_count() {
        // Exactly N octets go into the buffer even when the literal
        // itself ends with a CRLF, leaving `)` on its own line.
        let resp = complete(
            "D000",
            b"* 1 FETCH (BODY[1] {7}\r\nabc\r\nde)\r\nD000 OK FETCH completed\r\n",
        );
        assert_eq!(resp.raw[&1]["BODY[1]"], b"abc\r\nde");
        assert_eq!(resp.raw[&1]["BODY[1]"].len(), 7);
    }

    #[test]
    fn test_zero_length_literal() {
        // `{0}` stores an empty buffer and never reaches the
        // octet-consuming state; the body still closes on `)`.
        let resp = complete(
            "D000",
            b"* 1 FETCH (BODY[1] {0}\r\n)\r\nD000 OK FETCH completed\r\n",
        );
        assert_eq!(resp.raw[&1]["BODY[1]"], b"");
        assert_eq!(resp.tagged.len(), 1);
    }

    #[test]
    fn test_multiple_literals_one_message() {
        let resp = complete(
            "D000",
            b"* 2 FETCH (BODY[HEADER.FIELDS (CONTENT-TYPE)] {25}\r\n\
              Content-Type: text/plain\n \
              BODY[1] {5}\r\nhello)\r\n\
              D000 OK FETCH completed\r\n",
        );
        let fields = &resp.raw[&2];
        assert_eq!(
            fields["BODY[HEADER.FIELDS (CONTENT-TYPE)]"].len(),
            25
        );
        assert_eq!(fields["BODY[1]"], b"hello");
    }

    #[test]
    fn test_nil_fields_skipped() {
        let resp = complete(
            "D000",
            b"* 3 FETCH (BODY[1.MIME] NIL BODY[1] {2}\r\nok)\r\nD000 OK FETCH completed\r\n",
        );
        let fields = &resp.raw[&3];
        assert!(!fields.contains_key("BODY[1.MIME]"));
        assert_eq!(fields["BODY[1]"], b"ok");
    }

    #[test]
    fn test_inline_fetch_with_trailing_paren() {
        // An all-inline FETCH with its `)` on the opener line ends in
        // the same state as one whose `)` arrives on its own line.
        let resp = complete(
            "D000",
            b"* 4 FETCH (FLAGS (\\Seen))\r\nD000 OK FETCH completed\r\n",
        );
        assert!(!resp.error);
        assert_eq!(resp.tagged.len(), 1);
    }

    #[test]
    fn test_chunking_invariance() {
        // Byte-by-byte, line-by-line and whole-buffer feeds must yield
        // identical responses.
        let input: &[u8] = b"* 172 EXISTS\r\n\
              * OK [UNSEEN 12]\r\n\
              * 1 FETCH (BODY[1] {12}\r\nHello\r\nWorld)\r\n\
              B000 OK done\r\n";

        let whole = complete("B000", input);

        let mut by_byte = ResponseParser::new("B000");
        let mut progress = Progress::Incomplete;
        for chunk in input.chunks(1) {
            progress = by_byte.digest(chunk);
            assert_ne!(progress, Progress::Error);
        }
        assert_eq!(progress, Progress::Complete);
        assert_eq!(by_byte.into_response(), whole);

        let mut by_line = ResponseParser::new("B000");
        for chunk in input.split_inclusive(|&b| b == b'\n') {
            assert_ne!(by_line.digest(chunk), Progress::Error);
        }
        assert!(by_line.is_complete());
        assert_eq!(by_line.into_response(), whole);
    }

    #[test]
    fn test_incomplete_line_carries_over() {
        let mut parser = ResponseParser::new("A000");
        assert_eq!(parser.digest(b"A000 OK don"), Progress::Incomplete);
        assert_eq!(parser.digest(b"e\r\n"), Progress::Complete);
        assert_eq!(
            parser.into_response().tagged,
            vec![(ResponseCode::Ok, "done".to_string())]
        );
    }

    #[test]
    fn test_empty_input_is_error() {
        let mut parser = ResponseParser::new("A000");
        assert_eq!(parser.digest(b""), Progress::Error);
        assert!(parser.response().error);
        // The error flag is sticky.
        assert_eq!(parser.digest(b"A000 OK done\r\n"), Progress::Error);
    }

    #[test]
    fn test_unknown_response_type_is_error() {
        let mut parser = ResponseParser::new("A000");
        assert_eq!(parser.digest(b"* FROBNICATE hello\r\n"), Progress::Error);
        assert!(parser.response().error);
    }

    #[test]
    fn test_unhandled_line_is_error() {
        let mut parser = ResponseParser::new("A000");
        assert_eq!(parser.digest(b"Z999 OK wrong tag\r\n"), Progress::Error);
    }

    #[test]
    fn test_remainder_preserved_after_completion() {
        let mut parser = ResponseParser::new("A000");
        assert_eq!(
            parser.digest(b"A000 OK done\r\n* 3 EXISTS\r\n"),
            Progress::Complete
        );
        assert_eq!(parser.take_remainder(), b"* 3 EXISTS\r\n");
    }
}
