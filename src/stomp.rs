//! Minimal STOMP 1.2 frame codec.
//!
//! Only the subset needed by a subscribing/publishing client is modelled:
//! `CONNECT`, `SUBSCRIBE`, `UNSUBSCRIBE`, `SEND` and `DISCONNECT` outbound;
//! `CONNECTED`, `MESSAGE`, `RECEIPT` and `ERROR` inbound.
//!
//! A single transport message may carry several frames back to back, and a
//! message consisting only of end-of-line characters is a heartbeat.

use std::fmt;
use std::time::Duration;

use crate::error::{QuizClientError, Result};

/// The heartbeat payload: a single EOL.
pub const HEARTBEAT: &str = "\n";

/// STOMP frame commands understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompCommand {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl StompCommand {
    fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Send => "SEND",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    fn parse(line: &str) -> Result<Self> {
        Ok(match line {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "SEND" => Self::Send,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "DISCONNECT" => Self::Disconnect,
            other => {
                return Err(QuizClientError::Protocol(format!(
                    "unknown STOMP command {other:?}"
                )))
            }
        })
    }

    /// `CONNECT` and `CONNECTED` headers are transmitted without escaping.
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: StompCommand,
    /// Headers in wire order. Repeated names are kept; the first one wins on lookup.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the frame body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize the frame, including the trailing NUL.
    ///
    /// A `content-length` header is added for non-empty bodies unless one is
    /// already present.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.header("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Parse every frame contained in one transport message.
///
/// Leading and inter-frame EOLs are heartbeats and are skipped, so a pure
/// heartbeat message yields an empty vector.
///
/// # Errors
///
/// Returns [`QuizClientError::Protocol`] when a frame is truncated, names an
/// unknown command, or carries an invalid header escape.
pub fn parse_message(text: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            break;
        }
        let (frame, remaining) = parse_frame(rest)?;
        frames.push(frame);
        rest = remaining;
    }
    Ok(frames)
}

fn parse_frame(input: &str) -> Result<(Frame, &str)> {
    let (head, after_head) = split_head(input)
        .ok_or_else(|| QuizClientError::Protocol("frame is missing its header terminator".into()))?;

    let mut lines = head.lines();
    let command_line = lines
        .next()
        .ok_or_else(|| QuizClientError::Protocol("empty frame".into()))?;
    let command = StompCommand::parse(command_line.trim_end_matches('\r'))?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        let (name, value) = line.split_once(':').ok_or_else(|| {
            QuizClientError::Protocol(format!("malformed header line {line:?}"))
        })?;
        if escape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| QuizClientError::Protocol(format!("bad content-length {v:?}")))
        })
        .transpose()?;

    let truncated = || QuizClientError::Protocol("frame body is truncated".into());
    let (body, remaining) = match content_length {
        Some(len) => {
            let body = after_head.get(..len).ok_or_else(truncated)?;
            let tail = after_head.get(len..).ok_or_else(truncated)?;
            let tail = tail.strip_prefix('\0').ok_or_else(truncated)?;
            (body, tail)
        }
        None => {
            let (body, tail) = after_head.split_once('\0').ok_or_else(truncated)?;
            (body, tail)
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        remaining,
    ))
}

/// Split at the blank line ending the header block, accepting LF or CRLF.
fn split_head(input: &str) -> Option<(&str, &str)> {
    let lf = input.find("\n\n").map(|i| (i, 2));
    let crlf = input.find("\r\n\r\n").map(|i| (i, 4));
    let (at, sep) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    Some((input.get(..at)?, input.get(at + sep..)?))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(QuizClientError::Protocol(format!(
                    "invalid header escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

/// Format the client's `heart-beat` header value (`<outgoing ms>,<incoming ms>`).
pub fn heartbeat_header(outgoing: Duration, incoming: Duration) -> String {
    format!("{},{}", outgoing.as_millis(), incoming.as_millis())
}

/// Negotiated heartbeat intervals; a zero duration means disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    /// How often the client must send something.
    pub outgoing: Duration,
    /// How often the broker promised to send something.
    pub incoming: Duration,
}

impl Heartbeat {
    /// Combine the client's wishes with the broker's `heart-beat` header from `CONNECTED`.
    ///
    /// A missing or malformed header disables heartbeats in both directions.
    pub fn negotiate(outgoing: Duration, incoming: Duration, server: Option<&str>) -> Self {
        let Some((sx, sy)) = server.and_then(|v| {
            let (x, y) = v.split_once(',')?;
            Some((x.trim().parse::<u64>().ok()?, y.trim().parse::<u64>().ok()?))
        }) else {
            return Self::default();
        };
        let pick = |ours: Duration, theirs: u64| {
            if ours.is_zero() || theirs == 0 {
                Duration::ZERO
            } else {
                ours.max(Duration::from_millis(theirs))
            }
        };
        Self {
            outgoing: pick(outgoing, sy),
            incoming: pick(incoming, sx),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn encodes_send_with_content_length() {
        let frame = Frame::new(StompCommand::Send)
            .with_header("destination", "/app/quiz/7/command")
            .with_body(r#"{"type":"PAUSE"}"#);
        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/quiz/7/command\ncontent-length:16\n\n{\"type\":\"PAUSE\"}\0"
        );
    }

    #[test]
    fn connect_headers_are_not_escaped() {
        let frame = Frame::new(StompCommand::Connect).with_header("accessCode", "a:b");
        assert!(frame.encode().contains("accessCode:a:b\n"));
    }

    #[test]
    fn subscribe_headers_are_escaped() {
        let frame = Frame::new(StompCommand::Subscribe).with_header("id", "x:y\nz");
        assert!(frame.encode().contains("id:x\\cy\\nz\n"));
    }

    #[test]
    fn parses_message_frame_without_content_length() {
        let text = "MESSAGE\nsubscription:sub-0\ndestination:/topic/quiz/1/state\n\n{\"state\":\"LOBBY\"}\0";
        let frames = parse_message(text).unwrap();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.command, StompCommand::Message);
        assert_eq!(frame.header("subscription"), Some("sub-0"));
        assert_eq!(frame.body, "{\"state\":\"LOBBY\"}");
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let text = "MESSAGE\ncontent-length:3\n\na\0b\0";
        let frames = parse_message(text).unwrap();
        assert_eq!(frames[0].body, "a\0b");
    }

    #[test]
    fn parses_crlf_and_multiple_frames() {
        let text = "\r\nCONNECTED\r\nversion:1.2\r\nheart-beat:0,0\r\n\r\n\0\nRECEIPT\nreceipt-id:1\n\n\0\n";
        let frames = parse_message(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, StompCommand::Connected);
        assert_eq!(frames[0].header("version"), Some("1.2"));
        assert_eq!(frames[1].header("receipt-id"), Some("1"));
    }

    #[test]
    fn heartbeat_message_yields_no_frames() {
        assert!(parse_message("\n").unwrap().is_empty());
        assert!(parse_message("\r\n\r\n").unwrap().is_empty());
    }

    #[test]
    fn header_escapes_are_decoded() {
        let text = "ERROR\nmessage:bad\\cthing\\nhere\n\n\0";
        let frames = parse_message(text).unwrap();
        assert_eq!(frames[0].header("message"), Some("bad:thing\nhere"));
    }

    #[test]
    fn first_repeated_header_wins() {
        let text = "MESSAGE\nfoo:1\nfoo:2\n\n\0";
        let frames = parse_message(text).unwrap();
        assert_eq!(frames[0].header("foo"), Some("1"));
    }

    #[test]
    fn rejects_truncated_and_unknown_frames() {
        assert!(parse_message("MESSAGE\nfoo:1\n\nbody-without-nul").is_err());
        assert!(parse_message("BOGUS\n\n\0").is_err());
        assert!(parse_message("MESSAGE\nno-colon\n\n\0").is_err());
        assert!(parse_message("MESSAGE\ncontent-length:99\n\nab\0").is_err());
        assert!(parse_message("MESSAGE\nx:bad\\q\n\n\0").is_err());
        assert!(parse_message("not a frame at all").is_err());
    }

    #[test]
    fn heartbeat_negotiation_takes_the_slower_side() {
        let ten = Duration::from_secs(10);
        let hb = Heartbeat::negotiate(ten, ten, Some("20000,5000"));
        assert_eq!(hb.outgoing, ten);
        assert_eq!(hb.incoming, Duration::from_secs(20));
    }

    #[test]
    fn heartbeat_negotiation_disables_on_zero_or_missing() {
        let ten = Duration::from_secs(10);
        assert_eq!(Heartbeat::negotiate(ten, ten, Some("0,0")), Heartbeat::default());
        assert_eq!(Heartbeat::negotiate(ten, ten, None), Heartbeat::default());
        assert_eq!(Heartbeat::negotiate(ten, ten, Some("junk")), Heartbeat::default());
        let hb = Heartbeat::negotiate(Duration::ZERO, ten, Some("10000,10000"));
        assert_eq!(hb.outgoing, Duration::ZERO);
        assert_eq!(hb.incoming, ten);
    }

    #[test]
    fn heartbeat_header_is_in_millis() {
        assert_eq!(
            heartbeat_header(Duration::from_secs(10), Duration::from_millis(2500)),
            "10000,2500"
        );
    }
}
