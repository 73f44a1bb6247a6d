//! Text codec: [`Frame`] to wire text and back.
//!
//! # Wire format
//!
//! ```text
//! COMMAND\n
//! name:value\n        (zero or more, system headers then user headers)
//! content-length:N\n  (added when a body is present, unless suppressed)
//! \n
//! body                (verbatim, optional)
//! ```
//!
//! The codec adds no frame terminator. Frame boundaries (the NUL octet on a
//! raw socket, one message per WebSocket text frame) belong to the transport.
//!
//! # `content-length`
//!
//! A header literally named `content-length` is never emitted. It acts as a
//! switch: the value `false` suppresses the computed length, anything else
//! re-enables it, and the last one seen wins. Existing callers rely on this;
//! new code should set [`Frame::suppress_content_length`] instead.
//!
//! The computed length counts bytes of the UTF-8 body.

use std::fmt::Write as _;

use crate::{
    errors::{ParseError, Result},
    frame::Frame,
    header::{Header, HeaderSet},
};

/// Name of the header that carries the body length.
pub const CONTENT_LENGTH: &str = "content-length";

/// Render a frame as wire text.
pub fn marshal(frame: &Frame) -> String {
    let mut out = String::with_capacity(estimate_len(frame));
    marshal_into(frame, &mut out);
    out
}

/// Render a frame, appending to `out`.
pub fn marshal_into(frame: &Frame, out: &mut String) {
    out.push_str(&frame.command);
    out.push('\n');

    let legacy_skip = write_headers(&frame.system_headers, out, false);
    let legacy_skip = write_headers(&frame.user_headers, out, legacy_skip);

    if let Some(body) = &frame.body
        && !(frame.suppress_content_length || legacy_skip)
    {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{CONTENT_LENGTH}:{}", body.len());
    }

    out.push('\n');

    if let Some(body) = &frame.body {
        out.push_str(body);
    }
}

/// Write every header except `content-length`, returning the updated
/// suppression switch.
fn write_headers(headers: &HeaderSet, out: &mut String, mut skip: bool) -> bool {
    for Header { name, value } in headers {
        if name == CONTENT_LENGTH {
            skip = value == "false";
            continue;
        }

        out.push_str(name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }

    skip
}

fn estimate_len(frame: &Frame) -> usize {
    let headers: usize = frame
        .system_headers
        .iter()
        .chain(frame.user_headers.iter())
        .map(|h| h.name.len() + h.value.len() + 2)
        .sum();
    let body = frame.body.as_ref().map_or(0, |b| b.len() + CONTENT_LENGTH.len() + 22);

    frame.command.len() + headers + body + 2
}

/// Parse wire text into a frame.
///
/// Line 1 is the command. Following lines up to the first empty line are
/// headers, split at the first `:` only. Everything after the empty line is
/// the body, verbatim. If the text ends before an empty line the frame has
/// no body; if it ends right after one the body is empty.
///
/// All headers land in [`Frame::system_headers`]; the codec does not try to
/// tell protocol headers from user headers.
///
/// # Errors
///
/// - [`ParseError::MissingCommand`] for empty input
/// - [`ParseError::MissingSeparator`] for a header line without `:`
pub fn unmarshal(text: &str) -> Result<Frame> {
    if text.is_empty() {
        return Err(ParseError::MissingCommand);
    }

    let (command, mut rest) = split_line(text);
    let mut headers = HeaderSet::new();
    let mut body = None;
    let mut line = 1;

    while let Some(current) = rest {
        let (content, next) = split_line(current);
        line += 1;

        if content.is_empty() {
            body = next;
            break;
        }

        let (name, value) =
            content.split_once(':').ok_or(ParseError::MissingSeparator { line })?;
        headers.push(name, value);

        rest = next;
    }

    Ok(Frame {
        command: command.to_string(),
        system_headers: headers,
        user_headers: HeaderSet::new(),
        body: body.map(str::to_string),
        suppress_content_length: false,
    })
}

/// Split off the first line. The remainder is `None` when there was no
/// newline at all.
fn split_line(text: &str) -> (&str, Option<&str>) {
    match text.split_once('\n') {
        Some((line, rest)) => (line, Some(rest)),
        None => (text, None),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::frame::Command;

    #[test]
    fn marshal_connect_frame() {
        let frame = Frame::for_command(Command::Connect)
            .header("accept-version", "1.1,1.0")
            .header("heart-beat", "10000,10000")
            .user_headers(HeaderSet::new().with("Authorization", "token"));

        assert_eq!(
            marshal(&frame),
            "CONNECT\naccept-version:1.1,1.0\nheart-beat:10000,10000\nAuthorization:token\n\n"
        );
    }

    #[test]
    fn marshal_adds_content_length_for_body() {
        let frame = Frame::for_command(Command::Send).header("destination", "/queue/a").body("hello");

        insta::assert_snapshot!(marshal(&frame), @r"
        SEND
        destination:/queue/a
        content-length:5

        hello
        ");
    }

    #[test]
    fn content_length_counts_bytes() {
        let frame = Frame::for_command(Command::Send).body("ñandú");

        assert_eq!(marshal(&frame), "SEND\ncontent-length:7\n\nñandú");
    }

    #[test]
    fn legacy_content_length_false_suppresses_header() {
        let frame = Frame::for_command(Command::Send)
            .header("destination", "/topic/t")
            .header(CONTENT_LENGTH, "false")
            .body("{}");

        assert_eq!(marshal(&frame), "SEND\ndestination:/topic/t\n\n{}");
    }

    #[test]
    fn user_content_length_overrides_system_switch() {
        let frame = Frame::for_command(Command::Send)
            .header(CONTENT_LENGTH, "false")
            .user_headers(HeaderSet::new().with(CONTENT_LENGTH, "true"))
            .body("abc");

        assert_eq!(marshal(&frame), "SEND\ncontent-length:3\n\nabc");
    }

    #[test]
    fn explicit_suppression_flag() {
        let frame = Frame::for_command(Command::Send).body("abc").without_content_length();

        assert_eq!(marshal(&frame), "SEND\n\nabc");
    }

    #[test]
    fn content_length_header_dropped_without_body() {
        let frame = Frame::for_command(Command::Error)
            .header("message", "AccessDeniedException")
            .header(CONTENT_LENGTH, "0");

        assert_eq!(marshal(&frame), "ERROR\nmessage:AccessDeniedException\n\n");
    }

    #[test]
    fn unmarshal_bare_connected() {
        let frame = unmarshal("CONNECTED\n\n").unwrap();

        assert_eq!(frame.command, "CONNECTED");
        assert!(frame.system_headers.is_empty());
        assert!(frame.user_headers.is_empty());
        assert_eq!(frame.body.as_deref(), Some(""));
    }

    #[test]
    fn unmarshal_without_blank_line_has_no_body() {
        let frame = unmarshal("CONNECTED\n").unwrap();
        assert_eq!(frame.command, "CONNECTED");
        assert_eq!(frame.body, None);

        let frame = unmarshal("ERROR\nmessage:AccessDeniedException\ncontent-length:0\n").unwrap();
        assert_eq!(frame.system_headers.get("message"), Some("AccessDeniedException"));
        assert_eq!(frame.system_headers.get(CONTENT_LENGTH), Some("0"));
        assert_eq!(frame.body, None);
    }

    #[test]
    fn unmarshal_command_only() {
        let frame = unmarshal("RECEIPT").unwrap();

        assert_eq!(frame.command, "RECEIPT");
        assert!(frame.system_headers.is_empty());
        assert_eq!(frame.body, None);
    }

    #[test]
    fn unmarshal_splits_at_first_colon() {
        let frame = unmarshal("MESSAGE\nmessage-id:urn:uuid:1234\n\n").unwrap();

        assert_eq!(frame.system_headers.get("message-id"), Some("urn:uuid:1234"));
    }

    #[test]
    fn unmarshal_keeps_body_verbatim() {
        let text = "MESSAGE\nsubscription:sub-0\nmessage-id:001\ncontent-type:json\n\nel mensaje\n";
        let frame = unmarshal(text).unwrap();

        assert_eq!(frame.system_headers.len(), 3);
        assert_eq!(frame.body.as_deref(), Some("el mensaje\n"));
    }

    #[test]
    fn unmarshal_body_may_contain_blank_lines() {
        let frame = unmarshal("MESSAGE\n\nline one\n\nline two").unwrap();

        assert_eq!(frame.body.as_deref(), Some("line one\n\nline two"));
    }

    #[test]
    fn unmarshal_rejects_header_without_separator() {
        let err = unmarshal("MESSAGE\nsubscription:sub-0\nbroken\n\n").unwrap_err();

        assert_eq!(err, ParseError::MissingSeparator { line: 3 });
    }

    #[test]
    fn unmarshal_rejects_empty_input() {
        assert_eq!(unmarshal(""), Err(ParseError::MissingCommand));
    }

    #[test]
    fn unmarshal_accepts_many_headers() {
        let mut text = String::from("MESSAGE\n");
        for i in 0..500 {
            text.push_str(&format!("h{i}:v{i}\n"));
        }
        text.push('\n');

        let frame = unmarshal(&text).unwrap();

        assert_eq!(frame.system_headers.len(), 500);
        assert_eq!(frame.system_headers.get("h499"), Some("v499"));
    }

    fn header_strategy() -> impl Strategy<Value = Header> {
        ("[a-z][a-z0-9-]{0,11}", "[^\n]{0,16}")
            .prop_filter("content-length is a codec switch", |(name, _)| name != CONTENT_LENGTH)
            .prop_map(|(name, value)| Header::new(name, value))
    }

    fn frame_strategy() -> impl Strategy<Value = Frame> {
        (
            "[A-Z]{1,12}",
            prop::collection::vec(header_strategy(), 0..8),
            prop::collection::vec(header_strategy(), 0..8),
            any::<String>(),
        )
            .prop_map(|(command, system, user, body)| {
                let mut frame =
                    Frame::new(command).user_headers(user.into_iter().collect()).body(body);
                frame.system_headers.extend(system);
                frame
            })
    }

    proptest! {
        #[test]
        fn marshal_unmarshal_preserves_frame(frame in frame_strategy()) {
            let parsed = unmarshal(&marshal(&frame)).unwrap();

            let expected: Vec<&Header> =
                frame.system_headers.iter().chain(frame.user_headers.iter()).collect();
            let (content_length, headers) = parsed.system_headers.as_slice().split_last().unwrap();

            prop_assert_eq!(&parsed.command, &frame.command);
            prop_assert_eq!(headers.iter().collect::<Vec<_>>(), expected);
            prop_assert_eq!(&content_length.name, CONTENT_LENGTH);
            prop_assert_eq!(content_length.value.parse::<usize>().unwrap(), frame.body_str().len());
            prop_assert_eq!(parsed.body, frame.body);
        }

        #[test]
        fn unmarshal_never_panics(text in any::<String>()) {
            let _ = unmarshal(&text);
        }
    }
}
