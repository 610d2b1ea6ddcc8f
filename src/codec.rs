// ABOUTME: Wire-level STOMP concerns separated from frame modeling: header escaping and codec errors
// ABOUTME: Mirrors the escape table in section 6.1 of the protocol (CR, LF, colon, backslash)

use thiserror::Error;

/// Errors produced while encoding or parsing STOMP frames.
///
/// `Incomplete` is not a protocol failure: it signals that the parser needs more bytes and is
/// handled as a normal control-flow outcome by [`crate::frame::Parser`], never surfaced to
/// application code as an error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Not enough bytes buffered yet to complete the frame.
    #[error("incomplete frame")]
    Incomplete,

    /// The command was empty, or a command was set twice on the same builder.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A header was added with an empty key or value, before a command was set, or after the
    /// body was already finalized.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The body was set twice, or set before a command.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The parser's byte-driven state machine reached its error state.
    #[error("protocol error at byte offset {offset}: {reason}")]
    ProtocolError { offset: usize, reason: String },

    /// The frame's command token was not one of the four recognized inbound commands.
    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Escapes a header key or value for the wire per the 1.1/1.2 escape table.
///
/// `\r` -> `\r`, `\n` -> `\n`, `:` -> `\c`, `\` -> `\\`. Version 1.0 does not escape; callers
/// gate this on the negotiated protocol version (see `Frame::add_header_for_version`).
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

/// Resolves a single escape-sequence trailing character (the character after a `\`) to its raw
/// value. Shared by [`unescape`] and the parser's `HDR_ESC` state so the two escape tables, one
/// string-at-a-time and one byte-at-a-time, cannot drift apart.
pub(crate) fn resolve_escape(c: char) -> Option<char> {
    match c {
        'r' => Some('\r'),
        'n' => Some('\n'),
        'c' => Some(':'),
        '\\' => Some('\\'),
        _ => None,
    }
}

/// Reverses [`escape`]. Returns `None` if a backslash is followed by any character other than
/// `r`, `n`, `c`, or `\`, matching the parser's `HDR_ESC` error transition.
pub fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next().and_then(resolve_escape) {
                Some(resolved) => out.push(resolved),
                None => return None,
            }
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

/// Parses the `content-length` header value as a nonnegative decimal integer.
///
/// A malformed value is treated the same as an absent header (the body falls back to
/// `NUL`-terminated reading), matching `parse_content_length` in the reference parser.
pub fn parse_content_length(value: &str) -> Option<usize> {
    value.parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_round_trips_all_four_sequences() {
        let original = "a:b\\c\r\nd";
        let escaped = escape(original);
        assert_eq!(unescape(&escaped).as_deref(), Some(original));
    }

    #[test]
    fn escape_colon_produces_literal_c_sequence() {
        assert_eq!(escape("a:b"), "a\\cb");
    }

    #[test]
    fn unescape_rejects_unknown_sequence() {
        assert_eq!(unescape("a\\xb"), None);
    }

    #[test]
    fn content_length_ignores_garbage() {
        assert_eq!(parse_content_length("5"), Some(5));
        assert_eq!(parse_content_length("-1"), None);
        assert_eq!(parse_content_length("abc"), None);
    }
}
