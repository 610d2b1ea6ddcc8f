// ABOUTME: STOMP frame modeling, the outbound encoder, and the incremental inbound parser
// ABOUTME: The parser is a byte-driven state machine mirroring the reference INIT/CMD/HDR/HDR_ESC/BODY table

use crate::codec::{self, CodecError};
use crate::header::{Header, HeaderStore};
use bytes::{Bytes, BytesMut};

/// Negotiated STOMP protocol version.
///
/// `Unknown` values received on the wire fall back to `V1_0`, matching `parse_version` in the
/// reference session engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V1_0,
    V1_1,
    V1_2,
}

impl ProtocolVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::V1_0 => "1.0",
            ProtocolVersion::V1_1 => "1.1",
            ProtocolVersion::V1_2 => "1.2",
        }
    }

    /// Parses a `version` header value, falling back to `V1_0` for anything unrecognized.
    pub fn parse(value: &str) -> ProtocolVersion {
        match value {
            "1.2" => ProtocolVersion::V1_2,
            "1.1" => ProtocolVersion::V1_1,
            _ => ProtocolVersion::V1_0,
        }
    }

    /// Whether headers are escaped on the wire at this version. The reference encoder escapes
    /// unconditionally; STOMP 1.0 does not call for escaping. See the open question in
    /// `SPEC_FULL.md` §9 — this crate gates escaping on version rather than replicate the bug.
    pub fn escapes_headers(self) -> bool {
        !matches!(self, ProtocolVersion::V1_0)
    }
}

/// The four inbound command tokens a broker may send.
const INBOUND_COMMANDS: [&str; 4] = ["CONNECTED", "MESSAGE", "RECEIPT", "ERROR"];

/// A fully parsed inbound frame, or the encoded form of an outbound one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: String,
    headers: HeaderStore,
    body: Bytes,
}

impl Frame {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decomposes the frame into its owned parts without cloning the body bytes (`Bytes` is a
    /// cheap refcounted slice), for callers that need to move headers/body into an event struct.
    pub fn into_parts(self) -> (String, HeaderStore, Bytes) {
        (self.command, self.headers, self.body)
    }
}

/// Builds and serializes one outbound frame.
///
/// Operations enforce the ordering preconditions from the frame codec design: a command must be
/// set before any header, and no header may be added once the body is set. The growable internal
/// buffer plays the role of the reference implementation's amortized 512-byte-chunk buffer; exact
/// growth increments are not part of the observable contract.
pub struct FrameBuilder {
    version: ProtocolVersion,
    buf: BytesMut,
    has_command: bool,
    has_body: bool,
}

impl FrameBuilder {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            buf: BytesMut::with_capacity(512),
            has_command: false,
            has_body: false,
        }
    }

    /// Writes `COMMAND\n`. Fails if the command is empty or already set.
    pub fn set_command(&mut self, command: &str) -> Result<(), CodecError> {
        if self.has_command {
            return Err(CodecError::InvalidCommand("command already set".into()));
        }
        if command.is_empty() {
            return Err(CodecError::InvalidCommand("empty command".into()));
        }
        self.buf.extend_from_slice(command.as_bytes());
        self.buf.extend_from_slice(b"\n");
        self.has_command = true;
        Ok(())
    }

    /// Writes `key:value\n`, escaping both sides when the negotiated version calls for it.
    pub fn add_header(&mut self, key: &str, value: &str) -> Result<(), CodecError> {
        if !self.has_command {
            return Err(CodecError::InvalidHeader("no command set".into()));
        }
        if self.has_body {
            return Err(CodecError::InvalidHeader("body already set".into()));
        }
        if key.is_empty() || value.is_empty() {
            return Err(CodecError::InvalidHeader("empty key or value".into()));
        }
        if self.version.escapes_headers() {
            self.buf.extend_from_slice(codec::escape(key).as_bytes());
            self.buf.extend_from_slice(b":");
            self.buf.extend_from_slice(codec::escape(value).as_bytes());
        } else {
            self.buf.extend_from_slice(key.as_bytes());
            self.buf.extend_from_slice(b":");
            self.buf.extend_from_slice(value.as_bytes());
        }
        self.buf.extend_from_slice(b"\n");
        Ok(())
    }

    /// Writes the header terminator, the raw body, and a trailing `NUL`.
    pub fn set_body(&mut self, body: &[u8]) -> Result<(), CodecError> {
        if !self.has_command {
            return Err(CodecError::InvalidBody("no command set".into()));
        }
        if self.has_body {
            return Err(CodecError::InvalidBody("body already set".into()));
        }
        self.buf.extend_from_slice(b"\n");
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(&[0u8]);
        self.has_body = true;
        Ok(())
    }

    /// Closes the frame, appending `\n\0` if no body was ever set, and returns the wire bytes.
    pub fn finalize(mut self) -> Result<Bytes, CodecError> {
        if !self.has_command {
            return Err(CodecError::InvalidCommand("no command set".into()));
        }
        if !self.has_body {
            self.buf.extend_from_slice(b"\n");
            self.buf.extend_from_slice(&[0u8]);
        }
        Ok(self.buf.freeze())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Cmd,
    Hdr,
    HdrEsc,
    Body,
    Done,
    Err,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscTarget {
    Key,
    Value,
}

/// Result of a completed parse: either a frame, or a bare heartbeat byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Frame(Frame),
    Heartbeat,
}

/// Byte-driven incremental STOMP frame parser.
///
/// Feed bytes one at a time with [`Parser::feed`]. `Ok(None)` means more bytes are needed;
/// `Ok(Some(outcome))` means a frame or heartbeat completed — call [`Parser::reset`] before
/// feeding the next frame. `Err` means the state machine reached its error state; the session
/// is not recoverable and must close.
pub struct Parser {
    state: State,
    offset: usize,
    cmd_buf: Vec<u8>,
    key_buf: Vec<u8>,
    val_buf: Vec<u8>,
    seen_colon: bool,
    line_nonempty: bool,
    esc_target: EscTarget,
    headers: HeaderStore,
    declared_len: Option<usize>,
    body_buf: Vec<u8>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Init,
            offset: 0,
            cmd_buf: Vec::new(),
            key_buf: Vec::new(),
            val_buf: Vec::new(),
            seen_colon: false,
            line_nonempty: false,
            esc_target: EscTarget::Key,
            headers: HeaderStore::new(),
            declared_len: None,
            body_buf: Vec::new(),
        }
    }

    /// Resets all accumulators to parse the next frame from a clean `INIT` state.
    pub fn reset(&mut self) {
        self.state = State::Init;
        self.cmd_buf.clear();
        self.key_buf.clear();
        self.val_buf.clear();
        self.seen_colon = false;
        self.line_nonempty = false;
        self.headers.clear();
        self.declared_len = None;
        self.body_buf.clear();
    }

    fn err(&mut self, reason: &str) -> CodecError {
        self.state = State::Err;
        CodecError::ProtocolError {
            offset: self.offset,
            reason: reason.to_string(),
        }
    }

    /// Decodes the accumulated key/value byte buffers as UTF-8 and pushes the finished header.
    /// Bytes are accumulated raw (not per-byte `char` conversion) so multi-byte UTF-8 sequences
    /// survive intact; decoding happens once, here, at the end of the line.
    fn finish_header_line(&mut self) -> Result<(), CodecError> {
        let key_bytes = std::mem::take(&mut self.key_buf);
        let val_bytes = std::mem::take(&mut self.val_buf);
        let key = match String::from_utf8(key_bytes) {
            Ok(k) => k,
            Err(_) => return Err(self.err("header key is not valid UTF-8")),
        };
        let value = match String::from_utf8(val_bytes) {
            Ok(v) => v,
            Err(_) => return Err(self.err("header value is not valid UTF-8")),
        };
        self.headers.push(Header::new(key, value));
        self.seen_colon = false;
        self.line_nonempty = false;
        Ok(())
    }

    fn current_buf(&mut self) -> &mut Vec<u8> {
        if self.seen_colon {
            &mut self.val_buf
        } else {
            &mut self.key_buf
        }
    }

    /// Feeds one byte into the state machine.
    pub fn feed(&mut self, byte: u8) -> Result<Option<ParseOutcome>, CodecError> {
        self.offset += 1;
        match self.state {
            State::Init => match byte {
                b'C' | b'E' | b'R' | b'M' => {
                    self.cmd_buf.push(byte);
                    self.state = State::Cmd;
                    Ok(None)
                }
                b'\n' => {
                    self.state = State::Done;
                    Ok(Some(ParseOutcome::Heartbeat))
                }
                _ => Ok(None),
            },
            State::Cmd => match byte {
                b'\r' => Ok(None),
                0 => Err(self.err("NUL in command")),
                b'\n' => {
                    let command = String::from_utf8_lossy(&self.cmd_buf).into_owned();
                    if INBOUND_COMMANDS.contains(&command.as_str()) {
                        self.cmd_buf = command.into_bytes();
                        self.state = State::Hdr;
                        Ok(None)
                    } else {
                        Err(self.err("unrecognized command"))
                    }
                }
                _ => {
                    self.cmd_buf.push(byte);
                    Ok(None)
                }
            },
            State::Hdr => match byte {
                0 => Err(self.err("NUL in headers")),
                b'\r' => Ok(None),
                b':' if !self.seen_colon => {
                    self.seen_colon = true;
                    self.line_nonempty = true;
                    Ok(None)
                }
                b'\n' => {
                    if self.line_nonempty {
                        self.finish_header_line()?;
                        Ok(None)
                    } else {
                        self.declared_len = self
                            .headers
                            .get("content-length")
                            .and_then(codec::parse_content_length);
                        self.state = State::Body;
                        Ok(None)
                    }
                }
                b'\\' => {
                    self.esc_target = if self.seen_colon {
                        EscTarget::Value
                    } else {
                        EscTarget::Key
                    };
                    self.state = State::HdrEsc;
                    Ok(None)
                }
                other => {
                    self.line_nonempty = true;
                    self.current_buf().push(other);
                    Ok(None)
                }
            },
            State::HdrEsc => {
                let resolved = match codec::resolve_escape(byte as char) {
                    Some(c) => c,
                    None => return Err(self.err("invalid escape sequence")),
                };
                match self.esc_target {
                    EscTarget::Key => self.key_buf.push(resolved as u8),
                    EscTarget::Value => self.val_buf.push(resolved as u8),
                }
                self.line_nonempty = true;
                self.state = State::Hdr;
                Ok(None)
            }
            State::Body => {
                if byte == 0 {
                    let done = match self.declared_len {
                        None => true,
                        Some(n) => self.body_buf.len() >= n,
                    };
                    if done {
                        let command = String::from_utf8_lossy(&self.cmd_buf).into_owned();
                        let frame = Frame {
                            command,
                            headers: std::mem::take(&mut self.headers),
                            body: Bytes::from(std::mem::take(&mut self.body_buf)),
                        };
                        self.state = State::Done;
                        Ok(Some(ParseOutcome::Frame(frame)))
                    } else {
                        self.body_buf.push(0);
                        Ok(None)
                    }
                } else {
                    self.body_buf.push(byte);
                    Ok(None)
                }
            }
            State::Done => Ok(None),
            State::Err => Err(self.err("parser previously entered error state")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(bytes: &[u8]) -> Result<ParseOutcome, CodecError> {
        let mut parser = Parser::new();
        for &b in bytes {
            if let Some(outcome) = parser.feed(b)? {
                return Ok(outcome);
            }
        }
        panic!("frame did not complete");
    }

    #[test]
    fn parses_connected_with_heartbeat_header() {
        let wire = b"CONNECTED\nversion:1.2\nheart-beat:1000,1000\n\n\0";
        match parse_all(wire).unwrap() {
            ParseOutcome::Frame(f) => {
                assert_eq!(f.command(), "CONNECTED");
                assert_eq!(f.headers().get("version"), Some("1.2"));
                assert_eq!(f.body(), b"");
            }
            ParseOutcome::Heartbeat => panic!("expected frame"),
        }
    }

    #[test]
    fn parses_bare_heartbeat() {
        assert_eq!(parse_all(b"\n").unwrap(), ParseOutcome::Heartbeat);
    }

    #[test]
    fn parses_content_length_body_containing_nul() {
        let mut wire = b"MESSAGE\ncontent-length:5\n\n".to_vec();
        wire.extend_from_slice(&[0x00, 0x01, 0x02, 0x00, 0x03]);
        wire.push(0);
        match parse_all(&wire).unwrap() {
            ParseOutcome::Frame(f) => {
                assert_eq!(f.body(), &[0x00, 0x01, 0x02, 0x00, 0x03]);
            }
            ParseOutcome::Heartbeat => panic!("expected frame"),
        }
    }

    #[test]
    fn parses_body_without_content_length_stops_at_nul() {
        let wire = b"ERROR\n\nboom\0";
        match parse_all(wire).unwrap() {
            ParseOutcome::Frame(f) => assert_eq!(f.body(), b"boom"),
            ParseOutcome::Heartbeat => panic!("expected frame"),
        }
    }

    #[test]
    fn header_escape_round_trips_through_parser() {
        let wire = b"MESSAGE\na\\cb:x\\ny\n\n\0";
        match parse_all(wire).unwrap() {
            ParseOutcome::Frame(f) => {
                assert_eq!(f.headers().get("a:b"), Some("x\ny"));
            }
            ParseOutcome::Heartbeat => panic!("expected frame"),
        }
    }

    #[test]
    fn parses_multi_byte_utf8_header_value_intact() {
        let wire = "MESSAGE\ndestination:caf\u{e9}\n\n\0".as_bytes().to_vec();
        match parse_all(&wire).unwrap() {
            ParseOutcome::Frame(f) => {
                assert_eq!(f.headers().get("destination"), Some("caf\u{e9}"));
            }
            ParseOutcome::Heartbeat => panic!("expected frame"),
        }
    }

    #[test]
    fn rejects_unrecognized_command() {
        let mut parser = Parser::new();
        let err = b"BOGUS\n"
            .iter()
            .find_map(|&b| parser.feed(b).err())
            .expect("expected protocol error");
        assert!(matches!(err, CodecError::ProtocolError { .. }));
    }

    #[test]
    fn encoder_escapes_headers_on_1_2() {
        let mut builder = FrameBuilder::new(ProtocolVersion::V1_2);
        builder.set_command("SEND").unwrap();
        builder.add_header("destination", "/q:a").unwrap();
        builder.set_body(b"hi").unwrap();
        let bytes = builder.finalize().unwrap();
        assert_eq!(&bytes[..], b"SEND\ndestination:/q\\ca\n\nhi\0");
    }

    #[test]
    fn encoder_finalizes_without_body() {
        let mut builder = FrameBuilder::new(ProtocolVersion::V1_2);
        builder.set_command("DISCONNECT").unwrap();
        let bytes = builder.finalize().unwrap();
        assert_eq!(&bytes[..], b"DISCONNECT\n\n\0");
    }

    #[test]
    fn encoder_rejects_header_before_command() {
        let mut builder = FrameBuilder::new(ProtocolVersion::V1_2);
        assert!(builder.add_header("a", "b").is_err());
    }
}
