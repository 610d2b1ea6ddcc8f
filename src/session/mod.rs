// ABOUTME: The STOMP protocol state machine driving a single TCP connection end to end
// ABOUTME: Version negotiation, heartbeat scheduling, command construction, inbound dispatch, the event loop

pub mod builder;
pub mod error;
pub mod heartbeat;
pub mod types;

pub use builder::SessionBuilder;
pub use error::{last_error, SessionError, SessionResult};
pub use types::{ConnectOptions, SendBuilder};

use crate::connection::Connection;
use crate::frame::{Frame, FrameBuilder, ParseOutcome, Parser, ProtocolVersion};
use crate::header::{Header, HeaderStore};
use bytes::Bytes;
use error::record;
use heartbeat::{parse_heart_beat, HeartbeatState};
use std::time::Instant;
use tracing::{debug, warn};

const ACK_MODES: [&str; 3] = ["auto", "client", "client-individual"];

/// Headers delivered with a `CONNECTED` frame.
#[derive(Debug, Clone)]
pub struct ConnectedEvent {
    pub headers: HeaderStore,
}

/// Headers and body delivered with a `MESSAGE` frame.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub headers: HeaderStore,
    pub body: Bytes,
}

/// Headers and body delivered with an `ERROR` frame.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub headers: HeaderStore,
    pub body: Bytes,
}

/// Headers delivered with a `RECEIPT` frame.
#[derive(Debug, Clone)]
pub struct ReceiptEvent {
    pub headers: HeaderStore,
}

type ConnectedCallback = Box<dyn FnMut(&mut Session, &ConnectedEvent)>;
type MessageCallback = Box<dyn FnMut(&mut Session, &MessageEvent)>;
type ErrorCallback = Box<dyn FnMut(&mut Session, &ErrorEvent)>;
type ReceiptCallback = Box<dyn FnMut(&mut Session, &ReceiptEvent)>;
type TickCallback = Box<dyn FnMut(&mut Session)>;

/// Opaque user context in the reference API becomes ordinary closure capture here: there is no
/// `ctx: *mut c_void` field, because a Rust closure already owns whatever state it needs.
#[derive(Default)]
struct Callbacks {
    connected: Option<ConnectedCallback>,
    message: Option<MessageCallback>,
    error: Option<ErrorCallback>,
    receipt: Option<ReceiptCallback>,
    tick: Option<TickCallback>,
}

/// One STOMP session over one TCP connection.
///
/// Single-threaded and cooperative: every method here is expected to be called either before
/// [`Session::run`] starts, or from within a callback invoked by it. There is no internal
/// synchronization and no support for concurrent access from multiple threads.
pub struct Session {
    conn: Connection,
    version: ProtocolVersion,
    heartbeat: HeartbeatState,
    next_sub_id: i32,
    running: bool,
    connected: bool,
    callbacks: Callbacks,
    parser: Parser,
}

impl Session {
    /// Wraps an already-connected transport. Establishing the TCP connection itself is treated
    /// as an external collaborator — see [`SessionBuilder::connect`] for the common case.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            version: ProtocolVersion::V1_0,
            heartbeat: HeartbeatState::new(),
            next_sub_id: 1,
            running: false,
            connected: false,
            callbacks: Callbacks::default(),
            parser: Parser::new(),
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Clears the running flag; the event loop exits after completing its current pass. Called
    /// from within a callback, this is the only supported way to stop [`Session::run`].
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn on_connected<F>(&mut self, f: F)
    where
        F: FnMut(&mut Session, &ConnectedEvent) + 'static,
    {
        self.callbacks.connected = Some(Box::new(f));
    }

    pub fn on_message<F>(&mut self, f: F)
    where
        F: FnMut(&mut Session, &MessageEvent) + 'static,
    {
        self.callbacks.message = Some(Box::new(f));
    }

    pub fn on_error<F>(&mut self, f: F)
    where
        F: FnMut(&mut Session, &ErrorEvent) + 'static,
    {
        self.callbacks.error = Some(Box::new(f));
    }

    pub fn on_receipt<F>(&mut self, f: F)
    where
        F: FnMut(&mut Session, &ReceiptEvent) + 'static,
    {
        self.callbacks.receipt = Some(Box::new(f));
    }

    /// Registers the tick callback, invoked exactly once per event loop pass.
    pub fn on_tick<F>(&mut self, f: F)
    where
        F: FnMut(&mut Session) + 'static,
    {
        self.callbacks.tick = Some(Box::new(f));
    }

    pub fn remove_connected_callback(&mut self) {
        self.callbacks.connected = None;
    }

    pub fn remove_message_callback(&mut self) {
        self.callbacks.message = None;
    }

    pub fn remove_error_callback(&mut self) {
        self.callbacks.error = None;
    }

    pub fn remove_receipt_callback(&mut self) {
        self.callbacks.receipt = None;
    }

    pub fn remove_tick_callback(&mut self) {
        self.callbacks.tick = None;
    }

    fn write_headers(
        &mut self,
        command: &str,
        headers: &[Header],
        body: Option<&[u8]>,
    ) -> SessionResult<()> {
        let mut builder = FrameBuilder::new(self.version);
        builder
            .set_command(command)
            .map_err(|e| record(SessionError::from(e)))?;
        for h in headers {
            builder
                .add_header(&h.key, &h.value)
                .map_err(|e| record(SessionError::from(e)))?;
        }
        if let Some(b) = body {
            builder
                .set_body(b)
                .map_err(|e| record(SessionError::from(e)))?;
        }
        let bytes = builder
            .finalize()
            .map_err(|e| record(SessionError::from(e)))?;
        self.conn.write_frame(&bytes).map_err(|e| {
            self.running = false;
            record(SessionError::Io(e))
        })?;
        self.heartbeat.note_write();
        Ok(())
    }

    /// Parses the optional `heart-beat` header, stores it as the requested interval pair, and
    /// writes the `CONNECT` frame with every given header verbatim. The TCP connection must
    /// already be established (see [`Session::new`]).
    pub fn connect(&mut self, headers: Vec<Header>) -> SessionResult<()> {
        if let Some(value) = headers.iter().find(|h| h.key == "heart-beat") {
            match parse_heart_beat(&value.value) {
                Some((cx, cy)) => self.heartbeat.set_requested(cx, cy),
                None => {
                    return Err(record(SessionError::InvalidArgument(format!(
                        "malformed heart-beat header: {}",
                        value.value
                    ))))
                }
            }
        }
        self.write_headers("CONNECT", &headers, None)
    }

    pub fn disconnect(&mut self, headers: Vec<Header>) -> SessionResult<()> {
        self.write_headers("DISCONNECT", &headers, None)
    }

    /// Requires `destination`. Validates `ack` if present, else defaults it to `auto`. Generates
    /// a session-scoped `id` if absent (wrapping from `i32::MAX` back to 1) and returns it;
    /// returns `0` when the caller supplied their own `id`, matching the ambiguity the reference
    /// implementation's return value carries (see `SPEC_FULL.md`'s open question on this).
    pub fn subscribe(&mut self, headers: Vec<Header>) -> SessionResult<i32> {
        if !headers.iter().any(|h| h.key == "destination") {
            return Err(record(SessionError::InvalidArgument(
                "subscribe requires a destination header".into(),
            )));
        }
        let has_ack = if let Some(ack) = headers.iter().find(|h| h.key == "ack") {
            if !ACK_MODES.contains(&ack.value.as_str()) {
                return Err(record(SessionError::InvalidArgument(format!(
                    "invalid ack mode: {}",
                    ack.value
                ))));
            }
            true
        } else {
            false
        };

        // id and ack are generated ahead of the caller's own headers, matching the reference's
        // frame_hdr_add(id)/frame_hdr_add(ack)/frame_hdrs_add(caller) write order.
        let mut out = Vec::with_capacity(headers.len() + 2);
        let returned_id = if headers.iter().any(|h| h.key == "id") {
            0
        } else {
            let id = self.next_sub_id;
            self.next_sub_id = if id == i32::MAX { 1 } else { id + 1 };
            out.push(Header::new("id", id.to_string()));
            id
        };
        if !has_ack {
            out.push(Header::new("ack", "auto"));
        }
        out.extend(headers);

        self.write_headers("SUBSCRIBE", &out, None)?;
        Ok(returned_id)
    }

    /// A nonzero `client_id` overrides any `id` header. 1.0 requires one of
    /// `destination`/`id`/`client_id`; 1.1+ requires `id` or `client_id`.
    pub fn unsubscribe(&mut self, client_id: i32, mut headers: Vec<Header>) -> SessionResult<()> {
        if client_id != 0 {
            headers.retain(|h| h.key != "id");
            headers.push(Header::new("id", client_id.to_string()));
        }
        let has_destination = headers.iter().any(|h| h.key == "destination");
        let has_id = headers.iter().any(|h| h.key == "id");
        let satisfied = match self.version {
            ProtocolVersion::V1_0 => has_destination || has_id,
            ProtocolVersion::V1_1 | ProtocolVersion::V1_2 => has_id,
        };
        if !satisfied {
            return Err(record(SessionError::InvalidArgument(
                "unsubscribe requires destination/id (1.0) or id (1.1+)".into(),
            )));
        }
        self.write_headers("UNSUBSCRIBE", &headers, None)
    }

    fn require_transaction(&mut self, command: &str, headers: Vec<Header>) -> SessionResult<()> {
        if !headers.iter().any(|h| h.key == "transaction") {
            return Err(record(SessionError::InvalidArgument(format!(
                "{command} requires a transaction header"
            ))));
        }
        self.write_headers(command, &headers, None)
    }

    pub fn begin(&mut self, headers: Vec<Header>) -> SessionResult<()> {
        self.require_transaction("BEGIN", headers)
    }

    pub fn abort(&mut self, headers: Vec<Header>) -> SessionResult<()> {
        self.require_transaction("ABORT", headers)
    }

    pub fn commit(&mut self, headers: Vec<Header>) -> SessionResult<()> {
        self.require_transaction("COMMIT", headers)
    }

    /// 1.2 requires `id`; 1.1 requires `message-id` and `subscription`; 1.0 requires `message-id`.
    pub fn ack(&mut self, headers: Vec<Header>) -> SessionResult<()> {
        let satisfied = match self.version {
            ProtocolVersion::V1_2 => headers.iter().any(|h| h.key == "id"),
            ProtocolVersion::V1_1 => {
                headers.iter().any(|h| h.key == "message-id")
                    && headers.iter().any(|h| h.key == "subscription")
            }
            ProtocolVersion::V1_0 => headers.iter().any(|h| h.key == "message-id"),
        };
        if !satisfied {
            return Err(record(SessionError::InvalidArgument(
                "ack missing headers required by the negotiated version".into(),
            )));
        }
        self.write_headers("ACK", &headers, None)
    }

    /// 1.2 requires `id`; 1.1 requires `message-id` and `subscription`; not allowed on 1.0.
    pub fn nack(&mut self, headers: Vec<Header>) -> SessionResult<()> {
        let satisfied = match self.version {
            ProtocolVersion::V1_2 => headers.iter().any(|h| h.key == "id"),
            ProtocolVersion::V1_1 => {
                headers.iter().any(|h| h.key == "message-id")
                    && headers.iter().any(|h| h.key == "subscription")
            }
            ProtocolVersion::V1_0 => false,
        };
        if !satisfied {
            return Err(record(SessionError::InvalidArgument(
                "nack is not allowed on 1.0, or is missing required headers".into(),
            )));
        }
        self.write_headers("NACK", &headers, None)
    }

    /// Requires `destination`. Injects `content-length` equal to the body length when absent.
    pub fn send(&mut self, mut headers: Vec<Header>, body: &[u8]) -> SessionResult<()> {
        if !headers.iter().any(|h| h.key == "destination") {
            return Err(record(SessionError::InvalidArgument(
                "send requires a destination header".into(),
            )));
        }
        if !headers.iter().any(|h| h.key == "content-length") {
            headers.push(Header::new("content-length", body.len().to_string()));
        }
        self.write_headers("SEND", &headers, Some(body))
    }

    fn dispatch(&mut self, frame: Frame) -> SessionResult<()> {
        let (command, headers, body) = frame.into_parts();
        match command.as_str() {
            "CONNECTED" => {
                let version = headers
                    .get("version")
                    .map(ProtocolVersion::parse)
                    .unwrap_or(ProtocolVersion::V1_0);
                self.version = version;
                if let Some((bx, by)) = headers.get("heart-beat").and_then(parse_heart_beat) {
                    self.heartbeat.negotiate(bx, by);
                } else {
                    self.heartbeat.disable();
                }
                self.connected = true;
                debug!(version = version.as_str(), "session connected");
                let event = ConnectedEvent { headers };
                if let Some(mut cb) = self.callbacks.connected.take() {
                    cb(self, &event);
                    self.callbacks.connected = Some(cb);
                }
                Ok(())
            }
            "MESSAGE" => {
                let event = MessageEvent { headers, body };
                if let Some(mut cb) = self.callbacks.message.take() {
                    cb(self, &event);
                    self.callbacks.message = Some(cb);
                }
                Ok(())
            }
            "ERROR" => {
                warn!("broker sent ERROR frame");
                let event = ErrorEvent { headers, body };
                if let Some(mut cb) = self.callbacks.error.take() {
                    cb(self, &event);
                    self.callbacks.error = Some(cb);
                }
                Ok(())
            }
            "RECEIPT" => {
                let event = ReceiptEvent { headers };
                if let Some(mut cb) = self.callbacks.receipt.take() {
                    cb(self, &event);
                    self.callbacks.receipt = Some(cb);
                }
                Ok(())
            }
            other => Err(record(SessionError::Protocol(format!(
                "unrecognized inbound command: {other}"
            )))),
        }
    }

    fn invoke_tick(&mut self) {
        if let Some(mut cb) = self.callbacks.tick.take() {
            cb(self);
            self.callbacks.tick = Some(cb);
        }
    }

    /// Runs the cooperative event loop until [`Session::stop`] is called from a callback, or a
    /// fatal error occurs. See `SPEC_FULL.md` §4.6 for the exact per-pass algorithm.
    pub fn run(&mut self) -> SessionResult<()> {
        self.running = true;
        while self.running {
            let timeout = self.heartbeat.select_timeout();
            self.conn
                .set_read_timeout(Some(timeout))
                .map_err(|e| record(SessionError::Io(e)))?;

            match self.conn.read_frame(&mut self.parser) {
                Ok(Some(outcome)) => {
                    self.heartbeat.note_read();
                    self.heartbeat.reset_broker_timeouts();
                    self.parser.reset();
                    if let ParseOutcome::Frame(frame) = outcome {
                        self.dispatch(frame)?;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.running = false;
                    return Err(record(SessionError::from(e)));
                }
            }

            self.invoke_tick();

            if self.heartbeat.client_hb > 0 || self.heartbeat.broker_hb > 0 {
                match self.heartbeat.check_deadlines(Instant::now()) {
                    Ok(true) => {
                        self.conn
                            .write_heartbeat()
                            .map_err(|e| record(SessionError::Io(e)))?;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        self.running = false;
                        return Err(record(e));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn session_pair() -> (Session, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || Connection::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        let conn = client.join().unwrap();
        (Session::new(conn), server)
    }

    #[test]
    fn send_without_destination_is_rejected_before_touching_socket() {
        let (mut session, mut server) = session_pair();
        server.set_read_timeout(Some(std::time::Duration::from_millis(50))).unwrap();
        let result = session.send(vec![], b"hello");
        assert!(matches!(result, Err(SessionError::InvalidArgument(_))));

        let mut buf = [0u8; 1];
        use std::io::Read;
        let n = server.read(&mut buf).unwrap_or(0);
        assert_eq!(n, 0, "no bytes should have been written to the socket");
    }

    #[test]
    fn subscribe_without_id_returns_increasing_ids_and_defaults_ack() {
        let (mut session, _server) = session_pair();
        let first = session
            .subscribe(vec![Header::new("destination", "/queue/a")])
            .unwrap();
        let second = session
            .subscribe(vec![Header::new("destination", "/queue/b")])
            .unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn subscribe_with_explicit_id_returns_zero() {
        let (mut session, _server) = session_pair();
        let id = session
            .subscribe(vec![
                Header::new("destination", "/queue/a"),
                Header::new("id", "42"),
            ])
            .unwrap();
        assert_eq!(id, 0);
    }

    #[test]
    fn nack_on_1_0_is_invalid_argument() {
        let (mut session, _server) = session_pair();
        let result = session.nack(vec![Header::new("message-id", "m1")]);
        assert!(matches!(result, Err(SessionError::InvalidArgument(_))));
    }

    #[test]
    fn unsubscribe_on_1_2_requires_id_not_destination() {
        let (mut session, _server) = session_pair();
        session.version = ProtocolVersion::V1_2;
        let result = session.unsubscribe(0, vec![Header::new("destination", "/q")]);
        assert!(matches!(result, Err(SessionError::InvalidArgument(_))));
        let ok = session.unsubscribe(0, vec![Header::new("id", "1")]);
        assert!(ok.is_ok());
    }
}
