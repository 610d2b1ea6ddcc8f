// ABOUTME: Blocking byte-oriented transport for a single STOMP session over std::net::TcpStream
// ABOUTME: Implements the readiness wait as a bounded read timeout rather than a raw select(2) call

use crate::codec::CodecError;
use crate::frame::{Frame, ParseOutcome, Parser};
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// A blocking, full-duplex TCP connection carrying STOMP frames.
///
/// `Connection` owns the socket and a read buffer; it drives the incremental
/// [`Parser`] byte-by-byte from buffered data, issuing a real `read` syscall only when the
/// buffer runs dry — this is the "implementations may buffer" allowance in the frame codec
/// design, while still preserving the one-byte-at-a-time state machine contract.
///
/// The engine's "selectable read side" requirement is realized with
/// [`TcpStream::set_read_timeout`]: `read_frame` blocks for at most the caller-supplied timeout
/// and returns `Ok(None)` on a timeout, the moral equivalent of `select()` reporting not-ready.
/// A `read` interrupted by a signal is retried transparently by `std::net::TcpStream` on Unix,
/// so EINTR never surfaces here.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Connection {
    /// Resolves `addr` and connects. DNS/socket creation sit at the edge of the core per the
    /// purpose-and-scope non-goals; this is the thin external-collaborator boundary.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Connection> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Connection {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        })
    }

    pub fn from_stream(stream: TcpStream) -> Connection {
        Connection {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Sets the bound on how long the next [`Connection::read_frame`] call may block.
    ///
    /// `None` clears the timeout (block indefinitely); `Some(Duration::ZERO)` is rounded up to
    /// 1ms by the platform, matching a non-blocking poll as closely as `std` allows.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    /// Drives `parser` with buffered bytes, reading more from the socket only when needed.
    ///
    /// Returns `Ok(None)` if the configured read timeout elapses before a frame completes —
    /// this is the event loop's readiness-wait signal, not an error. Returns `Ok(Some(_))` when
    /// a frame or heartbeat completes. The caller must call `parser.reset()` before the next
    /// invocation.
    pub fn read_frame(&mut self, parser: &mut Parser) -> Result<Option<ParseOutcome>, CodecError> {
        loop {
            while self.buffer.has_remaining() {
                let byte = self.buffer[0];
                self.buffer.advance(1);
                if let Some(outcome) = parser.feed(byte)? {
                    trace!("frame parse completed");
                    return Ok(Some(outcome));
                }
            }

            let mut scratch = [0u8; 4096];
            match self.stream.read(&mut scratch) {
                Ok(0) => {
                    return Err(CodecError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by broker",
                    )));
                }
                Ok(n) => self.buffer.extend_from_slice(&scratch[..n]),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Ok(None);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CodecError::Io(e)),
            }
        }
    }

    /// Writes the complete frame bytes to the socket, retrying on short writes.
    pub fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        debug!(len = bytes.len(), "frame written");
        Ok(())
    }

    /// Writes a single bare `\n` — a heartbeat, used by the client-side keepalive.
    pub fn write_heartbeat(&mut self) -> io::Result<()> {
        self.stream.write_all(b"\n")?;
        self.stream.flush()
    }

    pub fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.stream.peer_addr()
    }
}
