//! A client library for STOMP 1.0/1.1/1.2.
//!
//! Two subsystems make up the core: [`frame`], a byte-level encoder and incremental parser for
//! STOMP frames, and [`session`], the protocol state machine that drives a single TCP
//! connection — version negotiation, heartbeat scheduling, command construction, and inbound
//! dispatch to user-registered callbacks.
//!
//! # Example
//!
//! ```rust,no_run
//! use stomp_client::session::{ConnectOptions, Session, SessionBuilder};
//!
//! fn main() -> stomp_client::session::SessionResult<()> {
//!     let options = ConnectOptions::new()
//!         .host("localhost")
//!         .login("admin", "password")
//!         .heart_beat(1000, 1000);
//!     let mut session = SessionBuilder::connect("localhost:61613", options)?;
//!
//!     session.on_connected(|session: &mut Session, _event| {
//!         let _ = session.subscribe(vec![("destination", "/queue/a").into()]);
//!     });
//!     session.on_message(|_session, event| {
//!         println!("{}", String::from_utf8_lossy(&event.body));
//!     });
//!
//!     session.run()
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod frame;
pub mod header;
pub mod session;

#[cfg(test)]
mod tests;

pub use codec::CodecError;
pub use connection::Connection;
pub use frame::{Frame, FrameBuilder, ParseOutcome, Parser, ProtocolVersion};
pub use header::{Header, HeaderStore};
pub use session::{
    last_error, ConnectOptions, ConnectedEvent, ErrorEvent, MessageEvent, ReceiptEvent,
    SendBuilder, Session, SessionBuilder, SessionError, SessionResult,
};
