// ABOUTME: Connect-and-CONNECT-frame convenience, mirroring the teacher crate's ClientBuilder
// ABOUTME: Composes Connection::connect with Session::connect; the caller still drives Session::run

use super::error::SessionError;
use super::types::ConnectOptions;
use super::{Session, SessionResult};
use crate::connection::Connection;
use std::net::ToSocketAddrs;

/// Factory for creating a connected, CONNECT-sent session in one call.
pub struct SessionBuilder;

impl SessionBuilder {
    /// Resolves and connects to `addr`, then sends the STOMP `CONNECT` frame built from
    /// `options`. The broker's `CONNECTED` reply (and all subsequent frames) are only processed
    /// once the caller invokes [`Session::run`].
    pub fn connect<A: ToSocketAddrs>(addr: A, options: ConnectOptions) -> SessionResult<Session> {
        let conn = Connection::connect(addr)
            .map_err(|e| super::error::record(SessionError::ConnectFailed(e.to_string())))?;
        let mut session = Session::new(conn);
        session.connect(options.into_headers())?;
        Ok(session)
    }
}
