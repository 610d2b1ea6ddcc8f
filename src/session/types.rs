// ABOUTME: Thin convenience layer over the primitive session operations
// ABOUTME: Sugar only — every method here resolves to the primitives that carry the actual invariants

use super::{Session, SessionResult};
use crate::header::Header;

/// Typed builder for the common `CONNECT` header set.
///
/// Resolves to a single [`Session::connect`] call; it introduces no protocol behavior beyond
/// assembling the header list, mirroring the teacher crate's `BindCredentials`.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    host: Option<String>,
    login: Option<String>,
    passcode: Option<String>,
    heart_beat: Option<(u64, u64)>,
    extra: Vec<Header>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn login(mut self, login: impl Into<String>, passcode: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.passcode = Some(passcode.into());
        self
    }

    /// Requested `(client_hb, broker_hb)` in milliseconds, serialized as the `heart-beat` header.
    pub fn heart_beat(mut self, client_hb_ms: u64, broker_hb_ms: u64) -> Self {
        self.heart_beat = Some((client_hb_ms, broker_hb_ms));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push(Header::new(key, value));
        self
    }

    pub(crate) fn into_headers(self) -> Vec<Header> {
        let mut headers = Vec::new();
        if let Some(host) = self.host {
            headers.push(Header::new("host", host));
        }
        if let Some(login) = self.login {
            headers.push(Header::new("login", login));
        }
        if let Some(passcode) = self.passcode {
            headers.push(Header::new("passcode", passcode));
        }
        if let Some((cx, cy)) = self.heart_beat {
            headers.push(Header::new("heart-beat", format!("{cx},{cy}")));
        }
        headers.extend(self.extra);
        headers
    }
}

/// Fluent wrapper over [`Session::send`] for the common destination+body+content-type case.
#[derive(Debug, Clone, Default)]
pub struct SendBuilder {
    destination: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
    extra: Vec<Header>,
}

impl SendBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push(Header::new(key, value));
        self
    }

    pub fn send(self, session: &mut Session) -> SessionResult<()> {
        let mut headers = Vec::new();
        if let Some(destination) = self.destination {
            headers.push(Header::new("destination", destination));
        }
        if let Some(content_type) = self.content_type {
            headers.push(Header::new("content-type", content_type));
        }
        headers.extend(self.extra);
        session.send(headers, &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_options_serializes_heart_beat_as_decimal_pair() {
        let headers = ConnectOptions::new().heart_beat(1000, 2000).into_headers();
        let hb = headers.iter().find(|h| h.key == "heart-beat").unwrap();
        assert_eq!(hb.value, "1000,2000");
    }
}
