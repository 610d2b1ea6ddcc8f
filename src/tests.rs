//! End-to-end integration tests exercising the full connect/subscribe/message/timeout flow
//! over a real loopback TCP socket, rather than unit-testing the codec or engine in isolation.

use crate::connection::Connection;
use crate::header::Header;
use crate::session::{Session, SessionError};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn connected_pair() -> (Session, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || Connection::connect(addr).unwrap());
    let (server, _) = listener.accept().unwrap();
    let conn = client.join().unwrap();
    (Session::new(conn), server)
}

#[test]
fn connect_subscribe_and_deliver_a_message() {
    let (mut session, mut broker) = connected_pair();
    broker
        .set_read_timeout(Some(Duration::from_secs(1)))
        .unwrap();

    session
        .connect(vec![
            Header::new("accept-version", "1.2"),
            Header::new("host", "h"),
        ])
        .unwrap();

    let mut wire = vec![0u8; 4096];
    let n = broker.read(&mut wire).unwrap();
    assert_eq!(
        &wire[..n],
        b"CONNECT\naccept-version:1.2\nhost:h\n\n\0"
    );

    broker
        .write_all(b"CONNECTED\nversion:1.2\nheart-beat:1000,1000\n\n\0")
        .unwrap();

    let (tx, rx) = mpsc::channel();
    session.on_connected(move |session: &mut Session, _event| {
        let id = session
            .subscribe(vec![Header::new("destination", "/q")])
            .unwrap();
        tx.send(id).unwrap();
        session.stop();
    });

    session.run().unwrap();
    assert_eq!(rx.recv().unwrap(), 1);

    let n = broker.read(&mut wire).unwrap();
    assert_eq!(
        &wire[..n],
        b"SUBSCRIBE\nid:1\nack:auto\ndestination:/q\n\n\0"
    );
}

#[test]
fn message_callback_receives_headers_and_body() {
    let (mut session, mut broker) = connected_pair();
    broker
        .set_read_timeout(Some(Duration::from_secs(1)))
        .unwrap();
    session.connect(vec![]).unwrap();
    broker.read(&mut [0u8; 256]).unwrap();
    broker.write_all(b"CONNECTED\n\n\0").unwrap();

    let (tx, rx) = mpsc::channel();
    session.on_connected(|_s, _e| {});
    session.on_message(move |session: &mut Session, event| {
        tx.send((event.headers.get("subscription").map(String::from), event.body.to_vec()))
            .unwrap();
        session.stop();
    });

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        let mut broker = broker;
        broker
            .write_all(b"MESSAGE\ndestination:/q\nmessage-id:m1\nsubscription:1\n\nhello\0")
            .unwrap();
    });

    session.run().unwrap();
    let (subscription, body) = rx.recv().unwrap();
    assert_eq!(subscription.as_deref(), Some("1"));
    assert_eq!(body, b"hello");
}

#[test]
fn broker_heartbeat_timeout_fails_the_session() {
    let (mut session, _broker) = connected_pair();
    session
        .connect(vec![Header::new("heart-beat", "0,50")])
        .unwrap();
    // No CONNECTED arrives: negotiation never happens, but a requested broker_hb of 50ms is
    // already enough to exercise the timeout path through the raw requested value.
    let result = session.run();
    assert!(matches!(result, Err(SessionError::Timeout)));
}

#[test]
fn nack_is_rejected_on_a_1_0_session_without_touching_the_socket() {
    let (mut session, mut broker) = connected_pair();
    broker
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();

    let result = session.nack(vec![Header::new("message-id", "m1")]);
    assert!(matches!(result, Err(SessionError::InvalidArgument(_))));

    let mut buf = [0u8; 1];
    let n = broker.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0);
}
