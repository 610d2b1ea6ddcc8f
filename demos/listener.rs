// ABOUTME: Demo CLI that subscribes to a destination and logs every frame it receives
// ABOUTME: Out of the core's scope per spec §1 (argument parsing/exit codes are example-program concerns)

use argh::FromArgs;
use stomp_client::session::{ConnectOptions, Session, SessionBuilder};

#[derive(FromArgs)]
/// Subscribe to a STOMP destination and print everything that arrives.
struct Args {
    /// broker address, e.g. 127.0.0.1:61613
    #[argh(option, default = "String::from(\"127.0.0.1:61613\")")]
    broker: String,

    /// destination to subscribe to
    #[argh(positional)]
    destination: String,
}

fn dump_headers(label: &str, headers: &stomp_client::HeaderStore) {
    for header in headers {
        tracing::info!("{label} {}: {}", header.key, header.value);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args: Args = argh::from_env();

    let options = ConnectOptions::new()
        .host("mybroker")
        .login("admin", "password")
        .heart_beat(1000, 1000);
    let mut session = SessionBuilder::connect(&args.broker, options)?;

    let destination = args.destination;
    session.on_connected(move |session: &mut Session, event| {
        dump_headers("connected", &event.headers);
        if let Err(e) = session.subscribe(vec![
            ("destination", destination.clone()).into(),
            ("ack", "client-individual").into(),
        ]) {
            eprintln!("subscribe failed: {e}");
            session.stop();
        }
    });

    session.on_message(|session: &mut Session, event| {
        dump_headers("message", &event.headers);
        tracing::info!("body: {}", String::from_utf8_lossy(&event.body));
        if let Some(id) = event.headers.get("ack").map(String::from) {
            let _ = session.ack(vec![("id", id).into()]);
        }
    });

    session.on_error(|session, event| {
        dump_headers("error", &event.headers);
        eprintln!("received ERROR, disconnecting");
        session.stop();
    });

    session.on_receipt(|_session, event| {
        dump_headers("receipt", &event.headers);
    });

    session.run()?;
    Ok(())
}
