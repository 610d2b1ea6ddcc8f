// ABOUTME: Demo CLI that connects, publishes one message to a destination, and exits
// ABOUTME: Out of the core's scope per spec §1 (argument parsing/exit codes are example-program concerns)

use argh::FromArgs;
use stomp_client::session::{ConnectOptions, Session, SessionBuilder};

#[derive(FromArgs)]
/// Publish a single message to a STOMP destination.
struct Args {
    /// broker address, e.g. 127.0.0.1:61613
    #[argh(option, default = "String::from(\"127.0.0.1:61613\")")]
    broker: String,

    /// destination to publish to
    #[argh(positional)]
    destination: String,

    /// message body
    #[argh(positional)]
    message: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args: Args = argh::from_env();

    let options = ConnectOptions::new()
        .host("mybroker")
        .login("admin", "password");
    let mut session = SessionBuilder::connect(&args.broker, options)?;

    let destination = args.destination;
    let body = args.message;
    session.on_connected(move |session: &mut Session, _event| {
        if let Err(e) = session.send(
            vec![("destination", destination.clone()).into()],
            body.as_bytes(),
        ) {
            eprintln!("send failed: {e}");
        }
        session.stop();
    });
    session.on_error(|session, event| {
        eprintln!(
            "broker error: {}",
            event.headers.get("message").unwrap_or("unknown")
        );
        session.stop();
    });

    session.run()?;
    Ok(())
}
