//! Example: Sending a message
//!
//! Connects to the gateway and writes a message three times, one second
//! apart, printing the activity log as it grows.
//!
//! Run with: `cargo run --example send_message -- "hello"`

use std::env;
use std::sync::Arc;
use std::time::Duration;

use nrfgate_core::{BleConnector, RepeatPolicy, Session, SessionEvent, Target};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let message = env::args().nth(1).unwrap_or_else(|| "hello".to_string());

    let session = Session::new(
        Arc::new(BleConnector::default()),
        Target::default(),
        RepeatPolicy::default(),
    );
    let mut events = session.subscribe();

    session.connect().await?;
    let job = session
        .send_repeated(&message, 3, Duration::from_secs(1))
        .await?;

    while let Ok(event) = events.recv().await {
        match event {
            SessionEvent::Logged { entry } => println!("{}", entry),
            SessionEvent::JobFinished { job_id, outcome } if job_id == job => {
                println!("Finished: {:?}", outcome);
                break;
            }
            _ => {}
        }
    }

    session.disconnect().await?;
    Ok(())
}
