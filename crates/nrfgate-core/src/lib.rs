//! Core BLE library for sending text messages to an NRF gateway.
//!
//! The gateway is a peripheral that advertises a fixed name and exposes one
//! writable characteristic; every UTF-8 payload written to it is relayed
//! onward. This crate finds the gateway, holds the connection and writes
//! messages to it, once or repeatedly on a timer.
//!
//! # Features
//!
//! - **Name-filtered discovery**: scan for peripherals carrying the target name
//! - **Endpoint resolution**: resolve the gateway service and characteristic
//! - **Repeat transmission**: one cancellable job writing a message N times
//! - **Link-loss handling**: a dropped link halts the running job
//! - **Activity log and events**: everything a front end needs to display
//! - **Mock transport**: test session behavior without hardware
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nrfgate_core::{BleConnector, Session, SessionEvent};
//! use nrfgate_types::{RepeatPolicy, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(
//!         Arc::new(BleConnector::default()),
//!         Target::default(),
//!         RepeatPolicy::default(),
//!     );
//!     let mut events = session.subscribe();
//!
//!     session.connect().await?;
//!     let job = session.send_repeated("ping", 3, Duration::from_millis(500)).await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let SessionEvent::JobFinished { job_id, outcome } = event {
//!             if job_id == job {
//!                 println!("{:?}", outcome);
//!                 break;
//!             }
//!         }
//!     }
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod connection;
pub mod device;
pub mod error;
pub mod events;
pub mod mock;
pub mod reporter;
pub mod scan;
pub mod session;
pub mod status;
pub mod traits;
pub mod transmit;

pub use activity::{ActivityLog, DEFAULT_LOG_CAPACITY, LogEntry, LogLevel};
pub use connection::{ConnectionManager, Established};
pub use device::{BleConnector, BleLink, ConnectionConfig};
pub use error::{ConnectFailure, Error, Result, SelectionFailure};
pub use events::{EventDispatcher, EventReceiver, EventSender, JobOutcome, SessionEvent, StopReason};
pub use mock::{MockConnectFailure, MockConnector, MockLink, MockLinkBuilder, RecordedWrite};
pub use reporter::Reporter;
pub use scan::{
    DeviceChooser, DiscoveredDevice, FindProgress, ProgressCallback, ScanOptions, StrongestSignal,
    create_identifier, format_peripheral_id,
};
pub use session::Session;
pub use status::{Controls, LinkStatus};
pub use traits::{Connector, MessageLink};
pub use transmit::TransmissionController;

// Re-export from nrfgate-types
pub use nrfgate_types::uuid as uuids;
pub use nrfgate_types::{MAX_MESSAGE_UNITS, Message, RepeatPolicy, Target, ValidationError};
