//! The session: one connection, one job slot, one activity log.
//!
//! [`Session`] is what a front end holds. It wires the
//! [`ConnectionManager`] and [`TransmissionController`] to a shared
//! [`Reporter`], validates user input and runs the drop observer that ties
//! a lost link to job cancellation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nrfgate_core::{BleConnector, Session};
//! use nrfgate_types::{RepeatPolicy, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(
//!         Arc::new(BleConnector::default()),
//!         Target::default(),
//!         RepeatPolicy::default(),
//!     );
//!     session.connect().await?;
//!     session.send("hello").await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use nrfgate_types::{Message, RepeatPolicy, Target};

use crate::activity::{ActivityLog, LogEntry};
use crate::connection::{ConnectionManager, Established};
use crate::error::{Error, Result};
use crate::events::{EventReceiver, StopReason};
use crate::reporter::Reporter;
use crate::status::{Controls, LinkStatus};
use crate::traits::Connector;
use crate::transmit::TransmissionController;

struct Inner {
    connection: ConnectionManager,
    transmit: TransmissionController,
    reporter: Arc<Reporter>,
    policy: RwLock<RepeatPolicy>,
}

/// A client session with the gateway.
///
/// Cloning is cheap; clones share the same connection and job slot.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", self.inner.connection.target())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a disconnected session.
    pub fn new(connector: Arc<dyn Connector>, target: Target, policy: RepeatPolicy) -> Self {
        let reporter = Arc::new(Reporter::new(ActivityLog::default()));
        Self {
            inner: Arc::new(Inner {
                connection: ConnectionManager::new(connector, target, Arc::clone(&reporter)),
                transmit: TransmissionController::new(Arc::clone(&reporter)),
                reporter,
                policy: RwLock::new(policy),
            }),
        }
    }

    /// The configured target.
    pub fn target(&self) -> &Target {
        self.inner.connection.target()
    }

    /// The policy used by [`Session::send`].
    pub async fn policy(&self) -> RepeatPolicy {
        *self.inner.policy.read().await
    }

    /// Replace the policy used by [`Session::send`].
    pub async fn set_policy(&self, policy: RepeatPolicy) -> Result<()> {
        policy.validate()?;
        *self.inner.policy.write().await = policy;
        Ok(())
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.reporter.subscribe()
    }

    /// Current link status.
    pub async fn status(&self) -> LinkStatus {
        self.inner.connection.status().await
    }

    /// Current trigger availability.
    pub async fn controls(&self) -> Controls {
        self.inner.reporter.controls().await
    }

    /// The activity log, newest first.
    pub async fn log_snapshot(&self) -> Vec<LogEntry> {
        self.inner.reporter.snapshot().await
    }

    /// Whether a repeat job is running.
    pub async fn is_job_active(&self) -> bool {
        self.inner.transmit.is_active().await
    }

    /// Id of the running repeat job, if any.
    pub async fn active_job(&self) -> Option<u64> {
        self.inner.transmit.active_job().await
    }

    /// Connect to the gateway and start watching for link loss.
    ///
    /// Connecting while already connected is a no-op.
    pub async fn connect(&self) -> Result<()> {
        if let Some(established) = self.inner.connection.connect().await? {
            self.watch(established);
        }
        Ok(())
    }

    fn watch(&self, established: Established) {
        let Established {
            generation,
            link,
            observer,
        } = established;
        let session: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            tokio::select! {
                _ = observer.cancelled() => {
                    debug!(generation, "Drop observer detached");
                }
                _ = link.closed() => {
                    if let Some(inner) = session.upgrade() {
                        Session { inner }.handle_disconnect(generation).await;
                    }
                }
            }
        });
    }

    /// The single cleanup path for a dropped link.
    async fn handle_disconnect(&self, generation: u64) {
        // Handle and status first, job last.
        if !self.inner.connection.release(generation).await {
            return;
        }
        self.inner.transmit.stop(StopReason::Disconnected).await;
    }

    /// Close the connection and stop any job.
    pub async fn disconnect(&self) -> Result<()> {
        let closed = self.inner.connection.disconnect().await;
        self.inner.transmit.stop(StopReason::Disconnected).await;
        closed
    }

    /// Send `text` using the configured [`RepeatPolicy`].
    ///
    /// Returns the id of the started job.
    pub async fn send(&self, text: &str) -> Result<u64> {
        let policy = self.policy().await;
        self.start_job(text, policy).await
    }

    /// Write `text` `times` times, `interval` apart, replacing any running
    /// job.
    ///
    /// Returns the id of the started job. The first write happens one
    /// interval after this returns.
    pub async fn send_repeated(&self, text: &str, times: u32, interval: Duration) -> Result<u64> {
        self.start_job(text, RepeatPolicy::new(times, interval)).await
    }

    /// Write `text` once, immediately, after cancelling any running job.
    pub async fn send_once(&self, text: &str) -> Result<()> {
        let message = self.validate(text).await?;
        let (_, link) = self.require_link().await?;
        self.inner.transmit.write_once(link.as_ref(), &message).await
    }

    /// Cancel the running job. Returns `false` when none was running.
    pub async fn stop(&self) -> bool {
        self.inner.transmit.stop(StopReason::Requested).await
    }

    async fn start_job(&self, text: &str, policy: RepeatPolicy) -> Result<u64> {
        let message = self.validate(text).await?;
        if let Err(e) = policy.validate() {
            self.inner.reporter.error(e.to_string()).await;
            return Err(e.into());
        }
        let (generation, link) = self.require_link().await?;
        let started = self
            .inner
            .transmit
            .start(
                link,
                message,
                policy,
                self.inner.connection.is_current(generation),
            )
            .await;
        if let Err(Error::NotConnected) = started {
            self.inner.reporter.error("Error: not connected.").await;
        }
        started
    }

    async fn validate(&self, text: &str) -> Result<Message> {
        match Message::new(text) {
            Ok(message) => Ok(message),
            Err(e) => {
                self.inner.reporter.error(e.to_string()).await;
                Err(e.into())
            }
        }
    }

    async fn require_link(&self) -> Result<(u64, Arc<dyn crate::traits::MessageLink>)> {
        match self.inner.connection.link().await {
            Some(link) => Ok(link),
            None => {
                self.inner.reporter.error("Error: not connected.").await;
                Err(Error::NotConnected)
            }
        }
    }
}
