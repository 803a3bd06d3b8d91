//! Connection manager: holds the handle and drives the link state machine.
//!
//! `Disconnected → Connecting → Connected → Disconnected`, with no
//! reconnection. Every successful connect bumps a generation counter;
//! drop notifications carry the generation they were registered under and
//! are ignored once a newer connection (or an explicit disconnect) has
//! replaced it.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use nrfgate_types::Target;

use crate::error::{ConnectFailure, Error, Result};
use crate::reporter::Reporter;
use crate::status::LinkStatus;
use crate::traits::{Connector, MessageLink};

#[derive(Default)]
struct ConnectionState {
    status: LinkStatus,
    link: Option<Arc<dyn MessageLink>>,
    generation: u64,
    /// Cancels the drop observer of the current connection.
    observer: Option<CancellationToken>,
}

/// A freshly opened connection.
///
/// The caller is expected to watch [`MessageLink::closed`] until `observer`
/// is cancelled and report a drop through [`ConnectionManager::release`].
pub struct Established {
    /// Generation the connection was opened under.
    pub generation: u64,
    /// The live handle.
    pub link: Arc<dyn MessageLink>,
    /// Cancelled when the connection is torn down on request.
    pub observer: CancellationToken,
}

/// Owns the connection handle.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    target: Target,
    reporter: Arc<Reporter>,
    state: Mutex<ConnectionState>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager connecting to `target` through `connector`.
    pub fn new(connector: Arc<dyn Connector>, target: Target, reporter: Arc<Reporter>) -> Self {
        Self {
            connector,
            target,
            reporter,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// The configured target.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Current link status.
    pub async fn status(&self) -> LinkStatus {
        self.state.lock().await.status
    }

    /// The live handle and the generation it belongs to, if connected.
    pub async fn link(&self) -> Option<(u64, Arc<dyn MessageLink>)> {
        let state = self.state.lock().await;
        state
            .link
            .as_ref()
            .map(|link| (state.generation, Arc::clone(link)))
    }

    /// Whether the handle of `generation` is still the live one.
    pub async fn is_current(&self, generation: u64) -> bool {
        let state = self.state.lock().await;
        state.generation == generation && state.link.is_some()
    }

    /// Select, connect and resolve the endpoint.
    ///
    /// Returns `Ok(None)` when a connection is already held. Any failure
    /// leaves the status at not connected and is logged before it is
    /// returned.
    #[tracing::instrument(level = "info", skip(self), fields(device_name = %self.target.device_name))]
    pub async fn connect(&self) -> Result<Option<Established>> {
        let generation = {
            let mut state = self.state.lock().await;
            match state.status {
                LinkStatus::Connected => {
                    drop(state);
                    self.reporter.info("Already connected.").await;
                    return Ok(None);
                }
                LinkStatus::Connecting => {
                    drop(state);
                    let err = Error::connect_failed(
                        None,
                        ConnectFailure::Other("connection already in progress".into()),
                    );
                    self.reporter.error(format!("Connection error: {}", err)).await;
                    return Err(err);
                }
                LinkStatus::Disconnected => {}
            }
            state.status = LinkStatus::Connecting;
            state.generation += 1;
            state.generation
        };

        self.reporter.set_status(LinkStatus::Connecting).await;
        self.reporter.info("Searching for device...").await;

        let link = match self.connector.connect(&self.target).await {
            Ok(link) => link,
            Err(e) => {
                {
                    let mut state = self.state.lock().await;
                    if state.generation == generation {
                        state.status = LinkStatus::Disconnected;
                    }
                }
                self.reporter.error(format!("Connection error: {}", e)).await;
                self.reporter.set_status(LinkStatus::Disconnected).await;
                return Err(e);
            }
        };

        let observer = CancellationToken::new();
        {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                // Torn down while the connect was in flight.
                drop(state);
                debug!("Discarding connection opened after teardown");
                if let Err(e) = link.disconnect().await {
                    debug!("Disconnect of abandoned link failed: {}", e);
                }
                return Err(Error::connect_failed(
                    Some(link.name().to_string()),
                    ConnectFailure::Other("connection abandoned".into()),
                ));
            }
            state.status = LinkStatus::Connected;
            state.link = Some(Arc::clone(&link));
            state.observer = Some(observer.clone());
        }

        info!(address = %link.address(), "Link established");
        self.reporter
            .info(format!("Connected to device: {} ({})", link.name(), link.address()))
            .await;
        self.reporter.set_status(LinkStatus::Connected).await;
        self.reporter
            .success("Connection complete. Ready to send messages.")
            .await;

        Ok(Some(Established {
            generation,
            link,
            observer,
        }))
    }

    /// Clear the handle after the link of `generation` dropped and publish
    /// the not-connected status.
    ///
    /// Returns `false` when that connection was already replaced or torn
    /// down, in which case nothing changes.
    pub async fn release(&self, generation: u64) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation || state.link.is_none() {
                debug!(generation, current = state.generation, "Ignoring stale drop notification");
                return false;
            }
            state.link = None;
            state.status = LinkStatus::Disconnected;
            state.observer = None;
        }
        self.reporter.set_status(LinkStatus::Disconnected).await;
        self.reporter.error("Device disconnected.").await;
        true
    }

    /// Tear the connection down on request.
    ///
    /// No-op when nothing is connected.
    pub async fn disconnect(&self) -> Result<()> {
        let link = {
            let mut state = self.state.lock().await;
            if state.status == LinkStatus::Disconnected && state.link.is_none() {
                return Ok(());
            }
            if let Some(observer) = state.observer.take() {
                observer.cancel();
            }
            state.generation += 1;
            state.status = LinkStatus::Disconnected;
            state.link.take()
        };

        self.reporter.set_status(LinkStatus::Disconnected).await;
        self.reporter.info("Disconnected.").await;

        if let Some(link) = link {
            link.disconnect().await?;
        }
        Ok(())
    }
}
