//! btleplug-backed connector and link.
//!
//! [`BleConnector`] runs the whole connect sequence: name-filtered
//! selection, transport connect, service and characteristic resolution,
//! and registration of a disconnect watcher on the adapter's event stream.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Peripheral as _, Service, WriteType,
};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nrfgate_types::Target;

use crate::error::{ConnectFailure, Error, Result};
use crate::scan::{
    DeviceChooser, DiscoveredDevice, ProgressCallback, ScanOptions, StrongestSignal,
    choose_candidate, find_candidates, get_adapter,
};
use crate::traits::{Connector, MessageLink};

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for BLE connection timeouts.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use nrfgate_core::device::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .write_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
    /// Timeout for a single characteristic write.
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Validate the config and return an error if a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.connection_timeout.is_zero() {
            return Err(Error::invalid_config("connection_timeout must be > 0"));
        }
        if self.discovery_timeout.is_zero() {
            return Err(Error::invalid_config("discovery_timeout must be > 0"));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::invalid_config("write_timeout must be > 0"));
        }
        Ok(())
    }
}

/// Connects to the gateway over the first Bluetooth adapter.
pub struct BleConnector {
    config: ConnectionConfig,
    scan: ScanOptions,
    chooser: Arc<dyn DeviceChooser>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for BleConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleConnector")
            .field("config", &self.config)
            .field("scan", &self.scan)
            .finish_non_exhaustive()
    }
}

impl Default for BleConnector {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}

impl BleConnector {
    /// Create a connector that picks the strongest matching peripheral.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            scan: ScanOptions::default(),
            chooser: Arc::new(StrongestSignal),
            progress: None,
        }
    }

    /// Set the scan options used for selection.
    #[must_use]
    pub fn scan_options(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    /// Use a different chooser when several peripherals match.
    #[must_use]
    pub fn chooser(mut self, chooser: Arc<dyn DeviceChooser>) -> Self {
        self.chooser = chooser;
        self
    }

    /// Receive progress updates while searching.
    #[must_use]
    pub fn on_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

#[async_trait]
impl Connector for BleConnector {
    #[tracing::instrument(level = "info", skip_all, fields(device_name = %target.device_name))]
    async fn connect(&self, target: &Target) -> Result<Arc<dyn MessageLink>> {
        target.validate()?;
        self.config.validate()?;

        let adapter = get_adapter().await?;
        let candidates =
            find_candidates(&adapter, target, &self.scan, self.progress.as_ref()).await?;
        let (device, peripheral) = choose_candidate(candidates, target, self.chooser.as_ref())?;

        let link = BleLink::open(adapter, peripheral, device, target, self.config.clone()).await?;
        Ok(Arc::new(link))
    }
}

/// A connected gateway with its message characteristic resolved.
///
/// Dropping a link that was not disconnected spawns a best-effort
/// disconnect, so call [`MessageLink::disconnect`] for reliable cleanup.
pub struct BleLink {
    /// Kept alive for the lifetime of the peripheral connection.
    #[allow(dead_code)]
    adapter: Adapter,
    peripheral: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
    name: String,
    address: String,
    config: ConnectionConfig,
    /// Cancelled when the platform reports the link dropped.
    lost: CancellationToken,
    watcher: JoinHandle<()>,
    disconnected: AtomicBool,
}

impl std::fmt::Debug for BleLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleLink")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("characteristic", &self.characteristic.uuid)
            .field("lost", &self.lost.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BleLink {
    /// Connect to a selected peripheral and resolve the target endpoint.
    ///
    /// On resolution failure the peripheral is disconnected again before the
    /// error is returned.
    #[tracing::instrument(level = "info", skip_all, fields(device = %device.label()))]
    pub async fn open(
        adapter: Adapter,
        peripheral: Peripheral,
        device: DiscoveredDevice,
        target: &Target,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let name = device
            .name
            .clone()
            .unwrap_or_else(|| target.device_name.clone());

        // Subscribe before connecting so a drop during resolution is not missed.
        let events = adapter.events().await?;

        info!("Connecting to device...");
        timeout(config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| {
                Error::connect_failed(
                    Some(name.clone()),
                    ConnectFailure::Timeout(config.connection_timeout),
                )
            })?
            .map_err(|e| {
                Error::connect_failed(Some(name.clone()), ConnectFailure::BleError(e.to_string()))
            })?;
        info!("Connected!");

        let discovered = timeout(config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| {
                Error::connect_failed(
                    Some(name.clone()),
                    ConnectFailure::DiscoveryTimeout(config.discovery_timeout),
                )
            })
            .and_then(|r| {
                r.map_err(|e| {
                    Error::connect_failed(Some(name.clone()), ConnectFailure::BleError(e.to_string()))
                })
            });

        let resolved = discovered.and_then(|_| resolve_endpoint(&peripheral.services(), target));
        let characteristic = match resolved {
            Ok(c) => c,
            Err(e) => {
                warn!("Endpoint resolution failed: {}", e);
                if let Err(close_err) = peripheral.disconnect().await {
                    debug!("Disconnect after failed resolution: {}", close_err);
                }
                return Err(e);
            }
        };

        let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        debug!(
            "Resolved {} ({:?}, properties {:?})",
            characteristic.uuid, write_type, characteristic.properties
        );

        let lost = CancellationToken::new();
        let watcher = spawn_disconnect_watcher(events, peripheral.id(), lost.clone());

        Ok(Self {
            adapter,
            peripheral,
            characteristic,
            write_type,
            name,
            address: device.identifier,
            config,
            lost,
            watcher,
            disconnected: AtomicBool::new(false),
        })
    }
}

/// Find the target service, then the characteristic inside it.
fn resolve_endpoint(services: &BTreeSet<Service>, target: &Target) -> Result<Characteristic> {
    let service = services
        .iter()
        .find(|s| s.uuid == target.service)
        .ok_or(Error::ServiceNotFound {
            uuid: target.service,
            service_count: services.len(),
        })?;

    let characteristic = service
        .characteristics
        .iter()
        .find(|c| c.uuid == target.characteristic)
        .ok_or(Error::CharacteristicNotFound {
            uuid: target.characteristic,
            service: target.service,
        })?;

    let writable = CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE;
    if !characteristic.properties.intersects(writable) {
        return Err(Error::connect_failed(
            None,
            ConnectFailure::Other(format!(
                "characteristic {} is not writable",
                characteristic.uuid
            )),
        ));
    }

    Ok(characteristic.clone())
}

fn spawn_disconnect_watcher(
    mut events: std::pin::Pin<Box<dyn futures::Stream<Item = CentralEvent> + Send>>,
    id: btleplug::platform::PeripheralId,
    lost: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = lost.cancelled() => break,
                event = events.next() => match event {
                    Some(CentralEvent::DeviceDisconnected(dropped)) if dropped == id => {
                        info!("Peripheral reported disconnected");
                        lost.cancel();
                        break;
                    }
                    Some(_) => {}
                    None => {
                        warn!("Adapter event stream ended, treating link as lost");
                        lost.cancel();
                        break;
                    }
                }
            }
        }
    })
}

#[async_trait]
impl MessageLink for BleLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn write(&self, payload: &[u8]) -> Result<()> {
        let uuid = self.characteristic.uuid;
        if self.lost.is_cancelled() {
            return Err(Error::write_failed(uuid, "link lost"));
        }
        timeout(
            self.config.write_timeout,
            self.peripheral
                .write(&self.characteristic, payload, self.write_type),
        )
        .await
        .map_err(|_| Error::timeout("write", self.config.write_timeout))?
        .map_err(|e| Error::write_failed(uuid, e.to_string()))?;
        debug!("Wrote {} bytes to {}", payload.len(), uuid);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !self.lost.is_cancelled() && self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn closed(&self) {
        self.lost.cancelled().await;
    }

    #[tracing::instrument(level = "info", skip(self), fields(device_name = %self.name))]
    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from device...");
        self.disconnected.store(true, Ordering::SeqCst);
        self.watcher.abort();
        let result = self.peripheral.disconnect().await;
        self.lost.cancel();
        result?;
        Ok(())
    }
}

impl Drop for BleLink {
    fn drop(&mut self) {
        self.watcher.abort();
        if self.disconnected.swap(true, Ordering::SeqCst) || self.lost.is_cancelled() {
            return;
        }

        warn!(
            device_name = %self.name,
            device_address = %self.address,
            "Link dropped without calling disconnect() - performing best-effort cleanup"
        );

        let peripheral = self.peripheral.clone();
        let address = self.address.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = peripheral.disconnect().await {
                    debug!(device_address = %address, error = %e, "Best-effort disconnect failed");
                }
            });
        }
    }
}
