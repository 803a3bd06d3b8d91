//! Device discovery and selection.
//!
//! Selection is constrained to peripherals whose advertised local name equals
//! the target name exactly, the same rule a Web Bluetooth name filter applies.
//! When several peripherals carry the name, a [`DeviceChooser`] picks one.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nrfgate_types::Target;

use crate::error::{Error, Result, SelectionFailure};

/// Progress update for device finding operations.
#[derive(Debug, Clone)]
pub enum FindProgress {
    /// Found the target among already known peripherals, no scan needed.
    CacheHit,
    /// Starting scan attempt.
    ScanAttempt {
        /// Current attempt number (1-based).
        attempt: u32,
        /// Total number of attempts.
        total: u32,
        /// Duration of this scan attempt.
        duration_secs: u64,
    },
    /// Matching peripherals found on a specific attempt.
    Found { attempt: u32, count: usize },
}

/// Callback type for progress updates during device finding.
pub type ProgressCallback = Box<dyn Fn(FindProgress) + Send + Sync>;

/// A peripheral seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// The advertised local name.
    pub name: Option<String>,
    /// The BLE address as a string (may be zeros on macOS, use `identifier`).
    pub address: String,
    /// A connection identifier (peripheral ID on macOS, address elsewhere).
    pub identifier: String,
    /// RSSI signal strength.
    pub rssi: Option<i16>,
    /// Services listed in the advertisement.
    pub services: Vec<Uuid>,
}

impl DiscoveredDevice {
    /// Whether the advertisement lists `service`.
    ///
    /// Informational only; many firmwares advertise the name without the
    /// service list, so selection never requires it.
    pub fn advertises(&self, service: &Uuid) -> bool {
        self.services.contains(service)
    }

    /// Whether this peripheral is selected by `target`.
    pub fn matches(&self, target: &Target) -> bool {
        self.name.as_deref().is_some_and(|n| target.matches_name(n))
    }

    /// `name (identifier)` for pickers and logs.
    pub fn label(&self) -> String {
        format!(
            "{} ({})",
            self.name.as_deref().unwrap_or("Unknown"),
            self.identifier
        )
    }
}

/// Picks one peripheral out of several that match the target name.
///
/// Returning `None` means the user dismissed the choice, which surfaces as
/// [`SelectionFailure::Cancelled`].
pub trait DeviceChooser: Send + Sync {
    /// Choose an index into `candidates`, which is never empty.
    fn choose(&self, candidates: &[DiscoveredDevice]) -> Option<usize>;
}

/// Non-interactive chooser preferring the strongest signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrongestSignal;

impl DeviceChooser for StrongestSignal {
    fn choose(&self, candidates: &[DiscoveredDevice]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .max_by_key(|(_, d)| d.rssi.unwrap_or(i16::MIN))
            .map(|(i, _)| i)
    }
}

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan for devices.
    pub duration: Duration,
    /// Number of scan attempts when looking for the target.
    pub attempts: u32,
    /// Only return devices whose name matches the target.
    pub filter_target_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            attempts: 3,
            filter_target_only: true,
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set scan duration in seconds.
    #[must_use]
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    /// Set the number of scan attempts used when finding the target.
    #[must_use]
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Report every peripheral, not just the target.
    #[must_use]
    pub fn all_devices(mut self) -> Self {
        self.filter_target_only = false;
        self
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::Selection(SelectionFailure::NoAdapter))
}

/// Scan once and list the peripherals seen.
///
/// An empty list indicates nothing was found (not an error).
pub async fn scan_with_options(target: &Target, options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    scan_with_adapter(&adapter, target, options).await
}

/// Scan once using a specific adapter.
pub async fn scan_with_adapter(
    adapter: &Adapter,
    target: &Target,
    options: ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    info!("Starting BLE scan for {} seconds...", options.duration.as_secs());

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;

    let discovered: Vec<_> = known_devices(adapter)
        .await?
        .into_iter()
        .map(|(device, _)| device)
        .filter(|d| !options.filter_target_only || d.matches(target))
        .collect();

    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

/// Find every peripheral carrying the target name.
///
/// Checks peripherals the adapter already knows about first, then performs
/// up to `options.attempts` scans of increasing length. Advertisements are
/// easy to miss, so a single short scan is not enough. Returns an empty list
/// when nothing matched.
pub async fn find_candidates(
    adapter: &Adapter,
    target: &Target,
    options: &ScanOptions,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<(DiscoveredDevice, Peripheral)>> {
    info!("Looking for device: {}", target.device_name);

    let cached = matching(adapter, target).await?;
    if !cached.is_empty() {
        info!("Found {} device(s) in cache (no scan needed)", cached.len());
        if let Some(cb) = progress {
            cb(FindProgress::CacheHit);
        }
        return Ok(cached);
    }

    let total = options.attempts.max(1);
    let base_duration = (options.duration / 2).max(Duration::from_secs(2));

    for attempt in 1..=total {
        let scan_duration = base_duration * attempt;
        let duration_secs = scan_duration.as_secs();

        info!("Scan attempt {}/{} ({}s)...", attempt, total, duration_secs);
        if let Some(cb) = progress {
            cb(FindProgress::ScanAttempt {
                attempt,
                total,
                duration_secs,
            });
        }

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(scan_duration).await;
        adapter.stop_scan().await?;

        let found = matching(adapter, target).await?;
        if !found.is_empty() {
            info!("Found {} device(s) on attempt {}", found.len(), attempt);
            if let Some(cb) = progress {
                cb(FindProgress::Found {
                    attempt,
                    count: found.len(),
                });
            }
            return Ok(found);
        }

        if attempt < total {
            warn!("Device not found, retrying...");
        }
    }

    warn!(
        "Device not found after {} attempts: {}",
        total, target.device_name
    );
    Ok(Vec::new())
}

/// Run the chooser over matching peripherals.
pub fn choose_candidate<T>(
    candidates: Vec<(DiscoveredDevice, T)>,
    target: &Target,
    chooser: &dyn DeviceChooser,
) -> Result<(DiscoveredDevice, T)> {
    if candidates.is_empty() {
        return Err(Error::no_match(&target.device_name));
    }
    if candidates.len() == 1 {
        return candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::no_match(&target.device_name));
    }

    let devices: Vec<DiscoveredDevice> = candidates.iter().map(|(d, _)| d.clone()).collect();
    let index = chooser
        .choose(&devices)
        .ok_or(Error::Selection(SelectionFailure::Cancelled))?;

    candidates
        .into_iter()
        .nth(index)
        .ok_or(Error::Selection(SelectionFailure::Cancelled))
}

async fn matching(adapter: &Adapter, target: &Target) -> Result<Vec<(DiscoveredDevice, Peripheral)>> {
    Ok(known_devices(adapter)
        .await?
        .into_iter()
        .filter(|(device, _)| {
            let hit = device.matches(target);
            if hit {
                debug!("Matched by name: {}", device.label());
            }
            hit
        })
        .collect())
}

async fn known_devices(adapter: &Adapter) -> Result<Vec<(DiscoveredDevice, Peripheral)>> {
    let mut devices = Vec::new();
    for peripheral in adapter.peripherals().await? {
        match peripheral.properties().await {
            Ok(Some(props)) => {
                devices.push((describe(&peripheral.id(), &props), peripheral));
            }
            Ok(None) => {}
            Err(e) => debug!("Error reading peripheral properties: {}", e),
        }
    }
    Ok(devices)
}

fn describe(id: &PeripheralId, props: &PeripheralProperties) -> DiscoveredDevice {
    let address = props.address.to_string();
    DiscoveredDevice {
        name: props.local_name.clone(),
        identifier: create_identifier(&address, id),
        address,
        rssi: props.rssi,
        services: props.services.clone(),
    }
}

/// Format a peripheral ID as a string.
///
/// On macOS peripheral IDs are UUIDs; elsewhere they wrap the address.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Use the address unless the platform hides it (macOS reports zeros).
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}
