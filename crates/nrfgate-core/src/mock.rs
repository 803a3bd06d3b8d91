//! Mock transport for testing.
//!
//! [`MockConnector`] hands out [`MockLink`]s that record every payload
//! written to them, so session behavior can be tested without a Bluetooth
//! adapter.
//!
//! # Features
//!
//! - **Failure injection**: fail the Nth write, every write, or the connect
//!   step itself
//! - **Latency simulation**: delay writes and connects
//! - **Link loss**: [`MockLink::simulate_disconnect`] fires the same
//!   notification a dropped BLE link would

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use nrfgate_types::Target;

use crate::error::{ConnectFailure, Error, Result, SelectionFailure};
use crate::traits::{Connector, MessageLink};

/// One payload accepted by a [`MockLink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    /// Bytes as written.
    pub payload: Bytes,
    /// When the write completed, on the tokio clock.
    pub at: Instant,
}

/// A mock link to the message characteristic.
///
/// # Example
///
/// ```
/// use nrfgate_core::{MessageLink, MockLink};
///
/// #[tokio::main]
/// async fn main() {
///     let link = MockLink::new("NRF_Gateway_A");
///     link.write(b"hi").await.unwrap();
///     assert_eq!(link.payloads(), vec![b"hi".to_vec()]);
/// }
/// ```
pub struct MockLink {
    name: String,
    address: String,
    lost: CancellationToken,
    closed_by_user: AtomicBool,
    writes: Mutex<Vec<RecordedWrite>>,
    write_attempts: AtomicU32,
    /// 1-based index of the write attempt to fail (0 = none).
    fail_on_write: AtomicU32,
    fail_all_writes: AtomicBool,
    /// Simulated write latency in milliseconds (0 = no delay).
    write_latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLink")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("lost", &self.lost.is_cancelled())
            .field("write_attempts", &self.write_attempts.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockLink {
    /// Create a healthy mock link.
    pub fn new(name: &str) -> Self {
        MockLinkBuilder::new().name(name).build()
    }

    fn records(&self) -> MutexGuard<'_, Vec<RecordedWrite>> {
        self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every successful write, oldest first.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.records().clone()
    }

    /// Payloads of every successful write, oldest first.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.records().iter().map(|w| w.payload.to_vec()).collect()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.records().len()
    }

    /// Number of write attempts, failed ones included.
    pub fn write_attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Fail the `n`th write attempt (1-based). Pass 0 to clear.
    pub fn fail_on_write(&self, n: u32) {
        self.fail_on_write.store(n, Ordering::SeqCst);
    }

    /// Fail every write until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_all_writes.store(fail, Ordering::SeqCst);
    }

    /// Set simulated write latency.
    pub fn set_write_latency(&self, latency: Duration) {
        self.write_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Drop the link as if the peripheral went out of range.
    pub fn simulate_disconnect(&self) {
        self.lost.cancel();
    }

    /// Whether the link dropped or was closed.
    pub fn is_lost(&self) -> bool {
        self.lost.is_cancelled()
    }

    /// Whether [`MessageLink::disconnect`] was called.
    pub fn was_closed_by_user(&self) -> bool {
        self.closed_by_user.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageLink for MockLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn write(&self, payload: &[u8]) -> Result<()> {
        let attempt = self.write_attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let latency = self.write_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let characteristic = nrfgate_types::uuids::MESSAGE_CHARACTERISTIC;
        if self.lost.is_cancelled() {
            return Err(Error::write_failed(characteristic, "link lost"));
        }
        if self.fail_all_writes.load(Ordering::SeqCst)
            || self.fail_on_write.load(Ordering::SeqCst) == attempt
        {
            return Err(Error::write_failed(characteristic, "mock write failure"));
        }

        self.records().push(RecordedWrite {
            payload: Bytes::copy_from_slice(payload),
            at: Instant::now(),
        });
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !self.lost.is_cancelled()
    }

    async fn closed(&self) {
        self.lost.cancelled().await;
    }

    async fn disconnect(&self) -> Result<()> {
        self.closed_by_user.store(true, Ordering::SeqCst);
        self.lost.cancel();
        Ok(())
    }
}

/// Builder for creating mock links with custom behavior.
#[derive(Debug, Clone)]
pub struct MockLinkBuilder {
    name: String,
    fail_on_write: u32,
    fail_writes: bool,
    write_latency: Duration,
}

impl Default for MockLinkBuilder {
    fn default() -> Self {
        Self {
            name: nrfgate_types::uuids::GATEWAY_NAME.to_string(),
            fail_on_write: 0,
            fail_writes: false,
            write_latency: Duration::ZERO,
        }
    }
}

impl MockLinkBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Fail the `n`th write attempt.
    #[must_use]
    pub fn fail_on_write(mut self, n: u32) -> Self {
        self.fail_on_write = n;
        self
    }

    /// Fail every write.
    #[must_use]
    pub fn fail_writes(mut self, fail: bool) -> Self {
        self.fail_writes = fail;
        self
    }

    /// Delay every write.
    #[must_use]
    pub fn write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Build the mock link.
    #[must_use]
    pub fn build(self) -> MockLink {
        MockLink {
            name: self.name,
            address: format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF),
            lost: CancellationToken::new(),
            closed_by_user: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
            write_attempts: AtomicU32::new(0),
            fail_on_write: AtomicU32::new(self.fail_on_write),
            fail_all_writes: AtomicBool::new(self.fail_writes),
            write_latency_ms: AtomicU64::new(self.write_latency.as_millis() as u64),
        }
    }
}

/// Which connect step a [`MockConnector`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockConnectFailure {
    /// No peripheral carries the target name.
    NoMatch,
    /// The user dismissed the chooser.
    Cancelled,
    /// The transport connect failed.
    Connect,
    /// The target service is missing.
    ServiceNotFound,
    /// The target characteristic is missing.
    CharacteristicNotFound,
}

impl MockConnectFailure {
    fn to_error(self, target: &Target) -> Error {
        match self {
            Self::NoMatch => Error::no_match(&target.device_name),
            Self::Cancelled => Error::Selection(SelectionFailure::Cancelled),
            Self::Connect => Error::connect_failed(
                Some(target.device_name.clone()),
                ConnectFailure::BleError("mock connect failure".into()),
            ),
            Self::ServiceNotFound => Error::ServiceNotFound {
                uuid: target.service,
                service_count: 0,
            },
            Self::CharacteristicNotFound => Error::CharacteristicNotFound {
                uuid: target.characteristic,
                service: target.service,
            },
        }
    }
}

/// A connector that produces [`MockLink`]s.
///
/// Each successful connect builds a fresh link from the template builder;
/// the links stay reachable through [`MockConnector::links`] for
/// inspection.
#[derive(Debug, Default)]
pub struct MockConnector {
    template: MockLinkBuilder,
    links: Mutex<Vec<Arc<MockLink>>>,
    failure: Mutex<Option<MockConnectFailure>>,
    connect_count: AtomicU32,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
}

impl MockConnector {
    /// Create a connector producing healthy links.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector producing links from `template`.
    pub fn with_template(template: MockLinkBuilder) -> Self {
        Self {
            template,
            ..Self::default()
        }
    }

    fn created(&self) -> MutexGuard<'_, Vec<Arc<MockLink>>> {
        self.links.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail subsequent connects at the given step. Pass `None` to clear.
    pub fn set_connect_failure(&self, failure: Option<MockConnectFailure>) {
        *self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = failure;
    }

    /// Set simulated connect latency.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of connect attempts.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Every link handed out, oldest first.
    pub fn links(&self) -> Vec<Arc<MockLink>> {
        self.created().clone()
    }

    /// The most recently handed out link.
    pub fn last_link(&self) -> Option<Arc<MockLink>> {
        self.created().last().cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, target: &Target) -> Result<Arc<dyn MessageLink>> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);

        let latency = self.connect_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let failure = *self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(failure) = failure {
            return Err(failure.to_error(target));
        }

        let link = Arc::new(self.template.clone().name(&target.device_name).build());
        self.created().push(Arc::clone(&link));
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_link_records_writes() {
        let link = MockLink::new("NRF_Gateway_A");
        link.write(b"hi").await.unwrap();
        link.write(b"there").await.unwrap();

        assert_eq!(link.write_count(), 2);
        assert_eq!(link.payloads(), vec![b"hi".to_vec(), b"there".to_vec()]);
        assert!(link.address().starts_with("MOCK-"));
    }

    #[tokio::test]
    async fn test_mock_link_fail_on_nth_write() {
        let link = MockLinkBuilder::new().fail_on_write(2).build();

        assert!(link.write(b"a").await.is_ok());
        let err = link.write(b"b").await.unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
        assert!(link.write(b"c").await.is_ok());

        assert_eq!(link.write_attempts(), 3);
        assert_eq!(link.payloads(), vec![b"a".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn test_mock_link_fail_all_writes() {
        let link = MockLink::new("x");
        link.set_fail_writes(true);
        assert!(link.write(b"a").await.is_err());
        link.set_fail_writes(false);
        assert!(link.write(b"a").await.is_ok());
    }

    #[tokio::test]
    async fn test_simulated_disconnect_resolves_closed() {
        let link = MockLink::new("x");
        assert!(link.is_connected().await);

        link.simulate_disconnect();
        link.closed().await;
        assert!(!link.is_connected().await);
        assert!(!link.was_closed_by_user());
        assert!(link.write(b"late").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_latency() {
        let link = MockLinkBuilder::new()
            .write_latency(Duration::from_millis(50))
            .build();
        let start = Instant::now();
        link.write(b"slow").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_connector_hands_out_fresh_links() {
        let connector = MockConnector::new();
        let target = Target::default();

        let first = connector.connect(&target).await.unwrap();
        let second = connector.connect(&target).await.unwrap();

        assert_eq!(first.name(), "NRF_Gateway_A");
        assert_eq!(connector.links().len(), 2);
        assert_eq!(connector.connect_count(), 2);
        assert_ne!(first.address(), "");
        assert!(second.is_connected().await);
    }

    #[tokio::test]
    async fn test_connector_failure_injection() {
        let connector = MockConnector::new();
        let target = Target::default();

        connector.set_connect_failure(Some(MockConnectFailure::ServiceNotFound));
        let err = connector.connect(&target).await.err().unwrap();
        assert!(matches!(err, Error::ServiceNotFound { .. }));
        assert!(connector.last_link().is_none());

        connector.set_connect_failure(Some(MockConnectFailure::Cancelled));
        let err = connector.connect(&target).await.err().unwrap();
        assert!(matches!(
            err,
            Error::Selection(SelectionFailure::Cancelled)
        ));

        connector.set_connect_failure(None);
        assert!(connector.connect(&target).await.is_ok());
    }

    #[test]
    fn test_mock_link_debug() {
        let link = MockLink::new("Debug");
        let debug = format!("{:?}", link);
        assert!(debug.contains("MockLink"));
        assert!(debug.contains("Debug"));
    }
}
