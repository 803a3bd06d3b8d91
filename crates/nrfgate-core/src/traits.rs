//! Trait abstractions over the Bluetooth transport.
//!
//! [`Connector`] performs selection, connection and endpoint resolution and
//! hands back a [`MessageLink`], the live handle every write goes through.
//! The btleplug implementation lives in [`crate::device`]; the mock one in
//! [`crate::mock`] drives the session tests.

use std::sync::Arc;

use async_trait::async_trait;

use nrfgate_types::Target;

use crate::error::Result;

/// A live, resolved connection to the message characteristic.
///
/// # Example
///
/// ```ignore
/// use nrfgate_core::{MessageLink, Result};
///
/// async fn ping<L: MessageLink + ?Sized>(link: &L) -> Result<()> {
///     link.write(b"ping").await
/// }
/// ```
#[async_trait]
pub trait MessageLink: Send + Sync {
    /// Advertised name of the connected peripheral.
    fn name(&self) -> &str;

    /// Device address or platform identifier.
    fn address(&self) -> &str;

    /// Write one payload to the characteristic.
    async fn write(&self, payload: &[u8]) -> Result<()>;

    /// Check whether the transport still reports the link as up.
    async fn is_connected(&self) -> bool;

    /// Resolve once the link has dropped.
    ///
    /// Resolves immediately if the link is already down. This is the only
    /// asynchronous notification a session reacts to outside of direct
    /// user action.
    async fn closed(&self);

    /// Close the link on request.
    async fn disconnect(&self) -> Result<()>;
}

/// Opens links to the configured target.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Select a peripheral matching `target`, connect, and resolve the
    /// service and characteristic.
    async fn connect(&self, target: &Target) -> Result<Arc<dyn MessageLink>>;
}
