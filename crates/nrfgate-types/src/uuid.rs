//! Bluetooth identifiers for the NRF gateway peripheral.
//!
//! These must match the gateway firmware's advertised configuration exactly,
//! otherwise device selection or endpoint resolution fails.

use uuid::{Uuid, uuid};

/// Custom GATT service exposed by the gateway firmware.
pub const GATEWAY_SERVICE: Uuid = uuid!("4fafc201-1fb5-459e-8fcc-c5c9c331914b");

/// Writable characteristic that receives message payloads.
pub const MESSAGE_CHARACTERISTIC: Uuid = uuid!("beb5483e-36e1-4688-b7f5-ea07361b26a8");

/// Advertised local name of the gateway.
pub const GATEWAY_NAME: &str = "NRF_Gateway_A";
