//! Platform-agnostic types for the NRF gateway message client.
//!
//! This crate holds everything that does not touch the Bluetooth stack:
//! the peripheral identifiers, message validation and the repeat policy.
//! It is shared by `nrfgate-core` and the command-line front end.
//!
//! # Example
//!
//! ```
//! use nrfgate_types::{Message, RepeatPolicy};
//!
//! let message = Message::new("hello").unwrap();
//! assert_eq!(message.as_bytes(), b"hello");
//!
//! let policy = RepeatPolicy::default();
//! assert_eq!(policy.repeat_count, 20);
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ValidationError, ValidationResult};
pub use types::{MAX_MESSAGE_UNITS, Message, RepeatPolicy, Target};
pub use self::uuid as uuids;
