//! Command implementations for the CLI.

mod config;
mod scan;
mod send;
mod session;

pub use config::cmd_config;
pub use scan::cmd_scan;
pub use send::{SendArgs, cmd_send};
pub use session::cmd_session;
