//! Connection status and trigger availability.

use serde::{Deserialize, Serialize};

/// Connection state machine.
///
/// `Disconnected → Connecting → Connected → Disconnected`. There is no
/// reconnecting state; a dropped link stays down until `connect` is called
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// No handle.
    #[default]
    Disconnected,
    /// Selection or connection in progress.
    Connecting,
    /// A handle to the characteristic is held.
    Connected,
}

impl LinkStatus {
    /// Whether the status display should read "connected".
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// The two-state label shown to the user.
    pub fn label(self) -> &'static str {
        if self.is_connected() {
            "connected"
        } else {
            "not connected"
        }
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which triggers the user may press right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    /// The connect trigger.
    pub connect_enabled: bool,
    /// The send trigger.
    pub send_enabled: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self::for_state(LinkStatus::Disconnected, false)
    }
}

impl Controls {
    /// Derive trigger availability from the link status and whether a job
    /// is running.
    pub fn for_state(status: LinkStatus, job_active: bool) -> Self {
        Self {
            connect_enabled: status == LinkStatus::Disconnected,
            send_enabled: status.is_connected() && !job_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_have_two_states() {
        assert_eq!(LinkStatus::Connected.label(), "connected");
        assert_eq!(LinkStatus::Connecting.label(), "not connected");
        assert_eq!(LinkStatus::Disconnected.to_string(), "not connected");
    }

    #[test]
    fn test_controls_follow_status() {
        let idle = Controls::for_state(LinkStatus::Disconnected, false);
        assert!(idle.connect_enabled);
        assert!(!idle.send_enabled);

        let connecting = Controls::for_state(LinkStatus::Connecting, false);
        assert!(!connecting.connect_enabled);
        assert!(!connecting.send_enabled);

        let ready = Controls::for_state(LinkStatus::Connected, false);
        assert!(!ready.connect_enabled);
        assert!(ready.send_enabled);

        let busy = Controls::for_state(LinkStatus::Connected, true);
        assert!(!busy.send_enabled);

        assert_eq!(Controls::default(), idle);
    }
}
