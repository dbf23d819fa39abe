//! Client and entry-group state enumerations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The connection state of a client session with the daemon.
///
/// `Connecting`, `Registering` and `Running` follow each other as the daemon
/// comes up and registers the host's records. `Collision` and `Failure` are
/// terminal with respect to automatic recovery: the client must be released
/// and a new one created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientState {
    /// The daemon is not yet available; the session is waiting for it.
    Connecting,
    /// The daemon is registering this host's records.
    Registering,
    /// The daemon is up and all host records have been established.
    Running,
    /// The host name collides with another host on the network.
    Collision,
    /// The session failed, typically because the daemon connection died.
    Failure,
}

impl ClientState {
    /// Whether this state requires releasing and recreating the client.
    pub fn is_terminal(self) -> bool {
        matches!(self, ClientState::Collision | ClientState::Failure)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClientState::Connecting => "connecting",
            ClientState::Registering => "registering",
            ClientState::Running => "running",
            ClientState::Collision => "collision",
            ClientState::Failure => "failure",
        };
        f.write_str(label)
    }
}

/// The publication state of an entry group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupState {
    /// The group is new or was reset; nothing is published.
    Uncommitted,
    /// A commit is in flight; the daemon is registering the entries.
    Registering,
    /// All entries in the group are registered on the network.
    Established,
    /// An entry collided with an existing service name; nothing was
    /// registered. Pick an alternative name and retry.
    Collision,
    /// The group failed; release it and create a new one.
    Failure,
}

impl GroupState {
    /// Whether this state requires releasing and recreating the group.
    pub fn is_terminal(self) -> bool {
        matches!(self, GroupState::Failure)
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GroupState::Uncommitted => "uncommitted",
            GroupState::Registering => "registering",
            GroupState::Established => "established",
            GroupState::Collision => "collision",
            GroupState::Failure => "failure",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_state_terminality() {
        assert!(!ClientState::Connecting.is_terminal());
        assert!(!ClientState::Running.is_terminal());
        assert!(ClientState::Collision.is_terminal());
        assert!(ClientState::Failure.is_terminal());
    }

    #[test]
    fn test_group_state_terminality() {
        assert!(!GroupState::Collision.is_terminal());
        assert!(GroupState::Failure.is_terminal());
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(ClientState::Running.to_string(), "running");
        assert_eq!(GroupState::Established.to_string(), "established");
    }
}
