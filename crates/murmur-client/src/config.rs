//! Client configuration.

/// Default relay address.
pub const DEFAULT_RELAY_ADDRESS: &str = "127.0.0.1:5174";

/// Default room.
pub const DEFAULT_ROOM: &str = "lobby";

/// Where and as whom a participant connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Relay `host:port`.
    pub relay_address: String,
    /// Room to join.
    pub room: String,
    /// Display name; the relay assigns one when `None`.
    pub display_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_address: DEFAULT_RELAY_ADDRESS.to_string(),
            room: DEFAULT_ROOM.to_string(),
            display_name: None,
        }
    }
}

impl ClientConfig {
    /// Config for `room` with the default relay address.
    pub fn for_room(room: impl Into<String>) -> Self {
        Self { room: room.into(), ..Self::default() }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the relay address.
    #[must_use]
    pub fn with_relay_address(mut self, address: impl Into<String>) -> Self {
        self.relay_address = address.into();
        self
    }
}
