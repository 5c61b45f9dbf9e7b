use std::time::Duration;

/// Storage key of the "last connected wallet" marker
pub const LAST_WALLET_KEY: &str = "walletsession.last-connected-wallet";
/// How often the balance is re-read while connected
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Settings for a [`crate::SessionController`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub poll_interval: Duration,
    pub marker_key: String,
    /// Persist the marker on connect so the next start can restore silently
    pub auto_reconnect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            marker_key: LAST_WALLET_KEY.to_string(),
            auto_reconnect: true,
        }
    }
}

impl SessionConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}
