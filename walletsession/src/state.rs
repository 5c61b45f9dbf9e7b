use crate::registry::{ChainId, ChainRegistry};
use alloy_primitives::Address;
use serde::Serialize;
use std::fmt;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    /// A connection request is waiting on the wallet
    Connecting,
    Connected,
    /// A network switch is in flight. Always returns to `Connected`.
    SwitchingNetwork,
}

impl ConnectionPhase {
    /// Whether an account is attached in this phase
    pub fn has_account(self) -> bool {
        matches!(self, Self::Connected | Self::SwitchingNetwork)
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Disconnected => write!(f, "Disconnected"),
            ConnectionPhase::Connecting => write!(f, "Connecting"),
            ConnectionPhase::Connected => write!(f, "Connected"),
            ConnectionPhase::SwitchingNetwork => write!(f, "Switching network"),
        }
    }
}

/// Native balance as displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub amount: String,
    pub symbol: String,
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.symbol)
    }
}

/// Snapshot of the session as observers see it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub phase: ConnectionPhase,
    pub account: Option<Address>,
    pub active_chain_id: Option<ChainId>,
    pub balance: Option<Balance>,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.phase.has_account() && self.account.is_some()
    }

    /// Projects the state into display lines using `registry` for chain names
    pub fn view(&self, registry: &ChainRegistry) -> StatusView {
        StatusView {
            status: self.phase.to_string(),
            address: self.account.map(|a| a.to_string()),
            balance: self.balance.as_ref().map(ToString::to_string),
            network: self
                .active_chain_id
                .map(|chain_id| registry.resolve(chain_id).network_label()),
        }
    }
}

/// Render-ready status lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status: {}", self.status)?;
        if let Some(address) = &self.address {
            write!(f, "\nAddress: {address}")?;
        }
        if let Some(balance) = &self.balance {
            write!(f, "\nBalance: {balance}")?;
        }
        if let Some(network) = &self.network {
            write!(f, "\nNetwork: {network}")?;
        }
        Ok(())
    }
}
