use crate::errors::ProviderError;
use crate::registry::{AddChainParameters, ChainId};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Notifications a wallet pushes without being asked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    ChainChanged(ChainId),
    AccountsChanged(Vec<Address>),
    Disconnected,
}

/// The wallet the session talks to.
///
/// Implementations wrap an injected browser provider, a wallet SDK, or a
/// JSON-RPC bridge. Errors carry the EIP-1193 code so the controller can tell
/// a user rejection (`4001`) and an unrecognized chain (`4902`) apart from
/// other faults.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Short identifier persisted as the "last connected wallet" marker
    fn kind(&self) -> &str;

    /// Asks the user to expose their accounts. May prompt.
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Accounts already exposed to this origin. Never prompts.
    async fn get_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError>;

    async fn get_chain_id(&self) -> Result<ChainId, ProviderError>;

    async fn switch_chain(&self, hex_chain_id: &str) -> Result<(), ProviderError>;

    async fn add_chain(&self, params: &AddChainParameters) -> Result<(), ProviderError>;

    /// Ends the provider side of the session, for wallets that have one
    async fn disconnect(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Drops whatever state the provider still holds after a failed disconnect
    fn reset(&self) {}

    /// Push notifications, for providers that support them
    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        None
    }
}
