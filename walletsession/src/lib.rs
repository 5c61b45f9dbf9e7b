//! Wallet session management for EVM-compatible chains.
//!
//! The crate is split into a static [`registry::ChainRegistry`], the
//! [`provider::WalletProvider`] seam that an injected wallet or RPC bridge
//! implements, and the [`controller::SessionController`] that drives a
//! connection through its lifecycle.

pub mod config;
pub mod controller;
pub mod errors;
pub mod marker;
pub mod provider;
pub mod registry;
pub mod state;
pub mod test_utils;
pub mod units;

pub use alloy_primitives::{Address, U256};
pub use config::SessionConfig;
pub use controller::{RefreshOutcome, SessionController};
pub use errors::{ProviderError, RegistryError, SessionError};
pub use marker::{FileMarkerStore, MarkerStore, MemoryMarkerStore};
pub use provider::{ProviderEvent, WalletProvider};
pub use registry::{AddChainParameters, ChainDescriptor, ChainInfo, ChainRegistry};
pub use state::{Balance, ConnectionPhase, SessionState, StatusView};
