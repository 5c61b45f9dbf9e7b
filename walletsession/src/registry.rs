use crate::errors::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Type alias for chain ID to avoid depending on external chain types
pub type ChainId = u64;

/// Name shown for a chain that is not in the registry
pub const UNKNOWN_NETWORK_NAME: &str = "Unknown Network";
/// Coin symbol shown for a chain that is not in the registry
pub const UNKNOWN_COIN_SYMBOL: &str = "???";
/// Decimals assumed for a native coin when the registry has nothing better
pub const DEFAULT_NATIVE_DECIMALS: u8 = 18;

/// Encodes a chain ID the way providers expect it: `0x`-prefixed, lowercase, no padding.
pub fn to_hex_chain_id(chain_id: ChainId) -> String {
    format!("{chain_id:#x}")
}

/// Parses a `0x`-prefixed hex chain ID, as found in provider requests and events.
pub fn parse_hex_chain_id(hex: &str) -> Option<ChainId> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    ChainId::from_str_radix(digits, 16).ok()
}

/// Native currency metadata, as used by EIP-3085
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything a wallet needs to register a chain it does not know yet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainRegistration {
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
    pub native_currency: NativeCurrency,
}

/// A configured chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub chain_id: ChainId,
    /// Filled from `chain_id` when left empty in configuration
    #[serde(default)]
    pub hex_chain_id: String,
    pub display_name: String,
    pub native_coin_symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<ChainRegistration>,
}

/// `wallet_addEthereumChain` request parameters (EIP-3085)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParameters {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl ChainDescriptor {
    pub fn new(
        chain_id: ChainId,
        display_name: impl Into<String>,
        native_coin_symbol: impl Into<String>,
    ) -> Self {
        Self {
            chain_id,
            hex_chain_id: to_hex_chain_id(chain_id),
            display_name: display_name.into(),
            native_coin_symbol: native_coin_symbol.into(),
            registration: None,
        }
    }

    pub fn with_registration(mut self, registration: ChainRegistration) -> Self {
        self.registration = Some(registration);
        self
    }

    /// Decimals of the native coin, from the registration info when present
    pub fn native_decimals(&self) -> u8 {
        self.registration
            .as_ref()
            .map_or(DEFAULT_NATIVE_DECIMALS, |r| r.native_currency.decimals)
    }

    /// Builds the add-chain request for this chain, if it carries registration info
    pub fn add_chain_params(&self) -> Option<AddChainParameters> {
        let registration = self.registration.as_ref()?;
        Some(AddChainParameters {
            chain_id: self.hex_chain_id.clone(),
            chain_name: self.display_name.clone(),
            native_currency: registration.native_currency.clone(),
            rpc_urls: registration.rpc_urls.clone(),
            block_explorer_urls: registration.block_explorer_urls.clone(),
        })
    }

    fn normalize(mut self) -> Result<Self, RegistryError> {
        let expected = to_hex_chain_id(self.chain_id);
        if self.hex_chain_id.is_empty() {
            self.hex_chain_id = expected;
        } else if parse_hex_chain_id(&self.hex_chain_id) != Some(self.chain_id)
            || self.hex_chain_id.len() != expected.len()
        {
            return Err(RegistryError::HexMismatch {
                chain_id: self.chain_id,
                hex: self.hex_chain_id,
                expected,
            });
        } else {
            self.hex_chain_id = expected;
        }
        Ok(self)
    }
}

/// Result of looking a chain up in the registry. Lookups never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainInfo<'a> {
    Known(&'a ChainDescriptor),
    Unknown(ChainId),
}

impl ChainInfo<'_> {
    pub fn chain_id(&self) -> ChainId {
        match self {
            ChainInfo::Known(descriptor) => descriptor.chain_id,
            ChainInfo::Unknown(chain_id) => *chain_id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ChainInfo::Known(descriptor) => &descriptor.display_name,
            ChainInfo::Unknown(_) => UNKNOWN_NETWORK_NAME,
        }
    }

    pub fn coin_symbol(&self) -> &str {
        match self {
            ChainInfo::Known(descriptor) => &descriptor.native_coin_symbol,
            ChainInfo::Unknown(_) => UNKNOWN_COIN_SYMBOL,
        }
    }

    pub fn native_decimals(&self) -> u8 {
        match self {
            ChainInfo::Known(descriptor) => descriptor.native_decimals(),
            ChainInfo::Unknown(_) => DEFAULT_NATIVE_DECIMALS,
        }
    }

    /// e.g. `Polygon Mainnet (Chain ID: 137)`
    pub fn network_label(&self) -> String {
        format!("{} (Chain ID: {})", self.display_name(), self.chain_id())
    }
}

/// Fixed table of the chains the session can switch between.
///
/// Built once at startup and never mutated. Iteration follows configuration
/// order so the list can back a selection control directly.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
    index: HashMap<ChainId, usize>,
}

impl ChainRegistry {
    /// Builds a registry, rejecting duplicate chain IDs and hex IDs that do not match
    pub fn new(descriptors: Vec<ChainDescriptor>) -> Result<Self, RegistryError> {
        let mut chains = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let descriptor = descriptor.normalize()?;
            if index.insert(descriptor.chain_id, chains.len()).is_some() {
                return Err(RegistryError::DuplicateChain(descriptor.chain_id));
            }
            chains.push(descriptor);
        }

        Ok(Self { chains, index })
    }

    /// The chains shipped with the crate
    pub fn builtin() -> Self {
        let chains = builtin_chains();
        let index = chains
            .iter()
            .enumerate()
            .map(|(position, descriptor)| (descriptor.chain_id, position))
            .collect();
        Self { chains, index }
    }

    /// The builtin chains followed by `extra`
    pub fn with_chains(extra: Vec<ChainDescriptor>) -> Result<Self, RegistryError> {
        let mut descriptors = builtin_chains();
        descriptors.extend(extra);
        Self::new(descriptors)
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&ChainDescriptor> {
        self.index.get(&chain_id).map(|&position| &self.chains[position])
    }

    pub fn contains(&self, chain_id: ChainId) -> bool {
        self.index.contains_key(&chain_id)
    }

    pub fn resolve(&self, chain_id: ChainId) -> ChainInfo<'_> {
        self.get(chain_id)
            .map_or(ChainInfo::Unknown(chain_id), ChainInfo::Known)
    }

    /// Hex ID to send to the provider for `chain_id`
    pub fn hex_chain_id(&self, chain_id: ChainId) -> String {
        self.get(chain_id)
            .map_or_else(|| to_hex_chain_id(chain_id), |d| d.hex_chain_id.clone())
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.iter()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Parses a JSON array of chain descriptors
pub fn parse_chain_descriptors(json: &str) -> Result<Vec<ChainDescriptor>, RegistryError> {
    serde_json::from_str(json).map_err(|e| RegistryError::Load(e.to_string()))
}

/// Reads a JSON array of chain descriptors from disk
pub fn load_chain_descriptors(path: &Path) -> Result<Vec<ChainDescriptor>, RegistryError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| RegistryError::Load(format!("{}: {e}", path.display())))?;
    parse_chain_descriptors(&contents)
}

fn registration(
    rpc_url: &str,
    explorer_url: &str,
    currency_name: &str,
    symbol: &str,
) -> ChainRegistration {
    ChainRegistration {
        rpc_urls: vec![rpc_url.to_string()],
        block_explorer_urls: vec![explorer_url.to_string()],
        native_currency: NativeCurrency {
            name: currency_name.to_string(),
            symbol: symbol.to_string(),
            decimals: 18,
        },
    }
}

fn builtin_chains() -> Vec<ChainDescriptor> {
    vec![
        ChainDescriptor::new(1, "Ethereum Mainnet", "ETH").with_registration(registration(
            "https://mainnet.infura.io/v3/",
            "https://etherscan.io",
            "Ether",
            "ETH",
        )),
        ChainDescriptor::new(56, "BNB Smart Chain", "BNB").with_registration(registration(
            "https://bsc-dataseed.binance.org/",
            "https://bscscan.com/",
            "BNB",
            "BNB",
        )),
        ChainDescriptor::new(97, "BNB Testnet", "BNB").with_registration(registration(
            "https://data-seed-prebsc-1-s1.binance.org:8545/",
            "https://testnet.bscscan.com/",
            "BNB",
            "BNB",
        )),
        ChainDescriptor::new(137, "Polygon Mainnet", "MATIC").with_registration(registration(
            "https://polygon-rpc.com/",
            "https://polygonscan.com/",
            "MATIC",
            "MATIC",
        )),
        ChainDescriptor::new(43114, "Avalanche C-Chain", "AVAX").with_registration(registration(
            "https://api.avax.network/ext/bc/C/rpc",
            "https://snowtrace.io/",
            "Avalanche",
            "AVAX",
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_hex_ids_round_trip() {
        let registry = ChainRegistry::builtin();
        assert_eq!(registry.len(), 5);

        for descriptor in registry.chains() {
            assert_eq!(
                parse_hex_chain_id(&descriptor.hex_chain_id),
                Some(descriptor.chain_id),
                "hex id of {} does not decode back",
                descriptor.display_name
            );
            assert_eq!(descriptor.hex_chain_id, to_hex_chain_id(descriptor.chain_id));
        }
    }

    #[test]
    fn test_builtin_hex_ids_match_known_values() {
        let registry = ChainRegistry::builtin();
        assert_eq!(registry.hex_chain_id(1), "0x1");
        assert_eq!(registry.hex_chain_id(137), "0x89");
        assert_eq!(registry.hex_chain_id(56), "0x38");
        assert_eq!(registry.hex_chain_id(97), "0x61");
        assert_eq!(registry.hex_chain_id(43114), "0xa86a");
        // not registered, still encodable
        assert_eq!(registry.hex_chain_id(10), "0xa");
    }

    #[test]
    fn test_chains_keep_configuration_order() {
        let registry = ChainRegistry::builtin();
        let ids: Vec<ChainId> = registry.chains().map(|c| c.chain_id).collect();
        assert_eq!(ids, vec![1, 56, 97, 137, 43114]);
    }

    #[test]
    fn test_resolve_unknown_chain_uses_placeholders() {
        let registry = ChainRegistry::builtin();
        let info = registry.resolve(10);

        assert_eq!(info, ChainInfo::Unknown(10));
        assert_eq!(info.display_name(), "Unknown Network");
        assert_eq!(info.coin_symbol(), "???");
        assert_eq!(info.native_decimals(), 18);
        assert_eq!(info.network_label(), "Unknown Network (Chain ID: 10)");
        assert!(!registry.contains(10));
    }

    #[test]
    fn test_resolve_known_chain() {
        let registry = ChainRegistry::builtin();
        let info = registry.resolve(137);

        assert_eq!(info.display_name(), "Polygon Mainnet");
        assert_eq!(info.coin_symbol(), "MATIC");
        assert_eq!(info.network_label(), "Polygon Mainnet (Chain ID: 137)");
        assert!(registry.contains(137));
    }

    #[test]
    fn test_duplicate_chain_rejected() {
        let result = ChainRegistry::with_chains(vec![ChainDescriptor::new(1, "Mainnet again", "ETH")]);
        assert_eq!(result.unwrap_err(), RegistryError::DuplicateChain(1));
    }

    #[test]
    fn test_hex_mismatch_rejected() {
        let mut descriptor = ChainDescriptor::new(10, "OP Mainnet", "ETH");
        descriptor.hex_chain_id = "0x0a".to_string();

        let err = ChainRegistry::new(vec![descriptor]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::HexMismatch {
                chain_id: 10,
                hex: "0x0a".to_string(),
                expected: "0xa".to_string(),
            }
        );
    }

    #[test]
    fn test_uppercase_hex_is_normalized() {
        let mut descriptor = ChainDescriptor::new(43114, "Avalanche", "AVAX");
        descriptor.hex_chain_id = "0xA86A".to_string();

        let registry = ChainRegistry::new(vec![descriptor]).unwrap();
        assert_eq!(registry.hex_chain_id(43114), "0xa86a");
    }

    #[test]
    fn test_add_chain_params() {
        let registry = ChainRegistry::builtin();
        let params = registry.get(137).and_then(|c| c.add_chain_params()).unwrap();

        assert_eq!(params.chain_id, "0x89");
        assert_eq!(params.chain_name, "Polygon Mainnet");
        assert_eq!(params.native_currency.symbol, "MATIC");
        assert_eq!(params.native_currency.decimals, 18);
        assert_eq!(params.rpc_urls, vec!["https://polygon-rpc.com/".to_string()]);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["chainId"], "0x89");
        assert_eq!(json["blockExplorerUrls"][0], "https://polygonscan.com/");
        assert_eq!(json["nativeCurrency"]["decimals"], 18);
    }

    #[test]
    fn test_descriptor_without_registration_has_no_add_params() {
        let descriptor = ChainDescriptor::new(10, "OP Mainnet", "ETH");
        assert_eq!(descriptor.add_chain_params(), None);
    }

    #[test]
    fn test_parse_chain_descriptors_fills_hex() {
        let json = r#"[
            {
                "chainId": 8453,
                "displayName": "Base",
                "nativeCoinSymbol": "ETH",
                "registration": {
                    "rpcUrls": ["https://mainnet.base.org"],
                    "blockExplorerUrls": ["https://basescan.org"],
                    "nativeCurrency": { "name": "Ether", "symbol": "ETH", "decimals": 18 }
                }
            }
        ]"#;

        let registry = ChainRegistry::with_chains(parse_chain_descriptors(json).unwrap()).unwrap();
        let base = registry.get(8453).unwrap();
        assert_eq!(base.hex_chain_id, "0x2105");
        assert!(base.add_chain_params().is_some());
        assert_eq!(registry.chains().last().map(|c| c.chain_id), Some(8453));
    }

    #[test]
    fn test_parse_chain_descriptors_rejects_garbage() {
        assert!(matches!(
            parse_chain_descriptors("{ not json"),
            Err(RegistryError::Load(_))
        ));
    }

    #[test]
    fn test_parse_hex_chain_id_edge_cases() {
        assert_eq!(parse_hex_chain_id("0x0"), Some(0));
        assert_eq!(parse_hex_chain_id("0X89"), Some(137));
        assert_eq!(parse_hex_chain_id("0x"), None);
        assert_eq!(parse_hex_chain_id("89"), None);
        assert_eq!(parse_hex_chain_id("0xzz"), None);
    }
}
