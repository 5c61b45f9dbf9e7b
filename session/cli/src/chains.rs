use std::path::Path;

use walletsession::registry::{ChainId, load_chain_descriptors, parse_hex_chain_id};
use walletsession::{ChainRegistry, RegistryError};

/// Builds the registry: the built-in chains plus any descriptors in `extra`.
pub fn load_registry(extra: Option<&Path>) -> Result<ChainRegistry, RegistryError> {
    match extra {
        Some(path) => ChainRegistry::with_chains(load_chain_descriptors(path)?),
        None => Ok(ChainRegistry::builtin()),
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Parses a chain argument given as a decimal ID, a `0x` hex ID, or a chain name.
///
/// Names match case-insensitively with any punctuation treated as a dash, so
/// `polygon-mainnet` and `"Polygon Mainnet"` both find chain 137. Numeric IDs
/// are returned even when the registry does not know them.
#[must_use]
pub fn parse_chain(arg: &str, registry: &ChainRegistry) -> Option<ChainId> {
    let arg = arg.trim();
    if let Some(chain_id) = parse_hex_chain_id(arg) {
        return Some(chain_id);
    }
    if let Ok(chain_id) = arg.parse::<ChainId>() {
        return Some(chain_id);
    }
    let wanted = slug(arg);
    registry
        .chains()
        .find(|descriptor| slug(&descriptor.display_name) == wanted)
        .map(|descriptor| descriptor.chain_id)
}

/// Returns the name form of every configured chain, in registry order.
#[must_use]
pub fn available_chains(registry: &ChainRegistry) -> Vec<String> {
    registry
        .chains()
        .map(|descriptor| slug(&descriptor.display_name))
        .collect()
}
