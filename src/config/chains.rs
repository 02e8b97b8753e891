/*
 * Supported chain table and RPC endpoint templates
 */

pub const HYPEREVM_CHAIN_ID: u64 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: u64,
    pub name: &'static str,
    pub native_symbol: &'static str,
    alchemy_network: &'static str,
}

pub const SUPPORTED_CHAINS: &[ChainInfo] = &[
    ChainInfo { id: 1, name: "Ethereum", native_symbol: "ETH", alchemy_network: "eth-mainnet" },
    ChainInfo { id: 42161, name: "Arbitrum One", native_symbol: "ETH", alchemy_network: "arb-mainnet" },
    ChainInfo { id: 11_155_111, name: "Sepolia", native_symbol: "ETH", alchemy_network: "eth-sepolia" },
    ChainInfo { id: 421_614, name: "Arbitrum Sepolia", native_symbol: "ETH", alchemy_network: "arb-sepolia" },
    ChainInfo { id: 10, name: "Optimism", native_symbol: "ETH", alchemy_network: "opt-mainnet" },
    ChainInfo { id: 11_155_420, name: "Optimism Sepolia", native_symbol: "ETH", alchemy_network: "opt-sepolia" },
    ChainInfo { id: 8453, name: "Base", native_symbol: "ETH", alchemy_network: "base-mainnet" },
    ChainInfo { id: 84532, name: "Base Sepolia", native_symbol: "ETH", alchemy_network: "base-sepolia" },
    ChainInfo { id: HYPEREVM_CHAIN_ID, name: "Hyperliquid", native_symbol: "HYPE", alchemy_network: "hyperliquid-mainnet" },
];

#[must_use]
pub fn chain_info(chain_id: u64) -> Option<&'static ChainInfo> {
    SUPPORTED_CHAINS.iter().find(|c| c.id == chain_id)
}

#[must_use]
pub fn chain_name(chain_id: u64) -> String {
    chain_info(chain_id).map_or_else(|| format!("Chain {chain_id}"), |c| c.name.to_string())
}

#[must_use]
pub fn alchemy_url(chain_id: u64, api_key: &str) -> Option<String> {
    if api_key.is_empty() {
        return None;
    }
    chain_info(chain_id).map(|c| format!("https://{}.g.alchemy.com/v2/{api_key}", c.alchemy_network))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_chains() {
        assert!(chain_info(1).is_some());
        assert!(chain_info(56).is_none());
        assert_eq!(chain_name(8453), "Base");
        assert_eq!(chain_name(56), "Chain 56");
        assert_eq!(chain_info(999).map(|c| c.native_symbol), Some("HYPE"));
    }

    #[test]
    fn builds_alchemy_urls_only_with_a_key() {
        assert_eq!(
            alchemy_url(42161, "k").as_deref(),
            Some("https://arb-mainnet.g.alchemy.com/v2/k")
        );
        assert_eq!(alchemy_url(42161, ""), None);
        assert_eq!(alchemy_url(56, "k"), None);
    }
}
