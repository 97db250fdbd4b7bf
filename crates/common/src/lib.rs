//! Contains core types that are widely used across the SongLink crates but
//! have no real home of their own.
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

pub mod consts;
mod entry;

pub use entry::LogEntry;

/// Ethereum chains the playlist portal contract can be deployed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chain {
    Mainnet,
    Rinkeby,
    Sepolia,
    /// Any other chain, identified by its chain ID and described by the block
    /// explorer to link to.
    Custom { chain_id: u64, explorer: url::Url },
}

impl Chain {
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Mainnet => 1,
            Chain::Rinkeby => 4,
            Chain::Sepolia => 11_155_111,
            Chain::Custom { chain_id, .. } => *chain_id,
        }
    }

    /// Base URL of the public block explorer for this chain.
    pub fn explorer(&self) -> url::Url {
        let base = match self {
            Chain::Mainnet => "https://etherscan.io/",
            Chain::Rinkeby => "https://rinkeby.etherscan.io/",
            Chain::Sepolia => "https://sepolia.etherscan.io/",
            Chain::Custom { explorer, .. } => return explorer.clone(),
        };

        url::Url::parse(base).expect("Explorer URL constants are valid")
    }

    /// Link to the explorer page of the given address.
    pub fn address_link(&self, address: &Address) -> String {
        let explorer = self.explorer();
        let base = explorer.as_str().trim_end_matches('/');
        format!("{base}/address/{address}")
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Mainnet => f.write_str("Mainnet"),
            Chain::Rinkeby => f.write_str("Rinkeby"),
            Chain::Sepolia => f.write_str("Sepolia"),
            Chain::Custom { chain_id, .. } => write!(f, "Custom({chain_id})"),
        }
    }
}

/// The hash of a submitted Ethereum transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub alloy_primitives::B256);

impl std::fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
