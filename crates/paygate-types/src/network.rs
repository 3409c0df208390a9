//! Networks the paygate can charge on, with their statically known USDC deployments.
//!
//! x402 v1 identifies networks by name (`"base-sepolia"`), so [`Network`] serializes
//! to and parses from those names. Each network also knows its EIP-155 chain id and
//! the host of its block explorer.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Supported Base networks.
#[derive(Debug, Default, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Base mainnet (chain ID 8453).
    #[serde(rename = "base")]
    Base,
    /// Base Sepolia testnet (chain ID 84532).
    #[default]
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
    /// Base Goerli testnet (chain ID 84531), deprecated upstream but still addressable.
    #[serde(rename = "base-goerli")]
    BaseGoerli,
}

impl Network {
    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[Network::Base, Network::BaseSepolia, Network::BaseGoerli]
    }

    /// Network name as used on the x402 v1 wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
            Network::BaseGoerli => "base-goerli",
        }
    }

    /// EIP-155 chain id.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
            Network::BaseGoerli => 84531,
        }
    }

    /// Host name of the Basescan instance for this network.
    pub fn explorer_host(&self) -> &'static str {
        match self {
            Network::Base => "basescan.org",
            Network::BaseSepolia => "sepolia.basescan.org",
            Network::BaseGoerli => "goerli.basescan.org",
        }
    }

    /// The USDC deployment used to price resources on this network.
    pub fn usdc(&self) -> TokenDeployment {
        match self {
            Network::Base => TokenDeployment {
                address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                decimals: 6,
                eip712: TokenDeploymentEip712 {
                    name: "USD Coin",
                    version: "2",
                },
            },
            Network::BaseSepolia => TokenDeployment {
                address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                decimals: 6,
                eip712: TokenDeploymentEip712 {
                    name: "USDC",
                    version: "2",
                },
            },
            Network::BaseGoerli => TokenDeployment {
                address: "0xF175520C52418dfE19C8098071a252da48Cd1C19",
                decimals: 6,
                eip712: TokenDeploymentEip712 {
                    name: "USD Coin",
                    version: "2",
                },
            },
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown network: {0} (expected one of: base, base-sepolia, base-goerli)")]
pub struct NetworkParseError(pub String);

impl FromStr for Network {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::variants()
            .iter()
            .copied()
            .find(|network| network.as_str() == s)
            .ok_or_else(|| NetworkParseError(s.to_string()))
    }
}

/// EIP-712 domain of a token, needed by clients to sign transfer authorizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDeploymentEip712 {
    pub name: &'static str,
    pub version: &'static str,
}

/// An ERC-20 token deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDeployment {
    pub address: &'static str,
    pub decimals: u32,
    pub eip712: TokenDeploymentEip712,
}

impl TokenDeployment {
    /// The `extra` object advertised with payment requirements for this token.
    pub fn eip712_extra(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.eip712.name,
            "version": self.eip712.version,
        })
    }
}
