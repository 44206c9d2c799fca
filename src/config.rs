use std::env;
use std::time::Duration;

use crate::error::{Result, WalletError};

// ============================================================================
// Constants
// ============================================================================

pub const TGAS: u64 = 1_000_000_000_000;
pub const THIRTY_TGAS: u64 = 30 * TGAS;
pub const NO_DEPOSIT: u128 = 0;
pub const ONE_YOCTO: u128 = 1;

/// Default distance between "now" and an intent deadline
pub const DEFAULT_DEADLINE_DELTA_MS: i64 = 60_000;

pub const DEFAULT_RELAY_URL: &str = "https://solver-relay-v2.chaindefuser.com/rpc";
pub const DEFAULT_INTENTS_CONTRACT: &str = "intents.near";
pub const DEFAULT_WRAP_CONTRACT: &str = "wrap.near";
pub const DEFAULT_REFERRAL: &str = "near-intents.intents-referral.near";
pub const DEFAULT_FEE_RECEIVER: &str = "benevio-labs.near";

/// USDC bridged from Ethereum through omni-bridge
pub const USDC_BRIDGED_ASSET: &str =
    "nep141:eth-0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48.omft.near";
/// Native USDC token contract on NEAR
pub const USDC_NATIVE_TOKEN: &str =
    "17208628f84f5d6ad33f0da3bbbeb27ffcb398eac501a31bd6ad2011e36133a1";

/// Default HTTP timeout for RPC and relay requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network_id: String,
    pub node_url: String,
    pub explorer_url: String,
}

impl NetworkConfig {
    pub fn mainnet() -> Self {
        Self::for_network("mainnet")
    }

    pub fn testnet() -> Self {
        Self::for_network("testnet")
    }

    /// Public RPC endpoint conventions: `https://rpc.{network}.near.org`
    pub fn for_network(network_id: &str) -> Self {
        let explorer_url = match network_id {
            "mainnet" => "https://nearblocks.io".to_string(),
            other => format!("https://{}.nearblocks.io", other),
        };
        Self {
            network_id: network_id.to_string(),
            node_url: format!("https://rpc.{}.near.org", network_id),
            explorer_url,
        }
    }

    pub fn with_node_url(mut self, node_url: impl Into<String>) -> Self {
        self.node_url = node_url.into();
        self
    }

    pub fn tx_explorer_url(&self, tx_hash: &str) -> String {
        format!("{}/txns/{}", self.explorer_url, tx_hash)
    }
}

// ============================================================================
// Intents
// ============================================================================

/// Referral fee charged on swaps, in basis points of the output amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeConfig {
    pub receiver_id: String,
    pub fee_bps: u16,
}

impl FeeConfig {
    pub fn new(fee_bps: u16) -> Self {
        Self {
            receiver_id: DEFAULT_FEE_RECEIVER.to_string(),
            fee_bps,
        }
    }

    pub fn with_receiver(mut self, receiver_id: impl Into<String>) -> Self {
        self.receiver_id = receiver_id.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentsConfig {
    pub relay_url: String,
    pub intents_contract: String,
    pub wrap_contract: String,
    pub referral: String,
    pub usdc_bridged_asset: String,
    pub usdc_native_token: String,
    /// `None` disables the referral fee transfer on swaps
    pub fee: Option<FeeConfig>,
}

impl Default for IntentsConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            intents_contract: DEFAULT_INTENTS_CONTRACT.to_string(),
            wrap_contract: DEFAULT_WRAP_CONTRACT.to_string(),
            referral: DEFAULT_REFERRAL.to_string(),
            usdc_bridged_asset: USDC_BRIDGED_ASSET.to_string(),
            usdc_native_token: USDC_NATIVE_TOKEN.to_string(),
            fee: None,
        }
    }
}

impl IntentsConfig {
    /// Defuse asset identifier of wrapped NEAR, e.g. `nep141:wrap.near`
    pub fn wrap_asset(&self) -> String {
        format!("nep141:{}", self.wrap_contract)
    }

    pub fn usdc_native_asset(&self) -> String {
        format!("nep141:{}", self.usdc_native_token)
    }
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network: NetworkConfig,
    /// Contract to create a function-call access key for on sign-in
    pub create_access_key_for: Option<String>,
    pub intents: IntentsConfig,
    pub request_timeout: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self::new("testnet")
    }
}

impl WalletConfig {
    pub fn new(network_id: &str) -> Self {
        Self {
            network: NetworkConfig::for_network(network_id),
            create_access_key_for: None,
            intents: IntentsConfig::default(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_access_key_for(mut self, contract_id: impl Into<String>) -> Self {
        self.create_access_key_for = Some(contract_id.into());
        self
    }

    pub fn with_intents(mut self, intents: IntentsConfig) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build a configuration from environment variables.
    ///
    /// * `NEAR_NETWORK_ID` - network to connect to (default `testnet`)
    /// * `NEAR_RPC_URL` - overrides the network's public RPC endpoint
    /// * `NEAR_CONTRACT_ID` - contract to create an access key for on sign-in
    /// * `INTENTS_RELAY_URL` - solver relay endpoint
    /// * `INTENTS_CONTRACT_ID` - verifying contract (default `intents.near`)
    /// * `INTENTS_FEE_BPS` - enables the swap referral fee
    pub fn from_env() -> Result<Self> {
        let network_id = env::var("NEAR_NETWORK_ID").unwrap_or_else(|_| "testnet".to_string());
        let mut config = Self::new(&network_id);

        if let Ok(rpc_url) = env::var("NEAR_RPC_URL") {
            config.network.node_url = rpc_url;
        }
        if let Ok(contract_id) = env::var("NEAR_CONTRACT_ID") {
            config.create_access_key_for = Some(contract_id);
        }
        if let Ok(relay_url) = env::var("INTENTS_RELAY_URL") {
            config.intents.relay_url = relay_url;
        }
        if let Ok(intents_contract) = env::var("INTENTS_CONTRACT_ID") {
            config.intents.intents_contract = intents_contract;
        }
        if let Ok(fee_bps) = env::var("INTENTS_FEE_BPS") {
            let fee_bps = fee_bps
                .parse::<u16>()
                .map_err(|e| WalletError::Config(format!("INTENTS_FEE_BPS: {}", e)))?;
            config.intents.fee = Some(FeeConfig::new(fee_bps));
        }

        Ok(config)
    }
}
