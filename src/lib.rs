/// NEAR wallet toolkit with NEAR Intents support
///
/// This library provides modules for:
/// - Wallet facade: sign-in, view and change calls, balances (wallet)
/// - Wallet connectors and a local key-pair wallet (connector, keypair)
/// - NEAR JSON-RPC access and transaction signing (rpc, near_tx)
/// - NEP-413 cryptographic signing (crypto)
/// - Intent deposit, swap and withdraw flows over the solver relay (intents, relay)
/// - NEAR amount parsing and formatting (units)

pub mod config;
pub mod connector;
pub mod crypto;
pub mod error;
mod http;
pub mod intents;
pub mod keypair;
pub mod near_tx;
pub mod relay;
pub mod rpc;
pub mod units;
pub mod wallet;

pub use config::{IntentsConfig, NetworkConfig, WalletConfig};
pub use connector::{ActionRequest, TransactionRequest, WalletConnector};
pub use error::{Result, WalletError};
pub use keypair::KeyPairWallet;
pub use wallet::Wallet;
