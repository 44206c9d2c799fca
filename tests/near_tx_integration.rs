/// Integration tests against NEAR testnet
/// Run with: cargo test --test near_tx_integration -- --ignored --nocapture
///
/// Required env vars:
/// - TEST_ACCOUNT_ID (e.g., test-swap.testnet)
/// - TEST_PRIVATE_KEY (ed25519:... or base58)
/// - TEST_TOKEN_CONTRACT (e.g., wrap.testnet)
use std::env;

use intents_wallet::config::{NetworkConfig, NO_DEPOSIT, THIRTY_TGAS};
use intents_wallet::crypto::KeyPair;
use intents_wallet::rpc::{Finality, JsonRpcProvider};
use intents_wallet::{KeyPairWallet, Wallet, WalletConfig};
use serde_json::json;

fn test_wallet() -> (Wallet, String) {
    let account_id = env::var("TEST_ACCOUNT_ID").expect("Set TEST_ACCOUNT_ID env var");
    let private_key = env::var("TEST_PRIVATE_KEY").expect("Set TEST_PRIVATE_KEY env var");

    let config = WalletConfig::new("testnet");
    let connector = KeyPairWallet::new(&config.network, &account_id, &private_key)
        .expect("Failed to parse private key")
        .signed_in();
    let wallet = Wallet::new(config).with_connector(connector);
    wallet.start_up(|_| {}).expect("start up");
    (wallet, account_id)
}

#[test]
#[ignore] // Run manually with --ignored flag
fn test_get_access_key_testnet() {
    let account_id = env::var("TEST_ACCOUNT_ID").expect("Set TEST_ACCOUNT_ID env var");
    let private_key = env::var("TEST_PRIVATE_KEY").expect("Set TEST_PRIVATE_KEY env var");

    let key = KeyPair::from_secret_key(&private_key).expect("Failed to parse private key");
    println!("🔑 Public key: {}", key.public_key_string());

    let network = NetworkConfig::testnet();
    let provider = JsonRpcProvider::new(&network.node_url, std::time::Duration::from_secs(10));
    let access_key = provider
        .view_access_key(&account_id, &key.public_key_string())
        .expect("view_access_key failed");

    println!("✅ Nonce: {}, block hash: {}", access_key.nonce, access_key.block_hash);
    assert_eq!(bs58::decode(&access_key.block_hash).into_vec().unwrap().len(), 32);
}

#[test]
#[ignore]
fn test_balance_and_access_keys_testnet() {
    let (wallet, account_id) = test_wallet();

    let balance = wallet.get_balance(&account_id).expect("get_balance failed");
    println!("💰 Balance: {} NEAR", balance);
    assert!(balance >= 0.0);

    let keys = wallet.get_access_keys(&account_id).expect("get_access_keys failed");
    println!("🔑 {} access keys", keys.len());
    assert!(!keys.is_empty());
}

#[test]
#[ignore]
fn test_storage_balance_view_testnet() {
    let (wallet, account_id) = test_wallet();
    let token_contract = env::var("TEST_TOKEN_CONTRACT").unwrap_or_else(|_| "wrap.testnet".to_string());

    let balance = wallet
        .view_method(&token_contract, "storage_balance_of", &json!({ "account_id": account_id }))
        .expect("storage_balance_of failed");
    println!("📊 Storage balance on {}: {}", token_contract, balance);

    let keys = wallet
        .provider()
        .view_access_key_list(&account_id, Finality::Final)
        .expect("view_access_key_list failed");
    assert!(!keys.is_empty());
}

#[test]
#[ignore]
fn test_call_method_testnet() {
    let (wallet, account_id) = test_wallet();
    let token_contract = env::var("TEST_TOKEN_CONTRACT").unwrap_or_else(|_| "wrap.testnet".to_string());

    // view-only method sent as a transaction: still a valid, cheap call
    let result = wallet
        .call_method(
            &token_contract,
            "storage_balance_of",
            json!({ "account_id": account_id }),
            THIRTY_TGAS,
            NO_DEPOSIT,
        )
        .expect("call_method failed");
    println!("📦 Result: {:?}", result);
}
