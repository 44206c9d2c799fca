/// Wallet facade: account session, contract calls and lookups
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{json, Value};

use crate::config::{WalletConfig, ONE_YOCTO, THIRTY_TGAS};
use crate::connector::{
    AccountState, ActionRequest, SignMessageParams, SignedMessage, TransactionRequest, WalletConnector,
    WalletState,
};
use crate::error::{Result, WalletError};
use crate::intents::Intents;
use crate::relay::SolverRelay;
use crate::rpc::{AccessKeyInfoView, FinalExecutionOutcome, Finality, JsonRpcProvider};
use crate::units::yocto_to_near;

pub struct Wallet {
    config: WalletConfig,
    provider: JsonRpcProvider,
    relay: SolverRelay,
    connector: Option<Arc<dyn WalletConnector>>,
    signed_account_id: Arc<RwLock<Option<String>>>,
}

impl Wallet {
    /// # Example
    /// ```ignore
    /// let wallet = Wallet::new(WalletConfig::new("testnet").with_access_key_for("contract.testnet"))
    ///     .with_connector(KeyPairWallet::new(&network, "alice.testnet", &secret_key)?);
    /// wallet.start_up(|account_id| println!("{:?}", account_id))?;
    /// ```
    pub fn new(config: WalletConfig) -> Self {
        let provider = JsonRpcProvider::new(&config.network.node_url, config.request_timeout);
        let relay = SolverRelay::new(&config.intents.relay_url, config.request_timeout);
        Self {
            config,
            provider,
            relay,
            connector: None,
            signed_account_id: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_connector<C: WalletConnector + 'static>(mut self, connector: C) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn with_relay(mut self, relay: SolverRelay) -> Self {
        self.relay = relay;
        self
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn provider(&self) -> &JsonRpcProvider {
        &self.provider
    }

    pub fn relay(&self) -> &SolverRelay {
        &self.relay
    }

    /// Deposit, swap and withdraw intents plus the public key check
    pub fn intents(&self) -> Intents<'_> {
        Intents::new(self)
    }

    fn connector(&self) -> Result<&Arc<dyn WalletConnector>> {
        self.connector.as_ref().ok_or(WalletError::NoWalletSelected)
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Read the current session and follow future sign-ins and sign-outs.
    /// `hook` receives the active account (or `None`) after every change.
    /// Returns the signed-in account, if any.
    pub fn start_up<F>(&self, hook: F) -> Result<Option<String>>
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        let connector = self.connector()?;

        let account_id = connector.state().accounts.first().map(|a| a.account_id.clone());
        *self.signed_account_id.write().unwrap_or_else(PoisonError::into_inner) = account_id.clone();

        let signed_account_id = Arc::clone(&self.signed_account_id);
        connector.subscribe(Box::new(move |state: &WalletState| {
            let active = state.active_account().map(|a| a.account_id.clone());
            *signed_account_id.write().unwrap_or_else(PoisonError::into_inner) = active.clone();
            hook(active.as_deref());
        }));

        tracing::debug!(account_id = ?account_id, "Wallet started");
        Ok(account_id)
    }

    pub fn signed_account_id(&self) -> Option<String> {
        self.signed_account_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sign in, creating an access key for `create_access_key_for` if set
    pub fn sign_in(&self) -> Result<Vec<AccountState>> {
        self.connector()?.sign_in(self.config.create_access_key_for.as_deref())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.connector()?.sign_out()
    }

    pub fn sign_message(&self, params: &SignMessageParams) -> Result<SignedMessage> {
        self.connector()?.sign_message(params)
    }

    // ========================================================================
    // Contract calls
    // ========================================================================

    /// Read-only contract call; the result is parsed as JSON
    pub fn view_method(&self, contract_id: &str, method: &str, args: &Value) -> Result<Value> {
        let result = self.try_view_method(contract_id, method, args);
        if let Err(e) = &result {
            tracing::error!(contract_id, method, error = %e, "Error querying NEAR view method");
        }
        result
    }

    fn try_view_method(&self, contract_id: &str, method: &str, args: &Value) -> Result<Value> {
        let args = if args.is_null() {
            b"{}".to_vec()
        } else {
            serde_json::to_vec(args)?
        };
        let call = self
            .provider
            .call_function(contract_id, method, &args, Finality::Optimistic)?;
        Ok(serde_json::from_slice(&call.result)?)
    }

    /// Sign and send a single function call; returns the call's result
    pub fn call_method(
        &self,
        contract_id: &str,
        method: &str,
        args: Value,
        gas: u64,
        deposit: u128,
    ) -> Result<Option<Value>> {
        let request = TransactionRequest {
            receiver_id: contract_id.to_string(),
            actions: vec![ActionRequest::function_call(method, args, gas, deposit)],
        };
        let outcome = self.connector()?.sign_and_send_transaction(&request)?;
        outcome.last_result()
    }

    pub fn sign_and_send_transactions(&self, transactions: &[TransactionRequest]) -> Result<Vec<FinalExecutionOutcome>> {
        self.connector()?.sign_and_send_transactions(transactions)
    }

    /// Register `public_key` for the signed-in account on the intents contract
    pub fn register(&self, public_key: &str) -> Result<Option<Value>> {
        let result = self.call_method(
            &self.config.intents.intents_contract,
            "add_public_key",
            json!({ "public_key": public_key }),
            THIRTY_TGAS,
            ONE_YOCTO,
        );
        match &result {
            Ok(value) => tracing::info!(result = ?value, "Register result"),
            Err(e) => tracing::error!(error = %e, "Register failed"),
        }
        result
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Result of a transaction sent by the signed-in account
    pub fn get_transaction_result(&self, tx_hash: &str) -> Result<Option<Value>> {
        let sender_id = self.signed_account_id().ok_or(WalletError::NotSignedIn)?;
        self.get_transaction_result_for(tx_hash, &sender_id)
    }

    pub fn get_transaction_result_for(&self, tx_hash: &str, sender_id: &str) -> Result<Option<Value>> {
        self.provider.tx_status(tx_hash, sender_id)?.last_result()
    }

    /// Balance of `account_id` in NEAR
    pub fn get_balance(&self, account_id: &str) -> Result<f64> {
        let account = self.provider.view_account(account_id, Finality::Final)?;
        if account.amount.is_empty() {
            return Ok(0.0);
        }
        let yocto = account
            .amount
            .parse::<u128>()
            .map_err(|e| WalletError::UnexpectedResponse(format!("Invalid account amount: {}", e)))?;
        Ok(yocto_to_near(yocto))
    }

    pub fn get_access_keys(&self, account_id: &str) -> Result<Vec<AccessKeyInfoView>> {
        let keys = self.provider.view_access_key_list(account_id, Finality::Final)?;
        tracing::debug!(account_id, count = keys.len(), "Access keys");
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::crypto::KeyPair;
    use crate::keypair::KeyPairWallet;
    use std::sync::Mutex;

    fn key_pair_wallet() -> KeyPairWallet {
        KeyPairWallet::from_key_pair(&NetworkConfig::testnet(), "bob.testnet", KeyPair::from_seed([9u8; 32]))
    }

    #[test]
    fn test_operations_without_connector() {
        let wallet = Wallet::new(WalletConfig::default());
        assert!(matches!(wallet.start_up(|_| {}), Err(WalletError::NoWalletSelected)));
        assert!(matches!(wallet.sign_out(), Err(WalletError::NoWalletSelected)));
        assert!(matches!(
            wallet.call_method("c.near", "m", json!({}), THIRTY_TGAS, 0),
            Err(WalletError::NoWalletSelected)
        ));
        assert!(!wallet.intents().has_public_key("ed25519:abc"));
    }

    #[test]
    fn test_start_up_tracks_account_changes() {
        let wallet = Wallet::new(WalletConfig::default()).with_connector(key_pair_wallet());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let initial = wallet
            .start_up(move |account_id| sink.lock().unwrap().push(account_id.map(str::to_string)))
            .unwrap();
        assert_eq!(initial, None);
        assert_eq!(wallet.signed_account_id(), None);

        wallet.sign_in().unwrap();
        assert_eq!(wallet.signed_account_id().as_deref(), Some("bob.testnet"));

        wallet.sign_out().unwrap();
        assert_eq!(wallet.signed_account_id(), None);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("bob.testnet".to_string()), None]
        );
    }

    #[test]
    fn test_start_up_with_restored_session() {
        let wallet = Wallet::new(WalletConfig::default()).with_connector(key_pair_wallet().signed_in());
        assert_eq!(wallet.start_up(|_| {}).unwrap().as_deref(), Some("bob.testnet"));
    }

    #[test]
    fn test_intents_require_sign_in() {
        let wallet = Wallet::new(WalletConfig::default()).with_connector(key_pair_wallet());
        wallet.start_up(|_| {}).unwrap();

        let quote = crate::intents::SwapQuote {
            usdc_amount: "1".to_string(),
            quote_hash: None,
        };
        let nonce = crate::crypto::Nonce::random();
        assert!(matches!(
            wallet.intents().swap("1", &quote, nonce, None),
            Err(WalletError::NotSignedIn)
        ));
        assert!(matches!(
            wallet.intents().withdraw("1", nonce, None),
            Err(WalletError::NotSignedIn)
        ));
        assert!(matches!(
            wallet.get_transaction_result("hash"),
            Err(WalletError::NotSignedIn)
        ));
        assert!(!wallet.intents().has_public_key("ed25519:abc"));
    }
}
