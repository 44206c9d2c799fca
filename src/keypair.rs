/// Local key-pair wallet: holds a full-access key and signs everything itself
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::config::{NetworkConfig, DEFAULT_TIMEOUT};
use crate::connector::{
    AccountState, SignMessageParams, SignedMessage, StateListener, TransactionRequest, WalletConnector,
    WalletState,
};
use crate::crypto::{sign_nep413, KeyPair, Nep413Payload};
use crate::error::{Result, WalletError};
use crate::near_tx::{self, AccessKey, AccessKeyPermission, Action, PublicKey};
use crate::rpc::{FinalExecutionOutcome, JsonRpcProvider};

/// Allowance of the function-call key created on sign-in: 0.25 NEAR
pub const FUNCTION_CALL_ALLOWANCE: u128 = 250_000_000_000_000_000_000_000;

struct FunctionCallKey {
    contract_id: String,
    key: KeyPair,
}

#[derive(Default)]
struct Session {
    signed_in: bool,
    function_call_key: Option<FunctionCallKey>,
}

pub struct KeyPairWallet {
    provider: JsonRpcProvider,
    account_id: String,
    key: KeyPair,
    session: Mutex<Session>,
    listeners: Mutex<Vec<StateListener>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KeyPairWallet {
    /// New, signed-out wallet for `account_id` holding `secret_key`
    pub fn new(network: &NetworkConfig, account_id: &str, secret_key: &str) -> Result<Self> {
        Ok(Self::from_key_pair(network, account_id, KeyPair::from_secret_key(secret_key)?))
    }

    pub fn from_key_pair(network: &NetworkConfig, account_id: &str, key: KeyPair) -> Self {
        Self {
            provider: JsonRpcProvider::new(&network.node_url, DEFAULT_TIMEOUT),
            account_id: account_id.to_string(),
            key,
            session: Mutex::new(Session::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Restore an existing session: the account starts signed in
    pub fn signed_in(self) -> Self {
        lock(&self.session).signed_in = true;
        self
    }

    pub fn with_provider(mut self, provider: JsonRpcProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Timeout for the access key lookups and broadcasts of this wallet
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.provider = JsonRpcProvider::new(self.provider.url(), timeout);
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn public_key(&self) -> String {
        self.key.public_key_string()
    }

    /// Public key of the function-call key created on sign-in, if any
    pub fn function_call_public_key(&self) -> Option<String> {
        lock(&self.session)
            .function_call_key
            .as_ref()
            .map(|fc| fc.key.public_key_string())
    }

    fn ensure_signed_in(&self) -> Result<()> {
        if lock(&self.session).signed_in {
            Ok(())
        } else {
            Err(WalletError::NotSignedIn)
        }
    }

    fn notify(&self) {
        let state = self.state();
        for listener in lock(&self.listeners).iter() {
            listener(&state);
        }
    }

    /// The function-call key signs requests to its contract made only of
    /// zero-deposit calls; everything else needs the full-access key
    fn key_for(&self, request: &TransactionRequest) -> KeyPair {
        let session = lock(&self.session);
        match &session.function_call_key {
            Some(fc)
                if fc.contract_id == request.receiver_id
                    && !request.actions.is_empty()
                    && request.actions.iter().all(|a| a.is_free_function_call()) =>
            {
                fc.key.clone()
            }
            _ => self.key.clone(),
        }
    }

    fn add_function_call_key(&self, contract_id: &str) -> Result<KeyPair> {
        let fc_key = KeyPair::generate();
        tracing::info!(
            account_id = %self.account_id,
            contract_id,
            public_key = %fc_key.public_key_string(),
            "🔑 Adding function-call access key"
        );

        let add_key = Action::AddKey {
            public_key: PublicKey::from(&fc_key.verifying_key()),
            access_key: AccessKey {
                nonce: 0,
                permission: AccessKeyPermission::FunctionCall {
                    allowance: Some(FUNCTION_CALL_ALLOWANCE),
                    receiver_id: contract_id.to_string(),
                    method_names: vec![],
                },
            },
        };
        near_tx::send_actions(&self.provider, &self.account_id, &self.key, &self.account_id, vec![add_key])?;
        Ok(fc_key)
    }
}

impl WalletConnector for KeyPairWallet {
    fn state(&self) -> WalletState {
        if !lock(&self.session).signed_in {
            return WalletState::default();
        }
        WalletState {
            accounts: vec![AccountState {
                account_id: self.account_id.clone(),
                public_key: Some(self.public_key()),
                active: true,
            }],
        }
    }

    fn subscribe(&self, listener: StateListener) {
        lock(&self.listeners).push(listener);
    }

    fn sign_in(&self, contract_id: Option<&str>) -> Result<Vec<AccountState>> {
        let function_call_key = match contract_id {
            Some(contract_id) => Some(FunctionCallKey {
                contract_id: contract_id.to_string(),
                key: self.add_function_call_key(contract_id)?,
            }),
            None => None,
        };

        {
            let mut session = lock(&self.session);
            session.signed_in = true;
            if function_call_key.is_some() {
                session.function_call_key = function_call_key;
            }
        }

        tracing::info!(account_id = %self.account_id, "Signed in");
        self.notify();
        Ok(self.state().accounts)
    }

    fn sign_out(&self) -> Result<()> {
        {
            let mut session = lock(&self.session);
            session.signed_in = false;
            session.function_call_key = None;
        }

        tracing::info!(account_id = %self.account_id, "Signed out");
        self.notify();
        Ok(())
    }

    fn sign_and_send_transaction(&self, request: &TransactionRequest) -> Result<FinalExecutionOutcome> {
        self.ensure_signed_in()?;

        let actions = request
            .actions
            .iter()
            .map(|action| action.to_action())
            .collect::<Result<Vec<_>>>()?;
        let key = self.key_for(request);

        tracing::info!(
            signer_id = %self.account_id,
            receiver_id = %request.receiver_id,
            actions = actions.len(),
            "📤 Signing transaction"
        );
        near_tx::send_actions(&self.provider, &self.account_id, &key, &request.receiver_id, actions)
    }

    fn sign_message(&self, params: &SignMessageParams) -> Result<SignedMessage> {
        self.ensure_signed_in()?;

        let payload = Nep413Payload {
            message: params.message.clone(),
            nonce: params.nonce.0,
            recipient: params.recipient.clone(),
            callback_url: params.callback_url.clone(),
        };
        let signature = sign_nep413(&payload, &self.key)?;

        Ok(SignedMessage {
            account_id: self.account_id.clone(),
            public_key: self.public_key(),
            signature: BASE64.encode(signature.to_bytes()),
            state: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ActionRequest;
    use crate::crypto::{parse_public_key, verify_nep413, Nonce};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn wallet() -> KeyPairWallet {
        KeyPairWallet::from_key_pair(&NetworkConfig::testnet(), "alice.testnet", KeyPair::from_seed([6u8; 32]))
    }

    #[test]
    fn test_sign_in_and_out_notify_listeners() {
        let wallet = wallet();
        assert!(!wallet.state().is_signed_in());

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        wallet.subscribe(Box::new(move |_state: &WalletState| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let accounts = wallet.sign_in(None).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_id, "alice.testnet");
        assert_eq!(wallet.state().active_account().unwrap().account_id, "alice.testnet");

        wallet.sign_out().unwrap();
        assert!(wallet.state().active_account().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_signing_requires_sign_in() {
        let wallet = wallet();
        let params = SignMessageParams {
            message: "{}".to_string(),
            nonce: Nonce([0u8; 32]),
            recipient: "intents.near".to_string(),
            callback_url: None,
        };
        assert!(matches!(wallet.sign_message(&params), Err(WalletError::NotSignedIn)));

        let request = TransactionRequest {
            receiver_id: "wrap.near".to_string(),
            actions: vec![ActionRequest::Transfer { deposit: 1 }],
        };
        assert!(matches!(
            wallet.sign_and_send_transaction(&request),
            Err(WalletError::NotSignedIn)
        ));
    }

    #[test]
    fn test_sign_message_is_valid_nep413() {
        let wallet = wallet().signed_in();
        let params = SignMessageParams {
            message: r#"{"intents":[]}"#.to_string(),
            nonce: Nonce([3u8; 32]),
            recipient: "intents.near".to_string(),
            callback_url: None,
        };

        let signed = wallet.sign_message(&params).unwrap();
        assert_eq!(signed.account_id, "alice.testnet");

        let payload = Nep413Payload {
            message: params.message.clone(),
            nonce: params.nonce.0,
            recipient: params.recipient.clone(),
            callback_url: None,
        };
        let bytes: [u8; 64] = BASE64.decode(&signed.signature).unwrap().try_into().unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&bytes);
        let public_key = parse_public_key(&signed.public_key).unwrap();
        assert!(verify_nep413(&payload, &public_key, &signature).unwrap());
    }

    #[test]
    fn test_timeout_reaches_provider() {
        assert_eq!(wallet().provider.timeout(), DEFAULT_TIMEOUT);

        let wallet = wallet().with_timeout(Duration::from_secs(3));
        assert_eq!(wallet.provider.timeout(), Duration::from_secs(3));
        assert_eq!(wallet.provider.url(), "https://rpc.testnet.near.org");
    }

    #[test]
    fn test_full_access_key_used_without_function_call_key() {
        let wallet = wallet().signed_in();
        let request = TransactionRequest {
            receiver_id: "intents.near".to_string(),
            actions: vec![ActionRequest::function_call("has_public_key", serde_json::json!({}), 1, 0)],
        };
        assert_eq!(wallet.key_for(&request).public_key_string(), wallet.public_key());
        assert!(wallet.function_call_public_key().is_none());
    }
}
