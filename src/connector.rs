/// Wallet connection abstraction: the seam between the `Wallet` facade and
/// whatever holds the user's keys
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::crypto::{parse_public_key, Nonce};
use crate::error::{Result, WalletError};
use crate::near_tx::{AccessKey, AccessKeyPermission, Action, FunctionCallAction, PublicKey};
use crate::rpc::FinalExecutionOutcome;

// ============================================================================
// Account state
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub account_id: String,
    pub public_key: Option<String>,
    pub active: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletState {
    pub accounts: Vec<AccountState>,
}

impl WalletState {
    pub fn active_account(&self) -> Option<&AccountState> {
        self.accounts.iter().find(|account| account.active)
    }

    pub fn is_signed_in(&self) -> bool {
        !self.accounts.is_empty()
    }
}

/// Called with the new state after every sign-in or sign-out
pub type StateListener = Box<dyn Fn(&WalletState) + Send + Sync>;

// ============================================================================
// Requests
// ============================================================================

/// yoctoNEAR amounts travel as decimal strings in JSON
mod yocto {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Str(String),
        Num(u64),
    }

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u128, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Num(n) => Ok(n as u128),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum KeyPermissionRequest {
    FullAccess,
    FunctionCall {
        receiver_id: String,
        #[serde(default)]
        allowance: Option<String>,
        #[serde(default)]
        method_names: Vec<String>,
    },
}

/// Action union accepted by wallets
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "params")]
pub enum ActionRequest {
    CreateAccount,
    DeployContract {
        code: Vec<u8>,
    },
    FunctionCall {
        method_name: String,
        #[serde(default)]
        args: Value,
        gas: u64,
        #[serde(with = "yocto")]
        deposit: u128,
    },
    Transfer {
        #[serde(with = "yocto")]
        deposit: u128,
    },
    Stake {
        #[serde(with = "yocto")]
        stake: u128,
        public_key: String,
    },
    AddKey {
        public_key: String,
        access_key: KeyPermissionRequest,
    },
    DeleteKey {
        public_key: String,
    },
    DeleteAccount {
        beneficiary_id: String,
    },
}

impl ActionRequest {
    pub fn function_call(method_name: &str, args: Value, gas: u64, deposit: u128) -> Self {
        ActionRequest::FunctionCall {
            method_name: method_name.to_string(),
            args,
            gas,
            deposit,
        }
    }

    /// Zero-deposit function calls are the only actions a function-call
    /// access key may sign
    pub fn is_free_function_call(&self) -> bool {
        matches!(self, ActionRequest::FunctionCall { deposit: 0, .. })
    }

    /// Borsh action for the on-chain transaction
    pub fn to_action(&self) -> Result<Action> {
        let action = match self {
            ActionRequest::CreateAccount => Action::CreateAccount,
            ActionRequest::DeployContract { code } => Action::DeployContract(code.clone()),
            ActionRequest::FunctionCall {
                method_name,
                args,
                gas,
                deposit,
            } => {
                // absent args mean an empty object, like `args = {}`
                let args = if args.is_null() {
                    b"{}".to_vec()
                } else {
                    serde_json::to_vec(args)?
                };
                Action::FunctionCall(FunctionCallAction {
                    method_name: method_name.clone(),
                    args,
                    gas: *gas,
                    deposit: *deposit,
                })
            }
            ActionRequest::Transfer { deposit } => Action::Transfer(*deposit),
            ActionRequest::Stake { stake, public_key } => Action::Stake {
                stake: *stake,
                public_key: PublicKey::from(&parse_public_key(public_key)?),
            },
            ActionRequest::AddKey {
                public_key,
                access_key,
            } => {
                let permission = match access_key {
                    KeyPermissionRequest::FullAccess => AccessKeyPermission::FullAccess,
                    KeyPermissionRequest::FunctionCall {
                        receiver_id,
                        allowance,
                        method_names,
                    } => AccessKeyPermission::FunctionCall {
                        allowance: allowance
                            .as_deref()
                            .map(str::parse::<u128>)
                            .transpose()
                            .map_err(|e| WalletError::InvalidAmount(e.to_string()))?,
                        receiver_id: receiver_id.clone(),
                        method_names: method_names.clone(),
                    },
                };
                Action::AddKey {
                    public_key: PublicKey::from(&parse_public_key(public_key)?),
                    access_key: AccessKey { nonce: 0, permission },
                }
            }
            ActionRequest::DeleteKey { public_key } => {
                Action::DeleteKey(PublicKey::from(&parse_public_key(public_key)?))
            }
            ActionRequest::DeleteAccount { beneficiary_id } => Action::DeleteAccount(beneficiary_id.clone()),
        };
        Ok(action)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    pub receiver_id: String,
    pub actions: Vec<ActionRequest>,
}

/// NEP-413 message to be signed by the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessageParams {
    pub message: String,
    pub nonce: Nonce,
    pub recipient: String,
    pub callback_url: Option<String>,
}

/// NEP-413 wallet output; `signature` is base64
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub account_id: String,
    pub public_key: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

// ============================================================================
// Connector
// ============================================================================

pub trait WalletConnector: Send + Sync {
    fn state(&self) -> WalletState;

    fn subscribe(&self, listener: StateListener);

    /// Sign in, optionally creating a function-call access key for `contract_id`
    fn sign_in(&self, contract_id: Option<&str>) -> Result<Vec<AccountState>>;

    fn sign_out(&self) -> Result<()>;

    fn sign_and_send_transaction(&self, request: &TransactionRequest) -> Result<FinalExecutionOutcome>;

    /// Sends each transaction in order, stopping at the first failure
    fn sign_and_send_transactions(&self, requests: &[TransactionRequest]) -> Result<Vec<FinalExecutionOutcome>> {
        requests
            .iter()
            .map(|request| self.sign_and_send_transaction(request))
            .collect()
    }

    fn sign_message(&self, params: &SignMessageParams) -> Result<SignedMessage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use serde_json::json;

    #[test]
    fn test_function_call_from_json() {
        let request: ActionRequest = serde_json::from_value(json!({
            "type": "FunctionCall",
            "params": {
                "method_name": "ft_transfer_call",
                "args": { "receiver_id": "intents.near", "amount": "10", "msg": "" },
                "gas": 30_000_000_000_000u64,
                "deposit": "1"
            }
        }))
        .unwrap();

        let Action::FunctionCall(call) = request.to_action().unwrap() else {
            panic!("expected function call");
        };
        assert_eq!(call.method_name, "ft_transfer_call");
        assert_eq!(call.deposit, 1);
        let args: Value = serde_json::from_slice(&call.args).unwrap();
        assert_eq!(args["receiver_id"], "intents.near");
        assert!(!request.is_free_function_call());
    }

    #[test]
    fn test_missing_args_become_empty_object() {
        let request: ActionRequest = serde_json::from_value(json!({
            "type": "FunctionCall",
            "params": { "method_name": "near_deposit", "gas": 1, "deposit": 0 }
        }))
        .unwrap();
        assert!(request.is_free_function_call());

        let Action::FunctionCall(call) = request.to_action().unwrap() else {
            panic!("expected function call");
        };
        assert_eq!(call.args, b"{}".to_vec());
    }

    #[test]
    fn test_add_key_action() {
        let key = KeyPair::from_seed([8u8; 32]);
        let request = ActionRequest::AddKey {
            public_key: key.public_key_string(),
            access_key: KeyPermissionRequest::FunctionCall {
                receiver_id: "intents.near".to_string(),
                allowance: Some("250000000000000000000000".to_string()),
                method_names: vec![],
            },
        };
        match request.to_action().unwrap() {
            Action::AddKey { public_key, access_key } => {
                assert_eq!(public_key, PublicKey::from(&key.verifying_key()));
                assert_eq!(
                    access_key.permission,
                    AccessKeyPermission::FunctionCall {
                        allowance: Some(250_000_000_000_000_000_000_000),
                        receiver_id: "intents.near".to_string(),
                        method_names: vec![],
                    }
                );
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_active_account() {
        let state = WalletState {
            accounts: vec![
                AccountState { account_id: "a.near".into(), public_key: None, active: false },
                AccountState { account_id: "b.near".into(), public_key: None, active: true },
            ],
        };
        assert_eq!(state.active_account().map(|a| a.account_id.as_str()), Some("b.near"));
        assert!(!WalletState::default().is_signed_in());
    }
}
