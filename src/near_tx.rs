/// Simple NEAR transaction signing without near-primitives
/// Uses only ed25519-dalek + borsh + the JSON-RPC provider
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

use crate::crypto::{format_public_key, KeyPair};
use crate::error::{Result, WalletError};
use crate::rpc::{FinalExecutionOutcome, JsonRpcProvider};

// ============================================================================
// NEAR Transaction Types (minimal borsh-serializable versions)
// ============================================================================

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    ED25519([u8; 32]),
}

impl From<&VerifyingKey> for PublicKey {
    fn from(key: &VerifyingKey) -> Self {
        PublicKey::ED25519(key.to_bytes())
    }
}

/// Variant order is the on-chain borsh discriminant
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateAccount,
    DeployContract(Vec<u8>),
    FunctionCall(FunctionCallAction),
    Transfer(u128),
    Stake { stake: u128, public_key: PublicKey },
    AddKey { public_key: PublicKey, access_key: AccessKey },
    DeleteKey(PublicKey),
    DeleteAccount(String),
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessKey {
    pub nonce: u64,
    pub permission: AccessKeyPermission,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum AccessKeyPermission {
    FunctionCall {
        allowance: Option<u128>,
        receiver_id: String,
        method_names: Vec<String>,
    },
    FullAccess,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallAction {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    ED25519([u8; 64]),
}

impl Transaction {
    /// sha256 of the borsh encoding; this is both the signed message and
    /// the transaction hash shown by explorers (base58)
    pub fn hash(&self) -> Result<[u8; 32]> {
        let tx_bytes = borsh::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&tx_bytes);
        Ok(hasher.finalize().into())
    }

    pub fn sign(self, key: &KeyPair) -> Result<SignedTransaction> {
        let tx_hash = self.hash()?;
        let signature = key.sign(&tx_hash);
        Ok(SignedTransaction {
            transaction: self,
            signature: Signature::ED25519(signature.to_bytes()),
        })
    }
}

impl SignedTransaction {
    pub fn to_base64(&self) -> Result<String> {
        Ok(BASE64.encode(borsh::to_vec(self)?))
    }
}

// ============================================================================
// Sending
// ============================================================================

/// Build and sign a transaction from `signer_id` to `receiver_id`
pub fn sign_transaction(
    signer_id: &str,
    key: &KeyPair,
    nonce: u64,
    receiver_id: &str,
    block_hash: [u8; 32],
    actions: Vec<Action>,
) -> Result<SignedTransaction> {
    Transaction {
        signer_id: signer_id.to_string(),
        public_key: PublicKey::from(&key.verifying_key()),
        nonce,
        receiver_id: receiver_id.to_string(),
        block_hash,
        actions,
    }
    .sign(key)
}

/// Sign `actions` for `receiver_id` with `key` and broadcast them.
/// Nonce and block hash come from the key's access key on chain.
pub fn send_actions(
    provider: &JsonRpcProvider,
    signer_id: &str,
    key: &KeyPair,
    receiver_id: &str,
    actions: Vec<Action>,
) -> Result<FinalExecutionOutcome> {
    let verifying_key = key.verifying_key();
    let (nonce, block_hash) = get_access_key_info(provider, signer_id, &verifying_key)?;

    tracing::debug!(nonce, block_hash = %hex::encode(block_hash), "📝 Access key state");

    let signed_tx = sign_transaction(signer_id, key, nonce + 1, receiver_id, block_hash, actions)?;
    let outcome = provider.broadcast_tx_commit(&signed_tx.to_base64()?)?;

    tracing::info!(tx_hash = %outcome.transaction.hash, receiver_id, "📋 Transaction broadcast");
    outcome.check()?;
    tracing::info!(tx_hash = %outcome.transaction.hash, "✅ Transaction successful");

    Ok(outcome)
}

fn get_access_key_info(
    provider: &JsonRpcProvider,
    account_id: &str,
    public_key: &VerifyingKey,
) -> Result<(u64, [u8; 32])> {
    let access_key = provider.view_access_key(account_id, &format_public_key(public_key))?;

    let block_hash: [u8; 32] = bs58::decode(&access_key.block_hash)
        .into_vec()?
        .try_into()
        .map_err(|v: Vec<u8>| {
            WalletError::UnexpectedResponse(format!("Invalid block hash length: {} bytes", v.len()))
        })?;

    Ok((access_key.nonce, block_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    fn sample_transaction(key: &KeyPair) -> Transaction {
        Transaction {
            signer_id: "alice.near".to_string(),
            public_key: PublicKey::from(&key.verifying_key()),
            nonce: 42,
            receiver_id: "wrap.near".to_string(),
            block_hash: [5u8; 32],
            actions: vec![Action::FunctionCall(FunctionCallAction {
                method_name: "near_deposit".to_string(),
                args: b"{}".to_vec(),
                gas: 30_000_000_000_000,
                deposit: 1,
            })],
        }
    }

    #[test]
    fn test_signature_covers_transaction_hash() {
        let key = KeyPair::from_seed([2u8; 32]);
        let transaction = sample_transaction(&key);
        let hash = transaction.hash().unwrap();

        let signed = transaction.sign(&key).unwrap();
        let Signature::ED25519(bytes) = signed.signature;
        let signature = ed25519_dalek::Signature::from_bytes(&bytes);
        assert!(key.verifying_key().verify(&hash, &signature).is_ok());
    }

    #[test]
    fn test_action_discriminants() {
        let encoded = borsh::to_vec(&Action::Transfer(1)).unwrap();
        assert_eq!(encoded[0], 3);

        let add_key = Action::AddKey {
            public_key: PublicKey::ED25519([0u8; 32]),
            access_key: AccessKey {
                nonce: 0,
                permission: AccessKeyPermission::FullAccess,
            },
        };
        let encoded = borsh::to_vec(&add_key).unwrap();
        assert_eq!(encoded[0], 5);
        // key type, 32 key bytes, nonce, then the FullAccess discriminant
        assert_eq!(encoded.len(), 1 + 1 + 32 + 8 + 1);
        assert_eq!(encoded[encoded.len() - 1], 1);
    }

    #[test]
    fn test_sign_transaction_fields() {
        let key = KeyPair::from_seed([7u8; 32]);
        let signed = sign_transaction("alice.near", &key, 9, "wrap.near", [3u8; 32], vec![Action::Transfer(1)]).unwrap();
        assert_eq!(signed.transaction.nonce, 9);
        assert_eq!(signed.transaction.public_key, PublicKey::from(&key.verifying_key()));
        assert_eq!(signed.transaction.block_hash, [3u8; 32]);
    }

    #[test]
    fn test_signed_transaction_round_trip() {
        let key = KeyPair::from_seed([4u8; 32]);
        let signed = sample_transaction(&key).sign(&key).unwrap();
        let bytes = BASE64.decode(signed.to_base64().unwrap()).unwrap();
        let decoded = SignedTransaction::try_from_slice(&bytes).unwrap();
        assert_eq!(decoded, signed);
    }
}
