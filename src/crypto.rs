use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{Result, WalletError};

const ED25519_PREFIX: &str = "ed25519:";

/// NEP-413 discriminant prepended to the payload before hashing: 2^31 + 413
const NEP413_TAG: u32 = 2_147_483_648 + 413;

// ============================================================================
// Keys
// ============================================================================

/// Ed25519 key pair in NEAR format
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Parse a secret key, with or without the `ed25519:` prefix.
    /// Accepts the 32-byte seed or the 64-byte seed + public key form.
    pub fn from_secret_key(secret_key: &str) -> Result<Self> {
        let key_str = secret_key.strip_prefix(ED25519_PREFIX).unwrap_or(secret_key);
        let key_bytes = bs58::decode(key_str)
            .into_vec()
            .map_err(|e| WalletError::InvalidKey(format!("Failed to decode private key: {}", e)))?;

        if key_bytes.len() != 32 && key_bytes.len() != 64 {
            return Err(WalletError::InvalidKey(format!(
                "Invalid private key length: {}",
                key_bytes.len()
            )));
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&key_bytes[..32]);
        let signing_key = SigningKey::from_bytes(&seed);

        // 64-byte keys carry their public half, which must match the seed
        if key_bytes.len() == 64 && signing_key.verifying_key().as_bytes()[..] != key_bytes[32..] {
            return Err(WalletError::InvalidKey(
                "Public half of private key does not match seed".to_string(),
            ));
        }

        Ok(Self { signing_key })
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// `ed25519:<base58>` public key
    pub fn public_key_string(&self) -> String {
        format_public_key(&self.verifying_key())
    }

    /// `ed25519:<base58>` of seed + public key, the form NEAR tooling stores
    pub fn secret_key_string(&self) -> String {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&self.signing_key.to_bytes());
        bytes.extend_from_slice(self.verifying_key().as_bytes());
        format!("{}{}", ED25519_PREFIX, bs58::encode(bytes).into_string())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_string())
            .finish()
    }
}

pub fn format_public_key(key: &VerifyingKey) -> String {
    format!("{}{}", ED25519_PREFIX, bs58::encode(key.to_bytes()).into_string())
}

/// Parse an `ed25519:<base58>` public key
pub fn parse_public_key(public_key: &str) -> Result<VerifyingKey> {
    let key_str = public_key.strip_prefix(ED25519_PREFIX).unwrap_or(public_key);
    let bytes: [u8; 32] = bs58::decode(key_str)
        .into_vec()?
        .try_into()
        .map_err(|v: Vec<u8>| WalletError::InvalidKey(format!("Invalid public key length: {}", v.len())))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| WalletError::InvalidKey(e.to_string()))
}

// ============================================================================
// NEP-413
// ============================================================================

/// 32-byte NEP-413 nonce
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; 32]);

impl Nonce {
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Decode a base64 nonce. Shorter input is right-padded with zeros.
    pub fn from_base64(nonce: &str) -> Result<Self> {
        let nonce_bytes = BASE64
            .decode(nonce)
            .map_err(|e| WalletError::InvalidNonce(format!("Failed to decode nonce: {}", e)))?;
        if nonce_bytes.len() > 32 {
            return Err(WalletError::InvalidNonce("Nonce too long".to_string()));
        }
        let mut bytes = [0u8; 32];
        bytes[..nonce_bytes.len()].copy_from_slice(&nonce_bytes);
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

/// NEP-413 Payload structure
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Nep413Payload {
    pub message: String,
    pub nonce: [u8; 32],
    pub recipient: String,
    pub callback_url: Option<String>,
}

impl Nep413Payload {
    /// sha256(discriminant || borsh(payload))
    pub fn hash(&self) -> Result<[u8; 32]> {
        let borsh_payload = borsh::to_vec(self)?;

        let mut hasher = Sha256::new();
        hasher.update(NEP413_TAG.to_le_bytes());
        hasher.update(&borsh_payload);
        Ok(hasher.finalize().into())
    }
}

/// Sign a NEP-413 payload. Returns the raw ed25519 signature.
pub fn sign_nep413(payload: &Nep413Payload, key: &KeyPair) -> Result<Signature> {
    let hash_to_sign = payload.hash()?;
    Ok(key.sign(&hash_to_sign))
}

pub fn verify_nep413(payload: &Nep413Payload, public_key: &VerifyingKey, signature: &Signature) -> Result<bool> {
    let hash = payload.hash()?;
    Ok(public_key.verify(&hash, signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_payload() -> Nep413Payload {
        Nep413Payload {
            message: r#"{"signer_id":"test.near","deadline":"2025-01-01T00:00:00.000Z","intents":[]}"#
                .to_string(),
            nonce: [0u8; 32],
            recipient: "intents.near".to_string(),
            callback_url: None,
        }
    }

    #[test]
    fn test_nep413_signing() {
        let key = KeyPair::from_seed([1u8; 32]);
        let payload = test_payload();

        let signature = sign_nep413(&payload, &key).unwrap();
        assert!(verify_nep413(&payload, &key.verifying_key(), &signature).unwrap());

        let mut tampered = payload.clone();
        tampered.recipient = "evil.near".to_string();
        assert!(!verify_nep413(&tampered, &key.verifying_key(), &signature).unwrap());
    }

    #[test]
    fn test_nep413_hash_layout() {
        let payload = test_payload();

        let mut expected = Sha256::new();
        expected.update(NEP413_TAG.to_le_bytes());
        expected.update(borsh::to_vec(&payload).unwrap());
        let expected: [u8; 32] = expected.finalize().into();

        assert_eq!(payload.hash().unwrap(), expected);
        assert_eq!(NEP413_TAG.to_le_bytes(), [0x9d, 0x01, 0x00, 0x80]);
    }

    #[test]
    fn test_secret_key_round_trip() {
        let key = KeyPair::from_seed([7u8; 32]);
        let parsed = KeyPair::from_secret_key(&key.secret_key_string()).unwrap();
        assert_eq!(parsed.public_key_string(), key.public_key_string());

        // bare 32-byte seed without prefix
        let seed_only = bs58::encode([7u8; 32]).into_string();
        let parsed = KeyPair::from_secret_key(&seed_only).unwrap();
        assert_eq!(parsed.public_key_string(), key.public_key_string());
    }

    #[test]
    fn test_secret_key_rejects_bad_input() {
        assert!(matches!(
            KeyPair::from_secret_key("ed25519:abc"),
            Err(WalletError::InvalidKey(_))
        ));
        assert!(KeyPair::from_secret_key("ed25519:0OIl").is_err());

        let mut bytes = [7u8; 64];
        bytes[40] ^= 0xff;
        let mismatched = bs58::encode(bytes).into_string();
        assert!(KeyPair::from_secret_key(&mismatched).is_err());
    }

    #[test]
    fn test_parse_public_key() {
        let key = KeyPair::from_seed([3u8; 32]);
        let parsed = parse_public_key(&key.public_key_string()).unwrap();
        assert_eq!(parsed, key.verifying_key());
        assert!(parse_public_key("ed25519:111").is_err());
    }

    #[test]
    fn test_nonce_padding() {
        let short = Nonce::from_base64(&BASE64.encode([9u8; 4])).unwrap();
        assert_eq!(&short.0[..4], &[9u8; 4]);
        assert_eq!(&short.0[4..], &[0u8; 28]);

        assert!(Nonce::from_base64(&BASE64.encode([1u8; 33])).is_err());
        assert!(Nonce::from_base64("not base64!").is_err());

        let nonce = Nonce::random();
        assert_eq!(Nonce::from_base64(&nonce.to_base64()).unwrap(), nonce);
    }
}
