/// NEAR Intents solver relay client
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connector::{SignMessageParams, SignedMessage};
use crate::error::{Result, WalletError};
use crate::rpc::{send_request, send_request_optional};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(1000);

// ============================================================================
// NEAR Intents API Types
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Nep413PayloadView {
    pub message: String,
    /// base64
    pub nonce: String,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignedData {
    pub standard: String,
    pub payload: Nep413PayloadView,
    pub public_key: String,
    /// `ed25519:<base58>`
    pub signature: String,
}

impl SignedData {
    /// Relay form of a wallet-signed NEP-413 message
    pub fn nep413(params: &SignMessageParams, signed: &SignedMessage) -> Result<Self> {
        let signature = BASE64.decode(&signed.signature)?;
        if signature.len() != 64 {
            return Err(WalletError::UnexpectedResponse(format!(
                "Invalid signature length: {}",
                signature.len()
            )));
        }

        Ok(Self {
            standard: "nep413".to_string(),
            payload: Nep413PayloadView {
                message: params.message.clone(),
                nonce: params.nonce.to_base64(),
                recipient: params.recipient.clone(),
                callback_url: params.callback_url.clone(),
            },
            public_key: signed.public_key.clone(),
            signature: format!("ed25519:{}", bs58::encode(signature).into_string()),
        })
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct PublishIntentParams {
    pub signed_data: SignedData,
    pub quote_hashes: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublishIntentResult {
    pub status: String,
    #[serde(default)]
    pub intent_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub defuse_asset_identifier_in: String,
    pub defuse_asset_identifier_out: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_amount_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_amount_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_deadline_ms: Option<u64>,
}

impl QuoteRequest {
    pub fn exact_in(token_in: &str, token_out: &str, amount_in: &str) -> Self {
        Self {
            defuse_asset_identifier_in: token_in.to_string(),
            defuse_asset_identifier_out: token_out.to_string(),
            exact_amount_in: Some(amount_in.to_string()),
            exact_amount_out: None,
            min_deadline_ms: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub quote_hash: String,
    #[serde(default)]
    pub defuse_asset_identifier_in: String,
    #[serde(default)]
    pub defuse_asset_identifier_out: String,
    pub amount_in: String,
    pub amount_out: String,
    pub expiration_time: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IntentStatus {
    pub status: String,
    #[serde(default)]
    pub intent_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl IntentStatus {
    pub fn is_settled(&self) -> bool {
        self.status == "SETTLED"
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self.status.as_str(),
            "NOT_FOUND_OR_NOT_VALID_ANYMORE" | "NOT_FOUND_OR_NOT_VALID" | "FAILED"
        )
    }
}

#[derive(Serialize)]
struct GetStatusParams<'a> {
    intent_hash: &'a str,
}

/// Quote with the highest `amount_out`, for exact-in requests
pub fn best_quote(quotes: Vec<Quote>) -> Option<Quote> {
    quotes
        .into_iter()
        .max_by_key(|q| q.amount_out.parse::<u128>().unwrap_or(0))
}

/// Quote with the lowest `amount_in`, for exact-out requests
pub fn cheapest_quote(quotes: Vec<Quote>) -> Option<Quote> {
    quotes
        .into_iter()
        .min_by_key(|q| q.amount_in.parse::<u128>().unwrap_or(u128::MAX))
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct SolverRelay {
    url: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl SolverRelay {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Attempts and pause used by `quote`
    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Publish a signed intent. Anything but status `OK` is an error.
    pub fn publish_intent(&self, params: PublishIntentParams) -> Result<PublishIntentResult> {
        tracing::info!(
            url = %self.url,
            standard = %params.signed_data.standard,
            quote_hashes = ?params.quote_hashes,
            "📤 Publishing intent"
        );
        tracing::debug!(message = %params.signed_data.payload.message, "📝 Intent message");

        let result: PublishIntentResult = send_request(&self.url, "publish_intent", [params], self.timeout)
            .map_err(relay_error)?;

        tracing::info!(status = %result.status, intent_hash = ?result.intent_hash, "📊 Publish intent result");

        if result.status != "OK" {
            return Err(WalletError::IntentRejected {
                status: result.status,
                reason: result.reason.unwrap_or_else(|| "unknown".to_string()),
            });
        }
        Ok(result)
    }

    /// All quotes solvers offered, retrying transport and relay failures
    pub fn quote(&self, request: &QuoteRequest) -> Result<Vec<Quote>> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            tracing::debug!(attempt, max = self.max_retries, "🔄 Quote API attempt");

            match send_request_optional::<_, Vec<Quote>>(&self.url, "quote", [request], self.timeout) {
                Ok(quotes) => {
                    let quotes = quotes.unwrap_or_default();
                    tracing::info!(count = quotes.len(), "✅ Quotes received");
                    return Ok(quotes);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "⚠️  Quote attempt failed");
                    last_error = Some(e);
                }
            }

            if attempt < self.max_retries {
                thread::sleep(self.retry_delay);
            }
        }

        Err(WalletError::Relay(format!(
            "Quote API failed after {} retries. Last error: {}",
            self.max_retries,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    pub fn get_status(&self, intent_hash: &str) -> Result<IntentStatus> {
        send_request(&self.url, "get_status", [GetStatusParams { intent_hash }], self.timeout)
            .map_err(relay_error)
    }
}

/// JSON-RPC errors from the relay are relay errors, not node errors
fn relay_error(err: WalletError) -> WalletError {
    match err {
        WalletError::Rpc(message) => WalletError::Relay(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Nonce;

    fn quote(hash: &str, amount_out: &str) -> Quote {
        Quote {
            quote_hash: hash.to_string(),
            defuse_asset_identifier_in: "nep141:wrap.near".to_string(),
            defuse_asset_identifier_out: "nep141:usdc.near".to_string(),
            amount_in: "1000".to_string(),
            amount_out: amount_out.to_string(),
            expiration_time: "2025-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_best_quote_picks_highest_amount_out() {
        let best = best_quote(vec![quote("a", "10"), quote("b", "300"), quote("c", "25")]).unwrap();
        assert_eq!(best.quote_hash, "b");
        assert!(best_quote(vec![]).is_none());
    }

    #[test]
    fn test_cheapest_quote_picks_lowest_amount_in() {
        let mut a = quote("a", "10");
        a.amount_in = "900".to_string();
        let mut b = quote("b", "10");
        b.amount_in = "850".to_string();
        let mut bad = quote("bad", "10");
        bad.amount_in = "not a number".to_string();

        let cheapest = cheapest_quote(vec![a, bad, b]).unwrap();
        assert_eq!(cheapest.quote_hash, "b");
        assert!(cheapest_quote(vec![]).is_none());
    }

    #[test]
    fn test_signed_data_from_wallet_output() {
        let params = SignMessageParams {
            message: "{}".to_string(),
            nonce: Nonce([1u8; 32]),
            recipient: "intents.near".to_string(),
            callback_url: None,
        };
        let signed = SignedMessage {
            account_id: "alice.near".to_string(),
            public_key: "ed25519:Abc".to_string(),
            signature: BASE64.encode([0u8; 64]),
            state: None,
        };

        let data = SignedData::nep413(&params, &signed).unwrap();
        assert_eq!(data.standard, "nep413");
        assert_eq!(data.signature, format!("ed25519:{}", bs58::encode([0u8; 64]).into_string()));
        assert_eq!(data.payload.nonce, BASE64.encode([1u8; 32]));

        let json = serde_json::to_value(&data).unwrap();
        assert!(json["payload"].get("callback_url").is_none());

        let short = SignedMessage {
            signature: BASE64.encode([0u8; 10]),
            ..signed
        };
        assert!(SignedData::nep413(&params, &short).is_err());
    }

    #[test]
    fn test_intent_status_classification() {
        let settled: IntentStatus = serde_json::from_value(serde_json::json!({
            "intent_hash": "abc",
            "status": "SETTLED",
            "data": { "hash": "tx" }
        }))
        .unwrap();
        assert!(settled.is_settled());

        let gone = IntentStatus {
            status: "NOT_FOUND_OR_NOT_VALID".to_string(),
            intent_hash: None,
            data: None,
        };
        assert!(gone.is_failed());
        assert!(!gone.is_settled());
    }
}
