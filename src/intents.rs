/// Intent payload construction and the deposit / swap / withdraw flows
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{IntentsConfig, DEFAULT_DEADLINE_DELTA_MS, ONE_YOCTO, THIRTY_TGAS};
use crate::connector::{ActionRequest, SignMessageParams, TransactionRequest};
use crate::crypto::Nonce;
use crate::error::{Result, WalletError};
use crate::relay::{PublishIntentParams, PublishIntentResult, Quote, SignedData};
use crate::rpc::FinalExecutionOutcome;
use crate::units::parse_near_amount;
use crate::wallet::Wallet;

// ============================================================================
// Payload types
// ============================================================================

/// Token amounts keyed by defuse asset identifier; negative values are spent
pub type TokenDiff = BTreeMap<String, String>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    TokenDiff {
        diff: TokenDiff,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        referral: Option<String>,
    },
    Transfer {
        receiver_id: String,
        tokens: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
    },
    /// `token` is the NEP-141 contract WITHOUT the "nep141:" prefix
    FtWithdraw {
        token: String,
        receiver_id: String,
        amount: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
    },
}

/// The message a wallet signs with NEP-413
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IntentMessage {
    pub deadline: String,
    pub intents: Vec<Intent>,
    pub signer_id: String,
}

/// Quote data needed to swap bridged USDC for wrapped NEAR
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    /// USDC given up, in the token's smallest unit
    pub usdc_amount: String,
    #[serde(default)]
    pub quote_hash: Option<String>,
}

impl From<&Quote> for SwapQuote {
    fn from(quote: &Quote) -> Self {
        Self {
            usdc_amount: quote.amount_in.clone(),
            quote_hash: Some(quote.quote_hash.clone()),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// ISO-8601 UTC with milliseconds, e.g. `2025-01-01T00:01:00.000Z`.
/// A delta that leaves chrono's date range is an error.
pub fn deadline_from(now: DateTime<Utc>, delta_ms: i64) -> Result<String> {
    Duration::try_milliseconds(delta_ms)
        .and_then(|delta| now.checked_add_signed(delta))
        .map(|deadline| deadline.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| WalletError::Config(format!("Deadline out of range: now + {} ms", delta_ms)))
}

pub fn deadline_in(delta_ms: i64) -> Result<String> {
    deadline_from(Utc::now(), delta_ms)
}

/// `amount * fee_bps / 10_000`, rounded down; capped at 100%
pub fn referral_fee(amount: u128, fee_bps: u16) -> u128 {
    let bps = fee_bps.min(10_000) as u128;
    amount / 10_000 * bps + amount % 10_000 * bps / 10_000
}

fn parse_token_amount(amount: &str) -> Result<u128> {
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit()) {
        return Err(WalletError::InvalidAmount(format!("Invalid token amount: '{}'", amount)));
    }
    amount
        .parse()
        .map_err(|_| WalletError::InvalidAmount(format!("Invalid token amount: '{}'", amount)))
}

/// Wrap `amount_yocto` NEAR and deposit the wNEAR into the intents contract
pub fn deposit_transaction(config: &IntentsConfig, amount_yocto: u128) -> TransactionRequest {
    TransactionRequest {
        receiver_id: config.wrap_contract.clone(),
        actions: vec![
            ActionRequest::function_call("near_deposit", json!({}), THIRTY_TGAS, amount_yocto),
            ActionRequest::function_call(
                "ft_transfer_call",
                json!({
                    "receiver_id": config.intents_contract,
                    "amount": amount_yocto.to_string(),
                    "msg": "",
                }),
                THIRTY_TGAS,
                ONE_YOCTO,
            ),
        ],
    }
}

/// Give up `quote.usdc_amount` bridged USDC for `amount_yocto` wNEAR,
/// plus the referral fee transfer when one is configured
pub fn swap_message(
    config: &IntentsConfig,
    signer_id: &str,
    amount_yocto: u128,
    quote: &SwapQuote,
    deadline: String,
) -> Result<IntentMessage> {
    parse_token_amount(&quote.usdc_amount)?;

    let mut diff = TokenDiff::new();
    diff.insert(config.usdc_bridged_asset.clone(), format!("-{}", quote.usdc_amount));
    diff.insert(config.wrap_asset(), amount_yocto.to_string());

    let mut intents = vec![Intent::TokenDiff {
        diff,
        referral: Some(config.referral.clone()),
    }];

    if let Some(fee) = &config.fee {
        let fee_amount = referral_fee(amount_yocto, fee.fee_bps);
        if fee_amount > 0 {
            intents.push(Intent::Transfer {
                receiver_id: fee.receiver_id.clone(),
                tokens: BTreeMap::from([(config.wrap_asset(), fee_amount.to_string())]),
                memo: Some("referral_fee".to_string()),
            });
        }
    }

    Ok(IntentMessage {
        deadline,
        intents,
        signer_id: signer_id.to_string(),
    })
}

/// Swap bridged USDC 1:1 into native USDC, then withdraw it to the signer
pub fn withdraw_message(
    config: &IntentsConfig,
    signer_id: &str,
    amount: &str,
    deadline: String,
) -> Result<IntentMessage> {
    parse_token_amount(amount)?;

    let mut diff = TokenDiff::new();
    diff.insert(config.usdc_bridged_asset.clone(), format!("-{}", amount));
    diff.insert(config.usdc_native_asset(), amount.to_string());

    Ok(IntentMessage {
        deadline,
        intents: vec![
            Intent::TokenDiff {
                diff,
                referral: Some(config.referral.clone()),
            },
            Intent::FtWithdraw {
                token: config.usdc_native_token.clone(),
                receiver_id: signer_id.to_string(),
                amount: amount.to_string(),
                memo: None,
            },
        ],
        signer_id: signer_id.to_string(),
    })
}

// ============================================================================
// Flows
// ============================================================================

/// Intent operations bound to a wallet, see `Wallet::intents`
pub struct Intents<'a> {
    wallet: &'a Wallet,
}

impl<'a> Intents<'a> {
    pub(crate) fn new(wallet: &'a Wallet) -> Self {
        Self { wallet }
    }

    fn config(&self) -> &IntentsConfig {
        &self.wallet.config().intents
    }

    /// Wrap `amount` NEAR and deposit it into the intents contract
    pub fn deposit(&self, amount: &str) -> Result<Vec<FinalExecutionOutcome>> {
        let result = parse_near_amount(amount).and_then(|amount_yocto| {
            let transactions = [deposit_transaction(self.config(), amount_yocto)];
            self.wallet.sign_and_send_transactions(&transactions)
        });

        match &result {
            Ok(outcomes) => {
                let hashes: Vec<&str> = outcomes.iter().map(|o| o.transaction.hash.as_str()).collect();
                tracing::info!(?hashes, "Deposit transaction result");
            }
            Err(e) => tracing::error!(error = %e, "Deposit intent failed"),
        }
        result
    }

    /// Swap bridged USDC for `amount` NEAR at the given quote
    pub fn swap(
        &self,
        amount: &str,
        quote: &SwapQuote,
        nonce: Nonce,
        deadline_delta_ms: Option<i64>,
    ) -> Result<PublishIntentResult> {
        let result = self.try_swap(amount, quote, nonce, deadline_delta_ms);
        match &result {
            Ok(published) => tracing::info!(?published, "Swap published intent result"),
            Err(e) => tracing::error!(error = %e, "Swap intent failed"),
        }
        result
    }

    fn try_swap(
        &self,
        amount: &str,
        quote: &SwapQuote,
        nonce: Nonce,
        deadline_delta_ms: Option<i64>,
    ) -> Result<PublishIntentResult> {
        let signer_id = self.wallet.signed_account_id().ok_or(WalletError::NotSignedIn)?;
        let deadline = deadline_in(deadline_delta_ms.unwrap_or(DEFAULT_DEADLINE_DELTA_MS))?;
        let amount_yocto = parse_near_amount(amount)?;

        let message = swap_message(self.config(), &signer_id, amount_yocto, quote, deadline)?;
        let quote_hashes = quote.quote_hash.iter().cloned().collect();
        self.sign_and_publish(&message, nonce, quote_hashes)
    }

    /// Convert `amount` bridged USDC to native USDC and withdraw it to the
    /// signed-in account
    pub fn withdraw(
        &self,
        amount: &str,
        nonce: Nonce,
        deadline_delta_ms: Option<i64>,
    ) -> Result<PublishIntentResult> {
        let result = self.try_withdraw(amount, nonce, deadline_delta_ms);
        match &result {
            Ok(published) => tracing::info!(?published, "Withdraw published intent result"),
            Err(e) => tracing::error!(error = %e, "Withdraw intent failed"),
        }
        result
    }

    fn try_withdraw(&self, amount: &str, nonce: Nonce, deadline_delta_ms: Option<i64>) -> Result<PublishIntentResult> {
        let signer_id = self.wallet.signed_account_id().ok_or(WalletError::NotSignedIn)?;
        let deadline = deadline_in(deadline_delta_ms.unwrap_or(DEFAULT_DEADLINE_DELTA_MS))?;

        let message = withdraw_message(self.config(), &signer_id, amount, deadline)?;
        self.sign_and_publish(&message, nonce, Vec::new())
    }

    /// Whether `public_key` is registered for the signed-in account on the
    /// intents contract. Any failure reads as `false`.
    pub fn has_public_key(&self, public_key: &str) -> bool {
        let Some(account_id) = self.wallet.signed_account_id() else {
            return false;
        };

        let result = self.wallet.view_method(
            &self.config().intents_contract,
            "has_public_key",
            &json!({ "account_id": account_id, "public_key": public_key }),
        );
        match result {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                tracing::error!(error = %e, "Error checking public key registration");
                false
            }
        }
    }

    fn sign_and_publish(
        &self,
        message: &IntentMessage,
        nonce: Nonce,
        quote_hashes: Vec<String>,
    ) -> Result<PublishIntentResult> {
        let params = SignMessageParams {
            message: serde_json::to_string(message)?,
            nonce,
            recipient: self.config().intents_contract.clone(),
            callback_url: None,
        };
        let signed = self.wallet.sign_message(&params)?;

        self.wallet.relay().publish_intent(PublishIntentParams {
            signed_data: SignedData::nep413(&params, &signed)?,
            quote_hashes,
        })
    }
}
