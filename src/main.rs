use intents_wallet::config::{NO_DEPOSIT, THIRTY_TGAS};
use intents_wallet::crypto::Nonce;
use intents_wallet::intents::SwapQuote;
use intents_wallet::relay::{best_quote, cheapest_quote, QuoteRequest};
use intents_wallet::{KeyPairWallet, Result, Wallet, WalletConfig, WalletError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Input/Output Types
// ============================================================================

#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Input {
    View {
        contract_id: String,
        method: String,
        #[serde(default)]
        args: Value,
    },
    Call {
        contract_id: String,
        method: String,
        #[serde(default)]
        args: Value,
        #[serde(default)]
        gas: Option<u64>,
        /// yoctoNEAR
        #[serde(default)]
        deposit: Option<String>,
    },
    Balance {
        #[serde(default)]
        account_id: Option<String>,
    },
    AccessKeys {
        #[serde(default)]
        account_id: Option<String>,
    },
    TxResult {
        tx_hash: String,
        #[serde(default)]
        sender_id: Option<String>,
    },
    Register {
        public_key: String,
    },
    Deposit {
        amount: String,
    },
    Swap {
        amount: String,
        /// Explicit quote; a relay quote for `amount` NEAR is fetched otherwise
        #[serde(default)]
        quote: Option<SwapQuote>,
        #[serde(default)]
        nonce: Option<String>,
        #[serde(default)]
        deadline_ms: Option<i64>,
    },
    Withdraw {
        amount: String,
        #[serde(default)]
        nonce: Option<String>,
        #[serde(default)]
        deadline_ms: Option<i64>,
    },
    HasPublicKey {
        public_key: String,
    },
    Quote {
        token_in: String,
        token_out: String,
        amount_in: String,
    },
    IntentStatus {
        intent_hash: String,
    },
}

#[derive(Serialize, Debug)]
struct Output {
    success: bool,
    result: Option<Value>,
    error_message: Option<String>,
}

fn write_output(output: &Output) -> Result<()> {
    print!("{}", serde_json::to_string(output)?);
    io::stdout().flush()?;
    Ok(())
}

// ============================================================================
// Wallet setup
// ============================================================================

fn load_wallet() -> Result<Wallet> {
    let config = WalletConfig::from_env()?;

    let wallet = match (env::var("NEAR_ACCOUNT_ID"), env::var("NEAR_PRIVATE_KEY")) {
        (Ok(account_id), Ok(private_key)) => {
            let connector = KeyPairWallet::new(&config.network, &account_id, &private_key)?
                .with_timeout(config.request_timeout)
                .signed_in();
            Wallet::new(config).with_connector(connector)
        }
        _ => {
            tracing::warn!("NEAR_ACCOUNT_ID / NEAR_PRIVATE_KEY not set, read-only mode");
            Wallet::new(config)
        }
    };

    if let Err(e) = wallet.start_up(|account_id| tracing::debug!(?account_id, "Account changed")) {
        tracing::debug!(error = %e, "No wallet connector");
    }
    Ok(wallet)
}

fn account_or_signed(wallet: &Wallet, account_id: Option<String>) -> Result<String> {
    account_id
        .or_else(|| wallet.signed_account_id())
        .ok_or(WalletError::NotSignedIn)
}

fn nonce_or_random(nonce: Option<String>) -> Result<Nonce> {
    match nonce {
        Some(nonce) => Nonce::from_base64(&nonce),
        None => Ok(Nonce::random()),
    }
}

// ============================================================================
// Actions
// ============================================================================

fn execute(wallet: &Wallet, input: Input) -> Result<Value> {
    let value = match input {
        Input::View {
            contract_id,
            method,
            args,
        } => wallet.view_method(&contract_id, &method, &args)?,
        Input::Call {
            contract_id,
            method,
            args,
            gas,
            deposit,
        } => {
            let deposit = match deposit {
                Some(deposit) => deposit
                    .parse::<u128>()
                    .map_err(|e| WalletError::InvalidAmount(format!("Invalid deposit '{}': {}", deposit, e)))?,
                None => NO_DEPOSIT,
            };
            let result = wallet.call_method(&contract_id, &method, args, gas.unwrap_or(THIRTY_TGAS), deposit)?;
            result.unwrap_or(Value::Null)
        }
        Input::Balance { account_id } => {
            let account_id = account_or_signed(wallet, account_id)?;
            serde_json::to_value(wallet.get_balance(&account_id)?)?
        }
        Input::AccessKeys { account_id } => {
            let account_id = account_or_signed(wallet, account_id)?;
            serde_json::to_value(wallet.get_access_keys(&account_id)?)?
        }
        Input::TxResult { tx_hash, sender_id } => {
            let result = match sender_id {
                Some(sender_id) => wallet.get_transaction_result_for(&tx_hash, &sender_id)?,
                None => wallet.get_transaction_result(&tx_hash)?,
            };
            result.unwrap_or(Value::Null)
        }
        Input::Register { public_key } => wallet.register(&public_key)?.unwrap_or(Value::Null),
        Input::Deposit { amount } => {
            let network = &wallet.config().network;
            let transactions: Vec<Value> = wallet
                .intents()
                .deposit(&amount)?
                .iter()
                .map(|o| {
                    json!({
                        "hash": o.transaction.hash,
                        "explorer_url": network.tx_explorer_url(&o.transaction.hash),
                    })
                })
                .collect();
            Value::Array(transactions)
        }
        Input::Swap {
            amount,
            quote,
            nonce,
            deadline_ms,
        } => {
            let quote = match quote {
                Some(quote) => quote,
                None => fetch_swap_quote(wallet, &amount)?,
            };
            let published = wallet
                .intents()
                .swap(&amount, &quote, nonce_or_random(nonce)?, deadline_ms)?;
            serde_json::to_value(published)?
        }
        Input::Withdraw {
            amount,
            nonce,
            deadline_ms,
        } => {
            let published = wallet
                .intents()
                .withdraw(&amount, nonce_or_random(nonce)?, deadline_ms)?;
            serde_json::to_value(published)?
        }
        Input::HasPublicKey { public_key } => Value::Bool(wallet.intents().has_public_key(&public_key)),
        Input::Quote {
            token_in,
            token_out,
            amount_in,
        } => {
            let quotes = wallet
                .relay()
                .quote(&QuoteRequest::exact_in(&token_in, &token_out, &amount_in))?;
            json!({
                "quotes": quotes,
                "best": best_quote(quotes.clone()),
            })
        }
        Input::IntentStatus { intent_hash } => {
            let status = wallet.relay().get_status(&intent_hash)?;
            json!({
                "settled": status.is_settled(),
                "failed": status.is_failed(),
                "status": status,
            })
        }
    };
    Ok(value)
}

/// Best relay quote for receiving `amount` NEAR worth of wNEAR for bridged USDC
fn fetch_swap_quote(wallet: &Wallet, amount: &str) -> Result<SwapQuote> {
    let intents = &wallet.config().intents;
    let amount_yocto = intents_wallet::units::parse_near_amount(amount)?;
    let request = QuoteRequest {
        defuse_asset_identifier_in: intents.usdc_bridged_asset.clone(),
        defuse_asset_identifier_out: intents.wrap_asset(),
        exact_amount_in: None,
        exact_amount_out: Some(amount_yocto.to_string()),
        min_deadline_ms: None,
    };

    let quote = cheapest_quote(wallet.relay().quote(&request)?)
        .ok_or_else(|| WalletError::Relay("No quotes available".to_string()))?;
    tracing::info!(
        quote_hash = %quote.quote_hash,
        amount_in = %quote.amount_in,
        expiration_time = %quote.expiration_time,
        "✅ Quote received"
    );
    Ok(SwapQuote::from(&quote))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    // Read input from stdin
    let mut input_string = String::new();
    io::stdin().read_to_string(&mut input_string)?;

    let output = match serde_json::from_str::<Input>(&input_string) {
        Ok(input) => {
            tracing::debug!(?input, "Processing request");
            match load_wallet().and_then(|wallet| execute(&wallet, input)) {
                Ok(result) => Output {
                    success: true,
                    result: Some(result),
                    error_message: None,
                },
                Err(e) => {
                    tracing::error!(error = %e, "Action failed");
                    Output {
                        success: false,
                        result: None,
                        error_message: Some(e.to_string()),
                    }
                }
            }
        }
        Err(e) => Output {
            success: false,
            result: None,
            error_message: Some(format!("Invalid input: {}", e)),
        },
    };

    write_output(&output)
}
