use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Wallet is not signed in")]
    NotSignedIn,
    #[error("No wallet selected")]
    NoWalletSelected,
    #[error("Invalid NEAR amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[cfg(feature = "native")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Endpoint returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Relay error: {0}")]
    Relay(String),
    #[error("Intent rejected with status {status}: {reason}")]
    IntentRejected { status: String, reason: String },
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Serialization error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Base58 decode error: {0}")]
    Base58(#[from] bs58::decode::Error),
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, WalletError>;
