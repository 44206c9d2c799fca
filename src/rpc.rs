/// NEAR JSON-RPC client: queries, transaction status and broadcast
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WalletError};
use crate::http::{post_json, preview};

/// Minimum timeout for `broadcast_tx_commit`, which waits for execution
const TX_COMMIT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// JSON-RPC envelope
// ============================================================================

#[derive(Serialize)]
pub(crate) struct JsonRpcRequest<'a, T> {
    pub jsonrpc: &'a str,
    pub id: &'a str,
    pub method: &'a str,
    pub params: T,
}

impl<'a, T> JsonRpcRequest<'a, T> {
    pub fn new(method: &'a str, params: T) -> Self {
        Self {
            jsonrpc: "2.0",
            id: "dontcare",
            method,
            params,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct JsonRpcError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub cause: Option<ErrorCause>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ErrorCause {
    pub name: String,
}

impl JsonRpcError {
    pub fn describe(&self) -> String {
        let mut out = match &self.cause {
            Some(cause) => format!("{}: {}", cause.name, self.message),
            None => self.message.clone(),
        };
        if let Some(code) = self.code {
            out.push_str(&format!(" (code {})", code));
        }
        if let Some(data) = &self.data {
            out.push_str(&format!(" {}", data));
        }
        out
    }
}

/// POST one JSON-RPC request and unwrap its `result`
pub(crate) fn send_request<P: Serialize, T: DeserializeOwned>(
    url: &str,
    method: &str,
    params: P,
    timeout: Duration,
) -> Result<T> {
    send_request_optional(url, method, params, timeout)?
        .ok_or_else(|| WalletError::UnexpectedResponse(format!("No result in {} response", method)))
}

/// Like `send_request`, but a missing or null `result` is `None`
pub(crate) fn send_request_optional<P: Serialize, T: DeserializeOwned>(
    url: &str,
    method: &str,
    params: P,
    timeout: Duration,
) -> Result<Option<T>> {
    let request = JsonRpcRequest::new(method, params);
    let body = serde_json::to_vec(&request)?;

    let (status, response) = post_json(url, &body, timeout)?;
    if status != 200 {
        return Err(WalletError::HttpStatus {
            status,
            body: preview(&response, 500),
        });
    }

    tracing::trace!(method, body = %preview(&response, 500), "📥 JSON-RPC response");

    let json_response: JsonRpcResponse<T> = serde_json::from_slice(&response)?;
    if let Some(error) = json_response.error {
        return Err(WalletError::Rpc(error.describe()));
    }
    Ok(json_response.result)
}

// ============================================================================
// Query views
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Finality {
    Optimistic,
    Final,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CallResult {
    pub result: Vec<u8>,
    #[serde(default)]
    pub logs: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountView {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub locked: String,
    pub code_hash: String,
    pub storage_usage: u64,
    pub block_height: u64,
    pub block_hash: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum AccessKeyPermissionView {
    FunctionCall {
        allowance: Option<String>,
        receiver_id: String,
        method_names: Vec<String>,
    },
    FullAccess,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyView {
    pub nonce: u64,
    pub permission: AccessKeyPermissionView,
}

/// `view_access_key` result: the key plus the block it was read at
#[derive(Deserialize, Debug, Clone)]
pub struct AccessKeyState {
    pub nonce: u64,
    pub permission: AccessKeyPermissionView,
    pub block_hash: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyInfoView {
    pub public_key: String,
    pub access_key: AccessKeyView,
}

#[derive(Deserialize, Debug, Clone)]
struct AccessKeyList {
    keys: Vec<AccessKeyInfoView>,
}

// ============================================================================
// Transaction Outcome Structures (compatible with near-primitives)
// ============================================================================

/// TxExecutionError can be ActionError or InvalidTxError
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum TxExecutionError {
    ActionError {
        #[serde(rename = "ActionError")]
        action_error: ActionError,
    },
    InvalidTxError {
        #[serde(rename = "InvalidTxError")]
        invalid_tx_error: Value,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActionError {
    pub index: Option<u64>,
    pub kind: ActionErrorKind,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ActionErrorKind {
    FunctionCallError {
        #[serde(rename = "FunctionCallError")]
        function_call_error: FunctionCallErrorKind,
    },
    Other(Value),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum FunctionCallErrorKind {
    ExecutionError {
        #[serde(rename = "ExecutionError")]
        execution_error: String,
    },
    Other(Value),
}

impl std::fmt::Display for TxExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxExecutionError::ActionError { action_error } => {
                if let Some(index) = action_error.index {
                    write!(f, "action {}: ", index)?;
                }
                match &action_error.kind {
                    ActionErrorKind::FunctionCallError {
                        function_call_error: FunctionCallErrorKind::ExecutionError { execution_error },
                    } => write!(f, "Smart contract panicked: {}", execution_error),
                    ActionErrorKind::FunctionCallError {
                        function_call_error: FunctionCallErrorKind::Other(val),
                    } => write!(f, "Function call error: {}", val),
                    ActionErrorKind::Other(val) => write!(f, "Action error: {}", val),
                }
            }
            TxExecutionError::InvalidTxError { invalid_tx_error } => {
                write!(f, "Invalid transaction: {}", invalid_tx_error)
            }
        }
    }
}

/// Execution status of a transaction or receipt
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ExecutionStatusView {
    Unknown,
    Failure(TxExecutionError),
    /// base64 encoded
    SuccessValue(String),
    SuccessReceiptId(String),
}

/// Overall transaction status
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum FinalExecutionStatus {
    NotStarted,
    Started,
    Failure(TxExecutionError),
    /// base64 encoded
    SuccessValue(String),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExecutionOutcomeView {
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub receipt_ids: Vec<String>,
    pub gas_burnt: u64,
    pub tokens_burnt: String,
    pub executor_id: String,
    pub status: ExecutionStatusView,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExecutionOutcomeWithIdView {
    pub block_hash: String,
    pub id: String,
    pub outcome: ExecutionOutcomeView,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TransactionView {
    pub hash: String,
    pub signer_id: String,
    pub receiver_id: String,
    pub nonce: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FinalExecutionOutcome {
    pub status: FinalExecutionStatus,
    pub transaction: TransactionView,
    pub transaction_outcome: ExecutionOutcomeWithIdView,
    pub receipts_outcome: Vec<ExecutionOutcomeWithIdView>,
}

impl FinalExecutionOutcome {
    /// Fail on the first error found in the overall status, the transaction
    /// outcome or any receipt outcome
    pub fn check(&self) -> Result<()> {
        let tx_hash = &self.transaction.hash;
        match &self.status {
            FinalExecutionStatus::Failure(err) => {
                tracing::error!(tx_hash = %tx_hash, "❌ Transaction FAILED (top-level): {}", err);
                return Err(WalletError::TransactionFailed(err.to_string()));
            }
            FinalExecutionStatus::NotStarted => {
                return Err(WalletError::TransactionFailed("Transaction not started".to_string()));
            }
            FinalExecutionStatus::Started => {
                return Err(WalletError::TransactionFailed(
                    "Transaction still in progress".to_string(),
                ));
            }
            FinalExecutionStatus::SuccessValue(_) => {}
        }

        if let ExecutionStatusView::Failure(err) = &self.transaction_outcome.outcome.status {
            tracing::error!(tx_hash = %tx_hash, "❌ Transaction outcome FAILED: {}", err);
            return Err(WalletError::TransactionFailed(format!("Transaction outcome failed: {}", err)));
        }

        for (i, receipt_outcome) in self.receipts_outcome.iter().enumerate() {
            if let ExecutionStatusView::Failure(err) = &receipt_outcome.outcome.status {
                tracing::error!(
                    tx_hash = %tx_hash,
                    receipt = i,
                    logs = ?receipt_outcome.outcome.logs,
                    "❌ Receipt FAILED: {}",
                    err
                );
                return Err(WalletError::TransactionFailed(format!("Receipt {} failed: {}", i, err)));
            }
        }

        Ok(())
    }

    /// Decoded `SuccessValue`: parsed as JSON, or a JSON string when the
    /// value is not JSON. `None` when the transaction has no success value.
    pub fn last_result(&self) -> Result<Option<Value>> {
        let FinalExecutionStatus::SuccessValue(encoded) = &self.status else {
            return Ok(None);
        };
        let decoded = String::from_utf8(BASE64.decode(encoded)?)?;
        let value = match serde_json::from_str(&decoded) {
            Ok(value) => value,
            Err(_) => Value::String(decoded),
        };
        Ok(Some(value))
    }
}

// ============================================================================
// Provider
// ============================================================================

#[derive(Debug, Clone)]
pub struct JsonRpcProvider {
    url: String,
    timeout: Duration,
}

impl JsonRpcProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Raw `query` call; a `result.error` string is treated as an RPC error
    pub fn query<T: DeserializeOwned>(&self, params: Value) -> Result<T> {
        let result: Value = send_request(&self.url, "query", params, self.timeout)?;
        if let Some(error) = result.get("error").and_then(|e| e.as_str()) {
            return Err(WalletError::Rpc(error.to_string()));
        }
        Ok(serde_json::from_value(result)?)
    }

    /// Read-only contract call. Returns the raw bytes the method returned.
    pub fn call_function(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &[u8],
        finality: Finality,
    ) -> Result<CallResult> {
        tracing::debug!(contract_id, method_name, "🔍 View call");

        self.query(serde_json::json!({
            "request_type": "call_function",
            "finality": finality,
            "account_id": contract_id,
            "method_name": method_name,
            "args_base64": BASE64.encode(args),
        }))
    }

    pub fn view_account(&self, account_id: &str, finality: Finality) -> Result<AccountView> {
        self.query(serde_json::json!({
            "request_type": "view_account",
            "finality": finality,
            "account_id": account_id,
        }))
    }

    pub fn view_access_key(&self, account_id: &str, public_key: &str) -> Result<AccessKeyState> {
        self.query(serde_json::json!({
            "request_type": "view_access_key",
            "finality": Finality::Final,
            "account_id": account_id,
            "public_key": public_key,
        }))
    }

    pub fn view_access_key_list(&self, account_id: &str, finality: Finality) -> Result<Vec<AccessKeyInfoView>> {
        let list: AccessKeyList = self.query(serde_json::json!({
            "request_type": "view_access_key_list",
            "finality": finality,
            "account_id": account_id,
        }))?;
        Ok(list.keys)
    }

    /// Status of a transaction sent by `sender_id`
    pub fn tx_status(&self, tx_hash: &str, sender_id: &str) -> Result<FinalExecutionOutcome> {
        send_request(&self.url, "tx", [tx_hash, sender_id], self.timeout)
    }

    /// Broadcast a base64 borsh `SignedTransaction` and wait for execution
    pub fn broadcast_tx_commit(&self, signed_tx_base64: &str) -> Result<FinalExecutionOutcome> {
        tracing::debug!(url = %self.url, "📡 Sending transaction to NEAR RPC...");
        send_request(
            &self.url,
            "broadcast_tx_commit",
            [signed_tx_base64],
            self.timeout.max(TX_COMMIT_TIMEOUT),
        )
    }
}
