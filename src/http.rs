/// Blocking JSON POST used by the RPC and relay clients.
/// reqwest on native targets, wasi-http-client inside WASI workers.
use std::time::Duration;

use crate::error::Result;

#[cfg(not(any(feature = "native", feature = "wasi")))]
compile_error!("enable either the `native` or the `wasi` feature");

/// POST a JSON body, returning the status code and raw response body
#[cfg(feature = "native")]
pub(crate) fn post_json(url: &str, body: &[u8], timeout: Duration) -> Result<(u16, Vec<u8>)> {
    let response = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body.to_vec())
        .send()?;

    let status = response.status().as_u16();
    let body = response.bytes()?.to_vec();
    Ok((status, body))
}

/// POST a JSON body, returning the status code and raw response body
#[cfg(all(feature = "wasi", not(feature = "native")))]
pub(crate) fn post_json(url: &str, body: &[u8], timeout: Duration) -> Result<(u16, Vec<u8>)> {
    use crate::error::WalletError;

    let response = wasi_http_client::Client::new()
        .post(url)
        .header("Content-Type", "application/json")
        .connect_timeout(timeout)
        .body(body)
        .send()
        .map_err(|e| WalletError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .body()
        .map_err(|e| WalletError::Transport(e.to_string()))?;
    Ok((status, body))
}

/// Cut a response body down for logging
pub(crate) fn preview(body: &[u8], max_chars: usize) -> String {
    String::from_utf8_lossy(body).chars().take(max_chars).collect()
}
