use std::time::Duration;

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::transports::http::Http;
use alloy::transports::{RpcError as TransportRpcError, TransportError};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;

use crate::RpcErrorCode;

/// Error returned by a wallet request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// The wallet answered with a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },
    /// The request never produced a JSON-RPC answer.
    #[error("transport error: {0}")]
    Transport(String),
    /// The answer could not be decoded into the expected type.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    pub fn from_code(code: RpcErrorCode) -> Self {
        RpcError::JsonRpc {
            code: code.code(),
            message: code.reason().to_owned(),
        }
    }

    /// The well-known error code, if this is a JSON-RPC error carrying one.
    pub fn code(&self) -> Option<RpcErrorCode> {
        match self {
            RpcError::JsonRpc { code, .. } => RpcErrorCode::from_code(*code),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(RpcErrorCode::UserRejectedRequest)
    }
}

impl From<TransportError> for RpcError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportRpcError::ErrorResp(payload) => RpcError::JsonRpc {
                code: payload.code,
                message: payload.message.into_owned(),
            },
            e @ (TransportRpcError::NullResp | TransportRpcError::DeserError { .. }) => {
                RpcError::InvalidResponse(e.to_string())
            }
            other => RpcError::Transport(other.to_string()),
        }
    }
}

/// Creates a provider for a wallet which speaks JSON-RPC 2.0 over HTTP.
///
/// This is how a wallet is reached outside of a browser: a node with unlocked
/// accounts, or a signer proxy in front of one. Requests are never retried and
/// no filler is installed, so nonces and signatures are left to the wallet.
///
/// This includes setting:
/// - the [Url](reqwest::Url)
/// - the password (if provided), sent as basic authentication together
///   with the url's username
pub fn connect_http(url: Url, password: Option<String>) -> anyhow::Result<DynProvider> {
    let mut url = url;
    let mut headers = HeaderMap::new();

    if let Some(password) = password {
        let credentials = base64::encode(format!("{}:{password}", url.username()));
        let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
            .context("Encoding wallet credentials")?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    // reqwest would otherwise turn the userinfo into its own authorization header.
    url.set_password(None)
        .map_err(|_| anyhow::anyhow!("Clearing password"))?;
    url.set_username("")
        .map_err(|_| anyhow::anyhow!("Clearing username"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .user_agent(songlink_common::consts::USER_AGENT)
        .default_headers(headers)
        .build()?;

    let http = Http::with_client(client, url);
    let is_local = http.guess_local();

    Ok(ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_client(RpcClient::new(http, is_local))
        .erased())
}
