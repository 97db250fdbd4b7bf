//! Wallet access and contract plumbing for the playlist portal.
//!
//! The wallet is modelled as an [EIP-1193] capability: a JSON-RPC endpoint,
//! reached through an alloy [DynProvider](alloy::providers::DynProvider),
//! which may or may not be present. Account discovery, contract reads and
//! writes and event subscription are all layered on top of that provider.
//!
//! [EIP-1193]: https://eips.ethereum.org/EIPS/eip-1193
pub mod contract;
pub mod gateway;
pub mod log;
pub mod provider;
pub mod sync;
pub mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use gateway::{
    Confirmation, ContractGateway, GatewayError, StatusSink, SubmitStatus, TransactionFailed,
};
pub use provider::{connect_http, RpcError};
pub use sync::{EventSynchronizer, LogView, Subscription, SyncError, SyncState};
pub use wallet::{SigningContext, Wallet, WalletError};

/// List of semi-official Ethereum RPC errors taken from [EIP-1474] (which is
/// stagnant), extended with the provider errors defined by [EIP-1193].
///
/// The issue of standardizing the Ethereum RPC seems to now be taking
/// place here: <https://github.com/eea-oasis/eth1.x-JSON-RPC-API-standard/issues>.
///
/// [EIP-1474]: https://github.com/ethereum/EIPs/blob/master/EIPS/eip-1474.md#error-codes
/// [EIP-1193]: https://eips.ethereum.org/EIPS/eip-1193#provider-errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    InvalidInput,
    ResourceNotFound,
    ResourceUnavailable,
    TransactionRejected,
    MethodNotSupported,
    LimitExceeded,
    JsonRpcVersion,
    UserRejectedRequest,
    Unauthorized,
    UnsupportedMethod,
    Disconnected,
    ChainDisconnected,
}

impl RpcErrorCode {
    const ALL: [RpcErrorCode; 17] = [
        RpcErrorCode::ParseError,
        RpcErrorCode::InvalidRequest,
        RpcErrorCode::MethodNotFound,
        RpcErrorCode::InvalidParams,
        RpcErrorCode::InternalError,
        RpcErrorCode::InvalidInput,
        RpcErrorCode::ResourceNotFound,
        RpcErrorCode::ResourceUnavailable,
        RpcErrorCode::TransactionRejected,
        RpcErrorCode::MethodNotSupported,
        RpcErrorCode::LimitExceeded,
        RpcErrorCode::JsonRpcVersion,
        RpcErrorCode::UserRejectedRequest,
        RpcErrorCode::Unauthorized,
        RpcErrorCode::UnsupportedMethod,
        RpcErrorCode::Disconnected,
        RpcErrorCode::ChainDisconnected,
    ];

    pub fn code(&self) -> i64 {
        match self {
            RpcErrorCode::ParseError => -32700,
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::InternalError => -32603,
            RpcErrorCode::InvalidInput => -32000,
            RpcErrorCode::ResourceNotFound => -32001,
            RpcErrorCode::ResourceUnavailable => -32002,
            RpcErrorCode::TransactionRejected => -32003,
            RpcErrorCode::MethodNotSupported => -32004,
            RpcErrorCode::LimitExceeded => -32005,
            RpcErrorCode::JsonRpcVersion => -32006,
            RpcErrorCode::UserRejectedRequest => 4001,
            RpcErrorCode::Unauthorized => 4100,
            RpcErrorCode::UnsupportedMethod => 4200,
            RpcErrorCode::Disconnected => 4900,
            RpcErrorCode::ChainDisconnected => 4901,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            RpcErrorCode::ParseError => "Invalid JSON",
            RpcErrorCode::InvalidRequest => "JSON is not a valid request object",
            RpcErrorCode::MethodNotFound => "Method does not exist",
            RpcErrorCode::InvalidParams => "Invalid method parameters",
            RpcErrorCode::InternalError => "Internal JSON-RPC error",
            RpcErrorCode::InvalidInput => "Missing or invalid parameters",
            RpcErrorCode::ResourceNotFound => "Requested resource not found",
            RpcErrorCode::ResourceUnavailable => "Requested resource not available",
            RpcErrorCode::TransactionRejected => "Transaction creation failed",
            RpcErrorCode::MethodNotSupported => "Method is not implemented",
            RpcErrorCode::LimitExceeded => "Request exceeds defined limit",
            RpcErrorCode::JsonRpcVersion => "Version of JSON-RPC protocol is not supported",
            RpcErrorCode::UserRejectedRequest => "The user rejected the request",
            RpcErrorCode::Unauthorized => "The requested method and/or account has not been authorized by the user",
            RpcErrorCode::UnsupportedMethod => "The provider does not support the requested method",
            RpcErrorCode::Disconnected => "The provider is disconnected from all chains",
            RpcErrorCode::ChainDisconnected => "The provider is not connected to the requested chain",
        }
    }

    /// Looks up the well-known code, if any.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}
