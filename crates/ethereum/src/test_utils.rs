//! A scripted in-memory wallet and helpers for fabricating contract data.
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use alloy::primitives::{Address, Bloom, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::rpc::json_rpc::{
    ErrorPayload, RequestPacket, Response, ResponsePacket, ResponsePayload, SerializedRequest,
};
use alloy::rpc::types::Log;
use alloy::sol_types::{sol_data, SolEvent, SolType};
use alloy::transports::{TransportError, TransportErrorKind, TransportFut};
use serde_json::{json, Value};
use songlink_common::TransactionHash;

use crate::contract::SongLinkPortal;
use crate::provider::RpcError;
use crate::wallet::Wallet;
use crate::RpcErrorCode;

type Answer = Result<Value, RpcError>;

#[derive(Clone)]
enum Reply {
    Answer(Answer),
    /// Never answers.
    Stall,
}

/// A wallet which answers from a script and records every request.
///
/// Responses registered with [respond_once](FakeWallet::respond_once) are
/// consumed in order before falling back to the one set with
/// [respond](FakeWallet::respond). Methods without any response fail with
/// [RpcErrorCode::MethodNotFound].
#[derive(Default)]
pub struct FakeWallet {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    queued: HashMap<String, VecDeque<Reply>>,
    fallback: HashMap<String, Reply>,
    calls: Vec<(String, Value)>,
}

impl FakeWallet {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answers every future `method` request with `answer`.
    pub fn respond(&self, method: &str, answer: Answer) {
        self.lock()
            .fallback
            .insert(method.to_owned(), Reply::Answer(answer));
    }

    /// Answers the next `method` request with `answer`.
    pub fn respond_once(&self, method: &str, answer: Answer) {
        self.lock()
            .queued
            .entry(method.to_owned())
            .or_default()
            .push_back(Reply::Answer(answer));
    }

    /// Leaves every future `method` request hanging, until replaced with
    /// [respond](FakeWallet::respond).
    pub fn stall(&self, method: &str) {
        self.lock().fallback.insert(method.to_owned(), Reply::Stall);
    }

    /// Parameters of every `method` request so far.
    pub fn calls(&self, method: &str) -> Vec<Value> {
        self.lock()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// A provider whose requests are all answered by this wallet.
    pub fn provider(self: &Arc<Self>) -> DynProvider {
        let client = RpcClient::new(FakeTransport(self.clone()), true);

        ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_client(client)
            .erased()
    }

    pub fn wallet(self: &Arc<Self>) -> Wallet {
        Wallet::new(self.provider())
    }

    fn record(&self, request: &SerializedRequest) -> Reply {
        let method = request.method();
        let params = request
            .params()
            .and_then(|params| serde_json::from_str(params.get()).ok())
            .unwrap_or(Value::Null);

        let mut inner = self.lock();
        inner.calls.push((method.to_owned(), params));

        if let Some(reply) = inner.queued.get_mut(method).and_then(VecDeque::pop_front) {
            return reply;
        }

        inner.fallback.get(method).cloned().unwrap_or_else(|| {
            Reply::Answer(Err(RpcError::from_code(RpcErrorCode::MethodNotFound)))
        })
    }

    async fn answer(&self, request: &SerializedRequest) -> Result<Response, TransportError> {
        let answer = match self.record(request) {
            Reply::Answer(answer) => answer,
            Reply::Stall => return std::future::pending().await,
        };

        let payload = match answer {
            Ok(value) => ResponsePayload::Success(
                serde_json::value::to_raw_value(&value).map_err(TransportError::ser_err)?,
            ),
            Err(RpcError::JsonRpc { code, message }) => ResponsePayload::Failure(ErrorPayload {
                code,
                message: message.into(),
                data: None,
            }),
            Err(e) => return Err(TransportErrorKind::custom_str(&e.to_string())),
        };

        Ok(Response {
            id: request.id().clone(),
            payload,
        })
    }
}

/// Carries requests from an alloy client to a [FakeWallet].
#[derive(Clone)]
struct FakeTransport(Arc<FakeWallet>);

impl tower::Service<RequestPacket> for FakeTransport {
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RequestPacket) -> Self::Future {
        let wallet = self.0.clone();

        Box::pin(async move {
            match request {
                RequestPacket::Single(request) => {
                    Ok(ResponsePacket::Single(wallet.answer(&request).await?))
                }
                RequestPacket::Batch(requests) => {
                    let mut responses = Vec::with_capacity(requests.len());
                    for request in &requests {
                        responses.push(wallet.answer(request).await?);
                    }
                    Ok(ResponsePacket::Batch(responses))
                }
            }
        })
    }
}

pub fn wave(sender: Address, timestamp: u64, url: &str) -> SongLinkPortal::Wave {
    SongLinkPortal::Wave {
        sender,
        playlist_url: url.to_owned(),
        timestamp: U256::from(timestamp),
    }
}

/// `eth_call` result of `getAllWaves`.
pub fn encode_waves(waves: Vec<SongLinkPortal::Wave>) -> Value {
    let data = <(sol_data::Array<SongLinkPortal::Wave>,) as SolType>::abi_encode_params(&(waves,));
    json!(Bytes::from(data))
}

/// `eth_call` result of `getTotalPlaylist`.
pub fn encode_count(count: u64) -> Value {
    let data = <(sol_data::Uint<256>,) as SolType>::abi_encode_params(&(U256::from(count),));
    json!(Bytes::from(data))
}

/// A pending `NewPlaylist` log as the portal contract emits it.
pub fn new_playlist_log(sender: Address, timestamp: u64, url: &str) -> Log {
    let event = SongLinkPortal::NewPlaylist {
        from: sender,
        timestamp: U256::from(timestamp),
        playlist_url: url.to_owned(),
    };

    Log {
        inner: alloy::primitives::Log {
            address: crate::contract::DEFAULT_ADDRESS,
            data: event.encode_log_data(),
        },
        ..Default::default()
    }
}

/// Places `log` at `log_index` within block `block`.
pub fn mined(mut log: Log, block: u64, log_index: u64) -> Log {
    log.block_number = Some(block);
    log.log_index = Some(log_index);
    log.block_hash = Some(B256::with_last_byte(block as u8));
    log
}

/// `eth_getTransactionReceipt` result of a mined transaction.
pub fn receipt(hash: TransactionHash, success: bool) -> Value {
    json!({
        "type": "0x2",
        "status": if success { "0x1" } else { "0x0" },
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": Bloom::ZERO,
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(0xbb),
        "blockNumber": "0x1",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x1",
        "from": Address::ZERO,
        "to": crate::contract::DEFAULT_ADDRESS,
        "contractAddress": null
    })
}
