//! Typed access to the portal contract through a [SigningContext].
use std::time::Duration;

use alloy::contract::Error as ContractError;
use alloy::network::ReceiptResponse;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::BlockId;
use anyhow::Context;
use songlink_common::{LogEntry, TransactionHash};

use crate::contract::SongLinkPortal::{self, SongLinkPortalInstance};
use crate::contract::GAS_LIMIT;
use crate::provider::RpcError;
use crate::wallet::SigningContext;

/// Error returned by the contract reads.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Decode(#[from] anyhow::Error),
}

impl From<ContractError> for GatewayError {
    fn from(error: ContractError) -> Self {
        match error {
            ContractError::TransportError(e) => GatewayError::Rpc(e.into()),
            other => GatewayError::Decode(other.into()),
        }
    }
}

/// Why a submission did not make it on-chain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransactionFailed {
    #[error("transaction rejected by the user")]
    Rejected,
    #[error("transaction {0} reverted")]
    Reverted(TransactionHash),
    #[error("transaction {0} not confirmed within {1:?}")]
    Timeout(TransactionHash, Duration),
    #[error("wallet request failed: {0}")]
    Provider(RpcError),
}

impl From<ContractError> for TransactionFailed {
    fn from(error: ContractError) -> Self {
        let error = match error {
            ContractError::TransportError(e) => RpcError::from(e),
            other => RpcError::InvalidResponse(other.to_string()),
        };

        match error.is_user_rejection() {
            true => TransactionFailed::Rejected,
            false => TransactionFailed::Provider(error),
        }
    }
}

/// Progress of a single submission, in the order it is reported.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStatus {
    Submitting,
    /// Accepted into the pending pool.
    Mining(TransactionHash),
    Mined(TransactionHash),
    Failed(TransactionFailed),
}

/// Receives the progress of a submission.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait StatusSink: Send + Sync {
    fn report(&self, status: SubmitStatus);
}

/// How long and how often to wait for a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(4),
            timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// The portal contract bound to a fixed address and signer.
#[derive(Clone)]
pub struct ContractGateway {
    contract: SongLinkPortalInstance<DynProvider>,
    signer: SigningContext,
    confirmation: Confirmation,
}

impl ContractGateway {
    pub fn new(address: Address, signer: SigningContext) -> Self {
        Self {
            contract: SongLinkPortal::new(address, signer.provider().clone()),
            signer,
            confirmation: Confirmation::default(),
        }
    }

    pub fn with_confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn address(&self) -> Address {
        *self.contract.address()
    }

    pub fn signer(&self) -> &SigningContext {
        &self.signer
    }

    /// Number of the wallet's latest block.
    pub async fn block_number(&self) -> Result<u64, GatewayError> {
        let block = self
            .signer
            .provider()
            .get_block_number()
            .await
            .map_err(RpcError::from)?;

        Ok(block)
    }

    /// Number of playlists submitted so far.
    pub async fn read_total_count(&self) -> Result<u64, GatewayError> {
        let count = self
            .contract
            .getTotalPlaylist()
            .from(self.signer.account())
            .call()
            .await?;

        Ok(u64::try_from(count)
            .ok()
            .context("Playlist count out of range")?)
    }

    /// Every playlist ever submitted, oldest first.
    pub async fn read_all_entries(&self) -> Result<Vec<LogEntry>, GatewayError> {
        self.read_entries(BlockId::latest()).await
    }

    /// Every playlist submitted up to and including `block`, oldest first.
    pub async fn read_all_entries_at(&self, block: u64) -> Result<Vec<LogEntry>, GatewayError> {
        self.read_entries(BlockId::number(block)).await
    }

    async fn read_entries(&self, block: BlockId) -> Result<Vec<LogEntry>, GatewayError> {
        let waves = self
            .contract
            .getAllWaves()
            .from(self.signer.account())
            .block(block)
            .call()
            .await?;

        let entries = waves
            .into_iter()
            .map(LogEntry::try_from)
            .collect::<anyhow::Result<Vec<_>>>()
            .context("Mapping getAllWaves records")?;

        Ok(entries)
    }

    /// Submits `payload` and waits until the transaction is mined.
    ///
    /// Progress is reported to `status`. Failures are reported as well as
    /// returned, and are never retried.
    pub async fn submit(
        &self,
        payload: &str,
        status: &dyn StatusSink,
    ) -> Result<TransactionHash, TransactionFailed> {
        status.report(SubmitStatus::Submitting);
        self.log_total_count().await;

        let pending = self
            .contract
            .upload(payload.to_owned())
            .from(self.signer.account())
            .gas(GAS_LIMIT)
            .send()
            .await;

        let hash = match pending {
            Ok(pending) => TransactionHash(*pending.tx_hash()),
            Err(e) => return Err(Self::fail(status, e.into())),
        };

        tracing::info!(tx_hash=%hash, "Mining...");
        status.report(SubmitStatus::Mining(hash));

        if let Err(failure) = self.wait_for_receipt(hash).await {
            return Err(Self::fail(status, failure));
        }

        tracing::info!(tx_hash=%hash, "Mined");
        self.log_total_count().await;
        status.report(SubmitStatus::Mined(hash));

        Ok(hash)
    }

    fn fail(status: &dyn StatusSink, failure: TransactionFailed) -> TransactionFailed {
        tracing::error!(reason=%failure, "Submission failed");
        status.report(SubmitStatus::Failed(failure.clone()));
        failure
    }

    async fn wait_for_receipt(&self, hash: TransactionHash) -> Result<(), TransactionFailed> {
        tokio::time::timeout(self.confirmation.timeout, self.poll_receipt(hash))
            .await
            .map_err(|_| TransactionFailed::Timeout(hash, self.confirmation.timeout))?
    }

    async fn poll_receipt(&self, hash: TransactionHash) -> Result<(), TransactionFailed> {
        let provider = self.signer.provider();

        loop {
            let receipt = provider
                .get_transaction_receipt(hash.0)
                .await
                .map_err(|e| TransactionFailed::Provider(e.into()))?;

            match receipt {
                Some(receipt) if receipt.status() => return Ok(()),
                Some(_) => return Err(TransactionFailed::Reverted(hash)),
                None => tokio::time::sleep(self.confirmation.poll_interval).await,
            }
        }
    }

    /// Diagnostic read around a submission; failures are only logged.
    async fn log_total_count(&self) {
        match self.read_total_count().await {
            Ok(count) => tracing::info!(%count, "Retrieved total playlist count"),
            Err(e) => tracing::warn!(reason=%e, "Failed to retrieve total playlist count"),
        }
    }
}

impl std::fmt::Debug for ContractGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractGateway")
            .field("address", self.contract.address())
            .field("signer", &self.signer)
            .field("confirmation", &self.confirmation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{encode_count, encode_waves, receipt, wave, FakeWallet};
    use crate::RpcErrorCode;
    use alloy::primitives::B256;
    use assert_matches::assert_matches;
    use mockall::Sequence;
    use serde_json::json;
    use std::sync::Arc;

    const ACCOUNT: Address = Address::repeat_byte(0xac);
    const CONTRACT: Address = Address::repeat_byte(0xcc);
    const TX: TransactionHash = TransactionHash(B256::repeat_byte(0x77));

    fn gateway(fake: &Arc<FakeWallet>) -> ContractGateway {
        let signer = SigningContext::new(fake.provider(), ACCOUNT);
        ContractGateway::new(CONTRACT, signer).with_confirmation(Confirmation {
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_secs(1),
        })
    }

    /// A sink which expects exactly the given statuses, in order.
    fn expect_statuses(statuses: Vec<SubmitStatus>) -> MockStatusSink {
        let mut sink = MockStatusSink::new();
        let mut seq = Sequence::new();
        for status in statuses {
            sink.expect_report()
                .withf(move |s| s == &status)
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
        }
        sink
    }

    mod reads {
        use super::*;
        use pretty_assertions_sorted::assert_eq_sorted;

        #[tokio::test]
        async fn total_count() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond("eth_call", Ok(encode_count(7)));

            let count = gateway(&fake).read_total_count().await.unwrap();

            assert_eq!(count, 7);
            let calls = fake.calls("eth_call");
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0][0]["to"], json!(CONTRACT));
            assert_eq!(calls[0][0]["from"], json!(ACCOUNT));
        }

        #[tokio::test]
        async fn all_entries_keep_chain_order() {
            let fake = Arc::new(FakeWallet::default());
            let a = wave(Address::repeat_byte(0x0a), 100, "a");
            let b = wave(Address::repeat_byte(0x0b), 200, "b");
            fake.respond("eth_call", Ok(encode_waves(vec![a, b])));

            let entries = gateway(&fake).read_all_entries().await.unwrap();

            let expected = vec![
                LogEntry::from_unix(Address::repeat_byte(0x0a), 100, "a".to_owned()).unwrap(),
                LogEntry::from_unix(Address::repeat_byte(0x0b), 200, "b".to_owned()).unwrap(),
            ];
            assert_eq_sorted!(entries, expected);
            assert_eq!(fake.calls("eth_call")[0][1], json!("latest"));
        }

        #[tokio::test]
        async fn entries_at_a_pinned_block() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond("eth_blockNumber", Ok(json!("0xa")));
            fake.respond(
                "eth_call",
                Ok(encode_waves(vec![wave(Address::repeat_byte(0x0a), 100, "a")])),
            );
            let gateway = gateway(&fake);

            let block = gateway.block_number().await.unwrap();
            let entries = gateway.read_all_entries_at(block).await.unwrap();

            assert_eq!(block, 10);
            assert_eq!(entries.len(), 1);
            assert_eq!(fake.calls("eth_call")[0][1], json!("0xa"));
        }

        #[tokio::test]
        async fn empty_log() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond("eth_call", Ok(encode_waves(vec![])));

            let entries = gateway(&fake).read_all_entries().await.unwrap();

            assert!(entries.is_empty());
        }

        #[tokio::test]
        async fn garbage_is_a_decode_error() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond("eth_call", Ok(json!("0x1234")));

            let result = gateway(&fake).read_all_entries().await;

            assert_matches!(result, Err(GatewayError::Decode(_)));
        }

        #[tokio::test]
        async fn rpc_errors_are_kept() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond(
                "eth_call",
                Err(RpcError::from_code(RpcErrorCode::ResourceUnavailable)),
            );

            let result = gateway(&fake).read_total_count().await;

            assert_matches!(result, Err(GatewayError::Rpc(RpcError::JsonRpc { code: -32002, .. })));
        }
    }

    mod submit {
        use super::*;

        #[tokio::test]
        async fn mined() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond("eth_call", Ok(encode_count(1)));
            fake.respond("eth_sendTransaction", Ok(json!(TX)));
            fake.respond_once("eth_getTransactionReceipt", Ok(json!(null)));
            fake.respond("eth_getTransactionReceipt", Ok(receipt(TX, true)));
            let sink = expect_statuses(vec![
                SubmitStatus::Submitting,
                SubmitStatus::Mining(TX),
                SubmitStatus::Mined(TX),
            ]);

            let hash = gateway(&fake).submit("payload", &sink).await.unwrap();

            assert_eq!(hash, TX);
            let sent = fake.calls("eth_sendTransaction");
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0][0]["gas"], json!("0x493e0"));
            assert_eq!(sent[0][0]["from"], json!(ACCOUNT));
            assert_eq!(sent[0][0]["to"], json!(CONTRACT));
            assert_eq!(fake.calls("eth_getTransactionReceipt").len(), 2);
        }

        #[tokio::test]
        async fn rejected() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond("eth_call", Ok(encode_count(1)));
            fake.respond(
                "eth_sendTransaction",
                Err(RpcError::from_code(RpcErrorCode::UserRejectedRequest)),
            );
            let sink = expect_statuses(vec![
                SubmitStatus::Submitting,
                SubmitStatus::Failed(TransactionFailed::Rejected),
            ]);

            let result = gateway(&fake).submit("payload", &sink).await;

            assert_eq!(result, Err(TransactionFailed::Rejected));
            assert!(fake.calls("eth_getTransactionReceipt").is_empty());
        }

        #[tokio::test]
        async fn reverted() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond("eth_call", Ok(encode_count(1)));
            fake.respond("eth_sendTransaction", Ok(json!(TX)));
            fake.respond("eth_getTransactionReceipt", Ok(receipt(TX, false)));
            let sink = expect_statuses(vec![
                SubmitStatus::Submitting,
                SubmitStatus::Mining(TX),
                SubmitStatus::Failed(TransactionFailed::Reverted(TX)),
            ]);

            let result = gateway(&fake).submit("payload", &sink).await;

            assert_eq!(result, Err(TransactionFailed::Reverted(TX)));
        }

        #[tokio::test(start_paused = true)]
        async fn timeout() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond("eth_call", Ok(encode_count(1)));
            fake.respond("eth_sendTransaction", Ok(json!(TX)));
            fake.respond("eth_getTransactionReceipt", Ok(json!(null)));
            let sink = expect_statuses(vec![
                SubmitStatus::Submitting,
                SubmitStatus::Mining(TX),
                SubmitStatus::Failed(TransactionFailed::Timeout(TX, Duration::from_secs(1))),
            ]);

            let result = gateway(&fake).submit("payload", &sink).await;

            assert_eq!(
                result,
                Err(TransactionFailed::Timeout(TX, Duration::from_secs(1)))
            );
        }

        #[tokio::test]
        async fn diagnostic_count_failure_does_not_fail_submission() {
            let fake = Arc::new(FakeWallet::default());
            fake.respond(
                "eth_call",
                Err(RpcError::Transport("connection reset".to_owned())),
            );
            fake.respond("eth_sendTransaction", Ok(json!(TX)));
            fake.respond("eth_getTransactionReceipt", Ok(receipt(TX, true)));
            let sink = expect_statuses(vec![
                SubmitStatus::Submitting,
                SubmitStatus::Mining(TX),
                SubmitStatus::Mined(TX),
            ]);

            gateway(&fake).submit("payload", &sink).await.unwrap();
        }
    }
}
