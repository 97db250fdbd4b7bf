//! Ties the session, the contract and the local view together.
//!
//! Start-up adopts an existing session and seeds the view with a full read of
//! the contract. From then on the view is kept live by subscribing, and
//! submissions flow through link validation into the contract.
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::Context;
use songlink_common::TransactionHash;
use songlink_ethereum::{
    Confirmation, ContractGateway, EventSynchronizer, LogView, Subscription, TransactionFailed,
};
use songlink_link_check::{LinkValidator, ValidationError};

use crate::session::{ConnectOutcome, Session, SessionManager};

#[derive(Debug, Clone, Copy)]
pub struct PortalConfig {
    pub contract: Address,
    pub confirmation: Confirmation,
    pub events_poll_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("No account connected")]
    NotConnected,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transaction(#[from] TransactionFailed),
}

pub struct Portal {
    manager: SessionManager,
    validator: LinkValidator,
    config: PortalConfig,
    sync: EventSynchronizer,
    gateway: Option<ContractGateway>,
}

impl Portal {
    pub fn new(manager: SessionManager, validator: LinkValidator, config: PortalConfig) -> Self {
        Self {
            manager,
            validator,
            sync: EventSynchronizer::new(config.events_poll_interval),
            config,
            gateway: None,
        }
    }

    pub fn session(&self) -> Session {
        self.manager.session()
    }

    pub fn view(&self) -> LogView {
        self.sync.view()
    }

    pub fn gateway(&self) -> Option<&ContractGateway> {
        self.gateway.as_ref()
    }

    /// Adopts an already authorized account and, if there is one, loads the
    /// playlists submitted so far.
    pub async fn start(&mut self) -> bool {
        if !self.manager.check_existing_session().await {
            return false;
        }

        self.bind_and_load().await;
        true
    }

    /// Connects the wallet interactively and loads the playlists on success.
    pub async fn connect(&mut self) -> ConnectOutcome {
        let outcome = self.manager.connect().await;
        if let ConnectOutcome::Connected(_) = outcome {
            self.bind_and_load().await;
        }
        outcome
    }

    pub fn disconnect(&mut self) {
        self.manager.disconnect();
        self.gateway = None;
    }

    async fn bind_and_load(&mut self) {
        let signer = match self.manager.wallet().signing_context().await {
            Ok(signer) => signer,
            Err(e) => {
                tracing::warn!(reason=%e, "Binding the portal contract failed");
                return;
            }
        };

        self.gateway = Some(
            ContractGateway::new(self.config.contract, signer)
                .with_confirmation(self.config.confirmation),
        );

        if let Err(e) = self.refresh().await {
            tracing::warn!(reason=?e, "Loading playlists failed");
        }
    }

    fn require_gateway(&self) -> anyhow::Result<&ContractGateway> {
        self.gateway
            .as_ref()
            .context("No account connected. Connect a wallet first")
    }

    /// Replaces the view with a full read of the contract's log.
    ///
    /// The read is pinned to the wallet's latest block, from which a later
    /// [subscribe](Portal::subscribe) carries on.
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let gateway = self.require_gateway()?;
        let block = gateway
            .block_number()
            .await
            .context("Reading latest block number")?;
        let entries = gateway
            .read_all_entries_at(block)
            .await
            .context("Reading all playlists")?;

        let count = entries.len();
        self.sync.seed(entries, block);
        tracing::info!(%count, %block, "Loaded playlists");

        Ok(count)
    }

    /// Follows newly submitted playlists until the returned handle is dropped.
    pub async fn subscribe(&self) -> anyhow::Result<Subscription> {
        let subscription = self
            .sync
            .subscribe(self.require_gateway()?)
            .await
            .context("Subscribing to NewPlaylist events")?;

        Ok(subscription)
    }

    pub async fn total_count(&self) -> anyhow::Result<u64> {
        let count = self
            .require_gateway()?
            .read_total_count()
            .await
            .context("Reading total playlist count")?;

        Ok(count)
    }

    /// Validates `candidate` and submits its embeddable form.
    ///
    /// Every outcome is reflected in the session status except a missing
    /// session, in which case nothing is attempted.
    pub async fn submit(&self, candidate: &str) -> Result<TransactionHash, SubmitError> {
        let gateway = self.gateway.as_ref().ok_or(SubmitError::NotConnected)?;

        let link = match self.validator.validate(candidate).await {
            Ok(link) => link,
            Err(e) => {
                tracing::info!(reason=%e, "Playlist link rejected");
                self.session().set_status(e.to_string());
                return Err(e.into());
            }
        };

        tracing::info!(url=%link, "Submitting playlist");
        let hash = gateway.submit(link.as_str(), &self.session()).await?;

        Ok(hash)
    }
}

impl std::fmt::Debug for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Portal")
            .field("config", &self.config)
            .field("connected", &self.gateway.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use songlink_ethereum::test_utils::{encode_count, encode_waves, receipt, wave, FakeWallet};
    use songlink_ethereum::{RpcError, RpcErrorCode};
    use std::sync::Arc;

    const ACCOUNT: Address = Address::repeat_byte(0xac);
    const LINK: &str = "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc";
    const EMBED: &str = "https://open.spotify.com/embed/playlist/37i9dQZF1DXcBWIGoYBM5M";
    const TX: TransactionHash = TransactionHash(alloy::primitives::B256::repeat_byte(0x77));

    fn portal(fake: &Arc<FakeWallet>) -> Portal {
        let config = PortalConfig {
            contract: Address::repeat_byte(0xcc),
            confirmation: Confirmation {
                poll_interval: Duration::from_millis(10),
                timeout: Duration::from_secs(1),
            },
            events_poll_interval: Duration::from_millis(10),
        };
        Portal::new(
            SessionManager::new(fake.wallet()),
            LinkValidator::local(),
            config,
        )
    }

    fn connected_wallet() -> Arc<FakeWallet> {
        let fake = Arc::new(FakeWallet::default());
        fake.respond("eth_accounts", Ok(json!([ACCOUNT])));
        fake.respond("eth_blockNumber", Ok(json!("0xa")));
        fake
    }

    #[tokio::test]
    async fn start_seeds_view() {
        let fake = connected_wallet();
        fake.respond(
            "eth_call",
            Ok(encode_waves(vec![wave(Address::repeat_byte(1), 10, "a")])),
        );
        let mut portal = portal(&fake);

        assert!(portal.start().await);

        assert!(portal.gateway().is_some());
        assert_eq!(portal.view().len(), 1);
        assert_eq!(fake.calls("eth_call")[0][1], json!("0xa"));
    }

    #[tokio::test]
    async fn start_without_account_reads_nothing() {
        let fake = Arc::new(FakeWallet::default());
        fake.respond("eth_accounts", Ok(json!([])));
        let mut portal = portal(&fake);

        assert!(!portal.start().await);

        assert!(portal.gateway().is_none());
        assert!(fake.calls("eth_call").is_empty());
    }

    #[tokio::test]
    async fn failed_load_keeps_session() {
        let fake = connected_wallet();
        fake.respond(
            "eth_call",
            Err(RpcError::from_code(RpcErrorCode::ResourceUnavailable)),
        );
        let mut portal = portal(&fake);

        assert!(portal.start().await);

        assert!(portal.gateway().is_some());
        assert!(portal.view().is_empty());
    }

    #[tokio::test]
    async fn submit_requires_session() {
        let fake = Arc::new(FakeWallet::default());
        let portal = portal(&fake);

        assert_matches!(portal.submit(LINK).await, Err(SubmitError::NotConnected));
        assert!(fake.calls("eth_sendTransaction").is_empty());
    }

    #[tokio::test]
    async fn malformed_link_is_reported_and_not_sent() {
        let fake = connected_wallet();
        fake.respond("eth_call", Ok(encode_waves(vec![])));
        let mut portal = portal(&fake);
        portal.start().await;

        let result = portal.submit("https://example.com/playlist/x").await;

        assert_matches!(
            result,
            Err(SubmitError::Validation(ValidationError::MalformedLink(_)))
        );
        assert!(portal.session().status().starts_with("Not a Spotify playlist link"));
        assert!(fake.calls("eth_sendTransaction").is_empty());
    }

    #[tokio::test]
    async fn submits_embeddable_link() {
        let fake = connected_wallet();
        fake.respond_once("eth_call", Ok(encode_waves(vec![])));
        fake.respond("eth_call", Ok(encode_count(0)));
        fake.respond("eth_sendTransaction", Ok(json!(TX)));
        fake.respond("eth_getTransactionReceipt", Ok(receipt(TX, true)));
        let mut portal = portal(&fake);
        portal.start().await;

        portal.submit(LINK).await.unwrap();

        assert_eq!(
            portal.session().status(),
            "Mined! Thanks for the Playlist (ɔ◔‿◔)ɔ ♥"
        );
        let sent = fake.calls("eth_sendTransaction");
        let input = sent[0][0].get("input").or_else(|| sent[0][0].get("data"));
        let data: alloy::primitives::Bytes = serde_json::from_value(input.unwrap().clone()).unwrap();
        let contains = |needle: &[u8]| data.windows(needle.len()).any(|w| w == needle);
        assert!(contains(EMBED.as_bytes()));
        assert!(!contains(b"si=abc"));
    }

    #[tokio::test]
    async fn rejected_transaction_fails_status() {
        let fake = connected_wallet();
        fake.respond_once("eth_call", Ok(encode_waves(vec![])));
        fake.respond("eth_call", Ok(encode_count(0)));
        fake.respond(
            "eth_sendTransaction",
            Err(RpcError::from_code(RpcErrorCode::UserRejectedRequest)),
        );
        let mut portal = portal(&fake);
        portal.start().await;

        let result = portal.submit(LINK).await;

        assert_matches!(
            result,
            Err(SubmitError::Transaction(TransactionFailed::Rejected))
        );
        assert_eq!(portal.session().status(), "Transaction Failed");
        assert!(portal.view().is_empty());
    }

    #[tokio::test]
    async fn disconnect_unbinds_contract() {
        let fake = connected_wallet();
        fake.respond("eth_call", Ok(encode_waves(vec![])));
        let mut portal = portal(&fake);
        portal.start().await;

        portal.disconnect();

        assert!(portal.gateway().is_none());
        portal.total_count().await.unwrap_err();
    }
}
