//! Keeps a local view of the portal's log in step with the chain.
//!
//! The view is seeded from a full read of the contract pinned to a block, and
//! then extended by following the `NewPlaylist` event from the next block on.
//! Following is done with a log filter which the [Subscription] handle owns:
//! dropping or unsubscribing the handle is the only way out of the subscribed
//! state, so the filter cannot outlive its owner.
//!
//! Logs mined between the seed and the filter install are read once with
//! `eth_getLogs`. Every log is placed by its block number and log index, and
//! a log at or before the newest position in the view is dropped, so the
//! overlap between that read and the filter is delivered only once.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use alloy::primitives::U256;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{Filter, Log};
use songlink_common::LogEntry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::gateway::ContractGateway;
use crate::log::NewPlaylistLog;
use crate::provider::RpcError;

/// Where a log sits on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Position {
    block: u64,
    log_index: u64,
}

impl Position {
    /// After every log of `block`.
    fn end_of(block: u64) -> Self {
        Self {
            block,
            log_index: u64::MAX,
        }
    }

    fn of(log: &Log) -> Option<Self> {
        Some(Self {
            block: log.block_number?,
            log_index: log.log_index?,
        })
    }
}

#[derive(Debug, Default)]
struct Entries {
    entries: Vec<LogEntry>,
    /// Position of the newest entry, if known.
    head: Option<Position>,
}

/// Read handle on the local, chain ordered playlist log.
///
/// Only the [EventSynchronizer] which created the view appends to it.
#[derive(Clone, Debug, Default)]
pub struct LogView {
    inner: Arc<RwLock<Entries>>,
}

impl LogView {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Entries> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn replace(&self, entries: Vec<LogEntry>, head: Position) {
        *self.write() = Entries {
            entries,
            head: Some(head),
        };
    }

    /// Appends `entry` unless its position is already covered by the view.
    fn append(&self, entry: LogEntry, position: Option<Position>) -> bool {
        let mut inner = self.write();

        if let (Some(position), Some(head)) = (position, inner.head) {
            if position <= head {
                return false;
            }
        }

        inner.entries.push(entry);
        if position.is_some() {
            inner.head = position;
        }
        true
    }

    /// First block which may hold logs missing from the view.
    fn resume_from(&self) -> Option<u64> {
        self.read().head.map(|head| match head.log_index {
            u64::MAX => head.block + 1,
            _ => head.block,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsubscribed,
    Subscribed,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A second live subscription would append every event twice.
    #[error("already subscribed")]
    AlreadySubscribed,
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Holds the single subscription slot of an [EventSynchronizer] until dropped.
#[derive(Debug)]
struct SubscribedGuard(Arc<AtomicBool>);

impl SubscribedGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, SyncError> {
        match flag.swap(true, Ordering::SeqCst) {
            true => Err(SyncError::AlreadySubscribed),
            false => Ok(Self(flag.clone())),
        }
    }
}

impl Drop for SubscribedGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the appends to a [LogView].
#[derive(Debug)]
pub struct EventSynchronizer {
    view: LogView,
    poll_interval: Duration,
    subscribed: Arc<AtomicBool>,
}

impl EventSynchronizer {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            view: LogView::default(),
            poll_interval,
            subscribed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn view(&self) -> LogView {
        self.view.clone()
    }

    pub fn state(&self) -> SyncState {
        match self.subscribed.load(Ordering::SeqCst) {
            true => SyncState::Subscribed,
            false => SyncState::Unsubscribed,
        }
    }

    /// Replaces the view with the result of a full contract read at `block`.
    pub fn seed(&self, entries: Vec<LogEntry>, block: u64) {
        tracing::debug!(count=%entries.len(), %block, "Seeding playlist view");
        self.view.replace(entries, Position::end_of(block));
    }

    /// Starts following `NewPlaylist` events of the gateway's contract.
    ///
    /// A seeded view carries on from the block after the seed. Events are
    /// appended to the view in chain order until the returned [Subscription]
    /// is unsubscribed or dropped.
    pub async fn subscribe(&self, gateway: &ContractGateway) -> Result<Subscription, SyncError> {
        let slot = SubscribedGuard::acquire(&self.subscribed)?;
        let provider = gateway.signer().provider().clone();

        let mut filter = Filter::new()
            .address(gateway.address())
            .event_signature(NewPlaylistLog::signature());
        let from_block = self.view.resume_from();
        if let Some(block) = from_block {
            filter = filter.from_block(block);
        }

        let filter_id = provider
            .new_filter(&filter)
            .await
            .map_err(RpcError::from)?;

        tracing::info!(%filter_id, contract=%gateway.address(), ?from_block, "Subscribed to NewPlaylist events");

        let mut subscription = Subscription {
            filter_id,
            provider: provider.clone(),
            cancel: CancellationToken::new(),
            task: None,
            uninstalled: false,
            _slot: slot,
        };

        if from_block.is_some() {
            let logs = provider.get_logs(&filter).await.map_err(RpcError::from)?;
            for log in logs {
                deliver(&self.view, log);
            }
        }

        subscription.task = Some(tokio::spawn(follow(
            provider,
            filter_id,
            self.view.clone(),
            self.poll_interval,
            subscription.cancel.clone(),
        )));

        Ok(subscription)
    }
}

async fn follow(
    provider: DynProvider,
    filter_id: U256,
    view: LogView,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let changes = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changes = provider.get_filter_changes::<Log>(filter_id) => changes,
        };

        let logs = match changes {
            Ok(logs) => logs,
            Err(e) => {
                tracing::warn!(reason=%e, %filter_id, "Polling NewPlaylist events failed");
                continue;
            }
        };

        for log in logs {
            deliver(&view, log);
        }
    }

    tracing::debug!(%filter_id, "Stopped following NewPlaylist events");
}

fn deliver(view: &LogView, log: Log) {
    if log.removed {
        tracing::debug!(tx_hash=?log.transaction_hash, "Skipping removed NewPlaylist log");
        return;
    }

    let position = Position::of(&log);
    let entry = NewPlaylistLog::try_from(&log).and_then(LogEntry::try_from);
    match entry {
        Ok(entry) => {
            let (sender, url) = (entry.sender, entry.url.clone());
            match view.append(entry, position) {
                true => tracing::info!(%sender, %url, "NewPlaylist"),
                false => {
                    tracing::debug!(%sender, ?position, "Skipping NewPlaylist log already in view")
                }
            }
        }
        Err(e) => {
            tracing::warn!(reason=?e, tx_hash=?log.transaction_hash, "Skipping undecodable NewPlaylist log")
        }
    }
}

/// A live event subscription.
///
/// Delivery stops as soon as the handle is dropped. Prefer
/// [unsubscribe](Subscription::unsubscribe), which also waits for the filter
/// to be uninstalled; a dropped handle uninstalls it in the background.
pub struct Subscription {
    filter_id: U256,
    provider: DynProvider,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    uninstalled: bool,
    _slot: SubscribedGuard,
}

impl Subscription {
    pub fn filter_id(&self) -> U256 {
        self.filter_id
    }

    /// Stops delivery and uninstalls the filter.
    ///
    /// Delivery is stopped even if uninstalling fails.
    pub async fn unsubscribe(mut self) -> Result<(), RpcError> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(reason=%e, "NewPlaylist follower ended abnormally");
            }
        }

        self.uninstalled = true;
        self.provider.uninstall_filter(self.filter_id).await?;

        tracing::info!(filter_id=%self.filter_id, "Unsubscribed from NewPlaylist events");
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }

        if self.uninstalled {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let provider = self.provider.clone();
                let filter_id = self.filter_id;
                handle.spawn(async move {
                    if let Err(e) = provider.uninstall_filter(filter_id).await {
                        tracing::debug!(reason=%e, %filter_id, "Uninstalling dropped filter failed");
                    }
                });
            }
            Err(_) => {
                tracing::debug!(filter_id=%self.filter_id, "No runtime left to uninstall filter")
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("filter_id", &self.filter_id)
            .finish()
    }
}
