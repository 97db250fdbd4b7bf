use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use anyhow::Context;
use songlink_common::LogEntry;

use crate::contract::SongLinkPortal;

/// Describes a playlist submission log event.
///
/// This is emitted by the portal contract for every successful `upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaylistLog {
    pub sender: Address,
    pub timestamp: U256,
    pub url: String,
}

impl NewPlaylistLog {
    pub fn signature() -> B256 {
        SongLinkPortal::NewPlaylist::SIGNATURE_HASH
    }
}

impl TryFrom<&Log> for NewPlaylistLog {
    type Error = anyhow::Error;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let event = SongLinkPortal::NewPlaylist::decode_log_data(log.data())
            .context("NewPlaylist event could not be decoded")?;

        Ok(Self {
            sender: event.from,
            timestamp: event.timestamp,
            url: event.playlist_url,
        })
    }
}

impl TryFrom<NewPlaylistLog> for LogEntry {
    type Error = anyhow::Error;

    fn try_from(log: NewPlaylistLog) -> Result<Self, Self::Error> {
        LogEntry::from_unix(log.sender, unix_seconds(log.timestamp)?, log.url)
    }
}

impl TryFrom<SongLinkPortal::Wave> for LogEntry {
    type Error = anyhow::Error;

    fn try_from(wave: SongLinkPortal::Wave) -> Result<Self, Self::Error> {
        LogEntry::from_unix(wave.sender, unix_seconds(wave.timestamp)?, wave.playlist_url)
    }
}

/// Converts an on-chain `uint256` timestamp into unix seconds.
fn unix_seconds(timestamp: U256) -> anyhow::Result<i64> {
    let seconds = u64::try_from(timestamp)
        .ok()
        .and_then(|s| i64::try_from(s).ok())
        .with_context(|| format!("timestamp {timestamp} out of range"))?;

    Ok(seconds)
}
