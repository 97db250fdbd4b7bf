use alloy_primitives::Address;
use time::OffsetDateTime;

/// One historical playlist submission.
///
/// Sourced either from the contract's full log or from a live `NewPlaylist`
/// event. Entries are never modified once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub sender: Address,
    pub submitted_at: OffsetDateTime,
    /// Embeddable playlist URL as stored on-chain.
    pub url: String,
}

impl LogEntry {
    /// Creates an entry from on-chain unix seconds.
    pub fn from_unix(sender: Address, unix_seconds: i64, url: String) -> anyhow::Result<Self> {
        use anyhow::Context;

        let submitted_at = OffsetDateTime::from_unix_timestamp(unix_seconds)
            .with_context(|| format!("Timestamp {unix_seconds} out of range"))?;

        Ok(Self {
            sender,
            submitted_at,
            url,
        })
    }
}
