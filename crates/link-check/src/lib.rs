//! Checks that a submitted link denotes a Spotify playlist and rewrites it
//! into the embeddable form stored on-chain.
//!
//! The check is local: scheme, host and path shape. A [LinkValidator] can
//! additionally request the rewritten link to confirm it is live.
use std::time::Duration;

use anyhow::Context;
use songlink_common::consts::{PLAYLIST_HOST, USER_AGENT};
use url::Url;

/// Length of a Spotify base62 resource id.
const ID_LEN: usize = 22;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Not a Spotify playlist link: {0}")]
    MalformedLink(String),
    #[error("Playlist could not be reached: {0}")]
    Unreachable(String),
}

/// A playlist link in its embeddable form,
/// `https://open.spotify.com/embed/playlist/<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    url: Url,
    playlist_id: String,
}

impl ValidatedUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    fn path(&self) -> &str {
        self.url.path()
    }
}

impl std::fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local shape check of `candidate`. Never touches the network.
pub fn validate(candidate: &str) -> Result<ValidatedUrl, ValidationError> {
    let malformed = |reason: &str| ValidationError::MalformedLink(reason.to_owned());

    let url = Url::parse(candidate.trim()).map_err(|e| malformed(&e.to_string()))?;

    if url.scheme() != "https" {
        return Err(malformed("link must use https"));
    }
    if url.host_str() != Some(PLAYLIST_HOST) || url.port().is_some() {
        return Err(malformed("link must point to open.spotify.com"));
    }

    let mut segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if segments.first().is_some_and(|s| is_locale(s)) {
        segments.remove(0);
    }
    if segments.first() == Some(&"embed") {
        segments.remove(0);
    }

    let id = match segments.as_slice() {
        ["playlist", id] => *id,
        _ => return Err(malformed("link does not denote a playlist")),
    };

    if id.len() != ID_LEN || !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(malformed("playlist id is not a base62 id"));
    }

    let embed = format!("https://{PLAYLIST_HOST}/embed/playlist/{id}");
    let url = Url::parse(&embed).map_err(|e| malformed(&e.to_string()))?;

    Ok(ValidatedUrl {
        url,
        playlist_id: id.to_owned(),
    })
}

/// Localized links carry an `intl-<lang>` segment, e.g. `intl-de` or `intl-pt-BR`.
fn is_locale(segment: &str) -> bool {
    segment.strip_prefix("intl-").is_some_and(|lang| {
        !lang.is_empty() && lang.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-')
    })
}

/// Validates links, optionally confirming they are reachable.
#[derive(Debug, Clone, Default)]
pub struct LinkValidator {
    live_check: Option<LiveCheck>,
}

#[derive(Debug, Clone)]
struct LiveCheck {
    client: reqwest::Client,
    origin: Url,
}

impl LinkValidator {
    /// Shape check only.
    pub fn local() -> Self {
        Self::default()
    }

    /// Shape check followed by a GET of the embeddable link.
    pub fn with_live_check() -> anyhow::Result<Self> {
        let origin = Url::parse(&format!("https://{PLAYLIST_HOST}/"))
            .context("Parsing playlist origin")?;
        Self::with_live_check_origin(origin)
    }

    fn with_live_check_origin(origin: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Creating HTTP client")?;

        Ok(Self {
            live_check: Some(LiveCheck { client, origin }),
        })
    }

    pub fn checks_live(&self) -> bool {
        self.live_check.is_some()
    }

    pub async fn validate(&self, candidate: &str) -> Result<ValidatedUrl, ValidationError> {
        let validated = validate(candidate)?;

        if let Some(live_check) = &self.live_check {
            live_check.check(&validated).await?;
        }

        tracing::debug!(url=%validated, "Playlist link accepted");
        Ok(validated)
    }
}

impl LiveCheck {
    async fn check(&self, link: &ValidatedUrl) -> Result<(), ValidationError> {
        let target = self
            .origin
            .join(link.path())
            .map_err(|e| ValidationError::Unreachable(e.to_string()))?;

        let response = self.client.get(target.clone()).send().await.map_err(|e| {
            tracing::debug!(%target, reason=%e, "Playlist live check failed");
            ValidationError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%target, %status, "Playlist live check rejected");
            return Err(ValidationError::Unreachable(format!("{target} answered {status}")));
        }

        Ok(())
    }
}
