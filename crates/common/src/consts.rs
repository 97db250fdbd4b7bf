//! Repeated constants used around songlink

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent used in http clients
pub const USER_AGENT: &str = concat!("songlink/", env!("CARGO_PKG_VERSION"));

/// Host serving playlists and their embeddable players.
pub const PLAYLIST_HOST: &str = "open.spotify.com";
