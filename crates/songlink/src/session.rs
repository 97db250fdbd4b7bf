//! The user's session with their wallet and the status line shown to them.
use std::sync::{Arc, RwLock};

use alloy::primitives::Address;
use songlink_ethereum::{StatusSink, SubmitStatus, Wallet, WalletError};

/// Shown when an action needs a wallet and none is configured.
pub const NO_WALLET_ALERT: &str = "Get a wallet!";

/// Human readable description of a submission's progress.
pub fn status_text(status: &SubmitStatus) -> &'static str {
    match status {
        SubmitStatus::Submitting => "Submitting....",
        SubmitStatus::Mining(_) => "Mining... Do Not Refresh",
        SubmitStatus::Mined(_) => "Mined! Thanks for the Playlist (ɔ◔‿◔)ɔ ♥",
        SubmitStatus::Failed(_) => "Transaction Failed",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_address: Option<Address>,
    /// Description of the most recent user visible event.
    pub status: String,
}

/// Shared handle on the session state.
///
/// Only the [SessionManager] changes the current address. Status updates come
/// from whichever operation finished last, so a slow earlier submission can
/// overwrite the status of a later one.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn current_address(&self) -> Option<Address> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .current_address
    }

    pub fn status(&self) -> String {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .status
            .clone()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        tracing::debug!(%status, "Status changed");
        self.state.write().unwrap_or_else(|e| e.into_inner()).status = status;
    }

    fn set_address(&self, address: Option<Address>) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .current_address = address;
    }
}

impl StatusSink for Session {
    fn report(&self, status: SubmitStatus) {
        self.set_status(status_text(&status));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Address),
    /// No wallet is configured; the user must be told before anything else.
    Alert(&'static str),
    /// The wallet declined or failed. The session is unchanged.
    NotConnected,
}

/// Owns the current account and connect lifecycle.
#[derive(Debug, Clone)]
pub struct SessionManager {
    wallet: Wallet,
    session: Session,
}

impl SessionManager {
    pub fn new(wallet: Wallet) -> Self {
        Self {
            wallet,
            session: Session::default(),
        }
    }

    pub fn session(&self) -> Session {
        self.session.clone()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Adopts an already authorized account without prompting the user.
    ///
    /// Returns whether an account was found.
    pub async fn check_existing_session(&self) -> bool {
        if !self.wallet.is_available() {
            tracing::info!("Make sure you have a wallet!");
            return false;
        }

        match self.wallet.list_accounts().await {
            Ok(accounts) => match accounts.first() {
                Some(&account) => {
                    tracing::info!(%account, "Found an authorized account");
                    self.session.set_address(Some(account));
                    self.session
                        .set_status(format!("Found an authorized account: {account}"));
                    true
                }
                None => {
                    tracing::info!("No authorized account found");
                    self.session
                        .set_status("No authorized account found, Connect Wallet :D");
                    false
                }
            },
            Err(e) => {
                tracing::warn!(reason=%e, "Listing wallet accounts failed");
                self.session.set_status(format!("Wallet error: {e}"));
                false
            }
        }
    }

    /// Asks the wallet to authorize an account, which may prompt the user.
    pub async fn connect(&self) -> ConnectOutcome {
        let accounts = match self.wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(WalletError::ProviderUnavailable) => return ConnectOutcome::Alert(NO_WALLET_ALERT),
            Err(WalletError::UserRejected) => {
                tracing::info!("Connection request rejected by the user");
                return ConnectOutcome::NotConnected;
            }
            Err(e) => {
                tracing::warn!(reason=%e, "Connecting wallet failed");
                return ConnectOutcome::NotConnected;
            }
        };

        match accounts.first() {
            Some(&account) => {
                tracing::info!(%account, "Connected");
                self.session.set_address(Some(account));
                self.session.set_status("Connected :D");
                ConnectOutcome::Connected(account)
            }
            None => {
                tracing::warn!("Wallet authorized no account");
                ConnectOutcome::NotConnected
            }
        }
    }

    /// Forgets the current account.
    pub fn disconnect(&self) {
        if let Some(account) = self.session.current_address() {
            tracing::info!(%account, "Disconnected");
        }
        self.session.set_address(None);
        self.session.set_status("Disconnected");
    }
}
