use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider};
use alloy::transports::TransportError;

use crate::provider::RpcError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WalletError {
    /// No wallet capability was injected.
    #[error("no wallet available")]
    ProviderUnavailable,
    /// The user declined a wallet prompt.
    #[error("request rejected by the user")]
    UserRejected,
    /// The wallet has not authorized any account.
    #[error("no authorized account")]
    NoAccount,
    #[error(transparent)]
    Rpc(RpcError),
}

impl From<RpcError> for WalletError {
    fn from(error: RpcError) -> Self {
        if error.is_user_rejection() {
            WalletError::UserRejected
        } else {
            WalletError::Rpc(error)
        }
    }
}

impl From<TransportError> for WalletError {
    fn from(error: TransportError) -> Self {
        RpcError::from(error).into()
    }
}

/// Adapter around the (possibly absent) wallet capability.
///
/// The capability is injected once and checked for presence at every entry
/// point, so callers never need to special case a missing wallet themselves.
#[derive(Clone, Default)]
pub struct Wallet {
    provider: Option<DynProvider>,
}

impl Wallet {
    pub fn new(provider: DynProvider) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// A wallet without any capability behind it.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    fn provider(&self) -> Result<&DynProvider, WalletError> {
        self.provider.as_ref().ok_or(WalletError::ProviderUnavailable)
    }

    /// Accounts the wallet has already authorized. Never prompts the user.
    pub async fn list_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.provider()?.get_accounts().await?)
    }

    /// Asks the wallet to authorize accounts, which may prompt the user.
    pub async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let accounts = self
            .provider()?
            .raw_request("eth_requestAccounts".into(), ())
            .await?;

        Ok(accounts)
    }

    /// Binds the wallet to its current (first authorized) account.
    pub async fn signing_context(&self) -> Result<SigningContext, WalletError> {
        let provider = self.provider()?.clone();
        let account = self
            .list_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(WalletError::NoAccount)?;

        Ok(SigningContext { provider, account })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("available", &self.is_available())
            .finish()
    }
}

/// The wallet bound to the account which authorizes state-changing calls.
#[derive(Clone)]
pub struct SigningContext {
    provider: DynProvider,
    account: Address,
}

impl SigningContext {
    pub fn new(provider: DynProvider, account: Address) -> Self {
        Self { provider, account }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

impl std::fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("account", &self.account)
            .finish()
    }
}
