//! Wallet boundary.
//!
//! The wallet extension is external: it signs and broadcasts. This module
//! defines the adapter it is driven through and the process-wide
//! connection state that action renderers gate on.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use crate::{
    blockchain::{
        models::{BroadcastAccepted, SignedTransaction, TransactionIntent, WalletAccount},
        signing_guard::{SigningGuard, SigningPermit},
    },
    error::{SessionError, WalletError, WalletUnavailableError},
};

/// Operations a wallet integration must provide.
///
/// One polymorphic signing call covers all four intent variants.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Prompts the user to connect and returns the selected account.
    async fn connect(&self) -> Result<WalletAccount, WalletError>;

    /// Asks the user to sign. Unbounded: waits for the user.
    async fn request_signature(
        &self,
        account: &WalletAccount,
        intent: &TransactionIntent,
    ) -> Result<SignedTransaction, WalletError>;

    /// Submits a signed transaction to the network relay.
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<BroadcastAccepted, WalletError>;

    /// Forgets the connected account. Adapters without a notion of
    /// disconnecting can rely on the default.
    async fn disconnect(&self) -> Result<(), WalletError> {
        Ok(())
    }
}

/// Shared wallet connection. The only mutator of connection state;
/// every change is published to subscribers.
///
/// Clones share the connection state and the signing channel, so every
/// executor built over the same connection is single-flight per wallet.
#[derive(Clone)]
pub struct WalletConnection {
    adapter: Arc<dyn WalletAdapter>,
    state: Arc<watch::Sender<Option<WalletAccount>>>,
    signing: SigningGuard,
}

impl WalletConnection {
    pub fn new(adapter: Arc<dyn WalletAdapter>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            adapter,
            state: Arc::new(tx),
            signing: SigningGuard::new(),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn WalletAdapter> {
        &self.adapter
    }

    /// Receives every connect/disconnect.
    pub fn subscribe(&self) -> watch::Receiver<Option<WalletAccount>> {
        self.state.subscribe()
    }

    pub fn account(&self) -> Option<WalletAccount> {
        self.state.borrow().clone()
    }

    pub fn require_account(&self) -> Result<WalletAccount, WalletUnavailableError> {
        self.account().ok_or(WalletUnavailableError)
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Claims the signing channel of `address` for one sign + broadcast
    /// round-trip. Rejected with `WalletBusy` while another claim is alive.
    pub fn claim_signing(&self, address: &str) -> Result<SigningPermit, SessionError> {
        self.signing.try_acquire(address)
    }

    pub fn is_signing(&self, address: &str) -> bool {
        self.signing.is_busy(address)
    }

    pub async fn connect(&self) -> Result<WalletAccount, WalletError> {
        let account = self.adapter.connect().await?;
        info!(address = %account.address, network = %account.network, "wallet connected");
        self.state.send_replace(Some(account.clone()));
        Ok(account)
    }

    pub async fn disconnect(&self) -> Result<(), WalletError> {
        self.adapter.disconnect().await?;
        if self.state.send_replace(None).is_some() {
            info!("wallet disconnected");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::models::Network;

    struct StaticWallet;

    #[async_trait]
    impl WalletAdapter for StaticWallet {
        async fn connect(&self) -> Result<WalletAccount, WalletError> {
            Ok(WalletAccount {
                address: "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG".into(),
                network: Network::Testnet,
            })
        }

        async fn request_signature(
            &self,
            _account: &WalletAccount,
            _intent: &TransactionIntent,
        ) -> Result<SignedTransaction, WalletError> {
            Err(WalletError::Locked)
        }

        async fn broadcast(&self, _signed: &SignedTransaction) -> Result<BroadcastAccepted, WalletError> {
            Err(WalletError::Network("offline".into()))
        }
    }

    #[tokio::test]
    async fn subscribers_observe_connect_and_disconnect() {
        let connection = WalletConnection::new(Arc::new(StaticWallet));
        let mut rx = connection.subscribe();
        assert!(!connection.is_connected());
        assert_eq!(connection.require_account(), Err(WalletUnavailableError));

        connection.connect().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|a| a.network),
            Some(Network::Testnet)
        );

        connection.disconnect().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(!connection.is_connected());
    }

    #[test]
    fn clones_share_the_signing_channel() {
        let connection = WalletConnection::new(Arc::new(StaticWallet));
        let other = connection.clone();
        let addr = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";

        let permit = connection.claim_signing(addr).unwrap();
        assert!(other.is_signing(addr));
        assert_eq!(
            other.claim_signing(addr).unwrap_err(),
            SessionError::WalletBusy(addr.into())
        );

        drop(permit);
        assert!(other.claim_signing(addr).is_ok());
    }
}
