//! Drives [`TransactionSession`]s through the wallet round-trip.
//!
//! Suspension points are the signature request (unbounded, cancellable)
//! and the broadcast (bounded by `broadcast_timeout`, cancellable). Every
//! adapter rejection lands the session in `Failed` with a classified
//! reason.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    blockchain::{
        models::{BroadcastAccepted, Receipt, WalletAccount, DEFAULT_EXPLORER_HOST},
        session::{SessionEvent, SessionState, TransactionSession},
        signing_guard::SigningPermit,
        wallet::WalletConnection,
    },
    config::Config,
    error::{BroadcastError, FailureReason, SessionError},
};

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub broadcast_timeout: Duration,
    pub explorer_host: String,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            broadcast_timeout: Duration::from_secs(30),
            explorer_host: DEFAULT_EXPLORER_HOST.to_string(),
        }
    }
}

impl From<&Config> for ExecutorOptions {
    fn from(config: &Config) -> Self {
        Self {
            broadcast_timeout: config.broadcast_timeout,
            explorer_host: config.explorer_host.clone(),
        }
    }
}

/// Emitted after every applied transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub session_id: Uuid,
    pub state: SessionState,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReason>,
}

impl SessionUpdate {
    fn of(session: &TransactionSession) -> Self {
        Self {
            session_id: session.id(),
            state: session.state(),
            attempt: session.attempt(),
            tx_id: session.tx_id().map(str::to_string),
            error: session.error().cloned(),
        }
    }
}

#[derive(Clone)]
pub struct TransactionExecutor {
    wallet: WalletConnection,
    options: ExecutorOptions,
    updates: broadcast::Sender<SessionUpdate>,
}

impl TransactionExecutor {
    pub fn new(wallet: WalletConnection, options: ExecutorOptions) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            wallet,
            options,
            updates,
        }
    }

    pub fn wallet(&self) -> &WalletConnection {
        &self.wallet
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Starts an `Idle` session. Without a connected wallet the session
    /// moves to `AwaitingWalletConnection` and no adapter call is made.
    pub async fn execute(
        &self,
        session: &mut TransactionSession,
        cancel: &CancellationToken,
    ) -> Result<SessionState, SessionError> {
        if session.state() != SessionState::Idle {
            return Err(SessionError::InvalidTransition {
                state: session.state(),
                event: "execute",
            });
        }

        let Some(account) = self.wallet.account() else {
            return self.apply(session, SessionEvent::Execute { wallet_connected: false });
        };
        let permit = self.wallet.claim_signing(&account.address)?;
        self.apply(session, SessionEvent::Execute { wallet_connected: true })?;
        self.run_attempt(session, &account, permit, cancel).await
    }

    /// Re-issues a signature request for a `Failed` session with the same intent.
    pub async fn retry(
        &self,
        session: &mut TransactionSession,
        cancel: &CancellationToken,
    ) -> Result<SessionState, SessionError> {
        if session.state() != SessionState::Failed {
            return Err(SessionError::InvalidTransition {
                state: session.state(),
                event: "retry",
            });
        }

        let Some(account) = self.wallet.account() else {
            return self.apply(session, SessionEvent::Retry { wallet_connected: false });
        };
        let permit = self.wallet.claim_signing(&account.address)?;
        self.apply(session, SessionEvent::Retry { wallet_connected: true })?;
        self.run_attempt(session, &account, permit, cancel).await
    }

    /// Returns a session waiting on the wallet to `Idle` once connected.
    pub fn resume_after_connect(
        &self,
        session: &mut TransactionSession,
    ) -> Result<SessionState, SessionError> {
        if session.state() == SessionState::AwaitingWalletConnection && self.wallet.is_connected() {
            return self.apply(session, SessionEvent::WalletConnected);
        }
        Ok(session.state())
    }

    /// Waits for a connection on the wallet observable, or for `cancel`.
    pub async fn wait_for_connection(
        &self,
        session: &mut TransactionSession,
        cancel: &CancellationToken,
    ) -> Result<SessionState, SessionError> {
        if session.state() != SessionState::AwaitingWalletConnection {
            return Ok(session.state());
        }

        let mut rx = self.wallet.subscribe();
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            res = async { rx.wait_for(|account| account.is_some()).await.is_ok() } => res,
        };

        if connected {
            self.apply(session, SessionEvent::WalletConnected)
        } else {
            self.apply(session, SessionEvent::Cancel)
        }
    }

    /// Cancels a session that is not waiting on the wallet. In-flight
    /// sessions are cancelled through the token passed to `execute`/`retry`.
    pub fn cancel(&self, session: &mut TransactionSession) -> Result<SessionState, SessionError> {
        self.apply(session, SessionEvent::Cancel)
    }

    async fn run_attempt(
        &self,
        session: &mut TransactionSession,
        account: &WalletAccount,
        _permit: SigningPermit,
        cancel: &CancellationToken,
    ) -> Result<SessionState, SessionError> {
        let adapter = self.wallet.adapter().clone();
        let intent = session.intent().clone();
        session.bind_deployer(&account.address);

        info!(
            session_id = %session.id(),
            attempt = session.attempt(),
            kind = %intent.kind(),
            "requesting signature"
        );

        let signed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(session_id = %session.id(), "cancelled before signature");
                return self.apply(session, SessionEvent::Cancel);
            }
            res = adapter.request_signature(account, &intent) => res,
        };

        let signed = match signed {
            Ok(signed) => signed,
            Err(err) => {
                warn!(session_id = %session.id(), error = %err, "signature request failed");
                return self.apply(session, SessionEvent::SigningFailed(FailureReason::from_signing(err)));
            }
        };
        self.apply(session, SessionEvent::Signed)?;

        let timeout = self.options.broadcast_timeout;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(session_id = %session.id(), "dismissed after broadcast was submitted");
                return self.apply(session, SessionEvent::Cancel);
            }
            res = tokio::time::timeout(timeout, adapter.broadcast(&signed)) => res,
        };

        let event = match outcome {
            Ok(Ok(accepted)) => match self.receipt_for(session, account, accepted) {
                Ok(receipt) => SessionEvent::BroadcastAccepted(receipt),
                Err(err) => SessionEvent::BroadcastFailed(FailureReason::Broadcast(err)),
            },
            Ok(Err(err)) => {
                warn!(session_id = %session.id(), error = %err, "broadcast rejected");
                SessionEvent::BroadcastFailed(FailureReason::from_broadcast(err))
            }
            Err(_) => {
                warn!(session_id = %session.id(), ?timeout, "broadcast timed out");
                SessionEvent::BroadcastFailed(FailureReason::Broadcast(BroadcastError::Timeout(timeout)))
            }
        };
        self.apply(session, event)
    }

    fn receipt_for(
        &self,
        session: &TransactionSession,
        account: &WalletAccount,
        accepted: BroadcastAccepted,
    ) -> Result<Receipt, BroadcastError> {
        let digits = accepted.tx_id.strip_prefix("0x").unwrap_or(&accepted.tx_id);
        if digits.is_empty() || hex::decode(digits).is_err() {
            return Err(BroadcastError::MalformedTxId(accepted.tx_id));
        }
        let contract_id = accepted
            .contract_id
            .or_else(|| session.contract_id().map(str::to_string));
        Ok(Receipt::new(
            accepted.tx_id,
            account.network,
            contract_id,
            &self.options.explorer_host,
        ))
    }

    fn apply(
        &self,
        session: &mut TransactionSession,
        event: SessionEvent,
    ) -> Result<SessionState, SessionError> {
        let from = session.state();
        let to = session.apply(event)?;
        info!(session_id = %session.id(), ?from, ?to, attempt = session.attempt(), "session transition");
        // No subscribers is fine.
        let _ = self.updates.send(SessionUpdate::of(session));
        Ok(to)
    }
}
