//! Transaction session state machine.
//!
//! Pure transition logic: no I/O happens here. The
//! [`executor`](crate::blockchain::executor) drives a session against the
//! wallet and feeds the outcomes back in as [`SessionEvent`]s.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    blockchain::models::{PreparedIntent, Receipt, TransactionIntent},
    error::{FailureReason, SessionError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Idle,
    AwaitingWalletConnection,
    Signing,
    Broadcasting,
    Confirmed,
    Failed,
    Cancelled,
}

impl SessionState {
    /// States that hold the wallet's signing channel.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionState::Signing | SessionState::Broadcasting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Confirmed | SessionState::Cancelled)
    }
}

/// How a cancelled session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cancellation {
    /// Cancelled before anything reached the network.
    Clean,
    /// The user dismissed the session after the signed transaction was
    /// handed to the network. It may still be mined.
    Dismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Execute { wallet_connected: bool },
    WalletConnected,
    Cancel,
    Signed,
    SigningFailed(FailureReason),
    BroadcastAccepted(Receipt),
    BroadcastFailed(FailureReason),
    Retry { wallet_connected: bool },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Execute { .. } => "execute",
            SessionEvent::WalletConnected => "wallet-connected",
            SessionEvent::Cancel => "cancel",
            SessionEvent::Signed => "signed",
            SessionEvent::SigningFailed(_) => "signing-failed",
            SessionEvent::BroadcastAccepted(_) => "broadcast-accepted",
            SessionEvent::BroadcastFailed(_) => "broadcast-failed",
            SessionEvent::Retry { .. } => "retry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub event: &'static str,
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

/// One execution lifecycle of an intent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSession {
    id: Uuid,
    intent: Arc<TransactionIntent>,
    state: SessionState,
    attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    contract_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<Receipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancellation: Option<Cancellation>,
    history: Vec<Transition>,
    created_at: DateTime<Utc>,
}

impl TransactionSession {
    pub fn new(prepared: &PreparedIntent) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent: Arc::clone(&prepared.intent),
            state: SessionState::Idle,
            attempt: 1,
            contract_id: prepared.contract_id.clone(),
            receipt: None,
            error: None,
            cancellation: None,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn intent(&self) -> &Arc<TransactionIntent> {
        &self.intent
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Only exposed once the network accepted the broadcast.
    pub fn tx_id(&self) -> Option<&str> {
        self.receipt.as_ref().map(|r| r.tx_id.as_str())
    }

    pub fn contract_id(&self) -> Option<&str> {
        self.contract_id.as_deref()
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    pub fn error(&self) -> Option<&FailureReason> {
        self.error.as_ref()
    }

    pub fn cancellation(&self) -> Option<Cancellation> {
        self.cancellation
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Fills in the deployment address once the signing account is known.
    pub(crate) fn bind_deployer(&mut self, deployer: &str) {
        if self.contract_id.is_none() {
            self.contract_id = self.intent.deployed_contract_id(deployer);
        }
    }

    /// Applies one event. Invalid events leave the session untouched.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, SessionError> {
        use SessionEvent as E;
        use SessionState as S;

        let from = self.state;
        let name = event.name();

        let to = match (from, event) {
            (S::Idle, E::Execute { wallet_connected: true }) => S::Signing,
            (S::Idle, E::Execute { wallet_connected: false }) => S::AwaitingWalletConnection,
            (S::AwaitingWalletConnection, E::WalletConnected) => S::Idle,
            // Dismissing the connect prompt: nothing was requested from the wallet.
            (S::AwaitingWalletConnection, E::Cancel) => S::Idle,
            (S::Signing, E::Signed) => S::Broadcasting,
            (S::Signing, E::SigningFailed(reason)) => {
                self.error = Some(reason);
                S::Failed
            }
            (S::Broadcasting, E::BroadcastAccepted(receipt)) => {
                if receipt.contract_id.is_some() {
                    self.contract_id = receipt.contract_id.clone();
                }
                self.receipt = Some(receipt);
                S::Confirmed
            }
            (S::Broadcasting, E::BroadcastFailed(reason)) => {
                self.error = Some(reason);
                S::Failed
            }
            (S::Failed, E::Retry { wallet_connected }) => {
                self.attempt += 1;
                self.error = None;
                if wallet_connected {
                    S::Signing
                } else {
                    S::AwaitingWalletConnection
                }
            }
            (S::Signing, E::Cancel) => {
                self.cancellation = Some(Cancellation::Clean);
                S::Cancelled
            }
            (S::Broadcasting, E::Cancel) => {
                self.cancellation = Some(Cancellation::Dismissed);
                S::Cancelled
            }
            (state, _) => {
                return Err(SessionError::InvalidTransition { state, event: name });
            }
        };

        self.state = to;
        self.history.push(Transition {
            from,
            to,
            event: name,
            attempt: self.attempt,
            at: Utc::now(),
        });
        Ok(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::models::{ClarityVersion, Network};
    use crate::error::{BroadcastError, WalletError};

    fn transfer() -> PreparedIntent {
        PreparedIntent {
            tool_identifier: "stxTransfer".into(),
            intent: Arc::new(TransactionIntent::StxTransfer {
                recipient: "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG".into(),
                amount: 1_000_000,
                memo: None,
            }),
            contract_id: None,
        }
    }

    fn receipt(tx_id: &str) -> Receipt {
        Receipt::new(tx_id, Network::Testnet, None, "explorer.hiro.so")
    }

    #[test]
    fn happy_path_reaches_confirmed_through_signing() {
        let mut session = TransactionSession::new(&transfer());
        assert_eq!(session.apply(SessionEvent::Execute { wallet_connected: true }), Ok(SessionState::Signing));
        assert_eq!(session.tx_id(), None);
        assert_eq!(session.apply(SessionEvent::Signed), Ok(SessionState::Broadcasting));
        assert_eq!(session.tx_id(), None);
        assert_eq!(
            session.apply(SessionEvent::BroadcastAccepted(receipt("0xdeadbeef"))),
            Ok(SessionState::Confirmed)
        );
        assert_eq!(session.tx_id(), Some("0xdeadbeef"));

        let path: Vec<_> = session.history().iter().map(|t| t.to).collect();
        assert_eq!(
            path,
            vec![SessionState::Signing, SessionState::Broadcasting, SessionState::Confirmed]
        );
    }

    #[test]
    fn broadcasting_requires_a_signature_first() {
        let mut session = TransactionSession::new(&transfer());
        let err = session
            .apply(SessionEvent::BroadcastAccepted(receipt("0x01")))
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                state: SessionState::Idle,
                event: "broadcast-accepted"
            }
        );
        session.apply(SessionEvent::Execute { wallet_connected: true }).unwrap();
        assert!(session.apply(SessionEvent::BroadcastAccepted(receipt("0x01"))).is_err());
        assert_eq!(session.state(), SessionState::Signing);
    }

    #[test]
    fn retry_reuses_the_same_intent_and_bumps_attempt() {
        let prepared = transfer();
        let mut session = TransactionSession::new(&prepared);
        session.apply(SessionEvent::Execute { wallet_connected: true }).unwrap();
        session
            .apply(SessionEvent::SigningFailed(FailureReason::UserRejected))
            .unwrap();
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.error(), Some(&FailureReason::UserRejected));

        assert_eq!(session.apply(SessionEvent::Retry { wallet_connected: true }), Ok(SessionState::Signing));
        assert_eq!(session.attempt(), 2);
        assert_eq!(session.error(), None);
        assert!(Arc::ptr_eq(session.intent(), &prepared.intent));
    }

    #[test]
    fn retry_without_wallet_waits_for_connection() {
        let mut session = TransactionSession::new(&transfer());
        session.apply(SessionEvent::Execute { wallet_connected: true }).unwrap();
        session.apply(SessionEvent::Signed).unwrap();
        session
            .apply(SessionEvent::BroadcastFailed(FailureReason::Broadcast(
                BroadcastError::Rejected("BadNonce".into()),
            )))
            .unwrap();
        assert_eq!(
            session.apply(SessionEvent::Retry { wallet_connected: false }),
            Ok(SessionState::AwaitingWalletConnection)
        );
        assert_eq!(session.apply(SessionEvent::WalletConnected), Ok(SessionState::Idle));
    }

    #[test]
    fn cancellation_distinguishes_side_effects() {
        let mut before = TransactionSession::new(&transfer());
        before.apply(SessionEvent::Execute { wallet_connected: true }).unwrap();
        before.apply(SessionEvent::Cancel).unwrap();
        assert_eq!(before.state(), SessionState::Cancelled);
        assert_eq!(before.cancellation(), Some(Cancellation::Clean));

        let mut after = TransactionSession::new(&transfer());
        after.apply(SessionEvent::Execute { wallet_connected: true }).unwrap();
        after.apply(SessionEvent::Signed).unwrap();
        after.apply(SessionEvent::Cancel).unwrap();
        assert_eq!(after.cancellation(), Some(Cancellation::Dismissed));
        assert_eq!(after.tx_id(), None);
    }

    #[test]
    fn cancelling_connection_prompt_returns_to_idle() {
        let mut session = TransactionSession::new(&transfer());
        session.apply(SessionEvent::Execute { wallet_connected: false }).unwrap();
        assert_eq!(session.state(), SessionState::AwaitingWalletConnection);
        assert_eq!(session.apply(SessionEvent::Cancel), Ok(SessionState::Idle));
        assert_eq!(session.cancellation(), None);
    }

    #[test]
    fn terminal_states_reject_further_events() {
        let mut session = TransactionSession::new(&transfer());
        session.apply(SessionEvent::Execute { wallet_connected: true }).unwrap();
        session.apply(SessionEvent::Cancel).unwrap();
        assert!(session.apply(SessionEvent::Retry { wallet_connected: true }).is_err());
        assert!(session.apply(SessionEvent::Execute { wallet_connected: true }).is_err());
        assert!(session
            .apply(SessionEvent::SigningFailed(FailureReason::Wallet(WalletError::Locked)))
            .is_err());
    }

    #[test]
    fn deploy_binds_contract_id_from_signer() {
        let prepared = PreparedIntent {
            tool_identifier: "deployContract".into(),
            intent: Arc::new(TransactionIntent::ContractDeploy {
                contract_name: "my-token".into(),
                code: "(ok true)".into(),
                clarity_version: ClarityVersion(2),
            }),
            contract_id: None,
        };
        let mut session = TransactionSession::new(&prepared);
        session.bind_deployer("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG");
        assert_eq!(
            session.contract_id(),
            Some("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG.my-token")
        );
    }
}
