// src/error.rs

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::blockchain::session::SessionState;

// --- Intent building ---

/// Tool output that cannot become a transaction intent.
///
/// Never retryable as-is: the agent has to produce a new tool call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("invalid `{field}`: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(field, "missing required field")
    }
}

// --- Registry ---

/// No registry row matched. Degrades to the raw-json fallback render.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no registry entry matches tool `{0}`")]
pub struct UnknownToolError(pub String);

// --- Wallet and broadcast ---

/// Rejections surfaced by a wallet adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum WalletError {
    #[error("request cancelled by the user")]
    UserCancelled,
    #[error("wallet is locked")]
    Locked,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("network error: {0}")]
    Network(String),
    #[error("rejected by the network: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[error("wallet is not connected")]
pub struct WalletUnavailableError;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum BroadcastError {
    #[error("broadcast rejected: {0}")]
    Rejected(String),
    #[error("broadcast not acknowledged within {0:?}")]
    Timeout(#[serde(with = "duration_secs")] Duration),
    #[error("broadcast network error: {0}")]
    Network(String),
    #[error("network returned a malformed transaction id `{0}`")]
    MalformedTxId(String),
}

impl From<WalletError> for BroadcastError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Network(msg) => BroadcastError::Network(msg),
            WalletError::Rejected(msg) => BroadcastError::Rejected(msg),
            other => BroadcastError::Rejected(other.to_string()),
        }
    }
}

/// Why a session ended up in `Failed`. All variants are retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "error", rename_all = "kebab-case")]
pub enum FailureReason {
    #[error("user rejected the signature request")]
    UserRejected,
    #[error("wallet error: {0}")]
    Wallet(WalletError),
    #[error(transparent)]
    Broadcast(BroadcastError),
}

impl FailureReason {
    /// Classify a rejection received while waiting for a signature.
    pub fn from_signing(err: WalletError) -> Self {
        match err {
            WalletError::UserCancelled => FailureReason::UserRejected,
            other => FailureReason::Wallet(other),
        }
    }

    /// Classify a rejection received while waiting for broadcast acceptance.
    pub fn from_broadcast(err: WalletError) -> Self {
        FailureReason::Broadcast(err.into())
    }

    pub fn is_retryable(&self) -> bool {
        true
    }
}

// --- Session ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {event} while session is {state:?}")]
    InvalidTransition {
        state: SessionState,
        event: &'static str,
    },
    #[error("wallet {0} already has a transaction awaiting signature or broadcast")]
    WalletBusy(String),
    #[error(transparent)]
    WalletUnavailable(#[from] WalletUnavailableError),
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}
