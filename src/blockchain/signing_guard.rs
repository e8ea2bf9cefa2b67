// src/blockchain/signing_guard.rs

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::SessionError;

// Serializes access to each wallet's signing channel.
#[derive(Debug, Clone, Default)]
pub struct SigningGuard {
    // One slot per wallet address. The DashMap allows concurrent access to
    // different wallets; the Mutex makes each wallet single-flight.
    slots: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Held for the whole sign + broadcast round-trip.
#[derive(Debug)]
pub struct SigningPermit {
    address: String,
    _guard: OwnedMutexGuard<()>,
}

impl SigningPermit {
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl SigningGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the signing channel for `address` without waiting.
    /// A second claim while the first permit is alive is rejected, never queued.
    pub fn try_acquire(&self, address: &str) -> Result<SigningPermit, SessionError> {
        let slot = self
            .slots
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = slot
            .try_lock_owned()
            .map_err(|_| SessionError::WalletBusy(address.to_string()))?;

        Ok(SigningPermit {
            address: address.to_string(),
            _guard: guard,
        })
    }

    pub fn is_busy(&self, address: &str) -> bool {
        self.slots
            .get(address)
            .map(|slot| slot.try_lock().is_err())
            .unwrap_or(false)
    }
}
