// src/blockchain/mod.rs

pub mod executor;
pub mod intent;
pub mod models;
pub mod services;
pub mod session;
pub mod signing_guard;
pub mod wallet;

// Re-export commonly used types
pub use executor::{ExecutorOptions, SessionUpdate, TransactionExecutor};
pub use intent::{BuildContext, IntentBuilder};
pub use models::{Network, PreparedIntent, Receipt, TransactionIntent};
pub use session::{SessionState, TransactionSession};
pub use wallet::{WalletAdapter, WalletConnection};
