//! End-to-end transaction sessions against a scripted wallet

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use stacks_agent_server::{
    blockchain::{
        executor::{ExecutorOptions, TransactionExecutor},
        intent::{BuildContext, IntentBuilder},
        models::{BroadcastAccepted, Network, SignedTransaction, TransactionIntent, WalletAccount},
        session::{SessionState, TransactionSession},
        wallet::{WalletAdapter, WalletConnection},
    },
    config::Config,
    error::{BroadcastError, FailureReason, SessionError, WalletError},
    registry::ToolRegistry,
    AppState,
};

const WALLET: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";
const RECIPIENT: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

/// Replays queued signing and broadcast outcomes, recording every call.
#[derive(Default)]
struct ScriptedWallet {
    signatures: Mutex<VecDeque<Result<SignedTransaction, WalletError>>>,
    broadcasts: Mutex<VecDeque<Result<BroadcastAccepted, WalletError>>>,
    calls: Mutex<Vec<&'static str>>,
    /// When set, signature requests wait for this before answering.
    gate: Option<Arc<Notify>>,
    hang_broadcast: bool,
}

impl ScriptedWallet {
    fn sign_ok(self) -> Self {
        self.signatures
            .lock()
            .unwrap()
            .push_back(Ok(SignedTransaction { raw: "0x0080".into() }));
        self
    }

    fn sign_err(self, err: WalletError) -> Self {
        self.signatures.lock().unwrap().push_back(Err(err));
        self
    }

    fn accept(self, tx_id: &str) -> Self {
        self.broadcasts.lock().unwrap().push_back(Ok(BroadcastAccepted {
            tx_id: tx_id.into(),
            contract_id: None,
        }));
        self
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletAdapter for ScriptedWallet {
    async fn connect(&self) -> Result<WalletAccount, WalletError> {
        self.calls.lock().unwrap().push("connect");
        Ok(WalletAccount {
            address: WALLET.into(),
            network: Network::Testnet,
        })
    }

    async fn request_signature(
        &self,
        _account: &WalletAccount,
        _intent: &TransactionIntent,
    ) -> Result<SignedTransaction, WalletError> {
        self.calls.lock().unwrap().push("sign");
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.signatures.lock().unwrap().pop_front();
        next.unwrap_or(Err(WalletError::Locked))
    }

    async fn broadcast(&self, _signed: &SignedTransaction) -> Result<BroadcastAccepted, WalletError> {
        self.calls.lock().unwrap().push("broadcast");
        if self.hang_broadcast {
            return std::future::pending().await;
        }
        let next = self.broadcasts.lock().unwrap().pop_front();
        next.unwrap_or(Err(WalletError::Network("no scripted response".into())))
    }
}

fn builder() -> IntentBuilder {
    IntentBuilder::new(Arc::new(ToolRegistry::builtin()))
}

fn transfer_session() -> TransactionSession {
    let prepared = builder()
        .build(
            "tool-stxTransfer",
            &json!({ "recipient": RECIPIENT, "amount": "1000000" }),
            &BuildContext::new(),
        )
        .unwrap();
    TransactionSession::new(&prepared)
}

async fn connected_executor(wallet: Arc<ScriptedWallet>) -> TransactionExecutor {
    let connection = WalletConnection::new(wallet);
    connection.connect().await.unwrap();
    TransactionExecutor::new(connection, ExecutorOptions::default())
}

#[tokio::test]
async fn scenario_a_transfer_is_confirmed() {
    let wallet = Arc::new(ScriptedWallet::default().sign_ok().accept("0xdeadbeef"));
    let executor = connected_executor(wallet.clone()).await;
    let mut session = transfer_session();

    let state = executor
        .execute(&mut session, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state, SessionState::Confirmed);
    let receipt = session.receipt().unwrap();
    assert_eq!(receipt.tx_id, "0xdeadbeef");
    assert_eq!(receipt.network, Network::Testnet);
    assert_eq!(
        receipt.explorer_url,
        "https://explorer.hiro.so/txid/0xdeadbeef?chain=testnet"
    );

    let path: Vec<_> = session.history().iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![SessionState::Signing, SessionState::Broadcasting, SessionState::Confirmed]
    );
    assert_eq!(wallet.calls(), vec!["connect", "sign", "broadcast"]);
}

#[tokio::test]
async fn scenario_b_rejection_then_retry() {
    let wallet = Arc::new(
        ScriptedWallet::default()
            .sign_err(WalletError::UserCancelled)
            .sign_ok()
            .accept("0x0a0b"),
    );
    let executor = connected_executor(wallet.clone()).await;
    let mut session = transfer_session();
    let cancel = CancellationToken::new();

    assert_eq!(
        executor.execute(&mut session, &cancel).await,
        Ok(SessionState::Failed)
    );
    assert_eq!(session.error(), Some(&FailureReason::UserRejected));
    assert_eq!(session.tx_id(), None);

    let intent_before = session.intent().clone();
    assert_eq!(executor.retry(&mut session, &cancel).await, Ok(SessionState::Confirmed));
    assert_eq!(session.attempt(), 2);
    assert!(Arc::ptr_eq(&intent_before, session.intent()));
    assert_eq!(session.tx_id(), Some("0x0a0b"));

    let signing_attempts: Vec<_> = session
        .history()
        .iter()
        .filter(|t| t.to == SessionState::Signing)
        .map(|t| t.attempt)
        .collect();
    assert_eq!(signing_attempts, vec![1, 2]);
    assert_eq!(wallet.calls(), vec!["connect", "sign", "sign", "broadcast"]);
}

#[test]
fn scenario_c_deploy_contract_id_is_known_before_signing() {
    let deployer = "SP000000000000000000002Q6VF78";
    let prepared = builder()
        .build(
            "deployContract",
            &json!({ "contractName": "my-token", "code": "(define-fungible-token my-token)", "clarityVersion": 2 }),
            &BuildContext::new().with_deployer(deployer),
        )
        .unwrap();

    assert_eq!(prepared.contract_id.as_deref(), Some("SP000000000000000000002Q6VF78.my-token"));
    let session = TransactionSession::new(&prepared);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.contract_id(), Some("SP000000000000000000002Q6VF78.my-token"));
}

#[tokio::test]
async fn cancelling_while_awaiting_wallet_makes_no_adapter_call() {
    let wallet = Arc::new(ScriptedWallet::default());
    let executor = TransactionExecutor::new(WalletConnection::new(wallet.clone()), ExecutorOptions::default());
    let mut session = transfer_session();

    assert_eq!(
        executor.execute(&mut session, &CancellationToken::new()).await,
        Ok(SessionState::AwaitingWalletConnection)
    );
    assert_eq!(executor.cancel(&mut session), Ok(SessionState::Idle));
    assert!(wallet.calls().is_empty());
}

#[tokio::test]
async fn second_session_on_a_busy_wallet_is_rejected() {
    let gate = Arc::new(Notify::new());
    let wallet = Arc::new(ScriptedWallet {
        gate: Some(gate.clone()),
        ..ScriptedWallet::default()
    }
    .sign_ok()
    .accept("0x01"));
    let executor = connected_executor(wallet.clone()).await;

    let first = tokio::spawn({
        let executor = executor.clone();
        async move {
            let mut session = transfer_session();
            executor.execute(&mut session, &CancellationToken::new()).await
        }
    });

    // wait until the first session is parked in the wallet prompt
    while !wallet.calls().contains(&"sign") {
        tokio::task::yield_now().await;
    }

    let mut second = transfer_session();
    assert_eq!(
        executor.execute(&mut second, &CancellationToken::new()).await,
        Err(SessionError::WalletBusy(WALLET.into()))
    );
    assert_eq!(second.state(), SessionState::Idle);

    gate.notify_one();
    assert_eq!(first.await.unwrap(), Ok(SessionState::Confirmed));

    // the channel is free again
    gate.notify_one();
    assert!(executor.execute(&mut second, &CancellationToken::new()).await.is_ok());
}

#[tokio::test]
async fn executors_sharing_a_connection_are_single_flight() {
    let gate = Arc::new(Notify::new());
    let wallet = Arc::new(ScriptedWallet {
        gate: Some(gate.clone()),
        ..ScriptedWallet::default()
    }
    .sign_ok()
    .accept("0x02"));
    let connection = WalletConnection::new(wallet.clone());
    connection.connect().await.unwrap();

    let first_executor = TransactionExecutor::new(connection.clone(), ExecutorOptions::default());
    let second_executor = TransactionExecutor::new(connection, ExecutorOptions::default());

    let first = tokio::spawn(async move {
        let mut session = transfer_session();
        first_executor.execute(&mut session, &CancellationToken::new()).await
    });
    while !wallet.calls().contains(&"sign") {
        tokio::task::yield_now().await;
    }

    let mut second = transfer_session();
    assert_eq!(
        second_executor.execute(&mut second, &CancellationToken::new()).await,
        Err(SessionError::WalletBusy(WALLET.into()))
    );
    assert_eq!(second.state(), SessionState::Idle);

    gate.notify_one();
    assert_eq!(first.await.unwrap(), Ok(SessionState::Confirmed));
    assert_eq!(wallet.calls().iter().filter(|c| **c == "sign").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn app_executor_uses_configured_broadcast_timeout() {
    let wallet = Arc::new(
        ScriptedWallet {
            hang_broadcast: true,
            ..ScriptedWallet::default()
        }
        .sign_ok(),
    );
    let connection = WalletConnection::new(wallet);
    connection.connect().await.unwrap();

    let state = AppState::new(Config {
        broadcast_timeout: Duration::from_secs(7),
        ..Config::default()
    });
    let executor = state.executor(connection);
    let mut session = transfer_session();

    assert_eq!(
        executor.execute(&mut session, &CancellationToken::new()).await,
        Ok(SessionState::Failed)
    );
    assert_eq!(
        session.error(),
        Some(&FailureReason::Broadcast(BroadcastError::Timeout(Duration::from_secs(7))))
    );
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_broadcast_times_out_and_can_retry() {
    let wallet = Arc::new(
        ScriptedWallet {
            hang_broadcast: true,
            ..ScriptedWallet::default()
        }
        .sign_ok()
        .sign_ok(),
    );
    let connection = WalletConnection::new(wallet.clone());
    connection.connect().await.unwrap();
    let executor = TransactionExecutor::new(
        connection,
        ExecutorOptions {
            broadcast_timeout: Duration::from_secs(5),
            ..ExecutorOptions::default()
        },
    );
    let mut session = transfer_session();
    let cancel = CancellationToken::new();

    assert_eq!(executor.execute(&mut session, &cancel).await, Ok(SessionState::Failed));
    assert_eq!(
        session.error(),
        Some(&FailureReason::Broadcast(BroadcastError::Timeout(Duration::from_secs(5))))
    );
    assert!(session.error().unwrap().is_retryable());

    assert_eq!(executor.retry(&mut session, &cancel).await, Ok(SessionState::Failed));
    assert_eq!(session.attempt(), 2);
}

#[tokio::test]
async fn cancelling_before_signature_is_clean() {
    let gate = Arc::new(Notify::new());
    let wallet = Arc::new(ScriptedWallet {
        gate: Some(gate),
        ..ScriptedWallet::default()
    });
    let executor = connected_executor(wallet.clone()).await;
    let mut session = transfer_session();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    let watcher = wallet.clone();
    tokio::spawn(async move {
        while !watcher.calls().contains(&"sign") {
            tokio::task::yield_now().await;
        }
        trigger.cancel();
    });

    assert_eq!(executor.execute(&mut session, &cancel).await, Ok(SessionState::Cancelled));
    assert_eq!(
        session.cancellation(),
        Some(stacks_agent_server::blockchain::session::Cancellation::Clean)
    );
    assert!(!wallet.calls().contains(&"broadcast"));
}
