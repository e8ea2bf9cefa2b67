// src/lib.rs

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    blockchain::{
        executor::{ExecutorOptions, TransactionExecutor},
        intent::{BuildContext, IntentBuilder},
        models::Network,
        wallet::WalletConnection,
    },
    config::Config,
    registry::ToolRegistry,
    stream::{MessagePart, RenderItem, StreamConsumer},
};

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod registry;
pub mod rpc;
pub mod stream;
pub mod utils;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Tool dispatch table
    pub registry: Arc<ToolRegistry>,
    /// Turns action tool output into transaction intents
    pub builder: IntentBuilder,
    /// Render state of every message seen so far
    pub consumer: Arc<Mutex<StreamConsumer>>,
    /// Client for the Stacks API
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(ToolRegistry::builtin());
        let consumer = StreamConsumer::new(registry.clone())
            .with_memoization(config.memoize_renders)
            .with_build_context(BuildContext::new().with_network(config.network));
        Self {
            builder: IntentBuilder::new(registry.clone()),
            registry,
            consumer: Arc::new(Mutex::new(consumer)),
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Build context for a request, defaulting to the configured network.
    pub fn build_context(&self, deployer: Option<String>, network: Option<Network>) -> BuildContext {
        let mut ctx = BuildContext::new().with_network(network.unwrap_or(self.config.network));
        if let Some(deployer) = deployer {
            ctx = ctx.with_deployer(deployer);
        }
        ctx
    }

    /// Executor over `wallet` with the configured broadcast timeout and explorer host.
    pub fn executor(&self, wallet: WalletConnection) -> TransactionExecutor {
        TransactionExecutor::new(wallet, ExecutorOptions::from(&self.config))
    }

    /// Feeds a message's parts to the consumer and returns its render list.
    /// `deployer` is the connected address, if any.
    pub async fn render_message(
        &self,
        message_id: &str,
        parts: &[MessagePart],
        replace: bool,
        deployer: Option<String>,
    ) -> Vec<RenderItem> {
        let ctx = self.build_context(deployer, None);
        let mut consumer = self.consumer.lock().await;
        let items = if replace {
            consumer.replace_with(message_id, parts, &ctx)
        } else {
            consumer.update_with(message_id, parts, &ctx)
        };
        items.to_vec()
    }

    /// Drops the render state of a message. Returns whether it was known.
    pub async fn forget_message(&self, message_id: &str) -> bool {
        self.consumer.lock().await.remove(message_id)
    }
}
