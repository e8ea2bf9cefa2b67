// src/blockchain/services/tx_status.rs

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::blockchain::models::{block_explorer_url, Network};

/// On-chain status of a broadcast transaction, as reported by the Hiro API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ChainStatus {
    /// Not yet indexed or still in the mempool.
    Pending,
    #[serde(rename_all = "camelCase")]
    Success {
        block_height: u64,
        block_hash: String,
        block_url: String,
    },
    Aborted { reason: String },
    Dropped { reason: String },
}

impl ChainStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ChainStatus::Pending)
    }
}

#[derive(Debug, Deserialize)]
struct TxRecord {
    tx_status: String,
    #[serde(default)]
    block_height: Option<u64>,
    #[serde(default)]
    block_hash: Option<String>,
    #[serde(default)]
    tx_result: Option<TxResult>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    repr: String,
}

/// Where to look up a transaction and how to link the block it lands in.
#[derive(Debug, Clone, Copy)]
pub struct TxLookup<'a> {
    pub api_base: &'a str,
    pub tx_id: &'a str,
    pub network: Network,
    pub explorer_host: &'a str,
}

/// GET `{api_base}/extended/v1/tx/{tx_id}`.
pub async fn fetch_tx_status(client: &Client, lookup: &TxLookup<'_>) -> Result<ChainStatus> {
    let TxLookup {
        api_base,
        tx_id,
        network,
        explorer_host,
    } = *lookup;
    let url = format!("{}/extended/v1/tx/{}", api_base.trim_end_matches('/'), tx_id);
    let res = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?;

    // The API 404s until the transaction is indexed.
    if res.status() == StatusCode::NOT_FOUND {
        return Ok(ChainStatus::Pending);
    }
    if !res.status().is_success() {
        return Err(anyhow!("tx status lookup for {} returned {}", tx_id, res.status()));
    }

    let record: TxRecord = res.json().await.context("malformed tx status response")?;
    let reason = || {
        record
            .tx_result
            .as_ref()
            .map(|r| r.repr.clone())
            .unwrap_or_else(|| record.tx_status.clone())
    };

    let status = match record.tx_status.as_str() {
        "pending" => ChainStatus::Pending,
        "success" => {
            let block_hash = record.block_hash.clone().unwrap_or_default();
            ChainStatus::Success {
                block_height: record.block_height.unwrap_or_default(),
                block_url: block_explorer_url(explorer_host, &block_hash, network),
                block_hash,
            }
        }
        s if s.starts_with("abort") => ChainStatus::Aborted { reason: reason() },
        s if s.starts_with("dropped") => ChainStatus::Dropped {
            reason: s.to_string(),
        },
        other => return Err(anyhow!("unknown tx_status '{}'", other)),
    };
    debug!(tx_id, ?status, "fetched tx status");
    Ok(status)
}

/// Polls until the transaction settles, `max_polls` is exhausted or `cancel`
/// fires. Returns the last observed status.
pub async fn poll_until_settled(
    client: &Client,
    lookup: &TxLookup<'_>,
    interval: Duration,
    max_polls: u32,
    cancel: &CancellationToken,
) -> Result<ChainStatus> {
    let mut last = ChainStatus::Pending;
    for poll in 1..=max_polls {
        last = fetch_tx_status(client, lookup).await?;
        if last.is_settled() {
            info!(tx_id = lookup.tx_id, poll, ?last, "transaction settled");
            return Ok(last);
        }
        if poll == max_polls {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    Ok(last)
}
