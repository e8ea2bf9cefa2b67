// src/blockchain/models.rs
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

// --- Network ---

/// Stacks network a wallet is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Default Hiro API base for this network.
    pub fn default_api_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.hiro.so",
            Network::Testnet => "https://api.testnet.hiro.so",
        }
    }

    /// Address version characters valid on this network
    /// (standard and multisig).
    pub fn address_versions(&self) -> [char; 2] {
        match self {
            Network::Mainnet => ['P', 'M'],
            Network::Testnet => ['T', 'N'],
        }
    }

    /// Network implied by a principal's version character, if recognizable.
    pub fn of_principal(principal: &str) -> Option<Network> {
        let mut chars = principal.chars();
        if chars.next() != Some('S') {
            return None;
        }
        match chars.next() {
            Some('P') | Some('M') => Some(Network::Mainnet),
            Some('T') | Some('N') => Some(Network::Testnet),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

// --- Transaction intents ---

/// The four transaction shapes a tool output can be turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentKind {
    StxTransfer,
    ContractCall,
    ContractDeploy,
    TokenTransfer,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::StxTransfer => "stx-transfer",
            IntentKind::ContractCall => "contract-call",
            IntentKind::ContractDeploy => "contract-deploy",
            IntentKind::TokenTransfer => "token-transfer",
        }
    }

    /// Parses the `txType` tag tools put on their output.
    /// Accepts kebab, snake and camel spellings.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let normalized: String = tag
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "stxtransfer" | "transfer" => Some(IntentKind::StxTransfer),
            "contractcall" | "call" => Some(IntentKind::ContractCall),
            "contractdeploy" | "deploy" => Some(IntentKind::ContractDeploy),
            "tokentransfer" | "sip10transfer" | "ftransfer" => Some(IntentKind::TokenTransfer),
            _ => None,
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clarity language version used for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarityVersion(pub u8);

impl ClarityVersion {
    pub const LATEST: ClarityVersion = ClarityVersion(3);
}

/// A validated, canonical description of a pending blockchain action.
///
/// Constructed only by the intent builder and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransactionIntent {
    #[serde(rename = "stx-transfer", rename_all = "camelCase")]
    StxTransfer {
        recipient: String,
        #[serde(serialize_with = "amount_as_string")]
        amount: u128,
        #[serde(skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
    },
    #[serde(rename = "contract-call", rename_all = "camelCase")]
    ContractCall {
        contract_address: String,
        contract_name: String,
        function_name: String,
        args: Vec<Value>,
        post_conditions: Vec<Value>,
    },
    #[serde(rename = "contract-deploy", rename_all = "camelCase")]
    ContractDeploy {
        contract_name: String,
        code: String,
        clarity_version: ClarityVersion,
    },
    #[serde(rename = "token-transfer", rename_all = "camelCase")]
    TokenTransfer {
        contract_address: String,
        contract_name: String,
        recipient: String,
        #[serde(serialize_with = "amount_as_string")]
        amount: u128,
        #[serde(skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
    },
}

impl TransactionIntent {
    pub fn kind(&self) -> IntentKind {
        match self {
            TransactionIntent::StxTransfer { .. } => IntentKind::StxTransfer,
            TransactionIntent::ContractCall { .. } => IntentKind::ContractCall,
            TransactionIntent::ContractDeploy { .. } => IntentKind::ContractDeploy,
            TransactionIntent::TokenTransfer { .. } => IntentKind::TokenTransfer,
        }
    }

    /// `<deployer>.<contract-name>` for deployments, `None` otherwise.
    pub fn deployed_contract_id(&self, deployer: &str) -> Option<String> {
        match self {
            TransactionIntent::ContractDeploy { contract_name, .. } => {
                Some(format!("{}.{}", deployer, contract_name))
            }
            _ => None,
        }
    }
}

fn amount_as_string<S: Serializer>(amount: &u128, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&amount.to_string())
}

/// Builder output: the shared, immutable intent plus anything derivable
/// before signing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedIntent {
    pub tool_identifier: String,
    pub intent: Arc<TransactionIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
}

// --- Wallet round-trip artifacts ---

/// Opaque signed payload handed back by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: String,
}

/// Network acceptance of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastAccepted {
    pub tx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
}

/// Connected wallet identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub address: String,
    pub network: Network,
}

// --- Receipts ---

/// Terminal artifact of a confirmed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_id: String,
    pub network: Network,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    pub explorer_url: String,
}

impl Receipt {
    pub fn new(
        tx_id: impl Into<String>,
        network: Network,
        contract_id: Option<String>,
        explorer_host: &str,
    ) -> Self {
        let tx_id = tx_id.into();
        let explorer_url = tx_explorer_url(explorer_host, &tx_id, network);
        Self {
            tx_id,
            network,
            contract_id,
            explorer_url,
        }
    }
}

pub const DEFAULT_EXPLORER_HOST: &str = "explorer.hiro.so";

/// `https://<host>/txid/{txId}?chain={network}`
pub fn tx_explorer_url(host: &str, tx_id: &str, network: Network) -> String {
    format!("https://{}/txid/{}?chain={}", host, tx_id, network)
}

/// `https://<host>/block/{hash}?chain={network}`
pub fn block_explorer_url(host: &str, block_hash: &str, network: Network) -> String {
    format!("https://{}/block/{}?chain={}", host, block_hash, network)
}
