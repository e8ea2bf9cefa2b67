//! Transaction intent builder.
//!
//! Turns the raw output of an action tool into one of the four
//! [`TransactionIntent`] variants. Either the whole intent validates or
//! a [`ValidationError`] naming the offending field is returned; nothing
//! is partially constructed.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use validator::Validate;

use crate::{
    blockchain::models::{ClarityVersion, IntentKind, Network, PreparedIntent, TransactionIntent},
    error::ValidationError,
    registry::{normalize_identifier, ToolRegistry},
    utils::{lookup, optional_array, optional_str, required_str, snake_to_camel},
};

lazy_static! {
    static ref CONTRACT_NAME_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").unwrap();
    static ref FUNCTION_NAME_RE: Regex =
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9_!?+<>=/*-]*$").unwrap();
    static ref C32_ADDRESS_RE: Regex = Regex::new(r"^S[PMTN][0-9A-HJKMNP-TV-Z]{26,39}$").unwrap();
}

pub const MAX_MEMO_BYTES: usize = 34;

#[derive(Debug, Validate)]
struct ContractRef<'a> {
    #[validate(
        length(min = 1, max = 40, message = "must be 1-40 characters"),
        regex(
            path = "CONTRACT_NAME_RE",
            message = "must start with a letter and contain only letters, digits, '-' or '_'"
        )
    )]
    contract_name: &'a str,
}

#[derive(Debug, Validate)]
struct CallFields<'a> {
    #[validate(
        length(min = 1, max = 128, message = "must be 1-128 characters"),
        regex(path = "FUNCTION_NAME_RE", message = "is not a valid Clarity function name")
    )]
    function_name: &'a str,
}

#[derive(Debug, Validate)]
struct DeployFields<'a> {
    #[validate(
        length(min = 1, max = 40, message = "must be 1-40 characters"),
        regex(
            path = "CONTRACT_NAME_RE",
            message = "must start with a letter and contain only letters, digits, '-' or '_'"
        )
    )]
    contract_name: &'a str,
    #[validate(length(min = 1, message = "must not be empty"))]
    code: &'a str,
    #[validate(range(min = 1, max = 3, message = "must be 1, 2 or 3"))]
    clarity_version: u8,
}

/// Caller-supplied facts the tool output does not carry.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Address that will sign a deployment; used to derive its contract id.
    pub deployer: Option<String>,
    /// When set, principals for the other network are rejected.
    pub network: Option<Network>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deployer(mut self, deployer: impl Into<String>) -> Self {
        self.deployer = Some(deployer.into());
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }
}

/// Builds intents for tools registered as transaction producers.
#[derive(Debug, Clone)]
pub struct IntentBuilder {
    registry: Arc<ToolRegistry>,
}

impl IntentBuilder {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn build(
        &self,
        tool_identifier: &str,
        output: &Value,
        ctx: &BuildContext,
    ) -> Result<PreparedIntent, ValidationError> {
        let descriptor = self.registry.resolve(tool_identifier);
        let body = locate_transaction(output)?;
        let kind = resolve_kind(descriptor.intent_kind, body)?;

        let intent = match kind {
            IntentKind::StxTransfer => build_stx_transfer(body)?,
            IntentKind::ContractCall => build_contract_call(body)?,
            IntentKind::ContractDeploy => build_contract_deploy(body)?,
            IntentKind::TokenTransfer => build_token_transfer(body)?,
        };

        if let Some(network) = ctx.network {
            check_network(&intent, network)?;
        }

        let deployer = match ctx.deployer.as_deref() {
            Some(d) => Some(d),
            None => optional_str(body, "deployer")?,
        };
        let contract_id = match (&intent, deployer) {
            (TransactionIntent::ContractDeploy { .. }, Some(deployer)) => {
                validate_principal("deployer", deployer)?;
                intent.deployed_contract_id(deployer)
            }
            _ => None,
        };

        Ok(PreparedIntent {
            tool_identifier: normalize_identifier(tool_identifier).to_string(),
            intent: Arc::new(intent),
            contract_id,
        })
    }
}

/// Unwraps the object that actually describes the transaction.
fn locate_transaction(output: &Value) -> Result<&Map<String, Value>, ValidationError> {
    let obj = output
        .as_object()
        .ok_or_else(|| ValidationError::new("output", "expected a JSON object"))?;

    if obj.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = obj
            .get("error")
            .or_else(|| obj.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("tool reported failure");
        return Err(ValidationError::new("success", reason));
    }

    for key in ["transaction", "txParams"] {
        if let Some(Value::Object(inner)) = lookup(obj, key) {
            return Ok(inner);
        }
    }
    Ok(obj)
}

fn resolve_kind(
    registered: Option<IntentKind>,
    body: &Map<String, Value>,
) -> Result<IntentKind, ValidationError> {
    let tag = match optional_str(body, "txType")? {
        Some(tag) => Some(tag),
        None => optional_str(body, "transactionType")?,
    };

    match (registered, tag) {
        (Some(kind), None) => Ok(kind),
        (registered, Some(tag)) => {
            let tagged = IntentKind::parse_tag(tag).ok_or_else(|| {
                ValidationError::new("txType", format!("unsupported transaction type '{}'", tag))
            })?;
            match registered {
                Some(kind) if kind != tagged => Err(ValidationError::new(
                    "txType",
                    format!("tool produces {} but output is tagged {}", kind, tagged),
                )),
                _ => Ok(tagged),
            }
        }
        (None, None) => Err(ValidationError::new(
            "txType",
            "tool output does not describe a transaction",
        )),
    }
}

fn build_stx_transfer(body: &Map<String, Value>) -> Result<TransactionIntent, ValidationError> {
    let recipient = required_str(body, "recipient")?;
    validate_principal("recipient", recipient)?;
    let amount = parse_amount(body, "amount")?;
    let memo = parse_memo(body)?;
    Ok(TransactionIntent::StxTransfer {
        recipient: recipient.to_string(),
        amount,
        memo,
    })
}

fn build_contract_call(body: &Map<String, Value>) -> Result<TransactionIntent, ValidationError> {
    let (contract_address, contract_name) = contract_ref(body)?;
    let function_name = required_str(body, "functionName")?;
    CallFields { function_name }.validate().map_err(first_violation)?;
    let args = match lookup(body, "functionArgs") {
        Some(_) => optional_array(body, "functionArgs")?,
        None => optional_array(body, "args")?,
    };
    let post_conditions = optional_array(body, "postConditions")?;
    Ok(TransactionIntent::ContractCall {
        contract_address,
        contract_name,
        function_name: function_name.to_string(),
        args,
        post_conditions,
    })
}

fn build_contract_deploy(body: &Map<String, Value>) -> Result<TransactionIntent, ValidationError> {
    let contract_name = required_str(body, "contractName")?;
    let code = match lookup(body, "codeBody") {
        Some(_) => required_str(body, "codeBody").map_err(|e| ValidationError::new("code", e.reason))?,
        None => required_str(body, "code")?,
    };
    let clarity_version = parse_clarity_version(body)?;
    DeployFields {
        contract_name,
        code,
        clarity_version,
    }
    .validate()
    .map_err(first_violation)?;
    Ok(TransactionIntent::ContractDeploy {
        contract_name: contract_name.to_string(),
        code: code.to_string(),
        clarity_version: ClarityVersion(clarity_version),
    })
}

fn build_token_transfer(body: &Map<String, Value>) -> Result<TransactionIntent, ValidationError> {
    let (contract_address, contract_name) = contract_ref(body)?;
    let recipient = required_str(body, "recipient")?;
    validate_principal("recipient", recipient)?;
    let amount = parse_amount(body, "amount")?;
    let memo = parse_memo(body)?;
    Ok(TransactionIntent::TokenTransfer {
        contract_address,
        contract_name,
        recipient: recipient.to_string(),
        amount,
        memo,
    })
}

/// Reads `contractAddress` + `contractName`, or a combined `contractId`.
fn contract_ref(body: &Map<String, Value>) -> Result<(String, String), ValidationError> {
    let (address, name) = if lookup(body, "contractAddress").is_none() && lookup(body, "contractId").is_some() {
        let id = required_str(body, "contractId")?;
        id.split_once('.')
            .ok_or_else(|| ValidationError::new("contractId", "expected <address>.<contract-name>"))?
    } else {
        (required_str(body, "contractAddress")?, required_str(body, "contractName")?)
    };

    if !C32_ADDRESS_RE.is_match(address) {
        return Err(ValidationError::new("contractAddress", "not a valid Stacks address"));
    }
    ContractRef { contract_name: name }
        .validate()
        .map_err(first_violation)?;
    Ok((address.to_string(), name.to_string()))
}

/// Standard principal, or `<address>.<contract-name>`.
pub fn validate_principal(field: &str, principal: &str) -> Result<(), ValidationError> {
    let (address, contract) = match principal.split_once('.') {
        Some((address, contract)) => (address, Some(contract)),
        None => (principal, None),
    };
    if !C32_ADDRESS_RE.is_match(address) {
        return Err(ValidationError::new(field, "not a valid Stacks address"));
    }
    if let Some(contract_name) = contract {
        ContractRef { contract_name }
            .validate()
            .map_err(|e| ValidationError::new(field, first_violation(e).reason))?;
    }
    Ok(())
}

fn parse_amount(body: &Map<String, Value>, key: &str) -> Result<u128, ValidationError> {
    let amount = match lookup(body, key) {
        None => return Err(ValidationError::missing(key)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u128>()
            .map_err(|_| ValidationError::new(key, "must be a whole number of base units"))?,
        Some(Value::Number(n)) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| ValidationError::new(key, "must be a whole number of base units"))?,
        Some(_) => return Err(ValidationError::new(key, "expected a string or number")),
    };
    if amount == 0 {
        return Err(ValidationError::new(key, "must be greater than zero"));
    }
    Ok(amount)
}

fn parse_memo(body: &Map<String, Value>) -> Result<Option<String>, ValidationError> {
    match optional_str(body, "memo")? {
        Some(memo) if memo.len() > MAX_MEMO_BYTES => Err(ValidationError::new(
            "memo",
            format!("must be at most {} bytes", MAX_MEMO_BYTES),
        )),
        memo => Ok(memo.map(str::to_string)),
    }
}

fn parse_clarity_version(body: &Map<String, Value>) -> Result<u8, ValidationError> {
    let invalid = || ValidationError::new("clarityVersion", "must be 1, 2 or 3");
    match lookup(body, "clarityVersion") {
        None => Ok(ClarityVersion::LATEST.0),
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u8::try_from(v).ok()).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u8>().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

fn check_network(intent: &TransactionIntent, network: Network) -> Result<(), ValidationError> {
    let principals: Vec<(&str, &str)> = match intent {
        TransactionIntent::StxTransfer { recipient, .. } => vec![("recipient", recipient.as_str())],
        TransactionIntent::ContractCall { contract_address, .. } => {
            vec![("contractAddress", contract_address.as_str())]
        }
        TransactionIntent::ContractDeploy { .. } => vec![],
        TransactionIntent::TokenTransfer {
            contract_address,
            recipient,
            ..
        } => vec![
            ("contractAddress", contract_address.as_str()),
            ("recipient", recipient.as_str()),
        ],
    };

    for (field, principal) in principals {
        if let Some(found) = Network::of_principal(principal) {
            if found != network {
                return Err(ValidationError::new(
                    field,
                    format!("{} address cannot be used on {}", found, network),
                ));
            }
        }
    }
    Ok(())
}

/// First violation, in field-name order so reports are stable.
fn first_violation(errors: validator::ValidationErrors) -> ValidationError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(name, _)| *name);

    fields
        .into_iter()
        .find_map(|(name, errs)| {
            errs.first().map(|err| {
                let reason = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                ValidationError::new(snake_to_camel(name), reason)
            })
        })
        .unwrap_or_else(|| ValidationError::new("output", "failed validation"))
}
