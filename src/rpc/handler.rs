//! # JSON-RPC Handler
//!
//! Dispatches line-delimited JSON-RPC 2.0 requests (stdin or `POST /api/rpc`).
//!
//! ## Methods
//!
//! - `initialize` - server info
//! - `tools/resolve` - descriptor for one tool identifier
//! - `tools/catalog` - every registered descriptor
//! - `messages/render` - feed a message's parts, get its render list
//! - `messages/remove` - forget a message's render state
//! - `intents/build` - turn a tool output into a transaction intent
//! - `receipts/explorer-url` - explorer link for a transaction or block
//! - `transactions/status` - on-chain status of a broadcast transaction;
//!   with `wait: true`, polls until it settles

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    blockchain::{
        models::{block_explorer_url, tx_explorer_url, Network},
        services::tx_status::{fetch_tx_status, poll_until_settled, TxLookup},
    },
    error::ValidationError,
    rpc::protocol::{error_codes, Request, Response},
    stream::MessagePart,
    utils::{get_optional_arg, get_required_arg},
    AppState,
};

pub async fn handle_rpc_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling RPC request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let params = req.params.clone().unwrap_or_else(|| json!({}));
    let result = match req.method.as_str() {
        "initialize" => Ok(handle_initialize(&state)),
        "tools/resolve" => handle_resolve(&params, &req.id, &state),
        "tools/catalog" => Ok(handle_catalog(&state)),
        "messages/render" => handle_render(&params, &req.id, &state).await,
        "messages/remove" => handle_remove(&params, &req.id, &state).await,
        "intents/build" => handle_build(&params, &req.id, &state),
        "receipts/explorer-url" => handle_explorer_url(&params, &req.id, &state),
        "transactions/status" => handle_tx_status(&params, &req.id, &state).await,
        _ => Err(Response::error(
            req.id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        )),
    };

    Some(match result {
        Ok(value) => Response::success(req.id, value),
        Err(response) => response,
    })
}

/// Maps a builder rejection onto `INVALID_PARAMS`, carrying the field.
pub fn validation_response(req_id: &Value, err: &ValidationError) -> Response {
    Response::error_with_data(
        req_id.clone(),
        error_codes::INVALID_PARAMS,
        err.to_string(),
        json!({ "field": err.field, "reason": err.reason }),
    )
}

fn parse_network(params: &Value, req_id: &Value) -> Result<Option<Network>, Response> {
    match get_optional_arg::<String>(params, "network") {
        None => Ok(None),
        Some(raw) => raw.parse::<Network>().map(Some).map_err(|e| {
            Response::error(req_id.clone(), error_codes::INVALID_PARAMS, e)
        }),
    }
}

fn handle_initialize(state: &AppState) -> Value {
    json!({
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": { "tools": state.registry.len() },
        "network": state.config.network,
        "instructions": "Resolves agent tool calls to renderers and prepares Stacks transactions for wallet signing."
    })
}

fn handle_resolve(params: &Value, req_id: &Value, state: &AppState) -> Result<Value, Response> {
    let identifier: String = get_required_arg(params, "identifier", req_id)?;
    let descriptor = state.registry.resolve(&identifier);
    Ok(json!({
        "identifier": identifier,
        "matched": !descriptor.is_fallback(),
        "descriptor": descriptor,
    }))
}

fn handle_catalog(state: &AppState) -> Value {
    json!({
        "count": state.registry.len(),
        "tools": state.registry.catalog(),
    })
}

async fn handle_render(params: &Value, req_id: &Value, state: &AppState) -> Result<Value, Response> {
    let message_id: String = get_required_arg(params, "messageId", req_id)?;
    let parts: Vec<MessagePart> = get_required_arg(params, "parts", req_id)?;
    let replace = get_optional_arg::<bool>(params, "replace").unwrap_or(false);
    let deployer = get_optional_arg::<String>(params, "deployer");

    let items = state.render_message(&message_id, &parts, replace, deployer).await;
    Ok(json!({ "messageId": message_id, "items": items }))
}

async fn handle_remove(params: &Value, req_id: &Value, state: &AppState) -> Result<Value, Response> {
    let message_id: String = get_required_arg(params, "messageId", req_id)?;
    let removed = state.forget_message(&message_id).await;
    Ok(json!({ "messageId": message_id, "removed": removed }))
}

fn handle_build(params: &Value, req_id: &Value, state: &AppState) -> Result<Value, Response> {
    let tool_identifier: String = get_required_arg(params, "toolIdentifier", req_id)?;
    let output: Value = get_required_arg(params, "output", req_id)?;
    let ctx = state.build_context(
        get_optional_arg(params, "deployer"),
        parse_network(params, req_id)?,
    );

    match state.builder.build(&tool_identifier, &output, &ctx) {
        Ok(prepared) => Ok(json!(prepared)),
        Err(err) => Err(validation_response(req_id, &err)),
    }
}

fn handle_explorer_url(params: &Value, req_id: &Value, state: &AppState) -> Result<Value, Response> {
    let network = parse_network(params, req_id)?.unwrap_or(state.config.network);
    let host = &state.config.explorer_host;

    if let Some(tx_id) = get_optional_arg::<String>(params, "txId") {
        return Ok(json!({ "url": tx_explorer_url(host, &tx_id, network) }));
    }
    if let Some(hash) = get_optional_arg::<String>(params, "blockHash") {
        return Ok(json!({ "url": block_explorer_url(host, &hash, network) }));
    }
    Err(Response::error(
        req_id.clone(),
        error_codes::INVALID_PARAMS,
        "Either 'txId' or 'blockHash' is required".into(),
    ))
}

async fn handle_tx_status(params: &Value, req_id: &Value, state: &AppState) -> Result<Value, Response> {
    let tx_id: String = get_required_arg(params, "txId", req_id)?;
    let network = parse_network(params, req_id)?.unwrap_or(state.config.network);
    let lookup = TxLookup {
        api_base: state.config.api_url_for(network),
        tx_id: &tx_id,
        network,
        explorer_host: &state.config.explorer_host,
    };

    let wait = get_optional_arg::<bool>(params, "wait").unwrap_or(false);

    let status = if wait {
        poll_until_settled(
            &state.http,
            &lookup,
            state.config.confirmation_poll_interval,
            state.config.confirmation_max_polls,
            &CancellationToken::new(),
        )
        .await
    } else {
        fetch_tx_status(&state.http, &lookup).await
    };

    match status {
        Ok(status) => Ok(json!({ "txId": tx_id, "network": network, "status": status })),
        Err(e) => {
            error!("Failed to fetch status for {}: {:?}", tx_id, e);
            Err(Response::error(
                req_id.clone(),
                error_codes::INTERNAL_ERROR,
                format!("Failed to fetch transaction status: {}", e),
            ))
        }
    }
}
