use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    blockchain::models::{Network, PreparedIntent},
    error::ValidationError,
    AppState,
};

// --- Request Model ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildIntentInput {
    pub tool_identifier: String,
    pub output: Value,
    /// Signing address, when known, so deployments get their contract id.
    pub deployer: Option<String>,
    pub network: Option<Network>,
}

// --- Handler ---

/// Handler for the POST /intents endpoint.
///
/// Malformed tool output is a 422 carrying `{field, reason}`.
pub async fn build_intent_handler(
    State(state): State<AppState>,
    Json(input): Json<BuildIntentInput>,
) -> Result<Json<PreparedIntent>, (StatusCode, Json<ValidationError>)> {
    let ctx = state.build_context(input.deployer, input.network);

    match state.builder.build(&input.tool_identifier, &input.output, &ctx) {
        Ok(prepared) => {
            info!(
                tool = %prepared.tool_identifier,
                kind = %prepared.intent.kind(),
                "built transaction intent"
            );
            Ok(Json(prepared))
        }
        Err(err) => {
            warn!(tool = %input.tool_identifier, %err, "rejected tool output");
            Err((StatusCode::UNPROCESSABLE_ENTITY, Json(err)))
        }
    }
}
