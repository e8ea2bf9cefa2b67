use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    stream::{MessagePart, RenderItem},
    AppState,
};

// --- Request and Response Models ---

#[derive(Debug, Deserialize)]
pub struct RenderInput {
    /// Full ordered part list of the message so far.
    pub parts: Vec<MessagePart>,
    /// Set when the message was edited or regenerated.
    #[serde(default)]
    pub replace: bool,
    /// Connected wallet address; deploy cards derive their contract id from it.
    #[serde(default)]
    pub deployer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    pub message_id: String,
    pub items: Vec<RenderItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOutput {
    pub message_id: String,
    pub removed: bool,
}

// --- Handler ---

/// Handler for the POST /messages/{message_id}/render endpoint.
pub async fn render_message_handler(
    Path(message_id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<RenderInput>,
) -> Json<RenderOutput> {
    let items = state
        .render_message(&message_id, &input.parts, input.replace, input.deployer)
        .await;
    Json(RenderOutput { message_id, items })
}

/// Handler for the DELETE /messages/{message_id} endpoint.
pub async fn remove_message_handler(
    Path(message_id): Path<String>,
    State(state): State<AppState>,
) -> Json<RemoveOutput> {
    let removed = state.forget_message(&message_id).await;
    debug!(%message_id, removed, "dropped message render state");
    Json(RemoveOutput { message_id, removed })
}
