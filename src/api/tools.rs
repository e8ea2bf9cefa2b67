use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::{registry::ToolDescriptor, AppState};

// --- Response Models ---

#[derive(Debug, Serialize)]
pub struct CatalogOutput {
    pub count: usize,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct ResolveOutput {
    pub identifier: String,
    /// False when the fallback descriptor was returned.
    pub matched: bool,
    pub descriptor: ToolDescriptor,
}

// --- Handlers ---

/// Handler for the GET /tools endpoint.
pub async fn list_tools_handler(State(state): State<AppState>) -> Json<CatalogOutput> {
    Json(CatalogOutput {
        count: state.registry.len(),
        tools: state.registry.catalog().to_vec(),
    })
}

/// Handler for the GET /tools/{identifier} endpoint. Never fails.
pub async fn resolve_tool_handler(
    Path(identifier): Path<String>,
    State(state): State<AppState>,
) -> Json<ResolveOutput> {
    let descriptor = *state.registry.resolve(&identifier);
    info!(%identifier, renderer = descriptor.renderer_id, "resolved tool");
    Json(ResolveOutput {
        identifier,
        matched: !descriptor.is_fallback(),
        descriptor,
    })
}
