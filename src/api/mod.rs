//! # API Module
//!
//! HTTP handlers for the Stacks agent server. All routes are nested under `/api`.
//!
//! ## Available Endpoints
//!
//! ### Service
//! - `GET /health` - Liveness and configured network
//! - `POST /rpc` - JSON-RPC endpoint, same methods as stdin mode (mounted at `/api/rpc`)
//!
//! ### Tool dispatch
//! - `GET /tools` - Every registered tool descriptor
//! - `GET /tools/:identifier` - Descriptor for one identifier (fallback on miss)
//!
//! ### Streaming and intents
//! - `POST /messages/:message_id/render` - Feed a message's parts, get its render list
//! - `DELETE /messages/:message_id` - Forget a message's render state
//! - `POST /intents` - Build a transaction intent from a tool output

pub mod health;
pub mod intents;
pub mod messages;
pub mod tools;

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    rpc::{
        handler::handle_rpc_request,
        protocol::{error_codes, Request, Response},
    },
    AppState,
};

/// Builds the full application router.
pub fn create_router(state: AppState) -> Router {
    let api_router = Router::new()
        // Health check
        .route("/health", get(health::health_handler))
        // Tool dispatch
        .route("/tools", get(tools::list_tools_handler))
        .route("/tools/:identifier", get(tools::resolve_tool_handler))
        // Rendering and intents
        .route("/messages/:message_id", delete(messages::remove_message_handler))
        .route("/messages/:message_id/render", post(messages::render_message_handler))
        .route("/intents", post(intents::build_intent_handler))
        // JSON-RPC endpoint
        .route("/rpc", post(rpc_handler));

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// Forward JSON-RPC requests over HTTP to the RPC handler
async fn rpc_handler(State(state): State<AppState>, Json(req): Json<Request>) -> Json<Response> {
    match handle_rpc_request(req, state).await {
        Some(resp) => Json(resp),
        None => Json(Response::error(
            serde_json::Value::Null,
            error_codes::INVALID_REQUEST,
            "Notifications are not supported over HTTP".into(),
        )),
    }
}
