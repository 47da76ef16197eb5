use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use modelrelay_common::LIVENESS_PATH;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use tower_http::trace::TraceLayer;

use crate::mcp::RelayMcpServer;
use crate::service::ChatService;

/// Path the Streamable HTTP MCP endpoint is mounted at.
pub const MCP_PATH: &str = "/mcp";

/// Build the HTTP router: liveness probe, status, and the MCP endpoint.
pub fn build_router(service: Arc<ChatService>) -> Router {
    let mcp_service = {
        let service = Arc::clone(&service);
        StreamableHttpService::new(
            move || Ok(RelayMcpServer::new(Arc::clone(&service))),
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig::default(),
        )
    };

    Router::new()
        .route(LIVENESS_PATH, get(health))
        .route("/api/status", get(status))
        .with_state(service)
        .nest_service(MCP_PATH, mcp_service)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(service): State<Arc<ChatService>>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "conversations": service.store().len(),
        "models": service.list_models().models,
    }))
}
