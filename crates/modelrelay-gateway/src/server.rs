use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use modelrelay_common::{Error, Result};
use rmcp::ServiceExt;
use tokio::net::TcpListener;
use tracing::info;

use crate::mcp::RelayMcpServer;
use crate::router::{MCP_PATH, build_router};
use crate::service::ChatService;

/// Long-lived HTTP process serving `/health` and the MCP endpoint on localhost.
pub struct GatewayServer {
    service: Arc<ChatService>,
    port: u16,
}

impl GatewayServer {
    pub fn new(service: Arc<ChatService>, port: u16) -> Self {
        Self { service, port }
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Process(format!("failed to bind {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("serving MCP on http://{addr}{MCP_PATH}");

        axum::serve(listener, build_router(self.service))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("server on {addr} stopped");
        Ok(())
    }
}

/// Serve the MCP tools over stdin/stdout until the client disconnects.
pub async fn serve_stdio(service: Arc<ChatService>) -> Result<()> {
    info!("serving MCP over stdio");
    let running = RelayMcpServer::new(service)
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| Error::Mcp(format!("stdio handshake failed: {e}")))?;

    let reason = running
        .waiting()
        .await
        .map_err(|e| Error::Mcp(format!("stdio session aborted: {e}")))?;
    info!("stdio session ended: {reason:?}");
    Ok(())
}
