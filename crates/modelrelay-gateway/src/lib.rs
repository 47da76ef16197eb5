pub mod mcp;
pub mod router;
pub mod server;
pub mod service;

pub use mcp::RelayMcpServer;
pub use router::build_router;
pub use server::{GatewayServer, serve_stdio};
pub use service::{
    ChatReply, ChatRequest, ChatService, HistoryReply, HistoryRequest, ModelList, ModelSummary,
};
