use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;
use tracing::warn;

use crate::service::{ChatRequest, ChatService, HistoryRequest};

const INSTRUCTIONS: &str = "Chat with the configured language models. Call `list_models` to \
see which models exist, `chat` to send a message (pass the returned conversationId to \
continue, or a different modelId to fork the conversation onto another model), and \
`history` to read a conversation back.";

/// MCP server exposing `chat`, `list_models` and `history`.
#[derive(Clone)]
pub struct RelayMcpServer {
    service: Arc<ChatService>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RelayMcpServer {
    pub fn new(service: Arc<ChatService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Send a message to a model and get its reply. Starts a new \
        conversation unless conversationId is given; a modelId different from the \
        conversation's model continues in a new conversation bound to that model.")]
    async fn chat(
        &self,
        Parameters(request): Parameters<ChatRequest>,
    ) -> Result<CallToolResult, McpError> {
        render(self.service.chat(request).await)
    }

    #[tool(description = "List the configured models.")]
    async fn list_models(&self) -> Result<CallToolResult, McpError> {
        render(Ok(self.service.list_models()))
    }

    #[tool(description = "Return the (truncated) message history of a conversation.")]
    async fn history(
        &self,
        Parameters(request): Parameters<HistoryRequest>,
    ) -> Result<CallToolResult, McpError> {
        render(self.service.history(request))
    }
}

#[tool_handler]
impl ServerHandler for RelayMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.instructions = Some(INSTRUCTIONS.to_string());
        info
    }
}

/// Domain failures become tool error results so one bad request never tears down
/// the session.
fn render<T: Serialize>(
    result: modelrelay_common::Result<T>,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
        Err(e) => {
            warn!("tool call failed: {e}");
            Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrelay_common::Error;

    #[test]
    fn errors_render_as_tool_errors() {
        let result = render::<()>(Err(Error::NotFound("abc".into()))).unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn router_exposes_all_tools() {
        let mut names: Vec<String> = RelayMcpServer::tool_router()
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["chat", "history", "list_models"]);
    }

    #[test]
    fn values_render_as_json_text() {
        let result = render(Ok(serde_json::json!({"ok": true}))).unwrap();
        assert_ne!(result.is_error, Some(true));
        assert_eq!(result.content.len(), 1);
    }
}
