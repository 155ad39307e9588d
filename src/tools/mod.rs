pub mod get_paint_details;
pub mod search_paints;
pub mod sessions;

use get_paint_details::GetPaintDetailsParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_paints::{FilterPaintsParams, SearchPaintsParams};
use sessions::{ListSessionsParams, RecordTurnParams, SessionRefParams, StartSessionParams};
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::catalog::{RetrievalEngine, SearchRequest};
use crate::conversation::{ConversationCache, SessionId, SessionKey, UserId};

/// The paintwise MCP tool handler. Holds the retrieval engine, the conversation
/// cache and the token verifier, and exposes them via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct PaintwiseTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<RetrievalEngine>,
    cache: Arc<ConversationCache>,
    verifier: Option<Arc<TokenVerifier>>,
}

#[tool_router]
impl PaintwiseTools {
    pub fn new(
        engine: Arc<RetrievalEngine>,
        cache: Arc<ConversationCache>,
        verifier: Option<Arc<TokenVerifier>>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
            cache,
            verifier,
        }
    }

    fn authenticate(&self, token: &str) -> Result<UserId, String> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or("session tools are disabled: no auth.jwt_secret configured")?;
        verifier.verify(token).map_err(|e| e.to_string())
    }

    fn session_key(&self, token: &str, session_id: &str) -> Result<SessionKey, String> {
        let user_id = self.authenticate(token)?;
        let session_id = SessionId::parse(session_id).map_err(|e| e.to_string())?;
        Ok(SessionKey::new(session_id, user_id))
    }

    /// Semantic (or hybrid, when filters are given) catalog search.
    #[tool(description = "Search paints by natural language description, optionally constrained by attribute filters. Results are ranked by relevance_score (0-1); only results above the threshold are returned.")]
    async fn search_paints(
        &self,
        Parameters(params): Parameters<SearchPaintsParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty; use filter_paints to browse by attributes".into());
        }
        let request = SearchRequest {
            query: params.query,
            limit: params.limit,
            threshold: params.threshold,
            filters: params.filters.into_filters()?,
        };
        tracing::info!(query = %request.query, "search_paints called");

        let results = self.engine.search(&request).await.map_err(|e| e.to_string())?;
        serde_json::to_string(&serde_json::json!({
            "results": results,
            "total": results.len(),
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    /// Pure attribute filtering.
    #[tool(description = "Filter paints by attributes (environment, finish_type, product_line, color, features, surface_types). All given filters must match. Every result has relevance_score 1.0.")]
    async fn filter_paints(
        &self,
        Parameters(params): Parameters<FilterPaintsParams>,
    ) -> Result<String, String> {
        let filters = params.filters.into_filters()?;
        if filters.is_empty() {
            return Err("at least one filter is required".into());
        }
        tracing::info!(filters = ?filters.describe(), "filter_paints called");

        let results = self
            .engine
            .search(&SearchRequest {
                limit: params.limit,
                ..SearchRequest::filtered(filters)
            })
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string(&serde_json::json!({
            "results": results,
            "total": results.len(),
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    #[tool(description = "Get full details for one paint product by ID.")]
    async fn get_paint_details(
        &self,
        Parameters(params): Parameters<GetPaintDetailsParams>,
    ) -> Result<String, String> {
        tracing::info!(product_id = params.product_id, "get_paint_details called");
        match self
            .engine
            .get_product(params.product_id)
            .await
            .map_err(|e| e.to_string())?
        {
            Some(product) => serde_json::to_string(&product)
                .map_err(|e| format!("serialization failed: {e}")),
            None => Ok(serde_json::json!({
                "found": false,
                "product_id": params.product_id,
            })
            .to_string()),
        }
    }

    #[tool(description = "Start a new conversation session for the authenticated user. Returns its session_id.")]
    async fn start_session(
        &self,
        Parameters(params): Parameters<StartSessionParams>,
    ) -> Result<String, String> {
        let user_id = self.authenticate(&params.access_token)?;
        let session_id = self
            .cache
            .create_session(user_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(serde_json::json!({ "session_id": session_id }).to_string())
    }

    #[tool(description = "List the authenticated user's conversation sessions, most recent first, with message counts and a preview.")]
    async fn list_sessions(
        &self,
        Parameters(params): Parameters<ListSessionsParams>,
    ) -> Result<String, String> {
        let user_id = self.authenticate(&params.access_token)?;
        let sessions = self
            .cache
            .list_sessions(user_id, params.limit)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string(&serde_json::json!({
            "sessions": sessions,
            "total": sessions.len(),
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    #[tool(description = "Get the full message history of one of the authenticated user's sessions.")]
    async fn get_session_history(
        &self,
        Parameters(params): Parameters<SessionRefParams>,
    ) -> Result<String, String> {
        let key = self.session_key(&params.access_token, &params.session_id)?;
        match self.cache.history(&key).await.map_err(|e| e.to_string())? {
            Some(messages) => serde_json::to_string(&serde_json::json!({
                "session_id": key.session_id,
                "messages": messages,
                "message_count": messages.len(),
            }))
            .map_err(|e| format!("serialization failed: {e}")),
            None => Err(format!("session not found: {}", key.session_id)),
        }
    }

    /// Append one human + assistant exchange and persist it.
    #[tool(description = "Record one exchange (customer message and assistant reply) in a session and persist it.")]
    async fn record_turn(
        &self,
        Parameters(params): Parameters<RecordTurnParams>,
    ) -> Result<String, String> {
        let key = self.session_key(&params.access_token, &params.session_id)?;
        if params.user_message.trim().is_empty() || params.assistant_message.trim().is_empty() {
            return Err("user_message and assistant_message must not be empty".into());
        }

        let memory = self.cache.get_memory(&key).await.map_err(|e| e.to_string())?;
        memory.add_human(params.user_message);
        memory.add_assistant(params.assistant_message);
        self.cache
            .save(&key, &memory)
            .await
            .map_err(|e| e.to_string())?;
        self.cache.cleanup();

        Ok(serde_json::json!({
            "session_id": key.session_id,
            "message_count": memory.len(),
        })
        .to_string())
    }

    #[tool(description = "Reset a conversation: drops the session from active memory and starts a fresh session. Persisted history is kept. Returns the new session_id.")]
    async fn reset_session(
        &self,
        Parameters(params): Parameters<SessionRefParams>,
    ) -> Result<String, String> {
        let key = self.session_key(&params.access_token, &params.session_id)?;
        let evicted = self.cache.reset(&key);
        let session_id = self
            .cache
            .create_session(key.user_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(serde_json::json!({
            "previous_session_id": key.session_id,
            "evicted": evicted,
            "session_id": session_id,
        })
        .to_string())
    }
}

#[tool_handler]
impl ServerHandler for PaintwiseTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Paintwise is a paint catalog assistant. Use search_paints for natural-language \
                 requests, filter_paints for attribute lookups and get_paint_details for one \
                 product. Session tools keep per-user conversation history."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
