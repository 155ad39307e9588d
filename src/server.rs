//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! [`Services`] wires the database, embedding provider, retrieval engine,
//! conversation cache and token verifier together once per process; the CLI
//! reuses it for the commands that need the same stack.

use crate::auth::TokenVerifier;
use crate::catalog::{RetrievalEngine, SqliteProductStore};
use crate::config::PaintwiseConfig;
use crate::conversation::{ConversationCache, SqliteSessionStore};
use crate::db;
use crate::embedding;
use crate::tools::PaintwiseTools;
use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

/// Process-wide handles, created once at startup and passed explicitly.
pub struct Services {
    pub db: Arc<Mutex<rusqlite::Connection>>,
    pub products: SqliteProductStore,
    pub engine: Arc<RetrievalEngine>,
    pub cache: Arc<ConversationCache>,
    pub verifier: Option<Arc<TokenVerifier>>,
}

impl Services {
    /// Open the DB, create the embedding provider and check the stored model.
    pub fn open(config: &PaintwiseConfig) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let conn = db::open_database(&db_path)?;
        tracing::info!(db = %db_path.display(), "database ready");

        if let Ok(Some(stored_model)) = db::meta::get_embedding_model(&conn) {
            if stored_model != config.embedding.model {
                tracing::warn!(
                    stored = %stored_model,
                    configured = %config.embedding.model,
                    "embedding model changed, run `paintwise backfill --force` to rebuild all vectors"
                );
            }
        }

        let db = Arc::new(Mutex::new(conn));

        let provider = embedding::create_provider(&config.embedding)?;
        let embedder: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
        tracing::info!(model = %embedder.model(), "embedding provider ready");

        let products = SqliteProductStore::new(Arc::clone(&db));
        let engine = Arc::new(RetrievalEngine::new(
            Arc::new(products.clone()),
            embedder,
            config.embedding.timeout(),
            config.retrieval.clone(),
        ));

        let sessions = SqliteSessionStore::new(Arc::clone(&db));
        let cache = Arc::new(ConversationCache::new(Arc::new(sessions), &config.conversation));

        let verifier = if config.auth.jwt_secret.is_empty() {
            tracing::info!("auth.jwt_secret not set, session tools are disabled");
            None
        } else {
            Some(Arc::new(TokenVerifier::new(&config.auth)?))
        };

        Ok(Self {
            db,
            products,
            engine,
            cache,
            verifier,
        })
    }

    pub fn tools(&self) -> PaintwiseTools {
        PaintwiseTools::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.cache),
            self.verifier.clone(),
        )
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: PaintwiseConfig) -> Result<()> {
    tracing::info!("starting paintwise MCP server on stdio");

    let services = Services::open(&config)?;
    let transport = rmcp::transport::stdio();

    let server = services.tools().serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: PaintwiseConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting paintwise MCP server on HTTP");

    let services = Arc::new(Services::open(&config)?);

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(services.tools()),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
