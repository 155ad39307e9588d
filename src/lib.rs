//! Paint catalog assistant core: hybrid product retrieval and per-user
//! conversation memory, served to agents over MCP.
//!
//! A catalog of paint products (color, finish, environment, features, surfaces,
//! price) is searchable four ways, chosen from the request:
//!
//! | Query text | Filters | Mode | Score |
//! |------------|---------|------|-------|
//! | yes | no | semantic | cosine similarity |
//! | no | yes | filter | 1.0 |
//! | yes | yes | hybrid | cosine similarity, filtered |
//! | no | no | browse | 1.0 |
//!
//! Conversations are cached in process per `(session, user)` and persisted to
//! SQLite after every completed turn.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with JSON list columns and `f32` embedding blobs
//! - **Embeddings**: any OpenAI-compatible `/embeddings` endpoint
//! - **Generation**: any OpenAI-compatible `/chat/completions` endpoint
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files and environment variables
//! - [`db`] - SQLite initialization, schema, metadata and health checks
//! - [`embedding`] - Embedding provider trait, HTTP client and vector math
//! - [`llm`] - Chat model trait and HTTP client
//! - [`catalog`] - Products, retrieval engine, embedding backfill and enrichment
//! - [`conversation`] - Session cache, session store and turn orchestration
//! - [`auth`] - Access-token verification

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod db;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod server;
pub mod tools;
