//! MCP session tool parameter definitions.
//!
//! Every session tool takes the caller's access token; the user id is taken
//! from the verified token, never from the request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StartSessionParams {
    #[schemars(description = "The user's access token (JWT)")]
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListSessionsParams {
    #[schemars(description = "The user's access token (JWT)")]
    pub access_token: String,

    #[schemars(description = "Maximum number of sessions to return. Defaults to 50.")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionRefParams {
    #[schemars(description = "The user's access token (JWT)")]
    pub access_token: String,

    #[schemars(description = "Session ID (UUID) returned by start_session or list_sessions")]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecordTurnParams {
    #[schemars(description = "The user's access token (JWT)")]
    pub access_token: String,

    #[schemars(description = "Session ID (UUID) returned by start_session or list_sessions")]
    pub session_id: String,

    #[schemars(description = "What the customer said")]
    pub user_message: String,

    #[schemars(description = "The assistant's reply to that message")]
    pub assistant_message: String,
}
