//! CLI `chat` command: an interactive conversation on the terminal.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::PaintwiseConfig;
use crate::conversation::{run_turn, CatalogResponder, SessionId, SessionKey, UserId};
use crate::llm::{ChatModel, OpenAiChat};
use crate::server::Services;

/// Chat as `user_id`, resuming `session` or the user's latest session.
pub async fn chat(config: &PaintwiseConfig, user_id: i64, session: Option<String>, new: bool) -> Result<()> {
    let timeout = config.generation.timeout();
    let model: Arc<dyn ChatModel> =
        Arc::new(OpenAiChat::new(&config.generation).context("failed to create generation client")?);
    let services = Services::open(config)?;
    let user_id = UserId(user_id);

    let session_id = match session {
        Some(raw) => SessionId::parse(&raw)?,
        None if new => services.cache.create_session(user_id).await?,
        None => match services.cache.latest_session(user_id).await? {
            Some(id) => id,
            None => services.cache.create_session(user_id).await?,
        },
    };
    let key = SessionKey::new(session_id, user_id);

    let history = services.cache.get_memory(&key).await?;
    println!("Session {session_id} ({} previous messages). Ctrl-D to quit.\n", history.len());

    let responder = CatalogResponder::new(Arc::clone(&services.engine), model);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else { break };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let outcome = run_turn(&services.cache, &responder, &key, message, timeout).await?;
        println!("\n{}\n", outcome.reply.text());
    }

    Ok(())
}
