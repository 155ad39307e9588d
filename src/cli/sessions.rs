use anyhow::Result;

use crate::config::PaintwiseConfig;
use crate::conversation::UserId;
use crate::server::Services;

/// List a user's stored conversation sessions.
pub async fn sessions(config: &PaintwiseConfig, user_id: i64, limit: Option<usize>) -> Result<()> {
    let services = Services::open(config)?;
    let sessions = services.cache.list_sessions(UserId(user_id), limit).await?;

    if sessions.is_empty() {
        println!("No sessions for user {user_id}.");
        return Ok(());
    }

    println!("{} session(s) for user {user_id}\n", sessions.len());
    for s in &sessions {
        println!(
            "  {}  {:>3} messages  last activity {}",
            s.session_id, s.message_count, s.last_activity
        );
        println!("     {}", s.preview);
    }
    Ok(())
}
