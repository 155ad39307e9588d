//! SQL DDL for all paintwise tables.
//!
//! Defines `paint_products`, `chat_sessions` and `schema_meta`. List attributes are
//! stored as JSON arrays and queried with `json_each`; embeddings are little-endian
//! `f32` blobs, `NULL` until the backfill job has indexed the product. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

use super::meta::CURRENT_SCHEMA_VERSION;

const SCHEMA_SQL: &str = r#"
-- Enriched paint catalog
CREATE TABLE IF NOT EXISTS paint_products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    color TEXT NOT NULL,
    surface_types TEXT NOT NULL DEFAULT '[]',
    environment TEXT NOT NULL CHECK(environment IN ('internal','external','both')),
    finish_type TEXT NOT NULL,
    features TEXT NOT NULL DEFAULT '[]',
    product_line TEXT NOT NULL,
    price REAL CHECK(price IS NULL OR price >= 0.0),
    ai_summary TEXT,
    usage_tags TEXT NOT NULL DEFAULT '[]',
    embedding BLOB,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_environment ON paint_products(environment);
CREATE INDEX IF NOT EXISTS idx_products_finish ON paint_products(finish_type);
CREATE INDEX IF NOT EXISTS idx_products_line ON paint_products(product_line);
CREATE INDEX IF NOT EXISTS idx_products_color ON paint_products(color);
CREATE INDEX IF NOT EXISTS idx_products_unembedded ON paint_products(id) WHERE embedding IS NULL;

-- Conversation sessions, always addressed by (session_id, user_id)
CREATE TABLE IF NOT EXISTS chat_sessions (
    session_id TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    session_data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    PRIMARY KEY (session_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_activity ON chat_sessions(user_id, last_activity);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"paint_products".to_string()));
        assert!(tables.contains(&"chat_sessions".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn backfill_selector_is_indexed() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let found: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_products_unembedded'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(found, 1);
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn environment_is_constrained() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let err = conn.execute(
            "INSERT INTO paint_products (name, color, environment, finish_type, product_line, created_at, updated_at) \
             VALUES ('x', 'azul', 'garage', 'fosco', 'Premium', 'now', 'now')",
            [],
        );
        assert!(err.is_err());
    }
}
