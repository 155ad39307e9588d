//! Key/value metadata stored in `schema_meta`.
//!
//! Holds the schema version written by [`super::schema::init_schema`] and the
//! identifier of the embedding model the stored product vectors were built with.
//! The model row is absent until the first backfill writes a vector.

use rusqlite::{Connection, OptionalExtension};

/// The schema version that the current binary creates.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Get the model identifier the stored product vectors were built with, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

/// Record the model identifier the stored product vectors were built with.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn fresh_db_is_at_current_version() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn fresh_db_has_no_embedding_model() {
        let conn = test_db();
        assert!(get_embedding_model(&conn).unwrap().is_none());
    }

    #[test]
    fn set_and_get_embedding_model() {
        let conn = test_db();
        set_embedding_model(&conn, "text-embedding-3-small").unwrap();
        set_embedding_model(&conn, "text-embedding-3-large").unwrap();
        assert_eq!(
            get_embedding_model(&conn).unwrap(),
            Some("text-embedding-3-large".to_string())
        );
    }

    #[test]
    fn reinitializing_keeps_recorded_model() {
        let conn = test_db();
        set_embedding_model(&conn, "text-embedding-3-small").unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        assert_eq!(
            get_embedding_model(&conn).unwrap().as_deref(),
            Some("text-embedding-3-small")
        );
    }
}
