use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Response from catalog_stats.
#[derive(Debug, Serialize)]
pub struct CatalogStats {
    pub total_products: u64,
    pub embedded: u64,
    pub missing_embedding: u64,
    pub enriched: u64,
    pub by_environment: BTreeMap<String, u64>,
    pub by_finish: BTreeMap<String, u64>,
    pub by_product_line: BTreeMap<String, u64>,
    pub sessions: u64,
    pub db_size_bytes: u64,
}

/// Compute catalog statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn catalog_stats(conn: &Connection, db_path: Option<&Path>) -> Result<CatalogStats> {
    let count = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    };

    let total_products = count("SELECT COUNT(*) FROM paint_products")?;
    let embedded = count("SELECT COUNT(*) FROM paint_products WHERE embedding IS NOT NULL")?;
    let enriched = count(
        "SELECT COUNT(*) FROM paint_products WHERE ai_summary IS NOT NULL AND ai_summary != ''",
    )?;
    let sessions = count("SELECT COUNT(*) FROM chat_sessions")?;

    let mut by_environment = group_counts(conn, "environment")?;
    for env in ["internal", "external", "both"] {
        by_environment.entry(env.to_string()).or_insert(0);
    }

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(CatalogStats {
        total_products,
        embedded,
        missing_embedding: total_products - embedded,
        enriched,
        by_environment,
        by_finish: group_counts(conn, "finish_type")?,
        by_product_line: group_counts(conn, "product_line")?,
        sessions,
        db_size_bytes,
    })
}

/// `column` is always one of the fixed names above, never user input.
fn group_counts(conn: &Connection, column: &str) -> Result<BTreeMap<String, u64>> {
    let sql = format!("SELECT {column}, COUNT(*) FROM paint_products GROUP BY {column}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(|(k, n)| (k, n as u64)).collect())
}
