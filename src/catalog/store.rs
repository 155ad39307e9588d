//! Product persistence.
//!
//! [`ProductStore`] is the read/write seam the retrieval engine and the
//! maintenance jobs depend on; [`SqliteProductStore`] is the production
//! implementation over the `paint_products` table. Filters are pushed down to
//! SQL so the same predicate serves filter mode and hybrid candidate selection.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::types::{Environment, NewProduct, Product, ProductFilters};
use crate::embedding::{decode_embedding, encode_embedding};
use crate::error::StoreError;

/// Which products a candidate fetch should return.
#[derive(Debug, Clone, Default)]
pub struct CandidateQuery<'a> {
    pub filters: Option<&'a ProductFilters>,
    /// Only products that already carry an embedding.
    pub embedded_only: bool,
    /// Row cap. `None` returns every match.
    pub limit: Option<usize>,
}

pub trait ProductStore: Send + Sync {
    /// Products matching `query`, ordered by ascending id.
    fn fetch_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<Product>, StoreError>;

    fn fetch_by_id(&self, id: i64) -> Result<Option<Product>, StoreError>;

    /// Ids of products the backfill job should (re)embed. With `force`, every product.
    fn embedding_targets(&self, force: bool) -> Result<Vec<i64>, StoreError>;

    /// Products for `ids`, ordered by ascending id. Unknown ids are skipped.
    fn fetch_many(&self, ids: &[i64]) -> Result<Vec<Product>, StoreError>;

    /// Persist a batch of embeddings in one transaction. Returns rows updated.
    fn store_embeddings(&self, batch: &[(i64, Vec<f32>)]) -> Result<usize, StoreError>;
}

const PRODUCT_COLUMNS: &str = "id, name, color, surface_types, environment, finish_type, \
     features, product_line, price, ai_summary, usage_tags, embedding";

/// SQLite-backed [`ProductStore`] sharing the process-wide connection.
#[derive(Clone)]
pub struct SqliteProductStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProductStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert a catalog product. Embedding starts out `NULL`.
    pub fn insert_product(&self, product: &NewProduct) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        insert_product(&conn, product)
    }

    /// Persist AI enrichment for a product. Returns `false` for an unknown id.
    pub fn set_enrichment(
        &self,
        id: i64,
        summary: &str,
        tags: &[String],
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE paint_products SET ai_summary = ?1, usage_tags = ?2, updated_at = ?3 WHERE id = ?4",
            params![summary, serde_json::to_string(tags)?, now, id],
        )?;
        Ok(changed > 0)
    }

    /// Ids of products with no AI summary yet. With `force`, every product.
    pub fn enrichment_targets(&self, force: bool) -> Result<Vec<i64>, StoreError> {
        let conn = self.lock()?;
        let sql = if force {
            "SELECT id FROM paint_products ORDER BY id"
        } else {
            "SELECT id FROM paint_products WHERE ai_summary IS NULL OR ai_summary = '' ORDER BY id"
        };
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

/// Insert one product on a bare connection. Used by import and by tests that seed the catalog.
pub fn insert_product(conn: &Connection, product: &NewProduct) -> Result<i64, StoreError> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO paint_products (name, color, surface_types, environment, finish_type, \
         features, product_line, price, ai_summary, usage_tags, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            product.name,
            product.color,
            serde_json::to_string(&product.surface_types)?,
            product.environment.as_str(),
            product.finish_type,
            serde_json::to_string(&product.features)?,
            product.product_line,
            product.price,
            product.ai_summary,
            serde_json::to_string(&product.usage_tags)?,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl ProductStore for SqliteProductStore {
    fn fetch_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<Product>, StoreError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if query.embedded_only {
            clauses.push("embedding IS NOT NULL".into());
        }
        if let Some(filters) = query.filters {
            push_filter_clauses(filters, &mut clauses, &mut values);
        }

        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM paint_products");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    fn fetch_by_id(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM paint_products WHERE id = ?1"),
                params![id],
                read_row,
            )
            .optional()?;
        row.map(ProductRow::into_product).transpose()
    }

    fn embedding_targets(&self, force: bool) -> Result<Vec<i64>, StoreError> {
        let conn = self.lock()?;
        let sql = if force {
            "SELECT id FROM paint_products ORDER BY id"
        } else {
            "SELECT id FROM paint_products WHERE embedding IS NULL ORDER BY id"
        };
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn fetch_many(&self, ids: &[i64]) -> Result<Vec<Product>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM paint_products WHERE id IN ({placeholders}) ORDER BY id"
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    fn store_embeddings(&self, batch: &[(i64, Vec<f32>)]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE paint_products SET embedding = ?1, updated_at = ?2 WHERE id = ?3",
            )?;
            for (id, vector) in batch {
                updated += stmt.execute(params![encode_embedding(vector), now, id])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }
}

/// Translate populated filters into SQL predicates with positional values.
fn push_filter_clauses(filters: &ProductFilters, clauses: &mut Vec<String>, values: &mut Vec<String>) {
    if let Some(env) = filters.environment {
        values.push(env.as_str().to_string());
        clauses.push(format!("environment = ?{}", values.len()));
    }
    if let Some(ref finish) = filters.finish_type {
        values.push(finish.trim().to_string());
        clauses.push(format!("finish_type = ?{}", values.len()));
    }
    if let Some(ref line) = filters.product_line {
        values.push(line.trim().to_string());
        clauses.push(format!("product_line = ?{}", values.len()));
    }
    if let Some(ref color) = filters.color {
        values.push(color.trim().to_string());
        clauses.push(format!(
            "instr(unicode_lower(color), unicode_lower(?{})) > 0",
            values.len()
        ));
    }
    for feature in &filters.features {
        values.push(feature.trim().to_string());
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(paint_products.features) WHERE value = ?{})",
            values.len()
        ));
    }
    for surface in &filters.surface_types {
        values.push(surface.trim().to_string());
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(paint_products.surface_types) WHERE value = ?{})",
            values.len()
        ));
    }
}

// ── Row mapping ───────────────────────────────────────────────────────────────

struct ProductRow {
    id: i64,
    name: String,
    color: String,
    surface_types: String,
    environment: String,
    finish_type: String,
    features: String,
    product_line: String,
    price: Option<f64>,
    ai_summary: Option<String>,
    usage_tags: String,
    embedding: Option<Vec<u8>>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        surface_types: row.get(3)?,
        environment: row.get(4)?,
        finish_type: row.get(5)?,
        features: row.get(6)?,
        product_line: row.get(7)?,
        price: row.get(8)?,
        ai_summary: row.get(9)?,
        usage_tags: row.get(10)?,
        embedding: row.get(11)?,
    })
}

impl ProductRow {
    fn into_product(self) -> Result<Product, StoreError> {
        let environment: Environment = self
            .environment
            .parse()
            .map_err(|e: String| StoreError::Malformed(format!("product {}: {e}", self.id)))?;
        let embedding = match self.embedding {
            Some(bytes) => Some(decode_embedding(&bytes).ok_or_else(|| {
                StoreError::Malformed(format!("product {}: ragged embedding blob", self.id))
            })?),
            None => None,
        };
        Ok(Product {
            id: self.id,
            name: self.name,
            color: self.color,
            surface_types: serde_json::from_str(&self.surface_types)?,
            environment,
            finish_type: self.finish_type,
            features: serde_json::from_str(&self.features)?,
            product_line: self.product_line,
            price: self.price,
            ai_summary: self.ai_summary,
            usage_tags: serde_json::from_str(&self.usage_tags)?,
            embedding,
        })
    }
}
