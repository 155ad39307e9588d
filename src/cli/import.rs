use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Deserialize;
use std::path::Path;

use crate::catalog::store::insert_product;
use crate::catalog::NewProduct;
use crate::config::PaintwiseConfig;

/// Accepted import layouts: a bare array or `{"products": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportData {
    List(Vec<NewProduct>),
    Wrapped { products: Vec<NewProduct> },
}

impl ImportData {
    fn into_products(self) -> Vec<NewProduct> {
        match self {
            Self::List(p) | Self::Wrapped { products: p } => p,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Import catalog products from a JSON file. Embeddings are left empty for
/// `paintwise backfill`.
pub fn import(config: &PaintwiseConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let data: ImportData =
        serde_json::from_str(&json).context("failed to parse import JSON")?;
    let products = data.into_products();

    let db_path = config.resolved_db_path();
    let mut conn = crate::db::open_database(&db_path)?;

    println!("Importing {} products...", products.len());
    let report = import_products(&mut conn, &products)?;

    println!("Import complete:");
    println!("  Products imported: {}", report.imported);
    println!("  Products skipped:  {} (already exist)", report.skipped);
    if report.imported > 0 {
        println!("Run `paintwise backfill` to index the new products for semantic search.");
    }

    Ok(())
}

/// Insert products in one transaction, skipping any whose (name, color, product
/// line) is already in the catalog.
pub fn import_products(conn: &mut Connection, products: &[NewProduct]) -> Result<ImportReport> {
    let tx = conn.transaction()?;
    let mut report = ImportReport::default();

    for product in products {
        anyhow::ensure!(
            product.price.map_or(true, |p| p >= 0.0),
            "product {:?} has a negative price",
            product.name
        );

        let exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM paint_products WHERE name = ?1 AND color = ?2 AND product_line = ?3",
            params![product.name, product.color, product.product_line],
            |row| row.get(0),
        )?;
        if exists {
            report.skipped += 1;
            continue;
        }

        insert_product(&tx, product)?;
        report.imported += 1;
    }

    tx.commit()?;
    tracing::info!(imported = report.imported, skipped = report.skipped, "catalog import finished");
    Ok(report)
}
