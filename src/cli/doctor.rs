//! CLI `doctor` command: check the database and provider configuration.

use anyhow::{Context, Result};

use crate::config::PaintwiseConfig;
use crate::db::{self, HealthReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Warn => "warn",
            Status::Fail => "FAIL",
        }
    }
}

struct Check {
    name: &'static str,
    status: Status,
    detail: String,
}

impl Check {
    fn new(name: &'static str, status: Status, detail: impl Into<String>) -> Self {
        Self { name, status, detail: detail.into() }
    }
}

pub fn doctor(config: &PaintwiseConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `paintwise import <file>` to create and seed it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Paintwise doctor");
    println!("  database:   {} ({})", db_path.display(), format_bytes(file_size));
    println!("  schema:     v{}", report.schema_version);
    println!(
        "  rows:       {} products, {} embedded, {} sessions",
        report.product_count, report.embedded_count, report.session_count
    );
    println!();

    let checks = run_checks(config, &report);
    for check in &checks {
        println!("[{:>4}] {:<18} {}", check.status.label(), check.name, check.detail);
    }

    if !report.integrity_ok {
        println!();
        println!("Restore the database from a backup, or re-import the catalog into a fresh");
        println!("file and run `paintwise backfill`.");
    }

    let failed = checks.iter().filter(|c| c.status == Status::Fail).count();
    let warned = checks.iter().filter(|c| c.status == Status::Warn).count();
    println!();
    println!("{failed} failed, {warned} warning(s)");
    Ok(())
}

fn run_checks(config: &PaintwiseConfig, report: &HealthReport) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(if report.integrity_ok {
        Check::new("integrity", Status::Ok, "PRAGMA integrity_check passed")
    } else {
        Check::new("integrity", Status::Fail, report.integrity_details.clone())
    });

    let missing = report.product_count.saturating_sub(report.embedded_count);
    checks.push(match (report.product_count, missing) {
        (0, _) => Check::new("catalog", Status::Warn, "no products; run `paintwise import <file>`"),
        (_, 0) => Check::new("embeddings", Status::Ok, "every product is indexed"),
        (total, missing) => Check::new(
            "embeddings",
            Status::Warn,
            format!("{missing} of {total} products invisible to semantic search; run `paintwise backfill`"),
        ),
    });

    checks.push(match report.embedding_model.as_deref() {
        Some(stored) if stored == config.embedding.model => {
            Check::new("embedding model", Status::Ok, stored.to_string())
        }
        Some(stored) => Check::new(
            "embedding model",
            Status::Fail,
            format!(
                "vectors built with {stored}, configured {}; run `paintwise backfill --force`",
                config.embedding.model
            ),
        ),
        None if report.embedded_count == 0 => {
            Check::new("embedding model", Status::Ok, "no vectors yet")
        }
        None => Check::new(
            "embedding model",
            Status::Warn,
            "vectors present but model not recorded; run `paintwise backfill --force`",
        ),
    });

    checks.push(key_check("embedding key", &config.embedding.api_key));
    checks.push(key_check("generation key", &config.generation.api_key));

    checks.push(if config.auth.jwt_secret.is_empty() {
        Check::new("auth", Status::Warn, "auth.jwt_secret not set; session tools disabled")
    } else {
        Check::new("auth", Status::Ok, format!("{} tokens accepted", config.auth.jwt_algorithm))
    });

    checks
}

fn key_check(name: &'static str, key: &str) -> Check {
    if key.is_empty() {
        Check::new(name, Status::Warn, "missing")
    } else {
        Check::new(name, Status::Ok, "set")
    }
}

fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b < 1024 => format!("{b} B"),
        b if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
    }
}
