use anyhow::Result;

use crate::config::PaintwiseConfig;

/// Display catalog statistics in the terminal.
pub fn stats(config: &PaintwiseConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;

    let response = crate::catalog::stats::catalog_stats(&conn, Some(&db_path))?;

    println!("Catalog Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total products:      {}", response.total_products);
    println!("  Embedded:            {}", response.embedded);
    println!("  Missing embedding:   {}", response.missing_embedding);
    println!("  AI enriched:         {}", response.enriched);
    println!();

    println!("By Environment:");
    for (env, count) in &response.by_environment {
        println!("  {:<16} {}", env, count);
    }
    println!();

    println!("By Finish:");
    for (finish, count) in &response.by_finish {
        println!("  {:<16} {}", finish, count);
    }
    println!();

    println!("By Product Line:");
    for (line, count) in &response.by_product_line {
        println!("  {:<16} {}", line, count);
    }
    println!();

    println!("Chat sessions:         {}", response.sessions);
    println!("Database size:         {} bytes", response.db_size_bytes);

    Ok(())
}
