//! Basic validation demo.
//!
//! Loads a small customer CSV into DataFusion, then runs a chain of checks:
//! hard requirements use `Strategy::Fail`, soft ones use `Strategy::Warn`
//! and are collected for a summary at the end.
//!
//! Run with:
//! ```bash
//! cargo run -p frame-guard-demos --bin basic_validation
//! ```

use datafusion::prelude::*;
use frame_guard::logging::setup::{init_logging, LoggingConfig};
use frame_guard::prelude::*;
use frame_guard::validator::CollectingSink;
use std::sync::Arc;

const CUSTOMERS: &str = r#"customer_id,name,email,billing_email,country
1,Alice Johnson,alice@example.com,alice@example.com,DE
2,Bob Smith,bob@example.com,bob@example.com,US
3,Carol Davis,carol@example.com,accounts@example.com,FR
4,David Wilson,david(at)example.com,david(at)example.com,US
5,Eve Brown,eve@example.com,eve@example.com,Germany"#;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default())?;

    let dir = tempfile::tempdir()?;
    let file_path = dir.path().join("customers.csv");
    std::fs::write(&file_path, CUSTOMERS)?;

    let ctx = SessionContext::new();
    let path = file_path.to_string_lossy();
    ctx.register_csv("customers", path.as_ref(), CsvReadOptions::default())
        .await?;
    let customers = ctx.table("customers").await?;

    println!("Running basic validation demo...\n");

    let warnings = CollectingSink::new();
    let validator = customers.validator().with_sink(Arc::new(warnings.clone()));

    validator
        .check_count(5, Strategy::Fail)
        .await?
        .check_primary_key(Strategy::Fail, ["customer_id"])
        .await?
        .check_regex_col("email", r"^[^@\s]+@[^@\s]+\.[a-z]+$", Strategy::Warn)
        .await?
        .check_regex_col("country", "^[A-Z]{2}$", Strategy::Warn)
        .await?
        .check_equality_col("email", "billing_email", Strategy::Warn)
        .await?;

    println!("All hard checks passed.");
    if warnings.is_empty() {
        println!("No warnings.");
    } else {
        println!("\n{} warning(s):", warnings.len());
        for warning in warnings.warnings() {
            println!("  [{}] {}", warning.check, warning.message);
        }
    }

    // The validator still exposes the data frame it wraps.
    let german = validator
        .dataset()
        .clone()
        .filter(col("country").eq(lit("DE")))?;
    println!("\nCustomers in DE: {}", german.count().await?);

    Ok(())
}
