//! Compute pipeline demo.
//!
//! Wires two tasks through a shared [`GuardSession`]. The first stages raw
//! orders after validating them; the second reads the staged table and
//! reconciles billed against paid amounts. Logs are emitted as JSON.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info,frame_guard=debug cargo run -p frame-guard-demos --bin compute_pipeline
//! ```

use datafusion::prelude::{col, lit};
use frame_guard::compute::{ComputeTask, Input, Output, TaskOutputs};
use frame_guard::logging::setup::{init_logging, LoggingConfig};
use frame_guard::prelude::*;
use frame_guard::session::{GuardSession, SessionSettings};
use tracing::info;

const ORDERS: &str = "\
order_id,status,billed,paid
1001,OPEN,120,0
1002,CLOSED,80,80
1003,CLOSED,45,40
1004,CLOSED,300,300
";

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::development().with_json_format(true))?;

    let dir = tempfile::tempdir()?;
    let orders_path = dir.path().join("orders.csv");
    std::fs::write(&orders_path, ORDERS)?;

    let mut session = GuardSession::with_settings(
        SessionSettings::default()
            .with_app_name("orders_pipeline")
            .with_target_partitions(2),
    )?;
    info!(app_name = session.app_name(), "Session ready");

    let stage = ComputeTask::builder("stage_orders")
        .input("raw", Input::csv(&orders_path))
        .output("staged", Output::table("staged_orders"))
        .build()?;

    stage
        .run(&mut session, |mut inputs| async move {
            let raw = inputs.take("raw")?;
            raw.validator()
                .check_count(4, Strategy::Fail)
                .await?
                .check_primary_key(Strategy::Fail, ["order_id"])
                .await?
                .check_regex_col("status", "^(OPEN|CLOSED)$", Strategy::Fail)
                .await?;
            Ok(TaskOutputs::new().with("staged", raw))
        })
        .await?;

    let reconcile = ComputeTask::builder("reconcile_closed")
        .input("orders", Input::table("staged_orders"))
        .output("closed", Output::table("closed_orders"))
        .param("status", "CLOSED")
        .build()?;

    let registered = reconcile
        .run(&mut session, |mut inputs| async move {
            let status = inputs.param("status").unwrap_or("CLOSED").to_string();
            let closed = inputs.take("orders")?.filter(col("status").eq(lit(status)))?;

            // Partial payments are expected on some orders; surface them without stopping.
            closed
                .validator()
                .check_equality_col("billed", "paid", Strategy::Warn)
                .await?;
            Ok(TaskOutputs::new().with("closed", closed))
        })
        .await?;

    println!("Registered tables: {}", registered.join(", "));
    println!("Session tables: {:?}", session.registered_tables());

    match session
        .table("closed_orders")
        .await?
        .validator()
        .check_count(4, Strategy::Fail)
        .await
    {
        Ok(_) => println!("closed_orders has 4 rows"),
        Err(err) if err.is_validation_failure() => println!("Expected failure: {err}"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
