//! Integration tests for compute tasks reading files and validating inside the transform.

use frame_guard::compute::{ComputeTask, Input, Output, TaskOutputs};
use frame_guard::prelude::*;
use frame_guard::session::{GuardSession, SessionSettings};
use std::io::Write;
use tempfile::NamedTempFile;

const ORDERS_CSV: &str = "\
order_id,status,billed,paid
1,OPEN,10,10
2,CLOSED,25,25
3,CLOSED,40,35
";

fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_task_validates_csv_input_and_registers_output() {
    let csv = write_csv(ORDERS_CSV);
    let mut session =
        GuardSession::with_settings(SessionSettings::default().with_app_name("orders_job"))
            .unwrap();

    let task = ComputeTask::builder("closed_orders")
        .input("orders", Input::csv(csv.path()))
        .output("closed", Output::table("closed_orders"))
        .param("status", "CLOSED")
        .build()
        .unwrap();

    let registered = task
        .run(&mut session, |mut inputs| async move {
            let status = inputs.param("status").unwrap_or("OPEN").to_string();
            let orders = inputs.take("orders")?;

            orders
                .validator()
                .check_count(3, Strategy::Fail)
                .await?
                .check_primary_key(Strategy::Fail, ["order_id"])
                .await?
                .check_regex_col("status", "^(OPEN|CLOSED)$", Strategy::Fail)
                .await?;

            let closed = orders.filter(
                datafusion::prelude::col("status").eq(datafusion::prelude::lit(status)),
            )?;
            Ok(TaskOutputs::new().with("closed", closed))
        })
        .await
        .unwrap();

    assert_eq!(registered, vec!["closed_orders".to_string()]);
    assert!(session.has_table("closed_orders"));

    let closed = session.table("closed_orders").await.unwrap();
    closed
        .validator()
        .check_count(2, Strategy::Fail)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_validation_inside_task_registers_nothing() {
    let csv = write_csv(ORDERS_CSV);
    let mut session = GuardSession::new().unwrap();

    let task = ComputeTask::builder("reconcile")
        .input("orders", Input::csv(csv.path()))
        .output("reconciled", Output::table("reconciled"))
        .build()
        .unwrap();

    let err = task
        .run(&mut session, |mut inputs| async move {
            let orders = inputs.take("orders")?;
            orders
                .validator()
                .check_equality_col("billed", "paid", Strategy::Fail)
                .await?;
            Ok(TaskOutputs::new().with("reconciled", orders))
        })
        .await
        .unwrap_err();

    assert!(err.is_validation_failure());
    assert_eq!(err.to_string(), "Column 'billed' does not equal 'paid'");
    assert!(!session.has_table("reconciled"));
}

#[tokio::test]
async fn test_outputs_feed_later_tasks() {
    let csv = write_csv(ORDERS_CSV);
    let mut session = GuardSession::new().unwrap();

    ComputeTask::builder("load")
        .input("raw", Input::csv(csv.path()))
        .output("staged", Output::table("staged_orders"))
        .build()
        .unwrap()
        .run(&mut session, |mut inputs| async move {
            Ok(TaskOutputs::new().with("staged", inputs.take("raw")?))
        })
        .await
        .unwrap();

    let task = ComputeTask::builder("check")
        .input("staged", Input::table("staged_orders"))
        .build()
        .unwrap();
    task.run(&mut session, |inputs| async move {
        inputs
            .get("staged")?
            .validator()
            .check_equality_col("billed", "paid", Strategy::Warn)
            .await?;
        Ok(TaskOutputs::new())
    })
    .await
    .unwrap();
}
