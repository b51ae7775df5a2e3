//! Named input/output wiring around a user transform.
//!
//! A [`ComputeTask`] declares the datasets a transform reads ([`Input`]) and
//! the tables it produces ([`Output`]), each under an alias. Running the task
//! loads every input into a [`TaskInputs`], hands it to the transform, checks
//! that the returned [`TaskOutputs`] match the declared aliases exactly, and
//! registers each output in the [`GuardSession`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use frame_guard::compute::{ComputeTask, Input, Output, TaskOutputs};
//! use frame_guard::prelude::*;
//! use frame_guard::session::GuardSession;
//!
//! # async fn example() -> frame_guard::error::Result<()> {
//! let mut session = GuardSession::new()?;
//! let task = ComputeTask::builder("clean_orders")
//!     .input("orders", Input::csv("data/orders.csv"))
//!     .output("clean", Output::table("clean_orders"))
//!     .build()?;
//!
//! task.run(&mut session, |mut inputs| async move {
//!     let orders = inputs.take("orders")?;
//!     orders.validator().check_primary_key(Strategy::Fail, ["order_id"]).await?;
//!     Ok(TaskOutputs::new().with("clean", orders))
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::prelude::*;
use crate::session::GuardSession;
use datafusion::dataframe::DataFrame;
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Where a task input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A table already registered in the session
    Table(String),
    /// A CSV file with a header row
    Csv(PathBuf),
    /// A Parquet file
    Parquet(PathBuf),
}

impl Input {
    pub fn table(name: impl Into<String>) -> Self {
        Input::Table(name.into())
    }

    pub fn csv(path: impl Into<PathBuf>) -> Self {
        Input::Csv(path.into())
    }

    pub fn parquet(path: impl Into<PathBuf>) -> Self {
        Input::Parquet(path.into())
    }

    async fn load(&self, alias: &str, session: &GuardSession) -> Result<DataFrame> {
        match self {
            Input::Table(name) => {
                if !session.inner().table_exist(name.as_str())? {
                    return Err(GuardError::Configuration(format!(
                        "input '{alias}' refers to unknown table '{name}'"
                    )));
                }
                session.table(name).await
            }
            Input::Csv(path) => session
                .inner()
                .read_csv(utf8_path(path)?, CsvReadOptions::new())
                .await
                .with_context(|| load_failure(alias, path)),
            Input::Parquet(path) => session
                .inner()
                .read_parquet(utf8_path(path)?, ParquetReadOptions::default())
                .await
                .with_context(|| load_failure(alias, path)),
        }
    }
}

fn load_failure(alias: &str, path: &Path) -> String {
    format!("failed to load input '{alias}' from '{}'", path.display())
}

fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        GuardError::Configuration(format!("path is not valid UTF-8: {}", path.display()))
    })
}

/// Where a task output goes: the session table it is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    table: String,
}

impl Output {
    pub fn table(name: impl Into<String>) -> Self {
        Self { table: name.into() }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }
}

/// The loaded inputs and parameters handed to a transform.
#[derive(Debug)]
pub struct TaskInputs {
    frames: BTreeMap<String, DataFrame>,
    params: BTreeMap<String, String>,
}

impl TaskInputs {
    /// Borrows the input loaded for `alias`.
    pub fn get(&self, alias: &str) -> Result<&DataFrame> {
        self.frames
            .get(alias)
            .ok_or_else(|| GuardError::Configuration(format!("no input named '{alias}'")))
    }

    /// Takes ownership of the input loaded for `alias`.
    pub fn take(&mut self, alias: &str) -> Result<DataFrame> {
        self.frames
            .remove(alias)
            .ok_or_else(|| GuardError::Configuration(format!("no input named '{alias}'")))
    }

    /// Returns a task parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Returns the input aliases in sorted order.
    pub fn aliases(&self) -> Vec<&str> {
        self.frames.keys().map(String::as_str).collect()
    }
}

/// The frames a transform produces, keyed by output alias.
#[derive(Debug, Default)]
pub struct TaskOutputs {
    frames: BTreeMap<String, DataFrame>,
}

impl TaskOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an output and returns `self` for chaining.
    pub fn with(mut self, alias: impl Into<String>, frame: DataFrame) -> Self {
        self.insert(alias, frame);
        self
    }

    pub fn insert(&mut self, alias: impl Into<String>, frame: DataFrame) {
        self.frames.insert(alias.into(), frame);
    }
}

/// A transform with declared inputs, outputs and parameters.
#[derive(Debug, Clone)]
pub struct ComputeTask {
    name: String,
    inputs: BTreeMap<String, Input>,
    outputs: BTreeMap<String, Output>,
    params: BTreeMap<String, String>,
}

impl ComputeTask {
    /// Starts building a task called `name`.
    pub fn builder(name: impl Into<String>) -> ComputeTaskBuilder {
        ComputeTaskBuilder {
            name: name.into(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            params: BTreeMap::new(),
            duplicates: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &BTreeMap<String, Input> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// Loads the inputs, runs `transform`, and registers its outputs.
    ///
    /// Returns the names of the tables registered, in output-alias order.
    /// Nothing is registered unless the transform succeeds and produces
    /// exactly the declared outputs. If registering one output fails, the
    /// outputs registered before it are rolled back and any tables they
    /// replaced are restored.
    #[instrument(skip_all, fields(task.name = %self.name, session.app_name = %session.app_name()))]
    pub async fn run<F, Fut>(&self, session: &mut GuardSession, transform: F) -> Result<Vec<String>>
    where
        F: FnOnce(TaskInputs) -> Fut,
        Fut: Future<Output = Result<TaskOutputs>>,
    {
        let mut frames = BTreeMap::new();
        for (alias, input) in &self.inputs {
            frames.insert(alias.clone(), input.load(alias, session).await?);
        }
        info!(
            task.name = %self.name,
            task.inputs = frames.len(),
            "Inputs and outputs loaded"
        );

        let produced = transform(TaskInputs {
            frames,
            params: self.params.clone(),
        })
        .await?;

        if let Some(alias) = produced
            .frames
            .keys()
            .find(|alias| !self.outputs.contains_key(*alias))
        {
            return Err(GuardError::Configuration(format!(
                "task '{}' produced undeclared output '{alias}'",
                self.name
            )));
        }
        if let Some(alias) = self
            .outputs
            .keys()
            .find(|alias| !produced.frames.contains_key(*alias))
        {
            return Err(GuardError::Configuration(format!(
                "task '{}' did not produce output '{alias}'",
                self.name
            )));
        }

        let mut registered = Vec::with_capacity(self.outputs.len());
        let mut displaced = Vec::with_capacity(self.outputs.len());
        for (alias, frame) in produced.frames {
            let table = self.outputs[&alias].table_name().to_string();
            match session.replace_frame(&table, frame) {
                Ok(previous) => {
                    displaced.push(previous);
                    registered.push(table);
                }
                Err(err) => {
                    warn!(
                        task.name = %self.name,
                        table = %table,
                        error = %err,
                        "Output registration failed, rolling back"
                    );
                    for previous in displaced.into_iter().rev() {
                        session.restore_table(previous);
                    }
                    return Err(err);
                }
            }
        }

        info!(
            task.name = %self.name,
            task.outputs = ?registered,
            "Task completed"
        );
        Ok(registered)
    }
}

/// Builder for [`ComputeTask`].
#[derive(Debug)]
pub struct ComputeTaskBuilder {
    name: String,
    inputs: BTreeMap<String, Input>,
    outputs: BTreeMap<String, Output>,
    params: BTreeMap<String, String>,
    duplicates: Vec<String>,
}

impl ComputeTaskBuilder {
    /// Declares an input under `alias`.
    pub fn input(mut self, alias: impl Into<String>, input: Input) -> Self {
        let alias = alias.into();
        if self.inputs.contains_key(&alias) || self.outputs.contains_key(&alias) {
            self.duplicates.push(alias.clone());
        }
        self.inputs.insert(alias, input);
        self
    }

    /// Declares an output under `alias`.
    pub fn output(mut self, alias: impl Into<String>, output: Output) -> Self {
        let alias = alias.into();
        if self.inputs.contains_key(&alias) || self.outputs.contains_key(&alias) {
            self.duplicates.push(alias.clone());
        }
        self.outputs.insert(alias, output);
        self
    }

    /// Adds a parameter passed through to the transform.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Validates the declarations.
    ///
    /// Fails with [`GuardError::Configuration`] if an alias is declared twice
    /// or two outputs target the same table.
    pub fn build(self) -> Result<ComputeTask> {
        if let Some(alias) = self.duplicates.first() {
            return Err(GuardError::Configuration(format!(
                "alias '{alias}' is declared more than once in task '{}'",
                self.name
            )));
        }

        let mut tables: Vec<&str> = self.outputs.values().map(Output::table_name).collect();
        tables.sort_unstable();
        if let Some(pair) = tables.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(GuardError::Configuration(format!(
                "more than one output of task '{}' targets table '{}'",
                self.name, pair[0]
            )));
        }

        Ok(ComputeTask {
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            params: self.params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn session_with_ids() -> GuardSession {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap();
        let mut session = GuardSession::new().unwrap();
        session.register_batch("ids", batch).unwrap();
        session
    }

    #[test]
    fn test_build_rejects_duplicate_alias() {
        let err = ComputeTask::builder("t")
            .input("a", Input::table("x"))
            .output("a", Output::table("y"))
            .build()
            .unwrap_err();
        assert!(matches!(err, GuardError::Configuration(_)));
    }

    #[test]
    fn test_build_rejects_shared_output_table() {
        let err = ComputeTask::builder("t")
            .output("a", Output::table("same"))
            .output("b", Output::table("same"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("targets table 'same'"));
    }

    #[tokio::test]
    async fn test_run_registers_outputs() {
        let mut session = session_with_ids();
        let task = ComputeTask::builder("copy_ids")
            .input("source", Input::table("ids"))
            .output("copy", Output::table("ids_copy"))
            .param("threshold", "2")
            .build()
            .unwrap();

        let registered = task
            .run(&mut session, |mut inputs| async move {
                assert_eq!(inputs.param("threshold"), Some("2"));
                assert_eq!(inputs.aliases(), vec!["source"]);
                let source = inputs.take("source")?;
                Ok(TaskOutputs::new().with("copy", source))
            })
            .await
            .unwrap();

        assert_eq!(registered, vec!["ids_copy".to_string()]);
        let copy = session.table("ids_copy").await.unwrap();
        assert_eq!(Dataset::count(&copy).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_rejects_missing_output() {
        let mut session = session_with_ids();
        let task = ComputeTask::builder("forgetful")
            .input("source", Input::table("ids"))
            .output("copy", Output::table("ids_copy"))
            .build()
            .unwrap();

        let err = task
            .run(&mut session, |_| async { Ok(TaskOutputs::new()) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not produce output 'copy'"));
        assert!(!session.has_table("ids_copy"));
    }

    #[tokio::test]
    async fn test_run_rejects_undeclared_output() {
        let mut session = session_with_ids();
        let task = ComputeTask::builder("chatty")
            .input("source", Input::table("ids"))
            .build()
            .unwrap();

        let err = task
            .run(&mut session, |mut inputs| async move {
                Ok(TaskOutputs::new().with("extra", inputs.take("source")?))
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("undeclared output 'extra'"));
    }

    #[tokio::test]
    async fn test_run_unknown_input_table() {
        let mut session = GuardSession::new().unwrap();
        let task = ComputeTask::builder("t")
            .input("source", Input::table("missing"))
            .build()
            .unwrap();

        let err = task
            .run(&mut session, |_| async { Ok(TaskOutputs::new()) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown table 'missing'"));
    }

    #[tokio::test]
    async fn test_failed_registration_rolls_back_earlier_outputs() {
        let mut session = session_with_ids();
        let task = ComputeTask::builder("split")
            .input("source", Input::table("ids"))
            .output("a_replaced", Output::table("ids"))
            .output("b_unreachable", Output::table("no_catalog.no_schema.out"))
            .build()
            .unwrap();

        let err = task
            .run(&mut session, |mut inputs| async move {
                let source = inputs.take("source")?;
                let head = source.clone().limit(0, Some(1))?;
                Ok(TaskOutputs::new()
                    .with("a_replaced", head)
                    .with("b_unreachable", source))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::DataFusion(_)));

        assert_eq!(session.registered_tables(), vec!["ids"]);
        let restored = session.table("ids").await.unwrap();
        assert_eq!(Dataset::count(&restored).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_reports_input_alias() {
        let mut session = GuardSession::new().unwrap();
        let task = ComputeTask::builder("t")
            .input("orders", Input::csv("/nonexistent/frame-guard/orders.csv"))
            .build()
            .unwrap();

        let err = task
            .run(&mut session, |_| async { Ok(TaskOutputs::new()) })
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("failed to load input 'orders' from '/nonexistent/frame-guard/orders.csv'"));
    }

    #[tokio::test]
    async fn test_transform_errors_propagate() {
        let mut session = session_with_ids();
        let task = ComputeTask::builder("t")
            .input("source", Input::table("ids"))
            .build()
            .unwrap();

        let err = task
            .run(&mut session, |_| async {
                Err(GuardError::validation_failure("row_count", "nope"))
            })
            .await
            .unwrap_err();
        assert!(err.is_validation_failure());
    }
}
