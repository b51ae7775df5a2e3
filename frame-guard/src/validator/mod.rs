//! Fluent, chainable data-quality checks over a [`Dataset`].
//!
//! A [`Validator`] wraps a borrowed dataset and exposes four checks. Each
//! check derives the set of violating rows (or a single scalar condition),
//! then applies its [`Strategy`]:
//!
//! - [`Strategy::Fail`] returns [`GuardError::ValidationFailure`], which
//!   stops the chain at the first `?`
//! - [`Strategy::Warn`] logs the violation, forwards it to the attached
//!   [`WarningSink`] if any, and lets the chain continue
//!
//! Every check returns the same validator, so checks compose left to right
//! and run strictly in call order.
//!
//! ## Example
//!
//! ```rust
//! use frame_guard::prelude::*;
//!
//! # async fn example() -> frame_guard::error::Result<()> {
//! let orders = MemoryDataset::new(
//!     ["order_id", "status", "billed", "paid"],
//!     vec![
//!         vec![Value::Int(1), Value::from("OPEN"), Value::Int(10), Value::Int(10)],
//!         vec![Value::Int(2), Value::from("CLOSED"), Value::Int(25), Value::Int(20)],
//!     ],
//! )?;
//!
//! orders
//!     .validator()
//!     .check_count(2, Strategy::Fail)
//!     .await?
//!     .check_primary_key(Strategy::Fail, ["order_id"])
//!     .await?
//!     .check_regex_col("status", "^[A-Z]+$", "fail")
//!     .await?
//!     // Billed and paid differ on order 2; this only warns.
//!     .check_equality_col("billed", "paid", Strategy::Warn)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod report;
mod strategy;

pub use report::{CollectingSink, ValidationWarning, WarningSink};
pub use strategy::{IntoStrategy, Strategy};

use crate::dataset::{col, lit, Column, Dataset, Grouping};
use crate::log_check;
use crate::logging::{truncate_field, LogConfig};
use crate::prelude::*;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Check name reported for [`Validator::check_primary_key`].
pub const PRIMARY_KEY_CHECK: &str = "primary_key";
/// Check name reported for [`Validator::check_regex_col`].
pub const REGEX_CHECK: &str = "regex_match";
/// Check name reported for [`Validator::check_equality_col`].
pub const EQUALITY_CHECK: &str = "column_equality";
/// Check name reported for [`Validator::check_count`].
pub const ROW_COUNT_CHECK: &str = "row_count";

/// A set of chainable checks bound to one dataset.
///
/// The validator never modifies the dataset and keeps no record of earlier
/// checks. Anything not covered by its own API is reachable through
/// [`Validator::dataset`] or by dereferencing it.
pub struct Validator<'a, D: Dataset> {
    dataset: &'a D,
    sink: Option<Arc<dyn WarningSink>>,
    log_config: LogConfig,
}

impl<'a, D: Dataset> Validator<'a, D> {
    /// Wraps `dataset`.
    pub fn new(dataset: &'a D) -> Self {
        Self {
            dataset,
            sink: None,
            log_config: LogConfig::default(),
        }
    }

    /// Forwards every `warn`-strategy violation to `sink`.
    ///
    /// The sink does not change what any check returns.
    pub fn with_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets how much detail checks log.
    pub fn with_log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    /// Returns the wrapped dataset.
    pub fn dataset(&self) -> &'a D {
        self.dataset
    }

    /// Fails if the given columns do not form a key: some combination of
    /// their values occurs in more than one row.
    ///
    /// At least one column is required. Keys are compared on the exact tuple
    /// of the given columns; rows whose key is NULL group together.
    #[instrument(skip_all, fields(check.name = PRIMARY_KEY_CHECK))]
    pub async fn check_primary_key<S, I, C>(&self, strategy: S, columns: I) -> Result<&Self>
    where
        S: IntoStrategy,
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let strategy = strategy.into_strategy()?;
        let columns: Vec<Column> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(GuardError::invalid_argument(
                "at least one column must be provided for primary key validation",
            ));
        }

        let grouping = self.dataset.group_by(&columns).await?;
        let duplicated = grouping
            .count()
            .await?
            .filter(&col(grouping.count_column()).gt(lit(1)))
            .await?;

        let names: Vec<&str> = columns.iter().map(Column::name).collect();
        let message = format!("Columns {} have duplicate values.", names.join(", "));
        self.check_dataset_failure(&duplicated, PRIMARY_KEY_CHECK, message, strategy)
            .await?;
        Ok(self)
    }

    /// Fails if some non-null value of `column` does not match `pattern`.
    ///
    /// The pattern uses `regex` crate syntax and is unanchored, so use `^`
    /// and `$` to match whole values.
    #[instrument(skip_all, fields(check.name = REGEX_CHECK))]
    pub async fn check_regex_col<S>(
        &self,
        column: impl Into<Column>,
        pattern: &str,
        strategy: S,
    ) -> Result<&Self>
    where
        S: IntoStrategy,
    {
        let strategy = strategy.into_strategy()?;
        let column = column.into();
        log_check!(
            self.log_config,
            column = %column,
            pattern = %truncate_field(pattern, self.log_config.max_field_length),
            "Evaluating regex check"
        );

        let message = format!(
            "Column '{column}' has values that do not match the regex pattern '{pattern}'."
        );
        let mismatched = self.dataset.filter(&!column.rlike(pattern)).await?;
        self.check_dataset_failure(&mismatched, REGEX_CHECK, message, strategy)
            .await?;
        Ok(self)
    }

    /// Fails if some row has `column_a != column_b`.
    ///
    /// Rows where either side is NULL are not compared.
    #[instrument(skip_all, fields(check.name = EQUALITY_CHECK))]
    pub async fn check_equality_col<S>(
        &self,
        column_a: impl Into<Column>,
        column_b: impl Into<Column>,
        strategy: S,
    ) -> Result<&Self>
    where
        S: IntoStrategy,
    {
        let strategy = strategy.into_strategy()?;
        let column_a = column_a.into();
        let column_b = column_b.into();

        let message = format!("Column '{column_a}' does not equal '{column_b}'");
        let unequal = self
            .dataset
            .filter(&!column_b.equals(column_a))
            .await?;
        self.check_dataset_failure(&unequal, EQUALITY_CHECK, message, strategy)
            .await?;
        Ok(self)
    }

    /// Fails if the dataset does not have exactly `expected` rows.
    #[instrument(skip_all, fields(check.name = ROW_COUNT_CHECK, check.expected = expected))]
    pub async fn check_count<S>(&self, expected: usize, strategy: S) -> Result<&Self>
    where
        S: IntoStrategy,
    {
        let strategy = strategy.into_strategy()?;
        let actual = self.dataset.count().await?;
        self.check_condition_failure(
            actual != expected,
            ROW_COUNT_CHECK,
            format!("Row count does not equal {expected} (found {actual})"),
            strategy,
        )?;
        Ok(self)
    }

    /// Reports `message` when `violations` has at least one row.
    async fn check_dataset_failure<V: Dataset>(
        &self,
        violations: &V,
        check: &str,
        message: String,
        strategy: Strategy,
    ) -> Result<()> {
        if violations.is_empty().await? {
            log_check!(self.log_config, check.name = check, "Check passed");
            return Ok(());
        }
        self.report(check, message, strategy)
    }

    /// Reports `message` when `violated` is true.
    fn check_condition_failure(
        &self,
        violated: bool,
        check: &str,
        message: String,
        strategy: Strategy,
    ) -> Result<()> {
        if !violated {
            log_check!(self.log_config, check.name = check, "Check passed");
            return Ok(());
        }
        self.report(check, message, strategy)
    }

    fn report(&self, check: &str, message: String, strategy: Strategy) -> Result<()> {
        match strategy {
            Strategy::Fail => {
                debug!(check.name = check, check.message = %message, "Check failed");
                Err(GuardError::validation_failure(check, message))
            }
            Strategy::Warn => {
                warn!(check.name = check, check.message = %message, "Check violated");
                if let Some(sink) = &self.sink {
                    sink.on_warning(&ValidationWarning::new(check, message));
                }
                Ok(())
            }
        }
    }
}

impl<D: Dataset> Deref for Validator<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.dataset
    }
}

impl<D: Dataset> Clone for Validator<'_, D> {
    fn clone(&self) -> Self {
        Self {
            dataset: self.dataset,
            sink: self.sink.clone(),
            log_config: self.log_config.clone(),
        }
    }
}

impl<D: Dataset + fmt::Debug> fmt::Debug for Validator<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("dataset", self.dataset)
            .field("has_sink", &self.sink.is_some())
            .field("log_config", &self.log_config)
            .finish()
    }
}

/// Gives every [`Dataset`] a `validator()` accessor.
pub trait ValidatorExt: Dataset {
    /// Returns a fresh [`Validator`] over this dataset.
    fn validator(&self) -> Validator<'_, Self> {
        Validator::new(self)
    }
}

impl<D: Dataset> ValidatorExt for D {}
