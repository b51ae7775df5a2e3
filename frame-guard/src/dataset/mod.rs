//! The tabular dataset contract the validator is written against.
//!
//! A [`Dataset`] is an immutable handle to rows with named columns. The
//! validator only needs four primitives from it: filtering by a
//! [`Predicate`], grouping with a per-group row count, an exact row count
//! and an emptiness test. Every operation returns a new value; nothing is
//! mutated in place.
//!
//! Two engines implement the contract:
//!
//! - DataFusion's `DataFrame` (see [`dataframe`])
//! - [`MemoryDataset`], a small row store for callers without a query engine
//!
//! ## Predicates
//!
//! Predicates are engine-neutral and are translated by each adapter:
//!
//! ```rust
//! use frame_guard::dataset::{col, lit};
//!
//! let same = col("a").equals(col("b"));
//! let mismatched = !same;
//! let well_formed = col("email").rlike(r"^[^@]+@[^@]+$");
//! let duplicated = col("count").gt(lit(1));
//! # let _ = (mismatched, well_formed, duplicated);
//! ```

pub mod dataframe;
mod memory;

pub use memory::{MemoryDataset, MemoryGrouping};

use crate::prelude::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;

/// Preferred name of the column appended by [`Grouping::count`].
pub const COUNT_COLUMN: &str = "count";

/// Picks the group-size column name for a grouping on `keys`.
///
/// Returns [`COUNT_COLUMN`], prefixed with `__` as often as needed to differ
/// from every key column.
pub fn count_column_for(keys: &[Column]) -> String {
    let mut name = COUNT_COLUMN.to_string();
    while keys.iter().any(|key| key.name() == name) {
        name.insert_str(0, "__");
    }
    name
}

/// A typed reference to a column by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Column(String);

impl Column {
    /// Creates a column reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Builds `self = other`.
    pub fn equals(self, other: impl Into<Operand>) -> Predicate {
        Predicate::Equals(Operand::Column(self), other.into())
    }

    /// Builds `self > other`.
    pub fn gt(self, other: impl Into<Operand>) -> Predicate {
        Predicate::GreaterThan(Operand::Column(self), other.into())
    }

    /// Builds a regular-expression match of this column against `pattern`.
    pub fn rlike(self, pattern: impl Into<String>) -> Predicate {
        Predicate::RegexMatch {
            column: self,
            pattern: pattern.into(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&String> for Column {
    fn from(name: &String) -> Self {
        Self(name.clone())
    }
}

impl From<&Column> for Column {
    fn from(column: &Column) -> Self {
        column.clone()
    }
}

/// Shorthand for [`Column::new`].
pub fn col(name: impl Into<String>) -> Column {
    Column::new(name)
}

/// Shorthand for a literal operand.
pub fn lit(value: impl Into<Value>) -> Operand {
    Operand::Literal(value.into())
}

/// A scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Utf8(String),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL equality: `None` when either side is null.
    ///
    /// Integers and floats compare numerically; other mixed types are unequal.
    pub fn sql_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
            (Value::Int(a), Value::Int(b)) => Some(a == b),
            (Value::Float(a), Value::Float(b)) => Some(a == b),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                Some((*a as f64) == *b)
            }
            (Value::Utf8(a), Value::Utf8(b)) => Some(a == b),
            _ => Some(false),
        }
    }

    /// SQL `>`: `None` when either side is null or the types are not comparable.
    pub fn sql_gt(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a > b),
            (Value::Float(a), Value::Float(b)) => Some(a > b),
            (Value::Int(a), Value::Float(b)) => Some((*a as f64) > *b),
            (Value::Float(a), Value::Int(b)) => Some(*a > (*b as f64)),
            (Value::Utf8(a), Value::Utf8(b)) => Some(a > b),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a > b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Utf8(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Utf8(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Utf8(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(Column),
    Literal(Value),
}

impl From<Column> for Operand {
    fn from(column: Column) -> Self {
        Operand::Column(column)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

/// A boolean expression over the columns of a dataset.
///
/// Evaluation follows SQL three-valued logic: comparisons involving NULL
/// yield NULL, `NOT NULL` is NULL, and a filter keeps only rows where the
/// predicate is true.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Not(Box<Predicate>),
    Equals(Operand, Operand),
    GreaterThan(Operand, Operand),
    RegexMatch { column: Column, pattern: String },
}

impl Predicate {
    /// Returns every column referenced by the predicate.
    pub fn columns(&self) -> Vec<&Column> {
        fn operand_column(operand: &Operand) -> Option<&Column> {
            match operand {
                Operand::Column(c) => Some(c),
                Operand::Literal(_) => None,
            }
        }

        match self {
            Predicate::Not(inner) => inner.columns(),
            Predicate::Equals(a, b) | Predicate::GreaterThan(a, b) => operand_column(a)
                .into_iter()
                .chain(operand_column(b))
                .collect(),
            Predicate::RegexMatch { column, .. } => vec![column],
        }
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        Predicate::Not(Box::new(self))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(c) => write!(f, "{c}"),
            Operand::Literal(Value::Utf8(s)) => write!(f, "'{s}'"),
            Operand::Literal(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Not(inner) => write!(f, "NOT ({inner})"),
            Predicate::Equals(a, b) => write!(f, "{a} = {b}"),
            Predicate::GreaterThan(a, b) => write!(f, "{a} > {b}"),
            Predicate::RegexMatch { column, pattern } => write!(f, "{column} ~ '{pattern}'"),
        }
    }
}

/// Compiles a pattern, mapping syntax errors to [`GuardError::InvalidArgument`].
pub(crate) fn compile_pattern(pattern: &str) -> Result<regex::Regex> {
    regex::Regex::new(pattern).map_err(|e| {
        GuardError::invalid_argument(format!("invalid regex pattern '{pattern}': {e}"))
    })
}

/// An immutable handle to tabular data with named columns.
#[async_trait]
pub trait Dataset: Sized + Send + Sync {
    /// The grouped form produced by [`Dataset::group_by`].
    type Grouping: Grouping<Output = Self>;

    /// Returns the rows for which `predicate` is true.
    async fn filter(&self, predicate: &Predicate) -> Result<Self>;

    /// Groups rows by the exact tuple of values in `columns`.
    async fn group_by(&self, columns: &[Column]) -> Result<Self::Grouping>;

    /// Returns the exact number of rows.
    async fn count(&self) -> Result<usize>;

    /// Returns true when the dataset has no rows.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.count().await? == 0)
    }
}

/// A dataset grouped by one or more key columns.
#[async_trait]
pub trait Grouping: Send + Sync {
    /// The dataset type produced by [`Grouping::count`].
    type Output: Dataset;

    /// Name of the group-size column appended by [`Grouping::count`].
    fn count_column(&self) -> &str;

    /// Returns one row per group: the key columns plus a
    /// [`Grouping::count_column`] holding the number of rows in the group.
    async fn count(&self) -> Result<Self::Output>;
}
