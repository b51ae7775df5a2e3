//! In-memory row store implementing [`Dataset`].

use super::{
    compile_pattern, count_column_for, Column, Dataset, Grouping, Operand, Predicate, Value,
};
use crate::prelude::*;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// A small, immutable, row-oriented dataset.
///
/// Clones share storage. Every operation builds a new dataset and leaves the
/// source untouched.
///
/// # Examples
///
/// ```rust
/// use frame_guard::dataset::{MemoryDataset, Value};
///
/// let data = MemoryDataset::new(
///     ["id", "name"],
///     vec![
///         vec![Value::Int(1), Value::from("alice")],
///         vec![Value::Int(2), Value::from("bob")],
///     ],
/// )?;
/// assert_eq!(data.num_rows(), 2);
/// # Ok::<(), frame_guard::error::GuardError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    columns: Arc<[Column]>,
    rows: Arc<Vec<Vec<Value>>>,
}

impl MemoryDataset {
    /// Creates a dataset from column names and rows.
    ///
    /// Fails with [`GuardError::InvalidArgument`] when a row's width does not
    /// match the number of columns or a column name is repeated.
    pub fn new<I, C>(columns: I, rows: Vec<Vec<Value>>) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let columns: Vec<Column> = columns.into_iter().map(Into::into).collect();

        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(GuardError::invalid_argument(format!(
                    "duplicate column name '{column}'"
                )));
            }
        }

        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(GuardError::invalid_argument(format!(
                "row {i} has {} values but the dataset has {} columns",
                row.len(),
                columns.len()
            )));
        }

        Ok(Self {
            columns: columns.into(),
            rows: Arc::new(rows),
        })
    }

    /// Creates an empty dataset with the given columns.
    ///
    /// Column names are validated as in [`MemoryDataset::new`].
    pub fn empty<I, C>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        Self::new(columns, Vec::new())
    }

    /// Returns the column names in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Returns the number of rows without going through the async contract.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns the position of `column`.
    pub fn column_index(&self, column: &Column) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| GuardError::column_not_found(column.name()))
    }

    /// Returns every value of one column, top to bottom.
    pub fn column_values(&self, column: impl Into<Column>) -> Result<Vec<&Value>> {
        let index = self.column_index(&column.into())?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    fn derive(&self, columns: Arc<[Column]>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: Arc::new(rows),
        }
    }

    fn compile(&self, predicate: &Predicate) -> Result<Compiled> {
        let slot = |operand: &Operand| -> Result<Slot> {
            match operand {
                Operand::Column(c) => self.column_index(c).map(Slot::Index),
                Operand::Literal(v) => Ok(Slot::Literal(v.clone())),
            }
        };

        Ok(match predicate {
            Predicate::Not(inner) => Compiled::Not(Box::new(self.compile(inner)?)),
            Predicate::Equals(a, b) => Compiled::Equals(slot(a)?, slot(b)?),
            Predicate::GreaterThan(a, b) => Compiled::GreaterThan(slot(a)?, slot(b)?),
            Predicate::RegexMatch { column, pattern } => {
                Compiled::RegexMatch(self.column_index(column)?, compile_pattern(pattern)?)
            }
        })
    }
}

/// Predicate with columns resolved to positions and patterns compiled.
enum Compiled {
    Not(Box<Compiled>),
    Equals(Slot, Slot),
    GreaterThan(Slot, Slot),
    RegexMatch(usize, Regex),
}

enum Slot {
    Index(usize),
    Literal(Value),
}

impl Slot {
    fn resolve<'a>(&'a self, row: &'a [Value]) -> &'a Value {
        match self {
            Slot::Index(i) => &row[*i],
            Slot::Literal(v) => v,
        }
    }
}

impl Compiled {
    /// Three-valued evaluation; `None` is SQL NULL.
    fn eval(&self, row: &[Value]) -> Option<bool> {
        match self {
            Compiled::Not(inner) => inner.eval(row).map(|b| !b),
            Compiled::Equals(a, b) => a.resolve(row).sql_eq(b.resolve(row)),
            Compiled::GreaterThan(a, b) => a.resolve(row).sql_gt(b.resolve(row)),
            Compiled::RegexMatch(i, regex) => match &row[*i] {
                Value::Null => None,
                Value::Utf8(s) => Some(regex.is_match(s)),
                // Floats keep their fractional part, as Arrow's cast to Utf8 does.
                Value::Float(x) => Some(regex.is_match(&format!("{x:?}"))),
                other => Some(regex.is_match(&other.to_string())),
            },
        }
    }
}

/// Hashable projection of a [`Value`] used as a group key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Null,
    Boolean(bool),
    Int(i64),
    Float(u64),
    Utf8(String),
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => KeyPart::Null,
            Value::Boolean(b) => KeyPart::Boolean(*b),
            Value::Int(i) => KeyPart::Int(*i),
            Value::Float(x) => KeyPart::Float(x.to_bits()),
            Value::Utf8(s) => KeyPart::Utf8(s.clone()),
        }
    }
}

#[async_trait]
impl Dataset for MemoryDataset {
    type Grouping = MemoryGrouping;

    #[instrument(skip_all, fields(predicate = %predicate))]
    async fn filter(&self, predicate: &Predicate) -> Result<Self> {
        let compiled = self.compile(predicate)?;
        let rows = self
            .rows
            .iter()
            .filter(|row| compiled.eval(row) == Some(true))
            .cloned()
            .collect();
        Ok(self.derive(Arc::clone(&self.columns), rows))
    }

    async fn group_by(&self, columns: &[Column]) -> Result<MemoryGrouping> {
        let key_indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(MemoryGrouping {
            source: self.clone(),
            keys: columns.to_vec(),
            key_indices,
            count_column: count_column_for(columns),
        })
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.len())
    }

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.rows.is_empty())
    }
}

/// A [`MemoryDataset`] grouped by key columns.
#[derive(Debug, Clone)]
pub struct MemoryGrouping {
    source: MemoryDataset,
    keys: Vec<Column>,
    key_indices: Vec<usize>,
    count_column: String,
}

#[async_trait]
impl Grouping for MemoryGrouping {
    type Output = MemoryDataset;

    fn count_column(&self) -> &str {
        &self.count_column
    }

    /// Groups appear in order of first occurrence. NULL keys form one group.
    async fn count(&self) -> Result<MemoryDataset> {
        let mut positions: HashMap<Vec<KeyPart>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, i64)> = Vec::new();

        for row in self.source.rows.iter() {
            let key: Vec<KeyPart> = self.key_indices.iter().map(|&i| (&row[i]).into()).collect();
            match positions.get(&key) {
                Some(&pos) => groups[pos].1 += 1,
                None => {
                    positions.insert(key, groups.len());
                    let values = self.key_indices.iter().map(|&i| row[i].clone()).collect();
                    groups.push((values, 1));
                }
            }
        }

        let columns: Arc<[Column]> = self
            .keys
            .iter()
            .cloned()
            .chain(std::iter::once(Column::new(self.count_column.as_str())))
            .collect();
        let rows = groups
            .into_iter()
            .map(|(mut values, count)| {
                values.push(Value::Int(count));
                values
            })
            .collect();

        Ok(self.source.derive(columns, rows))
    }
}
