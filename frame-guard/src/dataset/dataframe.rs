//! [`Dataset`] implementation for DataFusion's [`DataFrame`].
//!
//! Predicates are lowered to DataFusion logical expressions, so filtering and
//! grouping run inside the DataFusion engine with its usual parallelism. The
//! adapter never collects rows itself except to answer `count`.

use super::{
    compile_pattern, count_column_for, Column, Dataset, Grouping, Operand, Predicate, Value,
};
use crate::prelude::*;
use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::common::ScalarValue;
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::logical_expr::{binary_expr, cast, ident, lit, Expr, Operator};
use tracing::{debug, instrument};

impl From<&Value> for ScalarValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ScalarValue::Null,
            Value::Boolean(b) => ScalarValue::Boolean(Some(*b)),
            Value::Int(i) => ScalarValue::Int64(Some(*i)),
            Value::Float(x) => ScalarValue::Float64(Some(*x)),
            Value::Utf8(s) => ScalarValue::Utf8(Some(s.clone())),
        }
    }
}

/// Builds an unqualified column expression without parsing dots or
/// normalising case.
fn column_expr(column: &Column) -> Expr {
    ident(column.name())
}

fn operand_expr(operand: &Operand) -> Expr {
    match operand {
        Operand::Column(c) => column_expr(c),
        Operand::Literal(v) => lit(ScalarValue::from(v)),
    }
}

/// Lowers a [`Predicate`] to a DataFusion [`Expr`].
///
/// Regex matching casts the column to `Utf8` first so that numeric columns
/// are matched against their textual form. Patterns are compiled up front so
/// a malformed pattern is reported as an invalid argument rather than an
/// execution error.
pub fn to_expr(predicate: &Predicate) -> Result<Expr> {
    Ok(match predicate {
        Predicate::Not(inner) => !to_expr(inner)?,
        Predicate::Equals(a, b) => operand_expr(a).eq(operand_expr(b)),
        Predicate::GreaterThan(a, b) => operand_expr(a).gt(operand_expr(b)),
        Predicate::RegexMatch { column, pattern } => {
            compile_pattern(pattern)?;
            binary_expr(
                cast(column_expr(column), DataType::Utf8),
                Operator::RegexMatch,
                lit(pattern.as_str()),
            )
        }
    })
}

fn ensure_columns<'a>(
    frame: &DataFrame,
    columns: impl IntoIterator<Item = &'a Column>,
) -> Result<()> {
    for column in columns {
        if frame
            .schema()
            .field_with_unqualified_name(column.name())
            .is_err()
        {
            return Err(GuardError::column_not_found(column.name()));
        }
    }
    Ok(())
}

#[async_trait]
impl Dataset for DataFrame {
    type Grouping = DataFrameGrouping;

    #[instrument(skip_all, fields(predicate = %predicate))]
    async fn filter(&self, predicate: &Predicate) -> Result<Self> {
        ensure_columns(self, predicate.columns())?;
        let expr = to_expr(predicate)?;
        debug!(expr = %expr, "Lowered predicate");
        Ok(DataFrame::filter(self.clone(), expr)?)
    }

    async fn group_by(&self, columns: &[Column]) -> Result<DataFrameGrouping> {
        ensure_columns(self, columns)?;
        Ok(DataFrameGrouping {
            frame: self.clone(),
            keys: columns.to_vec(),
            count_column: count_column_for(columns),
        })
    }

    async fn count(&self) -> Result<usize> {
        Ok(DataFrame::count(self.clone()).await?)
    }

    async fn is_empty(&self) -> Result<bool> {
        let head = self.clone().limit(0, Some(1))?;
        Ok(DataFrame::count(head).await? == 0)
    }
}

/// A [`DataFrame`] grouped by key columns.
#[derive(Debug, Clone)]
pub struct DataFrameGrouping {
    frame: DataFrame,
    keys: Vec<Column>,
    count_column: String,
}

#[async_trait]
impl Grouping for DataFrameGrouping {
    type Output = DataFrame;

    fn count_column(&self) -> &str {
        &self.count_column
    }

    async fn count(&self) -> Result<DataFrame> {
        let keys = self.keys.iter().map(column_expr).collect();
        let counted = self
            .frame
            .clone()
            .aggregate(keys, vec![count(lit(1)).alias(self.count_column.as_str())])?;
        Ok(counted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{col, lit as value_lit};
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use datafusion::prelude::SessionContext;
    use std::sync::Arc;

    async fn sample_frame() -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Int64, true),
            Field::new("Code", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 1, 2])),
                Arc::new(Int64Array::from(vec![Some(5), Some(5), None])),
                Arc::new(Int64Array::from(vec![Some(5), Some(6), Some(7)])),
                Arc::new(StringArray::from(vec![Some("AB"), Some("ab"), None])),
            ],
        )
        .unwrap();

        let ctx = SessionContext::new();
        ctx.register_batch("data", batch).unwrap();
        ctx.table("data").await.unwrap()
    }

    #[test]
    fn test_to_expr_rejects_bad_pattern() {
        let err = to_expr(&col("x").rlike("[")).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_filter_equality() {
        let frame = sample_frame().await;
        let mismatched = Dataset::filter(&frame, &!col("a").equals(col("b")))
            .await
            .unwrap();
        assert_eq!(Dataset::count(&mismatched).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_filter_regex_keeps_case_sensitive_column_names() {
        let frame = sample_frame().await;
        let not_upper = Dataset::filter(&frame, &!col("Code").rlike("^[A-Z]+$"))
            .await
            .unwrap();
        assert_eq!(Dataset::count(&not_upper).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_filter_regex_on_numeric_column() {
        let frame = sample_frame().await;
        let not_digits = Dataset::filter(&frame, &!col("id").rlike(r"^\d+$"))
            .await
            .unwrap();
        assert!(Dataset::is_empty(&not_digits).await.unwrap());
    }

    #[tokio::test]
    async fn test_filter_unknown_column() {
        let frame = sample_frame().await;
        let err = Dataset::filter(&frame, &col("nope").equals(value_lit(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::ColumnNotFound { .. }));
    }

    #[tokio::test]
    async fn test_group_count_appends_count_column() {
        let frame = sample_frame().await;
        let counts = frame
            .group_by(&[Column::new("id")])
            .await
            .unwrap()
            .count()
            .await
            .unwrap();

        assert!(counts.schema().field_with_unqualified_name("count").is_ok());
        assert_eq!(Dataset::count(&counts).await.unwrap(), 2);

        let duplicated = Dataset::filter(&counts, &col("count").gt(value_lit(1)))
            .await
            .unwrap();
        assert_eq!(Dataset::count(&duplicated).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_group_count_with_key_named_count() {
        let schema = Arc::new(Schema::new(vec![Field::new("count", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Int64Array::from(vec![5, 6, 5]))],
        )
        .unwrap();
        let ctx = SessionContext::new();
        ctx.register_batch("data", batch).unwrap();
        let frame = ctx.table("data").await.unwrap();

        let grouping = frame.group_by(&[Column::new("count")]).await.unwrap();
        assert_eq!(grouping.count_column(), "__count");

        let counts = grouping.count().await.unwrap();
        let duplicated = Dataset::filter(&counts, &col(grouping.count_column()).gt(value_lit(1)))
            .await
            .unwrap();
        assert_eq!(Dataset::count(&duplicated).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_is_empty() {
        let frame = sample_frame().await;
        assert!(!Dataset::is_empty(&frame).await.unwrap());

        let none = Dataset::filter(&frame, &col("id").gt(value_lit(100)))
            .await
            .unwrap();
        assert!(Dataset::is_empty(&none).await.unwrap());
    }
}
