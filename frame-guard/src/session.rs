//! Session configuration for DataFusion-backed datasets.
//!
//! [`GuardSession`] wraps a [`SessionContext`] built from [`SessionSettings`]:
//! an application name, execution sizing, and arbitrary DataFusion
//! configuration keys. It also tracks which tables have been registered so
//! compute tasks can resolve their inputs by name.

use crate::prelude::*;
use arrow::record_batch::RecordBatch;
use datafusion::dataframe::DataFrame;
use datafusion::datasource::TableProvider;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Prefix of generated application names.
pub const GENERATED_APP_NAME_PREFIX: &str = "master_";

/// Settings used to build a [`GuardSession`].
///
/// # Examples
///
/// ```rust
/// use frame_guard::session::SessionSettings;
///
/// let settings = SessionSettings::default()
///     .with_app_name("nightly_orders")
///     .with_batch_size(4096)
///     .with_option("datafusion.execution.collect_statistics", "true");
/// assert_eq!(settings.app_name.as_deref(), Some("nightly_orders"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Application name; a unique `master_<uuid>` name is generated when absent
    pub app_name: Option<String>,
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Extra DataFusion configuration keys, e.g. `datafusion.execution.coalesce_batches`
    pub options: BTreeMap<String, String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            app_name: None,
            batch_size: 8192,
            target_partitions: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
            options: BTreeMap::new(),
        }
    }
}

impl SessionSettings {
    /// Sets the application name.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the target number of partitions.
    pub fn with_target_partitions(mut self, target_partitions: usize) -> Self {
        self.target_partitions = target_partitions;
        self
    }

    /// Adds a DataFusion configuration key.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    fn session_config(&self) -> Result<SessionConfig> {
        if self.batch_size == 0 {
            return Err(GuardError::Configuration(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.target_partitions == 0 {
            return Err(GuardError::Configuration(
                "target_partitions must be greater than zero".to_string(),
            ));
        }

        let mut config = SessionConfig::new()
            .with_batch_size(self.batch_size)
            .with_target_partitions(self.target_partitions)
            .with_information_schema(true);

        for (key, value) in &self.options {
            config.options_mut().set(key, value).map_err(|e| {
                GuardError::Configuration(format!("invalid session option '{key}': {e}"))
            })?;
        }

        Ok(config)
    }
}

/// A DataFusion session with a name and a registry of named tables.
///
/// # Examples
///
/// ```rust,no_run
/// use frame_guard::session::{GuardSession, SessionSettings};
/// use frame_guard::prelude::*;
///
/// # async fn example() -> frame_guard::error::Result<()> {
/// let mut session = GuardSession::with_settings(SessionSettings::default().with_app_name("orders"))?;
/// session.register_csv("orders", "data/orders.csv").await?;
///
/// let orders = session.table("orders").await?;
/// orders.validator().check_primary_key(Strategy::Fail, ["order_id"]).await?;
/// # Ok(())
/// # }
/// ```
pub struct GuardSession {
    inner: SessionContext,
    app_name: String,
    settings: SessionSettings,
    tables: BTreeSet<String>,
}

impl GuardSession {
    /// Creates a session with default settings and a generated name.
    pub fn new() -> Result<Self> {
        Self::with_settings(SessionSettings::default())
    }

    /// Creates a session from `settings`.
    ///
    /// Fails with [`GuardError::Configuration`] if a sizing value is zero or
    /// an option key is unknown to DataFusion.
    #[instrument(skip(settings), fields(app_name = ?settings.app_name))]
    pub fn with_settings(settings: SessionSettings) -> Result<Self> {
        let config = settings.session_config()?;
        let app_name = settings
            .app_name
            .clone()
            .unwrap_or_else(|| format!("{GENERATED_APP_NAME_PREFIX}{}", Uuid::new_v4()));

        info!(
            session.app_name = %app_name,
            session.batch_size = settings.batch_size,
            session.target_partitions = settings.target_partitions,
            session.options = settings.options.len(),
            "Created session"
        );

        Ok(Self {
            inner: SessionContext::new_with_config(config),
            app_name,
            settings,
            tables: BTreeSet::new(),
        })
    }

    /// Returns the application name.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the settings the session was built from.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Returns the underlying DataFusion context.
    pub fn inner(&self) -> &SessionContext {
        &self.inner
    }

    /// Returns the names of all tables registered through this session.
    pub fn registered_tables(&self) -> Vec<&str> {
        self.tables.iter().map(String::as_str).collect()
    }

    /// Checks if a table is registered.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains(name)
    }

    /// Registers a CSV file (with a header row) as a table.
    #[instrument(skip(self), fields(session.app_name = %self.app_name))]
    pub async fn register_csv(&mut self, name: &str, path: &str) -> Result<()> {
        self.inner
            .register_csv(name, path, CsvReadOptions::new())
            .await?;
        self.tables.insert(name.to_string());
        Ok(())
    }

    /// Registers a Parquet file as a table.
    #[instrument(skip(self), fields(session.app_name = %self.app_name))]
    pub async fn register_parquet(&mut self, name: &str, path: &str) -> Result<()> {
        self.inner
            .register_parquet(name, path, ParquetReadOptions::default())
            .await?;
        self.tables.insert(name.to_string());
        Ok(())
    }

    /// Registers an in-memory record batch as a table.
    pub fn register_batch(&mut self, name: &str, batch: RecordBatch) -> Result<()> {
        self.inner.register_batch(name, batch)?;
        self.tables.insert(name.to_string());
        Ok(())
    }

    /// Registers a data frame as a view, replacing any table of the same name.
    pub fn register_frame(&mut self, name: &str, frame: DataFrame) -> Result<()> {
        self.replace_frame(name, frame).map(|_| ())
    }

    /// Registers `frame` under `name` and returns what it displaced, so the
    /// change can be undone with [`GuardSession::restore_table`].
    pub(crate) fn replace_frame(&mut self, name: &str, frame: DataFrame) -> Result<Displaced> {
        let provider = if self.inner.table_exist(name)? {
            self.inner.deregister_table(name)?
        } else {
            None
        };
        let displaced = Displaced {
            name: name.to_string(),
            provider,
            tracked: self.tables.contains(name),
        };

        if let Err(err) = self.inner.register_table(name, frame.into_view()) {
            self.restore_table(displaced);
            return Err(err.into());
        }
        self.tables.insert(name.to_string());
        Ok(displaced)
    }

    /// Puts back the table a [`GuardSession::replace_frame`] call displaced.
    pub(crate) fn restore_table(&mut self, displaced: Displaced) {
        let Displaced {
            name,
            provider,
            tracked,
        } = displaced;

        if let Err(err) = self.inner.deregister_table(name.as_str()) {
            warn!(table = %name, error = %err, "Failed to remove table during rollback");
        }
        if let Some(provider) = provider {
            if let Err(err) = self.inner.register_table(name.as_str(), provider) {
                warn!(table = %name, error = %err, "Failed to restore table during rollback");
            }
        }
        if !tracked {
            self.tables.remove(&name);
        }
    }

    /// Removes a table from the session.
    pub fn deregister_table(&mut self, name: &str) -> Result<()> {
        self.inner.deregister_table(name)?;
        self.tables.remove(name);
        Ok(())
    }

    /// Returns a registered table as a data frame.
    pub async fn table(&self, name: &str) -> Result<DataFrame> {
        Ok(self.inner.table(name).await?)
    }
}

/// A table taken out of the session by [`GuardSession::replace_frame`].
pub(crate) struct Displaced {
    name: String,
    provider: Option<Arc<dyn TableProvider>>,
    tracked: bool,
}

impl std::fmt::Debug for GuardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardSession")
            .field("app_name", &self.app_name)
            .field("settings", &self.settings)
            .field("tables", &self.tables)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn ids_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap()
    }

    #[test]
    fn test_generated_app_name() {
        let session = GuardSession::new().unwrap();
        assert!(session.app_name().starts_with(GENERATED_APP_NAME_PREFIX));

        let other = GuardSession::new().unwrap();
        assert_ne!(session.app_name(), other.app_name());
    }

    #[test]
    fn test_explicit_app_name() {
        let session =
            GuardSession::with_settings(SessionSettings::default().with_app_name("etl")).unwrap();
        assert_eq!(session.app_name(), "etl");
    }

    #[test]
    fn test_options_are_applied() {
        let settings = SessionSettings::default()
            .with_batch_size(1024)
            .with_option("datafusion.execution.coalesce_batches", "false");
        let session = GuardSession::with_settings(settings).unwrap();

        let state = session.inner().state();
        let options = state.config().options();
        assert_eq!(options.execution.batch_size, 1024);
        assert!(!options.execution.coalesce_batches);
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let settings = SessionSettings::default().with_option("datafusion.nope", "1");
        let err = GuardSession::with_settings(settings).unwrap_err();
        assert!(matches!(err, GuardError::Configuration(_)));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = GuardSession::with_settings(SessionSettings::default().with_batch_size(0))
            .unwrap_err();
        assert!(matches!(err, GuardError::Configuration(_)));
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: SessionSettings =
            serde_json::from_str(r#"{"app_name": "from_json", "options": {"a": "b"}}"#).unwrap();
        assert_eq!(settings.app_name.as_deref(), Some("from_json"));
        assert_eq!(settings.batch_size, 8192);
        assert_eq!(settings.options.get("a").map(String::as_str), Some("b"));
    }

    #[tokio::test]
    async fn test_register_and_read_table() {
        let mut session = GuardSession::new().unwrap();
        session.register_batch("ids", ids_batch()).unwrap();

        assert!(session.has_table("ids"));
        assert_eq!(session.registered_tables(), vec!["ids"]);

        let frame = session.table("ids").await.unwrap();
        assert_eq!(Dataset::count(&frame).await.unwrap(), 3);

        session.deregister_table("ids").unwrap();
        assert!(!session.has_table("ids"));
        assert!(session.table("ids").await.is_err());
    }

    #[tokio::test]
    async fn test_register_frame_replaces_existing() {
        let mut session = GuardSession::new().unwrap();
        session.register_batch("ids", ids_batch()).unwrap();

        let frame = session.table("ids").await.unwrap().limit(0, Some(1)).unwrap();
        session.register_frame("ids", frame).unwrap();

        let replaced = session.table("ids").await.unwrap();
        assert_eq!(Dataset::count(&replaced).await.unwrap(), 1);
    }
}
