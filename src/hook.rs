use crate::entity::TableEntity;
use crate::env;
use crate::level::{ParseSeverityError, Severity};
use crate::record::LogEntry;
use crate::storage::{Connector, Credentials, StorageError, TableRef, TableService};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Server-side timeout requested when provisioning the log table.
pub const PROVISION_TIMEOUT: Duration = Duration::from_secs(30);

static ALL_LEVELS: [Severity; 7] = Severity::ALL;

/// Inputs for building a [`TableHook`].
///
/// **Fields**
/// - `account_name` / `account_key`: storage account credentials. When
///   either is empty both are taken from `ACCOUNT_NAME` / `ACCOUNT_KEY`.
/// - `table_name`: table that receives one row per log entry.
/// - `min_level`: least severe level that is still forwarded.
#[derive(Clone, Debug)]
pub struct HookConfig {
    pub account_name: String,
    pub account_key: String,
    pub table_name: String,
    pub min_level: Severity,
}

impl HookConfig {
    pub fn new(
        account_name: impl Into<String>,
        account_key: impl Into<String>,
        table_name: impl Into<String>,
        min_level: Severity,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            table_name: table_name.into(),
            min_level,
        }
    }

    /// Build a config from `LOG_SINK_TABLE` (default `logs`) and
    /// `LOG_SINK_LEVEL` (default `info`). Credentials are left empty so they
    /// resolve from the account variables.
    pub fn from_env() -> Result<Self, ParseSeverityError> {
        let table_name = env::env_or(env::LOG_SINK_TABLE_ENV, "logs");
        let min_level = env::env_or(env::LOG_SINK_LEVEL_ENV, "info").parse()?;
        Ok(Self::new("", "", table_name, min_level))
    }

    /// Credentials after applying the environment fallback.
    pub fn credentials(&self) -> Credentials {
        env::resolve_credentials(&self.account_name, &self.account_key)
    }
}

/// Reasons a hook could not be constructed.
#[derive(thiserror::Error, Debug)]
pub enum HookError {
    #[error("unable to create client for table storage hook: {0}")]
    Connect(#[source] StorageError),

    #[error("unable to create log table {table}: {source}")]
    CreateTable {
        table: String,
        #[source]
        source: StorageError,
    },
}

/// Receives construction failures. No log sink exists yet at that point,
/// so the default prints them to stderr.
pub type Diagnostics = Arc<dyn Fn(&HookError) + Send + Sync>;

fn stderr_diagnostics() -> Diagnostics {
    Arc::new(|err: &HookError| eprintln!("{}", err))
}

/// Connects to the table service and provisions the log table.
pub struct HookInitializer<C> {
    connector: C,
    diagnostics: Diagnostics,
}

impl<C: Connector> HookInitializer<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            diagnostics: stderr_diagnostics(),
        }
    }

    /// Route construction failures to `diagnostics` instead of stderr.
    pub fn with_diagnostics<F>(mut self, diagnostics: F) -> Self
    where
        F: Fn(&HookError) + Send + Sync + 'static,
    {
        self.diagnostics = Arc::new(diagnostics);
        self
    }

    /// Build a hook, falling back to [`TableHook::Disabled`] on any failure.
    ///
    /// Failures are reported once through the diagnostics callback and are
    /// not retried.
    pub fn initialize(&self, credentials: &Credentials, table_name: &str, min_level: Severity) -> TableHook {
        match self.try_initialize(credentials, table_name, min_level) {
            Ok(hook) => TableHook::Enabled(hook),
            Err(err) => {
                (self.diagnostics)(&err);
                TableHook::Disabled
            }
        }
    }

    /// Same as [`initialize`](Self::initialize) for a [`HookConfig`], with
    /// the environment credential fallback applied.
    pub fn initialize_config(&self, config: &HookConfig) -> TableHook {
        self.initialize(&config.credentials(), &config.table_name, config.min_level)
    }

    /// Build a hook and return the failure instead of reporting it.
    pub fn try_initialize(
        &self,
        credentials: &Credentials,
        table_name: &str,
        min_level: Severity,
    ) -> Result<ActiveHook, HookError> {
        let levels = Severity::at_or_above(min_level);
        let service = self.connector.connect(credentials).map_err(HookError::Connect)?;
        let table = provision_table(service, table_name)?;
        Ok(ActiveHook { table, levels })
    }
}

fn provision_table(service: Arc<dyn TableService>, table_name: &str) -> Result<TableRef, HookError> {
    match service.create_table(table_name, PROVISION_TIMEOUT) {
        Ok(()) => debug!(table = table_name, "log table created"),
        Err(err) if err.is_table_already_exists() => debug!(table = table_name, "log table already exists"),
        Err(source) => {
            return Err(HookError::CreateTable {
                table: table_name.to_string(),
                source,
            })
        }
    }
    Ok(TableRef::new(service, table_name))
}

/// A hook with a live connection and a provisioned table.
#[derive(Clone, Debug)]
pub struct ActiveHook {
    table: TableRef,
    levels: Vec<Severity>,
}

impl ActiveHook {
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn levels(&self) -> &[Severity] {
        &self.levels
    }

    /// Row that [`fire`](Self::fire) would write for `entry`.
    pub fn format(&self, entry: &LogEntry) -> TableEntity {
        TableEntity::from_entry(entry)
    }

    /// Insert one row for `entry`. The service error, if any, is returned
    /// unchanged.
    pub fn fire(&self, entry: &LogEntry) -> Result<(), StorageError> {
        self.table.insert(&self.format(entry))
    }
}

/// Log hook writing entries to a table, or a disabled placeholder when
/// construction failed.
#[derive(Clone, Debug)]
pub enum TableHook {
    Enabled(ActiveHook),
    Disabled,
}

impl TableHook {
    /// Build a hook against Azure Table Storage.
    ///
    /// Credentials fall back to `ACCOUNT_NAME` / `ACCOUNT_KEY` when either
    /// argument is empty. Failures are printed to stderr and yield
    /// [`TableHook::Disabled`].
    #[cfg(feature = "azure")]
    pub fn new(account_name: &str, account_key: &str, table_name: &str, min_level: Severity) -> Self {
        let credentials = env::resolve_credentials(account_name, account_key);
        HookInitializer::new(crate::azure::AzureConnector::default()).initialize(&credentials, table_name, min_level)
    }

    #[cfg(feature = "azure")]
    pub fn from_config(config: &HookConfig) -> Self {
        HookInitializer::new(crate::azure::AzureConnector::default()).initialize_config(config)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, TableHook::Enabled(_))
    }

    /// Write `entry` as one row. A disabled hook does nothing.
    pub fn fire(&self, entry: &LogEntry) -> Result<(), StorageError> {
        match self {
            TableHook::Enabled(hook) => hook.fire(entry),
            TableHook::Disabled => Ok(()),
        }
    }

    /// Severities this hook accepts.
    ///
    /// A disabled hook reports every severity; its `fire` is a no-op so
    /// the answer has no effect on what gets stored.
    pub fn levels(&self) -> &[Severity] {
        match self {
            TableHook::Enabled(hook) => hook.levels(),
            TableHook::Disabled => &ALL_LEVELS,
        }
    }

    pub fn accepts(&self, level: Severity) -> bool {
        self.levels().contains(&level)
    }
}
