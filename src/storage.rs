use crate::entity::TableEntity;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Error code the service reports when creating a table that exists.
pub const TABLE_ALREADY_EXISTS: &str = "TableAlreadyExists";

/// Error code the service reports when inserting a duplicate `(PartitionKey, RowKey)`.
pub const ENTITY_ALREADY_EXISTS: &str = "EntityAlreadyExists";

pub const TABLE_NOT_FOUND: &str = "TableNotFound";

/// Errors reported by a [`TableService`] or while connecting to one.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// The service answered with an error status and code.
    #[error("table service error {status} ({code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid storage credentials: {0}")]
    InvalidCredentials(String),

    #[error("table service unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "azure")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode entity: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StorageError {
    /// Service error code, if the service produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            StorageError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_table_already_exists(&self) -> bool {
        self.code() == Some(TABLE_ALREADY_EXISTS)
    }
}

/// Account name and key used to authenticate against the table service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account_name: String,
    pub account_key: String,
}

impl Credentials {
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.account_name.is_empty() && !self.account_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .finish()
    }
}

/// Connection to a partitioned table store.
///
/// Calls are synchronous: they block the calling thread until the service
/// has answered. Implementations must be safe to call from many threads.
pub trait TableService: Send + Sync {
    /// Create `table`. Asking for a table that already exists yields a
    /// [`StorageError::Service`] with code [`TABLE_ALREADY_EXISTS`].
    fn create_table(&self, table: &str, timeout: Duration) -> Result<(), StorageError>;

    /// Insert a single entity into `table`.
    fn insert_entity(&self, table: &str, entity: &TableEntity) -> Result<(), StorageError>;
}

/// Opens a [`TableService`] for a set of resolved credentials.
pub trait Connector {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn TableService>, StorageError>;
}

impl<F> Connector for F
where
    F: Fn(&Credentials) -> Result<Arc<dyn TableService>, StorageError>,
{
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn TableService>, StorageError> {
        self(credentials)
    }
}

/// Handle to one provisioned table.
#[derive(Clone)]
pub struct TableRef {
    service: Arc<dyn TableService>,
    name: String,
}

impl TableRef {
    pub fn new(service: Arc<dyn TableService>, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&self, entity: &TableEntity) -> Result<(), StorageError> {
        self.service.insert_entity(&self.name, entity)
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRef").field("name", &self.name).finish_non_exhaustive()
    }
}
