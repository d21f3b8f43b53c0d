use crate::entity::TableEntity;
use crate::storage::{
    Connector, Credentials, StorageError, TableService, ENTITY_ALREADY_EXISTS, TABLE_ALREADY_EXISTS,
    TABLE_NOT_FOUND,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Rows = BTreeMap<(String, String), TableEntity>;

/// A table service that keeps every table in process memory.
///
/// Useful for running the hook without network access and for tests. It
/// answers with the same error codes as the real service for duplicate
/// tables, duplicate keys and missing tables.
#[derive(Default)]
pub struct MemoryTableService {
    tables: Mutex<BTreeMap<String, Rows>>,
    unreachable: bool,
    create_calls: AtomicU64,
    insert_calls: AtomicU64,
}

impl MemoryTableService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service whose every call fails as if the network were down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Pre-create `table`.
    pub fn with_table(self, table: &str) -> Self {
        self.lock().entry(table.to_string()).or_default();
        self
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().contains_key(table)
    }

    /// Rows of `table`, ordered by partition key then row key.
    pub fn rows(&self, table: &str) -> Vec<TableEntity> {
        self.lock()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub fn insert_calls(&self) -> u64 {
        self.insert_calls.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Rows>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reachable(&self) -> Result<(), StorageError> {
        if self.unreachable {
            Err(StorageError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn conflict(code: &str, message: &str) -> StorageError {
    StorageError::Service {
        status: 409,
        code: code.to_string(),
        message: message.to_string(),
    }
}

impl TableService for MemoryTableService {
    fn create_table(&self, table: &str, _timeout: Duration) -> Result<(), StorageError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        self.check_reachable()?;

        let mut tables = self.lock();
        if tables.contains_key(table) {
            return Err(conflict(TABLE_ALREADY_EXISTS, "The table specified already exists."));
        }
        tables.insert(table.to_string(), Rows::new());
        Ok(())
    }

    fn insert_entity(&self, table: &str, entity: &TableEntity) -> Result<(), StorageError> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        self.check_reachable()?;

        let mut tables = self.lock();
        let rows = tables.get_mut(table).ok_or_else(|| StorageError::Service {
            status: 404,
            code: TABLE_NOT_FOUND.to_string(),
            message: "The table specified does not exist.".to_string(),
        })?;

        let key = (entity.partition_key.clone(), entity.row_key.clone());
        if rows.contains_key(&key) {
            return Err(conflict(ENTITY_ALREADY_EXISTS, "The specified entity already exists."));
        }
        rows.insert(key, entity.clone());
        Ok(())
    }
}

/// Hands out a shared [`MemoryTableService`].
///
/// Incomplete credentials are always rejected. With [`require`](Self::require)
/// only one exact pair is accepted.
pub struct MemoryConnector {
    service: Arc<MemoryTableService>,
    required: Option<Credentials>,
}

impl MemoryConnector {
    pub fn new(service: Arc<MemoryTableService>) -> Self {
        Self { service, required: None }
    }

    pub fn require(mut self, credentials: Credentials) -> Self {
        self.required = Some(credentials);
        self
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn TableService>, StorageError> {
        if !credentials.is_complete() {
            return Err(StorageError::InvalidCredentials(
                "account name and key are required".to_string(),
            ));
        }
        if let Some(required) = &self.required {
            if required != credentials {
                return Err(StorageError::InvalidCredentials(format!(
                    "authentication failed for account {}",
                    credentials.account_name
                )));
            }
        }
        Ok(Arc::clone(&self.service) as Arc<dyn TableService>)
    }
}
