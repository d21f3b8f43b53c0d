pub mod entity;
pub mod env;
pub mod hook;
pub mod layer;
pub mod level;
pub mod record;
pub mod storage;

#[cfg(feature = "azure")]
pub mod azure;

pub mod init;
pub mod memory;

pub use hook::{HookConfig, HookError, HookInitializer, TableHook};
pub use level::Severity;
pub use record::LogEntry;
