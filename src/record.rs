use crate::level::Severity;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One log event as handed to the hook.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: Severity,
    pub message: String,
    pub data: BTreeMap<String, serde_json::Value>,
}

impl LogEntry {
    /// Entry stamped with the current time and no structured fields.
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            message: message.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}
