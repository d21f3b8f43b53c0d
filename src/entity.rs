use crate::record::LogEntry;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Partition used when the entry carries no string `service` field.
pub const DEFAULT_PARTITION_KEY: &str = "logrus";

/// Field whose string value selects the partition.
pub const SERVICE_FIELD: &str = "service";

pub const TIMESTAMP_PROPERTY: &str = "LogTimestamp";
pub const LEVEL_PROPERTY: &str = "Level";
pub const MESSAGE_PROPERTY: &str = "Message";

/// Typed property value of a table entity.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Boolean(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PropertyValue::Int64(i)
                } else if n.is_u64() {
                    // Past i64::MAX; keep every digit.
                    PropertyValue::String(n.to_string())
                } else {
                    PropertyValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => PropertyValue::String(s),
            // Tables hold flat properties only.
            other @ (Value::Array(_) | Value::Object(_)) => PropertyValue::String(other.to_string()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

/// One row of the log table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl TableEntity {
    /// Map a log entry onto a row.
    ///
    /// Caller fields are copied first and the reserved properties are
    /// assigned afterwards, so a caller field named `Level`, `Message` or
    /// `LogTimestamp` is overwritten by the reserved value.
    pub fn from_entry(entry: &LogEntry) -> Self {
        let mut properties: BTreeMap<String, PropertyValue> = entry
            .data
            .iter()
            .map(|(k, v)| (k.clone(), PropertyValue::from(v.clone())))
            .collect();

        properties.insert(TIMESTAMP_PROPERTY.to_string(), PropertyValue::DateTime(entry.time));
        properties.insert(
            LEVEL_PROPERTY.to_string(),
            PropertyValue::String(entry.level.as_str().to_string()),
        );
        properties.insert(
            MESSAGE_PROPERTY.to_string(),
            PropertyValue::String(entry.message.clone()),
        );

        // Only a JSON string selects the partition; flattened arrays,
        // objects and wide integers are strings in `properties` but not here.
        let partition_key = entry
            .data
            .get(SERVICE_FIELD)
            .and_then(serde_json::Value::as_str)
            .unwrap_or(DEFAULT_PARTITION_KEY)
            .to_string();

        TableEntity {
            partition_key,
            row_key: row_key_for(&entry.time),
            properties,
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Nanoseconds since the Unix epoch, as a decimal string.
///
/// Computed in `i128` so timestamps outside the `i64` nanosecond range still
/// produce a well-formed key.
pub fn row_key_for(time: &DateTime<Utc>) -> String {
    let nanos = i128::from(time.timestamp()) * 1_000_000_000 + i128::from(time.timestamp_subsec_nanos());
    nanos.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Severity;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 123_456_789).single().unwrap()
    }

    #[test]
    fn default_partition_without_service() {
        let entry = LogEntry::new(Severity::Info, "boot").at(fixed_time());
        let row = TableEntity::from_entry(&entry);

        assert_eq!(row.partition_key, DEFAULT_PARTITION_KEY);
        assert_eq!(row.row_key, "1700000000123456789");
        assert_eq!(row.get(LEVEL_PROPERTY), Some(&PropertyValue::from("info")));
        assert_eq!(row.get(MESSAGE_PROPERTY), Some(&PropertyValue::from("boot")));
        assert_eq!(row.get(TIMESTAMP_PROPERTY), Some(&PropertyValue::DateTime(fixed_time())));
        assert_eq!(row.properties.len(), 3);
    }

    #[test]
    fn string_service_selects_partition() {
        let entry = LogEntry::new(Severity::Info, "x").with_field("service", "billing");
        let row = TableEntity::from_entry(&entry);
        assert_eq!(row.partition_key, "billing");
        assert_eq!(row.get("service"), Some(&PropertyValue::from("billing")));
    }

    #[test]
    fn non_string_service_keeps_default_partition() {
        for value in [
            json!(42),
            json!(true),
            json!(null),
            json!(1.5),
            json!({"name": "billing"}),
            json!(["billing"]),
            json!(u64::MAX),
        ] {
            let entry = LogEntry::new(Severity::Warn, "x").with_field("service", value.clone());
            let row = TableEntity::from_entry(&entry);
            assert_eq!(row.partition_key, DEFAULT_PARTITION_KEY, "service = {}", value);
        }
    }

    #[test]
    fn reserved_properties_win_over_caller_fields() {
        let entry = LogEntry::new(Severity::Error, "real message")
            .at(fixed_time())
            .with_field("Message", "spoofed")
            .with_field("Level", "debug")
            .with_field("LogTimestamp", "yesterday")
            .with_field("user_id", 42);
        let row = TableEntity::from_entry(&entry);

        assert_eq!(row.get(MESSAGE_PROPERTY), Some(&PropertyValue::from("real message")));
        assert_eq!(row.get(LEVEL_PROPERTY), Some(&PropertyValue::from("error")));
        assert_eq!(row.get(TIMESTAMP_PROPERTY), Some(&PropertyValue::DateTime(fixed_time())));
        assert_eq!(row.get("user_id"), Some(&PropertyValue::Int64(42)));
    }

    #[test]
    fn row_key_is_decimal_and_ordered() {
        let earlier = fixed_time();
        let later = earlier + chrono::Duration::nanoseconds(1);
        let a = row_key_for(&earlier);
        let b = row_key_for(&later);

        assert!(a.chars().all(|c| c.is_ascii_digit()));
        assert!(b.parse::<i128>().unwrap() > a.parse::<i128>().unwrap());
    }

    #[test]
    fn row_key_before_epoch_is_signed_decimal() {
        let before = Utc.timestamp_opt(-1, 0).single().unwrap();
        assert_eq!(row_key_for(&before), "-1000000000");
    }

    #[test]
    fn json_values_flatten_to_properties() {
        assert_eq!(PropertyValue::from(json!(1.5)), PropertyValue::Double(1.5));
        assert_eq!(
            PropertyValue::from(json!(u64::MAX)),
            PropertyValue::String(u64::MAX.to_string())
        );
        assert_eq!(
            PropertyValue::from(json!([1, 2])),
            PropertyValue::String("[1,2]".to_string())
        );
    }
}
