use crate::hook::TableHook;
use crate::level::Severity;
use crate::record::LogEntry;
use crate::storage::StorageError;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets never forwarded to the table: this crate and the HTTP stack
/// used for inserts, so a write cannot log its way back into the layer.
const IGNORED_TARGETS: &[&str] = &["tracing_table_sink", "reqwest", "hyper", "h2", "rustls", "want"];

/// Receives insert failures reported by [`TableHook::fire`].
pub type ErrorHandler = Arc<dyn Fn(&StorageError) + Send + Sync>;

/// `tracing_subscriber` layer that hands every accepted event to a
/// [`TableHook`].
///
/// The hook's [`levels`](TableHook::levels) decide which events are
/// written. Each write happens synchronously on the thread that emitted
/// the event; there is no queue and no retry. Failed writes go to the
/// error handler, which by default prints them to stderr.
pub struct TableLayer {
    hook: TableHook,
    on_error: ErrorHandler,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Rows the table service accepted.
    pub written_events: Arc<AtomicU64>,
    /// Inserts that returned an error.
    pub failed_events: Arc<AtomicU64>,
}

impl TableLayer {
    pub fn new(hook: TableHook) -> Self {
        Self {
            hook,
            on_error: Arc::new(|err: &StorageError| eprintln!("Failed to fire hook: {}", err)),
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StorageError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
        self
    }

    pub fn hook(&self) -> &TableHook {
        &self.hook
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
    })
}

impl<S> Layer<S> for TableLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if is_ignored(meta.target()) {
            return;
        }
        let level = Severity::from(*meta.level());
        if !self.hook.accepts(level) {
            return;
        }

        let mut data = BTreeMap::new();
        let mut message: Option<String> = None;
        event.record(&mut FieldVisitor {
            fields: &mut data,
            message: &mut message,
        });

        let entry = LogEntry {
            time: Utc::now(),
            level,
            message: message.unwrap_or_default(),
            data,
        };

        match self.hook.fire(&entry) {
            Ok(()) => {
                if self.hook.is_enabled() {
                    self.written_events.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(err) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                (self.on_error)(&err);
            }
        }
    }
}

/// Collects event fields into JSON values and pulls out `message`.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // Format-string messages arrive here as `fmt::Arguments`.
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
