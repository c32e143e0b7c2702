use crate::logger::JsonLogger;
use crate::record::level_record;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into level records and
/// submits them to a [`JsonLogger`].
///
/// Each event becomes `{"Time", "Type", "Message", "Data"}` where `Type` is
/// the lowercase level. `on_event` never waits: when the queue is full the
/// record is dropped and counted. Events emitted by this crate are skipped
/// so the writer's own diagnostics never loop back into the log.
pub struct JsonLogLayer {
    logger: JsonLogger,
    debug: Arc<AtomicBool>,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into the logger.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the queue was full or the logger was closed.
    pub dropped_events: Arc<AtomicU64>,
}

impl JsonLogLayer {
    /// Create a layer writing into `logger`, with debug output enabled.
    pub fn new(logger: JsonLogger) -> Self {
        Self {
            logger,
            debug: Arc::new(AtomicBool::new(true)),
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared switch for `debug`/`trace` events. Keep a clone to toggle it
    /// after the layer has been installed.
    pub fn debug_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.debug)
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        Level::TRACE => "trace",
    }
}

/// Events emitted by this crate itself; logging them would feed the writer
/// its own diagnostics.
fn is_own_target(target: &str) -> bool {
    const CRATE: &str = env!("CARGO_CRATE_NAME");
    target == CRATE || target.starts_with(concat!(env!("CARGO_CRATE_NAME"), "::"))
}

impl<S> Layer<S> for JsonLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }
        if *meta.level() > Level::INFO && !self.debug.load(Ordering::Relaxed) {
            return;
        }

        let mut fields = Map::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let record = level_record(
            Utc::now(),
            level_name(meta.level()),
            message.unwrap_or_default(),
            fields,
        );

        match self.logger.try_submit(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Map<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }
}
