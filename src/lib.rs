//! Asynchronous, time-rotating JSON-lines log writer.
//!
//! Producers hand records to a [`JsonLogger`]; a single Tokio task owns the
//! open file, encodes each record as one JSON line, flushes on a timer and
//! rotates files by local day or hour. Closing the logger drains every
//! queued record before the last file is finalized.
//!
//! Layout by day: `{base}/{YYYY-MM}/{YYYY-MM-DD}{ext}`.
//! Layout by hour: `{base}/{YYYY-MM}/{YYYY-MM-DD}/{YYYY-MM-DD}_{HH}{ext}`.

pub mod record;
pub mod switcher;
pub mod file;
pub mod stats;
pub mod writer;
pub mod config;
pub mod env;
pub mod logger;
pub mod layer;
pub mod init;
pub mod global;

pub use config::{ConfigError, LoggerConfig};
pub use logger::{JsonLogger, LoggerError};
pub use record::Record;
pub use switcher::{ByDay, ByHour, SwitchMode, Switcher};
pub use writer::WriterState;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
