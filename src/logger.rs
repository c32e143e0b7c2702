use crate::config::{ConfigError, LoggerConfig};
use crate::file::FileError;
use crate::record::Record;
use crate::stats::{Stats, StatsSnapshot};
use crate::switcher::Switcher;
use crate::writer::{FileSpec, Writer, WriterChannels, WriterState};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

/// Error type returned by [`JsonLogger`].
#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("invalid logger configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open log file: {0}")]
    File(#[from] FileError),

    #[error("logger is closed")]
    Closed,

    #[error("submission queue is full")]
    QueueFull,

    #[error("log rotation failed and the writer stopped: {0}")]
    Rotation(Arc<FileError>),

    #[error("log writer task exited unexpectedly")]
    WriterGone,

    #[error("no tokio runtime available to run the log writer")]
    NoRuntime,
}

struct Inner {
    config: LoggerConfig,
    sender: mpsc::Sender<Record>,
    closed: Arc<AtomicBool>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    state: watch::Receiver<WriterState>,
    stats: Arc<Stats>,
    first_path: Option<PathBuf>,
}

/// Handle for submitting records to a rotating JSON log.
///
/// Cloning is cheap; all clones feed the same writer task. The writer owns
/// the files, so handles never touch disk.
///
/// ```no_run
/// use rotating_jsonlog::{record, JsonLogger, LoggerConfig};
///
/// # async fn run() -> Result<(), rotating_jsonlog::LoggerError> {
/// let logger = JsonLogger::new(LoggerConfig::new("./logs"))?;
/// logger.submit(record! { "Time" => 1, "Msg" => "a" }).await?;
/// logger.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JsonLogger {
    inner: Arc<Inner>,
}

impl JsonLogger {
    /// Create a logger and spawn its writer task on the current Tokio
    /// runtime.
    ///
    /// The first file is opened before returning, so an unwritable
    /// directory is reported here.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        let config = config.normalized()?;
        let switcher = config.switch_mode.switcher();
        Self::spawn(config, switcher)
    }

    /// Like [`JsonLogger::new`] but with a custom rotation policy. The
    /// config's `switch_mode` is ignored.
    pub fn with_switcher(
        config: LoggerConfig,
        switcher: Arc<dyn Switcher>,
    ) -> Result<Self, LoggerError> {
        Self::spawn(config.normalized()?, switcher)
    }

    fn spawn(config: LoggerConfig, switcher: Arc<dyn Switcher>) -> Result<Self, LoggerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LoggerError::NoRuntime)?;

        let stats = Arc::new(Stats::default());
        let spec = FileSpec {
            base_dir: config.base_dir.clone(),
            extension: config.file_extension.clone(),
            compress: config.compress,
            buffer_size: config.write_buffer_size,
        };
        let writer = Writer::open(spec, switcher, Arc::clone(&stats))?;
        let first_path = writer.current_path();

        let (sender, records) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, shutdown) = oneshot::channel();
        let (state_tx, state) = watch::channel(WriterState::Running);
        let closed = Arc::new(AtomicBool::new(false));

        runtime.spawn(writer.run(
            config.flush_interval,
            WriterChannels {
                records,
                shutdown,
                state: state_tx,
                closed: Arc::clone(&closed),
            },
        ));

        tracing::debug!(
            base_dir = %config.base_dir.display(),
            switch_mode = %config.switch_mode,
            compress = config.compress,
            "json logger started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                sender,
                closed,
                shutdown: Mutex::new(Some(shutdown_tx)),
                state,
                stats,
                first_path,
            }),
        })
    }

    /// Queue a record, waiting for space while the queue is full.
    ///
    /// Returns [`LoggerError::Closed`] once close has been requested,
    /// including for callers that were already waiting for space.
    pub async fn submit(&self, record: Record) -> Result<(), LoggerError> {
        if self.is_closed() {
            return Err(LoggerError::Closed);
        }
        self.inner
            .sender
            .send(record)
            .await
            .map_err(|_| LoggerError::Closed)?;
        Stats::incr(&self.inner.stats.submitted);
        Ok(())
    }

    /// Blocking form of [`JsonLogger::submit`] for plain threads.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn submit_blocking(&self, record: Record) -> Result<(), LoggerError> {
        if self.is_closed() {
            return Err(LoggerError::Closed);
        }
        self.inner
            .sender
            .blocking_send(record)
            .map_err(|_| LoggerError::Closed)?;
        Stats::incr(&self.inner.stats.submitted);
        Ok(())
    }

    /// Queue a record without waiting. A full queue drops it and returns
    /// [`LoggerError::QueueFull`].
    pub fn try_submit(&self, record: Record) -> Result<(), LoggerError> {
        if self.is_closed() {
            return Err(LoggerError::Closed);
        }
        match self.inner.sender.try_send(record) {
            Ok(()) => {
                Stats::incr(&self.inner.stats.submitted);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(LoggerError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(LoggerError::Closed),
        }
    }

    /// Stop accepting records, drain the queue, flush and close the file.
    ///
    /// Safe to call any number of times from any number of handles; every
    /// call waits until the writer has finished.
    pub async fn close(&self) -> Result<(), LoggerError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        let signal = self
            .inner
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(signal) = signal {
            // The writer may already be gone after a failed rotation.
            let _ = signal.send(());
        }

        let mut state = self.inner.state.clone();
        let final_state = state
            .wait_for(WriterState::is_terminal)
            .await
            .map(|s| WriterState::clone(&s))
            .map_err(|_| LoggerError::WriterGone)?;

        match final_state {
            WriterState::Failed(e) => Err(LoggerError::Rotation(e)),
            _ => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WriterState {
        WriterState::clone(&self.inner.state.borrow())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.inner.config
    }

    /// Path of the file opened at construction.
    pub fn first_path(&self) -> Option<&std::path::Path> {
        self.inner.first_path.as_deref()
    }
}

impl std::fmt::Debug for JsonLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLogger")
            .field("base_dir", &self.inner.config.base_dir)
            .field("closed", &self.is_closed())
            .finish()
    }
}
