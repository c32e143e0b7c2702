use crate::file::{FileError, LogFile, SyncWrite};
use crate::record::Record;
use crate::stats::Stats;
use crate::switcher::Switcher;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Lifecycle of the writer task, broadcast to every logger handle.
#[derive(Debug, Clone)]
pub enum WriterState {
    /// Accepting and writing records.
    Running,
    /// Shutdown requested; queued records are being written out.
    Draining,
    /// Queue drained and the last file closed.
    Stopped,
    /// A rotation could not open a new file. Nothing is written any more.
    Failed(Arc<FileError>),
}

impl WriterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WriterState::Stopped | WriterState::Failed(_))
    }
}

/// Where and how files are created.
#[derive(Debug, Clone)]
pub(crate) struct FileSpec {
    pub base_dir: PathBuf,
    pub extension: String,
    pub compress: bool,
    pub buffer_size: usize,
}

/// Channels the writer task consumes and publishes on.
pub(crate) struct WriterChannels {
    pub records: mpsc::Receiver<Record>,
    pub shutdown: oneshot::Receiver<()>,
    pub state: watch::Sender<WriterState>,
    pub closed: Arc<AtomicBool>,
}

/// Sole owner of the current [`LogFile`].
pub(crate) struct Writer<W: SyncWrite = File> {
    spec: FileSpec,
    switcher: Arc<dyn Switcher>,
    file: Option<LogFile<W>>,
    stats: Arc<Stats>,
    /// First rotation deadline, fixed together with the first file name.
    rotate_at: Instant,
}

impl Writer<File> {
    /// Open the first file synchronously so that a bad directory fails the
    /// caller instead of the background task.
    ///
    /// The first rotation deadline is taken here as well, just before the
    /// first name. If the task is only polled after that boundary, the
    /// rotation ticker fires at once.
    pub fn open(
        spec: FileSpec,
        switcher: Arc<dyn Switcher>,
        stats: Arc<Stats>,
    ) -> Result<Self, FileError> {
        let rotate_at = Instant::now() + switcher.first_delay();
        let mut writer = Self {
            spec,
            switcher,
            file: None,
            stats,
            rotate_at,
        };
        writer.file = Some(writer.open_current()?);
        Ok(writer)
    }

    fn open_current(&self) -> Result<LogFile, FileError> {
        let (dir, stem) = self.switcher.target_path(&self.spec.base_dir);
        LogFile::open(
            &dir.join(stem),
            &self.spec.extension,
            self.spec.compress,
            self.spec.buffer_size,
        )
    }

    /// Close the current file and open the one for the new period.
    fn rotate(&mut self) -> Result<(), FileError> {
        let old = self.current_path();
        self.close_current();
        let file = self.open_current()?;
        tracing::info!(
            old = ?old.as_ref().map(|p| p.display().to_string()),
            new = %file.path().display(),
            "log file rotated"
        );
        self.file = Some(file);
        Stats::incr(&self.stats.rotations);
        Ok(())
    }

    /// Main loop: multiplex records, flush ticks, rotation ticks and the
    /// shutdown signal, then drain and close.
    pub async fn run(mut self, flush_interval: Duration, channels: WriterChannels) {
        let WriterChannels {
            mut records,
            mut shutdown,
            state,
            closed,
        } = channels;

        let mut flush_ticker = interval_at(Instant::now() + flush_interval, flush_interval);
        flush_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Only the first boundary comes from the wall clock.
        let period = self.switcher.next_interval().max(Duration::from_millis(1));
        let mut rotate_ticker = interval_at(self.rotate_at, period);
        rotate_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                received = records.recv() => match received {
                    Some(record) => self.write(&record),
                    // Every handle dropped without close.
                    None => break Ok(()),
                },
                _ = flush_ticker.tick() => self.flush(),
                _ = rotate_ticker.tick() => {
                    if let Err(e) = self.rotate() {
                        break Err(e);
                    }
                }
                _ = &mut shutdown => break Ok(()),
            }
        };

        // From here on every send fails fast, including senders already
        // waiting for capacity.
        closed.store(true, Ordering::SeqCst);
        records.close();

        match outcome {
            Ok(()) => {
                state.send_replace(WriterState::Draining);
                let mut drained = 0u64;
                while let Some(record) = records.recv().await {
                    self.write(&record);
                    drained += 1;
                }
                self.close_current();
                tracing::debug!(drained, "log writer stopped");
                state.send_replace(WriterState::Stopped);
            }
            Err(e) => {
                let mut lost = 0u64;
                while records.try_recv().is_ok() {
                    lost += 1;
                }
                tracing::error!(error = %e, lost, "log rotation failed, writer stopped");
                state.send_replace(WriterState::Failed(Arc::new(e)));
            }
        }
    }
}

impl<W: SyncWrite> Writer<W> {
    pub fn current_path(&self) -> Option<PathBuf> {
        self.file.as_ref().map(|f| f.path().to_path_buf())
    }

    fn write(&mut self, record: &Record) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        match file.write(record) {
            Ok(()) => Stats::incr(&self.stats.written),
            Err(FileError::Encode(e)) => {
                Stats::incr(&self.stats.encode_errors);
                tracing::warn!(error = %e, "dropping record that failed to encode");
            }
            Err(e) => {
                Stats::incr(&self.stats.write_errors);
                tracing::error!(path = %file.path().display(), error = %e, "log write failed");
            }
        }
    }

    fn flush(&mut self) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if !file.is_dirty() {
            return;
        }
        match file.flush() {
            Ok(()) => Stats::incr(&self.stats.flushes),
            Err(e) => {
                // Dirty stays set; the next tick retries.
                Stats::incr(&self.stats.flush_errors);
                tracing::error!(path = %file.path().display(), error = %e, "log flush failed");
            }
        }
    }

    fn close_current(&mut self) {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                tracing::error!(path = %path.display(), error = %e, "log close failed");
            }
        }
    }
}
