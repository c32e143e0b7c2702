use crate::record::Record;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "gzip")]
use flate2::{write::GzEncoder, Compression};

/// Error type returned by [`LogFile`] operations.
#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("gzip support is disabled (build with the `gzip` feature)")]
    GzipDisabled,
}

/// Innermost layer of a [`LogFile`]: a byte sink that can be made durable.
pub trait SyncWrite: Write + Send {
    /// Persist written data (`fdatasync` for files).
    fn sync_data(&self) -> io::Result<()>;

    /// Persist data and metadata (`fsync` for files).
    fn sync_all(&self) -> io::Result<()>;
}

impl SyncWrite for File {
    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&self) -> io::Result<()> {
        File::sync_all(self)
    }
}

/// Writer stack bound to one physical file: `file <- buffer [<- gzip]`.
enum Layers<W: SyncWrite> {
    Plain(BufWriter<W>),
    #[cfg(feature = "gzip")]
    Gzip(GzEncoder<BufWriter<W>>),
}

impl<W: SyncWrite> Layers<W> {
    fn outer(&mut self) -> &mut dyn Write {
        match self {
            Layers::Plain(w) => w,
            #[cfg(feature = "gzip")]
            Layers::Gzip(w) => w,
        }
    }
}

/// One open log file owned by the writer loop.
///
/// Records are encoded as JSON lines into the outermost layer. `flush`
/// drains every layer in order and then syncs the file; `close` also
/// writes the gzip trailer.
pub struct LogFile<W: SyncWrite = File> {
    path: PathBuf,
    layers: Layers<W>,
    line: Vec<u8>,
    dirty: bool,
}

impl LogFile<File> {
    /// Create a new file at `{stem}{ext}`, moving any existing file aside.
    ///
    /// `stem` is the full path without extension and `ext` includes the
    /// leading dot (and `.gz` when compressed). See [`claim_path`] for the
    /// naming rules.
    pub fn open(
        stem: &Path,
        ext: &str,
        compress: bool,
        buffer_size: usize,
    ) -> Result<Self, FileError> {
        if let Some(dir) = stem.parent() {
            fs::create_dir_all(dir).map_err(|source| FileError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let path = claim_path(stem, ext)?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| FileError::Open {
                path: path.clone(),
                source,
            })?;

        match Self::from_writer(path.clone(), file, compress, buffer_size) {
            Ok(file) => {
                tracing::debug!(path = %path.display(), compress, "opened log file");
                Ok(file)
            }
            Err(e) => {
                let _ = fs::remove_file(&path);
                Err(e)
            }
        }
    }
}

impl<W: SyncWrite> LogFile<W> {
    /// Stack the buffer (and gzip) layers over an already open sink.
    pub fn from_writer(
        path: PathBuf,
        inner: W,
        compress: bool,
        buffer_size: usize,
    ) -> Result<Self, FileError> {
        let buf = BufWriter::with_capacity(buffer_size, inner);

        let layers = if compress {
            #[cfg(feature = "gzip")]
            {
                Layers::Gzip(GzEncoder::new(buf, Compression::default()))
            }

            #[cfg(not(feature = "gzip"))]
            {
                drop(buf);
                return Err(FileError::GzipDisabled);
            }
        } else {
            Layers::Plain(buf)
        };

        Ok(Self {
            path,
            layers,
            line: Vec::with_capacity(256),
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Append `record` as one JSON line.
    ///
    /// The line is encoded into a scratch buffer first, so an encode error
    /// never leaves a partial line in the file.
    pub fn write(&mut self, record: &Record) -> Result<(), FileError> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, record)?;
        self.line.push(b'\n');
        self.dirty = true;
        self.layers.outer().write_all(&self.line)?;
        Ok(())
    }

    /// Flush every layer and sync the file. No-op when nothing was written.
    ///
    /// On error `dirty` stays set so the next flush retries.
    pub fn flush(&mut self) -> Result<(), FileError> {
        if !self.dirty {
            return Ok(());
        }
        match &mut self.layers {
            Layers::Plain(buf) => {
                buf.flush()?;
                buf.get_ref().sync_data()?;
            }
            #[cfg(feature = "gzip")]
            Layers::Gzip(gz) => {
                // Sync-flushes the deflate stream and the buffer beneath it.
                gz.flush()?;
                let buf = gz.get_mut();
                buf.flush()?;
                buf.get_ref().sync_data()?;
            }
        }
        self.dirty = false;
        Ok(())
    }

    /// Finalize and close the file.
    ///
    /// A compressed file always gets a valid gzip trailer, even when no
    /// record was written.
    pub fn close(self) -> Result<(), FileError> {
        let mut buf = match self.layers {
            Layers::Plain(buf) => buf,
            #[cfg(feature = "gzip")]
            Layers::Gzip(mut gz) => {
                gz.flush()?;
                gz.finish()?
            }
        };
        buf.flush()?;
        let inner = buf.into_inner().map_err(|e| FileError::Io(e.into_error()))?;
        inner.sync_all()?;
        tracing::debug!(path = %self.path.display(), "closed log file");
        Ok(())
    }
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn numbered(stem: &Path, n: u32, ext: &str) -> PathBuf {
    with_suffix(stem, &format!(".{n:02}{ext}"))
}

fn first_free(stem: &Path, ext: &str, from: u32) -> PathBuf {
    let mut n = from;
    loop {
        let candidate = numbered(stem, n, ext);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Pick the path for a new file and move a colliding file out of the way.
///
/// - `{stem}{ext}` free and no `{stem}.01{ext}`: use `{stem}{ext}`.
/// - `{stem}{ext}` exists: rename it to the first free `{stem}.NN{ext}`
///   (from `01`) and use the next free number after it.
/// - `{stem}{ext}` free but numbered siblings exist: use the first free
///   `{stem}.NN{ext}`.
pub fn claim_path(stem: &Path, ext: &str) -> Result<PathBuf, FileError> {
    let bare = with_suffix(stem, ext);
    if bare.exists() {
        let aside = first_free(stem, ext, 1);
        fs::rename(&bare, &aside).map_err(|source| FileError::Rename {
            from: bare.clone(),
            to: aside.clone(),
            source,
        })?;
        tracing::info!(from = %bare.display(), to = %aside.display(), "moved existing log file aside");
        return Ok(first_free(stem, ext, 2));
    }
    if numbered(stem, 1, ext).exists() {
        return Ok(first_free(stem, ext, 1));
    }
    Ok(bare)
}

/// In-memory sink whose writes can be made to fail a given number of times.
#[cfg(test)]
pub(crate) mod flaky {
    use super::SyncWrite;
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct FlakySink {
        data: Arc<Mutex<Vec<u8>>>,
        failures: Arc<AtomicUsize>,
        syncs: Arc<AtomicUsize>,
    }

    impl FlakySink {
        /// Make the next `n` writes fail without consuming any byte.
        pub fn fail_next(&self, n: usize) {
            self.failures.store(n, Ordering::SeqCst);
        }

        pub fn contents(&self) -> String {
            String::from_utf8(self.data.lock().unwrap().clone()).unwrap()
        }

        pub fn syncs(&self) -> usize {
            self.syncs.load(Ordering::SeqCst)
        }
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(io::Error::new(io::ErrorKind::Other, "disk unavailable"));
            }
            self.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SyncWrite for FlakySink {
        fn sync_data(&self) -> io::Result<()> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn sync_all(&self) -> io::Result<()> {
            self.sync_data()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use std::io::Read;
    use tempfile::TempDir;

    fn lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn writes_json_lines_after_flush() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("2024-01-01");
        let mut file = LogFile::open(&stem, ".log", false, 4096).unwrap();
        assert_eq!(file.path(), dir.path().join("2024-01-01.log"));

        file.write(&record! { "Time" => 1, "Msg" => "a" }).unwrap();
        file.write(&record! { "Time" => 2, "Msg" => "b" }).unwrap();
        assert!(file.is_dirty());
        file.flush().unwrap();
        assert!(!file.is_dirty());

        let got = lines(&dir.path().join("2024-01-01.log"));
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], serde_json::json!({"Time": 1, "Msg": "a"}));
        assert_eq!(got[1], serde_json::json!({"Time": 2, "Msg": "b"}));
        file.close().unwrap();
    }

    #[test]
    fn flush_without_writes_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut file = LogFile::open(&dir.path().join("x"), ".log", false, 4096).unwrap();
        file.flush().unwrap();
        assert!(!file.is_dirty());
        file.close().unwrap();
        assert_eq!(fs::metadata(dir.path().join("x.log")).unwrap().len(), 0);
    }

    #[test]
    fn creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("2024-01").join("2024-01-01").join("2024-01-01_05");
        let file = LogFile::open(&stem, ".log", false, 4096).unwrap();
        file.close().unwrap();
        assert!(dir.path().join("2024-01/2024-01-01/2024-01-01_05.log").exists());
    }

    #[test]
    fn collision_moves_existing_file_aside() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("day");
        fs::write(dir.path().join("day.log"), b"{\"old\":true}\n").unwrap();

        let mut file = LogFile::open(&stem, ".log", false, 4096).unwrap();
        assert_eq!(file.path(), dir.path().join("day.02.log"));
        file.write(&record! { "new" => true }).unwrap();
        file.close().unwrap();

        assert!(!dir.path().join("day.log").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("day.01.log")).unwrap(),
            "{\"old\":true}\n"
        );
        assert_eq!(lines(&dir.path().join("day.02.log")).len(), 1);
    }

    #[test]
    fn collision_continues_numbered_sequence() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("day");
        fs::write(dir.path().join("day.01.log"), b"a\n").unwrap();
        fs::write(dir.path().join("day.02.log"), b"b\n").unwrap();

        let file = LogFile::open(&stem, ".log", false, 4096).unwrap();
        assert_eq!(file.path(), dir.path().join("day.03.log"));
        file.close().unwrap();

        // Bare name reappears: it is numbered after the existing siblings.
        fs::write(dir.path().join("day.log"), b"c\n").unwrap();
        let file = LogFile::open(&stem, ".log", false, 4096).unwrap();
        assert_eq!(file.path(), dir.path().join("day.05.log"));
        file.close().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("day.04.log")).unwrap(), "c\n");
        assert_eq!(fs::read_to_string(dir.path().join("day.01.log")).unwrap(), "a\n");
    }

    #[test]
    fn failed_flush_keeps_buffered_lines_for_retry() {
        let sink = flaky::FlakySink::default();
        let mut file =
            LogFile::from_writer(PathBuf::from("mem.log"), sink.clone(), false, 4096).unwrap();
        file.write(&record! { "n" => 1 }).unwrap();
        file.write(&record! { "n" => 2 }).unwrap();

        sink.fail_next(1);
        assert!(matches!(file.flush(), Err(FileError::Io(_))));
        assert!(file.is_dirty());
        assert!(sink.contents().is_empty());
        assert_eq!(sink.syncs(), 0);

        file.write(&record! { "n" => 3 }).unwrap();
        file.flush().unwrap();
        assert!(!file.is_dirty());
        assert_eq!(sink.syncs(), 1);
        assert_eq!(sink.contents(), "{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n");
        file.close().unwrap();
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn gzip_round_trips_to_plain_lines() {
        use flate2::read::GzDecoder;

        let dir = TempDir::new().unwrap();
        let mut file = LogFile::open(&dir.path().join("z"), ".log.gz", true, 4096).unwrap();
        file.write(&record! { "n" => 1 }).unwrap();
        file.flush().unwrap();
        file.write(&record! { "n" => 2 }).unwrap();
        file.close().unwrap();

        let raw = fs::read(dir.path().join("z.log.gz")).unwrap();
        let mut out = String::new();
        GzDecoder::new(&raw[..]).read_to_string(&mut out).unwrap();
        assert_eq!(out, "{\"n\":1}\n{\"n\":2}\n");
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn empty_gzip_file_is_still_valid() {
        use flate2::read::GzDecoder;

        let dir = TempDir::new().unwrap();
        let file = LogFile::open(&dir.path().join("e"), ".log.gz", true, 4096).unwrap();
        file.close().unwrap();

        let raw = fs::read(dir.path().join("e.log.gz")).unwrap();
        let mut out = String::new();
        GzDecoder::new(&raw[..]).read_to_string(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
