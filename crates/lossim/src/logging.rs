use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_NAME: &str = "lossim.log";

/// Maximum log file size before rotation (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Size to keep after rotation (1 MB of most recent logs)
const KEEP_SIZE: u64 = 1024 * 1024;

const ROTATION_MARKER: &[u8] = b"--- Log rotated (older entries removed) ---\n";

/// The complete lines within the last `keep` bytes of `file`, which is `len` bytes long
fn trailing_lines(file: &mut File, len: u64, keep: u64) -> io::Result<Vec<u8>> {
    let cut = len.saturating_sub(keep);
    if cut == 0 {
        let mut whole = Vec::with_capacity(len as usize);
        file.read_to_end(&mut whole)?;
        return Ok(whole);
    }

    // Read one byte early so a cut that lands on a line start keeps that line
    file.seek(SeekFrom::Start(cut - 1))?;
    let mut tail = Vec::with_capacity(keep as usize + 1);
    file.take(keep + 1).read_to_end(&mut tail)?;
    let first_line = tail.iter().position(|&b| b == b'\n').map_or(tail.len(), |nl| nl + 1);
    tail.drain(..first_line);
    Ok(tail)
}

/// Once `log_path` grows past `max` bytes, replace it with a rotation marker
/// followed by the whole lines among its last `keep` bytes.
fn rotate_log(log_path: &Path, max: u64, keep: u64) -> io::Result<()> {
    let len = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if len <= max {
        return Ok(());
    }

    let tail = trailing_lines(&mut File::open(log_path)?, len, keep)?;
    fs::write(log_path, [ROTATION_MARKER, tail.as_slice()].concat())
}

/// A writer factory that produces writers for the shared log file
#[derive(Clone)]
struct LogWriterFactory {
    file: Arc<Mutex<File>>,
}

/// A writer that holds a reference to the shared file
struct LogWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Filter used when `RUST_LOG` is unset
fn default_filter(level: &str) -> String {
    format!("lossim={level},lossim_core={level}")
}

/// Initialize logging to `{data_dir}/lossim.log`.
///
/// The file is rotated before opening: past 5MB only the last 1MB is kept.
/// `RUST_LOG` takes precedence over `level`. Returns the log file path.
pub fn init_logging(data_dir: &Path, level: &str) -> color_eyre::Result<PathBuf> {
    fs::create_dir_all(data_dir)?;

    let log_path = data_dir.join(LOG_FILE_NAME);

    if let Err(e) = rotate_log(&log_path, MAX_LOG_SIZE, KEEP_SIZE) {
        eprintln!("Warning: Failed to rotate log file: {e}");
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(LogWriterFactory {
                    file: Arc::new(Mutex::new(file)),
                })
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true),
        )
        .try_init()?;

    tracing::info!(log_path = %log_path.display(), "lossim logging initialized");
    Ok(log_path)
}
