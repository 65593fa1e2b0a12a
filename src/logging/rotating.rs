//! Size-bounded append-only log file with a single backup generation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

/// Rotation threshold for the activity log (50 MiB).
pub const MAX_LOG_SIZE: u64 = 50 * 1024 * 1024;

/// Append-only file that moves itself to `<path>.1` once the next write would
/// push it past `max_size`.
///
/// The current size is read from the file on every write, so appends or
/// truncations made by other processes are taken into account. An empty
/// active file is never rotated, even when a single write exceeds the limit.
#[derive(Debug)]
pub struct RotatingWriter {
    path: PathBuf,
    backup: PathBuf,
    max_size: u64,
    file: File,
}

impl RotatingWriter {
    /// Open (or create) the active file in append mode.
    pub fn open<P: AsRef<Path>>(path: P, max_size: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut backup = path.clone().into_os_string();
        backup.push(".1");

        Ok(Self {
            path,
            backup: PathBuf::from(backup),
            max_size,
            file,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        // rename() replaces an existing backup atomically on unix
        match fs::rename(&self.path, &self.backup) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .truncate(false)
            .open(&self.path)?;
        self.file.set_len(0)?;
        Ok(())
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let size = self.file.metadata()?.len();
        if size > 0 && size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Shared handle to the process-wide log file.
///
/// Every record is written under one lock, so a record and the rotation it
/// may trigger never interleave with writes from other tasks.
#[derive(Clone, Debug)]
pub struct LogSink {
    inner: Arc<Mutex<RotatingWriter>>,
}

impl LogSink {
    pub fn open<P: AsRef<Path>>(path: P, max_size: u64) -> io::Result<Self> {
        let writer = RotatingWriter::open(path, max_size)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(writer)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotatingWriter> {
        // A panic mid-write leaves at worst a partial line; keep logging.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Locked writer handed to the `tracing` file layer for a single event.
pub struct LogSinkWriter<'a> {
    guard: MutexGuard<'a, RotatingWriter>,
}

impl Write for LogSinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogSinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogSinkWriter { guard: self.lock() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_open_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portwatch.log");
        fs::write(&path, "earlier\n").unwrap();

        let mut writer = RotatingWriter::open(&path, 14).unwrap();
        // existing content counts towards the limit
        writer.write_all(b"later\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
        assert!(!dir.path().join("portwatch.log.1").exists());

        writer.write_all(b"!").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "!");
    }

    #[test]
    fn test_rotates_before_write_that_would_exceed_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portwatch.log");
        let backup = dir.path().join("portwatch.log.1");

        let mut writer = RotatingWriter::open(&path, 20).unwrap();
        writer.write_all(b"0123456789").unwrap();
        writer.write_all(b"abcdefghij").unwrap();
        // exactly at the limit, no rotation yet
        assert_eq!(fs::metadata(&path).unwrap().len(), 20);
        assert!(!backup.exists());

        writer.write_all(b"X").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "X");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "0123456789abcdefghij");
    }

    #[test]
    fn test_keeps_single_backup_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portwatch.log");

        let mut writer = RotatingWriter::open(&path, 8).unwrap();
        writer.write_all(b"first..\n").unwrap();
        writer.write_all(b"second.\n").unwrap();
        writer.write_all(b"third..\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "third..\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("portwatch.log.1")).unwrap(),
            "second.\n"
        );

        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn test_oversized_write_on_empty_file_does_not_rotate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portwatch.log");
        let backup = dir.path().join("portwatch.log.1");
        fs::write(&backup, "previous generation").unwrap();

        let mut writer = RotatingWriter::open(&path, 4).unwrap();
        writer.write_all(b"longer than four").unwrap();

        assert_eq!(fs::read_to_string(&backup).unwrap(), "previous generation");
        assert_eq!(fs::read_to_string(&path).unwrap(), "longer than four");
    }

    #[test]
    fn test_rotation_follows_size_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portwatch.log");
        let backup = dir.path().join("portwatch.log.1");

        let mut writer = RotatingWriter::open(&path, 20).unwrap();
        writer.write_all(b"0123456789abcde").unwrap();

        // truncated behind our back (logrotate copytruncate)
        OpenOptions::new().write(true).open(&path).unwrap().set_len(0).unwrap();
        writer.write_all(b"after-trunc").unwrap();
        assert!(!backup.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "after-trunc");

        // another process appends
        let mut other = OpenOptions::new().append(true).open(&path).unwrap();
        other.write_all(b"other").unwrap();
        writer.write_all(b"12345").unwrap();

        assert_eq!(fs::read_to_string(&backup).unwrap(), "after-truncother");
        assert_eq!(fs::read_to_string(&path).unwrap(), "12345");
    }

    #[test]
    fn test_sink_serializes_concurrent_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portwatch.log");
        let sink = LogSink::open(&path, 4096).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let sink = sink.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let line = format!("worker={} seq={:03} ................\n", worker, i);
                        tokio_test::assert_ok!(sink.make_writer().write_all(line.as_bytes()));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let backup = dir.path().join("portwatch.log.1");
        let mut lines = 0;
        for file in [&path, &backup] {
            let content = fs::read_to_string(file).unwrap_or_default();
            for line in content.lines() {
                assert!(line.starts_with("worker="), "corrupted line: {:?}", line);
                assert!(line.ends_with("................"), "corrupted line: {:?}", line);
                lines += 1;
            }
        }
        // one backup generation: older lines may be gone, never mangled
        assert!(lines > 0);
        assert!(fs::metadata(&path).unwrap().len() <= 4096);
    }

    #[test]
    fn test_clones_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portwatch.log");
        let sink = LogSink::open(&path, 1024).unwrap();

        sink.make_writer().write_all(b"first event\n").unwrap();
        let clone = sink.clone();
        clone.make_writer().write_all(b"second event\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first event\nsecond event\n");
    }
}
