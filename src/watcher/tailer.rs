//! Incremental log file tailer.
//!
//! Reads complete lines appended since the last read.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::WatcherError;

/// Identity of the file behind a path, used to notice rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    /// Identity from metadata; `None` on platforms without inode numbers.
    #[must_use]
    pub fn of(metadata: &std::fs::Metadata) -> Option<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Some(Self {
                dev: metadata.dev(),
                ino: metadata.ino(),
            })
        }
        #[cfg(not(unix))]
        {
            let _ = metadata;
            None
        }
    }
}

/// Persistent cursor over the monitored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailState {
    path: PathBuf,
    offset: u64,
    identity: Option<FileIdentity>,
}

impl TailState {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes already consumed.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// Incremental reader that tracks the consumed byte offset.
///
/// Only newline-terminated lines are consumed; a trailing partial line is
/// left in place until its terminator is written.
#[derive(Debug)]
pub struct LogTailer {
    state: TailState,
}

impl LogTailer {
    /// Create a new tailer starting at offset 0 (beginning of file).
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self::with_offset(path, 0)
    }

    /// Create a new tailer starting at a specific offset.
    #[must_use]
    pub fn with_offset(path: PathBuf, offset: u64) -> Self {
        Self {
            state: TailState {
                path,
                offset,
                identity: None,
            },
        }
    }

    /// Create a tailer positioned at the current end of the file, so that
    /// existing content is never replayed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or inspected.
    pub async fn at_end(path: PathBuf) -> Result<Self, WatcherError> {
        let file = open(&path).await?;
        let metadata = file.metadata().await?;
        Ok(Self {
            state: TailState {
                path,
                offset: metadata.len(),
                identity: FileIdentity::of(&metadata),
            },
        })
    }

    /// Get the current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.state.offset
    }

    /// Get the path being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.state.path
    }

    #[must_use]
    pub fn state(&self) -> &TailState {
        &self.state
    }

    /// Read complete lines appended since the last read.
    ///
    /// Only bytes present when the size is sampled are considered. If the
    /// file shrank below the offset, or a different file now sits at the
    /// path, reading restarts from the beginning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or an I/O error
    /// occurs. The offset is left unchanged in that case.
    pub async fn read_new_lines(&mut self) -> Result<Vec<String>, WatcherError> {
        let mut file = open(&self.state.path).await?;
        let metadata = file.metadata().await?;
        let file_len = metadata.len();
        let identity = FileIdentity::of(&metadata);

        let mut offset = self.state.offset;
        if self.state.identity.is_some() && identity != self.state.identity {
            tracing::warn!(
                path = %self.state.path.display(),
                old_offset = offset,
                new_len = file_len,
                "File replaced, reading new file from the start"
            );
            offset = 0;
        } else if file_len < offset {
            tracing::warn!(
                path = %self.state.path.display(),
                old_offset = offset,
                new_len = file_len,
                "File truncated, resetting offset to 0"
            );
            offset = 0;
        }

        if file_len == offset {
            self.state.offset = offset;
            self.state.identity = identity;
            return Ok(Vec::new());
        }

        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = Vec::new();
        file.take(file_len - offset).read_to_end(&mut buf).await?;

        self.state.identity = identity;
        let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
            // Nothing complete yet.
            self.state.offset = offset;
            return Ok(Vec::new());
        };

        let complete = &buf[..=last_newline];
        self.state.offset = offset + complete.len() as u64;

        let lines = complete[..last_newline]
            .split(|&b| b == b'\n')
            .map(|raw| {
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                String::from_utf8_lossy(raw).into_owned()
            })
            .collect();
        Ok(lines)
    }
}

async fn open(path: &Path) -> Result<File, WatcherError> {
    match File::open(path).await {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(WatcherError::FileMissing(path.to_path_buf()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(WatcherError::PermissionDenied(path.to_path_buf()))
        }
        Err(e) => Err(WatcherError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_tailer_reads_initial_content() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        writeln!(file, "second").unwrap();
        file.flush().unwrap();

        let mut tailer = LogTailer::new(file.path().to_path_buf());
        let lines = tailer.read_new_lines().await.unwrap();

        assert_eq!(lines, vec!["first", "second"]);
        assert_eq!(tailer.offset(), 13);
    }

    #[tokio::test]
    async fn test_tailer_reads_only_new_lines() {
        let file = NamedTempFile::new().unwrap();
        append(file.path(), "one\n");

        let mut tailer = LogTailer::new(file.path().to_path_buf());
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["one"]);
        let offset_after_first = tailer.offset();

        // Repeated reads without growth deliver nothing.
        assert!(tailer.read_new_lines().await.unwrap().is_empty());
        assert!(tailer.read_new_lines().await.unwrap().is_empty());
        assert_eq!(tailer.offset(), offset_after_first);

        append(file.path(), "two\nthree\nfour\n");
        let lines = tailer.read_new_lines().await.unwrap();
        assert_eq!(lines, vec!["two", "three", "four"]);
    }

    #[tokio::test]
    async fn test_tailer_withholds_partial_line() {
        let file = NamedTempFile::new().unwrap();
        let mut tailer = LogTailer::new(file.path().to_path_buf());

        append(file.path(), "complete\npart");
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["complete"]);
        assert_eq!(tailer.offset(), 9);

        // Still incomplete.
        assert!(tailer.read_new_lines().await.unwrap().is_empty());
        assert_eq!(tailer.offset(), 9);

        append(file.path(), "ial\r\n");
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["partial"]);
        assert_eq!(tailer.offset(), 18);
    }

    #[tokio::test]
    async fn test_tailer_at_end_skips_existing_content() {
        let file = NamedTempFile::new().unwrap();
        append(file.path(), "old entry\n");

        let mut tailer = LogTailer::at_end(file.path().to_path_buf()).await.unwrap();
        assert_eq!(tailer.offset(), 10);
        assert!(tailer.read_new_lines().await.unwrap().is_empty());

        append(file.path(), "new entry\n");
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["new entry"]);
    }

    #[tokio::test]
    async fn test_tailer_handles_truncation() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        append(&path, "a long first line\nanother long line\n");

        let mut tailer = LogTailer::new(path.clone());
        assert_eq!(tailer.read_new_lines().await.unwrap().len(), 2);
        let old_offset = tailer.offset();

        // Truncate in place and write shorter content.
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "short").unwrap();
        }

        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["short"]);
        assert_eq!(tailer.offset(), 6);
        assert!(tailer.offset() < old_offset);
        assert!(tailer.read_new_lines().await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tailer_detects_replaced_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "x\n").unwrap();

        let mut tailer = LogTailer::at_end(path.clone()).await.unwrap();
        assert_eq!(tailer.offset(), 2);

        // Rotate: move the old file away and start a new, larger one.
        std::fs::rename(&path, dir.path().join("app.log.1")).unwrap();
        std::fs::write(&path, "fresh one\nfresh two\n").unwrap();

        let lines = tailer.read_new_lines().await.unwrap();
        assert_eq!(lines, vec!["fresh one", "fresh two"]);
    }

    #[tokio::test]
    async fn test_tailer_handles_missing_file() {
        let path = PathBuf::from("/tmp/nonexistent-log-issue-monitor-12345.log");
        let mut tailer = LogTailer::with_offset(path, 7);

        let result = tailer.read_new_lines().await;
        assert!(matches!(result, Err(WatcherError::FileMissing(_))));
        assert_eq!(tailer.offset(), 7);
    }

    #[test]
    fn test_tailer_with_offset() {
        let tailer = LogTailer::with_offset(PathBuf::from("/tmp/test.log"), 1024);
        assert_eq!(tailer.offset(), 1024);
        assert_eq!(tailer.state().path(), Path::new("/tmp/test.log"));
    }
}
