//! Incremental log file reading
//!
//! A [`LogTailer`] tracks the byte offset already consumed from one
//! append-only log file, so successive reads return only appended content.
//! Only complete (newline-terminated) lines are handed to the parser; an
//! incomplete trailing line stays on disk until the next read completes it.
//!
//! A file that shrank (log rotation) resets the offset to zero and is
//! re-read in full rather than attempting a negative-offset read.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Complete lines read since the last consumed offset.
#[derive(Debug, Default)]
pub struct TailChunk {
    /// Newline-terminated text, possibly empty
    pub text: String,
    /// Byte offset of `text` within the file
    pub base_offset: u64,
    /// True when the file shrank and the read restarted from zero
    pub truncated: bool,
}

/// Byte-offset tracker for one log file.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    offset: u64,
}

impl LogTailer {
    /// Start tracking a file from offset zero (first sighting reads fully).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of consumed content.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read all complete lines appended since the last read.
    pub fn read_new(&mut self) -> std::io::Result<TailChunk> {
        let mut file = std::fs::File::open(&self.path)?;
        let file_len = file.metadata()?.len();

        let mut truncated = false;
        if file_len < self.offset {
            tracing::debug!(
                path = %self.path.display(),
                offset = self.offset,
                size = file_len,
                "File shrank, re-reading from start"
            );
            self.offset = 0;
            truncated = true;
        }

        if file_len == self.offset {
            return Ok(TailChunk {
                base_offset: self.offset,
                truncated,
                ..TailChunk::default()
            });
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::with_capacity((file_len - self.offset) as usize);
        file.read_to_end(&mut buf)?;

        // Only hand over newline-terminated content; a partial trailing
        // line is deferred until the writer completes it.
        let complete_len = match buf.iter().rposition(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None => 0,
        };
        buf.truncate(complete_len);

        let base_offset = self.offset;
        self.offset += complete_len as u64;

        Ok(TailChunk {
            text: String::from_utf8_lossy(&buf).into_owned(),
            base_offset,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;

    fn append(path: &Path, text: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_first_read_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent-a.jsonl");
        append(&path, "one\ntwo\n");

        let mut tailer = LogTailer::new(&path);
        let chunk = tailer.read_new().unwrap();
        assert_eq!(chunk.text, "one\ntwo\n");
        assert_eq!(chunk.base_offset, 0);
        assert_eq!(tailer.offset(), 8);
    }

    #[test]
    fn test_second_read_returns_only_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent-a.jsonl");
        append(&path, "one\n");

        let mut tailer = LogTailer::new(&path);
        tailer.read_new().unwrap();

        append(&path, "two\n");
        let chunk = tailer.read_new().unwrap();
        assert_eq!(chunk.text, "two\n");
        assert_eq!(chunk.base_offset, 4);
    }

    #[test]
    fn test_incomplete_trailing_line_is_deferred() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent-a.jsonl");
        append(&path, "one\npart");

        let mut tailer = LogTailer::new(&path);
        let chunk = tailer.read_new().unwrap();
        assert_eq!(chunk.text, "one\n");
        assert_eq!(tailer.offset(), 4);

        append(&path, "ial\n");
        let chunk = tailer.read_new().unwrap();
        assert_eq!(chunk.text, "partial\n");
    }

    #[test]
    fn test_no_change_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent-a.jsonl");
        append(&path, "one\n");

        let mut tailer = LogTailer::new(&path);
        tailer.read_new().unwrap();
        let chunk = tailer.read_new().unwrap();
        assert!(chunk.text.is_empty());
        assert!(!chunk.truncated);
    }

    #[test]
    fn test_shrunken_file_resets_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent-a.jsonl");
        append(&path, "a long first generation\n");

        let mut tailer = LogTailer::new(&path);
        tailer.read_new().unwrap();

        std::fs::write(&path, "rotated\n").unwrap();
        let chunk = tailer.read_new().unwrap();
        assert!(chunk.truncated);
        assert_eq!(chunk.base_offset, 0);
        assert_eq!(chunk.text, "rotated\n");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = LogTailer::new(dir.path().join("gone.jsonl"));
        assert!(tailer.read_new().is_err());
    }
}
