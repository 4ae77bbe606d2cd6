//! Record persistence
//!
//! Extracted article records are appended to a newline-delimited JSON file,
//! one object per line. The file is shared by every extractor worker, so the
//! writer serializes each record to a complete line first and then writes and
//! flushes it under an exclusive lock; concurrent appends can never interleave
//! partial lines.
//!
//! Records are append-only: once written, a line is never modified or removed.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the output file inside the configured output directory
pub const RECORD_FILE_NAME: &str = "crawled_pages.json";

/// Errors that can occur while persisting records
///
/// Unlike fetch and extraction failures, these are not recoverable per-page:
/// a sink that stopped accepting writes loses data silently if the crawl
/// continues, so the worker that hits one aborts the run.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error on record file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One extracted article, as serialized into the output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Publish time, formatted as `YYYY-MM-DDTHH:MM:SS+ZZ:ZZ`
    pub created_at: String,

    /// Normalized URL of the page the record was extracted from
    pub url: String,

    pub title: String,
    pub description: String,

    /// Lead image URL, or the site's fallback image if none was found
    pub image: String,
}

/// Append-only newline-delimited JSON sink
pub struct RecordWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RecordWriter {
    /// Opens (or creates) the record file inside `directory`
    ///
    /// The directory is created if it does not exist. The file is opened in
    /// append mode, so records from an earlier run in the same directory are
    /// preserved.
    pub fn create(directory: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(RECORD_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Serializes the record and appends it as one line
    ///
    /// The line is built in full before the lock is taken; the write and
    /// flush happen as a single critical section.
    pub fn append(&self, record: &ExtractedRecord) -> StorageResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().expect("record file lock poisoned");
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    /// Path of the record file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_record(n: usize) -> ExtractedRecord {
        ExtractedRecord {
            created_at: "2022-08-05T13:30:00+06:00".to_string(),
            url: format!("https://site.test/news/{}", n),
            title: format!("Title {}", n),
            description: "Body text".to_string(),
            image: "https://site.test/img.png".to_string(),
        }
    }

    #[test]
    fn test_append_writes_one_line_per_record() {
        let tmp = TempDir::new().unwrap();
        let writer = RecordWriter::create(tmp.path()).unwrap();

        writer.append(&sample_record(1)).unwrap();
        writer.append(&sample_record(2)).unwrap();

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: ExtractedRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, sample_record(1));
    }

    #[test]
    fn test_record_key_names() {
        let json = serde_json::to_value(sample_record(7)).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["created_at", "url", "title", "description", "image"] {
            assert!(obj.contains_key(key), "missing key {}", key);
        }
        assert_eq!(obj.len(), 5);
    }

    #[test]
    fn test_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        let writer = RecordWriter::create(&nested).unwrap();
        writer.append(&sample_record(1)).unwrap();
        assert!(nested.join(RECORD_FILE_NAME).exists());
    }

    #[test]
    fn test_append_mode_preserves_existing_lines() {
        let tmp = TempDir::new().unwrap();
        {
            let writer = RecordWriter::create(tmp.path()).unwrap();
            writer.append(&sample_record(1)).unwrap();
        }
        {
            let writer = RecordWriter::create(tmp.path()).unwrap();
            writer.append(&sample_record(2)).unwrap();
        }
        let content = std::fs::read_to_string(tmp.path().join(RECORD_FILE_NAME)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_concurrent_appends_never_interleave() {
        let tmp = TempDir::new().unwrap();
        let writer = Arc::new(RecordWriter::create(tmp.path()).unwrap());

        let mut handles = Vec::new();
        for t in 0..8 {
            let writer = Arc::clone(&writer);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    writer.append(&sample_record(t * 100 + i)).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 8 * 50);
        // Every line must parse back as a complete record
        for line in lines {
            let _: ExtractedRecord = serde_json::from_str(line).unwrap();
        }
    }
}
