//! JSONL (JSON Lines) storage.
//!
//! One JSON object per line. Normalized matches are kept in this format so a
//! single corrupt record costs one line, not the whole file.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::StorageError;

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Write records, replacing the entire file.
    pub fn write_all(&self, records: &[T]) -> Result<usize, StorageError> {
        super::ensure_parent(&self.path)?;

        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);

        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
        }

        writer.flush()?;
        info!("Wrote {} records to {:?}", records.len(), self.path);

        Ok(records.len())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Read every parseable record. Unparseable lines are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Err(StorageError::PathNotFound(self.path.clone()));
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {:?}: {}",
                        index + 1,
                        self.path,
                        e
                    );
                }
            }
        }

        debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }
}

/// Whether a path should be treated as JSON Lines.
pub fn is_jsonl(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Record {
        id: u64,
        name: String,
    }

    fn records() -> Vec<Record> {
        vec![
            Record {
                id: 1,
                name: "Alice".to_string(),
            },
            Record {
                id: 2,
                name: "Bob".to_string(),
            },
        ]
    }

    #[test]
    fn test_write_and_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("records.jsonl");

        let written = JsonlWriter::new(&path).write_all(&records()).unwrap();
        assert_eq!(written, 2);

        let read: Vec<Record> = JsonlReader::new(&path).read_all().unwrap();
        assert_eq!(read, records());
    }

    #[test]
    fn test_write_all_replaces_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("records.jsonl");
        let writer = JsonlWriter::new(&path);

        writer.write_all(&records()).unwrap();
        writer.write_all(&records()[..1]).unwrap();

        let read: Vec<Record> = JsonlReader::new(&path).read_all().unwrap();
        assert_eq!(read.len(), 1);
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("records.jsonl");
        fs::write(
            &path,
            "{\"id\":1,\"name\":\"Alice\"}\nnot json\n\n{\"id\":2,\"name\":\"Bob\"}\n",
        )
        .unwrap();

        let read: Vec<Record> = JsonlReader::new(&path).read_all().unwrap();
        assert_eq!(read, records());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let reader: JsonlReader<Record> = JsonlReader::new(temp.path().join("missing.jsonl"));
        assert!(matches!(
            reader.read_all(),
            Err(StorageError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_is_jsonl() {
        assert!(is_jsonl(Path::new("data/matches.jsonl")));
        assert!(is_jsonl(Path::new("MATCHES.JSONL")));
        assert!(!is_jsonl(Path::new("data/matches.json")));
        assert!(!is_jsonl(Path::new("data/matches")));
    }
}
