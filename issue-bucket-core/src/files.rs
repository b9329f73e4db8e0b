//! Local file connector: CSV and JSON files inside one working directory.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::FileError;

#[derive(Debug, Clone)]
pub struct FileConnector {
    working_dir: PathBuf,
}

impl FileConnector {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.working_dir.join(file_name)
    }

    /// Read a headed CSV file into one column→value map per row.
    pub fn read_csv_records(&self, file_name: &str) -> Result<Vec<BTreeMap<String, String>>, FileError> {
        let path = self.path_of(file_name);
        let mut reader = csv::Reader::from_path(&path).map_err(|source| FileError::Csv {
            path: path.clone(),
            source,
        })?;
        let rows = reader
            .deserialize::<BTreeMap<String, String>>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| FileError::Csv {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), rows = rows.len(), "Processed {} lines.", rows.len());
        Ok(rows)
    }

    /// Serialise `value` as JSON into `file_name` and return the file path.
    pub fn save_json<T: Serialize + ?Sized>(&self, value: &T, file_name: &str) -> Result<PathBuf, FileError> {
        let path = self.prepare(file_name)?;
        let file = File::create(&path).map_err(|source| FileError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::to_writer(file, value).map_err(|source| {
            error!(path = %path.display(), error = %source, "Failed to write JSON file");
            FileError::Json {
                path: path.clone(),
                source,
            }
        })?;
        debug!(path = %path.display(), "Saved JSON file");
        Ok(path)
    }

    /// Write `rows` as CSV with a header taken from the row type's fields and
    /// return the file path. An empty slice writes an empty file.
    ///
    /// Blocks on file I/O; async callers run it through `spawn_blocking`.
    pub fn save_csv<T: Serialize>(&self, rows: &[T], file_name: &str) -> Result<PathBuf, FileError> {
        let path = self.prepare(file_name)?;
        let csv_error = |source| FileError::Csv {
            path: path.clone(),
            source,
        };
        let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
        for row in rows {
            writer.serialize(row).map_err(csv_error)?;
        }
        writer.flush().map_err(|source| FileError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), rows = rows.len(), "Saved CSV file");
        Ok(path)
    }

    fn prepare(&self, file_name: &str) -> Result<PathBuf, FileError> {
        if !self.working_dir.exists() {
            fs::create_dir_all(&self.working_dir).map_err(|source| FileError::Io {
                path: self.working_dir.clone(),
                source,
            })?;
            debug!(path = %self.working_dir.display(), "Created working directory");
        }
        Ok(self.path_of(file_name))
    }
}
