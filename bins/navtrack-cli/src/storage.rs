//! CSV persistence for recorded fixes.
//!
//! Files live in a single output directory and hold one fix per row in
//! the column order: timestamp, latitude, longitude, altitude, speed,
//! course, satellites, quality. Append mode keeps the existing header.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use navtrack_core::GpsFix;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised by CSV storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failure on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV format failure on {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// CSV-backed fix storage rooted at one directory.
pub struct CsvStorage {
    output_dir: PathBuf,
}

impl CsvStorage {
    /// Open (and create if needed) the storage directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|source| StorageError::Io {
            path: output_dir.clone(),
            source,
        })?;
        info!(dir = %output_dir.display(), "CSV storage initialized");
        Ok(Self { output_dir })
    }

    /// Full path of a file inside the storage directory.
    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Write fixes to a CSV file, optionally appending to an existing one.
    ///
    /// Returns the path written. An empty fix list is a no-op.
    pub fn save_fixes(
        &self,
        fixes: &[GpsFix],
        filename: &str,
        append: bool,
    ) -> Result<PathBuf, StorageError> {
        let path = self.path_of(filename);
        if fixes.is_empty() {
            warn!("no fixes to save");
            return Ok(path);
        }

        let appending = append && path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(appending)
            .write(true)
            .truncate(!appending)
            .open(&path)
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(!appending)
            .from_writer(file);
        for fix in fixes {
            writer.serialize(fix).map_err(|source| StorageError::Csv {
                path: path.clone(),
                source,
            })?;
        }
        writer.flush().map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        info!(count = fixes.len(), path = %path.display(), "fixes saved");
        Ok(path)
    }

    /// Load every fix from a CSV file.
    pub fn load_fixes(&self, filename: &str) -> Result<Vec<GpsFix>, StorageError> {
        let path = self.path_of(filename);
        let mut reader = csv::Reader::from_path(&path).map_err(|source| StorageError::Csv {
            path: path.clone(),
            source,
        })?;

        let mut fixes = Vec::new();
        for record in reader.deserialize() {
            let fix: GpsFix = record.map_err(|source| StorageError::Csv {
                path: path.clone(),
                source,
            })?;
            fixes.push(fix);
        }
        Ok(fixes)
    }

    /// CSV files in the storage directory with their sizes in bytes.
    pub fn list_files(&self) -> Result<Vec<(String, u64)>, StorageError> {
        let entries = std::fs::read_dir(&self.output_dir).map_err(|source| StorageError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|ext| ext == "csv").unwrap_or(false) {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.push((name.to_string(), size));
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Keep only fixes within the inclusive timestamp range.
pub fn filter_by_range(
    fixes: Vec<GpsFix>,
    from: chrono::DateTime<chrono::Utc>,
    to: chrono::DateTime<chrono::Utc>,
) -> Vec<GpsFix> {
    fixes
        .into_iter()
        .filter(|fix| fix.timestamp >= from && fix.timestamp <= to)
        .collect()
}
