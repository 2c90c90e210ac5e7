use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::contracts::{CounterStore, StoreError};

/// Name of the record file inside the working directory.
pub const RECORD_FILE_NAME: &str = "idfile";

/// Extension of the staging file a new record is written to before the rename.
const STAGING_EXTENSION: &str = "tmp";

/// Upper bound on a well-formed record: 20 digits plus `\r\n`, with headroom.
const MAX_RECORD_LEN: u64 = 64;

/// Counter store backed by a single text file in a working directory.
///
/// The record holds the highest issued id in decimal followed by a line
/// terminator. New values are written to a staging file, fsynced, then
/// renamed over the record, so a crash leaves either the old or the new value
/// on disk.
#[derive(Debug)]
pub struct FileCounterStore {
    dir: PathBuf,
    path: PathBuf,
    staging_path: PathBuf,
}

impl FileCounterStore {
    /// Opens a store rooted at `dir`, creating the directory (and parents)
    /// if it does not exist yet.
    ///
    /// Does not read the record; call [`CounterStore::load`] for that.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        ensure_dir(&dir)?;

        let path = dir.join(RECORD_FILE_NAME);
        let staging_path = path.with_extension(STAGING_EXTENSION);

        Ok(Self {
            dir,
            path,
            staging_path,
        })
    }

    /// Path of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, reason: impl ToString) -> StoreError {
        StoreError::Read {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl CounterStore for FileCounterStore {
    fn load(&mut self) -> Result<u64, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "No id file found, starting with new id set"
                );
                return Ok(0);
            }
            Err(e) => return Err(self.read_error(e)),
        };

        let mut contents = String::new();
        file.take(MAX_RECORD_LEN + 1)
            .read_to_string(&mut contents)
            .map_err(|e| self.read_error(e))?;
        if contents.len() as u64 > MAX_RECORD_LEN {
            return Err(self.read_error(format!(
                "record is longer than {} bytes",
                MAX_RECORD_LEN
            )));
        }

        let value = parse_record(&contents).map_err(|reason| self.read_error(reason))?;
        tracing::info!(id = value, path = %self.path.display(), "Loaded id");
        Ok(value)
    }

    fn persist(&mut self, value: u64) -> Result<(), StoreError> {
        let mut staging = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.staging_path)
            .map_err(|e| self.write_error(e))?;
        staging
            .write_all(format_record(value).as_bytes())
            .map_err(|e| self.write_error(e))?;
        staging.sync_all().map_err(|e| self.write_error(e))?;
        drop(staging);

        fs::rename(&self.staging_path, &self.path).map_err(|e| self.write_error(e))?;
        sync_dir(&self.dir).map_err(|e| self.write_error(e))?;

        tracing::debug!(id = value, "Persisted id");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Renders a counter value in the on-disk record format.
pub fn format_record(value: u64) -> String {
    format!("{}\n", value)
}

/// Parses the contents of a record file.
///
/// Accepts ASCII digits followed by exactly one `\n` or `\r\n`. Anything
/// else, including a missing terminator, is rejected with a reason.
pub fn parse_record(contents: &str) -> Result<u64, String> {
    let digits = contents
        .strip_suffix('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .ok_or_else(|| "record is missing its line terminator".to_string())?;

    if digits.is_empty() {
        return Err("record is empty".into());
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("expected a decimal integer, found {:?}", digits));
    }

    digits
        .parse::<u64>()
        .map_err(|e| format!("invalid id {:?}: {}", digits, e))
}

fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StoreError::NotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %dir.display(), "Creating directory");
            fs::create_dir_all(dir).map_err(|source| StoreError::Directory {
                path: dir.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(StoreError::Directory {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Makes the rename itself durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
