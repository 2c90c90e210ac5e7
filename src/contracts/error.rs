use std::path::PathBuf;
use std::sync::{MutexGuard, PoisonError};

use thiserror::Error;

/// Errors raised by a durable counter store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("path ({}) is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("can't prepare directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't read id file {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("couldn't write id file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum AllocError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Block count must be at least 1")]
    EmptyBlock,

    #[error("Id space exhausted: {current} + {count} overflows u64")]
    Overflow { current: u64, count: u64 },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Extension trait for converting lock errors to AllocError.
pub trait LockResultExt<T> {
    /// Converts a lock error to an AllocError.
    fn map_lock_err(self) -> Result<T, AllocError>;
}

impl<'a, T> LockResultExt<MutexGuard<'a, T>>
    for Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<MutexGuard<'a, T>, AllocError> {
        self.map_err(|e| AllocError::LockPoisoned(e.to_string()))
    }
}
