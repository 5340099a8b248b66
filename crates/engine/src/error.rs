use std::io;
use std::path::PathBuf;

use config::MAX_MAP_SIZE;
use page::{FormatError, PageId};
use record::RecordError;
use thiserror::Error;

/// Errors returned by [`Db`](crate::Db).
#[derive(Debug, Error)]
pub enum Error {
    /// Read-only open of a path that does not exist.
    #[error("database file {} does not exist", .path.display())]
    NotFound { path: PathBuf },

    /// Another handle holds a conflicting lock on the file.
    #[error("database file is locked by another writer")]
    WriteByOther,

    /// The bounded lock wait elapsed.
    #[error("timed out waiting for the database file lock")]
    LockTimeout,

    #[error("failed to lock database file: {0}")]
    Lock(#[source] io::Error),

    /// I/O failure, tagged with the operation that failed.
    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("mapping size {size} exceeds the maximum {MAX_MAP_SIZE}")]
    MapTooLarge { size: u64 },

    #[error("database is open read-only")]
    ReadOnly,

    #[error("page {id} is out of range (page count {page_count})")]
    PageOutOfRange { id: PageId, page_count: u32 },

    #[error("payload of {len} bytes exceeds page capacity {capacity}")]
    PayloadTooLarge { len: usize, capacity: usize },

    /// The mapping has been released.
    #[error("database is closed")]
    Closed,
}

impl Error {
    /// Adapter for `map_err` that tags an `io::Error` with `op`.
    pub(crate) fn io(op: &'static str) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Io { op, source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
