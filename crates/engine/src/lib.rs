//! # Engine - SiDB Storage Substrate
//!
//! Ties the [`page`] layouts, the [`record`] codec and the [`compress`]
//! backends to a single database file that is memory-mapped for reads and
//! written with positioned writes.
//!
//! ## Architecture
//!
//! ```text
//! Db::open(path, &Options)
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                     Db                        │
//! │                                               │
//! │ lock.rs  → shared / exclusive advisory lock   │
//! │              |                                │
//! │              v                                │
//! │ file.rs  → init() if empty, mmap(), validate  │
//! │              |                                │
//! │ read.rs  → page guards over the mapping,      │
//! │            record / index decoding            │
//! │ write.rs → pwrite pages, grow + remap,        │
//! │            head page updates                  │
//! │              |                                │
//! │ sys/     → flock, mmap, pwrite per OS family  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module     | Purpose                                                   |
//! |------------|-----------------------------------------------------------|
//! | `lib.rs`   | `Db` struct, `open`, `close`, accessors, `Debug`, `Drop`  |
//! | `lock`     | lock acquisition with optional bounded wait               |
//! | `file`     | `init`, `grow`, `mmap`, `munmap`, mapping size policy     |
//! | `read`     | `read_page`, `page_header`, `read_records`, `read_index_page` |
//! | `write`    | `write_page`, `write_data_page`, `write_index_page`, `update_head` |
//! | `sys`      | platform shim                                             |
//!
//! ## Concurrency
//!
//! A `Db` is `Send + Sync`. Inside one handle:
//!
//! ```text
//! write_lock: Mutex<()>          growth, page writes, head updates
//! head:       Mutex<HeadPage>    cached head page, never held across I/O
//! map:        RwLock<MapState>   readers share, (re)mapping is exclusive
//! ```
//!
//! Locks are taken in the order `write_lock → head → map`. Across processes
//! the only exclusion is the advisory file lock: one writer, or any number
//! of readers.
mod error;
mod file;
mod lock;
mod read;
mod sys;
mod write;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use compress::{Compression, Compressor, Decompressor};
use config::Options;
use page::{clamp_page_size, FormatError, HeadPage, HEAD_PAGE_SIZE, MIN_PAGE_COUNT};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

pub use error::{Error, Result};
pub use file::mmap_size;
pub use parking_lot::MappedRwLockReadGuard;
pub use sys::LockMode;

use file::MapState;

/// Borrowed view of one page inside the mapping. Holds the map read lock.
pub type PageRef<'a> = MappedRwLockReadGuard<'a, [u8]>;

/// An open database file.
pub struct Db {
    pub(crate) path: PathBuf,
    pub(crate) file: File,
    pub(crate) opts: Options,
    pub(crate) page_size: usize,
    /// Algorithm persisted in the head page.
    pub(crate) compression: Compression,
    /// Lock held on `file`; `None` once released.
    pub(crate) lock_mode: Option<LockMode>,
    pub(crate) file_size: AtomicU64,

    pub(crate) write_lock: Mutex<()>,
    pub(crate) head: Mutex<HeadPage>,
    pub(crate) map: RwLock<MapState>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.head();
        f.debug_struct("Db")
            .field("path", &self.path)
            .field("read_only", &self.opts.read_only)
            .field("page_size", &self.page_size)
            .field("page_count", &head.page_count)
            .field("index_page_count", &head.index_page_count)
            .field("file_size", &self.file_size())
            .field("map_size", &self.map_size())
            .field("compression", &self.compression)
            .field("lock_mode", &self.lock_mode)
            .finish()
    }
}

impl Db {
    /// Opens the database at `path`, creating and initializing it unless
    /// `opts.read_only` is set.
    ///
    /// # Steps
    ///
    /// 1. Open the file (read-only handles require it to exist).
    /// 2. Take a shared lock (read-only) or an exclusive lock (writer).
    /// 3. Write the head page and first data page if the file is empty.
    /// 4. Read the page size from the head page and map the file.
    /// 5. Validate the head page from the mapping.
    ///
    /// A failed open releases the lock and closes the file.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for a read-only open of a missing file.
    /// - [`Error::WriteByOther`] / [`Error::LockTimeout`] on lock contention.
    /// - [`Error::Format`] if the file is not a valid SiDB file.
    /// - [`Error::Io`] for I/O failures, tagged with the operation.
    pub fn open<P: AsRef<Path>>(path: P, opts: &Options) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(!opts.read_only)
            .create(!opts.read_only)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                if opts.read_only && e.kind() == io::ErrorKind::NotFound {
                    Error::NotFound { path: path.clone() }
                } else {
                    Error::Io {
                        op: "open",
                        source: e,
                    }
                }
            })?;

        let mode = if opts.read_only {
            LockMode::Shared
        } else {
            LockMode::Exclusive
        };
        lock::acquire(&file, mode, opts.lock_timeout)?;

        let page_size = clamp_page_size(sys::host_page_size());
        let mut db = Db {
            path,
            file,
            opts: opts.clone(),
            page_size,
            compression: opts.compression,
            lock_mode: Some(mode),
            file_size: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            head: Mutex::new(HeadPage::new(page_size, opts.compression)),
            map: RwLock::new(MapState::default()),
        };
        // From here on, Drop unmaps and unlocks if anything fails.

        let len = db.file.metadata().map_err(Error::io("stat"))?.len();
        db.file_size.store(len, Ordering::Release);
        if len == 0 {
            if db.opts.read_only {
                return Err(FormatError::FileTooSmall {
                    size: 0,
                    min: page_size as u64 * u64::from(MIN_PAGE_COUNT),
                }
                .into());
            }
            db.init()?;
        }

        let stored = db.read_stored_head()?;
        db.page_size = stored.page_size();
        db.compression = stored.compression()?;

        db.mmap(db.opts.initial_map_size)?;

        info!(
            path = %db.path.display(),
            read_only = db.opts.read_only,
            page_size = db.page_size,
            compression = %db.compression,
            "opened database"
        );
        Ok(db)
    }

    /// Reads the head page straight from the file, before the page size is
    /// known, and checks that the file can be mapped with it.
    fn read_stored_head(&self) -> Result<HeadPage> {
        let file_size = self.file_size();
        if file_size < HEAD_PAGE_SIZE as u64 {
            return Err(FormatError::FileTooSmall {
                size: file_size,
                min: self.page_size as u64 * u64::from(MIN_PAGE_COUNT),
            }
            .into());
        }

        let mut buf = [0u8; HEAD_PAGE_SIZE];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0)).map_err(Error::io("seek"))?;
        file.read_exact(&mut buf).map_err(Error::io("read"))?;
        let head = HeadPage::decode(&buf)?;
        head.check_identity()?;
        Ok(head)
    }

    /// Unmaps the file and releases the lock. Writers sync the file first.
    ///
    /// Unlock failures are logged, not returned.
    pub fn close(mut self) -> Result<()> {
        let synced = if self.opts.read_only {
            Ok(())
        } else {
            self.file.sync_data().map_err(Error::io("fdatasync"))
        };
        self.release();
        synced
    }

    fn release(&mut self) {
        self.munmap();
        if let Some(mode) = self.lock_mode.take() {
            lock::release(&self.file, mode);
            debug!(path = %self.path.display(), "closed database");
        }
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.opts.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    pub(crate) fn compressor(&self) -> Option<Compressor> {
        self.compression.compressor()
    }

    pub(crate) fn decompressor(&self) -> Option<Decompressor> {
        self.compression.decompressor()
    }

    /// Copy of the cached head page.
    #[must_use]
    pub fn head(&self) -> HeadPage {
        *self.head.lock()
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Tracked file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size.load(Ordering::Acquire)
    }

    /// Length of the current mapping; 0 when unmapped.
    #[must_use]
    pub fn map_size(&self) -> u64 {
        self.map.read_recursive().size()
    }

    /// Algorithm persisted in the file, which may differ from
    /// `Options::compression` for files created earlier.
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.opts.read_only
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Best-effort release on drop: unmap and unlock.
impl Drop for Db {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests;
