//! Platform shim. Everything OS-specific the engine needs sits behind these
//! functions; `unix.rs` and `windows.rs` provide them.
//!
//! | Function          | Purpose                                         |
//! |-------------------|-------------------------------------------------|
//! | `acquire_lock`    | non-blocking shared/exclusive advisory lock     |
//! | `release_lock`    | drop whichever lock the handle holds            |
//! | `map_file`        | read-only shared mapping of `len` bytes         |
//! | `advise`          | access-pattern hint for a mapping               |
//! | `unmap_file`      | release a mapping                               |
//! | `write_at`        | positioned write of a whole buffer              |
//! | `host_page_size`  | OS page granularity, if known                   |

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::*;

use memmap2::Mmap;

/// Lock mode held on the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared lock taken by read-only handles.
    Shared,
    /// Exclusive lock taken by the single writer.
    Exclusive,
}

pub(crate) fn unmap_file(mmap: Mmap) {
    drop(mmap);
}
