use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;

use config::MapAdvice;
use memmap2::{Advice, Mmap, MmapOptions};

use super::LockMode;

/// Tries once to take `mode` on `file`. `Ok(false)` means another handle
/// holds a conflicting lock.
pub(crate) fn acquire_lock(file: &File, mode: LockMode) -> io::Result<bool> {
    let op = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    } | libc::LOCK_NB;

    loop {
        // SAFETY: flock only inspects the descriptor, which `file` keeps open
        // for the duration of the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), op) };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EWOULDBLOCK => return Ok(false),
            Some(code) if code == libc::EINTR => continue,
            _ => return Err(err),
        }
    }
}

pub(crate) fn release_lock(file: &File) -> io::Result<()> {
    // SAFETY: see `acquire_lock`.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Maps `len` bytes of `file` read-only. `len` may exceed the file size;
/// only the part backed by the file may be touched.
pub(crate) fn map_file(file: &File, len: u64, populate: bool) -> io::Result<Mmap> {
    let len = usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "mapping length overflows usize"))?;
    let mut opts = MmapOptions::new();
    opts.len(len);
    if populate {
        opts.populate();
    }
    // SAFETY: the mapping is read-only and the file stays open for as long
    // as the Db holds the mapping. Pages are only read below the tracked
    // file size, and the file never shrinks while mapped.
    unsafe { opts.map(file) }
}

pub(crate) fn advise(mmap: &Mmap, advice: MapAdvice) -> io::Result<()> {
    let advice = match advice {
        MapAdvice::Normal => Advice::Normal,
        MapAdvice::Random => Advice::Random,
        MapAdvice::Sequential => Advice::Sequential,
        MapAdvice::WillNeed => Advice::WillNeed,
    };
    mmap.advise(advice)
}

pub(crate) fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    file.write_all_at(buf, offset)
}

pub(crate) fn host_page_size() -> Option<usize> {
    // SAFETY: sysconf has no preconditions.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(sz).ok().filter(|&sz| sz > 0)
}
