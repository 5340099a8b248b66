use std::fs::{File, TryLockError};
use std::io;
use std::os::windows::fs::FileExt;

use config::MapAdvice;
use memmap2::{Mmap, MmapOptions};

use super::LockMode;

pub(crate) fn acquire_lock(file: &File, mode: LockMode) -> io::Result<bool> {
    let res = match mode {
        LockMode::Shared => file.try_lock_shared(),
        LockMode::Exclusive => file.try_lock(),
    };
    match res {
        Ok(()) => Ok(true),
        Err(TryLockError::WouldBlock) => Ok(false),
        Err(TryLockError::Error(e)) => Err(e),
    }
}

pub(crate) fn release_lock(file: &File) -> io::Result<()> {
    file.unlock()
}

/// Windows cannot map past the end of a read-only file, so the mapping is
/// clamped to the current file length.
pub(crate) fn map_file(file: &File, len: u64, _populate: bool) -> io::Result<Mmap> {
    let len = len.min(file.metadata()?.len());
    let len = usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "mapping length overflows usize"))?;
    // SAFETY: read-only mapping of a file the Db keeps open.
    unsafe { MmapOptions::new().len(len).map(file) }
}

pub(crate) fn advise(_mmap: &Mmap, _advice: MapAdvice) -> io::Result<()> {
    Ok(())
}

pub(crate) fn write_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

pub(crate) fn host_page_size() -> Option<usize> {
    None
}
