use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use config::Options;
use record::KvPair;
use tempfile::TempDir;

pub fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("test.sidb")
}

pub fn read_only() -> Options {
    Options::default().read_only(true)
}

pub fn kv(key: &str, value: &str) -> KvPair {
    KvPair::new(key.as_bytes().to_vec(), value.as_bytes().to_vec())
}

/// `n` pairs with ascending, prefix-sharing keys.
pub fn sample_pairs(n: usize) -> Vec<KvPair> {
    (0..n)
        .map(|i| kv(&format!("user:{i:05}"), &format!("value-{i}-{}", "x".repeat(i % 7))))
        .collect()
}

/// Overwrites bytes of a closed database file in place.
pub fn patch_file(path: &Path, offset: u64, bytes: &[u8]) {
    let mut f = OpenOptions::new().write(true).open(path).unwrap();
    f.seek(SeekFrom::Start(offset)).unwrap();
    f.write_all(bytes).unwrap();
    f.sync_all().unwrap();
}

pub fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}
