//! # Config - Open Options and Tuning Constants
//!
//! [`Options`] controls how a database file is opened. Every field has a
//! default; callers usually start from `Options::default()` and chain the
//! setters they need:
//!
//! ```rust
//! use config::Options;
//! use std::time::Duration;
//!
//! let opts = Options::default()
//!     .read_only(true)
//!     .lock_timeout(Some(Duration::from_millis(500)));
//! assert!(opts.read_only);
//! ```
//!
//! ## Environment
//!
//! [`Options::from_env`] reads the same settings from `SIDB_*` variables.
//! Unparseable values fall back to the default.
//!
//! ```text
//! SIDB_READ_ONLY         open with a shared lock, no writes   (default: false)
//! SIDB_COMPRESSION       none | snappy | lz4 (new files only) (default: snappy)
//! SIDB_NO_GROW_SYNC      skip truncate+fsync when growing     (default: false)
//! SIDB_MMAP_ADVICE       normal | random | sequential | willneed (default: random)
//! SIDB_MMAP_POPULATE     prefault the mapping                 (default: false)
//! SIDB_INITIAL_MAP_SIZE  minimum mapping size in bytes        (default: 0)
//! SIDB_LOCK_TIMEOUT_MS   wait for the file lock, 0 = forever  (default: unset, fail fast)
//! ```

use std::time::Duration;

use compress::Compression;

/// Number of pages added on top of the requested size once the file is
/// past the allocation threshold.
pub const ALLOC_PAGES: usize = 8;

/// Smallest mapping size (32 KiB).
pub const MIN_MMAP_SIZE: u64 = 1 << 15;

/// Mapping sizes double up to this value, then grow in steps of it (1 GiB).
pub const MAX_MMAP_STEP: u64 = 1 << 30;

/// Largest mapping we will ever request (256 TiB).
pub const MAX_MAP_SIZE: u64 = 0xFFFF_FFFF_FFFF;

/// Pause between attempts while waiting for a contended file lock.
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Access pattern hint passed to the OS for the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapAdvice {
    Normal,
    /// Point lookups across the file. Disables read-ahead.
    #[default]
    Random,
    Sequential,
    WillNeed,
}

impl MapAdvice {
    /// Parses `normal`, `random`, `sequential` or `willneed`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(MapAdvice::Normal),
            "random" => Some(MapAdvice::Random),
            "sequential" => Some(MapAdvice::Sequential),
            "willneed" => Some(MapAdvice::WillNeed),
            _ => None,
        }
    }
}

/// Settings for opening a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Take a shared lock and refuse all writes. The file must exist.
    pub read_only: bool,
    /// Skip the truncate and fsync that pre-extend the file on growth.
    /// Page writes still extend the file as they land.
    pub no_grow_sync: bool,
    pub mmap_advice: MapAdvice,
    /// Prefault the mapping at map time (unix only).
    pub mmap_populate: bool,
    /// Lower bound for the first mapping.
    pub initial_map_size: u64,
    /// Algorithm recorded in the head page of a newly created file. An
    /// existing file keeps the algorithm it was created with.
    pub compression: Compression,
    /// `None` fails immediately on contention, `Some(ZERO)` waits forever,
    /// `Some(d)` gives up after `d`.
    pub lock_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            read_only: false,
            no_grow_sync: false,
            mmap_advice: MapAdvice::default(),
            mmap_populate: false,
            initial_map_size: 0,
            compression: Compression::default(),
            lock_timeout: None,
        }
    }
}

impl Options {
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn no_grow_sync(mut self, no_grow_sync: bool) -> Self {
        self.no_grow_sync = no_grow_sync;
        self
    }

    #[must_use]
    pub fn mmap_advice(mut self, advice: MapAdvice) -> Self {
        self.mmap_advice = advice;
        self
    }

    #[must_use]
    pub fn mmap_populate(mut self, populate: bool) -> Self {
        self.mmap_populate = populate;
        self
    }

    #[must_use]
    pub fn initial_map_size(mut self, size: u64) -> Self {
        self.initial_map_size = size;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Builds options from `SIDB_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds options from an arbitrary key lookup. Missing or unparseable
    /// values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(default)
        };

        Self {
            read_only: flag("SIDB_READ_ONLY", defaults.read_only),
            no_grow_sync: flag("SIDB_NO_GROW_SYNC", defaults.no_grow_sync),
            mmap_advice: lookup("SIDB_MMAP_ADVICE")
                .and_then(|v| MapAdvice::from_name(&v))
                .unwrap_or(defaults.mmap_advice),
            mmap_populate: flag("SIDB_MMAP_POPULATE", defaults.mmap_populate),
            initial_map_size: lookup("SIDB_INITIAL_MAP_SIZE")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.initial_map_size),
            compression: lookup("SIDB_COMPRESSION")
                .and_then(|v| Compression::from_name(&v))
                .unwrap_or(defaults.compression),
            lock_timeout: lookup("SIDB_LOCK_TIMEOUT_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .or(defaults.lock_timeout),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
