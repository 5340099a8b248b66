//! # CLI - SiDB Inspection Shell
//!
//! A REPL-style tool for looking inside a SiDB database file. Reads commands
//! from stdin and prints results to stdout, so it works interactively and
//! with piped scripts.
//!
//! ## Commands
//!
//! ```text
//! HEAD           Print the head page
//! PAGE n         Print the header of page n
//! RECORDS n      Decode the records of data page n
//! INDEX n        Decode the entries of index page n
//! SIZES          Print on-disk structure sizes
//! STATS          Print handle debug info
//! EXIT / QUIT    Close the database and exit
//! ```
//!
//! ## Configuration
//!
//! ```text
//! SIDB_PATH             database file                       (default: "data.sidb")
//! SIDB_READ_ONLY        shared lock, file must exist        (default: "false")
//! SIDB_COMPRESSION      none | snappy | lz4 for new files   (default: "snappy")
//! SIDB_NO_GROW_SYNC     skip truncate+fsync on growth       (default: "false")
//! SIDB_LOCK_TIMEOUT_MS  wait for the lock, 0 = forever      (default: unset)
//! RUST_LOG              log filter, logs go to stderr       (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ SIDB_PATH=/tmp/demo.sidb cargo run -p cli
//! SiDB opened (path=/tmp/demo.sidb, page_size=4096, pages=2, compression=snappy, read_only=false)
//! > PAGE 1
//! flags=DATA|FULL count=0 len=0 next=0 ptr=20 checksum=0x00000000
//! > EXIT
//! bye
//! ```

use anyhow::{Context, Result};
use config::Options;
use engine::Db;
use page::{PageId, HEAD_PAGE_SIZE, INDEX_SIZE, PAGE_HEADER_SIZE, RECORD_PTR_SIZE};
use record::MIN_RECORD_SIZE;
use std::io::{self, BufRead, Write};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Whether the REPL keeps reading after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let path = env_or("SIDB_PATH", "data.sidb");
    let opts = Options::from_env();

    let db = Db::open(&path, &opts).with_context(|| format!("failed to open {path}"))?;
    let head = db.head();

    println!(
        "SiDB opened (path={}, page_size={}, pages={}, compression={}, read_only={})",
        path,
        db.page_size(),
        head.page_count,
        db.compression(),
        db.is_read_only()
    );
    println!("Commands: HEAD | PAGE n | RECORDS n | INDEX n | SIZES | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if execute(&db, &line, &mut stdout)? == Flow::Exit {
            break;
        }
        print!("> ");
        stdout.flush().ok();
    }

    db.close().context("failed to close database")?;
    Ok(())
}

/// Runs one command line against `db`, writing its output to `out`.
fn execute<W: Write>(db: &Db, line: &str, out: &mut W) -> Result<Flow> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(Flow::Continue);
    };
    let page_arg = parts.next().and_then(|s| s.parse::<PageId>().ok());
    debug!(command = cmd, page = ?page_arg, "executing");

    match cmd.to_uppercase().as_str() {
        "HEAD" => {
            let h = db.head();
            writeln!(
                out,
                "magic={:#010x} version={} checksum={:#010x} compression={} page_size={} page_count={}",
                h.magic,
                h.version,
                h.checksum,
                h.compression()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|_| format!("unknown({})", h.compression)),
                h.page_size,
                h.page_count
            )?;
            writeln!(
                out,
                "index_page_count={} index_ptr=({}, {}) kv_ptr=({}, {}) next_index_page={} ptr={}",
                h.index_page_count,
                h.index_ptr.page_num,
                h.index_ptr.offset,
                h.kv_ptr.page_num,
                h.kv_ptr.offset,
                h.next_index_page,
                h.ptr
            )?;
        }
        "PAGE" => match page_arg {
            Some(id) => match db.page_header(id) {
                Ok(p) => writeln!(
                    out,
                    "flags={:?} count={} len={} next={} ptr={} checksum={:#010x}",
                    p.flags, p.count, p.len, p.next, p.ptr, p.checksum
                )?,
                Err(e) => writeln!(out, "ERR page read failed: {}", e)?,
            },
            None => writeln!(out, "ERR usage: PAGE n")?,
        },
        "RECORDS" => match page_arg {
            Some(id) => match db.read_records(id) {
                Ok(records) if records.is_empty() => writeln!(out, "(empty)")?,
                Ok(records) => {
                    for kv in &records {
                        writeln!(
                            out,
                            "{} -> {}",
                            String::from_utf8_lossy(&kv.key),
                            String::from_utf8_lossy(&kv.value)
                        )?;
                    }
                    writeln!(out, "({} records)", records.len())?;
                }
                Err(e) => writeln!(out, "ERR records read failed: {}", e)?,
            },
            None => writeln!(out, "ERR usage: RECORDS n")?,
        },
        "INDEX" => match page_arg {
            Some(id) => match db.read_index_page(id) {
                Ok(entries) if entries.is_empty() => writeln!(out, "(empty)")?,
                Ok(entries) => {
                    for e in &entries {
                        writeln!(
                            out,
                            "[{} .. {}] -> page {}",
                            String::from_utf8_lossy(trim_padding(&e.start)),
                            String::from_utf8_lossy(trim_padding(&e.end)),
                            e.page_num
                        )?;
                    }
                    writeln!(out, "({} entries)", entries.len())?;
                }
                Err(e) => writeln!(out, "ERR index read failed: {}", e)?,
            },
            None => writeln!(out, "ERR usage: INDEX n")?,
        },
        "SIZES" => {
            writeln!(out, "HeadPage  {:>3} bytes", HEAD_PAGE_SIZE)?;
            writeln!(out, "Page      {:>3} bytes", PAGE_HEADER_SIZE)?;
            writeln!(out, "Index     {:>3} bytes", INDEX_SIZE)?;
            writeln!(out, "RecordPtr {:>3} bytes", RECORD_PTR_SIZE)?;
            writeln!(out, "KvPair    {:>3} bytes minimum", MIN_RECORD_SIZE)?;
            writeln!(out, "page_size {} bytes", db.page_size())?;
        }
        "STATS" => {
            writeln!(out, "{:?}", db)?;
        }
        "EXIT" | "QUIT" => {
            writeln!(out, "bye")?;
            return Ok(Flow::Exit);
        }
        other => {
            writeln!(out, "unknown command: {}", other)?;
        }
    }

    Ok(Flow::Continue)
}

/// Index bounds are zero padded to six bytes.
fn trim_padding(bound: &[u8]) -> &[u8] {
    let end = bound.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bound[..end]
}
