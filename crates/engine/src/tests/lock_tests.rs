use super::helpers::{db_path, read_only};
use crate::*;
use anyhow::Result;
use config::Options;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

// --------------------- Exclusivity ---------------------

#[test]
fn second_writer_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let _writer = Db::open(&path, &Options::default())?;

    let err = Db::open(&path, &Options::default()).unwrap_err();
    assert!(matches!(err, Error::WriteByOther));
    Ok(())
}

#[test]
fn reader_is_rejected_while_writer_holds_the_file() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let _writer = Db::open(&path, &Options::default())?;

    let err = Db::open(&path, &read_only()).unwrap_err();
    assert!(matches!(err, Error::WriteByOther));
    Ok(())
}

#[test]
fn writer_is_rejected_while_reader_holds_the_file() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    Db::open(&path, &Options::default())?.close()?;

    let _reader = Db::open(&path, &read_only())?;
    let err = Db::open(&path, &Options::default()).unwrap_err();
    assert!(matches!(err, Error::WriteByOther));
    Ok(())
}

#[test]
fn readers_share_the_file() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    Db::open(&path, &Options::default())?.close()?;

    let r1 = Db::open(&path, &read_only())?;
    let r2 = Db::open(&path, &read_only())?;
    assert_eq!(r1.head(), r2.head());
    Ok(())
}

#[test]
fn close_releases_the_lock() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);

    let writer = Db::open(&path, &Options::default())?;
    writer.close()?;
    let _again = Db::open(&path, &Options::default())?;
    Ok(())
}

#[test]
fn drop_releases_the_lock() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);

    {
        let _writer = Db::open(&path, &Options::default())?;
    }
    let _again = Db::open(&path, &Options::default())?;
    Ok(())
}

#[test]
fn rejected_open_leaves_holder_intact() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let writer = Db::open(&path, &Options::default())?;

    assert!(Db::open(&path, &Options::default()).is_err());
    // the failed attempt must not have released the holder's lock
    assert!(matches!(
        Db::open(&path, &read_only()).unwrap_err(),
        Error::WriteByOther
    ));
    assert_eq!(writer.page_header(1)?.count, 0);
    Ok(())
}

// --------------------- Bounded wait ---------------------

#[test]
fn bounded_wait_times_out() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let _writer = Db::open(&path, &Options::default())?;

    let start = Instant::now();
    let err = Db::open(
        &path,
        &Options::default().lock_timeout(Some(Duration::from_millis(150))),
    )
    .unwrap_err();
    assert!(matches!(err, Error::LockTimeout));
    assert!(start.elapsed() >= Duration::from_millis(150));
    Ok(())
}

#[test]
fn bounded_wait_succeeds_once_released() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let writer = Db::open(&path, &Options::default())?;

    let holder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        writer.close().unwrap();
    });

    let db = Db::open(
        &path,
        &Options::default().lock_timeout(Some(Duration::from_secs(10))),
    )?;
    holder.join().unwrap();
    assert_eq!(db.head().page_count, 2);
    Ok(())
}

#[test]
fn zero_timeout_waits_until_released() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let writer = Db::open(&path, &Options::default())?;

    let holder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        drop(writer);
    });

    let start = Instant::now();
    let db = Db::open(&path, &read_only().lock_timeout(Some(Duration::ZERO)))?;
    assert!(start.elapsed() >= Duration::from_millis(150));
    holder.join().unwrap();
    assert!(db.is_read_only());
    Ok(())
}

#[test]
fn bounded_wait_does_not_retry_missing_files() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);

    let start = Instant::now();
    let err = Db::open(
        &path,
        &read_only().lock_timeout(Some(Duration::from_secs(10))),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(start.elapsed() < Duration::from_secs(5));
    Ok(())
}
