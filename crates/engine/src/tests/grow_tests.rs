use super::helpers::{db_path, file_len, read_only};
use crate::*;
use anyhow::Result;
use config::{Options, ALLOC_PAGES, MAX_MAP_SIZE};
use page::{Page, PageFlags};
use tempfile::tempdir;

const GIB: u64 = 1 << 30;

// --------------------- Mapping size policy ---------------------

#[test]
fn mmap_size_starts_at_32k() -> Result<()> {
    assert_eq!(mmap_size(0, 4096)?, 32 * 1024);
    assert_eq!(mmap_size(1, 4096)?, 32 * 1024);
    assert_eq!(mmap_size(32 * 1024, 4096)?, 32 * 1024);
    Ok(())
}

#[test]
fn mmap_size_doubles_up_to_1g() -> Result<()> {
    assert_eq!(mmap_size(32 * 1024 + 1, 4096)?, 64 * 1024);
    assert_eq!(mmap_size(100_000, 4096)?, 128 * 1024);
    assert_eq!(mmap_size(GIB / 2 + 1, 4096)?, GIB);
    assert_eq!(mmap_size(GIB, 4096)?, GIB);
    Ok(())
}

#[test]
fn mmap_size_steps_by_1g_beyond() -> Result<()> {
    assert_eq!(mmap_size(GIB + 1, 4096)?, 2 * GIB);
    assert_eq!(mmap_size(5 * GIB, 4096)?, 5 * GIB);
    assert_eq!(mmap_size(5 * GIB + 7, 4096)?, 6 * GIB);
    Ok(())
}

#[test]
fn mmap_size_rounds_to_page_multiple() -> Result<()> {
    let ps = 0xFFFF;
    let sz = mmap_size(GIB + 1, ps)?;
    assert_eq!(sz % ps as u64, 0);
    assert_eq!(sz, 32_769 * 65_535);
    Ok(())
}

#[test]
fn mmap_size_caps_at_256t() -> Result<()> {
    assert_eq!(mmap_size(MAX_MAP_SIZE, 4096)?, MAX_MAP_SIZE);
    assert!(matches!(
        mmap_size(MAX_MAP_SIZE + 1, 4096),
        Err(Error::MapTooLarge { size }) if size == MAX_MAP_SIZE + 1
    ));
    Ok(())
}

// --------------------- File growth ---------------------

#[test]
fn grow_below_threshold_is_exact() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let db = Db::open(&path, &Options::default())?;
    let ps = db.page_size() as u64;

    db.grow(5 * ps)?;
    assert_eq!(db.file_size(), 5 * ps);
    assert_eq!(file_len(&path), 5 * ps);

    db.grow(5 * ps + 100)?;
    assert_eq!(db.file_size(), 5 * ps + 100);
    Ok(())
}

#[test]
fn grow_above_threshold_adds_alloc_chunk() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let db = Db::open(&path, &Options::default())?;
    let ps = db.page_size() as u64;
    let alloc = ALLOC_PAGES as u64 * ps;

    db.grow(alloc)?;
    assert_eq!(db.file_size(), alloc);

    db.grow(10 * ps)?;
    assert_eq!(db.file_size(), 10 * ps + alloc);
    assert_eq!(file_len(&path), 10 * ps + alloc);
    Ok(())
}

#[test]
fn grow_to_smaller_size_is_noop() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let db = Db::open(&path, &Options::default())?;
    let before = db.file_size();

    db.grow(before)?;
    db.grow(before / 2)?;
    assert_eq!(db.file_size(), before);
    assert_eq!(file_len(&path), before);
    Ok(())
}

#[test]
fn grow_without_sync_leaves_file_length() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let db = Db::open(&path, &Options::default().no_grow_sync(true))?;
    let ps = db.page_size() as u64;

    db.grow(4 * ps)?;
    assert_eq!(file_len(&path), 2 * ps);
    assert_eq!(db.file_size(), 2 * ps);
    Ok(())
}

#[test]
fn page_writes_extend_file_without_grow_sync() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let db = Db::open(&path, &Options::default().no_grow_sync(true))?;
    let ps = db.page_size() as u64;

    db.write_page(5, &Page::new(PageFlags::DATA | PageFlags::FULL), b"tail")?;
    assert_eq!(file_len(&path), 6 * ps);
    assert_eq!(db.file_size(), 6 * ps);
    assert_eq!(db.page_header(5)?.len, 4);
    Ok(())
}

#[test]
fn grow_rejects_sizes_past_map_limit() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let db = Db::open(&path, &Options::default())?;
    let ps = db.page_size() as u64;
    let alloc = ALLOC_PAGES as u64 * ps;

    db.grow(alloc)?;
    assert!(matches!(
        db.grow(u64::MAX - 1),
        Err(Error::MapTooLarge { size }) if size == u64::MAX - 1
    ));
    assert!(matches!(
        db.grow(MAX_MAP_SIZE + 1),
        Err(Error::MapTooLarge { .. })
    ));
    assert_eq!(db.file_size(), alloc);
    assert_eq!(file_len(&path), alloc);
    assert_eq!(db.page_header(1)?.count, 0);
    Ok(())
}

#[test]
fn grow_is_rejected_when_read_only() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    Db::open(&path, &Options::default())?.close()?;

    let db = Db::open(&path, &read_only())?;
    assert!(matches!(db.grow(1 << 20), Err(Error::ReadOnly)));
    assert_eq!(file_len(&path), 2 * db.page_size() as u64);
    Ok(())
}

// --------------------- Remapping ---------------------

#[test]
fn write_past_mapping_grows_and_remaps() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);
    let db = Db::open(&path, &Options::default())?;
    let ps = db.page_size() as u64;
    let first_map = db.map_size();

    let id = (first_map / ps) as u32 + 4;
    db.write_page(id, &Page::new(PageFlags::DATA | PageFlags::FULL), &[])?;

    let end = (u64::from(id) + 1) * ps;
    assert!(db.file_size() >= end);
    assert!(db.map_size() >= end);
    assert!(db.map_size() > first_map);
    assert_eq!(db.head().page_count, id + 1);
    assert_eq!(db.page_header(id)?.count, 0);
    Ok(())
}

#[test]
fn remap_to_larger_minimum() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(db_path(&dir), &Options::default())?;

    db.remap(1 << 20)?;
    assert_eq!(db.map_size(), 1 << 20);
    assert_eq!(db.page_header(1)?.count, 0);
    Ok(())
}

#[test]
fn munmap_then_remap() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(db_path(&dir), &Options::default())?;

    db.munmap();
    db.munmap();
    assert_eq!(db.map_size(), 0);
    assert!(matches!(db.read_page(1), Err(Error::Closed)));

    db.remap(0)?;
    assert!(db.read_page(1).is_ok());
    Ok(())
}

#[test]
fn reader_remap_sees_growth_after_writer_closes() -> Result<()> {
    let dir = tempdir()?;
    let path = db_path(&dir);

    let writer = Db::open(&path, &Options::default())?;
    let ps = writer.page_size() as u64;
    writer.grow(6 * ps)?;
    writer.close()?;

    let reader = Db::open(&path, &read_only())?;
    assert_eq!(reader.file_size(), 6 * ps);
    reader.remap(0)?;
    assert_eq!(reader.file_size(), 6 * ps);
    Ok(())
}
