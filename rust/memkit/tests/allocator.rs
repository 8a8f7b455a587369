use std::io::{Read, Write};

use memkit::{Allocator, Array, ErrorKind, HeapAllocator, StaticArena};
use memkit_testkit::data_gen::write_sample_lines;

#[test]
fn test_second_heap_is_rejected_until_destroyed() {
    let heap = HeapAllocator::create().unwrap();
    let err = HeapAllocator::create().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
    assert!(heap.destroy().is_balanced());
    let again = HeapAllocator::create().unwrap();
    drop(again);
    HeapAllocator::create().unwrap();
}

#[test]
fn test_leak_is_reported_in_stats() {
    let heap = HeapAllocator::create().unwrap();
    let array = Array::<u8>::create(4, &heap).unwrap();
    std::mem::forget(array);
    let stats = heap.destroy();
    assert!(!stats.is_balanced());
    assert_eq!(stats.outstanding_allocations(), 1);
    assert_eq!(stats.outstanding_handles(), 0);
}

#[test]
fn test_tracked_files() -> anyhow::Result<()> {
    let sample = write_sample_lines(4)?;
    let heap = HeapAllocator::create()?;

    let mut file = heap.fopen(sample.path(), "rb")?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    assert_eq!(text.lines().count(), 4);
    heap.fclose(file)?;

    let mut file = heap.fopen(sample.path(), "a")?;
    writeln!(file, "line 4")?;
    heap.fclose(file)?;
    assert_eq!(std::fs::read_to_string(sample.path())?.lines().count(), 5);

    let err = heap.fopen(sample.path(), "rw").unwrap_err();
    assert!(err.is_invalid_arg());

    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("missing.txt");
    assert!(heap.fopen(&missing, "r").is_err());

    let stats = heap.destroy();
    assert_eq!(stats.opens, 2);
    assert_eq!(stats.closes, 2);
    assert!(stats.is_balanced());
    Ok(())
}

#[test]
fn test_unclosed_file_is_reported_in_stats() -> anyhow::Result<()> {
    let sample = write_sample_lines(1)?;
    let heap = HeapAllocator::create()?;
    let file = heap.open(sample.path(), std::fs::OpenOptions::new().read(true))?;
    drop(file);
    let stats = heap.destroy();
    assert_eq!(stats.outstanding_handles(), 1);
    assert!(!stats.is_balanced());
    Ok(())
}

#[test]
fn test_arena_and_heap_are_independent() {
    let mut buf = [0u8; 256];
    let heap = HeapAllocator::create().unwrap();
    let arena = StaticArena::create(&mut buf).unwrap();
    let on_heap = Array::<u32>::create(100, &heap).unwrap();
    let on_arena = Array::<u32>::create(4, &arena).unwrap();
    assert_eq!(heap.stats().allocations, 1);
    assert_eq!(arena.stats().allocations, 1);
    assert!(Array::<u32>::create(100, &arena).unwrap_err().is_out_of_memory());
    drop(on_heap);
    drop(on_arena);
    assert!(arena.destroy().is_balanced());
    assert!(heap.destroy().is_balanced());
}
