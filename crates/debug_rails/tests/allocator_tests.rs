//! Allocator Tests
//!
//! This test binary installs `CountingAllocator` as its global allocator, the
//! way a host binary would:
//!
//! 1. Installation is detected
//! 2. Live and cumulative byte counts follow real allocations
//! 3. MEMORY entries report `memory_source: allocator` with
//!    `total_alloc_mb >= alloc_mb`
//!
//! ## Running
//!
//! ```bash
//! cargo test -p debug_rails --test allocator_tests
//! ```

use debug_rails::{
    read_entries, state, CountingAllocator, DebugConfig, EntryType, Inspector, MemorySource,
    MemoryStats, StateValue,
};
use tempfile::TempDir;

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

const MB: usize = 1024 * 1024;

fn int(value: &StateValue) -> i64 {
    match value {
        StateValue::Int(i) => *i,
        other => panic!("expected an integer, got {:?}", other),
    }
}

// ============================================================================
// Counters
// ============================================================================

#[test]
fn test_installed_allocator_is_detected() {
    assert!(CountingAllocator::is_installed());
    assert_eq!(MemoryStats::read().source, MemorySource::Allocator);
}

#[test]
fn test_counts_follow_allocations() {
    let total_before = CountingAllocator::total_bytes();

    let block = std::hint::black_box(vec![7u8; 4 * MB]);
    assert!(CountingAllocator::total_bytes() >= total_before + (4 * MB) as u64);
    // other tests allocate concurrently, so only the cumulative figure is exact
    assert!(CountingAllocator::live_bytes() >= block.len() as u64);
    drop(block);

    let stats = MemoryStats::read();
    assert!(stats.total_alloc_bytes >= stats.alloc_bytes);
    assert!(stats.total_alloc_bytes >= total_before + (4 * MB) as u64);
}

// ============================================================================
// MEMORY entries
// ============================================================================

#[test]
fn test_memory_entry_reports_allocator_figures() {
    let temp = TempDir::new().unwrap();
    let config = DebugConfig::default().with_base_dir(temp.path());
    let inspector = Inspector::with_config("alloc", None, config);
    inspector.enable().unwrap();

    let held = std::hint::black_box(vec![1u8; 3 * MB]);
    inspector.memory("held", state! { "phase" => "load" });
    drop(held);
    inspector.memory("released", state! {});

    let path = inspector.debug_file().unwrap();
    inspector.close();

    let entries = read_entries(&path).unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        let state = &entry.entry.state;
        assert_eq!(entry.entry.entry_type, EntryType::Memory);
        assert_eq!(state["memory_source"], StateValue::from("allocator"));
        assert!(int(&state["total_alloc_mb"]) >= int(&state["alloc_mb"]));
        assert!(int(&state["total_alloc_mb"]) >= 3);
    }

    // cumulative bytes never go down, even after a release
    let held_total = int(&entries[0].entry.state["total_alloc_mb"]);
    let released_total = int(&entries[1].entry.state["total_alloc_mb"]);
    assert!(released_total >= held_total);
    assert!(int(&entries[0].entry.state["alloc_mb"]) >= 3);
}
