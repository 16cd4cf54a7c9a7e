//! Memory statistics for MEMORY entries
//!
//! Byte counts come from [`CountingAllocator`] when the host binary installs
//! it, otherwise from the process resident/virtual size reported by the OS.
//! Without the allocator there is no cumulative allocation count, so
//! `total_alloc_bytes` is the peak resident size, which never decreases.
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: debug_rails::CountingAllocator = debug_rails::CountingAllocator;
//! ```

use serde::Serialize;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use sysinfo::{Pid, System as SysInfo};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);
static TOTAL_BYTES: AtomicU64 = AtomicU64::new(0);
static INSTALLED: OnceLock<bool> = OnceLock::new();
static PEAK_RESIDENT: AtomicU64 = AtomicU64::new(0);

/// System allocator wrapper tracking live and cumulative bytes
pub struct CountingAllocator;

impl CountingAllocator {
    fn record_alloc(size: usize) {
        LIVE_BYTES.fetch_add(size as u64, Ordering::Relaxed);
        TOTAL_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    }

    fn record_dealloc(size: usize) {
        LIVE_BYTES.fetch_sub(size as u64, Ordering::Relaxed);
    }

    /// True when this is the process's `#[global_allocator]`
    ///
    /// Decided once, by making an allocation and watching the counter.
    pub fn is_installed() -> bool {
        *INSTALLED.get_or_init(|| {
            let before = TOTAL_BYTES.load(Ordering::Relaxed);
            let buf = std::hint::black_box(Vec::<u8>::with_capacity(64));
            let after = TOTAL_BYTES.load(Ordering::Relaxed);
            drop(buf);
            after > before
        })
    }

    /// Currently allocated bytes
    pub fn live_bytes() -> u64 {
        LIVE_BYTES.load(Ordering::Relaxed)
    }

    /// Bytes allocated since start, never decreasing
    pub fn total_bytes() -> u64 {
        TOTAL_BYTES.load(Ordering::Relaxed)
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        Self::record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            Self::record_dealloc(layout.size());
            Self::record_alloc(new_size);
        }
        new_ptr
    }
}

/// Where the byte counts came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    Allocator,
    Process,
}

impl MemorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorySource::Allocator => "allocator",
            MemorySource::Process => "process",
        }
    }
}

/// Point-in-time memory figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub alloc_bytes: u64,
    pub total_alloc_bytes: u64,
    pub sys_bytes: u64,
    pub threads: usize,
    pub source: MemorySource,
}

impl MemoryStats {
    /// Read current figures; missing sources read as zero
    pub fn read() -> Self {
        let (resident, virtual_size) = process_memory().unwrap_or((0, 0));

        let (alloc_bytes, total_alloc_bytes, source) = if CountingAllocator::is_installed() {
            (
                CountingAllocator::live_bytes(),
                CountingAllocator::total_bytes(),
                MemorySource::Allocator,
            )
        } else {
            (resident, peak_resident(resident), MemorySource::Process)
        };

        Self {
            alloc_bytes,
            total_alloc_bytes,
            sys_bytes: virtual_size,
            threads: thread_count(),
            source,
        }
    }
}

/// Whole megabytes, rounded down
pub fn to_mb(bytes: u64) -> u64 {
    bytes / BYTES_PER_MB
}

/// (resident, virtual) bytes of this process
fn process_memory() -> Option<(u64, u64)> {
    let pid: Pid = sysinfo::get_current_pid().ok()?;
    let mut sys = SysInfo::new();
    if !sys.refresh_process(pid) {
        return None;
    }
    let process = sys.process(pid)?;
    Some((process.memory(), process.virtual_memory()))
}

/// Highest resident size seen by this process
fn peak_resident(resident: u64) -> u64 {
    let observed = resident.max(high_water_mark().unwrap_or(0));
    PEAK_RESIDENT.fetch_max(observed, Ordering::Relaxed).max(observed)
}

fn high_water_mark() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_hwm(&status)
}

/// `VmHWM:   1234 kB` from `/proc/<pid>/status`, in bytes
fn parse_vm_hwm(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmHWM:"))?;
    let kb = line["VmHWM:".len()..].trim().strip_suffix("kB")?.trim();
    kb.parse::<u64>().ok().map(|kb| kb * 1024)
}

/// Live OS threads of this process
fn thread_count() -> usize {
    std::fs::read_dir("/proc/self/task")
        .map(|entries| entries.count())
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mb_rounds_down() {
        assert_eq!(to_mb(0), 0);
        assert_eq!(to_mb(BYTES_PER_MB - 1), 0);
        assert_eq!(to_mb(3 * BYTES_PER_MB + 5), 3);
    }

    #[test]
    fn test_without_global_allocator_falls_back_to_process() {
        // this test binary keeps the system allocator
        assert!(!CountingAllocator::is_installed());

        let stats = MemoryStats::read();
        assert_eq!(stats.source, MemorySource::Process);
        assert!(stats.threads >= 1);
        assert!(stats.total_alloc_bytes >= stats.alloc_bytes);
    }

    #[test]
    fn test_process_total_never_decreases() {
        let first = MemoryStats::read().total_alloc_bytes;
        let high = peak_resident(first + BYTES_PER_MB);
        assert!(peak_resident(0) >= high);
        assert!(MemoryStats::read().total_alloc_bytes >= high);
    }

    #[test]
    fn test_parse_vm_hwm() {
        let status = "Name:\tdebugctl\nVmPeak:\t  20000 kB\nVmHWM:\t    1536 kB\nVmRSS:\t    1024 kB\n";
        assert_eq!(parse_vm_hwm(status), Some(1536 * 1024));
        assert_eq!(parse_vm_hwm("VmRSS:\t 1 kB\n"), None);
    }
}
