//! Runtime-wide constants.

use std::time::Duration;

/// Shadow memory is managed at page granularity.
pub const PAGE_SIZE: usize = 4096;

/// Mask selecting the page-offset bits of an address.
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// Maximum number of function parameters the call slots can carry.
pub const MAX_FUNCTION_ARGS: usize = 256;

/// Default number of live expressions above which the garbage collector runs.
pub const DEFAULT_GC_THRESHOLD: usize = 5_000_000;

/// Default directory for emitted test cases.
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/output";

/// Per-query solver timeout.
pub const SOLVER_TIMEOUT: Duration = Duration::from_secs(10);

/// Size of the AFL-style edge coverage map.
pub const COVERAGE_MAP_SIZE: usize = 65536;

/// Number of times a branch site may generate queries before pruning mode
/// stops spending solver time on it.
pub const PRUNING_SITE_LIMIT: u32 = 16;

/// Compute the page base of an address.
pub const fn page_start(addr: usize) -> usize {
    addr & !PAGE_MASK
}

/// Compute the offset of an address into its page.
pub const fn page_offset(addr: usize) -> usize {
    addr & PAGE_MASK
}
