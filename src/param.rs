//! Compile-time sizing and tuning constants: every fixed-capacity limit the
//! rest of the crate relies on, centralized here instead of scattered as
//! magic numbers.

/// Maximum number of processes the table can hold at once.
pub const NPROC: usize = 64;

/// Maximum number of CPUs that may drive the scheduler concurrently.
pub const NCPU: usize = 8;

/// Maximum length of a process's debug name.
pub const MAXPROCNAME: usize = 16;

/// Open files per process (used only to size the stand-in file table).
pub const NOFILE: usize = 16;

/// Number of MLFQ queues (levels 0..=4).
pub const NQUEUE: usize = 5;

/// Ticks a RUNNABLE process may wait before MLFQ promotes it one queue.
pub const AGE_CUTOFF: u64 = 200;

/// Default static priority assigned on process creation.
pub const DEFAULT_PRIORITY: u8 = 60;

/// Inclusive lower bound for `set_priority`.
pub const PRIORITY_MIN: u8 = 0;

/// Inclusive upper bound for `set_priority`.
pub const PRIORITY_MAX: u8 = 100;

/// Time slice, in ticks, granted to a process running in MLFQ queue `level`.
pub const fn mlfq_timeslice(level: usize) -> u32 {
    1 << level
}
