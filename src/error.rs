//! Recoverable error conditions surfaced at the system-call boundary.
//!
//! Programmer errors (sleeping without the table lock held, scheduling an
//! already-RUNNING process, the init process exiting, ...) are not part of
//! this enum: per the error-handling design, those indicate a broken kernel
//! invariant and are reported with `panic!`/`assert!` at the point of
//! violation rather than returned as a value.

use thiserror::Error;

/// Errors returned by the core process-table operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// `allocate` found no UNUSED slot in the table.
    #[error("no free process slot")]
    NoFreeSlot,

    /// A `MemoryOps`/kernel-stack allocation failed mid-`allocate`/`fork`.
    #[error("allocation failed")]
    AllocationFailed,

    /// `wait`/`waitx` was called by a process with no children.
    #[error("process has no children")]
    NoChildren,

    /// `kill`/`set_priority` referenced a pid not present in the table.
    #[error("no such process")]
    NoSuchProcess,

    /// The calling process was killed while blocked in `wait`/`waitx`.
    #[error("process was killed while waiting")]
    Killed,
}

/// Result type used throughout the core API.
pub type SchedResult<T> = Result<T, SchedError>;
