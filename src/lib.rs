//! Process table and scheduler core for a teaching xv6-style kernel.
//!
//! This crate implements the process-scheduling subsystem described in the
//! module docs below as a standalone, host-testable library rather than a
//! bootable kernel image: virtual memory, the file system, and the
//! trap/interrupt layer are modeled as narrow traits ([`memory::MemoryOps`],
//! [`fs::FileSystemOps`], [`context::ContextSwitch`]) with simple default
//! implementations, so the table, the lock discipline, and the four
//! scheduling policies can be exercised under genuine multi-threaded
//! concurrency without any of the surrounding kernel.

pub mod context;
pub mod cpu;
pub mod error;
pub mod fs;
pub mod memory;
pub mod mlfq;
pub mod param;
pub mod policy;
pub mod proc;
pub mod sched;
pub mod sync;
pub mod syscall;
pub mod table;

pub use cpu::{Cpu, CpuId};
pub use error::{SchedError, SchedResult};
pub use proc::{Chan, Pid, ProcState};
pub use sched::{ProcessSystem, WaitxReport};
