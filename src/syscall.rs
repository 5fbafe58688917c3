//! Thin syscall-boundary wrappers translating the core's `Result`-based API
//! into the C-like `i64` return convention a trap handler expects: success
//! is a non-negative value (a pid, or 0), failure is `-1`. One `sys_*`
//! function per core operation, for the trap layer to dispatch into.

use crate::cpu::Cpu;
use crate::fs::FileSystemOps;
use crate::memory::MemoryOps;
use crate::proc::Pid;
use crate::sched::ProcessSystem;

const FAIL: i64 = -1;

pub fn sys_fork<M: MemoryOps, F: FileSystemOps>(
    sys: &ProcessSystem<M, F>,
    cpu: &Cpu,
    parent_pid: Pid,
) -> i64 {
    sys.fork(cpu, parent_pid).unwrap_or(FAIL)
}

pub fn sys_exit<M: MemoryOps, F: FileSystemOps>(
    sys: &ProcessSystem<M, F>,
    cpu: &Cpu,
    pid: Pid,
    init_idx: usize,
) {
    // exit() never returns a value to its caller; errors here indicate a
    // broken kernel invariant (an unknown or already-reaped pid) and are
    // reported rather than swallowed.
    if let Err(e) = sys.exit_current(cpu, pid, init_idx) {
        log::error!("sys_exit({}): {}", pid, e);
    }
}

pub fn sys_wait<M: MemoryOps, F: FileSystemOps>(
    sys: &ProcessSystem<M, F>,
    cpu: &Cpu,
    pid: Pid,
) -> i64 {
    sys.wait(cpu, pid).unwrap_or(FAIL)
}

/// Returns `(pid, rtime, wtime)`, or `(-1, 0, 0)` on failure, mirroring the
/// `waitx(&wtime, &rtime)` out-parameter convention.
pub fn sys_waitx<M: MemoryOps, F: FileSystemOps>(
    sys: &ProcessSystem<M, F>,
    cpu: &Cpu,
    pid: Pid,
) -> (i64, i64, i64) {
    match sys.waitx(cpu, pid) {
        Ok(report) => (report.pid, report.rtime as i64, report.wtime as i64),
        Err(_) => (FAIL, 0, 0),
    }
}

pub fn sys_kill<M: MemoryOps, F: FileSystemOps>(
    sys: &ProcessSystem<M, F>,
    cpu: &Cpu,
    pid: Pid,
) -> i64 {
    match sys.kill(cpu, pid) {
        Ok(()) => 0,
        Err(_) => FAIL,
    }
}

pub fn sys_getpid<M: MemoryOps, F: FileSystemOps>(sys: &ProcessSystem<M, F>, cpu: &Cpu) -> i64 {
    cpu.current()
        .and_then(|idx| sys.pid_of(cpu, idx).ok())
        .unwrap_or(FAIL)
}

/// Returns the previous priority, or `-1` if `pid` does not exist.
pub fn sys_set_priority<M: MemoryOps, F: FileSystemOps>(
    sys: &ProcessSystem<M, F>,
    cpu: &Cpu,
    new_priority: i64,
    pid: Pid,
) -> i64 {
    sys.set_priority(cpu, new_priority, pid)
        .map(|old| old as i64)
        .unwrap_or(FAIL)
}
