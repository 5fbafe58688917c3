//! Per-process state: [`ProcState`], [`Proc`], and the small opaque types
//! (`Pid`, `Chan`) the rest of the crate threads through the table.

use arrayvec::ArrayString;

use crate::fs::{InodeHandle, OpenFiles};
use crate::memory::{AddressSpace, KernelStack};
use crate::param::{DEFAULT_PRIORITY, MAXPROCNAME, NQUEUE};

/// Process identity. Zero is reserved for UNUSED slots; real pids start at 1
/// and never repeat (invariant 5).
pub type Pid = i64;

/// A single timer tick.
pub type Tick = u64;

/// An opaque sleep/wakeup rendezvous token. Two processes sleeping/waking on
/// the same `Chan` rendezvous; the value itself is never dereferenced, only
/// compared for identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chan(pub u64);

/// The six states a process slot can be in (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Unused,
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

impl ProcState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcState::Unused => "unused",
            ProcState::Embryo => "embryo",
            ProcState::Sleeping => "sleep ",
            ProcState::Runnable => "runble",
            ProcState::Running => "run   ",
            ProcState::Zombie => "zombie",
        }
    }
}

/// Resources a live process slot owns for its lifetime; `None` once the slot
/// has been reaped back to UNUSED (invariant 4).
#[derive(Clone, Copy)]
pub struct ProcResources {
    pub kstack: KernelStack,
    pub address_space: AddressSpace,
}

/// One process-table slot.
///
/// Every field here is mutated only while the table's [`crate::sync::Spinlock`]
/// is held; there is exactly one lock for the whole table rather than one
/// per process.
pub struct Proc {
    pub pid: Pid,
    pub state: ProcState,

    /// Table index of the parent, or `None` for the initial process (or an
    /// UNUSED slot).
    pub parent: Option<usize>,

    pub name: ArrayString<MAXPROCNAME>,

    pub resources: Option<ProcResources>,
    pub open_files: OpenFiles,
    pub cwd: Option<InodeHandle>,

    /// Non-`None` iff `state == Sleeping` (invariant 2).
    pub chan: Option<Chan>,
    pub killed: bool,

    pub ctime: Tick,
    pub etime: Tick,
    pub rtime: Tick,
    pub tmp_wtime: Tick,
    pub n_run: u64,

    pub priority: u8,

    /// Set when the process has blocked for I/O during its current MLFQ
    /// residency; cleared each time it is scheduled.
    pub io: bool,

    /// Tick at which `rtime` was last bumped, guarding against
    /// double-counting when `tick()` and the scheduler observe the same
    /// tick for a process (see Design Notes (c)).
    pub tickflag: Option<Tick>,

    /// Current MLFQ queue, or `None` when MLFQ is not the active policy.
    pub cur_q: Option<usize>,
    pub position_priority: u64,
    pub q: [Tick; NQUEUE],
}

impl Proc {
    /// A zeroed, UNUSED slot.
    pub fn unused() -> Self {
        Self {
            pid: 0,
            state: ProcState::Unused,
            parent: None,
            name: ArrayString::new(),
            resources: None,
            open_files: OpenFiles::empty(),
            cwd: None,
            chan: None,
            killed: false,
            ctime: 0,
            etime: 0,
            rtime: 0,
            tmp_wtime: 0,
            n_run: 0,
            priority: DEFAULT_PRIORITY,
            io: false,
            tickflag: None,
            cur_q: None,
            position_priority: 0,
            q: [0; NQUEUE],
        }
    }

    pub fn is_unused(&self) -> bool {
        self.state == ProcState::Unused
    }

    /// Resets every field to the UNUSED state, as `wait`/`waitx` do once a
    /// zombie child's resources have been released.
    pub(crate) fn reset(&mut self) {
        *self = Self::unused();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_has_no_channel_and_default_priority() {
        let p = Proc::unused();
        assert!(p.is_unused());
        assert!(p.chan.is_none());
        assert_eq!(p.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn reset_clears_a_live_slot() {
        let mut p = Proc::unused();
        p.pid = 7;
        p.state = ProcState::Zombie;
        p.killed = true;
        p.reset();
        assert!(p.is_unused());
        assert_eq!(p.pid, 0);
        assert!(!p.killed);
    }
}
