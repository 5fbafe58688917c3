//! The process table itself: a fixed-size array of slots plus the small
//! pieces of table-wide state (`nextpid`, the MLFQ queue metadata) that live
//! under the same lock as the slots (§4.1, §3 "Per-queue metadata").

use crate::mlfq::{fresh_queues, QueueMeta};
use crate::param::{NPROC, NQUEUE};
use crate::proc::{Pid, Proc};

/// Everything protected by the single table [`crate::sync::Spinlock`].
pub struct Table {
    procs: [Proc; NPROC],

    /// Source of pids; monotonically increasing, never reused (invariant 5).
    nextpid: Pid,

    /// Per-queue MLFQ metadata, indexed by queue level.
    pub queues: [QueueMeta; NQUEUE],

    /// Where the round-robin scan resumes on the next `pick_next` call; it
    /// keeps advancing across calls rather than restarting at slot 0 each
    /// time, so every runnable process gets a turn.
    pub(crate) rr_cursor: usize,
}

impl Table {
    pub fn new() -> Self {
        Self {
            procs: core::array::from_fn(|_| Proc::unused()),
            nextpid: 1,
            queues: fresh_queues(),
            rr_cursor: 0,
        }
    }

    pub fn slots(&self) -> &[Proc; NPROC] {
        &self.procs
    }

    pub fn slots_mut(&mut self) -> &mut [Proc; NPROC] {
        &mut self.procs
    }

    pub fn get(&self, idx: usize) -> &Proc {
        &self.procs[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Proc {
        &mut self.procs[idx]
    }

    /// Claims and returns the next pid, as `allocate` does under the lock.
    pub fn take_pid(&mut self) -> Pid {
        let pid = self.nextpid;
        self.nextpid += 1;
        pid
    }

    /// The first UNUSED slot, in table order, as `allocate` scans for one.
    pub fn find_unused(&self) -> Option<usize> {
        self.procs.iter().position(Proc::is_unused)
    }

    /// The slot holding `pid`, if it is still live (non-UNUSED).
    pub fn find_by_pid(&self, pid: Pid) -> Option<usize> {
        self.procs
            .iter()
            .position(|p| !p.is_unused() && p.pid == pid)
    }

    /// Indices of every non-UNUSED slot whose `parent` is `idx`.
    pub fn children_of(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.procs
            .iter()
            .enumerate()
            .filter(move |(_, p)| !p.is_unused() && p.parent == Some(idx))
            .map(|(i, _)| i)
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_are_monotonic() {
        let mut t = Table::new();
        assert_eq!(t.take_pid(), 1);
        assert_eq!(t.take_pid(), 2);
        assert_eq!(t.take_pid(), 3);
    }

    #[test]
    fn find_unused_scans_in_table_order() {
        let mut t = Table::new();
        assert_eq!(t.find_unused(), Some(0));
        t.get_mut(0).pid = 1;
        t.get_mut(0).state = crate::proc::ProcState::Embryo;
        assert_eq!(t.find_unused(), Some(1));
    }

    #[test]
    fn children_of_filters_by_parent_index() {
        let mut t = Table::new();
        for (idx, parent) in [(0, None), (1, Some(0)), (2, Some(0)), (3, Some(1))] {
            t.get_mut(idx).state = crate::proc::ProcState::Runnable;
            t.get_mut(idx).parent = parent;
        }
        let children: Vec<usize> = t.children_of(0).collect();
        assert_eq!(children, vec![1, 2]);
    }
}
