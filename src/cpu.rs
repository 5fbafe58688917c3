//! Per-CPU state.
//!
//! One `Cpu` per hart, logically owned by exactly one host thread. The
//! mutable fields use `Cell` so a `Cpu` can be threaded through the table
//! lock as a shared reference instead of an exclusive one: taking the table
//! lock and touching `cpu.current()`/`push_off` are both things the owning
//! thread does while "holding" the same `Cpu`, and an exclusive borrow would
//! make that impossible to express.

use core::cell::Cell;

use crate::error::SchedResult;
use crate::proc::Pid;

/// Identifies one simulated hart/core.
pub type CpuId = usize;

/// Per-CPU scheduler state: which process (if any) is running here, and the
/// nested interrupt-disable depth used by [`crate::sync::Spinlock`].
pub struct Cpu {
    id: CpuId,

    /// Table index of the process currently RUNNING on this CPU, if any.
    current: Cell<Option<usize>>,

    /// Depth of `push_off()` nesting.
    noff: Cell<u32>,

    /// Were interrupts enabled before the first `push_off()`?
    interrupt_enabled: Cell<bool>,
}

impl Cpu {
    /// Creates a new, idle CPU with interrupts enabled.
    pub fn new(id: CpuId) -> Self {
        Self {
            id,
            current: Cell::new(None),
            noff: Cell::new(0),
            interrupt_enabled: Cell::new(true),
        }
    }

    pub fn id(&self) -> CpuId {
        self.id
    }

    /// Table index of the process this CPU is currently running, if any.
    pub fn current(&self) -> Option<usize> {
        self.current.get()
    }

    pub(crate) fn set_current(&self, slot: Option<usize>) {
        self.current.set(slot);
    }

    /// `push_off`: disable interrupts, remembering the pre-existing state the
    /// first time the nesting depth goes from 0 to 1. Matched by `pop_off`.
    pub(crate) fn push_off(&self) {
        let was_enabled = self.interrupt_enabled.get();
        if self.noff.get() == 0 {
            self.interrupt_enabled.set(was_enabled);
        }
        self.noff.set(self.noff.get() + 1);
    }

    /// `pop_off`: undo one `push_off`. Restores interrupts only once the
    /// nesting depth returns to 0 and they were enabled beforehand.
    pub(crate) fn pop_off(&self) {
        let noff = self.noff.get();
        assert!(noff >= 1, "pop_off: not holding the lock");
        self.noff.set(noff - 1);
    }

    /// Whether this CPU currently holds at least one `push_off` layer.
    pub(crate) fn holding(&self) -> bool {
        self.noff.get() > 0
    }

    /// Whether this CPU is currently holding any spinlock (`noff > 0`).
    pub fn holding_any_lock(&self) -> bool {
        self.holding()
    }

    /// Returns the pid running on this CPU, looking it up via `lookup`.
    pub fn current_pid(&self, lookup: impl FnOnce(usize) -> SchedResult<Pid>) -> Option<Pid> {
        self.current.get().and_then(|idx| lookup(idx).ok())
    }
}
