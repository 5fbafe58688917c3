//! The context-switch primitive, per Design Notes: "assumed to be
//! provided". Real kernels implement `swtch` in hand-written assembly that
//! saves callee-saved registers, swaps stacks, and returns as if from the
//! other side's call site. This crate never needs to actually swap a stack
//! (there is no user-mode code to run), so [`ContextSwitch`] is a seam that
//! records *that* a switch happened rather than performing one.

/// A marker for "control passed from the scheduler to a process, or back",
/// matching the `swtch(&mut Context, &mut Context)` contract.
pub trait ContextSwitch: Send + Sync {
    /// Called once per scheduler iteration, immediately after a RUNNABLE
    /// process has been marked RUNNING and before control nominally passes
    /// to it.
    fn switch_to(&self, cpu_id: usize, pid: crate::proc::Pid);
}

/// A [`ContextSwitch`] that does nothing but count invocations; the default
/// used by the test suite and the `setpriority` demo harness.
#[derive(Default)]
pub struct CountingContextSwitch {
    switches: std::sync::atomic::AtomicU64,
}

impl CountingContextSwitch {
    pub fn count(&self) -> u64 {
        self.switches.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl ContextSwitch for CountingContextSwitch {
    fn switch_to(&self, _cpu_id: usize, _pid: crate::proc::Pid) {
        self.switches
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}
