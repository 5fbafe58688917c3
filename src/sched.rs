//! `ProcessSystem`: the kernel singleton that owns the table lock and
//! exposes every lifecycle, scheduling, and introspection operation (§4).
//!
//! Wraps a single `Spinlock<Table>` covering the whole process table, rather
//! than a lock per process, so every lifecycle operation's critical section
//! is the entire table for its duration (§4.1, §9 Design Notes (d)).

use std::sync::atomic::{AtomicU64, Ordering};

use arrayvec::ArrayString;
use log::{debug, info, trace};

use crate::cpu::Cpu;
use crate::error::{SchedError, SchedResult};
use crate::fs::{FileSystemOps, InodeHandle, OpenFiles};
use crate::memory::MemoryOps;
use crate::param::{AGE_CUTOFF, NQUEUE, PRIORITY_MAX, PRIORITY_MIN};
use crate::policy::{pick_next, SchedPolicy, ACTIVE_POLICY};
use crate::proc::{Chan, Pid, Proc, ProcResources, ProcState, Tick};
use crate::sync::Spinlock;
use crate::table::Table;

/// Outcome of `waitx`: the reaped child's pid plus its accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitxReport {
    pub pid: Pid,
    pub rtime: Tick,
    pub wtime: Tick,
}

/// The kernel-wide process table plus its external collaborators.
pub struct ProcessSystem<M: MemoryOps, F: FileSystemOps> {
    table: Spinlock<Table>,
    memory: M,
    fs: F,
    tick: AtomicU64,
}

impl<M: MemoryOps, F: FileSystemOps> ProcessSystem<M, F> {
    pub fn new(memory: M, fs: F) -> Self {
        info!("process table initialized, policy = {:?}", ACTIVE_POLICY);
        Self {
            table: Spinlock::new(Table::new()),
            memory,
            fs,
            tick: AtomicU64::new(0),
        }
    }

    pub fn active_policy(&self) -> SchedPolicy {
        ACTIVE_POLICY
    }

    pub fn current_tick(&self) -> Tick {
        self.tick.load(Ordering::Relaxed)
    }

    /// Table index of the process currently running on `cpu`, if any.
    pub fn current(&self, cpu: &Cpu) -> Option<usize> {
        cpu.current()
    }

    pub fn pid_of(&self, cpu: &Cpu, idx: usize) -> SchedResult<Pid> {
        let guard = self.table.lock(cpu);
        if guard.get(idx).is_unused() {
            return Err(SchedError::NoSuchProcess);
        }
        Ok(guard.get(idx).pid)
    }

    /// Emits one `pid,cur_q,tick,event` line for offline MLFQ analysis.
    /// `event` is one of `Init`, `Exit`, `Aging`, `IO`.
    #[cfg(feature = "mlfq-trace")]
    fn mlfq_trace(&self, guard: &Table, pid: Pid, event: &str) {
        if let Some(idx) = guard.find_by_pid(pid) {
            let cur_q = guard.get(idx).cur_q.map(|q| q as i64).unwrap_or(-1);
            info!(target: "mlfq_trace", "{},{},{},{}", pid, cur_q, self.current_tick(), event);
        }
    }

    // ---- 4.2 Allocation ----------------------------------------------

    /// Claims a fresh UNUSED slot and assigns it a pid, releasing the lock
    /// before the (potentially expensive) resource allocation callers
    /// perform next. Leaves the slot in EMBRYO; on any failure after this
    /// point the caller must roll the slot back to UNUSED itself.
    fn claim_slot(&self, cpu: &Cpu, name: &str) -> SchedResult<(usize, Pid)> {
        let mut guard = self.table.lock(cpu);
        let idx = guard.find_unused().ok_or(SchedError::NoFreeSlot)?;
        let pid = guard.take_pid();
        let now = self.current_tick();
        let proc = guard.get_mut(idx);
        proc.state = ProcState::Embryo;
        proc.pid = pid;
        proc.name = ArrayString::from(name).unwrap_or_default();
        proc.ctime = now;
        proc.etime = now;
        trace!("claim_slot: pid {} at tick {}", pid, now);
        Ok((idx, pid))
    }

    /// `allocate()`: the entry point used to create the very first process.
    /// Builds a fresh address space and kernel stack rather than copying a
    /// parent's.
    pub fn allocate(&self, cpu: &Cpu, name: &str) -> SchedResult<Pid> {
        let (idx, _) = self.claim_slot(cpu, name)?;

        let resources = match (self.memory.alloc_kstack(), self.memory.new_address_space()) {
            (Some(kstack), Some(address_space)) => ProcResources {
                kstack,
                address_space,
            },
            (kstack, space) => {
                if let Some(k) = kstack {
                    self.memory.free_kstack(k);
                }
                if let Some(s) = space {
                    self.memory.free_address_space(s);
                }
                let mut guard = self.table.lock(cpu);
                guard.get_mut(idx).reset();
                return Err(SchedError::AllocationFailed);
            }
        };

        let mut guard = self.table.lock(cpu);
        let pid = {
            let proc = guard.get_mut(idx);
            proc.resources = Some(resources);
            self.init_scheduling_fields(proc);
            proc.state = ProcState::Runnable;
            proc.pid
        };
        info!("process {} created (allocate)", pid);
        #[cfg(feature = "mlfq-trace")]
        self.mlfq_trace(&guard, pid, "Init");
        Ok(pid)
    }

    fn init_scheduling_fields(&self, proc: &mut Proc) {
        proc.rtime = 0;
        proc.tmp_wtime = 0;
        proc.n_run = 0;
        proc.priority = crate::param::DEFAULT_PRIORITY;
        proc.io = false;
        proc.tickflag = None;
        proc.cur_q = if ACTIVE_POLICY.is_mlfq() { Some(0) } else { None };
        proc.position_priority = 0;
        proc.q = [0; NQUEUE];
    }

    // ---- 4.3 Fork -------------------------------------------------------

    /// Forks `parent_pid`, copying its address space and inheriting its open
    /// files and current directory via reference-count bumps.
    pub fn fork(&self, cpu: &Cpu, parent_pid: Pid) -> SchedResult<Pid> {
        let (parent_idx, parent_space, open_files, cwd, name) = {
            let guard = self.table.lock(cpu);
            let parent_idx = guard.find_by_pid(parent_pid).ok_or(SchedError::NoSuchProcess)?;
            let parent = guard.get(parent_idx);
            let parent_space = parent.resources.as_ref().unwrap().address_space;
            (
                parent_idx,
                parent_space,
                parent.open_files.dup_all(&self.fs),
                parent.cwd.as_ref().map(|c| self.fs.idup(c)),
                parent.name.clone(),
            )
        };

        let (idx, _) = self.claim_slot(cpu, name.as_str())?;

        let resources = match (self.memory.alloc_kstack(), self.memory.copy_address_space(parent_space)) {
            (Some(kstack), Some(address_space)) => ProcResources {
                kstack,
                address_space,
            },
            (kstack, space) => {
                if let Some(k) = kstack {
                    self.memory.free_kstack(k);
                }
                if let Some(s) = space {
                    self.memory.free_address_space(s);
                }
                let mut guard = self.table.lock(cpu);
                guard.get_mut(idx).reset();
                return Err(SchedError::AllocationFailed);
            }
        };

        let mut guard = self.table.lock(cpu);
        let child_pid = {
            let proc = guard.get_mut(idx);
            proc.resources = Some(resources);
            proc.open_files = open_files;
            proc.cwd = cwd;
            proc.parent = Some(parent_idx);
            self.init_scheduling_fields(proc);
            // Child's return value is zeroed by the trap-frame layer
            // (external); the core only needs to publish RUNNABLE.
            proc.state = ProcState::Runnable;
            proc.pid
        };
        debug!("process {} forked from {}", child_pid, parent_pid);
        #[cfg(feature = "mlfq-trace")]
        self.mlfq_trace(&guard, child_pid, "Init");
        Ok(child_pid)
    }

    // ---- 4.4 Exit ---------------------------------------------------

    /// `exit()`: tears down `pid`'s open files/cwd, re-parents its children
    /// to `init_idx`, wakes its parent, and transitions to ZOMBIE.
    ///
    /// Does not itself re-enter the scheduler (§4.8's "enters the scheduler
    /// without returning" is the trap layer's job in a real kernel); callers
    /// driving the scheduler loop by hand should treat a ZOMBIE return as
    /// "this slot must not be picked again".
    pub fn exit_current(&self, cpu: &Cpu, pid: Pid, init_idx: usize) -> SchedResult<()> {
        let mut guard = self.table.lock(cpu);
        let idx = guard.find_by_pid(pid).ok_or(SchedError::NoSuchProcess)?;
        if idx == init_idx {
            panic!("init process exiting");
        }

        self.fs.begin_op();
        {
            let proc = guard.get_mut(idx);
            proc.open_files.close_all(&self.fs);
            if let Some(cwd) = proc.cwd.take() {
                self.fs.iput(cwd);
            }
        }
        self.fs.end_op();

        let parent = guard.get(idx).parent;
        for child in guard.children_of(idx).collect::<Vec<_>>() {
            guard.get_mut(child).parent = Some(init_idx);
        }

        let now = self.current_tick();
        {
            let proc = guard.get_mut(idx);
            proc.etime = now;
            proc.state = ProcState::Zombie;
        }
        info!("process {} exited at tick {}", pid, now);
        #[cfg(feature = "mlfq-trace")]
        self.mlfq_trace(&guard, pid, "Exit");

        if let Some(parent_idx) = parent {
            self.wakeup1(&mut guard, Chan(parent_idx as u64));
        }
        drop(guard);
        if cpu.current() == Some(idx) {
            cpu.set_current(None);
        }
        Ok(())
    }

    // ---- 4.5 Wait / Waitx --------------------------------------------

    /// `wait` without the rtime/wtime accounting `waitx` reports.
    pub fn wait(&self, cpu: &Cpu, pid: Pid) -> SchedResult<Pid> {
        self.waitx(cpu, pid).map(|r| r.pid)
    }

    pub fn waitx(&self, cpu: &Cpu, pid: Pid) -> SchedResult<WaitxReport> {
        let mut guard = self.table.lock(cpu);
        loop {
            let caller_idx = guard.find_by_pid(pid).ok_or(SchedError::NoSuchProcess)?;
            if guard.children_of(caller_idx).next().is_none() {
                return Err(SchedError::NoChildren);
            }

            if let Some(child_idx) = guard
                .children_of(caller_idx)
                .find(|&c| guard.get(c).state == ProcState::Zombie)
            {
                let (child_pid, rtime, ctime, etime) = {
                    let child = guard.get(child_idx);
                    (child.pid, child.rtime, child.ctime, child.etime)
                };
                if let Some(res) = guard.get_mut(child_idx).resources.take() {
                    self.memory.free_kstack(res.kstack);
                    self.memory.free_address_space(res.address_space);
                }
                guard.get_mut(child_idx).reset();
                // wtime = etime - ctime - rtime + 1 (§4.5): corrects for a
                // child created, scheduled, and exited within one tick.
                // Computed in signed arithmetic so the "+1" can cancel a
                // negative intermediate instead of a premature clamp to 0
                // swallowing it (e.g. etime == ctime, rtime == 1 must give
                // wtime == 0, not 1).
                let wtime = (etime as i64 - ctime as i64 - rtime as i64 + 1).max(0) as u64;
                return Ok(WaitxReport {
                    pid: child_pid,
                    rtime,
                    wtime,
                });
            }

            if guard.get(caller_idx).killed {
                return Err(SchedError::Killed);
            }

            guard = self.sleep_locked(cpu, guard, Chan(caller_idx as u64));
        }
    }

    // ---- 4.6 Sleep and wakeup -----------------------------------------

    /// `sleep(chan, lk)`: since this rewrite has exactly one table lock,
    /// every caller already holds it (§9 Design Notes (d)), so the
    /// "foreign lock" handoff of the original design collapses to holding
    /// the same guard across the blocking wait.
    fn sleep_locked<'a>(
        &self,
        cpu: &'a Cpu,
        mut guard: crate::sync::SpinlockGuard<'a, Table>,
        chan: Chan,
    ) -> crate::sync::SpinlockGuard<'a, Table> {
        let idx = cpu.current().expect("sleep: no current process on this cpu");
        let mut went_to_io = false;
        {
            let proc = guard.get_mut(idx);
            if ACTIVE_POLICY.is_mlfq() && !proc.io {
                proc.io = true;
                went_to_io = true;
                let q = proc.cur_q.expect("MLFQ process without a queue");
                let pos = guard.queues[q].next_position();
                guard.get_mut(idx).position_priority = pos;
            }
            let proc = guard.get_mut(idx);
            proc.chan = Some(chan);
            proc.state = ProcState::Sleeping;
        }
        #[cfg(feature = "mlfq-trace")]
        if went_to_io {
            let pid = guard.get(idx).pid;
            self.mlfq_trace(&guard, pid, "IO");
        }
        #[cfg(not(feature = "mlfq-trace"))]
        let _ = went_to_io;
        drop(guard);
        if cpu.current() == Some(idx) {
            cpu.set_current(None);
        }
        // A real kernel re-enters the scheduler here and only returns once
        // woken; this host-testable core exposes wakeup as an explicit step
        // instead, so callers observe the SLEEPING state directly and must
        // re-lock before continuing.
        self.table.lock(cpu)
    }

    /// Public `sleep` entry point for callers outside the crate's own
    /// lifecycle operations (e.g. a stand-in driver or test harness).
    pub fn sleep(&self, cpu: &Cpu, chan: Chan) {
        let guard = self.table.lock(cpu);
        self.sleep_locked(cpu, guard, chan);
    }

    fn wakeup1(&self, guard: &mut crate::sync::SpinlockGuard<'_, Table>, chan: Chan) {
        for proc in guard.slots_mut() {
            if proc.state == ProcState::Sleeping && proc.chan == Some(chan) {
                proc.state = ProcState::Runnable;
                proc.chan = None;
                trace!("wakeup: pid {} on chan {:?}", proc.pid, chan);
            }
        }
    }

    /// `wakeup(chan)`: transitions every SLEEPING slot waiting on `chan` to
    /// RUNNABLE (invariant 2, testable property 7).
    pub fn wakeup(&self, cpu: &Cpu, chan: Chan) {
        let mut guard = self.table.lock(cpu);
        self.wakeup1(&mut guard, chan);
    }

    // ---- 4.7 Kill -------------------------------------------------------

    /// Sets the sticky `killed` flag on `pid`. If the target is SLEEPING it
    /// is woken to RUNNABLE so it observes the flag on its next trap return
    /// (the trap layer, not this crate, performs the actual termination).
    pub fn kill(&self, cpu: &Cpu, pid: Pid) -> SchedResult<()> {
        let mut guard = self.table.lock(cpu);
        let idx = guard.find_by_pid(pid).ok_or(SchedError::NoSuchProcess)?;
        let proc = guard.get_mut(idx);
        proc.killed = true;
        if proc.state == ProcState::Sleeping {
            proc.state = ProcState::Runnable;
            proc.chan = None;
        }
        info!("process {} killed", pid);
        Ok(())
    }

    // ---- 4.8 Per-CPU scheduler loop -------------------------------------

    /// One iteration of the scheduler loop (§4.8 steps 2-5, minus the actual
    /// context switch, which is delegated to `ctx`). Returns the pid
    /// scheduled, if any.
    pub fn schedule_once(
        &self,
        cpu: &Cpu,
        ctx: &dyn crate::context::ContextSwitch,
    ) -> Option<Pid> {
        let mut guard = self.table.lock(cpu);
        let idx = pick_next(&mut guard)?;
        let now = self.current_tick();

        let pid = {
            let proc = guard.get_mut(idx);
            proc.state = ProcState::Running;
            proc.n_run += 1;
            proc.tmp_wtime = 0;
            proc.io = false;
            if proc.tickflag != Some(now) {
                proc.tickflag = Some(now);
                proc.rtime += 1;
                if let Some(q) = proc.cur_q {
                    proc.q[q] += 1;
                }
            }
            proc.pid
        };

        cpu.set_current(Some(idx));
        drop(guard);
        // `ctx.switch_to` stands in for the process's entire running period;
        // a real kernel returns here only once the process has re-entered
        // the scheduler via `yield`/`sleep`/`exit`, at which point those
        // operations have already cleared `cpu`'s current-process pointer.
        // This no-op default leaves it set, so callers driving the loop by
        // hand (tests, the `setpriority` demo harness) must themselves call
        // `proc_yield`/`sleep`/`exit_current` to relinquish the CPU.
        ctx.switch_to(cpu.id(), pid);
        Some(pid)
    }

    /// `yield`: the running process voluntarily gives up the CPU, becoming
    /// RUNNABLE again. A no-op under FCFS ordering, since FCFS recomputes
    /// the same argmin on the next `schedule_once` (§9 Design Notes (b)).
    pub fn proc_yield(&self, cpu: &Cpu) {
        let mut guard = self.table.lock(cpu);
        if let Some(idx) = cpu.current() {
            let proc = guard.get_mut(idx);
            if proc.state == ProcState::Running {
                proc.state = ProcState::Runnable;
            }
            drop(guard);
            cpu.set_current(None);
        }
    }

    /// `mlfq_demote`: called by a stand-in trap layer once the running
    /// process's ticks served in its current queue reach `2^cur_q` (§4.9).
    pub fn mlfq_demote(&self, cpu: &Cpu, pid: Pid) -> SchedResult<()> {
        let mut guard = self.table.lock(cpu);
        let idx = guard.find_by_pid(pid).ok_or(SchedError::NoSuchProcess)?;
        let next_q = (guard.get(idx).cur_q.unwrap_or(0) + 1).min(NQUEUE - 1);
        let pos = guard.queues[next_q].next_position();
        let proc = guard.get_mut(idx);
        proc.cur_q = Some(next_q);
        proc.position_priority = pos;
        debug!("process {} demoted to queue {}", pid, next_q);
        Ok(())
    }

    // ---- 4.9 Tick handler -----------------------------------------------

    /// Invoked once per timer tick under the table lock (§4.9).
    pub fn tick(&self, cpu: &Cpu) {
        let mut guard = self.table.lock(cpu);
        let now = self.tick.fetch_add(1, Ordering::Relaxed) + 1;

        for proc in guard.slots_mut() {
            if proc.is_unused() {
                continue;
            }
            if proc.state == ProcState::Running && proc.tickflag != Some(now) {
                proc.tickflag = Some(now);
                proc.rtime += 1;
                proc.tmp_wtime = 0;
                if let Some(q) = proc.cur_q {
                    proc.q[q] += 1;
                }
            } else {
                proc.tmp_wtime += 1;
            }
        }

        if ACTIVE_POLICY.is_mlfq() {
            for idx in 0..guard.slots().len() {
                let promote = {
                    let proc = guard.get(idx);
                    !proc.is_unused()
                        && proc.tmp_wtime > AGE_CUTOFF
                        && proc.cur_q.map(|q| q > 0).unwrap_or(false)
                };
                if promote {
                    let cur_q = guard.get(idx).cur_q.unwrap();
                    let new_q = cur_q - 1;
                    let pos = guard.queues[new_q].next_position();
                    let proc = guard.get_mut(idx);
                    proc.cur_q = Some(new_q);
                    proc.position_priority = pos;
                    proc.tmp_wtime = 0;
                    trace!("process {} aged up to queue {}", proc.pid, new_q);
                    #[cfg(feature = "mlfq-trace")]
                    self.mlfq_trace(&guard, guard.get(idx).pid, "Aging");
                }
            }
        }
    }

    // ---- 4.10 Priority API ----------------------------------------------

    /// `set_priority(new, pid)`: clamps `new` into [0,100] and returns the
    /// prior value.
    pub fn set_priority(&self, cpu: &Cpu, new: i64, pid: Pid) -> SchedResult<u8> {
        let clamped = new.clamp(PRIORITY_MIN as i64, PRIORITY_MAX as i64) as u8;
        let mut guard = self.table.lock(cpu);
        let idx = guard.find_by_pid(pid).ok_or(SchedError::NoSuchProcess)?;
        let proc = guard.get_mut(idx);
        let old = proc.priority;
        proc.priority = clamped;
        Ok(old)
    }

    // ---- 4.11 Introspection ---------------------------------------------

    /// `procdetails`: one formatted line per non-UNUSED slot, taken under
    /// the lock.
    pub fn procdetails(&self, cpu: &Cpu) -> Vec<String> {
        let guard = self.table.lock(cpu);
        guard
            .slots()
            .iter()
            .filter(|p| !p.is_unused())
            .map(format_proc_line)
            .collect()
    }

    /// `procdump`: best-effort, lock-free; silently returns nothing if the
    /// lock is currently held elsewhere (§4.1, §4.11).
    pub fn procdump(&self) -> Option<Vec<String>> {
        let guard = self.table.try_lock()?;
        Some(
            guard
                .slots()
                .iter()
                .filter(|p| !p.is_unused())
                .map(format_proc_line)
                .collect(),
        )
    }

    pub fn with_table<R>(&self, cpu: &Cpu, f: impl FnOnce(&Table) -> R) -> R {
        let guard = self.table.lock(cpu);
        f(&guard)
    }

    pub fn cwd_of(&self, cpu: &Cpu, idx: usize) -> Option<InodeHandle> {
        let guard = self.table.lock(cpu);
        guard.get(idx).cwd.clone()
    }

    pub fn open_files_of(&self, cpu: &Cpu, idx: usize) -> OpenFiles {
        let guard = self.table.lock(cpu);
        guard.get(idx).open_files.clone()
    }
}


fn format_proc_line(p: &Proc) -> String {
    format!(
        "pid={} state={} prio={} rtime={} tmp_wtime={} n_run={} cur_q={} q={:?}",
        p.pid,
        p.state.as_str(),
        p.priority,
        p.rtime,
        p.tmp_wtime,
        p.n_run,
        p.cur_q.map(|q| q as i64).unwrap_or(-1),
        p.q,
    )
}
