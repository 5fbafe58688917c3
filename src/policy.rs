//! Scheduling policy dispatch (§4.8).
//!
//! Exactly one of {RR, FCFS, PBS, MLFQ} is selected at build time via Cargo
//! features, mirroring the original kernel's `#ifdef RR` / `#ifdef FCFS` /
//! ... build-time selection. `SchedPolicy` exists so the rest of the crate
//! (introspection, tests) can name the active policy without duplicating
//! the `cfg` ladder; `pick_next` is the actual dispatch.

use crate::proc::{Proc, ProcState};
use crate::table::Table;

#[cfg(all(feature = "sched-rr", feature = "sched-fcfs"))]
compile_error!("at most one of the sched-* features may be enabled");
#[cfg(all(feature = "sched-rr", feature = "sched-pbs"))]
compile_error!("at most one of the sched-* features may be enabled");
#[cfg(all(feature = "sched-rr", feature = "sched-mlfq"))]
compile_error!("at most one of the sched-* features may be enabled");
#[cfg(all(feature = "sched-fcfs", feature = "sched-pbs"))]
compile_error!("at most one of the sched-* features may be enabled");
#[cfg(all(feature = "sched-fcfs", feature = "sched-mlfq"))]
compile_error!("at most one of the sched-* features may be enabled");
#[cfg(all(feature = "sched-pbs", feature = "sched-mlfq"))]
compile_error!("at most one of the sched-* features may be enabled");

/// The four selectable scheduling policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    RoundRobin,
    Fcfs,
    Pbs,
    Mlfq,
}

impl SchedPolicy {
    pub fn is_mlfq(self) -> bool {
        matches!(self, SchedPolicy::Mlfq)
    }

    /// Whether the trap layer should force-yield on every tick under this
    /// policy (§4.8 / §6): true for RR and PBS, false for FCFS, and handled
    /// specially (slice exhaustion) for MLFQ.
    pub fn preempts_on_tick(self) -> bool {
        matches!(self, SchedPolicy::RoundRobin | SchedPolicy::Pbs)
    }
}

#[cfg(feature = "sched-fcfs")]
pub const ACTIVE_POLICY: SchedPolicy = SchedPolicy::Fcfs;
#[cfg(feature = "sched-pbs")]
pub const ACTIVE_POLICY: SchedPolicy = SchedPolicy::Pbs;
#[cfg(feature = "sched-mlfq")]
pub const ACTIVE_POLICY: SchedPolicy = SchedPolicy::Mlfq;
#[cfg(not(any(feature = "sched-fcfs", feature = "sched-pbs", feature = "sched-mlfq")))]
pub const ACTIVE_POLICY: SchedPolicy = SchedPolicy::RoundRobin;

/// Selects the next process to run under the active policy. Ties in FCFS,
/// PBS, and MLFQ are broken by table order, since each is implemented as a
/// single left-to-right scan that only replaces the champion on strict
/// improvement. Round robin instead resumes from where the previous pick
/// left off (see [`pick_round_robin`]).
pub fn pick_next(table: &mut Table) -> Option<usize> {
    match ACTIVE_POLICY {
        SchedPolicy::RoundRobin => {
            let (idx, next_cursor) = pick_round_robin(table.slots(), table.rr_cursor)?;
            table.rr_cursor = next_cursor;
            Some(idx)
        }
        SchedPolicy::Fcfs => pick_fcfs(table.slots()),
        SchedPolicy::Pbs => pick_pbs(table.slots()),
        SchedPolicy::Mlfq => pick_mlfq(table.slots()),
    }
}

fn runnable(procs: &[Proc]) -> impl Iterator<Item = (usize, &Proc)> {
    procs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.state == ProcState::Runnable)
}

/// Scans `procs` starting at `cursor` and wrapping around, keeping a cursor
/// that advances across successive calls instead of restarting at slot 0
/// each time, so a process that keeps yielding doesn't starve its peers.
/// Returns the selected index together with the cursor to resume from next.
fn pick_round_robin(procs: &[Proc], cursor: usize) -> Option<(usize, usize)> {
    let n = procs.len();
    if n == 0 {
        return None;
    }
    let start = cursor % n;
    (0..n)
        .map(|offset| (start + offset) % n)
        .find(|&idx| procs[idx].state == ProcState::Runnable)
        .map(|idx| (idx, (idx + 1) % n))
}

fn pick_fcfs(procs: &[Proc]) -> Option<usize> {
    runnable(procs)
        .min_by_key(|(_, p)| p.ctime)
        .map(|(i, _)| i)
}

fn pick_pbs(procs: &[Proc]) -> Option<usize> {
    runnable(procs)
        .min_by_key(|(_, p)| p.priority)
        .map(|(i, _)| i)
}

fn pick_mlfq(procs: &[Proc]) -> Option<usize> {
    runnable(procs)
        .min_by_key(|(_, p)| (p.cur_q.expect("MLFQ process without a queue"), p.position_priority))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable_proc(pid: i64, ctime: u64, priority: u8) -> Proc {
        let mut p = Proc::unused();
        p.pid = pid;
        p.state = ProcState::Runnable;
        p.ctime = ctime;
        p.priority = priority;
        p
    }

    #[test]
    fn round_robin_picks_first_runnable_at_or_after_the_cursor() {
        let mut procs = vec![Proc::unused(), runnable_proc(2, 5, 60), runnable_proc(3, 1, 60)];
        procs[0].state = ProcState::Sleeping;
        assert_eq!(pick_round_robin(&procs, 0), Some((1, 2)));
    }

    #[test]
    fn round_robin_wraps_around_the_end_of_the_table() {
        let procs = vec![runnable_proc(1, 0, 60), runnable_proc(2, 0, 60)];
        assert_eq!(pick_round_robin(&procs, 1), Some((1, 0)));
        assert_eq!(pick_round_robin(&procs, 0), Some((0, 1)));
    }

    #[test]
    fn round_robin_resumes_after_the_last_pick_even_if_that_slot_is_no_longer_runnable() {
        let mut procs = vec![runnable_proc(1, 0, 60), runnable_proc(2, 0, 60), runnable_proc(3, 0, 60)];
        procs[1].state = ProcState::Running;
        // Cursor left at 1 (the process just picked); it is no longer
        // RUNNABLE, so the scan should skip it and land on 2.
        assert_eq!(pick_round_robin(&procs, 1), Some((2, 0)));
    }

    #[test]
    fn fcfs_picks_lowest_ctime() {
        let procs = vec![
            runnable_proc(1, 10, 60),
            runnable_proc(2, 5, 60),
            runnable_proc(3, 12, 60),
        ];
        assert_eq!(pick_fcfs(&procs), Some(1));
    }

    #[test]
    fn fcfs_ties_break_by_table_order() {
        let procs = vec![runnable_proc(1, 5, 60), runnable_proc(2, 5, 60)];
        assert_eq!(pick_fcfs(&procs), Some(0));
    }

    #[test]
    fn pbs_picks_lowest_priority_value() {
        let procs = vec![
            runnable_proc(1, 0, 60),
            runnable_proc(2, 0, 20),
            runnable_proc(3, 0, 99),
        ];
        assert_eq!(pick_pbs(&procs), Some(1));
    }

    #[test]
    fn mlfq_picks_lowest_queue_then_position() {
        let mut procs = vec![runnable_proc(1, 0, 60), runnable_proc(2, 0, 60)];
        procs[0].cur_q = Some(1);
        procs[0].position_priority = 1;
        procs[1].cur_q = Some(0);
        procs[1].position_priority = 5;
        assert_eq!(pick_mlfq(&procs), Some(1));
    }

    #[test]
    fn non_runnable_slots_are_never_selected() {
        let mut procs = vec![runnable_proc(1, 0, 10)];
        procs[0].state = ProcState::Running;
        assert_eq!(pick_fcfs(&procs), None);
        assert_eq!(pick_pbs(&procs), None);
        assert_eq!(pick_round_robin(&procs, 0), None);
    }
}
