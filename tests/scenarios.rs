//! Black-box scenarios driven entirely through `ProcessSystem`'s public API,
//! one per concrete walkthrough in the design notes.

use rv6_sched::context::CountingContextSwitch;
use rv6_sched::fs::RefcountedFs;
use rv6_sched::memory::CountingMemory;
use rv6_sched::sched::ProcessSystem;
use rv6_sched::{Chan, Cpu, ProcState};

fn harness() -> (ProcessSystem<CountingMemory, RefcountedFs>, Cpu, CountingContextSwitch) {
    (
        ProcessSystem::new(CountingMemory::default(), RefcountedFs::default()),
        Cpu::new(0),
        CountingContextSwitch::default(),
    )
}

#[test]
#[cfg(feature = "sched-fcfs")]
fn fcfs_schedules_strictly_in_creation_order() {
    let (sys, cpu, ctx) = harness();
    let first = sys.allocate(&cpu, "first").unwrap();
    let second = sys.allocate(&cpu, "second").unwrap();
    let third = sys.allocate(&cpu, "third").unwrap();

    // Creation order is the only thing FCFS looks at, so scheduling third
    // first changes nothing about who runs next.
    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(first));
    sys.proc_yield(&cpu);
    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(second));
    sys.proc_yield(&cpu);
    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(third));
}

#[test]
#[cfg(feature = "sched-pbs")]
fn pbs_preempts_the_running_process_when_a_lower_priority_arrives() {
    let (sys, cpu, ctx) = harness();
    let a = sys.allocate(&cpu, "a").unwrap();
    let b = sys.allocate(&cpu, "b").unwrap();

    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(a));

    // A is RUNNING; B is merely RUNNABLE at the default priority, so lowering
    // B's priority value (raising its urgency) cannot change anything until
    // A actually yields the CPU.
    sys.set_priority(&cpu, 0, b).unwrap();
    sys.proc_yield(&cpu);
    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(b));

    // A is back to RUNNABLE at the default priority; B just ran and yields.
    sys.proc_yield(&cpu);
    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(b));
}

#[test]
#[cfg(feature = "sched-mlfq")]
fn mlfq_runs_queue_zero_before_a_demoted_sibling() {
    let (sys, cpu, ctx) = harness();
    let a = sys.allocate(&cpu, "a").unwrap();
    let b = sys.allocate(&cpu, "b").unwrap();

    sys.mlfq_demote(&cpu, b).unwrap();

    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(a));
    sys.proc_yield(&cpu);
    // b is in queue 1 and a is back in queue 0 at a fresh position; queue 0
    // wins regardless of position within it.
    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(a));
}

#[test]
#[cfg(feature = "sched-mlfq")]
fn mlfq_blocking_for_io_requeues_at_the_tail_of_the_same_level() {
    let (sys, cpu, ctx) = harness();
    let a = sys.allocate(&cpu, "a").unwrap();
    let b = sys.allocate(&cpu, "b").unwrap();

    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(a));
    sys.sleep(&cpu, Chan(42));
    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(b));
    sys.wakeup(&cpu, Chan(42));
    sys.proc_yield(&cpu);

    // a blocked for I/O and was woken back into queue 0, but behind b, which
    // never left it; b's earlier FIFO position wins the tie.
    assert_eq!(sys.schedule_once(&cpu, &ctx), Some(b));
}

#[test]
fn waitx_accounts_rtime_and_wtime_across_a_scheduled_lifetime() {
    let (sys, cpu, ctx) = harness();
    let parent = sys.allocate(&cpu, "parent").unwrap();
    let child = sys.fork(&cpu, parent).unwrap();
    let init_idx = sys.with_table(&cpu, |t| t.find_by_pid(parent).unwrap());

    // Run the child for a couple of ticks before it exits.
    loop {
        if sys.schedule_once(&cpu, &ctx) == Some(child) {
            break;
        }
        sys.proc_yield(&cpu);
    }
    sys.tick(&cpu);
    sys.tick(&cpu);
    sys.exit_current(&cpu, child, init_idx).unwrap();

    let report = sys.waitx(&cpu, parent).unwrap();
    assert_eq!(report.pid, child);
    // Scheduled once (rtime 1) then ticked twice more while RUNNING (rtime 3
    // total); etime (2) - ctime (0) - rtime (3) + 1 == 0.
    assert_eq!(report.rtime, 3);
    assert_eq!(report.wtime, 0);
}

#[test]
fn exit_wakes_a_parent_blocked_in_wait() {
    let (sys, cpu, _ctx) = harness();
    let parent = sys.allocate(&cpu, "parent").unwrap();
    let child = sys.fork(&cpu, parent).unwrap();
    let parent_idx = sys.with_table(&cpu, |t| t.find_by_pid(parent).unwrap());
    let init_idx = parent_idx;

    assert_eq!(sys.with_table(&cpu, |t| t.get(parent_idx).state), ProcState::Runnable);
    sys.exit_current(&cpu, child, init_idx).unwrap();

    let reaped = sys.wait(&cpu, parent).unwrap();
    assert_eq!(reaped, child);
}

#[test]
fn killing_a_waiting_process_surfaces_as_waitx_killed_error() {
    let (sys, cpu, _ctx) = harness();
    let parent = sys.allocate(&cpu, "parent").unwrap();
    // A live (non-zombie) child so waitx doesn't short-circuit on NoChildren
    // before it ever reaches the killed check.
    let _child = sys.fork(&cpu, parent).unwrap();

    sys.kill(&cpu, parent).unwrap();
    assert_eq!(sys.waitx(&cpu, parent), Err(rv6_sched::SchedError::Killed));
}
