//! `setpriority <new_priority> <pid>`: the user-space front end for
//! `syscall::sys_set_priority`, validated the way the original
//! `setPriority.c` validates its arguments before issuing the syscall.
//!
//! This binary has no kernel to talk to, so it spins up a small in-process
//! demo table, seeds it with one process, and issues the syscall against
//! that — a stand-in for the real syscall trap a user-space binary would
//! make.

use clap::Parser;

use rv6_sched::cpu::Cpu;
use rv6_sched::fs::RefcountedFs;
use rv6_sched::memory::CountingMemory;
use rv6_sched::sched::ProcessSystem;
use rv6_sched::syscall::sys_set_priority;

/// Update a process's static scheduling priority.
#[derive(Parser, Debug)]
#[command(name = "setpriority")]
struct Args {
    /// New priority, clamped into [0, 100].
    new_priority: i64,

    /// Target process id; must be positive.
    pid: i64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.pid < 0 {
        eprintln!("Error, Process id should be positive.");
        eprintln!("Priority is not updated.");
        std::process::exit(1);
    }

    if !(0..=100).contains(&args.new_priority) {
        eprintln!("Error, Priority should be a value in the range [0,100].");
        eprintln!("Priority is not updated.");
        std::process::exit(1);
    }

    let sys = ProcessSystem::new(CountingMemory::default(), RefcountedFs::default());
    let cpu = Cpu::new(0);
    let demo_pid = sys
        .allocate(&cpu, "demo")
        .expect("demo harness: initial allocation cannot fail");
    log::debug!("demo harness seeded pid {}", demo_pid);

    let old = sys_set_priority(&sys, &cpu, args.new_priority, args.pid);
    if old >= 0 {
        println!("Priority of pid {} updated.", args.pid);
        println!("Old priority: {}", old);
    } else {
        println!("Error, Process with pid {} does not exist.", args.pid);
        println!("Priority is not updated.");
    }
}
