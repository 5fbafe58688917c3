//! The memory subsystem's narrow contract (`setupkvm`, `inituvm`,
//! `allocuvm`, `deallocuvm`, `copyuvm`, `freevm`, `switchuvm`, `switchkvm`,
//! `kalloc`/`kfree`) that the scheduling core relies on without ever
//! implementing a real virtual-memory layer.
//!
//! The scheduling core never introspects a page table: it only asks the
//! memory subsystem to allocate, duplicate, and free an opaque
//! [`AddressSpace`], and to allocate/free an opaque [`KernelStack`]. Real
//! kernels back this with `vm.rs`/`kalloc.rs`; this crate ships
//! [`CountingMemory`], a host-testable stand-in that hands out unique ids
//! and can be configured to simulate exhaustion.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// An opaque kernel stack handle. Owned by exactly one process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelStack(u64);

/// An opaque address space (page directory + mappings) handle. Owned by
/// exactly one process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressSpace(u64);

/// The memory subsystem's contract, as consumed by the scheduling core.
pub trait MemoryOps: Send + Sync {
    /// `kalloc` a kernel stack page for a new process. `None` on exhaustion.
    fn alloc_kstack(&self) -> Option<KernelStack>;

    /// `kfree` a kernel stack freed during reap.
    fn free_kstack(&self, stack: KernelStack);

    /// `setupkvm` + `inituvm`: a fresh address space for a brand-new
    /// process (used by `allocate`, before the caller knows whether this
    /// will be the first process or a `fork` target).
    fn new_address_space(&self) -> Option<AddressSpace>;

    /// `copyuvm`: duplicate a parent's address space for `fork`.
    fn copy_address_space(&self, parent: AddressSpace) -> Option<AddressSpace>;

    /// `freevm`: release an address space during reap or rollback.
    fn free_address_space(&self, space: AddressSpace);
}

/// A simple, host-testable [`MemoryOps`] that hands out monotonically
/// increasing ids and tracks how many are outstanding, so tests can assert
/// that reaping a process actually released its resources (invariant 4 /
/// testable property 8) and can simulate exhaustion via `set_capacity`.
pub struct CountingMemory {
    next_id: AtomicU64,
    outstanding_stacks: AtomicUsize,
    outstanding_spaces: AtomicUsize,
    capacity: AtomicUsize,
}

impl CountingMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            outstanding_stacks: AtomicUsize::new(0),
            outstanding_spaces: AtomicUsize::new(0),
            capacity: AtomicUsize::new(capacity),
        }
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Outstanding kernel stacks not yet freed.
    pub fn outstanding_stacks(&self) -> usize {
        self.outstanding_stacks.load(Ordering::Relaxed)
    }

    /// Outstanding address spaces not yet freed.
    pub fn outstanding_spaces(&self) -> usize {
        self.outstanding_spaces.load(Ordering::Relaxed)
    }

    /// Lower the remaining capacity to simulate a kernel running low on
    /// physical memory. Each successful allocation consumes one unit.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    fn take_capacity(&self) -> bool {
        loop {
            let cur = self.capacity.load(Ordering::Relaxed);
            if cur == 0 {
                return false;
            }
            if self
                .capacity
                .compare_exchange(cur, cur - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}

impl Default for CountingMemory {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl MemoryOps for CountingMemory {
    fn alloc_kstack(&self) -> Option<KernelStack> {
        if !self.take_capacity() {
            return None;
        }
        self.outstanding_stacks.fetch_add(1, Ordering::Relaxed);
        Some(KernelStack(self.fresh_id()))
    }

    fn free_kstack(&self, _stack: KernelStack) {
        self.outstanding_stacks.fetch_sub(1, Ordering::Relaxed);
    }

    fn new_address_space(&self) -> Option<AddressSpace> {
        if !self.take_capacity() {
            return None;
        }
        self.outstanding_spaces.fetch_add(1, Ordering::Relaxed);
        Some(AddressSpace(self.fresh_id()))
    }

    fn copy_address_space(&self, _parent: AddressSpace) -> Option<AddressSpace> {
        self.new_address_space()
    }

    fn free_address_space(&self, _space: AddressSpace) {
        self.outstanding_spaces.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_outstanding_allocations() {
        let mem = CountingMemory::default();
        let stack = mem.alloc_kstack().unwrap();
        assert_eq!(mem.outstanding_stacks(), 1);
        mem.free_kstack(stack);
        assert_eq!(mem.outstanding_stacks(), 0);

        let space = mem.new_address_space().unwrap();
        assert_eq!(mem.outstanding_spaces(), 1);
        let child = mem.copy_address_space(space).unwrap();
        assert_eq!(mem.outstanding_spaces(), 2);
        mem.free_address_space(space);
        mem.free_address_space(child);
        assert_eq!(mem.outstanding_spaces(), 0);
    }

    #[test]
    fn exhaustion_returns_none() {
        let mem = CountingMemory::new(1);
        assert!(mem.alloc_kstack().is_some());
        assert!(mem.alloc_kstack().is_none());
    }

    #[test]
    fn ids_are_unique() {
        let mem = CountingMemory::default();
        let a = mem.alloc_kstack().unwrap();
        let b = mem.alloc_kstack().unwrap();
        assert_ne!(a, b);
    }
}
