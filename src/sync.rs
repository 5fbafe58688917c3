//! The table spinlock.
//!
//! Acquiring bumps the owning `Cpu`'s `push_off` nesting counter before
//! locking the underlying mutex, and releasing pops it afterward, so
//! interrupt-disable and mutual exclusion are always paired. The actual
//! mutual exclusion is delegated to `spin::Mutex`, since this crate runs on
//! a host OS rather than bare metal.

use core::ops::{Deref, DerefMut};

use spin::Mutex;

use crate::cpu::Cpu;

/// A mutual-exclusion lock that disables the owning CPU's interrupts for as
/// long as it is held.
pub struct Spinlock<T> {
    inner: Mutex<T>,
}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            inner: Mutex::new(data),
        }
    }

    /// Acquires the lock, disabling `cpu`'s interrupts for the guard's
    /// lifetime. Panics if `cpu` already holds the lock nested past what the
    /// underlying mutex would allow (the mutex itself is not reentrant).
    pub fn lock<'a>(&'a self, cpu: &'a Cpu) -> SpinlockGuard<'a, T> {
        cpu.push_off();
        let guard = self.inner.lock();
        SpinlockGuard { guard, cpu }
    }

    /// Best-effort, lock-free read, for introspection paths that must never
    /// block (e.g. a `procdump` running from a context where taking the
    /// table lock could wedge an already-stuck machine). Callers must not
    /// write through the returned reference's lifetime being held elsewhere.
    pub fn try_lock(&self) -> Option<spin::MutexGuard<'_, T>> {
        self.inner.try_lock()
    }
}

/// RAII guard returned by [`Spinlock::lock`]. Releasing re-enables the
/// owning CPU's interrupts once the nesting depth returns to zero.
pub struct SpinlockGuard<'a, T> {
    guard: spin::MutexGuard<'a, T>,
    cpu: &'a Cpu,
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.cpu.pop_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_disables_and_release_restores() {
        let cpu = Cpu::new(0);
        let lock = Spinlock::new(0u32);
        assert!(!cpu.holding_any_lock());
        {
            let mut guard = lock.lock(&cpu);
            assert!(cpu.holding_any_lock());
            *guard += 1;
        }
        assert!(!cpu.holding_any_lock());
        assert_eq!(*lock.try_lock().unwrap(), 1);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let cpu = Cpu::new(0);
        let lock = Spinlock::new(());
        let _guard = lock.lock(&cpu);
        assert!(lock.try_lock().is_none());
    }
}
