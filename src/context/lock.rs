//! The two locks of a context and the evidence types that order them.
//!
//! The callback lock serializes user callbacks and is reentrant so a
//! callback may call back into the context. The state lock guards every
//! table. Whenever both are needed the callback lock comes first: a
//! [`CallbackGuard`] is the only way to reach [`ContextInner::lock_state`],
//! and asking for the callback lock while this thread holds the state lock
//! panics. User code runs only through [`StateGuard::unlocked`]; the
//! [`StateOnlyGuard`] handed out without the callback lock cannot run it.

use std::cell::Cell;
use std::ops::Deref;
use std::ops::DerefMut;
use std::time::Duration;

use parking_lot::Condvar;
use parking_lot::MutexGuard;
use parking_lot::ReentrantMutexGuard;

use super::ContextInner;
use super::ContextState;

thread_local! {
    static STATE_LOCK_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CALLBACK_LOCK_DEPTH: Cell<usize> = const { Cell::new(0) };
    static USER_CALLBACK_DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn bump(
    counter: &'static std::thread::LocalKey<Cell<usize>>,
    delta: isize,
) -> usize {
    counter.with(|c| {
        let next = c.get().wrapping_add_signed(delta);
        c.set(next);
        next
    })
}

/// Restores a thread-local counter on scope exit, unwinding included.
struct DepthScope {
    counter: &'static std::thread::LocalKey<Cell<usize>>,
    delta: isize,
}

impl DepthScope {
    fn enter(
        counter: &'static std::thread::LocalKey<Cell<usize>>,
        delta: isize,
    ) -> Self {
        bump(counter, delta);
        Self { counter, delta }
    }
}

impl Drop for DepthScope {
    fn drop(&mut self) {
        bump(self.counter, -self.delta);
    }
}

/// True while user code is running on this thread
pub(crate) fn in_user_callback() -> bool {
    USER_CALLBACK_DEPTH.with(|c| c.get() > 0)
}

fn holds_state_lock() -> bool {
    STATE_LOCK_DEPTH.with(|c| c.get() > 0)
}

/// Held callback lock. The outermost guard on a thread brackets its
/// lifetime with the notify target's begin/end hooks.
pub(crate) struct CallbackGuard<'a> {
    inner: &'a ContextInner,
    outermost: bool,
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl Drop for CallbackGuard<'_> {
    fn drop(&mut self) {
        if self.outermost {
            self.inner.notify.callback_processing_complete();
        }
        bump(&CALLBACK_LOCK_DEPTH, -1);
    }
}

/// The state mutex held by this thread. Both guard kinds wrap one.
struct HeldState<'a> {
    guard: MutexGuard<'a, ContextState>,
}

impl Drop for HeldState<'_> {
    fn drop(&mut self) {
        bump(&STATE_LOCK_DEPTH, -1);
    }
}

/// Held state lock under a held callback lock. The only guard that can run
/// user code.
pub(crate) struct StateGuard<'a> {
    held: HeldState<'a>,
    _callbacks: &'a CallbackGuard<'a>,
}

impl StateGuard<'_> {
    /// Run user code with the state lock released.
    pub(crate) fn unlocked<R>(
        &mut self,
        f: impl FnOnce() -> R,
    ) -> R {
        let _released = DepthScope::enter(&STATE_LOCK_DEPTH, -1);
        MutexGuard::unlocked(&mut self.held.guard, || {
            let _user = DepthScope::enter(&USER_CALLBACK_DEPTH, 1);
            f()
        })
    }
}

/// Held state lock without the callback lock. It has no way to release the
/// lock for user code.
pub(crate) struct StateOnlyGuard<'a> {
    held: HeldState<'a>,
}

impl StateOnlyGuard<'_> {
    /// Sleep on `condvar` with the state lock released, at most `timeout`.
    /// Returns false on timeout.
    pub(crate) fn wait_for(
        &mut self,
        condvar: &Condvar,
        timeout: Duration,
    ) -> bool {
        !condvar.wait_for(&mut self.held.guard, timeout).timed_out()
    }
}

impl Deref for StateGuard<'_> {
    type Target = ContextState;

    fn deref(&self) -> &ContextState {
        &self.held.guard
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut ContextState {
        &mut self.held.guard
    }
}

impl Deref for StateOnlyGuard<'_> {
    type Target = ContextState;

    fn deref(&self) -> &ContextState {
        &self.held.guard
    }
}

impl DerefMut for StateOnlyGuard<'_> {
    fn deref_mut(&mut self) -> &mut ContextState {
        &mut self.held.guard
    }
}

impl ContextInner {
    /// Acquire the callback lock.
    ///
    /// # Panics
    /// When this thread holds the state lock: the order is always callback
    /// lock, then state lock.
    pub(crate) fn callback_guard(&self) -> CallbackGuard<'_> {
        assert!(
            !holds_state_lock(),
            "callback lock requested while holding the context state lock"
        );
        let guard = self.callback_lock.lock();
        let outermost = bump(&CALLBACK_LOCK_DEPTH, 1) == 1;
        if outermost {
            self.notify.callback_processing_initiate();
        }
        CallbackGuard {
            inner: self,
            outermost,
            _guard: guard,
        }
    }

    /// Acquire the state lock under a held callback lock. The guard
    /// borrows `callbacks`, so the callback lock outlives it.
    ///
    /// # Panics
    /// When this thread already holds the state lock.
    pub(crate) fn lock_state<'a>(
        &'a self,
        callbacks: &'a CallbackGuard<'a>,
    ) -> StateGuard<'a> {
        StateGuard {
            held: self.hold_state(),
            _callbacks: callbacks,
        }
    }

    /// Acquire the state lock alone, for paths that never run user code.
    ///
    /// # Panics
    /// When this thread already holds the state lock.
    pub(crate) fn lock_state_only(&self) -> StateOnlyGuard<'_> {
        StateOnlyGuard {
            held: self.hold_state(),
        }
    }

    fn hold_state(&self) -> HeldState<'_> {
        assert!(!holds_state_lock(), "context state lock is not reentrant");
        let guard = self.state.lock();
        bump(&STATE_LOCK_DEPTH, 1);
        HeldState { guard }
    }
}
