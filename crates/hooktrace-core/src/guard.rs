//! Recursion guard for the trace path.
//!
//! While a thread is writing a trace event, every interposed call that the
//! writing itself performs (`open`, `write`, `close`, `getpid`, ...) must run
//! its real effect only. The flag is per thread: one thread emitting never
//! silences another.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Handle to the calling thread's recursion flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecursionGuard {
    _private: (),
}

impl RecursionGuard {
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// True while this thread holds a [`GuardToken`].
    ///
    /// During thread teardown the flag is unreadable; that counts as active so
    /// nothing is traced from destructors.
    pub fn is_active(&self) -> bool {
        ACTIVE.try_with(Cell::get).unwrap_or(true)
    }

    /// Set the flag, or return `None` if this thread already holds it.
    pub fn enter(&self) -> Option<GuardToken> {
        ACTIVE
            .try_with(|active| {
                if active.get() {
                    None
                } else {
                    active.set(true);
                    Some(GuardToken {
                        _not_send: PhantomData,
                    })
                }
            })
            .ok()
            .flatten()
    }
}

/// Proof that the calling thread holds the guard. Clears it on drop.
pub struct GuardToken {
    _not_send: PhantomData<*const ()>,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|active| active.set(false));
    }
}
