//! Create-once / destroy-once bookkeeping for allocator strategies.

use std::{cell::Cell, marker::PhantomData, thread::LocalKey};

use memkit_common::{Error, Result};

thread_local! {
    pub(crate) static HEAP_LIVE: Cell<bool> = const { Cell::new(false) };
    pub(crate) static ARENA_LIVE: Cell<bool> = const { Cell::new(false) };
}

/// Marks a strategy as live on the current thread for as long as it exists.
///
/// Holding a raw pointer marker keeps the owning allocator `!Send`, so the
/// flag is always cleared on the thread that set it.
pub(crate) struct Registration {
    slot: &'static LocalKey<Cell<bool>>,
    _not_send: PhantomData<*const ()>,
}

impl Registration {
    pub(crate) fn acquire(slot: &'static LocalKey<Cell<bool>>, strategy: &str) -> Result<Self> {
        if slot.with(|live| live.replace(true)) {
            return Err(Error::invalid_operation(format!(
                "{strategy}: an instance is already live on this thread"
            )));
        }
        Ok(Registration {
            slot,
            _not_send: PhantomData,
        })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.slot.with(|live| live.set(false));
    }
}
