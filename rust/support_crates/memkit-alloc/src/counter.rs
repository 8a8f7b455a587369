//! Operation counters kept by every allocator instance.

use std::cell::Cell;

/// A single-threaded counter that can be bumped, deposited into and (if the
/// balance allows) withdrawn from, never going negative.
#[derive(Default)]
pub struct Counter(Cell<u64>);

impl Counter {
    /// Creates a new `Counter` with the given initial amount.
    pub fn new(amount: u64) -> Counter {
        Counter(Cell::new(amount))
    }

    /// Adds one to the counter.
    #[inline]
    pub fn increment(&self) {
        self.deposit(1);
    }

    /// Adds `amount` to the counter, saturating at `u64::MAX`.
    #[inline]
    pub fn deposit(&self, amount: u64) {
        self.0.set(self.0.get().saturating_add(amount));
    }

    /// Attempts to withdraw `amount`.
    ///
    /// Returns `false` and leaves the counter unchanged when the current value
    /// is smaller than `amount`.
    pub fn withdraw(&self, amount: u64) -> bool {
        let current = self.0.get();
        if current >= amount {
            self.0.set(current - amount);
            true
        } else {
            false
        }
    }

    /// Raises the counter to `value` if it is currently lower.
    #[inline]
    pub fn raise_to(&self, value: u64) {
        if value > self.0.get() {
            self.0.set(value);
        }
    }

    /// Returns the counter value.
    #[inline]
    pub fn read(&self) -> u64 {
        self.0.get()
    }

    /// Sets the counter to 0 and returns the previous value.
    pub fn drain(&self) -> u64 {
        self.0.replace(0)
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.read().fmt(f)
    }
}

/// Mutable statistics owned by an allocator instance.
#[derive(Debug, Default)]
pub struct AllocCounters {
    allocations: Counter,
    deallocations: Counter,
    reallocations: Counter,
    opens: Counter,
    closes: Counter,
    live_bytes: Counter,
    peak_bytes: Counter,
}

impl AllocCounters {
    pub fn new() -> AllocCounters {
        AllocCounters::default()
    }

    pub fn record_allocation(&self, size: usize) {
        self.allocations.increment();
        self.live_bytes.deposit(size as u64);
        self.peak_bytes.raise_to(self.live_bytes.read());
    }

    pub fn record_reallocation(&self, old_size: usize, new_size: usize) {
        self.reallocations.increment();
        if new_size >= old_size {
            self.live_bytes.deposit((new_size - old_size) as u64);
            self.peak_bytes.raise_to(self.live_bytes.read());
        } else {
            self.release_bytes(old_size - new_size);
        }
    }

    pub fn record_deallocation(&self, size: usize) {
        self.deallocations.increment();
        self.release_bytes(size);
    }

    pub fn record_open(&self) {
        self.opens.increment();
    }

    pub fn record_close(&self) {
        self.closes.increment();
    }

    /// Copies the current values out.
    pub fn snapshot(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.read(),
            deallocations: self.deallocations.read(),
            reallocations: self.reallocations.read(),
            opens: self.opens.read(),
            closes: self.closes.read(),
            live_bytes: self.live_bytes.read(),
            peak_bytes: self.peak_bytes.read(),
        }
    }

    fn release_bytes(&self, size: usize) {
        if !self.live_bytes.withdraw(size as u64) {
            // More bytes released than were handed out; clamp to zero.
            self.live_bytes.drain();
        }
    }
}

/// Point-in-time copy of an allocator's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    pub allocations: u64,
    pub deallocations: u64,
    pub reallocations: u64,
    pub opens: u64,
    pub closes: u64,
    /// Bytes currently handed out (arena: bytes consumed from the buffer).
    pub live_bytes: u64,
    pub peak_bytes: u64,
}

impl AllocStats {
    /// `true` when every allocation was released and every open was closed.
    pub fn is_balanced(&self) -> bool {
        self.allocations == self.deallocations && self.opens == self.closes
    }

    /// Allocations minus deallocations; negative after over-release.
    pub fn outstanding_allocations(&self) -> i64 {
        self.allocations as i64 - self.deallocations as i64
    }

    /// Opens minus closes.
    pub fn outstanding_handles(&self) -> i64 {
        self.opens as i64 - self.closes as i64
    }
}

/// Emits the teardown diagnostics for an allocator strategy.
pub(crate) fn report_teardown(strategy: &str, stats: &AllocStats) {
    if stats.allocations != stats.deallocations {
        log::warn!(
            "{strategy}: {} allocations, {} frees; possible memory leak ({} bytes live)",
            stats.allocations,
            stats.deallocations,
            stats.live_bytes,
        );
    }
    if stats.opens != stats.closes {
        log::warn!(
            "{strategy}: {} opens, {} closes; possible resource leak",
            stats.opens,
            stats.closes,
        );
    }
    if stats.is_balanced() {
        log::debug!(
            "{strategy}: balanced teardown ({} allocations, {} reallocations, peak {} bytes)",
            stats.allocations,
            stats.reallocations,
            stats.peak_bytes,
        );
    }
}
