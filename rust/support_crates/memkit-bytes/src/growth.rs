//! Growth policy: maps a required minimum capacity to the next allocated one.

/// Smallest capacity an array is ever given.
pub const MIN_ARRAY_CAPACITY: usize = 4;

/// Arrays double up to this capacity and grow by 1.2x beyond it.
pub const ARRAY_DOUBLING_LIMIT: usize = 1024;

/// Smallest text buffer capacity in bytes, excluding the terminator.
pub const MIN_TEXT_CAPACITY: usize = 64;

/// Doubling byte-capacity table for text buffers: 64 bytes to 64 MiB.
pub const TEXT_CAPACITY_STEPS: [usize; 21] = text_capacity_steps();

const fn text_capacity_steps() -> [usize; 21] {
    let mut steps = [0; 21];
    let mut i = 0;
    while i < steps.len() {
        steps[i] = MIN_TEXT_CAPACITY << i;
        i += 1;
    }
    steps
}

/// Next array capacity, starting from `current`, that holds `required`
/// elements.
///
/// Returns `None` if the capacity would overflow `usize`.
pub fn array_capacity(current: usize, required: usize) -> Option<usize> {
    let mut capacity = current.max(MIN_ARRAY_CAPACITY);
    while capacity < required {
        capacity = if capacity < ARRAY_DOUBLING_LIMIT {
            capacity.checked_mul(2)?
        } else {
            capacity.checked_add(capacity / 5)?
        };
    }
    Some(capacity)
}

/// Text buffer capacity for `required` bytes: the smallest table step that
/// fits, or past the table, the next multiple of the largest step.
pub fn text_capacity(required: usize) -> Option<usize> {
    if let Some(&step) = TEXT_CAPACITY_STEPS.iter().find(|&&step| step >= required) {
        return Some(step);
    }
    required.checked_next_multiple_of(TEXT_CAPACITY_STEPS[TEXT_CAPACITY_STEPS.len() - 1])
}
