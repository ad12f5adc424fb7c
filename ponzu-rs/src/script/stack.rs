//! Stack growth for the recursive parser and walker.
//!
//! Deeply nested scripts recurse once per level; `stacker` moves onto a
//! fresh segment when the remaining stack runs low instead of overflowing.

/// Space that must remain before recursing further.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated segment.
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if less than [`RED_ZONE`] is left.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
