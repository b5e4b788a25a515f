//! Unbiased sampling of a 64-bit range.

use crate::entropy::EntropySource;

/// Return a random `n` with `from <= n < to`, uniformly distributed.
///
/// On a degenerate range (`to <= from`) or an entropy failure this returns
/// `to` rather than a value, so callers must treat any result `>= to` as a
/// failure.
///
/// Rejection sampling: each draw is right-shifted down to the minimal bit
/// window that can represent `range` and accepted when strictly below it.
/// No modulo reduction takes place, and the expected number of draws per
/// call is below 2.
pub fn uniform_in_range(entropy: &mut dyn EntropySource, from: u64, to: u64) -> u64 {
    if to <= from {
        return to;
    }
    let range = to - from;
    let shift = range.leading_zeros();

    loop {
        let Ok(raw) = entropy.next_u64() else {
            return to;
        };
        let n = raw >> shift;
        if n < range {
            return from + n;
        }
    }
}
