//! Table sizing.
//!
//! [`CapacitySequence`] hands out the slot counts used when a table is
//! created, grown, or cleared, and the divisor pairs used as moduli by the
//! cuckoo hash family. Every capacity it produces is prime, which is what
//! lets double hashing visit every slot of the table (see
//! [`ProbeHasher`](crate::probe::ProbeHasher)).

/// Precomputed table capacities, each roughly double the previous one.
const PRIMES: &[usize] = &[
    11, 29, 61, 127, 257, 523, 1087, 2213, 4519, 9619, 19717, 40009, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

/// Precomputed hash moduli, growing by roughly 20% per step.
const DIVISORS: &[usize] = &[
    11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631, 761,
    919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103, 12143,
    14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631, 130363,
    156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403, 968897,
    1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559, 5999471,
    7199369,
];

/// Produces the capacities a table moves through as it grows.
///
/// A sequence is a small value owned by each table, so tables never share
/// sizing state. The only configurable part is the minimum capacity, which
/// is where a table starts and where [`clear`] sends it back to.
///
/// [`clear`]: crate::OpenAddressingTable::clear
///
/// # Examples
///
/// ```rust
/// use probe_hash::CapacitySequence;
///
/// let seq = CapacitySequence::new();
/// assert_eq!(seq.minimum(), 11);
/// assert_eq!(seq.next(11), 29);
///
/// // Growth never stalls, even past the precomputed list.
/// let huge = seq.next(7_199_369);
/// assert!(huge > 7_199_369);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacitySequence {
    minimum: usize,
}

impl Default for CapacitySequence {
    fn default() -> Self {
        Self::new()
    }
}

impl CapacitySequence {
    /// Creates a sequence starting at the smallest precomputed capacity.
    pub const fn new() -> Self {
        Self { minimum: PRIMES[0] }
    }

    /// Creates a sequence whose minimum is the first capacity that can hold
    /// `requested` slots.
    pub fn starting_at(requested: usize) -> Self {
        Self {
            minimum: Self::new().at_least(requested),
        }
    }

    /// The capacity a fresh (or cleared) table uses.
    #[inline]
    pub fn minimum(&self) -> usize {
        self.minimum
    }

    /// Returns the capacity that follows `current`.
    ///
    /// The result is always prime and strictly greater than `current`. Past
    /// the precomputed list, the next capacity is the first prime at or above
    /// `2 * current + 1`.
    ///
    /// # Panics
    ///
    /// Panics if the next capacity does not fit in a `usize`. A table that
    /// large cannot be allocated anyway.
    pub fn next(&self, current: usize) -> usize {
        if let Some(&prime) = PRIMES.iter().find(|&&p| p > current && p >= self.minimum) {
            return prime;
        }

        let floor = current
            .checked_mul(2)
            .and_then(|c| c.checked_add(1))
            .expect("capacity overflow");
        next_prime(floor.max(self.minimum))
    }

    /// Returns the smallest capacity in the sequence that is at least
    /// `requested`.
    pub fn at_least(&self, requested: usize) -> usize {
        let requested = requested.max(self.minimum);
        match PRIMES.iter().find(|&&p| p >= requested) {
            Some(&prime) => prime,
            None => next_prime(requested),
        }
    }

    /// Returns two moduli, both greater than `size`, for sizing a pair of
    /// independent hash functions.
    ///
    /// Past the precomputed list this falls back to `(3 * size + 1, size + 11)`.
    pub fn divisor_pair(&self, size: usize) -> (usize, usize) {
        if let Some(idx) = DIVISORS.iter().position(|&d| d > size)
            && let Some(&second) = DIVISORS.get(idx + 1)
        {
            return (DIVISORS[idx], second);
        }

        (
            size.saturating_mul(3).saturating_add(1),
            size.saturating_add(11),
        )
    }
}

fn next_prime(mut n: usize) -> usize {
    while !is_prime(n) {
        n = n.checked_add(1).expect("capacity overflow");
    }
    n
}

fn is_prime(n: usize) -> bool {
    if n < 4 {
        return n >= 2;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }

    let mut d = 5usize;
    while d.saturating_mul(d) <= n {
        if n % d == 0 || n % (d + 2) == 0 {
            return false;
        }
        d += 6;
    }
    true
}
