//! Double-hashing probe sequences.

/// Derives the two positional hashes used by double hashing from a key's
/// 64-bit hash, for a table with `capacity` slots.
///
/// - `h1 = hash mod m` picks the home slot.
/// - `h2 = hash mod (m - 1)` picks the stride, `step = 1 + h2`.
///
/// Attempt `i` lands on `(h1 + i * step) mod m`. Since `step` lies in
/// `1..m`, a prime `m` makes every stride coprime with the capacity and the
/// sequence visits each slot exactly once in its first `m` attempts.
/// [`CapacitySequence`](crate::CapacitySequence) only produces primes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeHasher {
    capacity: usize,
}

impl ProbeHasher {
    /// Creates a hasher for a table of `capacity` slots.
    ///
    /// `capacity` must be at least 2.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 2, "capacity {capacity} too small to probe");
        Self { capacity }
    }

    /// The slot count this hasher is parameterized by.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Home slot for `hash`, in `0..capacity`.
    #[inline(always)]
    pub fn primary(&self, hash: u64) -> usize {
        (hash % self.capacity as u64) as usize
    }

    /// Secondary hash for `hash`, in `0..capacity - 1`.
    #[inline(always)]
    pub fn secondary(&self, hash: u64) -> usize {
        (hash % (self.capacity - 1) as u64) as usize
    }

    /// Distance between consecutive probes for `hash`. Never zero.
    #[inline(always)]
    pub fn step(&self, hash: u64) -> usize {
        1 + self.secondary(hash)
    }

    /// Position of attempt `attempt` (0-based) for `hash`.
    #[inline]
    pub fn position(&self, hash: u64, attempt: usize) -> usize {
        let offset = (attempt as u128 * self.step(hash) as u128) % self.capacity as u128;
        (self.primary(hash) + offset as usize) % self.capacity
    }

    /// Returns the probe sequence for `hash`, bounded to `capacity` attempts.
    #[inline]
    pub fn probe(&self, hash: u64) -> ProbeSequence {
        ProbeSequence {
            position: self.primary(hash),
            step: self.step(hash),
            capacity: self.capacity,
            remaining: self.capacity,
        }
    }
}

/// Iterator over the slot positions visited for one key.
///
/// Yields at most `capacity` positions, which bounds every search.
#[derive(Debug, Clone)]
pub struct ProbeSequence {
    position: usize,
    step: usize,
    capacity: usize,
    remaining: usize,
}

impl Iterator for ProbeSequence {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.position;
        // Both terms are below `capacity`, so the sum cannot wrap for any
        // allocatable table.
        self.position = (self.position + self.step) % self.capacity;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ProbeSequence {}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn step_is_never_zero() {
        let hasher = ProbeHasher::new(11);
        for hash in 0..1000u64 {
            let step = hasher.step(hash);
            assert!((1..11).contains(&step), "step {step} for {hash}");
        }
    }

    #[test]
    fn multiples_of_capacity_share_a_home_slot() {
        let hasher = ProbeHasher::new(11);
        for key in [0u64, 11, 22, 33, 44] {
            assert_eq!(hasher.primary(key), 0);
        }
        assert_eq!(hasher.step(0), 1);
        assert_eq!(hasher.step(11), 2);
        assert_eq!(hasher.step(44), 5);
    }

    #[test]
    fn sequence_matches_position() {
        let hasher = ProbeHasher::new(29);
        for hash in [0u64, 7, 123_456, u64::MAX] {
            let walked: Vec<usize> = hasher.probe(hash).collect();
            let computed: Vec<usize> = (0..29).map(|i| hasher.position(hash, i)).collect();
            assert_eq!(walked, computed);
        }
    }

    #[test]
    fn prime_capacity_visits_every_slot() {
        for capacity in [11usize, 29, 61, 127] {
            let hasher = ProbeHasher::new(capacity);
            for hash in 0..(capacity as u64 * 3) {
                let mut seen = alloc::vec![false; capacity];
                for pos in hasher.probe(hash) {
                    assert!(!seen[pos], "slot {pos} revisited for {hash} in {capacity}");
                    seen[pos] = true;
                }
                assert!(seen.iter().all(|&s| s));
            }
        }
    }

    #[test]
    fn sequence_is_bounded() {
        let hasher = ProbeHasher::new(61);
        assert_eq!(hasher.probe(42).len(), 61);
        assert_eq!(hasher.probe(42).count(), 61);
    }
}
