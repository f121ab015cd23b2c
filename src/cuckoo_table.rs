use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::ops::Index;

use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::capacity::CapacitySequence;
use crate::error::Error;
use crate::error::Result;
use crate::map::Map;

/// Evictions allowed per sub-table before an insert gives up and rehashes.
const MAX_EVICTIONS_PER_WAY: usize = 32;

/// Parameter draws tried at one capacity before a rehash grows instead.
const MAX_REHASH_ATTEMPTS: usize = 16;

/// Capacity steps an insert may take after its rehash retry fails. Only
/// keys whose candidates coincide under every draw (more than `ways` keys
/// sharing one hash) exhaust this.
const MAX_GROWTH_STEPS: usize = 4;

const DEFAULT_WAYS: usize = 2;
const MAX_WAYS: usize = 8;
const DEFAULT_SEED: u64 = 0x243F_6A88_85A3_08D3;

/// Grow before `len / total_slots` would reach the threshold for `ways`
/// sub-tables. Two-way cuckoo tables stop placing reliably just under 50%
/// load; more ways tolerate much denser tables.
#[inline(always)]
fn exceeds_load(len: usize, total_slots: usize, ways: usize) -> bool {
    let percent = match ways {
        2 => 45,
        3 => 80,
        _ => 90,
    };
    len as u128 * 100 >= total_slots as u128 * percent
}

/// Mersenne prime `2^61 - 1`, the field the universal family mixes in.
const MIXING_PRIME: u64 = (1 << 61) - 1;

/// One member of the universal family `(((a * x + b) mod 2^61-1) mod p) mod m`.
///
/// `a`/`b` are redrawn on every rehash and range over the whole mixing
/// field, so a redraw changes which 64-bit hashes collide. `p` comes from
/// [`CapacitySequence::divisor_pair`] and `m` is the sub-table capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniversalHash {
    a: u64,
    b: u64,
    modulus: u64,
    buckets: usize,
}

impl UniversalHash {
    fn generate(rng: &mut SmallRng, modulus: usize, buckets: usize) -> Self {
        Self {
            a: 1 + rng.next_u64() % (MIXING_PRIME - 1),
            b: rng.next_u64() % MIXING_PRIME,
            modulus: modulus as u64,
            buckets,
        }
    }

    /// Maps a key hash to a slot index in `0..buckets`.
    #[inline(always)]
    pub fn index(&self, hash: u64) -> usize {
        let mixed = (self.a as u128 * hash as u128 + self.b as u128) % MIXING_PRIME as u128;
        ((mixed as u64 % self.modulus) % self.buckets as u64) as usize
    }
}

#[derive(Clone)]
struct Bucket<K, V> {
    hash: u64,
    key: K,
    value: V,
}

fn empty_slots<K, V>(len: usize) -> Box<[Option<Bucket<K, V>>]> {
    (0..len).map(|_| None).collect()
}

/// A hash map using d-way cuckoo hashing.
///
/// The table is split into `d` sub-tables of equal capacity, each with its
/// own hash function, so every key has exactly `d` candidate slots and a
/// lookup examines at most `d` slots no matter how full the table is.
///
/// An insert that finds all of its candidates taken evicts the occupant of
/// one of them, which then moves to one of its own candidates, and so on.
/// If the chain runs past a fixed bound, the chain is rolled back, every
/// hash function is redrawn, all entries are reinserted, and the insert is
/// retried. If the retry fails too, the table grows and tries again. Growth
/// otherwise follows a load-factor trigger sized by the total slot count.
///
/// # Examples
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use probe_hash::CuckooTable;
/// use probe_hash::Error;
///
/// let mut table = CuckooTable::with_ways(3).unwrap();
/// for i in 0..1_000u32 {
///     table.insert(i, i * i).unwrap();
/// }
///
/// assert_eq!(table.get(&30), Ok(&900));
/// assert_eq!(table.insert(30, 0), Err(Error::DuplicateKey));
/// assert_eq!(table.remove(&30), Ok(900));
/// assert!(!table.contains_key(&30));
/// # }
/// ```
#[derive(Clone)]
pub struct CuckooTable<K, V, S> {
    /// `ways` sub-tables of `capacity` slots each, stored back to back.
    slots: Box<[Option<Bucket<K, V>>]>,
    functions: Vec<UniversalHash>,
    capacity: usize,
    sequence: CapacitySequence,

    len: usize,

    rng: SmallRng,
    hash_builder: S,
}

impl<K, V, S> Debug for CuckooTable<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(any(feature = "std", feature = "foldhash"))]
impl<K, V> CuckooTable<K, V, crate::DefaultHashBuilder> {
    /// Creates an empty two-way table at the minimum capacity, using the
    /// default hasher.
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// Creates an empty two-way table with room for at least `capacity`
    /// slots, using the default hasher.
    ///
    /// Fails with [`Error::InvalidArgument`] if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }

    /// Creates an empty table with `ways` sub-tables, using the default
    /// hasher.
    ///
    /// Fails with [`Error::InvalidArgument`] unless `2 <= ways <= 8`.
    pub fn with_ways(ways: usize) -> Result<Self> {
        Self::with_layout_and_hasher(ways, 1, Default::default())
    }
}

impl<K, V, S> Default for CuckooTable<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> CuckooTable<K, V, S> {
    /// Creates an empty two-way table at the minimum capacity with the given
    /// hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_parts(DEFAULT_WAYS, CapacitySequence::new(), hash_builder)
    }

    /// Creates an empty two-way table with room for at least `capacity`
    /// slots and the given hasher builder.
    ///
    /// Fails with [`Error::InvalidArgument`] if `capacity` is zero.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Result<Self> {
        Self::with_layout_and_hasher(DEFAULT_WAYS, capacity, hash_builder)
    }

    /// Creates an empty table with `ways` sub-tables and room for at least
    /// `capacity` slots in total.
    ///
    /// The per-sub-table capacity becomes the table's minimum: [`clear`]
    /// returns to it.
    ///
    /// [`clear`]: Self::clear
    pub fn with_layout_and_hasher(ways: usize, capacity: usize, hash_builder: S) -> Result<Self> {
        if !(2..=MAX_WAYS).contains(&ways) {
            return Err(Error::InvalidArgument {
                reason: "cuckoo tables need between 2 and 8 ways",
            });
        }
        if capacity == 0 {
            return Err(Error::InvalidArgument {
                reason: "capacity must be positive",
            });
        }

        let sequence = CapacitySequence::starting_at(capacity.div_ceil(ways));
        Ok(Self::with_parts(ways, sequence, hash_builder))
    }

    fn with_parts(ways: usize, sequence: CapacitySequence, hash_builder: S) -> Self {
        let mut table = Self {
            slots: Box::new([]),
            functions: Vec::with_capacity(ways),
            capacity: 0,
            sequence,
            len: 0,
            rng: SmallRng::seed_from_u64(DEFAULT_SEED),
            hash_builder,
        };
        table.reset(ways, sequence.minimum());
        table
    }

    /// Reseeds the generator that draws hash-function parameters and
    /// rehashes with the new parameters.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        let pending = self.take_all();
        self.rebuild(pending, self.capacity);
        self
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of sub-tables, which is also the number of candidate slots per
    /// key.
    #[inline]
    pub fn ways(&self) -> usize {
        self.functions.len()
    }

    /// Total number of slots across all sub-tables.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Ratio of entries to total slots.
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.slots.len() as f64
    }

    /// Returns a reference to the table's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Removes every entry and shrinks back to the minimum capacity.
    pub fn clear(&mut self) {
        self.reset(self.ways(), self.sequence.minimum());
        self.len = 0;
    }

    /// Iterates over `(key, value)` pairs, sub-table by sub-table.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }

    /// Iterates over `(key, value)` pairs with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.len,
        }
    }

    /// Iterates over keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Iterates over values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Removes every entry, yielding them sub-table by sub-table.
    ///
    /// The table is reset to its minimum capacity immediately, whether or not
    /// the iterator is consumed.
    pub fn drain(&mut self) -> IntoIter<K, V> {
        let remaining = self.len;
        let slots = core::mem::replace(&mut self.slots, Box::new([]));
        self.reset(self.ways(), self.sequence.minimum());
        self.len = 0;

        IntoIter {
            slots: slots.into_vec().into_iter(),
            remaining,
        }
    }

    /// Replaces the slot array with `ways * capacity` empty slots and draws
    /// fresh hash functions. Does not touch `len`.
    fn reset(&mut self, ways: usize, capacity: usize) {
        self.capacity = capacity;
        self.slots = empty_slots(ways * capacity);

        let mut moduli = Vec::with_capacity(ways + 1);
        let mut base = capacity;
        while moduli.len() < ways {
            let (p, q) = self.sequence.divisor_pair(base);
            moduli.push(p);
            moduli.push(q);
            base = q;
        }

        self.functions = moduli
            .into_iter()
            .take(ways)
            .map(|p| UniversalHash::generate(&mut self.rng, p, capacity))
            .collect();
    }

    /// Empties the slot array, returning every entry.
    fn take_all(&mut self) -> Vec<Bucket<K, V>> {
        let slots = core::mem::replace(&mut self.slots, Box::new([]));
        slots.into_vec().into_iter().flatten().collect()
    }

    #[inline(always)]
    fn slot_index(&self, way: usize, hash: u64) -> usize {
        way * self.capacity + self.functions[way].index(hash)
    }

    /// Places `bucket` in an empty candidate slot, evicting along the way if
    /// needed. On failure every eviction is rolled back and the bucket is
    /// handed back, leaving the table exactly as it was.
    fn place(&mut self, bucket: Bucket<K, V>) -> core::result::Result<(), Bucket<K, V>> {
        let ways = self.ways();

        let mut carry = bucket;
        for way in 0..ways {
            let idx = self.slot_index(way, carry.hash);
            if self.slots[idx].is_none() {
                self.slots[idx] = Some(carry);
                return Ok(());
            }
        }

        let mut trail = Vec::new();
        let mut way = 0;
        for _ in 0..MAX_EVICTIONS_PER_WAY * ways {
            let idx = self.slot_index(way, carry.hash);
            carry = match self.slots[idx].replace(carry) {
                Some(evicted) => evicted,
                None => return Ok(()),
            };
            trail.push(idx);

            // The evicted entry tries every candidate but the one it just
            // lost, then pushes into the next sub-table.
            for other in (0..ways).filter(|&w| w != way) {
                let idx = self.slot_index(other, carry.hash);
                if self.slots[idx].is_none() {
                    self.slots[idx] = Some(carry);
                    return Ok(());
                }
            }
            way = (way + 1) % ways;
        }

        for idx in trail.into_iter().rev() {
            carry = match self.slots[idx].replace(carry) {
                Some(previous) => previous,
                None => unreachable!("eviction trail only records occupied slots"),
            };
        }
        Err(carry)
    }

    /// Reinserts `pending` into fresh slot arrays, redrawing hash functions
    /// until every entry fits. After `MAX_REHASH_ATTEMPTS` failed draws at
    /// one capacity, moves on to the next capacity.
    fn rebuild(&mut self, mut pending: Vec<Bucket<K, V>>, mut capacity: usize) {
        let ways = self.ways();
        let mut attempts = 0;
        loop {
            if attempts == MAX_REHASH_ATTEMPTS {
                capacity = self.sequence.next(capacity);
                attempts = 0;
            }
            attempts += 1;

            self.reset(ways, capacity);
            let mut rest = pending.into_iter();
            let mut failed = None;
            for bucket in rest.by_ref() {
                if let Err(bucket) = self.place(bucket) {
                    failed = Some(bucket);
                    break;
                }
            }

            match failed {
                None => return,
                Some(bucket) => {
                    pending = self.take_all();
                    pending.push(bucket);
                    pending.extend(rest);
                }
            }
        }
    }

    /// Redraws every hash function and reinserts all entries at the current
    /// capacity.
    fn rehash(&mut self) {
        let pending = self.take_all();
        self.rebuild(pending, self.capacity);
    }

    #[cold]
    fn grow(&mut self, required: usize) {
        let ways = self.ways();
        let mut capacity = self.sequence.next(self.capacity);
        while exceeds_load(required, ways * capacity, ways) {
            capacity = self.sequence.next(capacity);
        }
        let pending = self.take_all();
        self.rebuild(pending, capacity);
    }
}

impl<K, V, S> CuckooTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts a new key.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is present. A key that
    /// cannot be placed triggers a full rehash and then, if needed, growth;
    /// [`Error::InsertionFailed`] is returned only when even that cannot
    /// separate it from the keys sharing its candidates. In both error cases
    /// the table's contents are unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        let hash = self.hash_builder.hash_one(&key);
        if self.search(hash, &key).0.is_some() {
            return Err(Error::DuplicateKey);
        }

        if exceeds_load(self.len + 1, self.capacity(), self.ways()) {
            self.grow(self.len + 1);
        }

        let bucket = Bucket { hash, key, value };
        let bucket = match self.place(bucket) {
            Ok(()) => {
                self.len += 1;
                return Ok(());
            }
            Err(bucket) => bucket,
        };

        self.rehash();
        let mut bucket = match self.place(bucket) {
            Ok(()) => {
                self.len += 1;
                return Ok(());
            }
            Err(bucket) => bucket,
        };

        for _ in 0..MAX_GROWTH_STEPS {
            let pending = self.take_all();
            self.rebuild(pending, self.sequence.next(self.capacity));
            bucket = match self.place(bucket) {
                Ok(()) => {
                    self.len += 1;
                    return Ok(());
                }
                Err(bucket) => bucket,
            };
        }
        Err(Error::InsertionFailed)
    }

    /// Returns a reference to the value for `key`, if present.
    #[inline]
    pub fn find(&self, key: &K) -> Option<&V> {
        if self.len == 0 {
            return None;
        }

        let hash = self.hash_builder.hash_one(key);
        let idx = self.search(hash, key).0?;
        self.slots[idx].as_ref().map(|b| &b.value)
    }

    /// Returns a mutable reference to the value for `key`, if present.
    #[inline]
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.len == 0 {
            return None;
        }

        let hash = self.hash_builder.hash_one(key);
        let idx = self.search(hash, key).0?;
        self.slots[idx].as_mut().map(|b| &mut b.value)
    }

    /// Returns `true` if `key` is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Reads the value for an existing key.
    pub fn get(&self, key: &K) -> Result<&V> {
        self.find(key).ok_or(Error::KeyNotFound)
    }

    /// Replaces the value for an existing key, returning the old one.
    ///
    /// Fails with [`Error::KeyNotFound`] rather than inserting.
    pub fn set(&mut self, key: &K, value: V) -> Result<V> {
        let slot = self.find_mut(key).ok_or(Error::KeyNotFound)?;
        Ok(core::mem::replace(slot, value))
    }

    /// Removes `key`, emptying its slot, and returns its value.
    pub fn remove(&mut self, key: &K) -> Result<V> {
        let hash = self.hash_builder.hash_one(key);
        let idx = self.search(hash, key).0.ok_or(Error::KeyNotFound)?;
        let bucket = self.slots[idx].take().ok_or(Error::KeyNotFound)?;
        self.len -= 1;
        Ok(bucket.value)
    }

    /// Examines the candidate slots for `key` in sub-table order. Returns the
    /// slot holding it, if any, and how many slots were examined (at most
    /// `ways`).
    fn search(&self, hash: u64, key: &K) -> (Option<usize>, usize) {
        let mut probes = 0;
        for way in 0..self.ways() {
            probes += 1;
            let idx = self.slot_index(way, hash);
            if let Some(bucket) = &self.slots[idx]
                && bucket.hash == hash
                && bucket.key == *key
            {
                return (Some(idx), probes);
            }
        }
        (None, probes)
    }
}

#[cfg(any(test, feature = "stats"))]
impl<K, V, S> CuckooTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Number of slots a lookup of `key` examines. Never more than
    /// [`ways`](Self::ways).
    pub fn probe_count(&self, key: &K) -> usize {
        self.search(self.hash_builder.hash_one(key), key).1
    }

    /// Histogram of successful-lookup probe lengths: bin `i` counts the
    /// entries stored in sub-table `i`.
    pub fn probe_histogram(&self) -> crate::stats::ProbeHistogram {
        let mut bins = alloc::vec![0; self.ways()];
        for (key, _) in self.iter() {
            bins[self.probe_count(key) - 1] += 1;
        }
        crate::stats::ProbeHistogram::new(bins)
    }

    /// Returns occupancy statistics for the table.
    pub fn debug_stats(&self) -> crate::stats::DebugStats {
        let total_slots = self.capacity();
        let slot_size = core::mem::size_of::<Option<Bucket<K, V>>>();
        crate::stats::DebugStats {
            populated: self.len,
            total_slots,
            tombstones: 0,
            ways: self.ways(),
            load_factor: self.load_factor(),
            slot_utilization: self.load_factor(),
            total_bytes: total_slots * slot_size,
            wasted_bytes: (total_slots - self.len) * slot_size,
        }
    }
}

impl<K, V, S> Index<&K> for CuckooTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.find(key).expect("key not found")
    }
}

impl<K, V, S> Map<K, V> for CuckooTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Iter<'a>
        = Iter<'a, K, V>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn insert(&mut self, key: K, value: V) -> Result<()> {
        CuckooTable::insert(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Result<V> {
        CuckooTable::remove(self, key)
    }

    fn find(&self, key: &K) -> Option<&V> {
        CuckooTable::find(self, key)
    }

    fn set(&mut self, key: &K, value: V) -> Result<V> {
        CuckooTable::set(self, key, value)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        CuckooTable::clear(self)
    }

    fn iter(&self) -> Iter<'_, K, V> {
        CuckooTable::iter(self)
    }
}

impl<'a, K, V, S> IntoIterator for &'a CuckooTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut CuckooTable<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> IntoIterator for CuckooTable<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            remaining: self.len,
            slots: self.slots.into_vec().into_iter(),
        }
    }
}

/// An iterator over the entries of a [`CuckooTable`].
pub struct Iter<'a, K, V> {
    slots: core::slice::Iter<'a, Option<Bucket<K, V>>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let bucket = self.slots.by_ref().flatten().next()?;
        self.remaining -= 1;
        Some((&bucket.key, &bucket.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            remaining: self.remaining,
        }
    }
}

/// A mutable iterator over the entries of a [`CuckooTable`].
pub struct IterMut<'a, K, V> {
    slots: core::slice::IterMut<'a, Option<Bucket<K, V>>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let bucket = self.slots.by_ref().flatten().next()?;
        self.remaining -= 1;
        Some((&bucket.key, &mut bucket.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// An iterator over the keys of a [`CuckooTable`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over the values of a [`CuckooTable`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// An owning iterator over the entries of a [`CuckooTable`], returned by
/// [`drain`](CuckooTable::drain) and `into_iter`.
pub struct IntoIter<K, V> {
    slots: alloc::vec::IntoIter<Option<Bucket<K, V>>>,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let bucket = self.slots.by_ref().flatten().next()?;
        self.remaining -= 1;
        Some((bucket.key, bucket.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;
    use core::hash::Hasher;

    use rand::Rng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    /// Sends every key to the same hash, so all keys share their candidate
    /// slots.
    #[derive(Default, Clone)]
    struct ConstantHasher;

    impl Hasher for ConstantHasher {
        fn finish(&self) -> u64 {
            7
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    type Constant = core::hash::BuildHasherDefault<ConstantHasher>;

    /// Hashes integers to themselves so tests can pick colliding keys.
    #[derive(Default, Clone)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | b as u64;
            }
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
    }

    type Identity = core::hash::BuildHasherDefault<IdentityHasher>;

    fn candidates<S>(table: &CuckooTable<u64, u64, S>, key: u64) -> Vec<usize> {
        (0..table.ways()).map(|way| table.slot_index(way, key)).collect()
    }

    fn sip_table<K, V>(ways: usize) -> CuckooTable<K, V, SipHashBuilder> {
        CuckooTable::with_layout_and_hasher(ways, 1, SipHashBuilder::default()).unwrap()
    }

    #[test]
    fn item_exists_after_adding() {
        let mut table = sip_table(2);
        for i in 0..100u64 {
            table.insert(i, i).unwrap();
        }
        for i in 0..100u64 {
            assert!(table.contains_key(&i), "{i} missing from {:#?}", table);
            assert_eq!(table.get(&i), Ok(&i));
        }
        assert_eq!(table.len(), 100);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut table = sip_table(2);
        table.insert(1u64, "one").unwrap();
        assert_eq!(table.insert(1, "uno"), Err(Error::DuplicateKey));
        assert_eq!(table.get(&1), Ok(&"one"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn get_set_and_index() {
        let mut table = sip_table(2);
        assert_eq!(table.set(&5u64, 50), Err(Error::KeyNotFound));
        assert!(table.is_empty(), "set must not insert");

        table.insert(5, 50).unwrap();
        assert_eq!(table.set(&5, 55), Ok(50));
        assert_eq!(table[&5], 55);
        assert_eq!(table.get(&6), Err(Error::KeyNotFound));
    }

    #[test]
    fn remove_then_reinsert() {
        let mut table = sip_table(2);
        for i in 0..20u64 {
            table.insert(i, i).unwrap();
        }
        assert_eq!(table.remove(&7), Ok(7));
        assert_eq!(table.remove(&7), Err(Error::KeyNotFound));
        assert!(!table.contains_key(&7));
        assert_eq!(table.len(), 19);

        table.insert(7, 70).unwrap();
        assert_eq!(table.get(&7), Ok(&70));
        assert_eq!(table.len(), 20);
    }

    #[test]
    fn lookup_is_bounded_by_ways() {
        for ways in 2..=4 {
            let mut table = sip_table(ways);
            for i in 0..5_000u64 {
                table.insert(i, i).unwrap();
            }
            for i in 0..5_000u64 {
                let probes = table.probe_count(&i);
                assert!((1..=ways).contains(&probes), "{probes} probes with {ways} ways");
            }
            for i in 5_000..6_000u64 {
                assert_eq!(table.probe_count(&i), ways);
            }

            let hist = table.probe_histogram();
            assert_eq!(hist.bins().len(), ways);
            assert_eq!(hist.bins().iter().sum::<usize>(), 5_000);
            assert!(hist.max_probes() <= ways);
        }
    }

    #[test]
    fn growth_preserves_entries() {
        let mut table = sip_table(2);
        let initial = table.capacity();
        assert_eq!(initial, 22);

        for i in 0..50u64 {
            table.insert(i, i * 3).unwrap();
        }
        assert!(table.capacity() > initial);
        assert_eq!(table.len(), 50);
        for i in 0..50u64 {
            assert_eq!(table.get(&i), Ok(&(i * 3)));
        }
        assert!(table.load_factor() < 0.45);
    }

    #[test]
    fn denser_with_more_ways() {
        let mut two = sip_table(2);
        let mut four = sip_table(4);
        for i in 0..2_000u64 {
            two.insert(i, ()).unwrap();
            four.insert(i, ()).unwrap();
        }
        assert!(four.load_factor() > two.load_factor());
    }

    #[test]
    fn failed_insert_leaves_table_unchanged() {
        let mut table: CuckooTable<u64, u64, Constant> = CuckooTable::default();
        table.insert(1, 10).unwrap();
        table.insert(2, 20).unwrap();

        // Both candidate slots for the shared hash are taken.
        assert_eq!(table.insert(3, 30), Err(Error::InsertionFailed));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&1), Ok(&10));
        assert_eq!(table.get(&2), Ok(&20));
        assert!(!table.contains_key(&3));

        let mut entries: Vec<(u64, u64)> = table.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort();
        assert_eq!(entries, vec![(1, 10), (2, 20)]);

        // A duplicate is still reported as a duplicate.
        assert_eq!(table.insert(1, 11), Err(Error::DuplicateKey));
    }

    #[test]
    fn fixed_hash_keys_never_fail() {
        for seed in 0..1_000u64 {
            let hasher = SipHashBuilder { k1: seed, k2: !seed };
            let mut table = CuckooTable::with_hasher(hasher);
            for i in 0..50u64 {
                assert_eq!(table.insert(i, i), Ok(()), "seed {seed}, key {i}");
            }
            assert_eq!(table.len(), 50);
            for i in 0..50u64 {
                assert_eq!(table.get(&i), Ok(&i), "seed {seed}");
            }
        }
    }

    #[test]
    fn cycle_resolves_after_rehash() {
        let mut table: CuckooTable<u64, u64, Identity> = CuckooTable::default();
        let first_draw = table.functions.clone();

        let shared = candidates(&table, 0);
        let twins: Vec<u64> = (1..1_000_000u64)
            .filter(|&k| candidates(&table, k) == shared)
            .take(2)
            .collect();
        assert_eq!(twins.len(), 2);

        table.insert(0, 0).unwrap();
        table.insert(twins[0], 1).unwrap();
        // Three keys, two shared candidate slots: placement cycles until the
        // functions are redrawn.
        table.insert(twins[1], 2).unwrap();

        assert_ne!(table.functions, first_draw);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&0), Ok(&0));
        assert_eq!(table.get(&twins[0]), Ok(&1));
        assert_eq!(table.get(&twins[1]), Ok(&2));
    }

    #[test]
    fn clone_is_independent() {
        let mut table = sip_table(3);
        for i in 0..100u64 {
            table.insert(i, i).unwrap();
        }

        let mut copy = table.clone();
        copy.set(&1, 100).unwrap();
        copy.remove(&2).unwrap();
        for i in 100..200u64 {
            copy.insert(i, i).unwrap();
        }

        assert_eq!(table.len(), 100);
        assert_eq!(table.get(&1), Ok(&1));
        assert_eq!(table.get(&2), Ok(&2));
        assert!(!table.contains_key(&150));

        assert_eq!(copy.len(), 199);
        assert_eq!(copy.get(&1), Ok(&100));
        assert!(!copy.contains_key(&2));

        let empty: CuckooTable<u64, u64, _> = sip_table(2);
        let empty_copy = empty.clone();
        assert!(empty_copy.is_empty());
        assert_eq!(empty_copy.capacity(), empty.capacity());
    }

    #[test]
    fn clear_resets_state() {
        let mut table = sip_table(3);
        let initial = table.capacity();
        for i in 0..500u64 {
            table.insert(i, i).unwrap();
        }
        assert!(table.capacity() > initial);

        table.clear();
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert_eq!(table.capacity(), initial);
        assert_eq!(table.ways(), 3);
        for i in 0..500u64 {
            assert!(!table.contains_key(&i));
        }

        table.insert(1, 1).unwrap();
        assert_eq!(table.get(&1), Ok(&1));
    }

    #[test]
    fn invalid_layouts() {
        for ways in [0usize, 1, 9] {
            let table = CuckooTable::<u64, u64, _>::with_layout_and_hasher(
                ways,
                16,
                SipHashBuilder::default(),
            );
            assert!(matches!(table, Err(Error::InvalidArgument { .. })), "{ways} ways");
        }
        let table =
            CuckooTable::<u64, u64, _>::with_capacity_and_hasher(0, SipHashBuilder::default());
        assert!(matches!(table, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn requested_capacity_sets_minimum() {
        let mut table =
            CuckooTable::with_capacity_and_hasher(200, SipHashBuilder::default()).unwrap();
        assert_eq!(table.capacity(), 2 * 127);
        for i in 0..500u64 {
            table.insert(i, i).unwrap();
        }
        table.clear();
        assert_eq!(table.capacity(), 2 * 127);
    }

    #[test]
    fn reseeding_keeps_entries() {
        let mut table = sip_table(2);
        for i in 0..30u64 {
            table.insert(i, i.to_string()).unwrap();
        }
        let table = table.with_seed(42);
        assert_eq!(table.len(), 30);
        for i in 0..30u64 {
            assert_eq!(table.get(&i), Ok(&i.to_string()));
        }
    }

    #[test]
    fn iterators() {
        let mut table = sip_table(2);
        for i in 0..10u64 {
            table.insert(i, i as i32).unwrap();
        }
        assert_eq!(table.iter().count(), 10);
        assert_eq!(table.iter().size_hint(), (10, Some(10)));

        for (_, v) in table.iter_mut() {
            *v *= 2;
        }
        let mut keys: Vec<u64> = table.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
        assert_eq!(table.values().sum::<i32>(), 90);

        let mut drained: Vec<(u64, i32)> = table.drain().collect();
        drained.sort();
        assert_eq!(drained.len(), 10);
        assert_eq!(drained[9], (9, 18));
        assert!(table.is_empty());
        assert!(table.find(&3).is_none());
    }

    #[test]
    fn random_operations_match_model() {
        let mut rng = SmallRng::seed_from_u64(0xc0ffee);
        let mut table = sip_table(2);
        let mut model = hashbrown::HashMap::new();

        for _ in 0..20_000 {
            let key: u64 = rng.random_range(0..1_024);
            match rng.random_range(0..4) {
                0 | 1 => {
                    let expected = if model.contains_key(&key) {
                        Err(Error::DuplicateKey)
                    } else {
                        model.insert(key, key);
                        Ok(())
                    };
                    assert_eq!(table.insert(key, key), expected);
                }
                2 => {
                    let expected = model.remove(&key).ok_or(Error::KeyNotFound);
                    assert_eq!(table.remove(&key), expected);
                }
                _ => assert_eq!(table.find(&key), model.get(&key)),
            }
            assert_eq!(table.len(), model.len());
        }

        for (k, v) in &table {
            assert_eq!(model.get(k), Some(v));
        }
        assert_eq!(table.iter().count(), model.len());
    }
}
