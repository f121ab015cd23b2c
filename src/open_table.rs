use alloc::boxed::Box;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::ops::Index;

use crate::capacity::CapacitySequence;
use crate::error::Error;
use crate::error::Result;
use crate::map::Map;
use crate::probe::ProbeHasher;

/// Grow once `live / capacity` reaches 0.65.
#[inline(always)]
fn exceeds_load(live: usize, capacity: usize) -> bool {
    live as u128 * 100 >= capacity as u128 * 65
}

/// Rebuild in place once live entries plus tombstones cover 85% of the
/// slots, so that misses keep hitting an `Empty` slot early.
#[inline(always)]
fn exceeds_residue(used: usize, capacity: usize) -> bool {
    used as u128 * 100 >= capacity as u128 * 85
}

/// State of one slot in the table.
///
/// `Empty` ends a search. `Tombstone` marks a removed entry: searches walk
/// past it, inserts may reuse it.
#[derive(Clone)]
enum Slot<K, V> {
    Empty,
    Tombstone,
    Occupied { hash: u64, key: K, value: V },
}

fn empty_slots<K, V>(capacity: usize) -> Box<[Slot<K, V>]> {
    (0..capacity).map(|_| Slot::Empty).collect()
}

/// A hash map using open addressing with double hashing.
///
/// All entries live in one contiguous slot array. A key's probe sequence is
/// derived from its hash by [`ProbeHasher`]; removal leaves a tombstone so
/// that entries further along a collision chain stay reachable. The table
/// grows to the next capacity of its [`CapacitySequence`] whenever the ratio
/// of live entries to slots reaches 0.65, dropping tombstones on the way.
///
/// Inserting a key that is already present fails with
/// [`Error::DuplicateKey`]; use [`set`](Self::set) to update a value.
///
/// # Examples
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use probe_hash::Error;
/// use probe_hash::OpenAddressingTable;
///
/// let mut table = OpenAddressingTable::new();
/// table.insert("apple", 3).unwrap();
/// table.insert("pear", 5).unwrap();
///
/// assert_eq!(table.insert("apple", 4), Err(Error::DuplicateKey));
/// assert_eq!(table.set(&"apple", 4), Ok(3));
/// assert_eq!(table[&"apple"], 4);
///
/// assert_eq!(table.remove(&"pear"), Ok(5));
/// assert_eq!(table.remove(&"pear"), Err(Error::KeyNotFound));
/// assert_eq!(table.len(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct OpenAddressingTable<K, V, S> {
    slots: Box<[Slot<K, V>]>,
    hasher: ProbeHasher,
    sequence: CapacitySequence,

    live: usize,
    tombstones: usize,

    hash_builder: S,
}

impl<K, V, S> Debug for OpenAddressingTable<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(any(feature = "std", feature = "foldhash"))]
impl<K, V> OpenAddressingTable<K, V, crate::DefaultHashBuilder> {
    /// Creates an empty table at the minimum capacity, using the default
    /// hasher.
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// Creates an empty table with at least `capacity` slots, using the
    /// default hasher.
    ///
    /// Fails with [`Error::InvalidArgument`] if `capacity` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use probe_hash::OpenAddressingTable;
    ///
    /// let table = OpenAddressingTable::<u64, u64, _>::with_capacity(100).unwrap();
    /// assert_eq!(table.capacity(), 127);
    ///
    /// assert!(OpenAddressingTable::<u64, u64, _>::with_capacity(0).is_err());
    /// # }
    /// ```
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<K, V, S> Default for OpenAddressingTable<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> OpenAddressingTable<K, V, S> {
    /// Creates an empty table at the minimum capacity with the given hasher
    /// builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_sequence(CapacitySequence::new(), hash_builder)
    }

    /// Creates an empty table with at least `capacity` slots and the given
    /// hasher builder.
    ///
    /// The requested capacity becomes the table's minimum: [`clear`] returns
    /// to it. Fails with [`Error::InvalidArgument`] if `capacity` is zero.
    ///
    /// [`clear`]: Self::clear
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument {
                reason: "capacity must be positive",
            });
        }
        Ok(Self::with_sequence(
            CapacitySequence::starting_at(capacity),
            hash_builder,
        ))
    }

    fn with_sequence(sequence: CapacitySequence, hash_builder: S) -> Self {
        let capacity = sequence.minimum();
        Self {
            slots: empty_slots(capacity),
            hasher: ProbeHasher::new(capacity),
            sequence,
            live: 0,
            tombstones: 0,
            hash_builder,
        }
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the table holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Ratio of live entries to slots. Always below 0.65 between calls.
    pub fn load_factor(&self) -> f64 {
        self.live as f64 / self.slots.len() as f64
    }

    /// Returns a reference to the table's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Removes every entry and shrinks back to the minimum capacity.
    pub fn clear(&mut self) {
        let capacity = self.sequence.minimum();
        self.slots = empty_slots(capacity);
        self.hasher = ProbeHasher::new(capacity);
        self.live = 0;
        self.tombstones = 0;
    }

    /// Iterates over `(key, value)` pairs in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.live,
        }
    }

    /// Iterates over `(key, value)` pairs in slot order, with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.live,
        }
    }

    /// Iterates over keys in slot order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Iterates over values in slot order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Removes every entry, yielding them in slot order.
    ///
    /// The table is reset to its minimum capacity immediately, whether or not
    /// the iterator is consumed.
    pub fn drain(&mut self) -> IntoIter<K, V> {
        let capacity = self.sequence.minimum();
        let slots = core::mem::replace(&mut self.slots, empty_slots(capacity));
        let remaining = self.live;
        self.hasher = ProbeHasher::new(capacity);
        self.live = 0;
        self.tombstones = 0;

        IntoIter {
            slots: slots.into_vec().into_iter(),
            remaining,
        }
    }
}

impl<K, V, S> OpenAddressingTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts a new key.
    ///
    /// The first tombstone on the key's probe sequence is reused, but the
    /// walk continues to the first empty slot to rule out a duplicate further
    /// along the chain. Fails with [`Error::DuplicateKey`] if the key is
    /// present, leaving its value untouched.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        let hash = self.hash_builder.hash_one(&key);

        let mut vacant = None;
        for pos in self.hasher.probe(hash) {
            match &self.slots[pos] {
                Slot::Empty => {
                    vacant = vacant.or(Some(pos));
                    break;
                }
                Slot::Tombstone => {
                    vacant = vacant.or(Some(pos));
                }
                Slot::Occupied { hash: h, key: k, .. } if *h == hash && *k == key => {
                    return Err(Error::DuplicateKey);
                }
                Slot::Occupied { .. } => {}
            }
        }

        let pos = vacant.ok_or(Error::TableFull)?;
        if matches!(self.slots[pos], Slot::Tombstone) {
            self.tombstones -= 1;
        }
        self.slots[pos] = Slot::Occupied { hash, key, value };
        self.live += 1;

        self.maybe_resize();
        Ok(())
    }

    /// Returns a reference to the value for `key`, if present.
    #[inline]
    pub fn find(&self, key: &K) -> Option<&V> {
        if self.live == 0 {
            return None;
        }

        match self.search(key).0 {
            Some(pos) => match &self.slots[pos] {
                Slot::Occupied { value, .. } => Some(value),
                _ => None,
            },
            None => None,
        }
    }

    /// Returns a mutable reference to the value for `key`, if present.
    #[inline]
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.live == 0 {
            return None;
        }

        match self.search(key).0 {
            Some(pos) => match &mut self.slots[pos] {
                Slot::Occupied { value, .. } => Some(value),
                _ => None,
            },
            None => None,
        }
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

    /// Removes `key`, leaving a tombstone in its slot, and returns its value.
    pub fn remove(&mut self, key: &K) -> Result<V> {
        if self.live == 0 {
            return Err(Error::KeyNotFound);
        }

        let pos = self.search(key).0.ok_or(Error::KeyNotFound)?;
        match core::mem::replace(&mut self.slots[pos], Slot::Tombstone) {
            Slot::Occupied { value, .. } => {
                self.live -= 1;
                self.tombstones += 1;
                Ok(value)
            }
            _ => unreachable!("search only returns occupied slots"),
        }
    }

    /// Grows until `additional` more entries fit under the load threshold.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.live.saturating_add(additional);
        let mut capacity = self.capacity();
        while exceeds_load(required, capacity) {
            capacity = self.sequence.next(capacity);
        }
        if capacity != self.capacity() {
            self.rebuild(capacity);
        }
    }

    /// Walks the probe sequence for `key`. Returns the slot holding it, if
    /// any, and how many slots were examined.
    fn search(&self, key: &K) -> (Option<usize>, usize) {
        let hash = self.hash_builder.hash_one(key);

        let mut probes = 0;
        for pos in self.hasher.probe(hash) {
            probes += 1;
            match &self.slots[pos] {
                Slot::Empty => return (None, probes),
                Slot::Occupied { hash: h, key: k, .. } if *h == hash && k == key => {
                    return (Some(pos), probes);
                }
                _ => {}
            }
        }

        (None, probes)
    }

    #[inline]
    fn maybe_resize(&mut self) {
        if exceeds_load(self.live, self.capacity()) {
            self.grow();
        } else if exceeds_residue(self.live + self.tombstones, self.capacity()) {
            self.rebuild(self.capacity());
        }
    }

    #[cold]
    fn grow(&mut self) {
        let mut capacity = self.sequence.next(self.capacity());
        while exceeds_load(self.live, capacity) {
            capacity = self.sequence.next(capacity);
        }
        self.rebuild(capacity);
    }

    /// Moves every live entry into a fresh slot array of `capacity` slots.
    /// Tombstones are dropped.
    fn rebuild(&mut self, capacity: usize) {
        let old = core::mem::replace(&mut self.slots, empty_slots(capacity));
        self.hasher = ProbeHasher::new(capacity);
        self.tombstones = 0;

        for slot in old.into_vec() {
            if let Slot::Occupied { hash, key, value } = slot {
                // A fresh table has no tombstones or duplicates, so the
                // first empty slot is the one.
                let pos = self
                    .hasher
                    .probe(hash)
                    .find(|&pos| matches!(self.slots[pos], Slot::Empty))
                    .expect("rebuilt table has a free slot for every live entry");
                self.slots[pos] = Slot::Occupied { hash, key, value };
            }
        }
    }
}

#[cfg(any(test, feature = "stats"))]
impl<K, V, S> OpenAddressingTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Number of slots a lookup of `key` examines.
    pub fn probe_count(&self, key: &K) -> usize {
        self.search(key).1
    }

    /// Histogram of successful-lookup probe lengths: bin `i` counts the
    /// entries found on probe `i + 1`.
    pub fn probe_histogram(&self) -> crate::stats::ProbeHistogram {
        let mut bins = alloc::vec::Vec::new();
        for (key, _) in self.iter() {
            let probes = self.probe_count(key);
            if bins.len() < probes {
                bins.resize(probes, 0);
            }
            bins[probes - 1] += 1;
        }
        crate::stats::ProbeHistogram::new(bins)
    }

    /// Returns occupancy statistics for the table.
    pub fn debug_stats(&self) -> crate::stats::DebugStats {
        let total_slots = self.capacity();
        crate::stats::DebugStats {
            populated: self.live,
            total_slots,
            tombstones: self.tombstones,
            ways: 1,
            load_factor: self.load_factor(),
            slot_utilization: (self.live + self.tombstones) as f64 / total_slots as f64,
            total_bytes: total_slots * core::mem::size_of::<Slot<K, V>>(),
            wasted_bytes: (total_slots - self.live) * core::mem::size_of::<Slot<K, V>>(),
        }
    }
}

impl<K, V, S> Index<&K> for OpenAddressingTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &K) -> &V {
        self.find(key).expect("key not found")
    }
}

impl<K, V, S> Map<K, V> for OpenAddressingTable<K, V, S>
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
        OpenAddressingTable::insert(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Result<V> {
        OpenAddressingTable::remove(self, key)
    }

    fn find(&self, key: &K) -> Option<&V> {
        OpenAddressingTable::find(self, key)
    }

    fn set(&mut self, key: &K, value: V) -> Result<V> {
        OpenAddressingTable::set(self, key, value)
    }

    fn len(&self) -> usize {
        self.live
    }

    fn clear(&mut self) {
        OpenAddressingTable::clear(self)
    }

    fn iter(&self) -> Iter<'_, K, V> {
        OpenAddressingTable::iter(self)
    }
}

impl<'a, K, V, S> IntoIterator for &'a OpenAddressingTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut OpenAddressingTable<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> IntoIterator for OpenAddressingTable<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            remaining: self.live,
            slots: self.slots.into_vec().into_iter(),
        }
    }
}

/// An iterator over the entries of an [`OpenAddressingTable`].
pub struct Iter<'a, K, V> {
    slots: core::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        for slot in self.slots.by_ref() {
            if let Slot::Occupied { key, value, .. } = slot {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
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

/// A mutable iterator over the entries of an [`OpenAddressingTable`].
pub struct IterMut<'a, K, V> {
    slots: core::slice::IterMut<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        for slot in self.slots.by_ref() {
            if let Slot::Occupied { key, value, .. } = slot {
                self.remaining -= 1;
                return Some((&*key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// An iterator over the keys of an [`OpenAddressingTable`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over the values of an [`OpenAddressingTable`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// An owning iterator over the entries of an [`OpenAddressingTable`],
/// returned by [`drain`](OpenAddressingTable::drain) and `into_iter`.
pub struct IntoIter<K, V> {
    slots: alloc::vec::IntoIter<Slot<K, V>>,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        for slot in self.slots.by_ref() {
            if let Slot::Occupied { key, value, .. } = slot {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
