use crate::error::Error;
use crate::error::Result;

/// The map contract shared by [`OpenAddressingTable`] and [`CuckooTable`].
///
/// Code that only needs insert/remove/lookup/iterate can be written once
/// against this trait and run over either collision strategy.
///
/// Unlike `std::collections::HashMap`, inserting a key that is already
/// present is an error ([`Error::DuplicateKey`]) rather than an overwrite;
/// updates go through [`set`](Map::set).
///
/// [`OpenAddressingTable`]: crate::OpenAddressingTable
/// [`CuckooTable`]: crate::CuckooTable
///
/// # Examples
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use probe_hash::CuckooTable;
/// use probe_hash::Map;
/// use probe_hash::OpenAddressingTable;
///
/// fn count_words<M: Map<&'static str, u32>>(map: &mut M, text: &'static str) {
///     for word in text.split_whitespace() {
///         match map.get(&word) {
///             Ok(&n) => {
///                 map.set(&word, n + 1).unwrap();
///             }
///             Err(_) => map.insert(word, 1).unwrap(),
///         }
///     }
/// }
///
/// let text = "the cat and the hat and the bat";
///
/// let mut open = OpenAddressingTable::new();
/// count_words(&mut open, text);
/// assert_eq!(open.get(&"the"), Ok(&3));
///
/// let mut cuckoo = CuckooTable::new();
/// count_words(&mut cuckoo, text);
/// assert_eq!(cuckoo.get(&"and"), Ok(&2));
/// # }
/// ```
pub trait Map<K, V> {
    /// Iterator over `(key, value)` pairs.
    type Iter<'a>: Iterator<Item = (&'a K, &'a V)>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    /// Inserts a new key.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is present.
    fn insert(&mut self, key: K, value: V) -> Result<()>;

    /// Removes a key, returning its value.
    ///
    /// Fails with [`Error::KeyNotFound`] if the key is absent.
    fn remove(&mut self, key: &K) -> Result<V>;

    /// Looks up a key.
    fn find(&self, key: &K) -> Option<&V>;

    /// Replaces the value of an existing key, returning the old value.
    ///
    /// Never inserts: fails with [`Error::KeyNotFound`] if the key is absent.
    fn set(&mut self, key: &K, value: V) -> Result<V>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Removes every entry and returns the table to its minimum capacity.
    fn clear(&mut self);

    /// Iterates over all entries. Order is unspecified.
    fn iter(&self) -> Self::Iter<'_>;

    /// Returns `true` if the key is present.
    fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Reads the value of an existing key.
    fn get(&self, key: &K) -> Result<&V> {
        self.find(key).ok_or(Error::KeyNotFound)
    }

    /// Returns `true` if the map holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts every pair from `iter`, stopping at the first failure.
    ///
    /// Pairs inserted before the failure stay in the map.
    fn try_extend<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        Self: Sized,
    {
        for (key, value) in iter {
            self.insert(key, value)?;
        }
        Ok(())
    }
}
