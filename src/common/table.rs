use std::mem;

use tracing::trace;

use crate::common::{
    data::Kind,
    fault::Fault,
    value::Value,
};

/// Smallest number of buckets a non-empty table holds.
pub const MIN_BUCKETS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
enum Bucket {
    Empty,
    /// Left behind by `remove`, so probe sequences through it stay intact.
    Tombstone,
    Full(Value, Value),
}

/// A mutable hash table from values to values.
///
/// Open addressing with linear probing over a power-of-two bucket array.
/// `count + deleted` never exceeds half the capacity: inserting a new key
/// past that point rehashes into a larger array, dropping all tombstones.
/// Nil is never stored: nil keys are rejected and a nil value removes.
#[derive(Debug, Clone, Default)]
pub struct Table {
    buckets: Vec<Bucket>,
    count:   usize,
    deleted: usize,
}

impl Table {
    pub fn new() -> Table {
        Table {
            buckets: vec![],
            count:   0,
            deleted: 0,
        }
    }

    pub fn with_capacity(entries: usize) -> Result<Table, Fault> {
        let mut table = Table::new();
        if entries > 0 {
            table.rehash((entries * 2).next_power_of_two().max(MIN_BUCKETS))?;
        }
        Ok(table)
    }

    /// Number of live entries.
    pub fn count(&self) -> usize { self.count }

    /// Number of tombstones.
    pub fn deleted(&self) -> usize { self.deleted }

    pub fn capacity(&self) -> usize { self.buckets.len() }

    pub fn is_empty(&self) -> bool { self.count == 0 }

    /// Probes for `key`.
    /// `Ok(index)` is the bucket holding it; `Err(Some(index))` is where
    /// it would go, preferring the first tombstone seen;
    /// `Err(None)` means the table has no room.
    fn find(&self, key: &Value) -> Result<usize, Option<usize>> {
        let capacity = self.buckets.len();
        if capacity == 0 {
            return Err(None);
        }

        let mask = capacity - 1;
        let start = (key.hash_code() as usize) & mask;
        let mut tombstone = None;

        for step in 0..capacity {
            let index = (start + step) & mask;
            match &self.buckets[index] {
                Bucket::Full(k, _) if k == key => return Ok(index),
                Bucket::Full(..) => (),
                Bucket::Tombstone => {
                    tombstone.get_or_insert(index);
                },
                Bucket::Empty => return Err(tombstone.or(Some(index))),
            }
        }

        Err(tombstone)
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        match self.find(key) {
            Ok(index) => match &self.buckets[index] {
                Bucket::Full(_, value) => Some(value.clone()),
                _ => None,
            },
            Err(_) => None,
        }
    }

    pub fn contains(&self, key: &Value) -> bool { self.find(key).is_ok() }

    /// Inserts or replaces an entry. Putting nil removes the key.
    pub fn put(&mut self, key: Value, value: Value) -> Result<(), Fault> {
        if key.check(Kind::Nil) {
            return Err(Fault::NilKey);
        }
        if value.check(Kind::Nil) {
            self.remove(&key);
            return Ok(());
        }

        if let Ok(index) = self.find(&key) {
            self.buckets[index] = Bucket::Full(key, value);
            return Ok(());
        }

        if 2 * (self.count + self.deleted + 1) > self.buckets.len() {
            let buckets = (4 * self.count).next_power_of_two().max(MIN_BUCKETS);
            self.rehash(buckets)?;
        }

        match self.find(&key) {
            Err(Some(index)) => {
                if self.buckets[index] == Bucket::Tombstone {
                    self.deleted -= 1;
                }
                self.buckets[index] = Bucket::Full(key, value);
                self.count += 1;
                Ok(())
            },
            // a rehash always leaves at least half the buckets empty
            _ => unreachable!("no free bucket after rehash"),
        }
    }

    /// Removes an entry, leaving a tombstone. Returns the removed value.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let index = self.find(key).ok()?;
        match mem::replace(&mut self.buckets[index], Bucket::Tombstone) {
            Bucket::Full(_, value) => {
                self.count -= 1;
                self.deleted += 1;
                Some(value)
            },
            other => {
                self.buckets[index] = other;
                None
            },
        }
    }

    /// Moves every live entry into a fresh array of `buckets` buckets.
    fn rehash(&mut self, buckets: usize) -> Result<(), Fault> {
        trace!(
            from = self.buckets.len(),
            to = buckets,
            count = self.count,
            deleted = self.deleted,
            "rehashing table"
        );

        let mut fresh = vec![];
        fresh.try_reserve_exact(buckets)?;
        fresh.resize(buckets, Bucket::Empty);

        let old = mem::replace(&mut self.buckets, fresh);
        self.deleted = 0;

        for bucket in old {
            if let Bucket::Full(key, value) = bucket {
                match self.find(&key) {
                    Err(Some(index)) => self.buckets[index] = Bucket::Full(key, value),
                    _ => unreachable!("rehash target too small"),
                }
            }
        }

        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.buckets.iter().filter_map(|bucket| match bucket {
            Bucket::Full(k, v) => Some((k.clone(), v.clone())),
            _ => None,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = Value> + '_ { self.iter().map(|(k, _)| k) }
}
