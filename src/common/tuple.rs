use std::{
    fmt::{
        Debug,
        Formatter,
        Result,
    },
    hash::Hasher,
};

use rustc_hash::FxHasher;

use crate::common::{
    data::Kind,
    fault::Fault,
    value::Value,
};

/// An immutable, fixed-length sequence of values.
#[derive(Clone)]
pub struct Tuple {
    items: Box<[Value]>,
    hash:  u64,
}

impl Tuple {
    pub fn new(items: Vec<Value>) -> Tuple {
        let mut hasher = FxHasher::default();
        hasher.write_usize(items.len());
        for item in items.iter() {
            hasher.write_u64(item.hash_code());
        }

        Tuple {
            items: items.into_boxed_slice(),
            hash:  hasher.finish(),
        }
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn hash_code(&self) -> u64 { self.hash }

    pub fn as_slice(&self) -> &[Value] { &self.items }

    pub fn iter(&self) -> impl Iterator<Item = &Value> { self.items.iter() }

    pub fn get(&self, index: usize) -> std::result::Result<Value, Fault> {
        self.items.get(index).cloned().ok_or(Fault::IndexOutOfRange {
            index,
            count: self.items.len(),
        })
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Tuple) -> bool {
        self.hash == other.hash && self.items == other.items
    }
}

impl Eq for Tuple {}

impl Debug for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_tuple("Tuple").field(&self.items).finish()
    }
}

/// An immutable mapping from keys to values.
///
/// Entries keep first-insertion order, but equality and hashing
/// ignore order: two structs with the same pairs are the same struct.
#[derive(Clone)]
pub struct Struct {
    entries: Box<[(Value, Value)]>,
    hash:    u64,
}

impl Struct {
    /// Builds a struct from key/value pairs.
    /// Pairs with a nil key or a nil value are dropped,
    /// and a later pair replaces an earlier one with an equal key.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Struct {
        let mut entries: Vec<(Value, Value)> = vec![];

        for (key, value) in pairs {
            if key.check(Kind::Nil) {
                continue;
            }
            let existing = entries.iter().position(|(k, _)| k == &key);
            match (existing, value.check(Kind::Nil)) {
                (Some(index), true) => { entries.remove(index); },
                (Some(index), false) => entries[index].1 = value,
                (None, true) => (),
                (None, false) => entries.push((key, value)),
            }
        }

        // xor keeps the hash independent of entry order
        let mut hash = entries.len() as u64;
        for (key, value) in entries.iter() {
            let mut hasher = FxHasher::default();
            hasher.write_u64(key.hash_code());
            hasher.write_u64(value.hash_code());
            hash ^= hasher.finish();
        }

        Struct {
            entries: entries.into_boxed_slice(),
            hash,
        }
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn hash_code(&self) -> u64 { self.hash }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for Struct {
    fn eq(&self, other: &Struct) -> bool {
        self.hash == other.hash
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(key, value)| other.get(key).as_ref() == Some(value))
    }
}

impl Eq for Struct {}

impl Debug for Struct {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tuple_bounds() {
        let tuple = Tuple::new(vec![Value::integer(1), Value::string("two")]);
        assert_eq!(tuple.get(1).unwrap(), Value::string("two"));
        assert_eq!(
            tuple.get(2),
            Err(Fault::IndexOutOfRange { index: 2, count: 2 })
        );
    }

    #[test]
    fn tuples_compare_by_content() {
        let a = Tuple::new(vec![Value::integer(1), Value::real(2.5)]);
        let b = Tuple::new(vec![Value::integer(1), Value::real(2.5)]);
        let c = Tuple::new(vec![Value::real(2.5), Value::integer(1)]);
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());
        assert_ne!(a, c);
    }

    #[test]
    fn struct_ignores_order() {
        let a = Struct::from_pairs(vec![
            (Value::symbol("x"), Value::integer(1)),
            (Value::symbol("y"), Value::integer(2)),
        ]);
        let b = Struct::from_pairs(vec![
            (Value::symbol("y"), Value::integer(2)),
            (Value::symbol("x"), Value::integer(1)),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());
    }

    #[test]
    fn struct_drops_nil_and_duplicates() {
        let s = Struct::from_pairs(vec![
            (Value::symbol("x"), Value::integer(1)),
            (Value::nil(), Value::integer(2)),
            (Value::symbol("y"), Value::nil()),
            (Value::symbol("x"), Value::integer(3)),
        ]);
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(&Value::symbol("x")), Some(Value::integer(3)));
        assert_eq!(s.get(&Value::symbol("y")), None);
    }
}
