use tracing::trace;

use crate::common::{
    data::Kind,
    fault::Fault,
    value::Value,
};

/// Capacity of the first allocation made by a growing container.
pub const MIN_CAPACITY: usize = 4;

/// A growable sequence of values.
/// Capacity doubles when full and never shrinks on `pop`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Array {
    data: Vec<Value>,
}

impl Array {
    pub fn new() -> Array { Array { data: vec![] } }

    pub fn with_capacity(capacity: usize) -> Result<Array, Fault> {
        let mut array = Array::new();
        array.ensure(capacity)?;
        Ok(array)
    }

    pub fn count(&self) -> usize { self.data.len() }

    pub fn capacity(&self) -> usize { self.data.capacity() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Makes room for at least `capacity` values without further allocation.
    pub fn ensure(&mut self, capacity: usize) -> Result<(), Fault> {
        if capacity > self.data.capacity() {
            trace!(from = self.data.capacity(), to = capacity, "growing array");
            self.data.try_reserve_exact(capacity - self.data.len())?;
        }
        Ok(())
    }

    pub fn push(&mut self, value: Value) -> Result<(), Fault> {
        if self.data.len() == self.data.capacity() {
            self.ensure((self.data.capacity() * 2).max(MIN_CAPACITY))?;
        }
        self.data.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, Fault> {
        self.data.pop().ok_or(Fault::Empty(Kind::Array))
    }

    pub fn peek(&self) -> Result<Value, Fault> {
        self.data.last().cloned().ok_or(Fault::Empty(Kind::Array))
    }

    pub fn get(&self, index: usize) -> Result<Value, Fault> {
        self.data.get(index).cloned().ok_or(Fault::IndexOutOfRange {
            index,
            count: self.data.len(),
        })
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<(), Fault> {
        let count = self.data.len();
        match self.data.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            },
            None => Err(Fault::IndexOutOfRange { index, count }),
        }
    }

    pub fn as_slice(&self) -> &[Value] { &self.data }

    pub fn iter(&self) -> impl Iterator<Item = &Value> { self.data.iter() }
}

impl From<Vec<Value>> for Array {
    fn from(data: Vec<Value>) -> Array { Array { data } }
}
