use tracing::trace;

use crate::common::{
    array::MIN_CAPACITY,
    data::Kind,
    fault::Fault,
};

/// A growable byte sequence, used as a mutable string or string builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Buffer { Buffer { data: vec![] } }

    pub fn with_capacity(capacity: usize) -> Result<Buffer, Fault> {
        let mut buffer = Buffer::new();
        buffer.ensure(capacity)?;
        Ok(buffer)
    }

    pub fn count(&self) -> usize { self.data.len() }

    pub fn capacity(&self) -> usize { self.data.capacity() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn ensure(&mut self, capacity: usize) -> Result<(), Fault> {
        if capacity > self.data.capacity() {
            trace!(from = self.data.capacity(), to = capacity, "growing buffer");
            self.data.try_reserve_exact(capacity - self.data.len())?;
        }
        Ok(())
    }

    /// Grows by doubling until `extra` more bytes fit.
    fn reserve(&mut self, extra: usize) -> Result<(), Fault> {
        let needed = self.data.len() + extra;
        if needed > self.data.capacity() {
            let mut capacity = self.data.capacity().max(MIN_CAPACITY);
            while capacity < needed {
                capacity *= 2;
            }
            self.ensure(capacity)?;
        }
        Ok(())
    }

    pub fn push(&mut self, byte: u8) -> Result<(), Fault> {
        self.reserve(1)?;
        self.data.push(byte);
        Ok(())
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Fault> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn push_str(&mut self, text: &str) -> Result<(), Fault> { self.push_bytes(text.as_bytes()) }

    pub fn pop(&mut self) -> Result<u8, Fault> { self.data.pop().ok_or(Fault::Empty(Kind::Buffer)) }

    pub fn get(&self, index: usize) -> Result<u8, Fault> {
        self.data.get(index).copied().ok_or(Fault::IndexOutOfRange {
            index,
            count: self.data.len(),
        })
    }

    pub fn set(&mut self, index: usize, byte: u8) -> Result<(), Fault> {
        let count = self.data.len();
        match self.data.get_mut(index) {
            Some(slot) => {
                *slot = byte;
                Ok(())
            },
            None => Err(Fault::IndexOutOfRange { index, count }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] { &self.data }
}
